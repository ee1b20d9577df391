//! Rewrite rules and the bottom-up traversal engine.
//!
//! A [`Rule`] looks at one node and either leaves it alone or returns a
//! replacement. [`rewrite_bottom_up`] applies a rule to every node of a tree
//! in strict post-order and splices replacements into their parents.

use std::rc::Rc;

use crate::{ExprRef, Factory};

/// A rewrite rule over a single node.
///
/// Rules are applied bottom-up: by the time a node is visited its children
/// have already been rewritten. Return `Some(replacement)` to replace the
/// node, `None` to keep it. Rules allocate through the provided [`Factory`].
///
/// # Example
///
/// ```
/// use rhizome_calg_core::{ExprRef, Factory, Rule};
/// use rhizome_calg_core::matcher::{op_named, symbol, Pattern};
/// use rhizome_calg_core::rewrite::rewrite_bottom_up;
///
/// /// x - x → 0
/// struct SelfCancel(Pattern);
///
/// impl Rule for SelfCancel {
///     fn name(&self) -> &str {
///         "self-cancel"
///     }
///
///     fn rewrite(&self, expr: &ExprRef, factory: &mut Factory) -> Option<ExprRef> {
///         if self.0.matches(expr) && expr.args()[0] == expr.args()[1] {
///             Some(factory.constant(0))
///         } else {
///             None
///         }
///     }
/// }
///
/// let mut factory = Factory::new();
/// let (a, b) = (factory.symbol("a"), factory.symbol("a"));
/// let mut root = factory.binary("-", a, b);
/// let rule = SelfCancel(op_named("-", symbol(), symbol()));
/// assert!(rewrite_bottom_up(&rule, &mut root, &mut factory));
/// assert_eq!(root.to_string(), "0");
/// ```
pub trait Rule {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Rewrites one node.
    fn rewrite(&self, expr: &ExprRef, factory: &mut Factory) -> Option<ExprRef>;
}

enum Task {
    /// Visit a node: terminals are rewritten directly, non-terminals schedule
    /// their children followed by a `Finish`.
    Visit(ExprRef),
    /// All children of this node have been rewritten and sit on top of the
    /// result stack.
    Finish(ExprRef),
}

/// Applies `rule` to every node under `root`, children before parents.
///
/// Each node is offered to the rule exactly once, after its children have been
/// rewritten; a replacement is not revisited within the same call. Uses an
/// explicit work list, so tree depth is not limited by the call stack.
///
/// Returns whether any node was replaced.
pub fn rewrite_bottom_up<R: Rule + ?Sized>(
    rule: &R,
    root: &mut ExprRef,
    factory: &mut Factory,
) -> bool {
    let mut changed = false;
    let mut tasks = vec![Task::Visit(Rc::clone(root))];
    let mut results: Vec<ExprRef> = Vec::new();

    while let Some(task) = tasks.pop() {
        let node = match task {
            Task::Visit(node) if node.is_terminal() => node,
            Task::Visit(node) => {
                let children: Vec<ExprRef> = node.args().iter().rev().cloned().collect();
                tasks.push(Task::Finish(node));
                tasks.extend(children.into_iter().map(Task::Visit));
                continue;
            }
            Task::Finish(node) => {
                let arity = node.args().len();
                let args = results.split_off(results.len() - arity);
                let unchanged = args
                    .iter()
                    .zip(node.args())
                    .all(|(new, old)| Rc::ptr_eq(new, old));
                if unchanged {
                    node
                } else {
                    Rc::new(node.with_args(args))
                }
            }
        };

        match rule.rewrite(&node, factory) {
            Some(replacement) => {
                log::trace!("{}: {} => {}", rule.name(), node, replacement);
                changed = true;
                results.push(replacement);
            }
            None => results.push(node),
        }
    }

    debug_assert_eq!(results.len(), 1);
    if let Some(rewritten) = results.pop() {
        *root = rewritten;
    }
    changed
}
