//! Fixed-point evaluation.
//!
//! An [`Evaluator`] holds an ordered pipeline of rules. A *pass* applies every
//! rule once, in order, to the whole tree through
//! [`rewrite_bottom_up`](crate::rewrite::rewrite_bottom_up). Passes repeat
//! until one changes nothing.
//!
//! There is no iteration cap: rules whose interactions never converge keep the
//! evaluator running forever.
//!
//! # Example
//!
//! ```
//! use rhizome_calg_core::Outcome;
//! use rhizome_calg_core::eval::Evaluator;
//!
//! let mut evaluator = Evaluator::standard();
//! let x = evaluator.factory().constant(3);
//! let y = evaluator.factory().constant(2);
//! let mut root = evaluator.factory().call("A", vec![x, y]);
//!
//! // Print every intermediate tree.
//! while evaluator.step(&mut root) {
//!     println!("{}", root);
//! }
//! assert_eq!(Outcome::from_root(root), Outcome::Reduced(29));
//! ```

use crate::rewrite::{Rule, rewrite_bottom_up};
use crate::rules::{AckermannUnfolding, AssociativeFolding, ConstantFolding};
use crate::{ExprRef, Factory, Outcome, Value};

/// Returns the pipeline used to evaluate Ackermann's function.
///
/// In order:
/// - [`ConstantFolding`]
/// - [`AckermannUnfolding`]
/// - [`ConstantFolding`]
/// - [`AssociativeFolding`]
pub fn standard_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ConstantFolding::new()),
        Box::new(AckermannUnfolding::new()),
        Box::new(ConstantFolding::new()),
        Box::new(AssociativeFolding::new()),
    ]
}

/// Runs a rule pipeline to its fixed point.
///
/// Owns the [`Factory`] its rules allocate through, so concurrent evaluations
/// each need their own evaluator.
#[derive(Default)]
pub struct Evaluator {
    rules: Vec<Box<dyn Rule>>,
    factory: Factory,
}

impl Evaluator {
    /// Creates an evaluator with an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluator with [`standard_rules`].
    pub fn standard() -> Self {
        Self {
            rules: standard_rules(),
            factory: Factory::new(),
        }
    }

    /// Appends a rule to the pipeline.
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Appends a boxed rule to the pipeline.
    pub fn push(&mut self, rule: Box<dyn Rule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Names of the configured rules, in pipeline order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name())
    }

    /// The factory shared by this evaluator's rules.
    pub fn factory(&mut self) -> &mut Factory {
        &mut self.factory
    }

    /// Runs one pass. Returns whether any rule changed the tree.
    pub fn step(&mut self, root: &mut ExprRef) -> bool {
        let mut changed = false;
        for rule in &self.rules {
            let rule_changed = rewrite_bottom_up(rule.as_ref(), root, &mut self.factory);
            log::trace!("{} (changed: {}): {}", rule.name(), rule_changed, root);
            changed |= rule_changed;
        }
        changed
    }

    /// Runs passes until one changes nothing. Returns the number of passes
    /// that changed the tree.
    pub fn run(&mut self, root: &mut ExprRef) -> usize {
        let mut passes = 0;
        loop {
            let changed = self.step(root);
            log::debug!(
                "pass {} (changed: {}): {} nodes",
                passes + 1,
                changed,
                Self::size(root)
            );
            if !changed {
                return passes;
            }
            passes += 1;
        }
    }

    /// Runs to the fixed point and classifies the result.
    pub fn evaluate(&mut self, mut root: ExprRef) -> Outcome {
        self.run(&mut root);
        Outcome::from_root(root)
    }

    #[cfg(feature = "introspect")]
    fn size(root: &ExprRef) -> usize {
        root.node_count()
    }

    #[cfg(not(feature = "introspect"))]
    fn size(root: &ExprRef) -> usize {
        let mut count = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.args());
        }
        count
    }
}

/// Evaluates `A(x, y)` with the standard pipeline.
///
/// The unfolding grows hyper-exponentially; only small inputs finish in
/// practice. Negative inputs do not unfold and come back as
/// [`Outcome::NotReduced`].
///
/// ```
/// use rhizome_calg_core::{evaluate, Outcome};
///
/// assert_eq!(evaluate(1, 1), Outcome::Reduced(3));
/// assert!(!evaluate(-1, 0).is_reduced());
/// ```
pub fn evaluate(x: Value, y: Value) -> Outcome {
    let mut evaluator = Evaluator::standard();
    let x = evaluator.factory().constant(x);
    let y = evaluator.factory().constant(y);
    let root = evaluator.factory().call("A", vec![x, y]);
    evaluator.evaluate(root)
}
