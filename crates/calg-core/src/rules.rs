//! Rewrite rules.
//!
//! - [`ConstantFolding`]: evaluates `+`/`-` on two constants
//! - [`AckermannUnfolding`]: expands `A(x, y)` by its recurrence once the
//!   relevant arguments are constants
//! - [`AssociativeFolding`]: flattens additive chains, combines their
//!   constants, and rebuilds them in canonical order
//! - [`SymbolSubstitution`]: binds free symbols to expressions
//!
//! Each rule is guarded by a [`Pattern`] and only inspects the node it is
//! given; the traversal engine takes care of visiting the whole tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::matcher::{Pattern, any, call_with, constant, constant_eq, either, op, op_named, symbol};
use crate::operators::{self, Commutativity, NumericGroup};
use crate::rewrite::Rule;
use crate::{Expr, ExprRef, Factory, Kind, Value};

// ============================================================================
// ConstantFolding
// ============================================================================

/// Folds a binary `+` or `-` whose operands are both constants.
///
/// | Before  | After |
/// |---------|-------|
/// | `1 + 2` | `3`   |
/// | `5 - 7` | `-2`  |
/// | `2 * 3` | kept  |
///
/// Only `+` and `-` are folded. A result that would overflow is left unfolded.
pub struct ConstantFolding {
    guard: Pattern,
}

impl ConstantFolding {
    pub fn new() -> Self {
        Self {
            guard: either(
                op_named("+", constant(), constant()),
                op_named("-", constant(), constant()),
            ),
        }
    }
}

impl Default for ConstantFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn rewrite(&self, expr: &ExprRef, factory: &mut Factory) -> Option<ExprRef> {
        if !self.guard.matches(expr) {
            return None;
        }
        let Expr::Operator(name, args) = expr.as_ref() else {
            return None;
        };
        let [left, right] = args.as_slice() else {
            return None;
        };
        let (l, r) = (left.as_constant()?, right.as_constant()?);
        let value = match name.as_str() {
            "+" => l.checked_add(r)?,
            "-" => l.checked_sub(r)?,
            _ => return None,
        };
        Some(factory.constant(value))
    }
}

// ============================================================================
// AckermannUnfolding
// ============================================================================

/// Unfolds Ackermann's function one step.
///
/// ```text
///          / y + 1               if x = 0
/// A(x,y) = | A(x - 1, 1)         if x > 0 and y = 0
///          \ A(x - 1, A(x, y-1)) if x > 0 and y > 0
/// ```
///
/// The rule fires only when the arguments the chosen case inspects are
/// constants, so unfolding interleaves with [`ConstantFolding`] across passes.
/// Negative arguments are outside the recurrence and never unfold.
pub struct AckermannUnfolding {
    base: Pattern,
    y_zero: Pattern,
    general: Pattern,
}

impl AckermannUnfolding {
    /// Unfolds calls named `A`.
    pub fn new() -> Self {
        Self::named("A")
    }

    /// Unfolds calls named `function`.
    pub fn named(function: &str) -> Self {
        Self {
            base: call_with(function, [constant_eq(0), any()]),
            y_zero: call_with(function, [constant(), constant_eq(0)]),
            general: call_with(function, [constant(), constant()]),
        }
    }
}

impl Default for AckermannUnfolding {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for AckermannUnfolding {
    fn name(&self) -> &str {
        "ackermann-unfolding"
    }

    fn rewrite(&self, expr: &ExprRef, factory: &mut Factory) -> Option<ExprRef> {
        let Expr::Call(function, args) = expr.as_ref() else {
            return None;
        };
        let [x, y] = args.as_slice() else {
            return None;
        };
        if self.base.matches(expr) {
            let one = factory.constant(1);
            return Some(factory.binary("+", Rc::clone(y), one));
        }

        // Remaining cases need x > 0 and y >= 0.
        let (Some(x_value), Some(y_value)) = (x.as_constant(), y.as_constant()) else {
            return None;
        };
        if x_value <= 0 || y_value < 0 {
            return None;
        }

        let one = factory.constant(1);
        if self.y_zero.matches(expr) {
            let x_minus_one = factory.binary("-", Rc::clone(x), Rc::clone(&one));
            Some(factory.call(function.as_str(), vec![x_minus_one, one]))
        } else if self.general.matches(expr) {
            let x_minus_one = factory.binary("-", Rc::clone(x), Rc::clone(&one));
            let y_minus_one = factory.binary("-", Rc::clone(y), one);
            let inner = factory.call(function.as_str(), vec![Rc::clone(x), y_minus_one]);
            Some(factory.call(function.as_str(), vec![x_minus_one, inner]))
        } else {
            None
        }
    }
}

// ============================================================================
// AssociativeFolding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Plus,
    Minus,
}

impl Sign {
    fn flip(self) -> Self {
        match self {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        }
    }

    /// Sign of a right operand relative to its operator's own sign.
    fn of_right(self, commutativity: Commutativity) -> Self {
        match commutativity {
            Commutativity::AntiCommutative => self.flip(),
            Commutativity::Commutative | Commutativity::NonCommutative => self,
        }
    }
}

/// Progress through a left-nested chain that is in canonical order so far.
///
/// A canonical chain reads, left to right, as positive non-constant leaves in
/// kind order, then negative ones in kind order, then at most one constant.
/// When there are no positive leaves the constant is the base instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    last_positive: Option<Kind>,
    last_negative: Option<Kind>,
    has_constant: bool,
    /// A trailing constant was read; nothing may follow.
    closed: bool,
}

impl Layout {
    fn start(base: &Expr) -> Self {
        let constant = base.as_constant().is_some();
        Layout {
            last_positive: (!constant).then(|| base.kind()),
            last_negative: None,
            has_constant: constant,
            closed: false,
        }
    }

    /// Reads the next `sign leaf` element. `None` once the chain is no longer canonical.
    fn extend(self, sign: Sign, leaf: &Expr) -> Option<Self> {
        if self.closed {
            return None;
        }
        let kind = leaf.kind();
        match (leaf.as_constant(), sign) {
            (Some(_), _) if self.has_constant || self.last_positive.is_none() => None,
            // `+ c` for c >= 0, and for the one value without a magnitude.
            (Some(value), Sign::Plus) => (value >= 0 || value == Value::MIN).then_some(Layout {
                has_constant: true,
                closed: true,
                ..self
            }),
            (Some(magnitude), Sign::Minus) => (magnitude > 0).then_some(Layout {
                has_constant: true,
                closed: true,
                ..self
            }),
            (None, Sign::Plus) => {
                let ordered = self.last_positive.is_some_and(|last| last <= kind);
                (ordered && self.last_negative.is_none()).then_some(Layout {
                    last_positive: Some(kind),
                    ..self
                })
            }
            (None, Sign::Minus) => self
                .last_negative
                .is_none_or(|last| last <= kind)
                .then_some(Layout {
                    last_negative: Some(kind),
                    ..self
                }),
        }
    }
}

/// Flattens a chain of additive operators into canonical form.
///
/// The chain is every binary operator reachable through children of the same
/// precedence; anything else is an opaque leaf. Leaves keep track of their
/// sign (the right operand of `-` is negated), so `+`/`-` mixes are handled
/// soundly. The rebuilt chain is:
///
/// 1. positive non-constant leaves, ordered constant < symbol < call < operator
///    and joined with `+`
/// 2. negative non-constant leaves, subtracted in the same order
/// 3. the sum of all constant leaves, added (or subtracted) once at the end,
///    or used as the starting term when every non-constant leaf is negative
///
/// | Before          | After           |
/// |-----------------|-----------------|
/// | `(a + 1) + 2`   | `a + 3`         |
/// | `(1 + a) + 2`   | `a + 3`         |
/// | `f(x) + b`      | `b + f(x)`      |
/// | `(a - 1) - b`   | `(a - b) - 1`   |
/// | `1 - (a - 2)`   | `3 - a`         |
///
/// Only operators of the additive group are flattened. Multiplicative and
/// unknown operators are left alone. A chain already in canonical form is
/// reported unchanged, so the rule is idempotent.
///
/// Canonical form is checked by walking the chain's left spine. The last chain
/// found canonical is remembered, so a parent extending it is checked in
/// constant time; bottom-up traversal of a left-nested chain stays linear.
pub struct AssociativeFolding {
    guard: Pattern,
    canonical: RefCell<Option<(ExprRef, Layout)>>,
}

impl AssociativeFolding {
    pub fn new() -> Self {
        Self {
            guard: op(any(), any()),
            canonical: RefCell::new(None),
        }
    }

    /// Returns the operands of `expr` if it continues a chain at `precedence`.
    fn chain_link(expr: &Expr, precedence: i32) -> Option<(Commutativity, &ExprRef, &ExprRef)> {
        let Expr::Operator(name, args) = expr else {
            return None;
        };
        let [left, right] = args.as_slice() else {
            return None;
        };
        let info = operators::lookup(name)?;
        (info.group == NumericGroup::Additive && info.precedence == precedence)
            .then_some((info.commutativity, left, right))
    }

    /// Layout of `expr` if it is already canonical.
    fn layout(&self, expr: &ExprRef, precedence: i32) -> Option<Layout> {
        let remembered = self.canonical.borrow();
        let mut elements = Vec::new();
        let mut node = expr;
        let base = loop {
            if let Some((chain, layout)) = remembered.as_ref() {
                if Rc::ptr_eq(chain, node) {
                    break *layout;
                }
            }
            match Self::chain_link(node, precedence) {
                Some((commutativity, left, right)) => {
                    if Self::chain_link(right, precedence).is_some() {
                        return None;
                    }
                    elements.push((Sign::Plus.of_right(commutativity), right));
                    node = left;
                }
                None => break Layout::start(node),
            }
        };
        elements
            .into_iter()
            .rev()
            .try_fold(base, |layout, (sign, leaf)| layout.extend(sign, leaf))
    }

    fn remember(&self, chain: &ExprRef, layout: Layout) {
        *self.canonical.borrow_mut() = Some((Rc::clone(chain), layout));
    }

    fn flatten(expr: &ExprRef, precedence: i32) -> Vec<(Sign, ExprRef)> {
        let mut leaves = Vec::new();
        let mut stack = vec![(Sign::Plus, Rc::clone(expr))];
        while let Some((sign, node)) = stack.pop() {
            if let Some((commutativity, left, right)) = Self::chain_link(&node, precedence) {
                // Right first so the left operand is popped first.
                stack.push((sign.of_right(commutativity), Rc::clone(right)));
                stack.push((sign, Rc::clone(left)));
                continue;
            }
            leaves.push((sign, node));
        }
        leaves
    }

    fn rebuild(leaves: Vec<(Sign, ExprRef)>, factory: &mut Factory) -> Option<ExprRef> {
        // Summed wide so intermediate totals cannot overflow; only the result must fit.
        let mut total: Option<i128> = None;
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for (sign, leaf) in leaves {
            match (leaf.as_constant(), sign) {
                (Some(value), Sign::Plus) => {
                    total = Some(total.unwrap_or(0) + i128::from(value));
                }
                (Some(value), Sign::Minus) => {
                    total = Some(total.unwrap_or(0) - i128::from(value));
                }
                (None, Sign::Plus) => positive.push(leaf),
                (None, Sign::Minus) => negative.push(leaf),
            }
        }
        let mut constant = match total {
            Some(total) => Some(Value::try_from(total).ok()?),
            None => None,
        };

        let mut chain = positive
            .into_iter()
            .reduce(|acc, leaf| factory.binary("+", acc, leaf));
        if chain.is_none() && !negative.is_empty() {
            chain = Some(factory.constant(constant.take().unwrap_or(0)));
        }
        if let Some(mut acc) = chain {
            for leaf in negative {
                acc = factory.binary("-", acc, leaf);
            }
            chain = Some(acc);
        }

        match (chain, constant) {
            (Some(acc), None) => Some(acc),
            (None, Some(value)) => Some(factory.constant(value)),
            (Some(acc), Some(value)) => match value.checked_neg() {
                Some(magnitude) if value < 0 => {
                    let magnitude = factory.constant(magnitude);
                    Some(factory.binary("-", acc, magnitude))
                }
                _ => {
                    let value = factory.constant(value);
                    Some(factory.binary("+", acc, value))
                }
            },
            (None, None) => None,
        }
    }
}

impl Default for AssociativeFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for AssociativeFolding {
    fn name(&self) -> &str {
        "associative-folding"
    }

    fn rewrite(&self, expr: &ExprRef, factory: &mut Factory) -> Option<ExprRef> {
        if !self.guard.matches(expr) {
            return None;
        }
        let info = operators::lookup(expr.name()?)?;
        if info.group != NumericGroup::Additive {
            return None;
        }
        if let Some(layout) = self.layout(expr, info.precedence) {
            self.remember(expr, layout);
            return None;
        }

        let mut leaves = Self::flatten(expr, info.precedence);
        leaves.sort_by_key(|(_, leaf)| leaf.kind());
        let rebuilt = Self::rebuild(leaves, factory)?;
        if let Some(layout) = self.layout(&rebuilt, info.precedence) {
            self.remember(&rebuilt, layout);
        }
        Some(rebuilt)
    }
}

// ============================================================================
// SymbolSubstitution
// ============================================================================

/// Replaces bound symbols with expressions.
///
/// Replacements are shared handles to immutable subtrees, and a replacement is
/// not itself substituted again within the same traversal.
///
/// ```
/// use rhizome_calg_core::{Factory, Outcome};
/// use rhizome_calg_core::eval::Evaluator;
/// use rhizome_calg_core::rules::SymbolSubstitution;
///
/// let mut factory = Factory::new();
/// let (x, one) = (factory.symbol("x"), factory.constant(1));
/// let root = factory.call("A", vec![one, x]);
///
/// let mut bindings = SymbolSubstitution::new();
/// bindings.bind("x", factory.constant(2));
///
/// let mut evaluator = Evaluator::standard();
/// evaluator.push(Box::new(bindings));
/// assert_eq!(evaluator.evaluate(root), Outcome::Reduced(4));
/// ```
#[derive(Debug, Clone)]
pub struct SymbolSubstitution {
    guard: Pattern,
    bindings: HashMap<String, ExprRef>,
}

impl SymbolSubstitution {
    pub fn new() -> Self {
        Self {
            guard: symbol(),
            bindings: HashMap::new(),
        }
    }

    /// Binds `name` to `expr`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, expr: ExprRef) -> &mut Self {
        self.bindings.insert(name.into(), expr);
        self
    }

    /// Builder-style [`bind`](Self::bind).
    pub fn with(mut self, name: impl Into<String>, expr: ExprRef) -> Self {
        self.bind(name, expr);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ExprRef> {
        self.bindings.get(name)
    }
}

impl Default for SymbolSubstitution {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for SymbolSubstitution {
    fn name(&self) -> &str {
        "symbol-substitution"
    }

    fn rewrite(&self, expr: &ExprRef, _factory: &mut Factory) -> Option<ExprRef> {
        if !self.guard.matches(expr) {
            return None;
        }
        let replacement = self.bindings.get(expr.name()?)?;
        // Binding a symbol to itself is not a change.
        (replacement != expr).then(|| Rc::clone(replacement))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::rewrite_bottom_up;

    fn apply(rule: &dyn Rule, root: &mut ExprRef, factory: &mut Factory) -> bool {
        rewrite_bottom_up(rule, root, factory)
    }

    fn folded(rule: &dyn Rule, mut root: ExprRef, factory: &mut Factory) -> String {
        apply(rule, &mut root, factory);
        root.to_string()
    }

    // ConstantFolding tests
    #[test]
    fn test_constant_fold_add() {
        let mut f = Factory::new();
        let (one, two) = (f.constant(1), f.constant(2));
        let root = f.binary("+", one, two);
        assert_eq!(folded(&ConstantFolding::new(), root, &mut f), "3");
    }

    #[test]
    fn test_constant_fold_sub() {
        let mut f = Factory::new();
        let (five, seven) = (f.constant(5), f.constant(7));
        let root = f.binary("-", five, seven);
        assert_eq!(folded(&ConstantFolding::new(), root, &mut f), "-2");
    }

    #[test]
    fn test_constant_fold_nested() {
        let mut f = Factory::new();
        let (one, two, three) = (f.constant(1), f.constant(2), f.constant(3));
        let inner = f.binary("+", one, two);
        let root = f.binary("-", inner, three);
        // Bottom-up: the inner sum folds first, then the difference.
        assert_eq!(folded(&ConstantFolding::new(), root, &mut f), "0");
    }

    #[test]
    fn test_constant_fold_allow_list() {
        let mut f = Factory::new();
        let (two, three) = (f.constant(2), f.constant(3));
        for name in ["*", "/", "%", "^"] {
            let mut root = f.binary(name, two.clone(), three.clone());
            assert!(!apply(&ConstantFolding::new(), &mut root, &mut f));
            assert_eq!(root.to_string(), format!("(2 {} 3)", name));
        }
    }

    #[test]
    fn test_constant_fold_ignores_calls() {
        let mut f = Factory::new();
        let (one, two) = (f.constant(1), f.constant(2));
        let mut root = f.call("+", vec![one, two]);
        assert!(!apply(&ConstantFolding::new(), &mut root, &mut f));
    }

    #[test]
    fn test_constant_fold_non_constant_operand() {
        let mut f = Factory::new();
        let (a, one) = (f.symbol("a"), f.constant(1));
        let mut root = f.binary("+", a, one);
        assert!(!apply(&ConstantFolding::new(), &mut root, &mut f));
        assert_eq!(root.to_string(), "(a + 1)");
    }

    #[test]
    fn test_constant_fold_overflow_kept() {
        let mut f = Factory::new();
        let (max, one) = (f.constant(Value::MAX), f.constant(1));
        let mut root = f.binary("+", max, one);
        assert!(!apply(&ConstantFolding::new(), &mut root, &mut f));
    }

    #[test]
    fn test_constant_fold_idempotent() {
        let mut f = Factory::new();
        let (one, two, a) = (f.constant(1), f.constant(2), f.symbol("a"));
        let sum = f.binary("+", one, two);
        let mut root = f.call("g", vec![sum, a]);

        let rule = ConstantFolding::new();
        assert!(apply(&rule, &mut root, &mut f));
        let once = root.clone();
        assert!(!apply(&rule, &mut root, &mut f));
        assert_eq!(root, once);
        assert_eq!(root.to_string(), "g(3, a)");
    }

    // AckermannUnfolding tests
    fn ackermann_call(f: &mut Factory, x: ExprRef, y: ExprRef) -> ExprRef {
        f.call("A", vec![x, y])
    }

    #[test]
    fn test_unfold_base_case() {
        let mut f = Factory::new();
        let (zero, y) = (f.constant(0), f.symbol("y"));
        let root = ackermann_call(&mut f, zero, y);
        assert_eq!(folded(&AckermannUnfolding::new(), root, &mut f), "(y + 1)");
    }

    #[test]
    fn test_unfold_y_zero() {
        let mut f = Factory::new();
        let (two, zero) = (f.constant(2), f.constant(0));
        let root = ackermann_call(&mut f, two, zero);
        assert_eq!(folded(&AckermannUnfolding::new(), root, &mut f), "A((2 - 1), 1)");
    }

    #[test]
    fn test_unfold_general() {
        let mut f = Factory::new();
        let (three, two) = (f.constant(3), f.constant(2));
        let root = ackermann_call(&mut f, three, two);
        assert_eq!(
            folded(&AckermannUnfolding::new(), root, &mut f),
            "A((3 - 1), A(3, (2 - 1)))"
        );
    }

    #[test]
    fn test_unfold_waits_for_constants() {
        let mut f = Factory::new();
        let (three, two, one, y) = (f.constant(3), f.constant(2), f.constant(1), f.symbol("y"));
        let pending = f.binary("-", three.clone(), one);
        let cases = [
            ackermann_call(&mut f, pending, two.clone()),
            ackermann_call(&mut f, three, y),
        ];
        for mut root in cases {
            assert!(!apply(&AckermannUnfolding::new(), &mut root, &mut f));
        }
    }

    #[test]
    fn test_unfold_requires_name_and_arity() {
        let mut f = Factory::new();
        let (one, two) = (f.constant(1), f.constant(2));
        let mut other = f.call("B", vec![one.clone(), two.clone()]);
        let mut ternary = f.call("A", vec![one.clone(), two.clone(), two.clone()]);
        let mut operator = f.binary("A", one, two);
        let rule = AckermannUnfolding::new();
        assert!(!apply(&rule, &mut other, &mut f));
        assert!(!apply(&rule, &mut ternary, &mut f));
        assert!(!apply(&rule, &mut operator, &mut f));
    }

    #[test]
    fn test_unfold_negative_arguments() {
        let mut f = Factory::new();
        let (minus_one, two) = (f.constant(-1), f.constant(2));
        let mut negative_x = ackermann_call(&mut f, minus_one.clone(), two.clone());
        let mut negative_y = ackermann_call(&mut f, two, minus_one);
        let rule = AckermannUnfolding::new();
        assert!(!apply(&rule, &mut negative_x, &mut f));
        assert!(!apply(&rule, &mut negative_y, &mut f));
    }

    #[test]
    fn test_unfold_custom_name() {
        let mut f = Factory::new();
        let (zero, five) = (f.constant(0), f.constant(5));
        let root = f.call("ack", vec![zero, five]);
        assert_eq!(folded(&AckermannUnfolding::named("ack"), root, &mut f), "(5 + 1)");
    }

    // AssociativeFolding tests
    #[test]
    fn test_flatten_confluent() {
        let mut f = Factory::new();
        let rule = AssociativeFolding::new();
        let (one, two, a) = (f.constant(1), f.constant(2), f.symbol("a"));

        let left = f.binary("+", a.clone(), one.clone());
        let first = f.binary("+", left, two.clone());

        let right = f.binary("+", one.clone(), two.clone());
        let second = f.binary("+", a.clone(), right);

        let swapped = f.binary("+", one, a);
        let third = f.binary("+", swapped, two);

        let results: Vec<String> = [first, second, third]
            .into_iter()
            .map(|root| folded(&rule, root, &mut f))
            .collect();
        assert_eq!(results, vec!["(a + 3)", "(a + 3)", "(a + 3)"]);
    }

    #[test]
    fn test_flatten_all_constants() {
        let mut f = Factory::new();
        let (one, two, three) = (f.constant(1), f.constant(2), f.constant(3));
        let inner = f.binary("+", one, two);
        let root = f.binary("+", inner, three);
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "6");
    }

    #[test]
    fn test_flatten_orders_by_kind() {
        let mut f = Factory::new();
        let (x, b, two) = (f.symbol("x"), f.symbol("b"), f.constant(2));
        let call = f.call("g", vec![x]);
        let inner = f.binary("+", call, two);
        let root = f.binary("+", inner, b);
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "((b + g(x)) + 2)");
    }

    #[test]
    fn test_flatten_tracks_sign() {
        let mut f = Factory::new();
        let (a, b, one, two) = (f.symbol("a"), f.symbol("b"), f.constant(1), f.constant(2));

        // (a - 1) - b
        let inner = f.binary("-", a.clone(), one.clone());
        let root = f.binary("-", inner, b.clone());
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "((a - b) - 1)");

        // 1 - (a - 2) = 3 - a
        let inner = f.binary("-", a.clone(), two.clone());
        let root = f.binary("-", one.clone(), inner);
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "(3 - a)");

        // a - (b + 2) + 1 = (a - b) - 1
        let inner = f.binary("+", b, two);
        let diff = f.binary("-", a, inner);
        let root = f.binary("+", diff, one);
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "((a - b) - 1)");
    }

    #[test]
    fn test_flatten_leaves_other_precedence_opaque() {
        let mut f = Factory::new();
        let (a, b, one, two) = (f.symbol("a"), f.symbol("b"), f.constant(1), f.constant(2));
        let product = f.binary("*", a, one);
        let inner = f.binary("+", product, b);
        let root = f.binary("+", inner, two);
        assert_eq!(
            folded(&AssociativeFolding::new(), root, &mut f),
            "((b + (a * 1)) + 2)"
        );

        // Multiplicative chains are not rebuilt with `+`.
        let (c, d) = (f.symbol("c"), f.symbol("d"));
        let mut product = f.binary("*", c, d);
        assert!(!apply(&AssociativeFolding::new(), &mut product, &mut f));
    }

    #[test]
    fn test_flatten_reports_change_only_when_restructured() {
        let mut f = Factory::new();
        let (a, one, two) = (f.symbol("a"), f.constant(1), f.constant(2));
        let inner = f.binary("+", a, one);
        let mut root = f.binary("+", inner, two);

        let rule = AssociativeFolding::new();
        assert!(apply(&rule, &mut root, &mut f));
        assert!(!apply(&rule, &mut root, &mut f));
        assert_eq!(root.to_string(), "(a + 3)");
    }

    #[test]
    fn test_flatten_inside_call() {
        let mut f = Factory::new();
        let (a, one, two) = (f.symbol("a"), f.constant(1), f.constant(2));
        let inner = f.binary("+", one, a);
        let sum = f.binary("+", inner, two);
        let root = f.call("A", vec![sum]);
        assert_eq!(folded(&AssociativeFolding::new(), root, &mut f), "A((a + 3))");
    }

    #[test]
    fn test_flatten_zero_sum_kept() {
        let mut f = Factory::new();
        let (a, one) = (f.symbol("a"), f.constant(1));
        let inner = f.binary("+", a, one.clone());
        let mut root = f.binary("-", inner, one);
        assert!(apply(&AssociativeFolding::new(), &mut root, &mut f));
        assert_eq!(root.to_string(), "(a + 0)");
    }

    #[test]
    fn test_flatten_intermediate_overflow() {
        // The running total passes MAX but the final sum fits.
        let mut f = Factory::new();
        let (a, max, one) = (f.symbol("a"), f.constant(Value::MAX), f.constant(1));
        let inner = f.binary("+", a, max);
        let over = f.binary("+", inner, one.clone());
        let mut root = f.binary("-", over, one);
        assert!(apply(&AssociativeFolding::new(), &mut root, &mut f));
        assert_eq!(root.to_string(), format!("(a + {})", Value::MAX));
    }

    #[test]
    fn test_flatten_final_overflow_kept() {
        let mut f = Factory::new();
        let (a, max, one) = (f.symbol("a"), f.constant(Value::MAX), f.constant(1));
        let inner = f.binary("+", a, max);
        let mut root = f.binary("+", inner, one);
        assert!(!apply(&AssociativeFolding::new(), &mut root, &mut f));
        assert_eq!(root.to_string(), format!("((a + {}) + 1)", Value::MAX));
    }

    #[test]
    fn test_flatten_canonical_layouts_unchanged() {
        let mut f = Factory::new();
        let (a, b, zero, five) = (f.symbol("a"), f.symbol("b"), f.constant(0), f.constant(5));
        let min = f.constant(Value::MIN);
        let g = f.call("g", vec![b.clone()]);
        let rule = AssociativeFolding::new();

        let sum = f.binary("+", a.clone(), g);
        let diff = f.binary("-", sum, b.clone());
        let with_five = f.binary("-", diff.clone(), five.clone());
        let zero_base = f.binary("-", zero, a.clone());
        let with_min = f.binary("+", a.clone(), min);
        for mut root in [diff, with_five, zero_base, with_min] {
            let before = Rc::clone(&root);
            assert!(!apply(&rule, &mut root, &mut f), "{}", root);
            assert!(Rc::ptr_eq(&before, &root));
        }

        // Right-nested and misordered chains are not canonical.
        let nested = f.binary("+", b.clone(), five.clone());
        let right_nested = f.binary("+", a.clone(), nested);
        let leading = f.binary("+", five, a);
        assert_eq!(folded(&rule, right_nested, &mut f), "((a + b) + 5)");
        assert_eq!(folded(&rule, leading, &mut f), "(a + 5)");
    }

    #[test]
    fn test_flatten_deep_chain() {
        let mut f = Factory::new();
        let x = f.symbol("x");
        let mut chain = Rc::clone(&x);
        for _ in 0..10_000 {
            chain = f.binary("+", chain, Rc::clone(&x));
        }
        let rule = AssociativeFolding::new();
        let mut root = Rc::clone(&chain);
        assert!(!apply(&rule, &mut root, &mut f));
        assert!(Rc::ptr_eq(&chain, &root));

        // A leading constant moves to the end of the whole chain.
        let one = f.constant(1);
        let mut root = f.binary("+", one, chain);
        assert!(apply(&rule, &mut root, &mut f));
        let Expr::Operator(name, args) = root.as_ref() else {
            panic!("expected operator, got {:?}", root.kind());
        };
        assert_eq!(name, "+");
        assert_eq!(*args[1], Expr::Constant(1));

        let mut links = 0;
        let mut node = &root;
        while let Expr::Operator(_, args) = node.as_ref() {
            links += 1;
            node = &args[0];
        }
        assert_eq!(links, 10_001);
        assert!(!apply(&rule, &mut root, &mut f));
    }

    // SymbolSubstitution tests
    #[test]
    fn test_substitute_bound_symbol() {
        let mut f = Factory::new();
        let (x, y) = (f.symbol("x"), f.symbol("y"));
        let root = f.binary("+", x, y);
        let two = f.constant(2);
        let rule = SymbolSubstitution::new().with("x", two);
        assert_eq!(folded(&rule, root, &mut f), "(2 + y)");
    }

    #[test]
    fn test_substitute_expression() {
        let mut f = Factory::new();
        let (x, a, one) = (f.symbol("x"), f.symbol("a"), f.constant(1));
        let root = f.call("g", vec![x.clone(), x]);
        let replacement = f.binary("+", a, one);
        let rule = SymbolSubstitution::new().with("x", replacement);
        assert_eq!(folded(&rule, root, &mut f), "g((a + 1), (a + 1))");
    }

    #[test]
    fn test_substitute_not_recursive() {
        let mut f = Factory::new();
        let x = f.symbol("x");
        let mut root = x.clone();
        let one = f.constant(1);
        let replacement = f.binary("+", x, one);
        let rule = SymbolSubstitution::new().with("x", replacement);
        assert!(apply(&rule, &mut root, &mut f));
        assert_eq!(root.to_string(), "(x + 1)");
    }

    #[test]
    fn test_substitute_self_binding_is_no_change() {
        let mut f = Factory::new();
        let x = f.symbol("x");
        let mut root = x.clone();
        let rule = SymbolSubstitution::new().with("x", x);
        assert!(!apply(&rule, &mut root, &mut f));
    }

    #[test]
    fn test_substitute_rebind() {
        let mut f = Factory::new();
        let (one, two) = (f.constant(1), f.constant(2));
        let mut rule = SymbolSubstitution::new();
        rule.bind("x", one).bind("x", two.clone());
        assert_eq!(rule.get("x"), Some(&two));
        assert!(rule.get("y").is_none());
    }
}
