//! Structural patterns over expressions.
//!
//! A [`Pattern`] is a side-effect-free predicate on the shape of an [`Expr`].
//! Patterns compose through the constructor functions in this module:
//!
//! ```
//! use rhizome_calg_core::Factory;
//! use rhizome_calg_core::matcher::{any, call_with, constant, constant_eq};
//!
//! let mut factory = Factory::new();
//! let zero = factory.constant(0);
//! let x = factory.symbol("x");
//! let expr = factory.call("A", vec![zero, x]);
//!
//! assert!(call_with("A", [constant_eq(0), any()]).matches(&expr));
//! assert!(!call_with("A", [constant(), constant()]).matches(&expr));
//! ```
//!
//! Operator and call patterns are kind-exclusive: [`op`] never matches a
//! [`Expr::Call`] and [`call`] never matches an [`Expr::Operator`], even though
//! both carry a name and children.

use crate::{Expr, Value};

/// A composable shape predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Matches every node.
    Any,
    /// Matches a constant, optionally with an exact value.
    Constant(Option<Value>),
    /// Matches a symbol, optionally with an exact name.
    Symbol(Option<String>),
    /// Matches a call. `args`, when present, fixes the arity and constrains
    /// each child positionally.
    Call {
        name: Option<String>,
        args: Option<Vec<Pattern>>,
    },
    /// Matches a binary operator.
    Operator {
        name: Option<String>,
        left: Box<Pattern>,
        right: Box<Pattern>,
    },
    /// Matches if either side matches.
    Either(Box<Pattern>, Box<Pattern>),
}

impl Pattern {
    /// Tests `expr` against this pattern.
    pub fn matches(&self, expr: &Expr) -> bool {
        match (self, expr) {
            (Pattern::Any, _) => true,
            (Pattern::Constant(expected), Expr::Constant(value)) => {
                expected.is_none_or(|expected| expected == *value)
            }
            (Pattern::Symbol(expected), Expr::Symbol(name)) => {
                expected.as_deref().is_none_or(|expected| expected == name.as_str())
            }
            (Pattern::Call { name, args }, Expr::Call(call_name, call_args)) => {
                if name.as_deref().is_some_and(|name| name != call_name.as_str()) {
                    return false;
                }
                match args {
                    None => true,
                    Some(patterns) => {
                        patterns.len() == call_args.len()
                            && patterns
                                .iter()
                                .zip(call_args)
                                .all(|(pattern, arg)| pattern.matches(arg))
                    }
                }
            }
            (Pattern::Operator { name, left, right }, Expr::Operator(op_name, op_args)) => {
                if name.as_deref().is_some_and(|name| name != op_name.as_str()) {
                    return false;
                }
                match op_args.as_slice() {
                    [l, r] => left.matches(l) && right.matches(r),
                    _ => false,
                }
            }
            (Pattern::Either(first, second), _) => first.matches(expr) || second.matches(expr),
            _ => false,
        }
    }

    /// Combines two patterns with [`either`].
    pub fn or(self, other: Pattern) -> Pattern {
        either(self, other)
    }
}

/// Matches everything.
pub fn any() -> Pattern {
    Pattern::Any
}

/// Matches any constant.
pub fn constant() -> Pattern {
    Pattern::Constant(None)
}

/// Matches a constant holding exactly `value`.
pub fn constant_eq(value: Value) -> Pattern {
    Pattern::Constant(Some(value))
}

/// Matches any symbol.
pub fn symbol() -> Pattern {
    Pattern::Symbol(None)
}

/// Matches a symbol named exactly `name`.
pub fn symbol_named(name: impl Into<String>) -> Pattern {
    Pattern::Symbol(Some(name.into()))
}

/// Matches any call.
pub fn call() -> Pattern {
    Pattern::Call {
        name: None,
        args: None,
    }
}

/// Matches a call named `name` with any arguments.
pub fn call_named(name: impl Into<String>) -> Pattern {
    Pattern::Call {
        name: Some(name.into()),
        args: None,
    }
}

/// Matches a call named `name` whose arguments match `args` positionally.
pub fn call_with(name: impl Into<String>, args: impl IntoIterator<Item = Pattern>) -> Pattern {
    Pattern::Call {
        name: Some(name.into()),
        args: Some(args.into_iter().collect()),
    }
}

/// Matches any binary operator whose operands match `left` and `right`.
pub fn op(left: Pattern, right: Pattern) -> Pattern {
    Pattern::Operator {
        name: None,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Matches the binary operator `name` with operands matching `left` and `right`.
pub fn op_named(name: impl Into<String>, left: Pattern, right: Pattern) -> Pattern {
    Pattern::Operator {
        name: Some(name.into()),
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Matches if `first` or `second` matches.
pub fn either(first: Pattern, second: Pattern) -> Pattern {
    Pattern::Either(Box::new(first), Box::new(second))
}
