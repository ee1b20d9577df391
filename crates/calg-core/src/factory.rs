//! Node construction.
//!
//! A [`Factory`] interns constants so that repeated values share one
//! allocation. The cache belongs to the factory instance: each evaluation owns
//! its own factory, and nothing is global.

use std::collections::HashMap;
use std::rc::Rc;

use crate::{Expr, ExprRef, Value};

/// Constructs expression nodes, interning constant values.
///
/// # Example
///
/// ```
/// use rhizome_calg_core::Factory;
/// use std::rc::Rc;
///
/// let mut factory = Factory::new();
/// let a = factory.constant(1);
/// let b = factory.constant(1);
/// assert!(Rc::ptr_eq(&a, &b));
///
/// let sum = factory.binary("+", a, b);
/// assert_eq!(sum.to_string(), "(1 + 1)");
/// ```
#[derive(Debug, Default)]
pub struct Factory {
    constants: HashMap<Value, ExprRef>,
}

impl Factory {
    /// Creates a factory with an empty constant cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interned constant node for `value`.
    pub fn constant(&mut self, value: Value) -> ExprRef {
        Rc::clone(
            self.constants
                .entry(value)
                .or_insert_with(|| Rc::new(Expr::Constant(value))),
        )
    }

    pub fn symbol(&self, name: impl Into<String>) -> ExprRef {
        Rc::new(Expr::Symbol(name.into()))
    }

    pub fn call(&self, name: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Call(name.into(), args))
    }

    pub fn operator(&self, name: impl Into<String>, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Operator(name.into(), args))
    }

    /// Binary operator application `left name right`.
    pub fn binary(&self, name: impl Into<String>, left: ExprRef, right: ExprRef) -> ExprRef {
        self.operator(name, vec![left, right])
    }

    /// Number of distinct constant values cached so far.
    pub fn interned_count(&self) -> usize {
        self.constants.len()
    }
}
