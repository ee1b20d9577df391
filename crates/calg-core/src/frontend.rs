//! Builder syntax for expressions (requires `frontend` feature).
//!
//! [`Builder`] wraps an [`ExprRef`] and overloads `+` and `-`, so trees can be
//! written close to their infix form. Integers become constants and string
//! slices become symbols.
//!
//! ```
//! use rhizome_calg_core::frontend::{call, constant, symbol};
//!
//! let expr = call("A", [constant(2), symbol("n") - 1]) + "m";
//! assert_eq!(expr.to_string(), "(A(2, (n - 1)) + m)");
//! ```
//!
//! Builders allocate nodes directly; constants built here are not interned.

use std::ops::{Add, Sub};
use std::rc::Rc;

use crate::{Expr, ExprRef, Value};

/// An expression under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Builder(ExprRef);

impl Builder {
    /// Finishes construction.
    pub fn build(self) -> ExprRef {
        self.0
    }

    /// Borrows the expression built so far.
    pub fn expr(&self) -> &ExprRef {
        &self.0
    }
}

impl std::fmt::Display for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ExprRef> for Builder {
    fn from(expr: ExprRef) -> Self {
        Builder(expr)
    }
}

impl From<Value> for Builder {
    fn from(value: Value) -> Self {
        constant(value)
    }
}

impl From<i32> for Builder {
    fn from(value: i32) -> Self {
        constant(Value::from(value))
    }
}

impl From<&str> for Builder {
    fn from(name: &str) -> Self {
        symbol(name)
    }
}

impl From<Builder> for ExprRef {
    fn from(builder: Builder) -> Self {
        builder.0
    }
}

pub fn constant(value: Value) -> Builder {
    Builder(Rc::new(Expr::Constant(value)))
}

pub fn symbol(name: impl Into<String>) -> Builder {
    Builder(Rc::new(Expr::Symbol(name.into())))
}

/// `name(args...)`
pub fn call<A: Into<Builder>>(name: impl Into<String>, args: impl IntoIterator<Item = A>) -> Builder {
    let args = args.into_iter().map(|arg| arg.into().0).collect();
    Builder(Rc::new(Expr::Call(name.into(), args)))
}

/// Operator `name` applied to `args`; infix for two operands, prefix for one.
pub fn op<A: Into<Builder>>(name: impl Into<String>, args: impl IntoIterator<Item = A>) -> Builder {
    let args = args.into_iter().map(|arg| arg.into().0).collect();
    Builder(Rc::new(Expr::Operator(name.into(), args)))
}

impl<R: Into<Builder>> Add<R> for Builder {
    type Output = Builder;

    fn add(self, rhs: R) -> Builder {
        op("+", [self, rhs.into()])
    }
}

impl<R: Into<Builder>> Sub<R> for Builder {
    type Output = Builder;

    fn sub(self, rhs: R) -> Builder {
        op("-", [self, rhs.into()])
    }
}
