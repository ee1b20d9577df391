//! # calg-core
//!
//! Small term-rewriting engine over symbolic integer expressions.
//!
//! Expressions are immutable trees of [`Expr`] nodes shared through [`ExprRef`]
//! handles. Rewrite rules ([`rewrite::Rule`]) are pure functions from one node
//! to an optional replacement; the [`rewrite::rewrite_bottom_up`] engine applies
//! a rule across a whole tree, and the [`eval::Evaluator`] sequences rules into
//! passes until a pass changes nothing.
//!
//! The bundled rules evaluate Ackermann's function purely by symbolic
//! unfolding: a call `A(x, y)` is expanded according to its recurrence,
//! constant subexpressions are folded, and additive chains are flattened.
//!
//! ## Features
//!
//! | Feature      | Description |
//! |--------------|-------------|
//! | `introspect` | Tree introspection (`free_symbols`, `node_count`, `depth`) and [`ExprHasher`] - **enabled by default** |
//! | `frontend`   | Builder functions and `+`/`-` overloading in [`frontend`] - **enabled by default** |
//!
//! ## Example
//!
//! ```
//! use rhizome_calg_core::{evaluate, Outcome};
//!
//! assert_eq!(evaluate(2, 3), Outcome::Reduced(9));
//! ```
//!
//! ### Building and rewriting a tree
//!
//! ```
//! use rhizome_calg_core::{Factory, Outcome};
//! use rhizome_calg_core::eval::Evaluator;
//!
//! let mut factory = Factory::new();
//! let a = factory.symbol("a");
//! let one = factory.constant(1);
//! let two = factory.constant(2);
//! let inner = factory.binary("+", a, one);
//! let root = factory.binary("+", inner, two);
//!
//! let mut evaluator = Evaluator::standard();
//! match evaluator.evaluate(root) {
//!     Outcome::NotReduced(residual) => assert_eq!(residual.to_string(), "(a + 3)"),
//!     Outcome::Reduced(_) => panic!("free symbol cannot reduce"),
//! }
//! ```

#[cfg(feature = "introspect")]
use std::collections::HashSet;
#[cfg(feature = "introspect")]
use std::collections::hash_map::DefaultHasher;
#[cfg(feature = "introspect")]
use std::hash::{Hash, Hasher};
use std::rc::Rc;

pub mod eval;
pub mod factory;
#[cfg(feature = "frontend")]
pub mod frontend;
pub mod matcher;
pub mod operators;
pub mod rewrite;
pub mod rules;

pub use eval::{Evaluator, evaluate, standard_rules};
pub use factory::Factory;
pub use matcher::Pattern;
pub use rewrite::Rule;

// ============================================================================
// Expression model
// ============================================================================

/// Integer payload of a [`Expr::Constant`] node.
pub type Value = i64;

/// Shared handle to an immutable expression node.
///
/// Subtrees are never mutated in place, so the same handle may appear at
/// several positions of a tree (interned constants, children reused by a
/// replacement). Equality on handles is structural.
pub type ExprRef = Rc<Expr>;

/// An expression node.
///
/// Equality is always structural: two constants with the same value are equal
/// regardless of whether they are the same allocation.
///
/// # Example
///
/// ```
/// use rhizome_calg_core::{Expr, Kind};
/// use std::rc::Rc;
///
/// let sum = Expr::Operator("+".into(), vec![Rc::new(Expr::Symbol("x".into())), Rc::new(Expr::Constant(1))]);
/// assert_eq!(sum.kind(), Kind::Operator);
/// assert_eq!(sum.to_string(), "(x + 1)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal.
    Constant(Value),
    /// Free identifier.
    Symbol(String),
    /// Function application: `name(arg1, arg2, ...)`.
    Call(String, Vec<ExprRef>),
    /// Operator application, displayed infix (arity 2) or prefix (arity 1).
    Operator(String, Vec<ExprRef>),
}

/// Kind tag of an [`Expr`].
///
/// The derived ordering (`Constant < Symbol < Call < Operator`) is the leaf
/// order used when canonicalizing additive chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Constant,
    Symbol,
    Call,
    Operator,
}

impl Kind {
    /// Whether nodes of this kind never have children.
    pub fn is_terminal(self) -> bool {
        matches!(self, Kind::Constant | Kind::Symbol)
    }
}

impl Expr {
    /// Returns the kind tag of this node.
    pub fn kind(&self) -> Kind {
        match self {
            Expr::Constant(_) => Kind::Constant,
            Expr::Symbol(_) => Kind::Symbol,
            Expr::Call(..) => Kind::Call,
            Expr::Operator(..) => Kind::Operator,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Children of a call or operator; empty for terminals.
    pub fn args(&self) -> &[ExprRef] {
        match self {
            Expr::Call(_, args) | Expr::Operator(_, args) => args.as_slice(),
            Expr::Constant(_) | Expr::Symbol(_) => &[],
        }
    }

    /// Name of a symbol, call or operator.
    pub fn name(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) | Expr::Call(name, _) | Expr::Operator(name, _) => Some(name.as_str()),
            Expr::Constant(_) => None,
        }
    }

    /// Value of a constant node.
    pub fn as_constant(&self) -> Option<Value> {
        match self {
            Expr::Constant(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns a node of the same kind and name with `args` as its children.
    ///
    /// Terminals have no children and are returned unchanged.
    pub fn with_args(&self, args: Vec<ExprRef>) -> Expr {
        match self {
            Expr::Call(name, _) => Expr::Call(name.clone(), args),
            Expr::Operator(name, _) => Expr::Operator(name.clone(), args),
            Expr::Constant(_) | Expr::Symbol(_) => self.clone(),
        }
    }
}

// Children are released iteratively so dropping a deep tree does not recurse.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = match self {
            Expr::Call(_, args) | Expr::Operator(_, args) => std::mem::take(args),
            Expr::Constant(_) | Expr::Symbol(_) => return,
        };
        while let Some(child) = pending.pop() {
            if let Ok(mut expr) = Rc::try_unwrap(child) {
                if let Expr::Call(_, args) | Expr::Operator(_, args) = &mut expr {
                    pending.append(args);
                }
            }
        }
    }
}

// ============================================================================
// Display (diagnostics only, not a parseable format)
// ============================================================================

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Operator(op, args) if args.len() == 2 => {
                write!(f, "({} {} {})", args[0], op, args[1])
            }
            Expr::Operator(op, args) if args.len() == 1 => write!(f, "({}{})", op, args[0]),
            Expr::Call(name, args) | Expr::Operator(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Constant => write!(f, "constant"),
            Kind::Symbol => write!(f, "symbol"),
            Kind::Call => write!(f, "call"),
            Kind::Operator => write!(f, "operator"),
        }
    }
}

// ============================================================================
// Outcomes and errors
// ============================================================================

/// Result of running a pipeline to its fixed point.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The root reduced to a single constant.
    Reduced(Value),
    /// The pipeline converged but the root is not a constant.
    NotReduced(ExprRef),
}

impl Outcome {
    /// Classifies a converged tree.
    pub fn from_root(root: ExprRef) -> Self {
        match root.as_constant() {
            Some(value) => Outcome::Reduced(value),
            None => Outcome::NotReduced(root),
        }
    }

    pub fn is_reduced(&self) -> bool {
        matches!(self, Outcome::Reduced(_))
    }

    /// Converts into a `Result`, for callers that propagate with `?`.
    pub fn value(self) -> Result<Value, EvalError> {
        match self {
            Outcome::Reduced(value) => Ok(value),
            Outcome::NotReduced(residual) => Err(EvalError::NotReduced(residual.to_string())),
        }
    }
}

/// Evaluation error.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The tree converged without reducing to a constant; holds the rendered residual.
    NotReduced(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::NotReduced(residual) => {
                write!(f, "expression did not reduce to a constant: {}", residual)
            }
        }
    }
}

impl std::error::Error for EvalError {}

// ============================================================================
// Introspection (introspect feature)
// ============================================================================

#[cfg(feature = "introspect")]
impl Expr {
    /// Returns the names of all symbols in this tree.
    ///
    /// ```
    /// use rhizome_calg_core::frontend::{call, symbol};
    ///
    /// let expr = (call("f", [symbol("x")]) + "y").build();
    /// let names = expr.free_symbols();
    /// assert!(names.contains("x"));
    /// assert!(names.contains("y"));
    /// ```
    pub fn free_symbols(&self) -> HashSet<&str> {
        let mut names = HashSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Expr::Symbol(name) = node {
                names.insert(name.as_str());
            }
            stack.extend(node.args().iter().map(|arg| arg.as_ref()));
        }
        names
    }

    /// Number of node positions in this tree (shared subtrees count once per position).
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.args().iter().map(|arg| arg.as_ref()));
        }
        count
    }

    /// Length of the longest root-to-leaf path, counting nodes.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.args().iter().map(|arg| (arg.as_ref(), depth + 1)));
        }
        deepest
    }
}

/// Hashing of expression trees at three granularities.
///
/// - [`ExprHasher::hash`]: full structure, `1 + 2` and `1 + 2` agree.
/// - [`ExprHasher::shape_hash`]: kind, plus name and arity for calls and
///   operators, so `f(x)` and `f(2 + 3)` agree.
/// - [`ExprHasher::value_hash`]: payloads only (values, names), without kinds.
///
/// ```
/// use rhizome_calg_core::ExprHasher;
/// use rhizome_calg_core::frontend::{call, constant, symbol};
///
/// let fx = call("f", [symbol("x")]).build();
/// let f_sum = call("f", [constant(2) + 3]).build();
/// assert_eq!(ExprHasher::shape_hash(&fx), ExprHasher::shape_hash(&f_sum));
/// assert_ne!(ExprHasher::hash(&fx), ExprHasher::hash(&f_sum));
/// ```
#[cfg(feature = "introspect")]
pub struct ExprHasher;

#[cfg(feature = "introspect")]
impl ExprHasher {
    pub fn hash(expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        Self::shape_into(expr, &mut hasher);
        Self::value_into(expr, &mut hasher);
        hasher.finish()
    }

    pub fn shape_hash(expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        Self::shape_into(expr, &mut hasher);
        hasher.finish()
    }

    pub fn value_hash(expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        Self::value_into(expr, &mut hasher);
        hasher.finish()
    }

    fn shape_into(expr: &Expr, hasher: &mut DefaultHasher) {
        expr.kind().hash(hasher);
        if let Expr::Call(name, args) | Expr::Operator(name, args) = expr {
            name.hash(hasher);
            args.len().hash(hasher);
        }
    }

    fn value_into(expr: &Expr, hasher: &mut DefaultHasher) {
        match expr {
            Expr::Constant(value) => value.hash(hasher),
            Expr::Symbol(name) => name.hash(hasher),
            Expr::Call(name, args) | Expr::Operator(name, args) => {
                name.hash(hasher);
                for arg in args {
                    // Children contribute their full structure.
                    Self::shape_into(arg, hasher);
                    Self::value_into(arg, hasher);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
