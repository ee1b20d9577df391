//! Static operator metadata.
//!
//! | Operator | Group          | Precedence | Commutativity    |
//! |----------|----------------|------------|------------------|
//! | `+`      | additive       | 0          | commutative      |
//! | `-`      | additive       | 0          | anti-commutative |
//! | `*`      | multiplicative | 1          | commutative      |
//! | `/`      | multiplicative | 1          | anti-commutative |
//! | `%`      | ungrouped      | 3          | non-commutative  |

/// Algebraic group an operator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericGroup {
    Ungrouped,
    Additive,
    Multiplicative,
}

/// How an operator behaves when its operands are swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commutativity {
    NonCommutative,
    /// `a op b = b op a`
    Commutative,
    /// `a op b = inv(b op a)`
    AntiCommutative,
}

/// Metadata for one operator name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub group: NumericGroup,
    pub precedence: i32,
    pub commutativity: Commutativity,
}

/// All known operators.
pub static OPERATORS: [OperatorInfo; 5] = [
    OperatorInfo {
        name: "+",
        group: NumericGroup::Additive,
        precedence: 0,
        commutativity: Commutativity::Commutative,
    },
    OperatorInfo {
        name: "-",
        group: NumericGroup::Additive,
        precedence: 0,
        commutativity: Commutativity::AntiCommutative,
    },
    OperatorInfo {
        name: "*",
        group: NumericGroup::Multiplicative,
        precedence: 1,
        commutativity: Commutativity::Commutative,
    },
    OperatorInfo {
        name: "/",
        group: NumericGroup::Multiplicative,
        precedence: 1,
        commutativity: Commutativity::AntiCommutative,
    },
    OperatorInfo {
        name: "%",
        group: NumericGroup::Ungrouped,
        precedence: 3,
        commutativity: Commutativity::NonCommutative,
    },
];

/// Looks up the metadata for an operator name.
pub fn lookup(name: &str) -> Option<&'static OperatorInfo> {
    OPERATORS.iter().find(|info| info.name == name)
}
