//! Operator types of symbolic expressions.
//!
//! This module defines [`UnaryOp`] and [`BinaryOp`], the operators supported in
//! symbolic expressions. They mirror the P4 expression operators that can appear in
//! branch conditions, key expressions and assignments.
//!
//! Operators are categorized as:
//! - **Arithmetic**: Add, Sub, Mul, Neg (modulo the bit width)
//! - **Bitwise**: BAnd, BOr, BXor, Cmpl, Shl, Shr
//! - **Comparison**: Eq, Ne, Lt, Le, Gt, Ge (signedness follows the operand type)
//! - **Logical**: LAnd, LOr, LNot

use strum::Display;

/// A unary operator in an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum UnaryOp {
    /// Logical negation of a boolean.
    #[strum(serialize = "!")]
    LNot,
    /// Bitwise complement of a bit vector.
    #[strum(serialize = "~")]
    Cmpl,
    /// Two's complement negation of a bit vector.
    #[strum(serialize = "-")]
    Neg,
}

/// A binary operator in an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum BinaryOp {
    // Arithmetic operations
    /// Addition.
    #[strum(serialize = "+")]
    Add,
    /// Subtraction.
    #[strum(serialize = "-")]
    Sub,
    /// Multiplication.
    #[strum(serialize = "*")]
    Mul,

    // Bitwise operations
    /// Bitwise AND.
    #[strum(serialize = "&")]
    BAnd,
    /// Bitwise OR.
    #[strum(serialize = "|")]
    BOr,
    /// Bitwise XOR.
    #[strum(serialize = "^")]
    BXor,
    /// Shift left.
    #[strum(serialize = "<<")]
    Shl,
    /// Shift right (arithmetic for signed operands, logical otherwise).
    #[strum(serialize = ">>")]
    Shr,

    // Comparison operations (return a boolean)
    /// Equal.
    #[strum(serialize = "==")]
    Eq,
    /// Not equal.
    #[strum(serialize = "!=")]
    Ne,
    /// Less than.
    #[strum(serialize = "<")]
    Lt,
    /// Less than or equal.
    #[strum(serialize = "<=")]
    Le,
    /// Greater than.
    #[strum(serialize = ">")]
    Gt,
    /// Greater than or equal.
    #[strum(serialize = ">=")]
    Ge,

    // Logical operations
    /// Logical AND.
    #[strum(serialize = "&&")]
    LAnd,
    /// Logical OR.
    #[strum(serialize = "||")]
    LOr,
}

impl BinaryOp {
    /// Checks if this operation is commutative.
    ///
    /// # Returns
    ///
    /// `true` if `a op b == b op a` holds for all operands.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::BAnd
                | Self::BOr
                | Self::BXor
                | Self::Eq
                | Self::Ne
                | Self::LAnd
                | Self::LOr
        )
    }

    /// Checks if this operation is a comparison.
    ///
    /// # Returns
    ///
    /// `true` for Eq, Ne, Lt, Le, Gt and Ge.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Checks if this operation is a logical connective.
    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::LAnd | Self::LOr)
    }

    /// Checks if this operation produces a boolean.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        self.is_comparison() || self.is_logical()
    }
}
