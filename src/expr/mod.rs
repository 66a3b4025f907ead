//! Symbolic expressions over control-plane and data-plane variables.
//!
//! Every branch condition, table hit condition and reachability formula produced by the
//! interpreter is an [`Expr`]: an immutable, reference-counted tree of literals,
//! [`SymbolicVariable`]s and operators. The substitution engine later replaces
//! control-plane variables by their configured values and asks the [`Simplifier`] whether
//! the result is decided.
//!
//! # Module Structure
//!
//! - [`ops`] - Operator types ([`UnaryOp`], [`BinaryOp`])
//! - [`value`] - Concrete values and types ([`Literal`], [`ValueType`])
//! - [`variable`] - Symbolic variables ([`SymbolicVariable`], [`VariableRole`])
//! - [`node`] - The shared expression tree ([`Expr`], [`ExprKind`])
//! - [`simplify`] - Constant folding and algebraic identities ([`Simplifier`])
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use p4reach::expr::{Expr, SymbolicVariable, ValueType};
//!
//! let key = SymbolicVariable::table_key("fwd", "port", ValueType::bits(9));
//! let field = SymbolicVariable::input("standard_metadata.ingress_port", ValueType::bits(9));
//! let hit = Expr::eq(Expr::variable(field.clone()), Expr::variable(key.clone()));
//!
//! let mut assignments = BTreeMap::new();
//! assignments.insert(key, Expr::bits(1, 9));
//! assignments.insert(field, Expr::bits(1, 9));
//! assert_eq!(hit.fold(&assignments), Expr::bool(true));
//! ```

pub mod node;
pub mod ops;
pub mod simplify;
pub mod value;
pub mod variable;

pub use node::{Expr, ExprKind};
pub use ops::{BinaryOp, UnaryOp};
pub use simplify::Simplifier;
pub use value::{evaluate_binary, evaluate_unary, width_mask, Literal, ValueType};
pub use variable::{SymbolicVariable, VariableRole};
