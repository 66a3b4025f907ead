//! Execution state of the symbolic interpreter.
//!
//! An [`ExecutionState`] holds everything one execution path knows: the symbolic value of
//! every declared variable, the namespace stack, the condition under which the path is
//! taken, and the [`ReachabilityMap`] of program points visited so far.
//!
//! Branches fork the state with `clone()`, which is O(1) thanks to `imbl` persistent
//! maps, and join it again with [`ExecutionState::merge`], which turns every diverging
//! binding into a multiplexer over the branch condition.
//!
//! # Example
//!
//! ```rust
//! use p4reach::expr::{Expr, SymbolicVariable};
//! use p4reach::ir::{Path, Type};
//! use p4reach::state::{ExecutionState, VariableInit};
//!
//! let x = Path::new("meta.x");
//! let mut state = ExecutionState::new();
//! state.declare_variable(&x, &Type::bits(8), VariableInit::Zero);
//!
//! let hit = Expr::variable(SymbolicVariable::table_active("fwd"));
//! let mut taken = state.clone();
//! taken.push_execution_condition(&hit);
//! taken.set(&x, Expr::bits(1, 8))?;
//! state.merge(&taken, None);
//!
//! assert_eq!(state.get(&x)?, Expr::mux(hit, Expr::bits(1, 8), Expr::bits(0, 8)));
//! # Ok::<(), p4reach::Error>(())
//! ```

mod execution;
mod reachability;

pub use execution::{ExecutionState, VariableInit};
pub use reachability::{ProgramPoint, ReachabilityMap};
