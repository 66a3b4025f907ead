//! # p4reach Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the p4reach library: everything needed to run an analysis, build and update a
//! control-plane configuration and query the folded results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all p4reach operations
pub use crate::Error;

/// The result type used throughout p4reach
pub use crate::Result;

/// Structured description of a rejected control-plane record
pub use crate::ControlPlaneError;

/// Analysis settings
pub use crate::config::AnalysisConfig;

/// Diagnostics sink
pub use crate::events::{Event, EventKind, EventLog, EventStage};

// ================================================================================================
// Expressions
// ================================================================================================

/// Symbolic expressions and values
pub use crate::expr::{Expr, Literal, SymbolicVariable, ValueType};

// ================================================================================================
// Program Tree and Interpreter
// ================================================================================================

/// The typed program tree
pub use crate::ir::Program;

/// Whole-program analysis and targets
pub use crate::interp::{run_analysis, AnalysisResult, MatchKindHandler, Target, V1Model};

/// Execution state and program points
pub use crate::state::{ExecutionState, ProgramPoint, ReachabilityMap};

// ================================================================================================
// Control Plane and Substitution
// ================================================================================================

/// Control-plane configuration
pub use crate::control_plane::{
    apply_updates, ControlPlaneConstraints, ControlPlaneItem, ControlPlaneObject,
    ControlPlaneStateInitializer, Entity, FieldMatch, TableConfiguration, TableEntryRecord,
    UpdateKind,
};

/// Incremental folding
pub use crate::substitution::SubstitutionMap;
