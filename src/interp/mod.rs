//! The symbolic interpreter.
//!
//! The interpreter walks a typed [`Program`] once, without any control-plane
//! configuration, and records for every conditional program point the formula under
//! which it is reached. Unknown configuration is represented by [`SymbolicVariable`]s;
//! branches fork the [`ExecutionState`] and join it again with multiplexers.
//!
//! # Architecture
//!
//! - [`stepper`] - Statements, controls and action invocations ([`Stepper`])
//! - [`parser`] - Parser states and select transitions
//! - [`resolver`] - Expressions and method calls ([`ExpressionResolver`])
//! - [`table`] - Match-action tables ([`TableExecutor`], [`TableResult`])
//! - [`match_kind`] - Key match encodings ([`MatchKindHandler`], [`MatchKindRegistry`])
//! - [`target`] - Architectures and externs ([`Target`], [`V1Model`])
//! - [`analysis`] - The whole-program driver ([`run_analysis`])
//!
//! Every component receives an [`AnalysisContext`] bundling the program, the target, the
//! configuration and the event log. Nothing is global.
//!
//! [`SymbolicVariable`]: crate::expr::SymbolicVariable
//! [`ExecutionState`]: crate::state::ExecutionState

use std::fmt;

use crate::{config::AnalysisConfig, events::EventLog, ir::Program};

pub mod analysis;
pub mod match_kind;
pub mod parser;
pub mod resolver;
pub mod stepper;
pub mod table;
pub mod target;

pub use analysis::{run_analysis, AnalysisResult};
pub use match_kind::{CoreMatchKind, KeyAssignment, MatchKindHandler, MatchKindRegistry};
pub use resolver::ExpressionResolver;
pub use stepper::Stepper;
pub use table::{TableExecutor, TableResult};
pub use target::{ArchBlock, ArchSpec, Target, V1Model};

/// Everything the interpreter components share during one analysis run.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// The analyzed program.
    pub program: &'a Program,
    /// The target the program runs on.
    pub target: &'a dyn Target,
    /// Analysis settings.
    pub config: &'a AnalysisConfig,
    /// Sink for diagnostics.
    pub events: &'a EventLog,
}

impl<'a> AnalysisContext<'a> {
    /// Bundles the inputs of an analysis run.
    #[must_use]
    pub fn new(
        program: &'a Program,
        target: &'a dyn Target,
        config: &'a AnalysisConfig,
        events: &'a EventLog,
    ) -> Self {
        Self {
            program,
            target,
            config,
            events,
        }
    }
}

impl fmt::Debug for AnalysisContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("target", &self.target.name())
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}
