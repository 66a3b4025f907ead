//! Configuration for the symbolic analysis.
//!
//! This module provides [`AnalysisConfig`], which bounds parser exploration and selects
//! how eagerly the interpreter folds the formulas it builds.

/// Configuration for one analysis run.
///
/// The configuration is passed by reference to every interpreter component through the
/// analysis context; there is no global instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Maximum number of parser state transitions followed on one path (default: 64).
    ///
    /// Parsers may loop (header stacks, option parsing). A path that reaches the bound
    /// stops with a warning event and is treated as rejected.
    pub max_parser_depth: usize,

    /// Simplify every resolved expression before it is bound or recorded (default: true).
    ///
    /// Disabling this keeps formulas exactly as built, which is useful when inspecting
    /// the encoding of a table or match kind.
    pub fold_intermediate: bool,

    /// Record a reachability point for every action of every table (default: true).
    pub record_table_actions: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_parser_depth: 64,
            fold_intermediate: true,
            record_table_actions: true,
        }
    }
}

impl AnalysisConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `AnalysisConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that keeps every formula unfolded.
    ///
    /// # Returns
    ///
    /// A new `AnalysisConfig` with intermediate folding disabled.
    #[must_use]
    pub fn unfolded() -> Self {
        Self {
            fold_intermediate: false,
            ..Self::default()
        }
    }

    /// Sets the maximum parser exploration depth.
    ///
    /// # Arguments
    ///
    /// * `depth` - The maximum number of transitions on one path.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_parser_depth(mut self, depth: usize) -> Self {
        self.max_parser_depth = depth;
        self
    }

    /// Enables or disables table-action reachability points.
    #[must_use]
    pub fn with_table_actions(mut self, enable: bool) -> Self {
        self.record_table_actions = enable;
        self
    }
}
