// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # p4reach
//!
//! Control-plane driven reachability analysis for P4 programs.
//!
//! A P4 program's behaviour depends on what a control plane installs into its tables and
//! value sets. `p4reach` symbolically executes a typed program once, leaving every
//! control-plane decision open, and records for every conditional program point the
//! formula under which it is reached. Those formulas are then folded against a concrete
//! (or partial) configuration: points that fold to `false` are dead code under that
//! configuration, points that fold to `true` always run. When the configuration changes,
//! only the folding reruns, and only for the formulas that mention a changed symbol.
//!
//! ## Features
//!
//! - **Symbolic interpreter** - Controls, parsers, actions, switches and tables over
//!   persistent, O(1)-forkable execution states
//! - **Table encodings** - `exact`, `ternary`, `lpm`, `range`, `optional` and `selector`
//!   keys, constant entries in priority order, default actions and action arguments
//! - **Control-plane model** - Table configurations, default actions, value sets, action
//!   profiles and selectors, each yielding a constraint and an assignment set
//! - **Incremental substitution** - Cached folds with a reverse index for scoped recomputes
//! - **Diagnostics** - Recoverable problems end up in an [`events::EventLog`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use p4reach::prelude::*;
//!
//! let target = V1Model::new();
//! let events = EventLog::new();
//!
//! // Symbolic execution, once per program.
//! let analysis = run_analysis(&program, &target, &AnalysisConfig::default(), &events)?;
//!
//! // The configuration the program starts with.
//! let mut constraints =
//!     ControlPlaneStateInitializer::new(&program, &target, &events).default_constraints();
//! let mut substitution = SubstitutionMap::from_reachability(&analysis.reachability);
//! substitution.recompute(&constraints)?;
//!
//! // A control-plane update refolds only what it touches.
//! let touched = apply_updates(&program, &target, &mut constraints, &records, &events);
//! substitution.recompute_scoped(&touched, &constraints)?;
//!
//! for point in substitution.dead_points() {
//!     println!("unreachable: {point}");
//! }
//! # Ok::<(), p4reach::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The typed program tree handed over by a front end
//! - [`expr`] - Symbolic expressions, literals and control-plane variables
//! - [`state`] - Execution states and the reachability map
//! - [`interp`] - The interpreter: statements, parsers, tables, match kinds and targets
//! - [`control_plane`] - The configurable objects, the default configuration and updates
//! - [`substitution`] - Incremental folding of the reachability map
//! - [`config`], [`events`], [`Error`] - Settings, diagnostics and errors
//!
//! ## Errors
//!
//! Construct the interpreter does not model and structurally broken programs abort the
//! analysis with an [`Error`]. Control-plane records that cannot be converted are skipped
//! and reported as events, so one bad record never invalidates a batch.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use p4reach::prelude::*;
///
/// let config = AnalysisConfig::default().with_max_parser_depth(16);
/// let target = V1Model::new();
/// assert_eq!(target.name(), "bmv2");
/// assert_eq!(config.max_parser_depth, 16);
/// ```
pub mod prelude;

pub mod config;
pub mod control_plane;
pub mod events;
pub mod expr;
pub mod interp;
pub mod ir;
pub mod state;
pub mod substitution;

/// `p4reach` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `p4reach` Error types
///
/// [`Error`] documents the error categories and how callers should treat them.
pub use error::{ControlPlaneError, Error};
