//! Diagnostics collected while analysing a program.
//!
//! Every stage reports into one [`EventLog`]: the interpreter notes the blocks and tables
//! it stepped and where parser exploration was cut short, the control-plane conversion
//! notes which records it applied or skipped, and the substitution engine notes which
//! program points changed their folded value. Recoverable problems never abort a batch;
//! they end up here instead.
//!
//! Events are appended through a shared reference, so the log can be handed to every
//! component of a run as `&EventLog`.
//!
//! # Example
//!
//! ```rust
//! use p4reach::events::{EventKind, EventLog, EventStage};
//!
//! let log = EventLog::new();
//! log.record(EventKind::RecordRejected)
//!     .entity("ingress.fwd")
//!     .message("unknown action 'nop'");
//! log.record(EventKind::RecordApplied).entity("ingress.acl");
//!
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.rejected_records().count(), 1);
//! assert_eq!(log.stage_count(EventStage::ControlPlane), 2);
//! ```

use std::{collections::BTreeMap, fmt};

use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use crate::state::ProgramPoint;

/// The pipeline stage that reports an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum EventStage {
    /// Symbolic execution of the program.
    Interpreter,
    /// Conversion of the configuration and of control-plane records.
    ControlPlane,
    /// Folding of reachability conditions.
    Substitution,
}

/// What happened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    /// A pipeline block was stepped.
    BlockStepped,
    /// A table invocation was converted into its symbolic result.
    TableExecuted,
    /// Parser exploration stopped at the configured depth bound.
    ParserDepthExceeded,

    /// A control-plane item was created from the program.
    ItemInitialized,
    /// A control-plane record was applied to the constraints.
    RecordApplied,
    /// A control-plane record was rejected and skipped.
    RecordRejected,

    /// A program point was registered for substitution.
    PointRegistered,
    /// A program point folded to a literal.
    PointResolved,
    /// A previously folded program point became unresolved again.
    PointUnresolved,
    /// A point lookup found no registration.
    StaleLookup,
    /// A recompute finished.
    RecomputeCompleted,
}

impl EventKind {
    /// Returns the stage that reports events of this kind.
    #[must_use]
    pub fn stage(self) -> EventStage {
        match self {
            Self::BlockStepped | Self::TableExecuted | Self::ParserDepthExceeded => {
                EventStage::Interpreter
            }
            Self::ItemInitialized | Self::RecordApplied | Self::RecordRejected => {
                EventStage::ControlPlane
            }
            Self::PointRegistered
            | Self::PointResolved
            | Self::PointUnresolved
            | Self::StaleLookup
            | Self::RecomputeCompleted => EventStage::Substitution,
        }
    }

    /// Returns true if this event points at a problem in the program, the records or the
    /// caller's bookkeeping.
    #[must_use]
    pub fn is_diagnostic(self) -> bool {
        matches!(
            self,
            Self::ParserDepthExceeded | Self::RecordRejected | Self::StaleLookup
        )
    }
}

/// A single logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The program point the event concerns, if any.
    pub point: Option<ProgramPoint>,
    /// The control-plane entity or program block the event concerns, if any.
    pub entity: Option<String>,
    /// Human-readable details; the kind name when nothing more specific was given.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        match (&self.entity, &self.point) {
            (Some(entity), Some(point)) => write!(f, "{entity} @ {point}: ")?,
            (Some(entity), None) => write!(f, "{entity}: ")?,
            (None, Some(point)) => write!(f, "{point}: ")?,
            (None, None) => {}
        }
        f.write_str(&self.message)
    }
}

/// Pending event returned by [`EventLog::record`].
///
/// Attach the optional parts; the event is appended to its log when the builder goes out
/// of scope.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    /// Attaches the program point the event concerns.
    pub fn point(mut self, point: &ProgramPoint) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.point = Some(point.clone());
        }
        self
    }

    /// Attaches the entity the event concerns.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.entity = Some(entity.into());
        }
        self
    }

    /// Replaces the default message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.message = message.into();
        }
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}

/// Append-only event collection shared by the components of one analysis run.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let copy = Self::new();
        copy.append(self);
        copy
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts an event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                point: None,
                entity: None,
                message: kind.as_ref().to_string(),
            }),
        }
    }

    /// Appends copies of the events of `other`, in their order.
    pub fn append(&self, other: &EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Returns true if an event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts the events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Counts the events reported by `stage`.
    #[must_use]
    pub fn stage_count(&self, stage: EventStage) -> usize {
        self.iter().filter(|e| e.kind.stage() == stage).count()
    }

    /// Iterates over the events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Iterates over the events concerning `entity`.
    pub fn filter_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter()
            .filter(move |e| e.entity.as_deref() == Some(entity))
    }

    /// Iterates over the events concerning `point`.
    pub fn filter_point<'a>(
        &'a self,
        point: &'a ProgramPoint,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.point.as_ref() == Some(point))
    }

    /// Iterates over the records the control-plane conversion skipped.
    pub fn rejected_records(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::RecordRejected)
    }

    /// Iterates over the events a user should look at.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Summarises the log per stage, e.g.
    /// `interpreter: 6 block-stepped; control-plane: 1 record-applied`.
    ///
    /// Stages without events are left out.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<EventKind, usize> = BTreeMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_default() += 1;
        }
        if counts.is_empty() {
            return "no events".to_string();
        }

        EventStage::iter()
            .filter_map(|stage| {
                let parts: Vec<_> = EventKind::iter()
                    .filter(|kind| kind.stage() == stage)
                    .filter_map(|kind| counts.get(&kind).map(|n| format!("{n} {kind}")))
                    .collect();
                (!parts.is_empty()).then(|| format!("{stage}: {}", parts.join(", ")))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
