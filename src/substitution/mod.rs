//! Incremental folding of reachability conditions.
//!
//! The interpreter runs once per program and leaves one condition per program point. A
//! [`SubstitutionMap`] keeps those conditions and folds them against the assignments of the
//! current control-plane configuration. Every point ends up either decided (a literal) or
//! unresolved, in which case the simplified residual condition is kept for consumers.
//!
//! When the configuration changes only the folding reruns. With the symbols an update
//! touched (see [`apply_updates`](crate::control_plane::apply_updates)),
//! [`SubstitutionMap::recompute_scoped`] refolds just the points whose conditions mention
//! one of them, found through a reverse index built at registration.
//!
//! # Example
//!
//! ```rust
//! use p4reach::control_plane::{
//!     objects::{ActionAssignment, TableConfiguration, TableDefaultAction},
//!     ControlPlaneConstraints,
//! };
//! use p4reach::expr::{Expr, Literal, SymbolicVariable};
//! use p4reach::state::{ProgramPoint, ReachabilityMap};
//! use p4reach::substitution::SubstitutionMap;
//!
//! let point = ProgramPoint::table_action("ingress.fwd", "forward");
//! let mut reachability = ReachabilityMap::new();
//! reachability.add(
//!     point.clone(),
//!     Expr::variable(SymbolicVariable::table_active("ingress.fwd")),
//! );
//!
//! let default = TableDefaultAction::new(ActionAssignment::new("ingress.fwd", "drop"));
//! let mut constraints = ControlPlaneConstraints::new();
//! constraints.insert("ingress.fwd", TableConfiguration::new("ingress.fwd", default));
//!
//! let mut map = SubstitutionMap::from_reachability(&reachability);
//! assert!(map.recompute(&constraints)?);
//! assert_eq!(map.is_expression_constant(&point), Some(Literal::Bool(false)));
//! # Ok::<(), p4reach::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::{
    control_plane::{ControlPlaneAssignmentSet, ControlPlaneConstraints},
    events::{EventKind, EventLog},
    expr::{Expr, Literal, Simplifier, SymbolicVariable},
    state::{ProgramPoint, ReachabilityMap},
    Error, Result,
};

/// The folding state of one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionEntry {
    original: Expr,
    folded_expr: Expr,
    folded: Option<Literal>,
}

impl SubstitutionEntry {
    /// Returns the condition as recorded by the interpreter.
    #[must_use]
    pub fn original(&self) -> &Expr {
        &self.original
    }

    /// Returns the condition as simplified under the assignments of the last recompute.
    ///
    /// Before the first recompute this is the original condition. For an unresolved point
    /// it is the residual formula over the symbols that are still open.
    #[must_use]
    pub fn folded_expr(&self) -> &Expr {
        &self.folded_expr
    }

    /// Returns the literal the condition folded to in the last recompute, if any.
    #[must_use]
    pub fn folded(&self) -> Option<&Literal> {
        self.folded.as_ref()
    }
}

/// Folded reachability conditions, refreshed incrementally.
///
/// Recomputes mutate the cache in place and are not transactional: if one fails with
/// [`Error::MissingSubstitution`] the cache is partially updated and a full
/// [`recompute`](Self::recompute) should follow.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    entries: BTreeMap<ProgramPoint, SubstitutionEntry>,
    dependents: FxHashMap<SymbolicVariable, BTreeSet<ProgramPoint>>,
    events: EventLog,
}

impl SubstitutionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map holding every point of `reachability`.
    #[must_use]
    pub fn from_reachability(reachability: &ReachabilityMap) -> Self {
        let mut map = Self::new();
        map.register_all(reachability);
        map
    }

    /// Registers the condition of `point`, unresolved until the next recompute.
    ///
    /// Registering a point again replaces its condition and drops its cached literal.
    pub fn register(&mut self, point: ProgramPoint, condition: Expr) {
        if let Some(previous) = self.entries.get(&point) {
            for var in previous.original.variables() {
                if let Some(points) = self.dependents.get_mut(&var) {
                    points.remove(&point);
                }
            }
        }
        for var in condition.variables() {
            self.dependents
                .entry(var)
                .or_default()
                .insert(point.clone());
        }
        self.events.record(EventKind::PointRegistered).point(&point);
        self.entries.insert(
            point,
            SubstitutionEntry {
                folded_expr: condition.clone(),
                original: condition,
                folded: None,
            },
        );
    }

    /// Registers every point of `reachability`.
    pub fn register_all(&mut self, reachability: &ReachabilityMap) {
        for (point, condition) in reachability.iter() {
            self.register(point.clone(), condition.clone());
        }
    }

    /// Refolds every point under the assignments of `constraints`.
    ///
    /// # Returns
    ///
    /// True if any point changed its folded literal, including changes back to unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSubstitution`] if the map is inconsistent.
    pub fn recompute(&mut self, constraints: &ControlPlaneConstraints) -> Result<bool> {
        self.recompute_with_assignments(&constraints.assignments())
    }

    /// Refolds every point under `assignments`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSubstitution`] if the map is inconsistent.
    pub fn recompute_with_assignments(
        &mut self,
        assignments: &ControlPlaneAssignmentSet,
    ) -> Result<bool> {
        let points: Vec<ProgramPoint> = self.entries.keys().cloned().collect();
        self.refold(&points, assignments)
    }

    /// Refolds only the points whose conditions mention one of `symbols`.
    ///
    /// Yields the same cache as a full recompute, provided every variable whose assignment
    /// changed since the last recompute is in `symbols`.
    ///
    /// # Arguments
    ///
    /// * `symbols` - The variables whose assignments changed
    /// * `constraints` - The current configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSubstitution`] if the reverse index names a point that was
    /// never registered.
    pub fn recompute_scoped(
        &mut self,
        symbols: &BTreeSet<SymbolicVariable>,
        constraints: &ControlPlaneConstraints,
    ) -> Result<bool> {
        self.recompute_scoped_with_assignments(symbols, &constraints.assignments())
    }

    /// Refolds only the points whose conditions mention one of `symbols`, under
    /// `assignments`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSubstitution`] if the reverse index names a point that was
    /// never registered.
    pub fn recompute_scoped_with_assignments(
        &mut self,
        symbols: &BTreeSet<SymbolicVariable>,
        assignments: &ControlPlaneAssignmentSet,
    ) -> Result<bool> {
        let points: BTreeSet<ProgramPoint> = symbols
            .iter()
            .filter_map(|var| self.dependents.get(var))
            .flatten()
            .cloned()
            .collect();
        let points: Vec<ProgramPoint> = points.into_iter().collect();
        self.refold(&points, assignments)
    }

    fn refold(
        &mut self,
        points: &[ProgramPoint],
        assignments: &ControlPlaneAssignmentSet,
    ) -> Result<bool> {
        let mut simplifier = Simplifier::new();
        let mut changed = 0usize;
        for point in points {
            let entry = self
                .entries
                .get_mut(point)
                .ok_or_else(|| Error::MissingSubstitution(point.to_string()))?;
            let folded = simplifier.simplify(&entry.original.substitute(assignments));
            let literal = folded.as_literal().filter(|l| is_decision(l)).cloned();
            entry.folded_expr = folded;
            if literal == entry.folded {
                continue;
            }
            changed += 1;
            match &literal {
                Some(value) => self
                    .events
                    .record(EventKind::PointResolved)
                    .point(point)
                    .message(value.to_string()),
                None => self.events.record(EventKind::PointUnresolved).point(point),
            };
            entry.folded = literal;
        }
        info!(
            "refolded {} of {} program points, {} changed",
            points.len(),
            self.entries.len(),
            changed
        );
        self.events
            .record(EventKind::RecomputeCompleted)
            .message(format!("{} points refolded, {} changed", points.len(), changed));
        Ok(changed > 0)
    }

    /// Returns the literal `point` folded to in the last recompute.
    ///
    /// A point that was never registered is reported as a stale lookup and treated as
    /// unresolved.
    #[must_use]
    pub fn is_expression_constant(&self, point: &ProgramPoint) -> Option<Literal> {
        match self.entries.get(point) {
            Some(entry) => entry.folded.clone(),
            None => {
                warn!("no substitution registered for {point}");
                self.events.record(EventKind::StaleLookup).point(point);
                None
            }
        }
    }

    /// Returns the folded condition of `point`, see [`SubstitutionEntry::folded_expr`].
    #[must_use]
    pub fn folded_condition(&self, point: &ProgramPoint) -> Option<&Expr> {
        self.entries.get(point).map(SubstitutionEntry::folded_expr)
    }

    /// Returns the entry of `point`.
    #[must_use]
    pub fn get(&self, point: &ProgramPoint) -> Option<&SubstitutionEntry> {
        self.entries.get(point)
    }

    /// Returns the points whose conditions mention `var`.
    pub fn dependents(&self, var: &SymbolicVariable) -> impl Iterator<Item = &ProgramPoint> {
        self.dependents.get(var).into_iter().flatten()
    }

    /// Points that can never be reached under the current configuration.
    pub fn dead_points(&self) -> impl Iterator<Item = &ProgramPoint> {
        self.points_folded_to(false)
    }

    /// Points that are reached whenever their enclosing block runs.
    pub fn live_points(&self) -> impl Iterator<Item = &ProgramPoint> {
        self.points_folded_to(true)
    }

    /// Points whose outcome still depends on packet data or unset control-plane state.
    pub fn unresolved_points(&self) -> impl Iterator<Item = &ProgramPoint> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.folded.is_none())
            .map(|(point, _)| point)
    }

    fn points_folded_to(&self, value: bool) -> impl Iterator<Item = &ProgramPoint> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.folded == Some(Literal::Bool(value)))
            .map(|(point, _)| point)
    }

    /// Iterates over every registered point in order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProgramPoint, &SubstitutionEntry)> {
        self.entries.iter()
    }

    /// Returns the number of registered points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no point is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the events recorded by registrations, recomputes and lookups.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

/// Strings (action names) are not program-point decisions.
fn is_decision(literal: &Literal) -> bool {
    !matches!(literal, Literal::String(_))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{
        control_plane::{
            objects::{ActionAssignment, TableConfiguration, TableDefaultAction, TableMatchEntry},
            ControlPlaneConstraints, TableKeySet,
        },
        events::EventKind,
        expr::{Expr, Literal, SymbolicVariable, ValueType},
        ir::NodeId,
        state::{ProgramPoint, ReachabilityMap},
        substitution::SubstitutionMap,
        Error,
    };

    fn active(table: &str) -> Expr {
        Expr::variable(SymbolicVariable::table_active(table))
    }

    fn constraints(installed: &[&str]) -> ControlPlaneConstraints {
        let mut constraints = ControlPlaneConstraints::new();
        for table in ["a", "b"] {
            let default = TableDefaultAction::new(ActionAssignment::new(table, "nop"));
            let mut config = TableConfiguration::new(table, default);
            if installed.contains(&table) {
                let mut keys = TableKeySet::new();
                keys.insert(
                    SymbolicVariable::table_key(table, "k", ValueType::bits(8)),
                    Literal::bits(1, 8),
                );
                config.add_entry(TableMatchEntry::new(
                    ActionAssignment::new(table, "hit"),
                    0,
                    keys,
                ));
            }
            constraints.insert(table, config);
        }
        constraints
    }

    fn map() -> (SubstitutionMap, ProgramPoint, ProgramPoint) {
        let pa = ProgramPoint::Statement(NodeId::new(1));
        let pb = ProgramPoint::Statement(NodeId::new(2));
        let mut reachability = ReachabilityMap::new();
        reachability.add(pa.clone(), active("a"));
        reachability.add(pb.clone(), Expr::and(active("b"), active("a")));
        (SubstitutionMap::from_reachability(&reachability), pa, pb)
    }

    #[test]
    fn test_recompute_reports_changes() {
        let (mut map, pa, pb) = map();
        assert!(map.recompute(&constraints(&[])).unwrap());
        assert_eq!(map.is_expression_constant(&pa), Some(Literal::Bool(false)));
        assert_eq!(map.is_expression_constant(&pb), Some(Literal::Bool(false)));

        // Same configuration: nothing changes.
        assert!(!map.recompute(&constraints(&[])).unwrap());

        assert!(map.recompute(&constraints(&["a", "b"])).unwrap());
        assert_eq!(map.live_points().count(), 2);
        assert_eq!(map.dead_points().count(), 0);
    }

    #[test]
    fn test_back_to_unresolved_is_a_change() {
        let (mut map, pa, _) = map();
        map.recompute(&constraints(&[])).unwrap();
        let before = map.events().count_kind(EventKind::PointUnresolved);

        assert!(map.recompute_with_assignments(&BTreeMap::new()).unwrap());
        assert_eq!(map.is_expression_constant(&pa), None);
        assert_eq!(map.unresolved_points().count(), 2);
        assert_eq!(map.events().count_kind(EventKind::PointUnresolved), before + 2);
    }

    #[test]
    fn test_scoped_recompute_touches_dependents_only() {
        let (mut map, pa, pb) = map();
        map.recompute(&constraints(&["a"])).unwrap();
        assert_eq!(map.is_expression_constant(&pa), Some(Literal::Bool(true)));
        assert_eq!(map.is_expression_constant(&pb), Some(Literal::Bool(false)));

        let symbols: BTreeSet<_> = [SymbolicVariable::table_active("b")].into_iter().collect();
        assert!(map.recompute_scoped(&symbols, &constraints(&["a", "b"])).unwrap());
        assert_eq!(map.is_expression_constant(&pb), Some(Literal::Bool(true)));

        let mut full = map_after(&["a", "b"]);
        assert!(!full.recompute(&constraints(&["a", "b"])).unwrap());
        assert_eq!(
            full.iter().map(|(p, e)| (p.clone(), e.folded().cloned())).collect::<Vec<_>>(),
            map.iter().map(|(p, e)| (p.clone(), e.folded().cloned())).collect::<Vec<_>>()
        );
    }

    fn map_after(installed: &[&str]) -> SubstitutionMap {
        let (mut map, _, _) = map();
        map.recompute(&constraints(installed)).unwrap();
        map
    }

    #[test]
    fn test_partial_assignment_leaves_residual() {
        let (mut map, pa, pb) = map();
        assert_eq!(map.folded_condition(&pb), Some(&Expr::and(active("b"), active("a"))));

        let assignments: BTreeMap<_, _> =
            [(SymbolicVariable::table_active("a"), Expr::bool(true))]
                .into_iter()
                .collect();
        assert!(map.recompute_with_assignments(&assignments).unwrap());
        assert_eq!(map.is_expression_constant(&pa), Some(Literal::Bool(true)));
        assert_eq!(map.is_expression_constant(&pb), None);
        assert_eq!(map.folded_condition(&pb), Some(&active("b")));
        assert_eq!(map.get(&pb).unwrap().original(), &Expr::and(active("b"), active("a")));

        assert!(map.recompute_with_assignments(&BTreeMap::new()).unwrap());
        assert_eq!(map.folded_condition(&pb), Some(&Expr::and(active("b"), active("a"))));
    }

    #[test]
    fn test_stale_lookup_is_a_warning() {
        let (map, _, _) = map();
        let unknown = ProgramPoint::table_action("c", "nop");
        assert_eq!(map.is_expression_constant(&unknown), None);
        assert!(map.events().has(EventKind::StaleLookup));
    }

    #[test]
    fn test_inconsistent_index_is_an_error() {
        let (mut map, pa, _) = map();
        map.entries.remove(&pa);
        let symbols: BTreeSet<_> = [SymbolicVariable::table_active("a")].into_iter().collect();
        let result = map.recompute_scoped(&symbols, &constraints(&[]));
        assert!(matches!(result, Err(Error::MissingSubstitution(_))));
    }

    #[test]
    fn test_reregistration_updates_index() {
        let (mut map, pa, _) = map();
        map.register(pa.clone(), active("b"));
        assert!(map
            .dependents(&SymbolicVariable::table_active("a"))
            .all(|p| *p != pa));
        assert!(map
            .dependents(&SymbolicVariable::table_active("b"))
            .any(|p| *p == pa));
    }
}
