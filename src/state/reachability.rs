//! Program points and the conditions under which they are reached.

use std::fmt;

use imbl::OrdMap as ImOrdMap;

use crate::{expr::Expr, ir::NodeId};

/// A location in the program whose reachability is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramPoint {
    /// An `if` statement; the condition is that of its true branch.
    Statement(NodeId),
    /// A case of a `switch` statement.
    SwitchCase(NodeId),
    /// A case of a parser `select` transition.
    SelectCase(NodeId),
    /// An action executed by a table.
    TableAction {
        /// Name of the table.
        table: String,
        /// Name of the action.
        action: String,
    },
}

impl ProgramPoint {
    /// Creates the point of `action` executed by `table`.
    #[must_use]
    pub fn table_action(table: &str, action: &str) -> Self {
        Self::TableAction {
            table: table.to_string(),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Statement(id) => write!(f, "statement {id}"),
            Self::SwitchCase(id) => write!(f, "switch case {id}"),
            Self::SelectCase(id) => write!(f, "select case {id}"),
            Self::TableAction { table, action } => write!(f, "{table}.{action}"),
        }
    }
}

/// Maps program points to their reachability conditions.
///
/// Backed by a persistent map, so cloning it together with an execution state is O(1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityMap {
    points: ImOrdMap<ProgramPoint, Expr>,
}

impl ReachabilityMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `point` is reached under `condition`.
    ///
    /// A point recorded before is reached under either condition; recording the same
    /// condition twice leaves the entry unchanged.
    pub fn add(&mut self, point: ProgramPoint, condition: Expr) {
        let joined = match self.points.get(&point) {
            Some(existing) if *existing == condition => return,
            Some(existing) => Expr::or(existing.clone(), condition),
            None => condition,
        };
        self.points.insert(point, joined);
    }

    /// Joins the entries of another map into this one.
    pub fn join(&mut self, other: &Self) {
        for (point, condition) in other.points.iter() {
            self.add(point.clone(), condition.clone());
        }
    }

    /// Returns the condition recorded for `point`.
    #[must_use]
    pub fn get(&self, point: &ProgramPoint) -> Option<&Expr> {
        self.points.get(point)
    }

    /// Returns the number of recorded points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if no point was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over the points in order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProgramPoint, &Expr)> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::{Expr, SymbolicVariable},
        ir::NodeId,
        state::{ProgramPoint, ReachabilityMap},
    };

    #[test]
    fn test_add_disjoins() {
        let a = Expr::variable(SymbolicVariable::table_active("a"));
        let b = Expr::variable(SymbolicVariable::table_active("b"));
        let point = ProgramPoint::Statement(NodeId::new(1));

        let mut map = ReachabilityMap::new();
        map.add(point.clone(), a.clone());
        map.add(point.clone(), a.clone());
        assert_eq!(map.get(&point), Some(&a));

        map.add(point.clone(), b.clone());
        assert_eq!(map.get(&point), Some(&Expr::or(a, b)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_join_shared_entries_unchanged() {
        let a = Expr::variable(SymbolicVariable::table_active("a"));
        let point = ProgramPoint::SwitchCase(NodeId::new(2));

        let mut left = ReachabilityMap::new();
        left.add(point.clone(), a.clone());
        let mut right = left.clone();
        right.add(ProgramPoint::table_action("t", "drop"), Expr::bool(true));

        left.join(&right);
        assert_eq!(left.get(&point), Some(&a));
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProgramPoint::Statement(NodeId::new(4)).to_string(), "statement #4");
        assert_eq!(ProgramPoint::table_action("fwd", "drop").to_string(), "fwd.drop");
    }
}
