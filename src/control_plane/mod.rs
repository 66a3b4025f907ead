//! The control-plane model.
//!
//! The interpreter leaves every decision the control plane makes open as a
//! [`SymbolicVariable`](crate::expr::SymbolicVariable). This module models what the control
//! plane has actually configured, so those variables can be fixed again:
//!
//! - [`objects`] - The configurable objects ([`TableConfiguration`], [`ParserValueSet`], ...)
//!   and the constraints they impose
//! - [`initializer`] - Builds the configuration a freshly loaded program starts with
//! - [`update`] - Applies decoded control-plane records to a configuration
//!
//! A configuration is a [`ControlPlaneConstraints`] map from entity names to
//! [`ControlPlaneItem`]s. Its [`assignments`](ControlPlaneConstraints::assignments) are what
//! the [`substitution`](crate::substitution) engine consumes.
//!
//! # Example
//!
//! ```rust
//! use p4reach::control_plane::{
//!     objects::{ActionAssignment, TableConfiguration, TableDefaultAction},
//!     ControlPlaneConstraints,
//! };
//! use p4reach::expr::{Expr, SymbolicVariable};
//!
//! let default = TableDefaultAction::new(ActionAssignment::new("ingress.fwd", "drop"));
//! let mut constraints = ControlPlaneConstraints::new();
//! constraints.insert("ingress.fwd", TableConfiguration::new("ingress.fwd", default));
//!
//! let assignments = constraints.assignments();
//! assert_eq!(
//!     assignments.get(&SymbolicVariable::table_active("ingress.fwd")),
//!     Some(&Expr::bool(false))
//! );
//! ```

use std::collections::{btree_map, BTreeMap};

use crate::expr::{Expr, SymbolicVariable};

pub mod initializer;
pub mod objects;
pub mod update;

pub use initializer::ControlPlaneStateInitializer;
pub use objects::{
    ActionAssignment, ActionProfile, ActionSelector, ControlPlaneItem, ControlPlaneItemKind,
    ControlPlaneObject, ParserValueSet, TableActionSelectorConfiguration, TableConfiguration,
    TableDefaultAction, TableEntry, TableKeySet, TableMatchEntry, WildCardMatchEntry,
};
pub use update::{apply_updates, Entity, FieldMatch, TableEntryRecord, UpdateKind};

/// Variables fixed by the control plane and their values.
pub type ControlPlaneAssignmentSet = BTreeMap<SymbolicVariable, Expr>;

/// The configuration of every control-plane entity of a program, by entity name.
#[derive(Debug, Clone, Default)]
pub struct ControlPlaneConstraints {
    items: BTreeMap<String, ControlPlaneItem>,
}

impl ControlPlaneConstraints {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the item of entity `name`.
    ///
    /// # Returns
    ///
    /// The replaced item, if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        item: impl Into<ControlPlaneItem>,
    ) -> Option<ControlPlaneItem> {
        self.items.insert(name.into(), item.into())
    }

    /// Returns the item of entity `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ControlPlaneItem> {
        self.items.get(name)
    }

    /// Returns the item of entity `name` for editing.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ControlPlaneItem> {
        self.items.get_mut(name)
    }

    /// Removes the item of entity `name`.
    pub fn remove(&mut self, name: &str) -> Option<ControlPlaneItem> {
        self.items.remove(name)
    }

    /// Returns the configuration of table `name`.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableConfiguration> {
        self.items.get(name)?.as_table_configuration()
    }

    /// Returns the configuration of table `name` for editing.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableConfiguration> {
        self.items.get_mut(name)?.as_table_configuration_mut()
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no entity is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the entities in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ControlPlaneItem> {
        self.items.iter()
    }

    /// Collects the assignments of every entity.
    ///
    /// Entities are visited in name order; a variable fixed by more than one entity keeps
    /// the first value.
    #[must_use]
    pub fn assignments(&self) -> ControlPlaneAssignmentSet {
        let mut total = ControlPlaneAssignmentSet::new();
        for item in self.items.values() {
            for (var, value) in item.compute_control_plane_assignments() {
                total.entry(var).or_insert(value);
            }
        }
        total
    }

    /// Conjoins the constraints of every entity.
    #[must_use]
    pub fn constraint(&self) -> Expr {
        Expr::all(
            self.items
                .values()
                .map(ControlPlaneObject::compute_control_plane_constraint),
        )
    }
}

impl<'a> IntoIterator for &'a ControlPlaneConstraints {
    type Item = (&'a String, &'a ControlPlaneItem);
    type IntoIter = btree_map::Iter<'a, String, ControlPlaneItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
