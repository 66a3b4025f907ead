//! Control-plane objects and the constraints they impose.
//!
//! Every object the control plane can configure is represented by one type implementing
//! [`ControlPlaneObject`]. Objects compute two things:
//!
//! - a constraint: a boolean formula over [`SymbolicVariable`]s describing every
//!   configuration the object admits,
//! - an assignment set: the variables whose value the object fixes outright, which the
//!   substitution engine folds into the reachability formulas.
//!
//! Heterogeneous objects are stored as [`ControlPlaneItem`]s. Items are totally ordered:
//! items of the same kind compare by their defining key, items of different kinds by the
//! declaration order of [`ControlPlaneItemKind`].

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use strum::{AsRefStr, Display, EnumIter};

use crate::{
    control_plane::ControlPlaneAssignmentSet,
    expr::{Expr, Literal, SymbolicVariable},
};

/// Configured key values of one table entry, by key variable.
pub type TableKeySet = BTreeMap<SymbolicVariable, Literal>;

/// Common behavior of every control-plane object.
pub trait ControlPlaneObject {
    /// Returns the formula every admissible configuration of the object satisfies.
    fn compute_control_plane_constraint(&self) -> Expr;

    /// Returns the variables the object fixes and their values.
    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet;
}

/// The action an entry or default action selects, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActionAssignment {
    table: String,
    action: String,
    args: Vec<(SymbolicVariable, Literal)>,
}

impl ActionAssignment {
    /// Creates an assignment of action `action` without arguments.
    ///
    /// # Arguments
    ///
    /// * `table` - Control-plane name of the table
    /// * `action` - Control-plane name of the action
    #[must_use]
    pub fn new(table: &str, action: &str) -> Self {
        Self {
            table: table.to_string(),
            action: action.to_string(),
            args: Vec::new(),
        }
    }

    /// Adds the value of parameter `param`.
    #[must_use]
    pub fn with_arg(mut self, param: &str, value: Literal) -> Self {
        let variable = SymbolicVariable::action_argument(
            &self.table,
            &self.action,
            param,
            value.value_type(),
        );
        self.args.push((variable, value));
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the argument variables and their values.
    #[must_use]
    pub fn args(&self) -> &[(SymbolicVariable, Literal)] {
        &self.args
    }

    /// `{table}_action == action` conjoined with every argument equality.
    #[must_use]
    pub fn constraint(&self) -> Expr {
        self.args.iter().fold(self.choice_equality(), |acc, (var, value)| {
            Expr::and(acc, equality(var, value))
        })
    }

    fn choice_equality(&self) -> Expr {
        Expr::eq(
            Expr::variable(SymbolicVariable::action_choice(&self.table)),
            Expr::string(self.action.as_str()),
        )
    }

    fn pairs(&self) -> impl Iterator<Item = (SymbolicVariable, Expr)> + '_ {
        std::iter::once((
            SymbolicVariable::action_choice(&self.table),
            Expr::string(self.action.as_str()),
        ))
        .chain(
            self.args
                .iter()
                .map(|(var, value)| (var.clone(), Expr::literal(value.clone()))),
        )
    }
}

/// The conjunction of the equalities of a key set; `true` for an empty set.
pub(crate) fn key_expression(keys: &TableKeySet) -> Expr {
    Expr::all(keys.iter().map(|(var, value)| equality(var, value)))
}

fn equality(var: &SymbolicVariable, value: &Literal) -> Expr {
    Expr::eq(Expr::variable(var.clone()), Expr::literal(value.clone()))
}

/// A table entry matching concrete key values.
///
/// The match expression is built once on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMatchEntry {
    action: ActionAssignment,
    priority: i32,
    keys: TableKeySet,
    match_expression: Expr,
}

impl TableMatchEntry {
    /// Creates an entry.
    ///
    /// # Arguments
    ///
    /// * `action` - The action the entry runs
    /// * `priority` - Entry priority; larger values win
    /// * `keys` - The configured value of every key variable
    #[must_use]
    pub fn new(action: ActionAssignment, priority: i32, keys: TableKeySet) -> Self {
        let match_expression = keys
            .iter()
            .fold(action.constraint(), |acc, (var, value)| {
                Expr::and(acc, equality(var, value))
            });
        Self {
            action,
            priority,
            keys,
            match_expression,
        }
    }

    /// Returns the action assignment.
    #[must_use]
    pub fn action(&self) -> &ActionAssignment {
        &self.action
    }

    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the configured keys.
    #[must_use]
    pub fn keys(&self) -> &TableKeySet {
        &self.keys
    }

    /// Returns the precomputed match expression.
    #[must_use]
    pub fn match_expression(&self) -> &Expr {
        &self.match_expression
    }

    /// The conjunction of the key equalities alone.
    ///
    /// Identifies the entry within its table: entries with equal key matches replace each
    /// other.
    #[must_use]
    pub fn key_expression(&self) -> Expr {
        key_expression(&self.keys)
    }
}

impl ControlPlaneObject for TableMatchEntry {
    fn compute_control_plane_constraint(&self) -> Expr {
        self.match_expression.clone()
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        self.action
            .pairs()
            .chain(
                self.keys
                    .iter()
                    .map(|(var, value)| (var.clone(), Expr::literal(value.clone()))),
            )
            .collect()
    }
}

/// A table entry matching every key, constraining only the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildCardMatchEntry {
    action: ActionAssignment,
    priority: i32,
}

impl WildCardMatchEntry {
    /// Creates a wildcard entry.
    #[must_use]
    pub fn new(action: ActionAssignment, priority: i32) -> Self {
        Self { action, priority }
    }

    /// Returns the action assignment.
    #[must_use]
    pub fn action(&self) -> &ActionAssignment {
        &self.action
    }

    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl ControlPlaneObject for WildCardMatchEntry {
    fn compute_control_plane_constraint(&self) -> Expr {
        self.action.constraint()
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        self.action.pairs().collect()
    }
}

/// The default action of a table.
///
/// Selecting a default action fixes both the action choice and the default-action
/// variable of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefaultAction {
    action: ActionAssignment,
}

impl TableDefaultAction {
    /// Creates a default action.
    #[must_use]
    pub fn new(action: ActionAssignment) -> Self {
        Self { action }
    }

    /// Returns the action assignment.
    #[must_use]
    pub fn action(&self) -> &ActionAssignment {
        &self.action
    }

    fn default_equality(&self) -> Expr {
        Expr::eq(
            Expr::variable(SymbolicVariable::default_action(self.action.table())),
            Expr::string(self.action.action()),
        )
    }
}

impl ControlPlaneObject for TableDefaultAction {
    fn compute_control_plane_constraint(&self) -> Expr {
        let head = Expr::and(self.action.choice_equality(), self.default_equality());
        self.action
            .args
            .iter()
            .fold(head, |acc, (var, value)| Expr::and(acc, equality(var, value)))
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        let mut assignments: ControlPlaneAssignmentSet = self.action.pairs().collect();
        assignments.insert(
            SymbolicVariable::default_action(self.action.table()),
            Expr::string(self.action.action()),
        );
        assignments
    }
}

/// An entry of a table configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEntry {
    /// An entry with key values.
    Match(TableMatchEntry),
    /// An entry matching every key.
    WildCard(WildCardMatchEntry),
}

impl TableEntry {
    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Match(e) => e.priority(),
            Self::WildCard(e) => e.priority(),
        }
    }

    /// Returns the action assignment.
    #[must_use]
    pub fn action(&self) -> &ActionAssignment {
        match self {
            Self::Match(e) => e.action(),
            Self::WildCard(e) => e.action(),
        }
    }

    /// Returns the key match identifying the entry; `true` for wildcards.
    #[must_use]
    pub fn key_expression(&self) -> Expr {
        match self {
            Self::Match(e) => e.key_expression(),
            Self::WildCard(_) => Expr::bool(true),
        }
    }
}

impl ControlPlaneObject for TableEntry {
    fn compute_control_plane_constraint(&self) -> Expr {
        match self {
            Self::Match(e) => e.compute_control_plane_constraint(),
            Self::WildCard(e) => e.compute_control_plane_constraint(),
        }
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        match self {
            Self::Match(e) => e.compute_control_plane_assignments(),
            Self::WildCard(e) => e.compute_control_plane_assignments(),
        }
    }
}

impl From<TableMatchEntry> for TableEntry {
    fn from(entry: TableMatchEntry) -> Self {
        Self::Match(entry)
    }
}

impl From<WildCardMatchEntry> for TableEntry {
    fn from(entry: WildCardMatchEntry) -> Self {
        Self::WildCard(entry)
    }
}

/// The complete configuration of one table: its default action and its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfiguration {
    table: String,
    default_action: TableDefaultAction,
    entries: BTreeMap<Expr, TableEntry>,
}

impl TableConfiguration {
    /// Creates a configuration without entries.
    #[must_use]
    pub fn new(table: &str, default_action: TableDefaultAction) -> Self {
        Self {
            table: table.to_string(),
            default_action,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the default action.
    #[must_use]
    pub fn default_action(&self) -> &TableDefaultAction {
        &self.default_action
    }

    /// Replaces the default action.
    pub fn set_default_action(&mut self, default_action: TableDefaultAction) {
        self.default_action = default_action;
    }

    /// Adds an entry, replacing the entry with the same key match.
    ///
    /// # Returns
    ///
    /// The replaced entry, if any.
    pub fn add_entry(&mut self, entry: impl Into<TableEntry>) -> Option<TableEntry> {
        let entry = entry.into();
        self.entries.insert(entry.key_expression(), entry)
    }

    /// Removes the entry with the given key match.
    pub fn delete_entry(&mut self, key_expression: &Expr) -> Option<TableEntry> {
        self.entries.remove(key_expression)
    }

    /// Checks whether an entry with the given key match exists.
    #[must_use]
    pub fn contains_entry(&self, key_expression: &Expr) -> bool {
        self.entries.contains_key(key_expression)
    }

    /// Removes every entry.
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries, highest priority first.
    ///
    /// Entries of equal priority are ordered by their key match.
    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        let mut sorted: Vec<_> = self.entries.values().collect();
        sorted.sort_by_key(|e| std::cmp::Reverse(e.priority()));
        sorted.into_iter()
    }

    fn configured_pair(&self) -> (SymbolicVariable, Expr) {
        (
            SymbolicVariable::table_active(&self.table),
            Expr::bool(!self.entries.is_empty()),
        )
    }
}

impl ControlPlaneObject for TableConfiguration {
    /// Folds the entries into nested multiplexers around the default action.
    ///
    /// The highest priority entry is the outermost condition.
    fn compute_control_plane_constraint(&self) -> Expr {
        let sorted: Vec<_> = self.entries().collect();
        sorted.into_iter().rev().fold(
            self.default_action.compute_control_plane_constraint(),
            |acc, entry| {
                Expr::mux(
                    entry.compute_control_plane_constraint(),
                    entry.action().constraint(),
                    acc,
                )
            },
        )
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        let (configured, value) = self.configured_pair();
        let defaults = self.default_action.compute_control_plane_assignments();

        let per_entry: Vec<_> = self
            .entries
            .values()
            .map(ControlPlaneObject::compute_control_plane_assignments)
            .collect();
        let Some((first, rest)) = per_entry.split_first() else {
            let mut assignments = defaults;
            assignments.insert(configured, value);
            return assignments;
        };

        // Pairs every entry agrees on.
        let mut assignments: ControlPlaneAssignmentSet = first
            .iter()
            .filter(|(var, value)| rest.iter().all(|other| other.get(*var) == Some(*value)))
            .map(|(var, value)| (var.clone(), value.clone()))
            .collect();

        let choice = SymbolicVariable::action_choice(&self.table);
        for (var, default) in defaults {
            let contradicted = per_entry
                .iter()
                .any(|a| a.get(&var).is_some_and(|v| *v != default));
            if var == choice || contradicted {
                continue;
            }
            assignments.entry(var).or_insert(default);
        }
        assignments.insert(configured, value);
        assignments
    }
}

/// A parser value set.
///
/// Value sets are treated as always configured; their members are not modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserValueSet {
    name: String,
}

impl ParserValueSet {
    /// Creates a value set.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Returns the control-plane name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ControlPlaneObject for ParserValueSet {
    fn compute_control_plane_constraint(&self) -> Expr {
        Expr::bool(true)
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        let mut assignments = ControlPlaneAssignmentSet::new();
        assignments.insert(
            SymbolicVariable::value_set_configured(&self.name),
            Expr::bool(true),
        );
        assignments
    }
}

/// An action profile shared by a set of tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionProfile {
    name: String,
    associated_tables: BTreeSet<String>,
}

impl ActionProfile {
    /// Creates a profile without associated tables.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            associated_tables: BTreeSet::new(),
        }
    }

    /// Returns the control-plane name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tables implemented by this profile.
    #[must_use]
    pub fn associated_tables(&self) -> &BTreeSet<String> {
        &self.associated_tables
    }

    /// Associates a table with the profile.
    pub fn add_associated_table(&mut self, table: &str) {
        self.associated_tables.insert(table.to_string());
    }
}

impl ControlPlaneObject for ActionProfile {
    fn compute_control_plane_constraint(&self) -> Expr {
        Expr::bool(true)
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        ControlPlaneAssignmentSet::new()
    }
}

/// An action selector backed by an action profile.
///
/// The profile is referred to by name; it is a separate item of the same constraint map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSelector {
    name: String,
    profile: String,
    associated_tables: BTreeSet<String>,
}

impl ActionSelector {
    /// Creates a selector without associated tables.
    #[must_use]
    pub fn new(name: &str, profile: &str) -> Self {
        Self {
            name: name.to_string(),
            profile: profile.to_string(),
            associated_tables: BTreeSet::new(),
        }
    }

    /// Returns the control-plane name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the backing action profile.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Returns the tables implemented by this selector.
    #[must_use]
    pub fn associated_tables(&self) -> &BTreeSet<String> {
        &self.associated_tables
    }

    /// Associates a table with the selector.
    pub fn add_associated_table(&mut self, table: &str) {
        self.associated_tables.insert(table.to_string());
    }
}

impl ControlPlaneObject for ActionSelector {
    fn compute_control_plane_constraint(&self) -> Expr {
        Expr::bool(true)
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        ControlPlaneAssignmentSet::new()
    }
}

/// The configuration of a table implemented by an action selector.
///
/// Entries are tracked like for any other table, but hit and miss are decided by the
/// selector, so the configuration does not constrain the formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableActionSelectorConfiguration {
    configuration: TableConfiguration,
}

impl TableActionSelectorConfiguration {
    /// Wraps a table configuration.
    #[must_use]
    pub fn new(configuration: TableConfiguration) -> Self {
        Self { configuration }
    }

    /// Returns the wrapped configuration.
    #[must_use]
    pub fn configuration(&self) -> &TableConfiguration {
        &self.configuration
    }

    /// Returns the wrapped configuration for editing.
    pub fn configuration_mut(&mut self) -> &mut TableConfiguration {
        &mut self.configuration
    }
}

impl ControlPlaneObject for TableActionSelectorConfiguration {
    fn compute_control_plane_constraint(&self) -> Expr {
        Expr::bool(true)
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        let (configured, value) = self.configuration.configured_pair();
        let mut assignments = ControlPlaneAssignmentSet::new();
        assignments.insert(configured, value);
        assignments
    }
}

/// The kinds of control-plane items, in their cross-kind order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, AsRefStr, Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum ControlPlaneItemKind {
    /// [`TableMatchEntry`]
    TableMatchEntry,
    /// [`WildCardMatchEntry`]
    WildCardMatchEntry,
    /// [`TableDefaultAction`]
    TableDefaultAction,
    /// [`TableConfiguration`]
    TableConfiguration,
    /// [`ParserValueSet`]
    ParserValueSet,
    /// [`ActionProfile`]
    ActionProfile,
    /// [`ActionSelector`]
    ActionSelector,
    /// [`TableActionSelectorConfiguration`]
    TableActionSelectorConfiguration,
}

/// Any control-plane object.
#[derive(Debug, Clone)]
pub enum ControlPlaneItem {
    /// A table entry.
    TableMatchEntry(TableMatchEntry),
    /// A wildcard table entry.
    WildCardMatchEntry(WildCardMatchEntry),
    /// A default action.
    TableDefaultAction(TableDefaultAction),
    /// A table configuration.
    TableConfiguration(TableConfiguration),
    /// A parser value set.
    ParserValueSet(ParserValueSet),
    /// An action profile.
    ActionProfile(ActionProfile),
    /// An action selector.
    ActionSelector(ActionSelector),
    /// A selector-backed table configuration.
    TableActionSelectorConfiguration(TableActionSelectorConfiguration),
}

impl ControlPlaneItem {
    /// Returns the kind tag.
    #[must_use]
    pub fn kind(&self) -> ControlPlaneItemKind {
        match self {
            Self::TableMatchEntry(_) => ControlPlaneItemKind::TableMatchEntry,
            Self::WildCardMatchEntry(_) => ControlPlaneItemKind::WildCardMatchEntry,
            Self::TableDefaultAction(_) => ControlPlaneItemKind::TableDefaultAction,
            Self::TableConfiguration(_) => ControlPlaneItemKind::TableConfiguration,
            Self::ParserValueSet(_) => ControlPlaneItemKind::ParserValueSet,
            Self::ActionProfile(_) => ControlPlaneItemKind::ActionProfile,
            Self::ActionSelector(_) => ControlPlaneItemKind::ActionSelector,
            Self::TableActionSelectorConfiguration(_) => {
                ControlPlaneItemKind::TableActionSelectorConfiguration
            }
        }
    }

    /// Returns the table configuration of a table item, selector-backed or not.
    #[must_use]
    pub fn as_table_configuration(&self) -> Option<&TableConfiguration> {
        match self {
            Self::TableConfiguration(c) => Some(c),
            Self::TableActionSelectorConfiguration(c) => Some(c.configuration()),
            _ => None,
        }
    }

    /// Returns the table configuration of a table item for editing.
    pub fn as_table_configuration_mut(&mut self) -> Option<&mut TableConfiguration> {
        match self {
            Self::TableConfiguration(c) => Some(c),
            Self::TableActionSelectorConfiguration(c) => Some(c.configuration_mut()),
            _ => None,
        }
    }

    fn object(&self) -> &dyn ControlPlaneObject {
        match self {
            Self::TableMatchEntry(o) => o,
            Self::WildCardMatchEntry(o) => o,
            Self::TableDefaultAction(o) => o,
            Self::TableConfiguration(o) => o,
            Self::ParserValueSet(o) => o,
            Self::ActionProfile(o) => o,
            Self::ActionSelector(o) => o,
            Self::TableActionSelectorConfiguration(o) => o,
        }
    }
}

impl ControlPlaneObject for ControlPlaneItem {
    fn compute_control_plane_constraint(&self) -> Expr {
        self.object().compute_control_plane_constraint()
    }

    fn compute_control_plane_assignments(&self) -> ControlPlaneAssignmentSet {
        self.object().compute_control_plane_assignments()
    }
}

impl Ord for ControlPlaneItem {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::TableMatchEntry(a), Self::TableMatchEntry(b)) => {
                a.match_expression().cmp(b.match_expression())
            }
            (Self::WildCardMatchEntry(a), Self::WildCardMatchEntry(b)) => {
                a.action().cmp(b.action())
            }
            (Self::TableDefaultAction(a), Self::TableDefaultAction(b)) => {
                a.action().cmp(b.action())
            }
            (Self::TableConfiguration(a), Self::TableConfiguration(b)) => a.table().cmp(b.table()),
            (Self::ParserValueSet(a), Self::ParserValueSet(b)) => a.name().cmp(b.name()),
            (Self::ActionProfile(a), Self::ActionProfile(b)) => a.name().cmp(b.name()),
            (Self::ActionSelector(a), Self::ActionSelector(b)) => a.name().cmp(b.name()),
            (
                Self::TableActionSelectorConfiguration(a),
                Self::TableActionSelectorConfiguration(b),
            ) => a.configuration().table().cmp(b.configuration().table()),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for ControlPlaneItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ControlPlaneItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ControlPlaneItem {}

macro_rules! impl_from_object {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for ControlPlaneItem {
                fn from(object: $variant) -> Self {
                    Self::$variant(object)
                }
            }
        )*
    };
}

impl_from_object!(
    TableMatchEntry,
    WildCardMatchEntry,
    TableDefaultAction,
    TableConfiguration,
    ParserValueSet,
    ActionProfile,
    ActionSelector,
    TableActionSelectorConfiguration
);

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strum::IntoEnumIterator;

    use crate::{
        control_plane::objects::*,
        expr::{Expr, Literal, SymbolicVariable, ValueType},
    };

    fn key(value: u128) -> TableKeySet {
        let mut keys = TableKeySet::new();
        keys.insert(
            SymbolicVariable::table_key("fwd", "dst", ValueType::bits(8)),
            Literal::bits(value, 8),
        );
        keys
    }

    fn default_drop() -> TableDefaultAction {
        TableDefaultAction::new(ActionAssignment::new("fwd", "drop"))
    }

    fn forward(port: u128) -> ActionAssignment {
        ActionAssignment::new("fwd", "forward").with_arg("port", Literal::bits(port, 9))
    }

    #[test]
    fn test_match_entry_constraint() {
        let entry = TableMatchEntry::new(forward(1), 10, key(5));
        let choice = Expr::eq(
            Expr::variable(SymbolicVariable::action_choice("fwd")),
            Expr::string("forward"),
        );
        let arg = Expr::eq(
            Expr::variable(SymbolicVariable::action_argument(
                "fwd",
                "forward",
                "port",
                ValueType::bits(9),
            )),
            Expr::bits(1, 9),
        );
        let key_eq = Expr::eq(
            Expr::variable(SymbolicVariable::table_key("fwd", "dst", ValueType::bits(8))),
            Expr::bits(5, 8),
        );
        assert_eq!(
            entry.compute_control_plane_constraint(),
            Expr::and(Expr::and(choice, arg), key_eq.clone())
        );
        assert_eq!(entry.key_expression(), key_eq);
        assert_eq!(entry.compute_control_plane_assignments().len(), 3);
    }

    #[test]
    fn test_highest_priority_is_outermost() {
        let mut config = TableConfiguration::new("fwd", default_drop());
        let low = TableMatchEntry::new(forward(1), 1, key(1));
        let high = TableMatchEntry::new(forward(2), 20, key(2));
        config.add_entry(low.clone());
        config.add_entry(high.clone());

        let expected = Expr::mux(
            high.match_expression().clone(),
            high.action().constraint(),
            Expr::mux(
                low.match_expression().clone(),
                low.action().constraint(),
                default_drop().compute_control_plane_constraint(),
            ),
        );
        assert_eq!(config.compute_control_plane_constraint(), expected);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let entries = [
            TableMatchEntry::new(forward(1), 5, key(1)),
            TableMatchEntry::new(forward(2), 5, key(2)),
            TableMatchEntry::new(forward(3), 7, key(3)),
        ];
        let mut forward_order = TableConfiguration::new("fwd", default_drop());
        for entry in entries.iter().cloned() {
            forward_order.add_entry(entry);
        }
        let mut reverse_order = TableConfiguration::new("fwd", default_drop());
        for entry in entries.iter().rev().cloned() {
            reverse_order.add_entry(entry);
        }
        assert_eq!(
            forward_order.compute_control_plane_constraint(),
            reverse_order.compute_control_plane_constraint()
        );
    }

    #[test]
    fn test_same_key_replaces_entry() {
        let mut config = TableConfiguration::new("fwd", default_drop());
        assert!(config.add_entry(TableMatchEntry::new(forward(1), 0, key(5))).is_none());
        let replaced = config.add_entry(TableMatchEntry::new(forward(2), 0, key(5)));
        assert!(replaced.is_some());
        assert_eq!(config.len(), 1);

        let key_expression = TableMatchEntry::new(forward(9), 0, key(5)).key_expression();
        assert!(config.delete_entry(&key_expression).is_some());
        assert!(config.is_empty());
    }

    #[test]
    fn test_assignments_without_entries() {
        let config = TableConfiguration::new("fwd", default_drop());
        let assignments = config.compute_control_plane_assignments();
        assert_eq!(
            assignments.get(&SymbolicVariable::table_active("fwd")),
            Some(&Expr::bool(false))
        );
        assert_eq!(
            assignments.get(&SymbolicVariable::action_choice("fwd")),
            Some(&Expr::string("drop"))
        );
        assert_eq!(
            assignments.get(&SymbolicVariable::default_action("fwd")),
            Some(&Expr::string("drop"))
        );
    }

    #[test]
    fn test_assignments_keep_agreed_pairs() {
        let mut config = TableConfiguration::new("fwd", default_drop());
        config.add_entry(TableMatchEntry::new(forward(1), 0, key(1)));
        config.add_entry(TableMatchEntry::new(forward(1), 0, key(2)));
        let assignments = config.compute_control_plane_assignments();

        assert_eq!(
            assignments.get(&SymbolicVariable::table_active("fwd")),
            Some(&Expr::bool(true))
        );
        // Both entries run `forward(1)`, but match different keys.
        assert_eq!(
            assignments.get(&SymbolicVariable::action_choice("fwd")),
            Some(&Expr::string("forward"))
        );
        assert!(!assignments
            .contains_key(&SymbolicVariable::table_key("fwd", "dst", ValueType::bits(8))));
        assert_eq!(
            assignments.get(&SymbolicVariable::default_action("fwd")),
            Some(&Expr::string("drop"))
        );
    }

    #[test]
    fn test_placeholders_are_true() {
        let items: Vec<ControlPlaneItem> = vec![
            ParserValueSet::new("prs.pvs").into(),
            ActionProfile::new("ap").into(),
            ActionSelector::new("as", "ap").into(),
            TableActionSelectorConfiguration::new(TableConfiguration::new("fwd", default_drop()))
                .into(),
        ];
        for item in &items {
            assert_eq!(item.compute_control_plane_constraint(), Expr::bool(true));
        }
        let mut expected = BTreeMap::new();
        expected.insert(SymbolicVariable::value_set_configured("prs.pvs"), Expr::bool(true));
        assert_eq!(items[0].compute_control_plane_assignments(), expected);
    }

    #[test]
    fn test_item_order_is_total() {
        let mut items: Vec<ControlPlaneItem> = vec![
            ActionProfile::new("b").into(),
            TableConfiguration::new("z", default_drop()).into(),
            ActionProfile::new("a").into(),
            ParserValueSet::new("pvs").into(),
            TableConfiguration::new("a", default_drop()).into(),
        ];
        items.sort();
        let kinds: Vec<_> = items.iter().map(ControlPlaneItem::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ControlPlaneItemKind::TableConfiguration,
                ControlPlaneItemKind::TableConfiguration,
                ControlPlaneItemKind::ParserValueSet,
                ControlPlaneItemKind::ActionProfile,
                ControlPlaneItemKind::ActionProfile,
            ]
        );
        assert_eq!(items[0].as_table_configuration().unwrap().table(), "a");
        assert_eq!(ControlPlaneItemKind::iter().count(), 8);
        assert_eq!(
            ControlPlaneItemKind::TableMatchEntry.to_string(),
            "table_match_entry"
        );
    }
}
