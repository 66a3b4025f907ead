//! Conversion of decoded control-plane records.
//!
//! Records arrive already decoded (wire formats are handled elsewhere) and address entities
//! by their control-plane names. Every record is converted in full before the configuration
//! is touched, so a rejected record leaves no trace besides its
//! [`EventKind::RecordRejected`] event.
//!
//! # Example
//!
//! ```rust,ignore
//! let record = TableEntryRecord::new("ingress.fwd", "set_port")
//!     .with_match("dst", FieldMatch::Exact(Literal::bits(5, 8)))
//!     .with_param("port", Literal::bits(2, 9));
//! let touched = apply_updates(
//!     &program,
//!     &target,
//!     &mut constraints,
//!     &[Entity::TableEntry(UpdateKind::Insert, record)],
//!     &events,
//! );
//! substitution.recompute_scoped(&touched, &constraints)?;
//! ```

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    control_plane::{
        initializer::argument_value, objects, ActionAssignment, ControlPlaneAssignmentSet,
        ControlPlaneConstraints, ControlPlaneItem, ControlPlaneObject, TableConfiguration,
        TableDefaultAction, TableEntry, TableKeySet, TableMatchEntry, WildCardMatchEntry,
    },
    events::{EventKind, EventLog},
    expr::{width_mask, Literal, SymbolicVariable},
    interp::Target,
    ir::{ActionDecl, KeySetElement, Program, TableDecl},
    ControlPlaneError, Result,
};

const TABLE_ENTRY: &str = "table entry";
const DEFAULT_ACTION: &str = "default action";
const VALUE_SET: &str = "value set";

/// What a table entry record does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateKind {
    /// Adds an entry; its key must not be installed yet.
    Insert,
    /// Replaces the action of an installed entry.
    Modify,
    /// Removes an installed entry.
    Delete,
}

/// The match of one key field in a table entry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// The key equals the value.
    Exact(Literal),
    /// The first `prefix_len` bits of the key equal those of the value.
    Lpm {
        /// The value.
        value: Literal,
        /// Number of leading bits compared.
        prefix_len: u32,
    },
    /// The key equals the value on the bits set in the mask.
    Ternary {
        /// The value.
        value: Literal,
        /// The mask.
        mask: Literal,
    },
    /// The key lies between the bounds, inclusive.
    Range {
        /// Lower bound.
        low: Literal,
        /// Upper bound.
        high: Literal,
    },
    /// The key equals the value.
    Optional(Literal),
}

impl FieldMatch {
    /// The match kind name this field match belongs to.
    #[must_use]
    pub fn match_kind(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::Lpm { .. } => "lpm",
            Self::Ternary { .. } => "ternary",
            Self::Range { .. } => "range",
            Self::Optional(_) => "optional",
        }
    }
}

/// A decoded table entry.
///
/// Key fields without a match are wildcards; an exact field must always be present. For
/// [`UpdateKind::Delete`] the action is not looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntryRecord {
    /// Control-plane name of the table.
    pub table: String,
    /// Field matches by key field name.
    pub matches: BTreeMap<String, FieldMatch>,
    /// Control-plane name of the action.
    pub action: String,
    /// Action arguments by parameter name.
    pub params: BTreeMap<String, Literal>,
    /// Entry priority; higher wins.
    pub priority: i32,
}

impl TableEntryRecord {
    /// Creates a record without field matches, arguments or priority.
    #[must_use]
    pub fn new(table: &str, action: &str) -> Self {
        Self {
            table: table.to_string(),
            matches: BTreeMap::new(),
            action: action.to_string(),
            params: BTreeMap::new(),
            priority: 0,
        }
    }

    /// Adds the match of key field `field`.
    #[must_use]
    pub fn with_match(mut self, field: &str, field_match: FieldMatch) -> Self {
        self.matches.insert(field.to_string(), field_match);
        self
    }

    /// Adds the argument of action parameter `param`.
    #[must_use]
    pub fn with_param(mut self, param: &str, value: Literal) -> Self {
        self.params.insert(param.to_string(), value);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A decoded control-plane record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// Inserts, modifies or deletes a table entry.
    TableEntry(UpdateKind, TableEntryRecord),
    /// Replaces the default action of a table.
    DefaultAction {
        /// Control-plane name of the table.
        table: String,
        /// Control-plane name of the action.
        action: String,
        /// Action arguments by parameter name.
        params: BTreeMap<String, Literal>,
    },
    /// Sets the members of a parser value set.
    ValueSetMembers {
        /// Control-plane name of the value set.
        value_set: String,
        /// The members.
        members: Vec<Literal>,
    },
}

impl Entity {
    /// The control-plane name of the addressed entity.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        match self {
            Self::TableEntry(_, record) => &record.table,
            Self::DefaultAction { table, .. } => table,
            Self::ValueSetMembers { value_set, .. } => value_set,
        }
    }
}

/// Applies a batch of records to `constraints`.
///
/// Records are applied in order. A record that cannot be converted is reported as
/// [`EventKind::RecordRejected`] and skipped; the rest of the batch is still applied.
///
/// # Arguments
///
/// * `program` - The program the records address
/// * `target` - Supplies the match kinds of table keys
/// * `constraints` - The configuration to update
/// * `records` - The decoded records
/// * `events` - Receives one event per record
///
/// # Returns
///
/// The variables whose assignment changed, for a scoped recompute.
pub fn apply_updates(
    program: &Program,
    target: &dyn Target,
    constraints: &mut ControlPlaneConstraints,
    records: &[Entity],
    events: &EventLog,
) -> BTreeSet<SymbolicVariable> {
    let mut touched = BTreeSet::new();
    let mut rejected = 0usize;
    for record in records {
        match apply_update(program, target, constraints, record) {
            Ok(symbols) => {
                events
                    .record(EventKind::RecordApplied)
                    .entity(record.entity_name())
                    .message(format!("{} symbols changed", symbols.len()));
                touched.extend(symbols);
            }
            Err(error) => {
                warn!("skipping control-plane record: {error}");
                events
                    .record(EventKind::RecordRejected)
                    .entity(record.entity_name())
                    .message(error.to_string());
                rejected += 1;
            }
        }
    }
    debug!(
        "applied {} of {} control-plane records, {} symbols changed",
        records.len() - rejected,
        records.len(),
        touched.len()
    );
    touched
}

/// Applies a single record to `constraints`.
///
/// # Errors
///
/// Returns [`crate::Error::ControlPlane`] if the record cannot be converted. The
/// configuration is unchanged in that case.
pub fn apply_update(
    program: &Program,
    target: &dyn Target,
    constraints: &mut ControlPlaneConstraints,
    record: &Entity,
) -> Result<BTreeSet<SymbolicVariable>> {
    let converter = RecordConverter { program, target };
    let symbols = match record {
        Entity::TableEntry(kind, entry) => converter.table_entry(constraints, *kind, entry)?,
        Entity::DefaultAction {
            table,
            action,
            params,
        } => converter.default_action(constraints, table, action, params)?,
        Entity::ValueSetMembers { value_set, members } => {
            converter.value_set(constraints, value_set, members)?
        }
    };
    Ok(symbols)
}

struct RecordConverter<'a> {
    program: &'a Program,
    target: &'a dyn Target,
}

impl RecordConverter<'_> {
    fn table_entry(
        &self,
        constraints: &mut ControlPlaneConstraints,
        kind: UpdateKind,
        record: &TableEntryRecord,
    ) -> std::result::Result<BTreeSet<SymbolicVariable>, ControlPlaneError> {
        let reject = |reason: String| ControlPlaneError::new(TABLE_ENTRY, &record.table, reason);
        let table = self.table(TABLE_ENTRY, &record.table)?;
        if table.is_immutable() {
            return Err(reject("table entries are constant".to_string()));
        }
        let keys = self.key_set(table, record)?;
        let key_expression = objects::key_expression(&keys);

        // Delete does not look at the action.
        let entry = if kind == UpdateKind::Delete {
            None
        } else {
            let action = self.action(TABLE_ENTRY, table, &record.action)?;
            if table
                .action_ref(&action.name)
                .is_some_and(|a| a.default_only)
            {
                return Err(reject(format!(
                    "action {} may only be used as default action",
                    record.action
                )));
            }
            let assignment = assignment(TABLE_ENTRY, table, action, &record.params)?;
            Some(if keys.is_empty() {
                TableEntry::from(WildCardMatchEntry::new(assignment, record.priority))
            } else {
                TableMatchEntry::new(assignment, record.priority, keys).into()
            })
        };

        edit_table(constraints, TABLE_ENTRY, &record.table, |configuration| {
            let installed = configuration.contains_entry(&key_expression);
            match (kind, entry) {
                (UpdateKind::Insert, _) if installed => {
                    Err(reject("an entry with this key is already installed".to_string()))
                }
                (UpdateKind::Modify | UpdateKind::Delete, _) if !installed => {
                    Err(reject("no entry with this key is installed".to_string()))
                }
                (UpdateKind::Delete, _) => {
                    configuration.delete_entry(&key_expression);
                    Ok(())
                }
                (_, Some(entry)) => {
                    configuration.add_entry(entry);
                    Ok(())
                }
                (_, None) => Err(reject("record has no action".to_string())),
            }
        })
    }

    fn default_action(
        &self,
        constraints: &mut ControlPlaneConstraints,
        table_name: &str,
        action_name: &str,
        params: &BTreeMap<String, Literal>,
    ) -> std::result::Result<BTreeSet<SymbolicVariable>, ControlPlaneError> {
        let table = self.table(DEFAULT_ACTION, table_name)?;
        if table.default_is_const {
            return Err(ControlPlaneError::new(
                DEFAULT_ACTION,
                table_name,
                "the default action is constant",
            ));
        }
        let action = self.action(DEFAULT_ACTION, table, action_name)?;
        if table.action_ref(&action.name).is_some_and(|a| a.table_only) {
            return Err(ControlPlaneError::new(
                DEFAULT_ACTION,
                table_name,
                format!("action {action_name} may not be used as default action"),
            ));
        }
        let default = TableDefaultAction::new(assignment(DEFAULT_ACTION, table, action, params)?);
        edit_table(constraints, DEFAULT_ACTION, table_name, |configuration| {
            configuration.set_default_action(default);
            Ok(())
        })
    }

    fn value_set(
        &self,
        constraints: &mut ControlPlaneConstraints,
        name: &str,
        members: &[Literal],
    ) -> std::result::Result<BTreeSet<SymbolicVariable>, ControlPlaneError> {
        let value_set = self
            .program
            .value_sets()
            .find(|vs| vs.control_plane_name == name)
            .ok_or_else(|| ControlPlaneError::new(VALUE_SET, name, "unknown value set"))?;
        if members.len() > value_set.size {
            return Err(ControlPlaneError::new(
                VALUE_SET,
                name,
                format!("{} members exceed the size {}", members.len(), value_set.size),
            ));
        }
        if let Some(member) = members.iter().find(|m| m.cast(value_set.ty).is_none()) {
            return Err(ControlPlaneError::new(
                VALUE_SET,
                name,
                format!("member {member} does not fit type {}", value_set.ty),
            ));
        }
        // Members are not modelled; the set stays configured.
        match constraints.get(name) {
            Some(ControlPlaneItem::ParserValueSet(_)) => Ok(BTreeSet::new()),
            _ => Err(ControlPlaneError::new(
                VALUE_SET,
                name,
                "value set is not part of the configuration",
            )),
        }
    }

    fn table(
        &self,
        entity_kind: &'static str,
        name: &str,
    ) -> std::result::Result<&TableDecl, ControlPlaneError> {
        self.program
            .tables()
            .find(|t| t.control_plane_name == name)
            .ok_or_else(|| ControlPlaneError::new(entity_kind, name, "unknown table"))
    }

    fn action(
        &self,
        entity_kind: &'static str,
        table: &TableDecl,
        name: &str,
    ) -> std::result::Result<&ActionDecl, ControlPlaneError> {
        table
            .actions
            .iter()
            .filter_map(|a| self.program.action(&a.name).ok())
            .find(|a| a.control_plane_name == name)
            .ok_or_else(|| {
                ControlPlaneError::new(
                    entity_kind,
                    &table.control_plane_name,
                    format!("action {name} is not an action of this table"),
                )
            })
    }

    fn key_set(
        &self,
        table: &TableDecl,
        record: &TableEntryRecord,
    ) -> std::result::Result<TableKeySet, ControlPlaneError> {
        let cp_table = table.control_plane_name.as_str();
        let reject = |field: &str, reason: String| {
            ControlPlaneError::new(TABLE_ENTRY, cp_table, reason).with_field(field)
        };

        let mut keys = TableKeySet::new();
        let mut seen = 0usize;
        for key in &table.keys {
            let field = key.name.as_deref().ok_or_else(|| {
                ControlPlaneError::new(TABLE_ENTRY, cp_table, "key without a name annotation")
            })?;
            let handler = self
                .target
                .match_kinds()
                .get(&key.match_kind)
                .map_err(|e| reject(field, e.to_string()))?;
            let element = match record.matches.get(field) {
                Some(field_match) => {
                    seen += 1;
                    if field_match.match_kind() != key.match_kind {
                        return Err(reject(
                            field,
                            format!(
                                "{} match for a {} key",
                                field_match.match_kind(),
                                key.match_kind
                            ),
                        ));
                    }
                    key_set_element(field_match, key.ty.width())
                        .map_err(|reason| reject(field, reason))?
                }
                None if key.match_kind == "exact" => {
                    return Err(reject(field, "exact field must be present".to_string()));
                }
                None => KeySetElement::DontCare,
            };
            let pairs = handler
                .control_plane_pairs(cp_table, field, key.ty, &element)
                .map_err(|e| reject(field, e.to_string()))?;
            keys.extend(pairs);
        }
        if seen != record.matches.len() {
            let unknown = record
                .matches
                .keys()
                .find(|f| !table.keys.iter().any(|k| k.name.as_deref() == Some(f)))
                .map_or("", String::as_str);
            return Err(reject(unknown, "unknown key field".to_string()));
        }
        Ok(keys)
    }
}

fn key_set_element(
    field_match: &FieldMatch,
    width: Option<u32>,
) -> std::result::Result<KeySetElement, String> {
    Ok(match field_match {
        FieldMatch::Exact(value) | FieldMatch::Optional(value) => {
            KeySetElement::Value(value.clone())
        }
        FieldMatch::Lpm { value, prefix_len } => {
            let width = width.ok_or("lpm key has no width")?;
            if *prefix_len > width {
                return Err(format!("prefix length {prefix_len} exceeds width {width}"));
            }
            let mask = width_mask(width) & !width_mask(width - prefix_len);
            KeySetElement::Masked {
                value: value.clone(),
                mask: Literal::bits(mask, width),
            }
        }
        FieldMatch::Ternary { value, mask } => KeySetElement::Masked {
            value: value.clone(),
            mask: mask.clone(),
        },
        FieldMatch::Range { low, high } => KeySetElement::Range {
            min: low.clone(),
            max: high.clone(),
        },
    })
}

fn assignment(
    entity_kind: &'static str,
    table: &TableDecl,
    action: &ActionDecl,
    params: &BTreeMap<String, Literal>,
) -> std::result::Result<ActionAssignment, ControlPlaneError> {
    let cp_table = table.control_plane_name.as_str();
    let reject = |field: &str, reason: String| {
        ControlPlaneError::new(entity_kind, cp_table, reason).with_field(field)
    };

    if let Some(unknown) = params
        .keys()
        .find(|p| !action.params.iter().any(|d| &d.control_plane_name == *p))
    {
        return Err(reject(
            unknown,
            format!("action {} has no such parameter", action.control_plane_name),
        ));
    }
    let mut assignment = ActionAssignment::new(cp_table, &action.control_plane_name);
    for param in &action.params {
        let name = param.control_plane_name.as_str();
        let value = params
            .get(name)
            .ok_or_else(|| reject(name, "missing action argument".to_string()))?;
        let ty = param
            .ty
            .as_value()
            .ok_or_else(|| reject(name, "parameter is not a scalar".to_string()))?;
        let value = argument_value(value, ty).map_err(|e| reject(name, e.to_string()))?;
        assignment = assignment.with_arg(name, value);
    }
    Ok(assignment)
}

/// Runs `edit` on the configuration of table `name` and reports the variables whose
/// assignment changed.
fn edit_table(
    constraints: &mut ControlPlaneConstraints,
    entity_kind: &'static str,
    name: &str,
    edit: impl FnOnce(&mut TableConfiguration) -> std::result::Result<(), ControlPlaneError>,
) -> std::result::Result<BTreeSet<SymbolicVariable>, ControlPlaneError> {
    let item = constraints.get_mut(name).ok_or_else(|| {
        ControlPlaneError::new(entity_kind, name, "table is not part of the configuration")
    })?;
    let before = item.compute_control_plane_assignments();
    let configuration = item.as_table_configuration_mut().ok_or_else(|| {
        ControlPlaneError::new(entity_kind, name, "entity is not a table")
    })?;
    edit(configuration)?;
    let after = item.compute_control_plane_assignments();
    Ok(changed_symbols(&before, &after))
}

fn changed_symbols(
    before: &ControlPlaneAssignmentSet,
    after: &ControlPlaneAssignmentSet,
) -> BTreeSet<SymbolicVariable> {
    before
        .keys()
        .chain(after.keys())
        .filter(|var| before.get(*var) != after.get(*var))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        control_plane::{
            update::{apply_update, apply_updates, Entity, FieldMatch, TableEntryRecord, UpdateKind},
            ControlPlaneConstraints, ControlPlaneStateInitializer,
        },
        events::{EventKind, EventLog},
        expr::{Expr, Literal, SymbolicVariable, ValueType},
        interp::V1Model,
        ir::{
            ActionCall, ActionDecl, ActionRef, ControlDecl, Direction, Expression, KeyElement,
            Param, Program, TableDecl, Type,
        },
        Error,
    };

    fn program() -> Program {
        let table = TableDecl::new(
            "fwd",
            vec![
                KeyElement::new(Expression::path("hdr.dst"), ValueType::bits(8), "exact", "dst"),
                KeyElement::new(Expression::path("hdr.src"), ValueType::bits(8), "ternary", "src"),
            ],
            vec![ActionRef::new("set_port"), ActionRef::new("drop")],
            ActionCall::new("drop", vec![]),
        );
        Program {
            controls: vec![ControlDecl {
                name: "ingress".to_string(),
                params: vec![],
                locals: vec![],
                actions: vec![
                    ActionDecl::new(
                        "set_port",
                        vec![Param::new("port", Type::bits(9), Direction::None)],
                        vec![],
                    ),
                    ActionDecl::new("drop", vec![], vec![]),
                ],
                tables: vec![table],
                body: vec![],
            }],
            ..Program::default()
        }
    }

    fn setup(program: &Program) -> ControlPlaneConstraints {
        let events = EventLog::new();
        ControlPlaneStateInitializer::new(program, &V1Model::new(), &events).default_constraints()
    }

    fn forward(dst: u128, port: u128) -> TableEntryRecord {
        TableEntryRecord::new("fwd", "set_port")
            .with_match("dst", FieldMatch::Exact(Literal::bits(dst, 8)))
            .with_param("port", Literal::bits(port, 9))
    }

    #[test]
    fn test_insert_reports_changed_symbols() {
        let program = program();
        let mut constraints = setup(&program);
        let events = EventLog::new();
        let touched = apply_updates(
            &program,
            &V1Model::new(),
            &mut constraints,
            &[Entity::TableEntry(UpdateKind::Insert, forward(5, 2))],
            &events,
        );

        assert!(touched.contains(&SymbolicVariable::table_active("fwd")));
        assert!(touched.contains(&SymbolicVariable::table_key("fwd", "dst", ValueType::bits(8))));
        assert!(touched.contains(&SymbolicVariable::action_choice("fwd")));
        assert_eq!(constraints.table("fwd").map(|t| t.len()), Some(1));

        // The missing ternary field is a wildcard.
        let assignments = constraints.assignments();
        assert_eq!(
            assignments.get(&SymbolicVariable::ternary_mask("fwd", "src", ValueType::bits(8))),
            Some(&Expr::bits(0, 8))
        );
        assert!(events.has(EventKind::RecordApplied));
    }

    #[test]
    fn test_modify_and_delete_need_installed_entry() {
        let program = program();
        let target = V1Model::new();
        let mut constraints = setup(&program);

        let result = apply_update(
            &program,
            &target,
            &mut constraints,
            &Entity::TableEntry(UpdateKind::Modify, forward(5, 3)),
        );
        assert!(matches!(result, Err(Error::ControlPlane(_))));

        apply_update(
            &program,
            &target,
            &mut constraints,
            &Entity::TableEntry(UpdateKind::Insert, forward(5, 2)),
        )
        .unwrap();
        let touched = apply_update(
            &program,
            &target,
            &mut constraints,
            &Entity::TableEntry(UpdateKind::Modify, forward(5, 3)),
        )
        .unwrap();
        let port = SymbolicVariable::action_argument("fwd", "set_port", "port", ValueType::bits(9));
        assert_eq!(touched.into_iter().collect::<Vec<_>>(), vec![port]);

        let delete = TableEntryRecord::new("fwd", "")
            .with_match("dst", FieldMatch::Exact(Literal::bits(5, 8)));
        apply_update(
            &program,
            &target,
            &mut constraints,
            &Entity::TableEntry(UpdateKind::Delete, delete),
        )
        .unwrap();
        assert_eq!(constraints.table("fwd").map(|t| t.len()), Some(0));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let program = program();
        let mut constraints = setup(&program);
        let events = EventLog::new();
        let missing_exact = TableEntryRecord::new("fwd", "drop");
        let wrong_kind = TableEntryRecord::new("fwd", "drop")
            .with_match("dst", FieldMatch::Exact(Literal::bits(1, 8)))
            .with_match("src", FieldMatch::Lpm {
                value: Literal::bits(1, 8),
                prefix_len: 4,
            });
        let missing_arg = TableEntryRecord::new("fwd", "set_port")
            .with_match("dst", FieldMatch::Exact(Literal::bits(1, 8)));
        let records = [
            Entity::TableEntry(UpdateKind::Insert, missing_exact),
            Entity::TableEntry(UpdateKind::Insert, wrong_kind),
            Entity::TableEntry(UpdateKind::Insert, missing_arg),
            Entity::TableEntry(UpdateKind::Insert, forward(7, 1)),
        ];

        let touched = apply_updates(&program, &V1Model::new(), &mut constraints, &records, &events);
        assert_eq!(events.count_kind(EventKind::RecordRejected), 3);
        assert_eq!(events.count_kind(EventKind::RecordApplied), 1);
        assert!(!touched.is_empty());
        assert_eq!(constraints.table("fwd").map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_default_action_update() {
        let program = program();
        let mut constraints = setup(&program);
        let mut params = BTreeMap::new();
        params.insert("port".to_string(), Literal::bits(4, 9));
        let touched = apply_update(
            &program,
            &V1Model::new(),
            &mut constraints,
            &Entity::DefaultAction {
                table: "fwd".to_string(),
                action: "set_port".to_string(),
                params,
            },
        )
        .unwrap();

        assert!(touched.contains(&SymbolicVariable::default_action("fwd")));
        assert_eq!(
            constraints
                .assignments()
                .get(&SymbolicVariable::default_action("fwd")),
            Some(&Expr::string("set_port"))
        );
    }
}
