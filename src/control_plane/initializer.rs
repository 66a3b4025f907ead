//! The configuration a program starts with.
//!
//! Before the control plane has installed anything, every table runs its declared default
//! action and holds exactly the entries written in the program. [`ControlPlaneStateInitializer`]
//! turns those declarations into [`ControlPlaneConstraints`].

use log::debug;

use crate::{
    control_plane::{
        ActionAssignment, ActionProfile, ActionSelector, ControlPlaneConstraints, ControlPlaneItem,
        ParserValueSet, TableActionSelectorConfiguration, TableConfiguration, TableDefaultAction,
        TableEntry, TableKeySet, TableMatchEntry, WildCardMatchEntry,
    },
    events::{EventKind, EventLog},
    expr::{Literal, ValueType},
    interp::Target,
    ir::{ActionCall, ActionDecl, ConstEntry, Expression, Program, TableDecl, TableImplementation},
    Result,
};

/// Builds the default control-plane configuration of a program.
///
/// Tables whose declarations cannot be converted are reported as
/// [`EventKind::RecordRejected`] and left out; the remaining entities are still converted.
pub struct ControlPlaneStateInitializer<'a> {
    program: &'a Program,
    target: &'a dyn Target,
    events: &'a EventLog,
}

impl<'a> ControlPlaneStateInitializer<'a> {
    /// Creates an initializer.
    ///
    /// # Arguments
    ///
    /// * `program` - The typed program
    /// * `target` - Supplies the match kinds used to convert constant entries
    /// * `events` - Receives one event per converted or rejected entity
    #[must_use]
    pub fn new(program: &'a Program, target: &'a dyn Target, events: &'a EventLog) -> Self {
        Self {
            program,
            target,
            events,
        }
    }

    /// Computes the default configuration.
    ///
    /// # Returns
    ///
    /// One table configuration per table, one value set item per parser value set, and one
    /// item per action profile and action selector.
    #[must_use]
    pub fn default_constraints(&self) -> ControlPlaneConstraints {
        let mut constraints = ControlPlaneConstraints::new();
        for table in self.program.tables() {
            let name = table.control_plane_name.as_str();
            match self.table_item(table) {
                Ok(item) => {
                    Self::register_implementation(&mut constraints, table);
                    constraints.insert(name, item);
                    self.events.record(EventKind::ItemInitialized).entity(name);
                }
                Err(error) => {
                    self.events
                        .record(EventKind::RecordRejected)
                        .entity(name)
                        .message(error.to_string());
                }
            }
        }
        for value_set in self.program.value_sets() {
            let name = value_set.control_plane_name.as_str();
            constraints.insert(name, ParserValueSet::new(name));
            self.events.record(EventKind::ItemInitialized).entity(name);
        }
        debug!("initialized {} control-plane entities", constraints.len());
        constraints
    }

    fn table_item(&self, table: &TableDecl) -> Result<ControlPlaneItem> {
        let default_action = self.default_action(table)?;
        let mut configuration =
            TableConfiguration::new(&table.control_plane_name, default_action);
        for entry in table.entries.iter().flat_map(|e| e.entries.iter()) {
            configuration.add_entry(self.entry(table, entry)?);
        }
        Ok(match table.implementation {
            Some(TableImplementation::ActionSelector { .. }) => {
                TableActionSelectorConfiguration::new(configuration).into()
            }
            _ => configuration.into(),
        })
    }

    fn register_implementation(constraints: &mut ControlPlaneConstraints, table: &TableDecl) {
        let table_name = table.control_plane_name.as_str();
        match &table.implementation {
            None => {}
            Some(TableImplementation::ActionProfile(profile)) => {
                associate_profile(constraints, profile, table_name);
            }
            Some(TableImplementation::ActionSelector { selector, profile }) => {
                associate_profile(constraints, profile, table_name);
                if let Some(ControlPlaneItem::ActionSelector(existing)) =
                    constraints.get_mut(selector)
                {
                    existing.add_associated_table(table_name);
                    return;
                }
                let mut item = ActionSelector::new(selector, profile);
                item.add_associated_table(table_name);
                constraints.insert(selector.as_str(), item);
            }
        }
    }

    /// `{t}_action == a && {t}_default_action == a` plus the literal arguments.
    fn default_action(&self, table: &TableDecl) -> Result<TableDefaultAction> {
        let action = self.program.action(&table.default_action.name)?;
        let assignment = action_assignment(table, action, &table.default_action)?;
        Ok(TableDefaultAction::new(assignment))
    }

    fn entry(&self, table: &TableDecl, entry: &ConstEntry) -> Result<TableEntry> {
        if entry.keys.len() != table.keys.len() {
            return Err(malformed_error!(
                "Entry key list and key match list of table {} must be equal in size",
                table.name
            ));
        }
        let action = self.program.action(&entry.action.name)?;
        let assignment = action_assignment(table, action, &entry.action)?;
        let priority = entry.priority.unwrap_or(0);

        let mut keys = TableKeySet::new();
        for (key, element) in table.keys.iter().zip(&entry.keys) {
            let field = key.name.as_deref().ok_or_else(|| {
                malformed_error!("Key in table {} does not have a name annotation", table.name)
            })?;
            let handler = self.target.match_kinds().get(&key.match_kind)?;
            keys.extend(handler.control_plane_pairs(
                &table.control_plane_name,
                field,
                key.ty,
                element,
            )?);
        }
        Ok(if keys.is_empty() {
            WildCardMatchEntry::new(assignment, priority).into()
        } else {
            TableMatchEntry::new(assignment, priority, keys).into()
        })
    }
}

fn associate_profile(constraints: &mut ControlPlaneConstraints, profile: &str, table: &str) {
    if let Some(ControlPlaneItem::ActionProfile(existing)) = constraints.get_mut(profile) {
        existing.add_associated_table(table);
        return;
    }
    let mut item = ActionProfile::new(profile);
    item.add_associated_table(table);
    constraints.insert(profile, item);
}

/// Converts an action call written in a table into an action assignment.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the argument count differs from the parameter
/// count or an argument is not a literal of the parameter's type.
pub(crate) fn action_assignment(
    table: &TableDecl,
    action: &ActionDecl,
    call: &ActionCall,
) -> Result<ActionAssignment> {
    if call.args.len() != action.params.len() {
        return Err(malformed_error!(
            "Entry call {} in table {} does not have the right number of arguments",
            call.name,
            table.name
        ));
    }
    let mut assignment =
        ActionAssignment::new(&table.control_plane_name, &action.control_plane_name);
    for (param, arg) in action.params.iter().zip(&call.args) {
        let Expression::Literal(literal) = arg else {
            return Err(malformed_error!(
                "Argument {} of {} in table {} is not a constant",
                param.name,
                call.name,
                table.name
            ));
        };
        let ty = param.ty.as_value().ok_or_else(|| {
            malformed_error!("Parameter {} of {} is not a scalar", param.name, action.name)
        })?;
        assignment = assignment.with_arg(&param.control_plane_name, argument_value(literal, ty)?);
    }
    Ok(assignment)
}

/// Converts an argument to the representation its parameter variable uses.
///
/// Boolean parameters are carried as `bit<1>`.
pub(crate) fn argument_value(literal: &Literal, ty: ValueType) -> Result<Literal> {
    let converted = match ty {
        ValueType::Bool => literal.cast(ValueType::bits(1)),
        _ => literal.cast(ty),
    };
    converted.ok_or_else(|| malformed_error!("Argument {} does not fit type {}", literal, ty))
}
