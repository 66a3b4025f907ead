//! Symbolic variables.
//!
//! A [`SymbolicVariable`] stands for one fact that is not known at analysis time: a value
//! the control plane may configure (a table key, the chosen action, an action argument,
//! whether a table or value set is populated) or a data-plane input (a header field of the
//! incoming packet).
//!
//! Variables are identified by the triple `(entity, role, field)`. The value type is
//! carried along for type queries but does not take part in identity, so two variables
//! naming the same triple are the same variable wherever they are created.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use crate::expr::ValueType;

/// The role a symbolic variable plays for its entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableRole {
    /// The configured key value of a table key field.
    TableKey,
    /// The configured mask of a ternary key field.
    TernaryMask,
    /// The configured prefix length of an lpm key field.
    LpmPrefix,
    /// The lower bound of a range key field.
    RangeMin,
    /// The upper bound of a range key field.
    RangeMax,
    /// A selector key field.
    SelectorKey,
    /// The action chosen by a matching table entry.
    ActionChoice,
    /// The action chosen as the table's default action.
    DefaultAction,
    /// An argument of an action invoked by the table. Carries the action's control-plane
    /// name.
    ActionArgument(String),
    /// Whether the table holds any control-plane entries.
    TableActive,
    /// Whether a parser value set is populated.
    ValueSetConfigured,
    /// A member of a parser value set.
    ValueSetMember,
    /// A data-plane input value, named by its path.
    Input,
}

/// A typed, named placeholder for a value not known during analysis.
#[derive(Debug, Clone)]
pub struct SymbolicVariable {
    entity: String,
    role: VariableRole,
    field: String,
    ty: ValueType,
}

impl SymbolicVariable {
    /// Creates a new variable.
    ///
    /// # Arguments
    ///
    /// * `entity` - Control-plane name of the owning entity, or the path of an input
    /// * `role` - What the variable stands for
    /// * `field` - Field, parameter or key name; empty when the role needs none
    /// * `ty` - Value type of the variable
    #[must_use]
    pub fn new(
        entity: impl Into<String>,
        role: VariableRole,
        field: impl Into<String>,
        ty: ValueType,
    ) -> Self {
        Self {
            entity: entity.into(),
            role,
            field: field.into(),
            ty,
        }
    }

    /// The configured key of table `table` for key field `field`.
    #[must_use]
    pub fn table_key(table: &str, field: &str, ty: ValueType) -> Self {
        Self::new(table, VariableRole::TableKey, field, ty)
    }

    /// The ternary mask of table `table` for key field `field`.
    #[must_use]
    pub fn ternary_mask(table: &str, field: &str, ty: ValueType) -> Self {
        Self::new(table, VariableRole::TernaryMask, field, ty)
    }

    /// The prefix length of table `table` for lpm key field `field`.
    ///
    /// Prefix lengths are plain integers.
    #[must_use]
    pub fn lpm_prefix(table: &str, field: &str) -> Self {
        Self::new(table, VariableRole::LpmPrefix, field, ValueType::Int)
    }

    /// The lower bound of table `table` for range key field `field`.
    #[must_use]
    pub fn range_min(table: &str, field: &str, ty: ValueType) -> Self {
        Self::new(table, VariableRole::RangeMin, field, ty)
    }

    /// The upper bound of table `table` for range key field `field`.
    #[must_use]
    pub fn range_max(table: &str, field: &str, ty: ValueType) -> Self {
        Self::new(table, VariableRole::RangeMax, field, ty)
    }

    /// The selector key of table `table` for key field `field`.
    #[must_use]
    pub fn selector_key(table: &str, field: &str, ty: ValueType) -> Self {
        Self::new(table, VariableRole::SelectorKey, field, ty)
    }

    /// The action chosen by matching entries of `table`.
    #[must_use]
    pub fn action_choice(table: &str) -> Self {
        Self::new(table, VariableRole::ActionChoice, "", ValueType::String)
    }

    /// The default action chosen for `table`.
    #[must_use]
    pub fn default_action(table: &str) -> Self {
        Self::new(table, VariableRole::DefaultAction, "", ValueType::String)
    }

    /// Argument `param` of action `action` when invoked by `table`.
    #[must_use]
    pub fn action_argument(table: &str, action: &str, param: &str, ty: ValueType) -> Self {
        Self::new(
            table,
            VariableRole::ActionArgument(action.to_string()),
            param,
            ty,
        )
    }

    /// Whether `table` holds control-plane entries.
    #[must_use]
    pub fn table_active(table: &str) -> Self {
        Self::new(table, VariableRole::TableActive, "", ValueType::Bool)
    }

    /// Whether value set `value_set` is populated.
    #[must_use]
    pub fn value_set_configured(value_set: &str) -> Self {
        Self::new(value_set, VariableRole::ValueSetConfigured, "", ValueType::Bool)
    }

    /// A member of value set `value_set`.
    #[must_use]
    pub fn value_set_member(value_set: &str, ty: ValueType) -> Self {
        Self::new(value_set, VariableRole::ValueSetMember, "", ty)
    }

    /// A data-plane input located at `path`.
    #[must_use]
    pub fn input(path: &str, ty: ValueType) -> Self {
        Self::new(path, VariableRole::Input, "", ty)
    }

    /// Returns the owning entity name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the role of this variable.
    #[must_use]
    pub const fn role(&self) -> &VariableRole {
        &self.role
    }

    /// Returns the field name, empty for roles without a field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the value type.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.ty
    }

    /// Checks whether the variable is configured by the control plane.
    ///
    /// Data-plane inputs are the only variables the control plane never assigns.
    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.role != VariableRole::Input
    }

    /// Returns the rendered control-plane name, e.g. `ipv4_lpm_key_dstAddr`.
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }

    fn identity(&self) -> (&str, &VariableRole, &str) {
        (&self.entity, &self.role, &self.field)
    }
}

impl PartialEq for SymbolicVariable {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for SymbolicVariable {}

impl Hash for SymbolicVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for SymbolicVariable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SymbolicVariable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for SymbolicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entity, field) = (&self.entity, &self.field);
        match &self.role {
            VariableRole::TableKey => write!(f, "{entity}_key_{field}"),
            VariableRole::TernaryMask => write!(f, "{entity}_mask_{field}"),
            VariableRole::LpmPrefix => write!(f, "{entity}_lpm_prefix_{field}"),
            VariableRole::RangeMin => write!(f, "{entity}_range_min_{field}"),
            VariableRole::RangeMax => write!(f, "{entity}_range_max_{field}"),
            VariableRole::SelectorKey => write!(f, "{entity}_selector_{field}"),
            VariableRole::ActionChoice => write!(f, "{entity}_action"),
            VariableRole::DefaultAction => write!(f, "{entity}_default_action"),
            VariableRole::ActionArgument(action) => write!(f, "{entity}_{action}_{field}"),
            VariableRole::TableActive | VariableRole::ValueSetConfigured => {
                write!(f, "{entity}_configured")
            }
            VariableRole::ValueSetMember => write!(f, "{entity}_member"),
            VariableRole::Input => write!(f, "{entity}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::expr::{SymbolicVariable, ValueType};

    #[test]
    fn test_rendered_names() {
        assert_eq!(
            SymbolicVariable::table_key("ipv4_lpm", "dstAddr", ValueType::bits(32)).name(),
            "ipv4_lpm_key_dstAddr"
        );
        assert_eq!(
            SymbolicVariable::lpm_prefix("ipv4_lpm", "dstAddr").name(),
            "ipv4_lpm_lpm_prefix_dstAddr"
        );
        assert_eq!(
            SymbolicVariable::action_argument("fwd", "set_port", "port", ValueType::bits(9))
                .name(),
            "fwd_set_port_port"
        );
        assert_eq!(SymbolicVariable::table_active("fwd").name(), "fwd_configured");
        assert_eq!(
            SymbolicVariable::input("hdr.ipv4.ttl", ValueType::bits(8)).name(),
            "hdr.ipv4.ttl"
        );
    }

    #[test]
    fn test_identity_ignores_type() {
        let a = SymbolicVariable::table_key("t", "f", ValueType::bits(8));
        let b = SymbolicVariable::table_key("t", "f", ValueType::bits(16));
        assert_eq!(a, b);

        let set: BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_roles_distinguish() {
        let active = SymbolicVariable::table_active("x");
        let value_set = SymbolicVariable::value_set_configured("x");
        // Same rendered name, different variables.
        assert_eq!(active.name(), value_set.name());
        assert_ne!(active, value_set);
    }
}
