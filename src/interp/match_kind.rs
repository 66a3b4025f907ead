//! Match kinds: how a table key is compared against control-plane configuration.
//!
//! Each match kind is a [`MatchKindHandler`]. A handler encodes three things for one key
//! element:
//!
//! - the symbolic match of the key against control-plane variables, used for tables whose
//!   entries the control plane may change,
//! - the literal match of the key against a constant entry written in the program,
//! - the control-plane variable assignments a concrete entry implies, used to build the
//!   constraints of initial and runtime entries.
//!
//! Handlers are registered by name in a [`MatchKindRegistry`] owned by the target. The
//! set is open: a target may register kinds of its own next to the [`CoreMatchKind`]s.

use std::fmt;

use rustc_hash::FxHashMap;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    expr::{width_mask, BinaryOp, Expr, Literal, SymbolicVariable, ValueType},
    ir::KeySetElement,
    Result,
};

/// The match kinds known to every target, by their P4 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CoreMatchKind {
    /// `exact`
    Exact,
    /// `ternary`
    Ternary,
    /// `lpm`
    Lpm,
    /// `optional`
    Optional,
    /// `selector`
    Selector,
    /// `range`
    Range,
}

impl CoreMatchKind {
    /// Returns the handler implementing this match kind.
    #[must_use]
    pub fn handler(self) -> Box<dyn MatchKindHandler> {
        match self {
            Self::Exact => Box::new(ExactMatch),
            Self::Ternary => Box::new(TernaryMatch),
            Self::Lpm => Box::new(LpmMatch),
            Self::Optional => Box::new(OptionalMatch),
            Self::Selector => Box::new(SelectorMatch),
            Self::Range => Box::new(RangeMatch),
        }
    }
}

/// A variable assignment implied by a concrete key set element.
pub type KeyAssignment = (SymbolicVariable, Literal);

/// The encoding of one match kind.
pub trait MatchKindHandler {
    /// Encodes the match of `key` against the control-plane variables of `table`.
    ///
    /// # Arguments
    ///
    /// * `table` - Control-plane name of the table
    /// * `field` - Control-plane name of the key element
    /// * `key` - The resolved key expression
    /// * `ty` - The key's type
    ///
    /// # Errors
    ///
    /// Returns an error if the key type cannot be matched with this kind.
    fn symbolic_match(&self, table: &str, field: &str, key: &Expr, ty: ValueType)
        -> Result<Expr>;

    /// Encodes the match of `key` against a key set element of a constant entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the element is not valid for this kind.
    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr>;

    /// Returns the control-plane assignments a concrete key set element implies.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the element is not valid for this kind.
    fn control_plane_pairs(
        &self,
        table: &str,
        field: &str,
        ty: ValueType,
        element: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>>;

    /// Returns the prefix length an element matches with, for kinds that order entries by
    /// prefix.
    ///
    /// `None` if the kind has no prefixes or the element is not a valid prefix.
    fn prefix_len(&self, _element: &KeySetElement, _ty: ValueType) -> Option<u32> {
        None
    }
}

/// Match kind handlers by name.
pub struct MatchKindRegistry {
    handlers: FxHashMap<String, Box<dyn MatchKindHandler>>,
}

impl MatchKindRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }

    /// Creates a registry holding every [`CoreMatchKind`].
    #[must_use]
    pub fn core() -> Self {
        let mut registry = Self::new();
        for kind in CoreMatchKind::iter() {
            registry.register(kind.as_ref(), kind.handler());
        }
        registry
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    pub fn register(&mut self, name: &str, handler: Box<dyn MatchKindHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Looks up the handler for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unimplemented`] for unknown match kinds.
    pub fn get(&self, name: &str) -> Result<&dyn MatchKindHandler> {
        self.handlers
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| unimplemented_error!("Match type {} not implemented for table keys", name))
    }

    /// Checks whether a handler for `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl Default for MatchKindRegistry {
    fn default() -> Self {
        Self::core()
    }
}

impl fmt::Debug for MatchKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("MatchKindRegistry")
            .field("kinds", &names)
            .finish()
    }
}

fn coerce(literal: &Literal, ty: ValueType) -> Result<Literal> {
    literal
        .cast(ty)
        .ok_or_else(|| malformed_error!("Key value {} does not fit type {}", literal, ty))
}

fn all_ones(ty: ValueType) -> Result<Literal> {
    let width = ty
        .width()
        .ok_or_else(|| malformed_error!("Key type {} has no width", ty))?;
    Ok(Literal::bits(width_mask(width), width).cast(ty).unwrap_or_else(|| ty.zero()))
}

fn masked_equal(key: &Expr, value: Expr, mask: Expr) -> Expr {
    Expr::eq(
        Expr::binary(BinaryOp::BAnd, key.clone(), mask.clone()),
        Expr::binary(BinaryOp::BAnd, value, mask),
    )
}

fn in_range(key: &Expr, min: Expr, max: Expr) -> Expr {
    Expr::and(
        Expr::binary(BinaryOp::Le, min, key.clone()),
        Expr::binary(BinaryOp::Le, key.clone(), max),
    )
}

/// Returns the prefix length of `mask` within `width` bits, or `None` if its one bits are
/// not contiguous from the top.
fn prefix_length(mask: u128, width: u32) -> Option<u32> {
    if width == 0 {
        return Some(0);
    }
    let ones = (mask << (128 - width)).leading_ones().min(width);
    let expected = match ones {
        0 => 0,
        n => (u128::MAX >> (128 - n)) << (width - n),
    };
    (mask == expected).then_some(ones)
}

/// `exact`: the key equals the configured value.
#[derive(Debug, Clone, Copy)]
pub struct ExactMatch;

impl MatchKindHandler for ExactMatch {
    fn symbolic_match(&self, table: &str, field: &str, key: &Expr, ty: ValueType) -> Result<Expr> {
        let value = SymbolicVariable::table_key(table, field, ty);
        Ok(Expr::eq(key.clone(), Expr::variable(value)))
    }

    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr> {
        match element {
            KeySetElement::Value(v) => Ok(Expr::eq(key.clone(), coerce(v, ty)?.into())),
            KeySetElement::Default | KeySetElement::DontCare => Ok(Expr::bool(true)),
            other => Err(malformed_error!("Invalid exact key set element {:?}", other)),
        }
    }

    fn control_plane_pairs(
        &self,
        table: &str,
        field: &str,
        ty: ValueType,
        element: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        match element {
            KeySetElement::Value(v) => Ok(vec![(
                SymbolicVariable::table_key(table, field, ty),
                coerce(v, ty)?,
            )]),
            other => Err(malformed_error!("Invalid exact key set element {:?}", other)),
        }
    }
}

/// `ternary`: the key equals the configured value on the bits of the configured mask.
#[derive(Debug, Clone, Copy)]
pub struct TernaryMatch;

impl MatchKindHandler for TernaryMatch {
    fn symbolic_match(&self, table: &str, field: &str, key: &Expr, ty: ValueType) -> Result<Expr> {
        let value = SymbolicVariable::table_key(table, field, ty);
        let mask = SymbolicVariable::ternary_mask(table, field, ty);
        Ok(masked_equal(key, Expr::variable(value), Expr::variable(mask)))
    }

    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr> {
        match element {
            KeySetElement::Value(v) => Ok(Expr::eq(key.clone(), coerce(v, ty)?.into())),
            KeySetElement::Masked { value, mask } => Ok(masked_equal(
                key,
                coerce(value, ty)?.into(),
                coerce(mask, ty)?.into(),
            )),
            KeySetElement::Default | KeySetElement::DontCare => Ok(Expr::bool(true)),
            other => Err(malformed_error!("Invalid ternary key set element {:?}", other)),
        }
    }

    fn control_plane_pairs(
        &self,
        table: &str,
        field: &str,
        ty: ValueType,
        element: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        let (value, mask) = match element {
            KeySetElement::Value(v) => (coerce(v, ty)?, all_ones(ty)?),
            KeySetElement::Masked { value, mask } => (coerce(value, ty)?, coerce(mask, ty)?),
            KeySetElement::Default | KeySetElement::DontCare => (ty.zero(), ty.zero()),
            other => return Err(malformed_error!("Invalid ternary key set element {:?}", other)),
        };
        Ok(vec![
            (SymbolicVariable::table_key(table, field, ty), value),
            (SymbolicVariable::ternary_mask(table, field, ty), mask),
        ])
    }
}

/// `lpm`: the key equals the configured value on the configured number of leading bits.
#[derive(Debug, Clone, Copy)]
pub struct LpmMatch;

impl MatchKindHandler for LpmMatch {
    fn symbolic_match(&self, table: &str, field: &str, key: &Expr, ty: ValueType) -> Result<Expr> {
        let width = ty
            .width()
            .ok_or_else(|| malformed_error!("LPM key {} of table {} has no width", field, table))?;
        let value = Expr::variable(SymbolicVariable::table_key(table, field, ty));
        let prefix = Expr::variable(SymbolicVariable::lpm_prefix(table, field));
        let width_expr = Expr::int(i128::from(width));

        // max << (W - prefix)
        let mask = Expr::binary(
            BinaryOp::Shl,
            Expr::literal(all_ones(ty)?),
            Expr::binary(BinaryOp::Sub, width_expr.clone(), prefix.clone()),
        );
        Ok(Expr::and(
            Expr::binary(BinaryOp::Le, prefix, width_expr),
            masked_equal(key, value, mask),
        ))
    }

    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr> {
        if self.prefix_len(element, ty).is_none() {
            return Err(malformed_error!("Invalid lpm key set element {:?}", element));
        }
        TernaryMatch.literal_match(key, ty, element)
    }

    fn control_plane_pairs(
        &self,
        table: &str,
        field: &str,
        ty: ValueType,
        element: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        let prefix = self
            .prefix_len(element, ty)
            .ok_or_else(|| malformed_error!("Invalid lpm key set element {:?}", element))?;
        let value = match element {
            KeySetElement::Value(v) | KeySetElement::Masked { value: v, .. } => coerce(v, ty)?,
            _ => ty.zero(),
        };
        Ok(vec![
            (SymbolicVariable::table_key(table, field, ty), value),
            (
                SymbolicVariable::lpm_prefix(table, field),
                Literal::Int(i128::from(prefix)),
            ),
        ])
    }

    fn prefix_len(&self, element: &KeySetElement, ty: ValueType) -> Option<u32> {
        let width = ty.width()?;
        match element {
            KeySetElement::Value(_) => Some(width),
            KeySetElement::Masked { mask, .. } => {
                prefix_length(mask.cast(ty)?.as_u128()?, width)
            }
            KeySetElement::Default | KeySetElement::DontCare => Some(0),
            KeySetElement::Range { .. } => None,
        }
    }
}

/// `optional`: treated as not constraining the match.
#[derive(Debug, Clone, Copy)]
pub struct OptionalMatch;

impl MatchKindHandler for OptionalMatch {
    fn symbolic_match(&self, _: &str, _: &str, _: &Expr, _: ValueType) -> Result<Expr> {
        Ok(Expr::bool(true))
    }

    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr> {
        ExactMatch.literal_match(key, ty, element)
    }

    fn control_plane_pairs(
        &self,
        _: &str,
        _: &str,
        _: ValueType,
        _: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        Ok(Vec::new())
    }
}

/// `selector`: the key feeds an action selector and does not take part in the match.
#[derive(Debug, Clone, Copy)]
pub struct SelectorMatch;

impl MatchKindHandler for SelectorMatch {
    fn symbolic_match(&self, _: &str, _: &str, _: &Expr, _: ValueType) -> Result<Expr> {
        Ok(Expr::bool(true))
    }

    fn literal_match(&self, _: &Expr, _: ValueType, _: &KeySetElement) -> Result<Expr> {
        Ok(Expr::bool(true))
    }

    fn control_plane_pairs(
        &self,
        _: &str,
        _: &str,
        _: ValueType,
        _: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        Ok(Vec::new())
    }
}

/// `range`: the key lies between the configured bounds, inclusive.
#[derive(Debug, Clone, Copy)]
pub struct RangeMatch;

impl MatchKindHandler for RangeMatch {
    fn symbolic_match(&self, table: &str, field: &str, key: &Expr, ty: ValueType) -> Result<Expr> {
        let min = SymbolicVariable::range_min(table, field, ty);
        let max = SymbolicVariable::range_max(table, field, ty);
        Ok(in_range(key, Expr::variable(min), Expr::variable(max)))
    }

    fn literal_match(&self, key: &Expr, ty: ValueType, element: &KeySetElement) -> Result<Expr> {
        match element {
            KeySetElement::Value(v) => Ok(Expr::eq(key.clone(), coerce(v, ty)?.into())),
            KeySetElement::Range { min, max } => Ok(in_range(
                key,
                coerce(min, ty)?.into(),
                coerce(max, ty)?.into(),
            )),
            KeySetElement::Default | KeySetElement::DontCare => Ok(Expr::bool(true)),
            other => Err(malformed_error!("Invalid range key set element {:?}", other)),
        }
    }

    fn control_plane_pairs(
        &self,
        table: &str,
        field: &str,
        ty: ValueType,
        element: &KeySetElement,
    ) -> Result<Vec<KeyAssignment>> {
        let (min, max) = match element {
            KeySetElement::Value(v) => (coerce(v, ty)?, coerce(v, ty)?),
            KeySetElement::Range { min, max } => (coerce(min, ty)?, coerce(max, ty)?),
            KeySetElement::Default | KeySetElement::DontCare => (ty.zero(), all_ones(ty)?),
            other => return Err(malformed_error!("Invalid range key set element {:?}", other)),
        };
        Ok(vec![
            (SymbolicVariable::range_min(table, field, ty), min),
            (SymbolicVariable::range_max(table, field, ty), max),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, str::FromStr};

    use crate::{
        expr::{Expr, Literal, SymbolicVariable, ValueType},
        interp::match_kind::{prefix_length, CoreMatchKind, MatchKindRegistry},
        ir::KeySetElement,
        Error,
    };

    fn assign(pairs: Vec<(SymbolicVariable, Literal)>) -> BTreeMap<SymbolicVariable, Expr> {
        pairs.into_iter().map(|(v, l)| (v, Expr::literal(l))).collect()
    }

    #[test]
    fn test_registry_core_kinds() {
        let registry = MatchKindRegistry::core();
        for name in ["exact", "ternary", "lpm", "optional", "selector", "range"] {
            assert!(registry.contains(name), "{name}");
        }
        assert!(matches!(registry.get("fuzzy"), Err(Error::Unimplemented { .. })));
        assert_eq!(CoreMatchKind::from_str("lpm").unwrap(), CoreMatchKind::Lpm);
    }

    #[test]
    fn test_prefix_length() {
        assert_eq!(prefix_length(0xffff_ff00, 32), Some(24));
        assert_eq!(prefix_length(0, 32), Some(0));
        assert_eq!(prefix_length(0xff, 8), Some(8));
        assert_eq!(prefix_length(u128::MAX, 128), Some(128));
        assert_eq!(prefix_length(0xf0f0, 16), None);
        assert_eq!(prefix_length(0x0f, 8), None);
    }

    #[test]
    fn test_lpm_symbolic_match_folds() {
        let ty = ValueType::bits(32);
        let registry = MatchKindRegistry::core();
        let lpm = registry.get("lpm").unwrap();
        let field = SymbolicVariable::input("hdr.ipv4.dst", ty);
        let matched = lpm
            .symbolic_match("route", "dst", &Expr::variable(field.clone()), ty)
            .unwrap();

        let element = KeySetElement::Masked {
            value: Literal::bits(0x0a00_0000, 32),
            mask: Literal::bits(0xff00_0000, 32),
        };
        let mut assignments = assign(lpm.control_plane_pairs("route", "dst", ty, &element).unwrap());
        assignments.insert(field.clone(), Expr::bits(0x0a01_0203, 32));
        assert_eq!(matched.fold(&assignments), Expr::bool(true));

        assignments.insert(field, Expr::bits(0x0b00_0000, 32));
        assert_eq!(matched.fold(&assignments), Expr::bool(false));
    }

    #[test]
    fn test_lpm_prefix_len() {
        let ty = ValueType::bits(32);
        let registry = MatchKindRegistry::core();
        let lpm = registry.get("lpm").unwrap();
        assert_eq!(
            lpm.prefix_len(&KeySetElement::Value(Literal::bits(1, 32)), ty),
            Some(32)
        );
        assert_eq!(lpm.prefix_len(&KeySetElement::Default, ty), Some(0));
        assert_eq!(registry.get("exact").unwrap().prefix_len(&KeySetElement::Default, ty), None);
    }

    #[test]
    fn test_lpm_rejects_non_prefix_mask() {
        let ty = ValueType::bits(16);
        let registry = MatchKindRegistry::core();
        let lpm = registry.get("lpm").unwrap();
        let element = KeySetElement::Masked {
            value: Literal::bits(0x1010, 16),
            mask: Literal::bits(0xf0f0, 16),
        };
        assert_eq!(lpm.prefix_len(&element, ty), None);
        assert!(matches!(
            lpm.control_plane_pairs("route", "dst", ty, &element),
            Err(Error::Malformed { .. })
        ));
        let key = Expr::variable(SymbolicVariable::input("hdr.dst", ty));
        assert!(matches!(
            lpm.literal_match(&key, ty, &element),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_ternary_dont_care_matches_everything() {
        let ty = ValueType::bits(16);
        let registry = MatchKindRegistry::core();
        let ternary = registry.get("ternary").unwrap();
        let field = SymbolicVariable::input("meta.port", ty);
        let matched = ternary
            .symbolic_match("acl", "port", &Expr::variable(field), ty)
            .unwrap();
        let assignments = assign(
            ternary
                .control_plane_pairs("acl", "port", ty, &KeySetElement::DontCare)
                .unwrap(),
        );
        assert_eq!(matched.fold(&assignments), Expr::bool(true));
    }

    #[test]
    fn test_range_literal_match() {
        let ty = ValueType::bits(16);
        let registry = MatchKindRegistry::core();
        let range = registry.get("range").unwrap();
        let element = KeySetElement::Range {
            min: Literal::Int(10),
            max: Literal::Int(20),
        };
        let inside = range.literal_match(&Expr::bits(15, 16), ty, &element).unwrap();
        let outside = range.literal_match(&Expr::bits(21, 16), ty, &element).unwrap();
        assert_eq!(inside.simplify(), Expr::bool(true));
        assert_eq!(outside.simplify(), Expr::bool(false));
    }

    #[test]
    fn test_exact_rejects_masks() {
        let registry = MatchKindRegistry::core();
        let element = KeySetElement::Masked {
            value: Literal::bits(1, 8),
            mask: Literal::bits(1, 8),
        };
        assert!(registry
            .get("exact")
            .unwrap()
            .control_plane_pairs("t", "f", ValueType::bits(8), &element)
            .is_err());
    }
}
