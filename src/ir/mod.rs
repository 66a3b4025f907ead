//! The typed program tree consumed by the interpreter.
//!
//! Parsing and type checking of P4 source happen outside this crate. A front end hands
//! the analysis a [`Program`]: controls, parsers, actions and tables whose statements and
//! expressions are already resolved to fully qualified paths and typed declarations.
//!
//! Statements and select/switch cases that can become reachability points carry a
//! [`NodeId`]. Ids only need to be unique within one program; [`IdAllocator`] hands out
//! fresh ones for front ends and tests.
//!
//! # Module Structure
//!
//! - [`types`] - Declared types and parameters ([`Type`], [`StructType`], [`Param`])
//! - [`expression`] - Expressions and method calls ([`Expression`], [`MethodCall`])
//! - [`statement`] - Statements ([`Statement`], [`StatementKind`])
//! - [`decl`] - Declarations ([`ActionDecl`], [`TableDecl`], [`ControlDecl`],
//!   [`ParserDecl`], [`Program`])

use std::{cell::Cell, fmt};

pub mod decl;
pub mod expression;
pub mod statement;
pub mod types;

pub use decl::{
    ActionCall, ActionDecl, ActionRef, BlockRef, ConstEntry, ControlDecl, KeyElement, KeySetElement,
    ParserDecl, ParserState, Program, SelectCase, SelectKey, TableDecl, TableEntries,
    TableImplementation, Transition, ValueSetDecl,
};
pub use expression::{Expression, MethodCall, TableMember};
pub use statement::{Statement, StatementKind, SwitchCase, SwitchLabel};
pub use types::{Direction, Param, StructType, Type};

/// Identifies a node of the program tree that can be a reachability point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out consecutive [`NodeId`]s.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Cell<usize>,
}

impl IdAllocator {
    /// Creates an allocator starting at id 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh id.
    pub fn fresh(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        NodeId(id)
    }
}

/// A fully qualified, dotted reference to a variable or one of its fields.
///
/// Header validity is addressed as the pseudo field `$valid`, header stack elements as
/// `name[index]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(String);

impl Path {
    /// The pseudo field holding a header's validity bit.
    pub const VALID: &'static str = "$valid";

    /// Creates a path from its dotted form.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the dotted form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path of member `name`.
    #[must_use]
    pub fn member(&self, name: &str) -> Self {
        Self(format!("{}.{name}", self.0))
    }

    /// Returns the path of stack element `index`.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }

    /// Returns the path of the validity bit of this header.
    #[must_use]
    pub fn valid(&self) -> Self {
        self.member(Self::VALID)
    }

    /// Returns the first segment of the path.
    #[must_use]
    pub fn root(&self) -> &str {
        let end = self.0.find(['.', '[']).unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// Returns the part of the path after the root, including the leading separator.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.0[self.root().len()..]
    }

    /// Replaces the root segment, keeping the remaining members.
    #[must_use]
    pub fn with_root(&self, root: &str) -> Self {
        Self(format!("{root}{}", self.suffix()))
    }

    /// Moves a path below `from` to the same position below `onto`.
    ///
    /// # Returns
    ///
    /// `None` if the path is not `from` itself or one of its members.
    #[must_use]
    pub fn rebase(&self, from: &Path, onto: &Path) -> Option<Self> {
        let rest = self.0.strip_prefix(from.as_str())?;
        if !(rest.is_empty() || rest.starts_with(['.', '['])) {
            return None;
        }
        Some(Self(format!("{}{rest}", onto.0)))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{IdAllocator, NodeId, Path};

    #[test]
    fn test_path_segments() {
        let path = Path::new("hdr.ipv4.ttl");
        assert_eq!(path.root(), "hdr");
        assert_eq!(path.suffix(), ".ipv4.ttl");
        assert_eq!(path.with_root("headers").as_str(), "headers.ipv4.ttl");

        let stack = Path::new("hdr").member("vlan").index(1);
        assert_eq!(stack.as_str(), "hdr.vlan[1]");
        assert_eq!(stack.valid().as_str(), "hdr.vlan[1].$valid");
        assert_eq!(Path::new("x[0].y").root(), "x");
    }

    #[test]
    fn test_path_rebase() {
        let from = Path::new("hdr.eth");
        let onto = Path::new("h");
        assert_eq!(
            Path::new("hdr.eth.dst").rebase(&from, &onto),
            Some(Path::new("h.dst"))
        );
        assert_eq!(Path::new("hdr.eth").rebase(&from, &onto), Some(Path::new("h")));
        assert_eq!(Path::new("hdr.ethx").rebase(&from, &onto), None);
        assert_eq!(Path::new("meta.x").rebase(&from, &onto), None);
    }

    #[test]
    fn test_id_allocator() {
        let ids = IdAllocator::new();
        assert_eq!(ids.fresh(), NodeId::new(0));
        assert_eq!(ids.fresh(), NodeId::new(1));
    }
}
