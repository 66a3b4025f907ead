//! Declarations: actions, tables, controls, parsers and the program itself.

use crate::{
    expr::{Literal, ValueType},
    ir::{Expression, NodeId, Param, Statement, Type},
    Result,
};

/// An action declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDecl {
    /// Name used in the program.
    pub name: String,
    /// Fully qualified control-plane name.
    pub control_plane_name: String,
    /// Parameters; directionless ones are supplied by the control plane.
    pub params: Vec<Param>,
    /// The action body.
    pub body: Vec<Statement>,
}

impl ActionDecl {
    /// Creates an action whose control-plane name is its name.
    #[must_use]
    pub fn new(name: &str, params: Vec<Param>, body: Vec<Statement>) -> Self {
        Self {
            name: name.to_string(),
            control_plane_name: name.to_string(),
            params,
            body,
        }
    }
}

/// One element of a table key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyElement {
    /// The matched expression.
    pub expression: Expression,
    /// The type of the matched expression.
    pub ty: ValueType,
    /// The match kind name, e.g. `exact` or `lpm`.
    pub match_kind: String,
    /// The `@name` annotation giving the control-plane field name.
    pub name: Option<String>,
}

impl KeyElement {
    /// Creates a key element with a name annotation.
    #[must_use]
    pub fn new(expression: Expression, ty: ValueType, match_kind: &str, name: &str) -> Self {
        Self {
            expression,
            ty,
            match_kind: match_kind.to_string(),
            name: Some(name.to_string()),
        }
    }
}

/// An entry of a table's action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    /// The referenced action.
    pub name: String,
    /// `@tableonly`: never usable as default action.
    pub table_only: bool,
    /// `@defaultonly`: only usable as default action.
    pub default_only: bool,
}

impl ActionRef {
    /// Creates an unannotated reference.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_only: false,
            default_only: false,
        }
    }
}

/// An action call with its arguments, as written in a table property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall {
    /// The called action.
    pub name: String,
    /// Arguments, one per parameter.
    pub args: Vec<Expression>,
}

impl ActionCall {
    /// Creates an action call.
    #[must_use]
    pub fn new(name: &str, args: Vec<Expression>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// One element of a key set in a table entry or select case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySetElement {
    /// A single value.
    Value(Literal),
    /// `default`
    Default,
    /// `_`
    DontCare,
    /// `value &&& mask`
    Masked {
        /// The value.
        value: Literal,
        /// The mask.
        mask: Literal,
    },
    /// `min .. max`
    Range {
        /// Inclusive lower bound.
        min: Literal,
        /// Inclusive upper bound.
        max: Literal,
    },
}

/// An entry of a table's `entries` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstEntry {
    /// One key set element per key element.
    pub keys: Vec<KeySetElement>,
    /// The action invoked on a match.
    pub action: ActionCall,
    /// The entry priority; unset priorities count as 0.
    pub priority: Option<i32>,
}

/// A table's `entries` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntries {
    /// `const entries`: the control plane cannot change the table.
    pub is_const: bool,
    /// The entries in source order.
    pub entries: Vec<ConstEntry>,
}

/// The `implementation` property of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableImplementation {
    /// An action profile shared between tables.
    ActionProfile(String),
    /// An action selector and the action profile backing it.
    ActionSelector {
        /// Control-plane name of the selector.
        selector: String,
        /// Control-plane name of the profile.
        profile: String,
    },
}

/// A match-action table declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDecl {
    /// Name used in the program.
    pub name: String,
    /// Fully qualified control-plane name.
    pub control_plane_name: String,
    /// Key elements; empty for keyless tables.
    pub keys: Vec<KeyElement>,
    /// The action list.
    pub actions: Vec<ActionRef>,
    /// The default action with its arguments.
    pub default_action: ActionCall,
    /// `const default_action`: the control plane cannot change the default.
    pub default_is_const: bool,
    /// The `entries` property.
    pub entries: Option<TableEntries>,
    /// The `implementation` property.
    pub implementation: Option<TableImplementation>,
}

impl TableDecl {
    /// Creates a mutable table without entries or implementation.
    #[must_use]
    pub fn new(
        name: &str,
        keys: Vec<KeyElement>,
        actions: Vec<ActionRef>,
        default_action: ActionCall,
    ) -> Self {
        Self {
            name: name.to_string(),
            control_plane_name: name.to_string(),
            keys,
            actions,
            default_action,
            default_is_const: false,
            entries: None,
            implementation: None,
        }
    }

    /// Checks whether the table's entries are fixed by the program.
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.entries.as_ref().is_some_and(|e| e.is_const)
    }

    /// Returns the action list entry for `action`.
    #[must_use]
    pub fn action_ref(&self, action: &str) -> Option<&ActionRef> {
        self.actions.iter().find(|a| a.name == action)
    }
}

/// A control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDecl {
    /// Block name.
    pub name: String,
    /// Apply parameters.
    pub params: Vec<Param>,
    /// Local variables declared before the body.
    pub locals: Vec<(String, Type)>,
    /// Local actions.
    pub actions: Vec<ActionDecl>,
    /// Tables.
    pub tables: Vec<TableDecl>,
    /// The apply body.
    pub body: Vec<Statement>,
}

/// A parser value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSetDecl {
    /// Name used in the program.
    pub name: String,
    /// Fully qualified control-plane name.
    pub control_plane_name: String,
    /// Type of the members.
    pub ty: ValueType,
    /// Declared capacity.
    pub size: usize,
}

/// A key of a select case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectKey {
    /// A key set element matched literally.
    Element(KeySetElement),
    /// Membership in a parser value set.
    ValueSet(String),
}

/// One case of a select transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectCase {
    /// Identifies the case as a reachability point.
    pub id: NodeId,
    /// One key per selected expression.
    pub keys: Vec<SelectKey>,
    /// The next state.
    pub next: String,
}

/// The transition at the end of a parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `transition accept`
    Accept,
    /// `transition reject`
    Reject,
    /// `transition state`
    Goto(String),
    /// `transition select(...) { ... }`
    Select {
        /// Selected expressions.
        keys: Vec<Expression>,
        /// Cases in source order.
        cases: Vec<SelectCase>,
    },
}

/// A parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    /// State name.
    pub name: String,
    /// Statements executed on entry.
    pub statements: Vec<Statement>,
    /// The outgoing transition.
    pub transition: Transition,
}

/// A parser block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserDecl {
    /// Block name.
    pub name: String,
    /// Apply parameters.
    pub params: Vec<Param>,
    /// Local variables.
    pub locals: Vec<(String, Type)>,
    /// States; execution begins at `start`.
    pub states: Vec<ParserState>,
    /// Value sets declared in the parser.
    pub value_sets: Vec<ValueSetDecl>,
}

impl ParserDecl {
    /// The name of the initial state.
    pub const START: &'static str = "start";

    /// Returns the state named `name`.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<&ParserState> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Returns the value set named `name`.
    #[must_use]
    pub fn value_set(&self, name: &str) -> Option<&ValueSetDecl> {
        self.value_sets.iter().find(|v| v.name == name)
    }
}

/// A programmable block of the pipeline.
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
    /// A control.
    Control(&'a ControlDecl),
    /// A parser.
    Parser(&'a ParserDecl),
}

impl BlockRef<'_> {
    /// Returns the block's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Control(c) => &c.name,
            Self::Parser(p) => &p.name,
        }
    }

    /// Returns the block's apply parameters.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        match self {
            Self::Control(c) => &c.params,
            Self::Parser(p) => &p.params,
        }
    }
}

/// A typed program.
///
/// Local variables, action parameters and parser locals must carry program-wide unique
/// names, as the front end's renaming pass produces. The interpreter binds declarations
/// by their plain path, so a local that reuses an outer name overwrites the outer binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Top-level actions.
    pub actions: Vec<ActionDecl>,
    /// Parsers.
    pub parsers: Vec<ParserDecl>,
    /// Controls.
    pub controls: Vec<ControlDecl>,
    /// Block names in architecture order, as instantiated by the package.
    pub pipeline: Vec<String>,
}

impl Program {
    /// Looks up an action among the top-level and control-local actions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no action has this name.
    pub fn action(&self, name: &str) -> Result<&ActionDecl> {
        self.actions
            .iter()
            .chain(self.controls.iter().flat_map(|c| c.actions.iter()))
            .find(|a| a.name == name)
            .ok_or_else(|| malformed_error!("Action '{}' is not declared", name))
    }

    /// Looks up a table in any control.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no table has this name.
    pub fn table(&self, name: &str) -> Result<&TableDecl> {
        self.tables()
            .find(|t| t.name == name)
            .ok_or_else(|| malformed_error!("Table '{}' is not declared", name))
    }

    /// Iterates over every table of every control.
    pub fn tables(&self) -> impl Iterator<Item = &TableDecl> {
        self.controls.iter().flat_map(|c| c.tables.iter())
    }

    /// Iterates over every value set of every parser.
    pub fn value_sets(&self) -> impl Iterator<Item = &ValueSetDecl> {
        self.parsers.iter().flat_map(|p| p.value_sets.iter())
    }

    /// Looks up a control or parser by name.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<BlockRef<'_>> {
        self.controls
            .iter()
            .find(|c| c.name == name)
            .map(BlockRef::Control)
            .or_else(|| {
                self.parsers
                    .iter()
                    .find(|p| p.name == name)
                    .map(BlockRef::Parser)
            })
    }
}
