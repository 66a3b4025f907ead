//! Program statements.

use crate::ir::{Expression, MethodCall, NodeId, Path, Type};

/// A statement with its node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Identifies the statement as a reachability point.
    pub id: NodeId,
    /// What the statement does.
    pub kind: StatementKind,
}

/// The statement kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `target = value;`
    Assign {
        /// The assigned location.
        target: Path,
        /// The assigned value.
        value: Expression,
    },
    /// `;`
    Empty,
    /// `{ ... }`
    Block(Vec<Statement>),
    /// `if (condition) then else otherwise`
    If {
        /// The branch condition.
        condition: Expression,
        /// The true branch.
        then: Box<Statement>,
        /// The false branch, if any.
        otherwise: Option<Box<Statement>>,
    },
    /// `switch (expression) { cases }`
    Switch {
        /// The switched expression; `t.apply().action_run` selects action-name matching.
        expression: Expression,
        /// Cases in source order. A default case, if present, is last.
        cases: Vec<SwitchCase>,
    },
    /// A method call statement.
    Call(MethodCall),
    /// A local variable declaration with an optional initializer.
    Declare {
        /// Variable name.
        name: String,
        /// Declared type.
        ty: Type,
        /// Initial value.
        init: Option<Expression>,
    },
    /// `exit;`
    Exit,
    /// `return;`
    Return,
}

/// One case of a switch statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    /// Identifies the case as a reachability point.
    pub id: NodeId,
    /// The case label.
    pub label: SwitchLabel,
    /// The case body; `None` falls through to the next case.
    pub body: Option<Box<Statement>>,
}

/// A switch case label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchLabel {
    /// A value compared against the switched expression.
    Value(Expression),
    /// An action name, in switches over `action_run`.
    Action(String),
    /// `default`
    Default,
}

impl Statement {
    /// Creates a statement.
    #[must_use]
    pub const fn new(id: NodeId, kind: StatementKind) -> Self {
        Self { id, kind }
    }

    /// Checks whether this is a block statement.
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self.kind, StatementKind::Block(_))
    }
}
