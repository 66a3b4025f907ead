//! Program expressions.
//!
//! These are the expressions as written in the program, referring to variables by path.
//! The [`ExpressionResolver`](crate::interp::ExpressionResolver) turns them into symbolic
//! [`Expr`](crate::expr::Expr)s by looking up the current bindings.

use crate::{
    expr::{BinaryOp, Literal, UnaryOp, ValueType},
    ir::Path,
};

/// A program expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A constant.
    Literal(Literal),
    /// A variable or field reference.
    Path(Path),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expression>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        left: Box<Expression>,
        /// The right operand.
        right: Box<Expression>,
    },
    /// The conditional operator `condition ? then : otherwise`.
    Mux {
        /// The condition.
        condition: Box<Expression>,
        /// Value when the condition holds.
        then: Box<Expression>,
        /// Value otherwise.
        otherwise: Box<Expression>,
    },
    /// A cast to a scalar type.
    Cast {
        /// The target type.
        ty: ValueType,
        /// The converted expression.
        operand: Box<Expression>,
    },
    /// A struct, header or header stack initializer, components in declaration order.
    ///
    /// `valid` is set for header initializers and gives the validity the header gets.
    List {
        /// Component expressions.
        components: Vec<Expression>,
        /// Validity of a header initializer; `None` for structs and stacks.
        valid: Option<bool>,
    },
    /// A method call used as a value.
    Call(MethodCall),
    /// A member of a table application: `t.apply().hit` and friends.
    TableMember {
        /// Name of the applied table.
        table: String,
        /// The accessed member.
        member: TableMember,
    },
}

/// A member of a table application result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMember {
    /// `apply().hit`
    Hit,
    /// `apply().miss`
    Miss,
    /// `apply().action_run`
    ActionRun,
}

/// A method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    /// `t.apply()` as a statement.
    ApplyTable(String),
    /// A direct action invocation.
    Action {
        /// The action's name.
        name: String,
        /// Arguments for the directional parameters.
        args: Vec<Expression>,
    },
    /// `h.isValid()`
    IsValid(Path),
    /// `h.setValid()`
    SetValid(Path),
    /// `h.setInvalid()`
    SetInvalid(Path),
    /// A call of an extern function or method, e.g. `packet.extract(hdr.eth)`.
    Extern {
        /// The extern's name, e.g. `extract` or `mark_to_drop`.
        name: String,
        /// Arguments.
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Creates a path reference.
    #[must_use]
    pub fn path(path: &str) -> Self {
        Self::Path(Path::new(path))
    }

    /// Creates an unsigned bit-vector constant.
    #[must_use]
    pub fn bits(value: u128, width: u32) -> Self {
        Self::Literal(Literal::bits(value, width))
    }

    /// Creates a boolean constant.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    /// Creates a unary operation.
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Creates a binary operation.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates `left == right`.
    #[must_use]
    pub fn equals(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    /// Creates `table.apply().member`.
    #[must_use]
    pub fn table_member(table: &str, member: TableMember) -> Self {
        Self::TableMember {
            table: table.to_string(),
            member,
        }
    }

    /// Creates an extern call.
    #[must_use]
    pub fn call_extern(name: &str, args: Vec<Self>) -> Self {
        Self::Call(MethodCall::Extern {
            name: name.to_string(),
            args,
        })
    }

    /// Returns the path if the expression is a plain reference.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }
}
