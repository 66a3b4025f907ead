//! Shared immutable expression trees.
//!
//! [`Expr`] is a reference-counted handle to an [`ExprKind`] node. Cloning an expression
//! is O(1) and sub-expressions are freely shared between parents. Nodes are never mutated
//! after construction; every rewrite (substitution, simplification) builds new nodes and
//! reuses untouched sub-trees.
//!
//! Equality, hashing and ordering are structural. The order is derived from the node
//! enum: the variant tag compares first, then the fields, which gives a total order over
//! all expressions.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::expr::{BinaryOp, Literal, Simplifier, SymbolicVariable, UnaryOp, ValueType};

/// The node kinds of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprKind {
    /// A concrete value.
    Literal(Literal),
    /// A symbolic variable.
    Variable(SymbolicVariable),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Expr,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        left: Expr,
        /// The right operand.
        right: Expr,
    },
    /// A multiplexer: `condition ? then : otherwise`.
    Mux {
        /// The boolean selector.
        condition: Expr,
        /// Value when the condition holds.
        then: Expr,
        /// Value when the condition does not hold.
        otherwise: Expr,
    },
    /// A type conversion.
    Cast {
        /// The target type.
        ty: ValueType,
        /// The converted expression.
        operand: Expr,
    },
}

/// An immutable, structurally shared expression.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expr(Rc<ExprKind>);

impl Expr {
    /// Wraps a node kind into a new expression.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Self(Rc::new(kind))
    }

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: Literal) -> Self {
        Self::new(ExprKind::Literal(value))
    }

    /// Creates a boolean literal.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    /// Creates an unsigned bit-vector literal, truncated to `width` bits.
    #[must_use]
    pub fn bits(value: u128, width: u32) -> Self {
        Self::literal(Literal::bits(value, width))
    }

    /// Creates an unbounded integer literal.
    #[must_use]
    pub fn int(value: i128) -> Self {
        Self::literal(Literal::Int(value))
    }

    /// Creates a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(Literal::string(value))
    }

    /// Creates a variable reference.
    #[must_use]
    pub fn variable(var: SymbolicVariable) -> Self {
        Self::new(ExprKind::Variable(var))
    }

    /// Creates a unary operation without simplification.
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::new(ExprKind::Unary { op, operand })
    }

    /// Creates a binary operation without simplification.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::new(ExprKind::Binary { op, left, right })
    }

    /// Creates a cast.
    #[must_use]
    pub fn cast(ty: ValueType, operand: Self) -> Self {
        Self::new(ExprKind::Cast { ty, operand })
    }

    /// Creates `left == right`.
    #[must_use]
    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    /// Creates the logical negation of `operand`.
    ///
    /// Boolean literals and double negations are folded on construction.
    #[must_use]
    pub fn not(operand: Self) -> Self {
        if let Some(b) = operand.as_bool() {
            return Self::bool(!b);
        }
        if let ExprKind::Unary {
            op: UnaryOp::LNot,
            operand: inner,
        } = operand.kind()
        {
            return inner.clone();
        }
        Self::unary(UnaryOp::LNot, operand)
    }

    /// Creates `left && right`.
    ///
    /// A literal operand is folded on construction: `true` is dropped and `false`
    /// absorbs the conjunction. This keeps accumulated path conditions compact.
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        match (left.as_bool(), right.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Self::bool(false),
            (Some(true), _) => right,
            (_, Some(true)) => left,
            _ if left == right => left,
            _ => Self::binary(BinaryOp::LAnd, left, right),
        }
    }

    /// Creates `left || right`, folding literal operands like [`Expr::and`].
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        match (left.as_bool(), right.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Self::bool(true),
            (Some(false), _) => right,
            (_, Some(false)) => left,
            _ if left == right => left,
            _ => Self::binary(BinaryOp::LOr, left, right),
        }
    }

    /// Creates the multiplexer `condition ? then : otherwise`.
    ///
    /// A literal condition selects its branch and equal branches collapse.
    #[must_use]
    pub fn mux(condition: Self, then: Self, otherwise: Self) -> Self {
        match condition.as_bool() {
            Some(true) => then,
            Some(false) => otherwise,
            None if then == otherwise => then,
            None => Self::new(ExprKind::Mux {
                condition,
                then,
                otherwise,
            }),
        }
    }

    /// Conjoins all expressions, `true` for an empty iterator.
    #[must_use]
    pub fn all(exprs: impl IntoIterator<Item = Self>) -> Self {
        exprs.into_iter().fold(Self::bool(true), Self::and)
    }

    /// Disjoins all expressions, `false` for an empty iterator.
    #[must_use]
    pub fn any(exprs: impl IntoIterator<Item = Self>) -> Self {
        exprs.into_iter().fold(Self::bool(false), Self::or)
    }

    /// Returns the node kind.
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Returns the literal if this expression is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self.kind() {
            ExprKind::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// Checks whether this expression is a concrete literal.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Returns the value of a boolean literal.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_literal().and_then(Literal::as_bool)
    }

    /// Returns the variable if this expression is a bare variable.
    #[must_use]
    pub fn as_variable(&self) -> Option<&SymbolicVariable> {
        match self.kind() {
            ExprKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Checks whether two handles point to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn key(&self) -> *const ExprKind {
        Rc::as_ptr(&self.0)
    }

    /// Computes the type of the expression.
    ///
    /// Unbounded integer operands adopt the type of their bit-vector partner, matching
    /// the implicit casts of the P4 type checker.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self.kind() {
            ExprKind::Literal(l) => l.value_type(),
            ExprKind::Variable(v) => v.value_type(),
            ExprKind::Unary {
                op: UnaryOp::LNot, ..
            } => ValueType::Bool,
            ExprKind::Unary { operand, .. } => operand.value_type(),
            ExprKind::Binary { op, .. } if op.is_boolean() => ValueType::Bool,
            ExprKind::Binary {
                op: BinaryOp::Shl | BinaryOp::Shr,
                left,
                ..
            } => left.value_type(),
            ExprKind::Binary { left, right, .. } => match left.value_type() {
                ValueType::Int => right.value_type(),
                ty => ty,
            },
            ExprKind::Mux {
                then, otherwise, ..
            } => match then.value_type() {
                ValueType::Int => otherwise.value_type(),
                ty => ty,
            },
            ExprKind::Cast { ty, .. } => *ty,
        }
    }

    /// Collects every symbolic variable the expression depends on.
    ///
    /// Shared sub-trees are visited once.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<SymbolicVariable> {
        let mut vars = BTreeSet::new();
        let mut visited = FxHashSet::default();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if !visited.insert(expr.key()) {
                continue;
            }
            match expr.kind() {
                ExprKind::Literal(_) => {}
                ExprKind::Variable(v) => {
                    vars.insert(v.clone());
                }
                ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                    stack.push(operand);
                }
                ExprKind::Binary { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
                ExprKind::Mux {
                    condition,
                    then,
                    otherwise,
                } => {
                    stack.push(condition);
                    stack.push(then);
                    stack.push(otherwise);
                }
            }
        }
        vars
    }

    /// Replaces variables by the expressions they are assigned.
    ///
    /// Sub-trees without assigned variables are shared with the original, and shared
    /// sub-trees are rewritten once. The result is not simplified.
    ///
    /// # Arguments
    ///
    /// * `assignments` - The replacement for each assigned variable
    ///
    /// # Returns
    ///
    /// The rewritten expression.
    #[must_use]
    pub fn substitute(&self, assignments: &BTreeMap<SymbolicVariable, Self>) -> Self {
        if assignments.is_empty() {
            return self.clone();
        }
        let mut memo = FxHashMap::default();
        self.substitute_memo(assignments, &mut memo)
    }

    fn substitute_memo(
        &self,
        assignments: &BTreeMap<SymbolicVariable, Self>,
        memo: &mut FxHashMap<*const ExprKind, Self>,
    ) -> Self {
        if let Some(done) = memo.get(&self.key()) {
            return done.clone();
        }
        let rewritten = match self.kind() {
            ExprKind::Literal(_) => self.clone(),
            ExprKind::Variable(v) => assignments.get(v).cloned().unwrap_or_else(|| self.clone()),
            ExprKind::Unary { op, operand } => {
                let new = operand.substitute_memo(assignments, memo);
                if new.ptr_eq(operand) {
                    self.clone()
                } else {
                    Self::unary(*op, new)
                }
            }
            ExprKind::Cast { ty, operand } => {
                let new = operand.substitute_memo(assignments, memo);
                if new.ptr_eq(operand) {
                    self.clone()
                } else {
                    Self::cast(*ty, new)
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = left.substitute_memo(assignments, memo);
                let r = right.substitute_memo(assignments, memo);
                if l.ptr_eq(left) && r.ptr_eq(right) {
                    self.clone()
                } else {
                    Self::binary(*op, l, r)
                }
            }
            ExprKind::Mux {
                condition,
                then,
                otherwise,
            } => {
                let c = condition.substitute_memo(assignments, memo);
                let t = then.substitute_memo(assignments, memo);
                let o = otherwise.substitute_memo(assignments, memo);
                if c.ptr_eq(condition) && t.ptr_eq(then) && o.ptr_eq(otherwise) {
                    self.clone()
                } else {
                    Self::new(ExprKind::Mux {
                        condition: c,
                        then: t,
                        otherwise: o,
                    })
                }
            }
        };
        // The node itself is alive for the whole call, so its address stays unique.
        memo.insert(self.key(), rewritten.clone());
        rewritten
    }

    /// Simplifies the expression with a fresh [`Simplifier`].
    #[must_use]
    pub fn simplify(&self) -> Self {
        Simplifier::new().simplify(self)
    }

    /// Substitutes the assignments and simplifies the result.
    #[must_use]
    pub fn fold(&self, assignments: &BTreeMap<SymbolicVariable, Self>) -> Self {
        self.substitute(assignments).simplify()
    }

    /// Returns the number of distinct nodes in the expression.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut visited = FxHashSet::default();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if !visited.insert(expr.key()) {
                continue;
            }
            match expr.kind() {
                ExprKind::Literal(_) | ExprKind::Variable(_) => {}
                ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                    stack.push(operand);
                }
                ExprKind::Binary { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
                ExprKind::Mux {
                    condition,
                    then,
                    otherwise,
                } => {
                    stack.push(condition);
                    stack.push(then);
                    stack.push(otherwise);
                }
            }
        }
        visited.len()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Literal(l) => write!(f, "{l}"),
            ExprKind::Variable(v) => write!(f, "{v}"),
            ExprKind::Unary { op, operand } => write!(f, "{op}{operand}"),
            ExprKind::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Mux {
                condition,
                then,
                otherwise,
            } => write!(f, "({condition} ? {then} : {otherwise})"),
            ExprKind::Cast { ty, operand } => write!(f, "(({ty}) {operand})"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Self::literal(value)
    }
}

impl From<SymbolicVariable> for Expr {
    fn from(value: SymbolicVariable) -> Self {
        Self::variable(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}
