//! Algebraic simplification of expressions.
//!
//! The [`Simplifier`] performs constant folding and applies local algebraic identities
//! bottom-up. It never solves: the result is equivalent to the input under every
//! assignment, and is a literal whenever the identities below are enough to decide it.
//!
//! Applied rules:
//! - Constant folding of every operator on literal operands
//! - Short-circuit of `&&`/`||` with a literal operand, idempotence, `x && !x`, `x || !x`
//! - Double negation and complement (`!!x`, `~~x`, `--x`)
//! - Reflexive comparisons (`x == x`, `x < x`, ...)
//! - Bitwise and arithmetic identities (`x & 0`, `x | 0`, `x ^ x`, `x - x`, `x * 1`, ...)
//! - Shifts by zero and by at least the operand width
//! - Multiplexers with a literal condition, equal branches or boolean branches
//! - Comparison of a multiplexer against a literal, when both branches decide
//!
//! Results are memoized per node, so shared sub-trees are simplified once.

use rustc_hash::FxHashMap;

use crate::expr::{
    evaluate_binary, evaluate_unary, BinaryOp, Expr, ExprKind, Literal, UnaryOp, ValueType,
};

/// Bottom-up algebraic simplifier with a per-node memo table.
///
/// A simplifier may be reused across many expressions. Memo entries keep the original
/// node alive, so node addresses used as keys are never recycled while cached.
#[derive(Default)]
pub struct Simplifier {
    memo: FxHashMap<*const ExprKind, (Expr, Expr)>,
}

impl Simplifier {
    /// Creates an empty simplifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of memoized nodes.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.memo.len()
    }

    /// Simplifies an expression.
    ///
    /// # Arguments
    ///
    /// * `expr` - The expression to simplify
    ///
    /// # Returns
    ///
    /// An equivalent expression, a literal when the rules decide it.
    pub fn simplify(&mut self, expr: &Expr) -> Expr {
        let key: *const ExprKind = expr.kind();
        if let Some((_, done)) = self.memo.get(&key) {
            return done.clone();
        }
        let result = match expr.kind() {
            ExprKind::Literal(_) | ExprKind::Variable(_) => expr.clone(),
            ExprKind::Unary { op, operand } => {
                let operand = self.simplify(operand);
                fold_unary(*op, operand)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.simplify(left);
                let right = self.simplify(right);
                fold_binary(*op, left, right)
            }
            ExprKind::Mux {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.simplify(condition);
                // Only the selected branch matters for a decided condition.
                match condition.as_bool() {
                    Some(true) => self.simplify(then),
                    Some(false) => self.simplify(otherwise),
                    None => {
                        let then = self.simplify(then);
                        let otherwise = self.simplify(otherwise);
                        fold_mux(condition, then, otherwise)
                    }
                }
            }
            ExprKind::Cast { ty, operand } => {
                let operand = self.simplify(operand);
                fold_cast(*ty, operand)
            }
        };
        self.memo.insert(key, (expr.clone(), result.clone()));
        result
    }
}

/// Returns the operand of a logical negation.
fn negated(expr: &Expr) -> Option<&Expr> {
    match expr.kind() {
        ExprKind::Unary {
            op: UnaryOp::LNot,
            operand,
        } => Some(operand),
        _ => None,
    }
}

fn is_negation_of(a: &Expr, b: &Expr) -> bool {
    negated(a).is_some_and(|inner| inner == b) || negated(b).is_some_and(|inner| inner == a)
}

fn bits_literal(expr: &Expr) -> Option<&Literal> {
    expr.as_literal()
        .filter(|l| matches!(l, Literal::Bits { .. }))
}

fn zero_of(ty: ValueType) -> Option<Expr> {
    match ty {
        ValueType::Bits { .. } | ValueType::Int => Some(Expr::literal(ty.zero())),
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, operand: Expr) -> Expr {
    if let Some(value) = operand.as_literal().and_then(|l| evaluate_unary(op, l)) {
        return Expr::literal(value);
    }
    match operand.kind() {
        ExprKind::Unary {
            op: inner_op,
            operand: inner,
        } if *inner_op == op => return inner.clone(),
        ExprKind::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } if op == UnaryOp::LNot => {
            return Expr::binary(BinaryOp::Ne, left.clone(), right.clone());
        }
        ExprKind::Binary {
            op: BinaryOp::Ne,
            left,
            right,
        } if op == UnaryOp::LNot => {
            return Expr::binary(BinaryOp::Eq, left.clone(), right.clone());
        }
        _ => {}
    }
    Expr::unary(op, operand)
}

#[allow(clippy::too_many_lines)]
fn fold_binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
        if let Some(value) = evaluate_binary(op, l, r) {
            return Expr::literal(value);
        }
    }

    let same = left == right;
    match op {
        BinaryOp::LAnd => {
            if is_negation_of(&left, &right) {
                return Expr::bool(false);
            }
            Expr::and(left, right)
        }
        BinaryOp::LOr => {
            if is_negation_of(&left, &right) {
                return Expr::bool(true);
            }
            Expr::or(left, right)
        }
        BinaryOp::Eq | BinaryOp::Le | BinaryOp::Ge if same => Expr::bool(true),
        BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt if same => Expr::bool(false),
        BinaryOp::Eq | BinaryOp::Ne => fold_comparison(op, left, right),
        BinaryOp::BAnd => {
            if let Some(l) = bits_literal(&right) {
                if l.is_zero() {
                    return right;
                }
                if l.is_all_ones() {
                    return left;
                }
            }
            if let Some(l) = bits_literal(&left) {
                if l.is_zero() {
                    return left;
                }
                if l.is_all_ones() {
                    return right;
                }
            }
            if same {
                return left;
            }
            Expr::binary(op, left, right)
        }
        BinaryOp::BOr => {
            if let Some(l) = bits_literal(&right) {
                if l.is_zero() {
                    return left;
                }
                if l.is_all_ones() {
                    return right;
                }
            }
            if let Some(l) = bits_literal(&left) {
                if l.is_zero() {
                    return right;
                }
                if l.is_all_ones() {
                    return left;
                }
            }
            if same {
                return left;
            }
            Expr::binary(op, left, right)
        }
        BinaryOp::BXor | BinaryOp::Sub if same => {
            zero_of(left.value_type()).unwrap_or_else(|| Expr::binary(op, left, right))
        }
        BinaryOp::BXor | BinaryOp::Add => {
            if right.as_literal().is_some_and(Literal::is_zero) {
                return left;
            }
            if left.as_literal().is_some_and(Literal::is_zero) {
                return right;
            }
            Expr::binary(op, left, right)
        }
        BinaryOp::Sub => {
            if right.as_literal().is_some_and(Literal::is_zero) {
                return left;
            }
            Expr::binary(op, left, right)
        }
        BinaryOp::Mul => {
            if bits_literal(&right).is_some_and(Literal::is_zero) {
                return right;
            }
            if bits_literal(&left).is_some_and(Literal::is_zero) {
                return left;
            }
            if right.as_literal().and_then(Literal::as_u128) == Some(1) {
                return left;
            }
            if left.as_literal().and_then(Literal::as_u128) == Some(1) {
                return right;
            }
            Expr::binary(op, left, right)
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            let Some(amount) = right.as_literal().and_then(Literal::as_u128) else {
                return Expr::binary(op, left, right);
            };
            if amount == 0 {
                return left;
            }
            let ty = left.value_type();
            let clears = match ty {
                ValueType::Bits { width, signed } => {
                    amount >= u128::from(width) && (op == BinaryOp::Shl || !signed)
                }
                _ => false,
            };
            if clears {
                if let Some(zero) = zero_of(ty) {
                    return zero;
                }
            }
            Expr::binary(op, left, right)
        }
        _ => Expr::binary(op, left, right),
    }
}

/// Folds `==`/`!=` with boolean literals and multiplexers compared to literals.
fn fold_comparison(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    // Normalise the literal to the right.
    let (left, right) = if left.is_literal() && !right.is_literal() {
        (right, left)
    } else {
        (left, right)
    };

    if let Some(b) = right.as_bool() {
        return if b == (op == BinaryOp::Eq) {
            left
        } else {
            fold_unary(UnaryOp::LNot, left)
        };
    }

    if right.is_literal() {
        if let ExprKind::Mux {
            condition,
            then,
            otherwise,
        } = left.kind()
        {
            let then_cmp = fold_binary(op, then.clone(), right.clone());
            let otherwise_cmp = fold_binary(op, otherwise.clone(), right.clone());
            if then_cmp.is_literal() && otherwise_cmp.is_literal() {
                return fold_mux(condition.clone(), then_cmp, otherwise_cmp);
            }
        }
    }

    Expr::binary(op, left, right)
}

fn fold_mux(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
    if let Some(b) = condition.as_bool() {
        return if b { then } else { otherwise };
    }
    if then == otherwise {
        return then;
    }
    // A nested multiplexer on the same condition always takes the same branch.
    let then = match then.kind() {
        ExprKind::Mux {
            condition: inner,
            then: inner_then,
            ..
        } if *inner == condition => inner_then.clone(),
        _ => then,
    };
    let otherwise = match otherwise.kind() {
        ExprKind::Mux {
            condition: inner,
            otherwise: inner_otherwise,
            ..
        } if *inner == condition => inner_otherwise.clone(),
        _ => otherwise,
    };

    match (then.as_bool(), otherwise.as_bool()) {
        (Some(true), Some(false)) => condition,
        (Some(false), Some(true)) => fold_unary(UnaryOp::LNot, condition),
        (Some(true), None) => fold_binary(BinaryOp::LOr, condition, otherwise),
        (Some(false), None) => {
            fold_binary(BinaryOp::LAnd, fold_unary(UnaryOp::LNot, condition), otherwise)
        }
        (None, Some(false)) => fold_binary(BinaryOp::LAnd, condition, then),
        (None, Some(true)) => {
            fold_binary(BinaryOp::LOr, fold_unary(UnaryOp::LNot, condition), then)
        }
        _ => Expr::mux(condition, then, otherwise),
    }
}

fn fold_cast(ty: ValueType, operand: Expr) -> Expr {
    if let Some(value) = operand.as_literal().and_then(|l| l.cast(ty)) {
        return Expr::literal(value);
    }
    if operand.value_type() == ty {
        return operand;
    }
    Expr::cast(ty, operand)
}
