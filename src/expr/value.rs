//! Literal values and value types.
//!
//! [`Literal`] is the concrete value domain of the analysis: booleans, fixed-width bit
//! vectors, unbounded integers (P4 `int`, represented as `i128`) and strings (used for
//! action names). [`ValueType`] is the matching type domain.
//!
//! Bit vectors are stored as their unsigned two's complement encoding, masked to the
//! width. Widths of 1 to 128 bits are supported. All arithmetic on bit vectors wraps
//! modulo `2^width`, as it does in P4.

use std::fmt;

/// The type of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    /// A boolean.
    Bool,
    /// A fixed-width bit vector (`bit<W>` or `int<W>`).
    Bits {
        /// Width in bits (1..=128).
        width: u32,
        /// Whether the vector is interpreted as two's complement.
        signed: bool,
    },
    /// An unbounded integer (`int` in P4).
    Int,
    /// A string (action names).
    String,
}

impl ValueType {
    /// Creates an unsigned bit-vector type.
    #[must_use]
    pub const fn bits(width: u32) -> Self {
        Self::Bits {
            width,
            signed: false,
        }
    }

    /// Creates a signed bit-vector type.
    #[must_use]
    pub const fn signed_bits(width: u32) -> Self {
        Self::Bits {
            width,
            signed: true,
        }
    }

    /// Returns the bit width for bit-vector types.
    #[must_use]
    pub const fn width(&self) -> Option<u32> {
        match self {
            Self::Bits { width, .. } => Some(*width),
            Self::Bool => Some(1),
            Self::Int | Self::String => None,
        }
    }

    /// Returns the zero value of this type.
    ///
    /// Strings have the empty string as their zero value.
    #[must_use]
    pub fn zero(&self) -> Literal {
        match self {
            Self::Bool => Literal::Bool(false),
            Self::Bits { width, signed } => Literal::Bits {
                value: 0,
                width: *width,
                signed: *signed,
            },
            Self::Int => Literal::Int(0),
            Self::String => Literal::String(String::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Bits {
                width,
                signed: false,
            } => write!(f, "bit<{width}>"),
            Self::Bits {
                width,
                signed: true,
            } => write!(f, "int<{width}>"),
            Self::Int => write!(f, "int"),
            Self::String => write!(f, "string"),
        }
    }
}

/// Returns the all-ones mask for the given width.
///
/// This is also the maximum unsigned value representable in `width` bits.
#[must_use]
pub const fn width_mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Interprets a masked bit-vector encoding as a two's complement number.
fn to_signed(value: u128, width: u32) -> i128 {
    if width == 0 {
        return 0;
    }
    if width >= 128 {
        return value as i128;
    }
    let sign = 1u128 << (width - 1);
    if value & sign != 0 {
        (value as i128) - (1i128 << width)
    } else {
        value as i128
    }
}

/// A concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// A boolean value.
    Bool(bool),
    /// A fixed-width bit vector.
    Bits {
        /// The unsigned encoding, always masked to `width`.
        value: u128,
        /// Width in bits.
        width: u32,
        /// Whether comparisons and shifts treat the value as signed.
        signed: bool,
    },
    /// An unbounded integer.
    Int(i128),
    /// A string value.
    String(String),
}

impl Literal {
    /// Creates an unsigned bit vector, truncating `value` to `width` bits.
    #[must_use]
    pub const fn bits(value: u128, width: u32) -> Self {
        Self::Bits {
            value: value & width_mask(width),
            width,
            signed: false,
        }
    }

    /// Creates a signed bit vector from a two's complement number.
    #[must_use]
    pub const fn signed_bits(value: i128, width: u32) -> Self {
        Self::Bits {
            value: (value as u128) & width_mask(width),
            width,
            signed: true,
        }
    }

    /// Creates a literal of the given type from an unsigned value.
    ///
    /// # Returns
    ///
    /// `None` for string types.
    #[must_use]
    pub fn of_type(ty: ValueType, value: u128) -> Option<Self> {
        match ty {
            ValueType::Bool => Some(Self::Bool(value != 0)),
            ValueType::Bits { width, signed } => Some(Self::Bits {
                value: value & width_mask(width),
                width,
                signed,
            }),
            ValueType::Int => i128::try_from(value).ok().map(Self::Int),
            ValueType::String => None,
        }
    }

    /// Creates a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Returns the type of this literal.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Bits { width, signed, .. } => ValueType::Bits {
                width: *width,
                signed: *signed,
            },
            Self::Int(_) => ValueType::Int,
            Self::String(_) => ValueType::String,
        }
    }

    /// Returns the boolean value, if this is a boolean literal.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the unsigned encoding of numeric literals.
    ///
    /// Negative integers have no unsigned encoding and return `None`.
    #[must_use]
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::Bits { value, .. } => Some(*value),
            Self::Int(v) => u128::try_from(*v).ok(),
            Self::Bool(b) => Some(u128::from(*b)),
            Self::String(_) => None,
        }
    }

    /// Returns the string, if this is a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Checks whether this is a numeric zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bits { value, .. } => *value == 0,
            Self::Int(v) => *v == 0,
            _ => false,
        }
    }

    /// Checks whether this is a bit vector with every bit set.
    #[must_use]
    pub fn is_all_ones(&self) -> bool {
        match self {
            Self::Bits { value, width, .. } => *value == width_mask(*width),
            _ => false,
        }
    }

    /// Converts the literal to another type, following P4 cast semantics.
    ///
    /// Bit vectors are truncated or extended (sign-extended when the source is signed),
    /// `bit<1>` converts to and from `bool`, and integers take their two's complement
    /// encoding.
    ///
    /// # Returns
    ///
    /// `None` when the conversion is not defined.
    #[must_use]
    pub fn cast(&self, ty: ValueType) -> Option<Self> {
        match (self, ty) {
            (_, _) if self.value_type() == ty => Some(self.clone()),
            (Self::Bits { value, width: 1, .. }, ValueType::Bool) => Some(Self::Bool(*value == 1)),
            (Self::Bool(b), ValueType::Bits { width, signed }) => Some(Self::Bits {
                value: u128::from(*b) & width_mask(width),
                width,
                signed,
            }),
            (
                Self::Bits {
                    value,
                    width: from,
                    signed: from_signed,
                },
                ValueType::Bits { width, signed },
            ) => {
                let extended = if *from_signed {
                    to_signed(*value, *from) as u128
                } else {
                    *value
                };
                Some(Self::Bits {
                    value: extended & width_mask(width),
                    width,
                    signed,
                })
            }
            (Self::Int(v), ValueType::Bits { width, signed }) => Some(Self::Bits {
                value: (*v as u128) & width_mask(width),
                width,
                signed,
            }),
            (
                Self::Bits {
                    value,
                    width,
                    signed,
                },
                ValueType::Int,
            ) => Some(Self::Int(if *signed {
                to_signed(*value, *width)
            } else {
                i128::try_from(*value).ok()?
            })),
            _ => None,
        }
    }

    /// Returns the numeric value, interpreting signed bit vectors as two's complement.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Bits {
                value,
                width,
                signed: true,
            } => Some(to_signed(*value, *width)),
            Self::Bits { value, .. } => i128::try_from(*value).ok(),
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bits {
                value,
                width,
                signed: false,
            } => write!(f, "{width}w{value}"),
            Self::Bits {
                value,
                width,
                signed: true,
            } => write!(f, "{width}s{}", to_signed(*value, *width)),
            Self::Int(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Evaluates a unary operator on a literal.
///
/// # Returns
///
/// `None` if the operator is not defined for the operand type.
#[must_use]
pub fn evaluate_unary(op: crate::expr::UnaryOp, operand: &Literal) -> Option<Literal> {
    use crate::expr::UnaryOp;

    match (op, operand) {
        (UnaryOp::LNot, Literal::Bool(b)) => Some(Literal::Bool(!b)),
        (
            UnaryOp::Cmpl,
            Literal::Bits {
                value,
                width,
                signed,
            },
        ) => Some(Literal::Bits {
            value: !value & width_mask(*width),
            width: *width,
            signed: *signed,
        }),
        (
            UnaryOp::Neg,
            Literal::Bits {
                value,
                width,
                signed,
            },
        ) => Some(Literal::Bits {
            value: value.wrapping_neg() & width_mask(*width),
            width: *width,
            signed: *signed,
        }),
        (UnaryOp::Cmpl, Literal::Int(v)) => Some(Literal::Int(!v)),
        (UnaryOp::Neg, Literal::Int(v)) => v.checked_neg().map(Literal::Int),
        _ => None,
    }
}

/// Evaluates a binary operator on two literals.
///
/// Bit-vector operands must share a width, except for the shift amount. An unbounded
/// integer operand is first converted to the type of the bit-vector operand, mirroring
/// the implicit casts of the P4 type checker.
///
/// # Returns
///
/// `None` if the operator is not defined for the operand types or an integer operation
/// overflows.
#[must_use]
pub fn evaluate_binary(op: crate::expr::BinaryOp, left: &Literal, right: &Literal) -> Option<Literal> {
    use crate::expr::BinaryOp;

    // Shifts keep the type of the left operand, whatever the amount type is.
    if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
        return evaluate_shift(op, left, right.as_u128()?);
    }

    match (left, right) {
        (Literal::Bool(l), Literal::Bool(r)) => match op {
            BinaryOp::Eq => Some(Literal::Bool(l == r)),
            BinaryOp::Ne => Some(Literal::Bool(l != r)),
            BinaryOp::LAnd => Some(Literal::Bool(*l && *r)),
            BinaryOp::LOr => Some(Literal::Bool(*l || *r)),
            _ => None,
        },
        (Literal::String(l), Literal::String(r)) => match op {
            BinaryOp::Eq => Some(Literal::Bool(l == r)),
            BinaryOp::Ne => Some(Literal::Bool(l != r)),
            _ => None,
        },
        (Literal::Bits { width, signed, .. }, Literal::Int(_)) => {
            let converted = right.cast(ValueType::Bits {
                width: *width,
                signed: *signed,
            })?;
            evaluate_binary(op, left, &converted)
        }
        (Literal::Int(_), Literal::Bits { width, signed, .. }) => {
            let converted = left.cast(ValueType::Bits {
                width: *width,
                signed: *signed,
            })?;
            evaluate_binary(op, &converted, right)
        }
        (
            Literal::Bits {
                value: l,
                width,
                signed,
            },
            Literal::Bits {
                value: r,
                width: right_width,
                ..
            },
        ) => {
            if width != right_width {
                return None;
            }
            let mask = width_mask(*width);
            let wrap = |value: u128| Literal::Bits {
                value: value & mask,
                width: *width,
                signed: *signed,
            };
            match op {
                BinaryOp::Add => Some(wrap(l.wrapping_add(*r))),
                BinaryOp::Sub => Some(wrap(l.wrapping_sub(*r))),
                BinaryOp::Mul => Some(wrap(l.wrapping_mul(*r))),
                BinaryOp::BAnd => Some(wrap(l & r)),
                BinaryOp::BOr => Some(wrap(l | r)),
                BinaryOp::BXor => Some(wrap(l ^ r)),
                BinaryOp::Eq => Some(Literal::Bool(l == r)),
                BinaryOp::Ne => Some(Literal::Bool(l != r)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    let ordering = if *signed {
                        to_signed(*l, *width).cmp(&to_signed(*r, *width))
                    } else {
                        l.cmp(r)
                    };
                    Some(Literal::Bool(compare(op, ordering)))
                }
                BinaryOp::LAnd | BinaryOp::LOr | BinaryOp::Shl | BinaryOp::Shr => None,
            }
        }
        (Literal::Int(l), Literal::Int(r)) => match op {
            BinaryOp::Add => l.checked_add(*r).map(Literal::Int),
            BinaryOp::Sub => l.checked_sub(*r).map(Literal::Int),
            BinaryOp::Mul => l.checked_mul(*r).map(Literal::Int),
            BinaryOp::BAnd => Some(Literal::Int(l & r)),
            BinaryOp::BOr => Some(Literal::Int(l | r)),
            BinaryOp::BXor => Some(Literal::Int(l ^ r)),
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => Some(Literal::Bool(compare(op, l.cmp(r)))),
            _ => None,
        },
        _ => None,
    }
}

fn compare(op: crate::expr::BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use crate::expr::BinaryOp;
    use std::cmp::Ordering;

    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }
}

fn evaluate_shift(op: crate::expr::BinaryOp, left: &Literal, amount: u128) -> Option<Literal> {
    use crate::expr::BinaryOp;

    match left {
        Literal::Bits {
            value,
            width,
            signed,
        } => {
            let shifted = if amount >= u128::from(*width) {
                if op == BinaryOp::Shr && *signed && to_signed(*value, *width) < 0 {
                    width_mask(*width)
                } else {
                    0
                }
            } else {
                // The amount is below the width, which is at most 128.
                let amount = amount as u32;
                match op {
                    BinaryOp::Shl => value << amount,
                    _ if *signed => (to_signed(*value, *width) >> amount) as u128,
                    _ => value >> amount,
                }
            };
            Some(Literal::Bits {
                value: shifted & width_mask(*width),
                width: *width,
                signed: *signed,
            })
        }
        Literal::Int(v) => {
            let amount = u32::try_from(amount).ok()?;
            match op {
                BinaryOp::Shl => v.checked_shl(amount).map(Literal::Int),
                _ => v.checked_shr(amount).map(Literal::Int),
            }
        }
        _ => None,
    }
}
