//! Model values
//!
//! The engine assigns a [`Value`] to every term on the trail: Booleans for
//! atoms, exact rationals for arithmetic terms, abstract elements for
//! uninterpreted sorts. Plugins own the interpretation of non-Boolean
//! values; the core only needs equality and cloning.

use std::fmt;

use num_rational::BigRational;

use crate::term::SortKey;

/// A value assigned to a term on the trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Boolean value of an atom's term.
    Bool(bool),
    /// Exact rational, used by linear arithmetic.
    Rat(BigRational),
    /// The `k`-th abstract element of an uninterpreted sort.
    Elt {
        /// The sort this element inhabits.
        sort: SortKey,
        /// Element index within the sort, allocated by the owning plugin.
        k: u32,
    },
}

impl Value {
    /// Shorthand for `Value::Bool(true)`.
    pub const TRUE: Value = Value::Bool(true);
    /// Shorthand for `Value::Bool(false)`.
    pub const FALSE: Value = Value::Bool(false);

    /// The Boolean content, if this is a Boolean value.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The rational content, if this is a rational value.
    #[inline]
    pub fn as_rat(&self) -> Option<&BigRational> {
        match self {
            Value::Rat(q) => Some(q),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigRational> for Value {
    fn from(q: BigRational) -> Self {
        Value::Rat(q)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Rat(q) => write!(f, "{q}"),
            Value::Elt { sort, k } => write!(f, "@{}!{}", sort.sort, k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_bool_accessors() {
        assert_eq!(Value::TRUE.as_bool(), Some(true));
        assert_eq!(Value::FALSE.as_bool(), Some(false));
        assert_eq!(Value::Rat(BigRational::from(BigInt::from(1))).as_bool(), None);
    }

    #[test]
    fn test_rat_equality_is_exact() {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        let two_quarters = BigRational::new(BigInt::from(2), BigInt::from(4));
        assert_eq!(Value::Rat(half), Value::Rat(two_quarters));
    }
}
