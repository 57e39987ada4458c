//! Boolean variables and atoms
//!
//! Every Boolean term registered with the engine is allocated a dense
//! Boolean variable index, and the pair of atoms over it. Atoms are
//! encoded as `2 * var` (positive) and `2 * var + 1` (negative), so the
//! positive atom id is always even and negation is a single xor.

/// A dense Boolean variable identifier.
///
/// Allocated when a Boolean term is registered for decision; used to index
/// watch lists and analysis scratch arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BVar(pub u32);

/// A signed occurrence of a Boolean term.
///
/// Encoded as: positive atom = 2*var, negative atom = 2*var + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// Create the positive atom over a variable.
    #[inline]
    pub fn positive(var: BVar) -> Self {
        Atom(var.0 << 1)
    }

    /// Create the negative atom over a variable.
    #[inline]
    pub fn negative(var: BVar) -> Self {
        Atom((var.0 << 1) | 1)
    }

    /// Create an atom with an explicit polarity (`true` = positive).
    #[inline]
    pub fn with_polarity(var: BVar, polarity: bool) -> Self {
        Atom((var.0 << 1) | u32::from(!polarity))
    }

    /// The underlying Boolean variable.
    #[inline]
    pub fn var(self) -> BVar {
        BVar(self.0 >> 1)
    }

    /// Whether this is the positive atom of its variable.
    #[inline]
    pub fn is_positive(self) -> bool {
        (self.0 & 1) == 0
    }

    /// The complementary atom: `a.negated().0 == a.0 ^ 1`.
    #[inline]
    pub fn negated(self) -> Self {
        Atom(self.0 ^ 1)
    }

    /// Index for watch-list arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Inverse of [`Atom::index`].
    #[inline]
    pub fn from_index(idx: usize) -> Self {
        Atom(idx as u32)
    }
}

impl BVar {
    /// Index for per-variable arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Negation is involutive and flips exactly the sign bit.
        #[test]
        fn prop_negation_involutive(var_idx in 0u32..100_000) {
            let var = BVar(var_idx);
            let pos = Atom::positive(var);
            let neg = Atom::negative(var);

            prop_assert_eq!(pos.negated(), neg);
            prop_assert_eq!(neg.negated(), pos);
            prop_assert_eq!(pos.negated().negated(), pos);
            prop_assert_eq!(pos.0 ^ 1, neg.0);
        }

        /// The positive atom id is even and both atoms share the variable.
        #[test]
        fn prop_encoding(var_idx in 0u32..100_000) {
            let var = BVar(var_idx);
            let pos = Atom::positive(var);
            let neg = Atom::negative(var);

            prop_assert_eq!(pos.0 % 2, 0);
            prop_assert_eq!(neg.0, pos.0 + 1);
            prop_assert_eq!(pos.var(), var);
            prop_assert_eq!(neg.var(), var);
            prop_assert!(pos.is_positive());
            prop_assert!(!neg.is_positive());
        }

        /// `with_polarity` agrees with the explicit constructors.
        #[test]
        fn prop_with_polarity(var_idx in 0u32..100_000, polarity: bool) {
            let var = BVar(var_idx);
            let atom = Atom::with_polarity(var, polarity);
            prop_assert_eq!(atom.is_positive(), polarity);
            prop_assert_eq!(atom.var(), var);
        }
    }

    #[test]
    fn test_index_roundtrip() {
        let a = Atom::negative(BVar(7));
        assert_eq!(Atom::from_index(a.index()), a);
    }
}
