//! Linear expressions over rational variables
//!
//! A [`LinExpr`] is a sum `c1*x1 + ... + cn*xn + k` with exact rational
//! coefficients. Monomials are kept sorted by term id with no zero
//! coefficients, so structurally equal expressions hash-cons to the same
//! term.

use num_rational::BigRational;
use num_traits::Zero;

use y3_core::term::{TermId, TermStore};
use y3_core::value::Value;

/// A normalised linear expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LinExpr {
    /// Coefficient-variable monomials, sorted by term id.
    monomials: Vec<(BigRational, TermId)>,
    /// The constant offset.
    constant: BigRational,
}

impl LinExpr {
    /// The zero expression.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A constant expression.
    pub fn constant(q: BigRational) -> Self {
        LinExpr {
            monomials: Vec::new(),
            constant: q,
        }
    }

    /// The expression `1 * var`.
    pub fn var(var: TermId) -> Self {
        Self::scaled_var(BigRational::from_integer(1.into()), var)
    }

    /// The expression `coeff * var`.
    pub fn scaled_var(coeff: BigRational, var: TermId) -> Self {
        if coeff.is_zero() {
            return Self::zero();
        }
        LinExpr {
            monomials: vec![(coeff, var)],
            constant: BigRational::zero(),
        }
    }

    /// The monomials, sorted by term id.
    pub fn monomials(&self) -> &[(BigRational, TermId)] {
        &self.monomials
    }

    /// The constant offset.
    pub fn constant_part(&self) -> &BigRational {
        &self.constant
    }

    /// The variables of the expression, in id order.
    pub fn vars(&self) -> impl Iterator<Item = TermId> + '_ {
        self.monomials.iter().map(|(_, t)| *t)
    }

    /// The coefficient of `var`, if present.
    pub fn coeff(&self, var: TermId) -> Option<&BigRational> {
        self.monomials
            .iter()
            .find(|(_, t)| *t == var)
            .map(|(c, _)| c)
    }

    /// Whether the expression mentions no variable.
    pub fn is_constant(&self) -> bool {
        self.monomials.is_empty()
    }

    /// Sum of two expressions.
    pub fn plus(&self, other: &LinExpr) -> LinExpr {
        let mut monomials = Vec::with_capacity(self.monomials.len() + other.monomials.len());
        let (mut i, mut j) = (0, 0);
        while i < self.monomials.len() && j < other.monomials.len() {
            let (ca, ta) = &self.monomials[i];
            let (cb, tb) = &other.monomials[j];
            match ta.cmp(tb) {
                std::cmp::Ordering::Less => {
                    monomials.push((ca.clone(), *ta));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    monomials.push((cb.clone(), *tb));
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    let c = ca + cb;
                    if !c.is_zero() {
                        monomials.push((c, *ta));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        monomials.extend(self.monomials[i..].iter().cloned());
        monomials.extend(other.monomials[j..].iter().cloned());
        LinExpr {
            monomials,
            constant: &self.constant + &other.constant,
        }
    }

    /// Difference of two expressions.
    pub fn minus(&self, other: &LinExpr) -> LinExpr {
        self.plus(&other.negated())
    }

    /// The negated expression.
    pub fn negated(&self) -> LinExpr {
        LinExpr {
            monomials: self
                .monomials
                .iter()
                .map(|(c, t)| (-c.clone(), *t))
                .collect(),
            constant: -self.constant.clone(),
        }
    }

    /// The expression scaled by `q`.
    pub fn scaled(&self, q: &BigRational) -> LinExpr {
        if q.is_zero() {
            return Self::zero();
        }
        LinExpr {
            monomials: self
                .monomials
                .iter()
                .map(|(c, t)| (c * q, *t))
                .collect(),
            constant: &self.constant * q,
        }
    }

    /// The expression shifted by a constant.
    pub fn shifted(&self, q: &BigRational) -> LinExpr {
        LinExpr {
            monomials: self.monomials.clone(),
            constant: &self.constant + q,
        }
    }

    /// Evaluate under the current assignment, or `None` if some variable
    /// is unassigned.
    pub fn eval(&self, store: &TermStore) -> Option<BigRational> {
        let mut acc = self.constant.clone();
        for (c, t) in &self.monomials {
            match store.term(*t).value() {
                Some(Value::Rat(v)) => acc += c * v,
                _ => return None,
            }
        }
        Some(acc)
    }

    /// Evaluate all monomials except `var`'s plus the constant, or `None`
    /// if one of the other variables is unassigned.
    pub fn eval_except(&self, store: &TermStore, var: TermId) -> Option<BigRational> {
        let mut acc = self.constant.clone();
        for (c, t) in &self.monomials {
            if *t == var {
                continue;
            }
            match store.term(*t).value() {
                Some(Value::Rat(v)) => acc += c * v,
                _ => return None,
            }
        }
        Some(acc)
    }
}
