//! Y3 UF - uninterpreted functions and sorts
//!
//! An MCSat theory plugin assigning abstract elements to terms of
//! uninterpreted sorts, with equality atoms, provenance-tracked forced
//! values, and reactive congruence lemmas.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod plugin;

pub use plugin::{Uf, UfTheory, UfView};
