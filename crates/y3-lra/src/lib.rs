//! Y3 LRA - linear real arithmetic
//!
//! An MCSat theory plugin over exact rationals: [`expr::LinExpr`] linear
//! expressions, predicate atoms compared against zero, per-variable value
//! atoms for explanations, bound-driven decisions, and Fourier-Motzkin
//! resolvents on crossing bounds.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod expr;
pub mod plugin;

pub use expr::LinExpr;
pub use plugin::{Lra, LraTheory, LraView, PredOp};
