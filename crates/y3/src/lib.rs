//! Y3 - an MCSat SMT solving engine
//!
//! This is the main library crate that re-exports all components.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use y3_core as core;
pub use y3_mcsat as mcsat;
pub use y3_sat as sat;

/// Theory plugins
pub mod theories {
    pub use y3_lra as lra;
    pub use y3_uf as uf;
}
