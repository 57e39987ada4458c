//! Y3 SAT - the pure-propositional surface
//!
//! The [`plugin::Sat`] plugin owns plain Boolean variables and constants;
//! propositional reasoning itself is entirely the engine's clause
//! machinery. [`dimacs`] provides the bit-exact DIMACS exporter, the
//! appendable iCNF writer, and a parser for both dialects.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dimacs;
pub mod plugin;

pub use dimacs::{DimacsError, DimacsSummary, IcnfWriter};
pub use plugin::{Sat, SatTheory, SatView};
