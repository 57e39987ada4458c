//! Y3 MCSat - the search engine
//!
//! A unified search that decides Boolean atoms and theory terms on a
//! single trail:
//!
//! - two-watched-literal Boolean propagation plus generalised term
//!   watches that wake theory plugins ([`watch`], [`solver`]);
//! - 1-UIP conflict analysis with bounded self-subsumption minimisation
//!   and resolution-chain recording ([`analyze`], [`solver`]);
//! - an activity max-heap over terms with phase saving ([`heap`]);
//! - Luby or geometric restarts ([`restart`]) and activity-driven
//!   clause-database reduction with piggybacked term GC ([`solver`]).
//!
//! The driver is [`solver::Solver`]; theory integration goes through the
//! plugin contract of `y3-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyze;
pub mod config;
pub mod heap;
pub mod restart;
pub mod solver;
pub mod trail;
pub mod watch;

pub use config::{Budget, RestartPolicy, SolverConfig};
pub use solver::{Model, Outcome, Solver, Stats, UnsatCause};
