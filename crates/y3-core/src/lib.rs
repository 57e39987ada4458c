//! Y3 core - data model for the MCSat engine
//!
//! The core of Y3 represents everything the search manipulates:
//!
//! - **Terms** ([`term`]): the universal unit of reasoning, hash-consed
//!   per plugin, carrying type, activity, flags, and the current
//!   assignment.
//! - **Atoms** ([`atom`]): signed occurrences of Boolean terms over a
//!   dense variable index.
//! - **Clauses** ([`clause`]): disjunctions of atoms justified by a
//!   premise; premises form the resolution-proof DAG.
//! - **Plugins** ([`plugin`]): the theory extension contract and the
//!   action buffer through which theories propagate, decide, and raise
//!   conflicts.
//! - **Proofs** ([`proof`]): replay and post-processing of the premise
//!   DAG.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atom;
pub mod clause;
pub mod plugin;
pub mod proof;
pub mod term;
pub mod value;

pub use atom::{Atom, BVar};
pub use clause::{Clause, ClauseDb, ClauseFlags, ClauseRef, Premise, Step, TheoryLemma};
pub use plugin::{Action, Actions, BacktrackHook, EvalRes, Plugin, WatchRes};
pub use proof::{Proof, ProofError};
pub use term::{
    Assignment, PendingLemma, PluginId, Reason, SortKey, Term, TermFlags, TermId, TermStore, Type,
    VarSlot, View,
};
pub use value::Value;
