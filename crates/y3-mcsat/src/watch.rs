//! Boolean watch lists
//!
//! Each attached clause designates its first two atoms as watched; the
//! watch list of an atom holds the clauses that must be visited when the
//! atom becomes false. Entries carry a blocker atom, a cached literal of
//! the clause checked before the clause itself is touched.

use y3_core::atom::Atom;
use y3_core::clause::ClauseRef;

/// A watch-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watcher {
    /// The watching clause.
    pub clause: ClauseRef,
    /// Some other atom of the clause; if it is true the clause is
    /// satisfied and need not be read.
    pub blocker: Atom,
}

/// Per-atom watch lists.
#[derive(Debug, Default)]
pub struct WatchLists {
    lists: Vec<Vec<Watcher>>,
}

impl WatchLists {
    /// Create empty lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure lists exist for `num_bvars` Boolean variables.
    pub fn ensure_bvars(&mut self, num_bvars: usize) {
        let target = num_bvars * 2;
        if self.lists.len() < target {
            self.lists.resize_with(target, Vec::new);
        }
    }

    /// Add a watcher to `atom`'s list.
    #[inline]
    pub fn add(&mut self, atom: Atom, watcher: Watcher) {
        self.lists[atom.index()].push(watcher);
    }

    /// The watchers of `atom`.
    #[inline]
    pub fn get(&self, atom: Atom) -> &[Watcher] {
        &self.lists[atom.index()]
    }

    /// Detach `atom`'s list for in-place traversal; pair with
    /// [`WatchLists::restore`].
    #[inline]
    pub fn take(&mut self, atom: Atom) -> Vec<Watcher> {
        std::mem::take(&mut self.lists[atom.index()])
    }

    /// Restore a list detached by [`WatchLists::take`].
    #[inline]
    pub fn restore(&mut self, atom: Atom, list: Vec<Watcher>) {
        debug_assert!(self.lists[atom.index()].is_empty());
        self.lists[atom.index()] = list;
    }

    /// Remove the watcher of `clause` from `atom`'s list.
    pub fn remove(&mut self, atom: Atom, clause: ClauseRef) {
        let list = &mut self.lists[atom.index()];
        if let Some(pos) = list.iter().position(|w| w.clause == clause) {
            list.swap_remove(pos);
        }
    }

    /// How many watch lists reference `clause` (invariant checking).
    pub fn count_for_clause(&self, clause: ClauseRef) -> usize {
        self.lists
            .iter()
            .flatten()
            .filter(|w| w.clause == clause)
            .count()
    }
}
