//! Conflict-analysis scratch state
//!
//! Holds the reusable buffers of 1-UIP analysis: seen marks per Boolean
//! variable, the learned clause under construction, the recorded
//! resolution steps, and the poison/removable caches used by recursive
//! minimisation. The walk itself lives on the solver, which owns the
//! trail and the clause database; this type keeps the allocations alive
//! across conflicts.

use y3_core::atom::{Atom, BVar};

/// Reusable conflict-analysis state.
#[derive(Debug, Default)]
pub struct Analyzer {
    /// Seen marks per Boolean variable.
    seen: Vec<bool>,
    /// Variables marked seen, for cheap clearing.
    seen_trail: Vec<BVar>,
    /// Learned atoms gathered so far (the UIP is prepended at the end).
    pub learned: Vec<Atom>,
    /// Minimisation: literal known non-removable.
    poison: Vec<bool>,
    /// Minimisation: literal known removable.
    removable: Vec<bool>,
    /// Variables whose minimisation marks need clearing.
    min_to_clear: Vec<BVar>,
    /// Variables eliminated by minimisation or level-0 resolution; their
    /// reasons must be appended to the step chain for the proof.
    eliminated: Vec<bool>,
    elim_to_clear: Vec<BVar>,
}

impl Analyzer {
    /// Create an analyzer sized for `num_bvars` variables.
    pub fn new(num_bvars: usize) -> Self {
        let mut a = Analyzer::default();
        a.ensure_bvars(num_bvars);
        a
    }

    /// Grow the scratch arrays to cover `num_bvars` variables.
    pub fn ensure_bvars(&mut self, num_bvars: usize) {
        if self.seen.len() < num_bvars {
            self.seen.resize(num_bvars, false);
            self.poison.resize(num_bvars, false);
            self.removable.resize(num_bvars, false);
            self.eliminated.resize(num_bvars, false);
        }
    }

    /// Reset for a new conflict.
    pub fn clear(&mut self) {
        for v in self.seen_trail.drain(..) {
            self.seen[v.index()] = false;
        }
        for v in self.min_to_clear.drain(..) {
            self.poison[v.index()] = false;
            self.removable[v.index()] = false;
        }
        for v in self.elim_to_clear.drain(..) {
            self.eliminated[v.index()] = false;
        }
        self.learned.clear();
    }

    /// Whether `var` is marked seen.
    #[inline]
    pub fn is_seen(&self, var: BVar) -> bool {
        self.seen[var.index()]
    }

    /// Mark `var` seen.
    #[inline]
    pub fn mark_seen(&mut self, var: BVar) {
        if !self.seen[var.index()] {
            self.seen[var.index()] = true;
            self.seen_trail.push(var);
        }
    }

    /// Unmark `var`.
    #[inline]
    pub fn unmark_seen(&mut self, var: BVar) {
        self.seen[var.index()] = false;
    }

    /// Mark `var` as eliminated (resolved out of the learned clause).
    #[inline]
    pub fn mark_eliminated(&mut self, var: BVar) {
        if !self.eliminated[var.index()] {
            self.eliminated[var.index()] = true;
            self.elim_to_clear.push(var);
        }
    }

    /// Whether `var` was eliminated.
    #[inline]
    pub fn is_eliminated(&self, var: BVar) -> bool {
        self.eliminated[var.index()]
    }

    /// Minimisation cache accessors.
    #[inline]
    pub fn is_poison(&self, var: BVar) -> bool {
        self.poison[var.index()]
    }

    /// Record that `var` cannot be removed.
    #[inline]
    pub fn mark_poison(&mut self, var: BVar) {
        if !self.poison[var.index()] {
            self.poison[var.index()] = true;
            self.min_to_clear.push(var);
        }
    }

    /// Whether `var` is cached removable.
    #[inline]
    pub fn is_removable(&self, var: BVar) -> bool {
        self.removable[var.index()]
    }

    /// Record that `var` is removable.
    #[inline]
    pub fn mark_removable(&mut self, var: BVar) {
        if !self.removable[var.index()] {
            self.removable[var.index()] = true;
            self.min_to_clear.push(var);
        }
    }

    /// Backtrack level: the highest level among the non-UIP learned
    /// atoms, or 0 for a unit learned clause.
    pub fn backtrack_level(&self, level_of: impl Fn(Atom) -> u32) -> u32 {
        self.learned.iter().map(|&a| level_of(a)).max().unwrap_or(0)
    }

    /// Reorder a learned clause so its second atom sits at the backtrack
    /// level, as required by watch initialisation.
    pub fn reorder_for_watches(atoms: &mut [Atom], level_of: impl Fn(Atom) -> u32) {
        if atoms.len() < 2 {
            return;
        }
        let mut best = 1;
        let mut best_level = level_of(atoms[1]);
        for i in 2..atoms.len() {
            let l = level_of(atoms[i]);
            if l > best_level {
                best_level = l;
                best = i;
            }
        }
        atoms.swap(1, best);
    }
}
