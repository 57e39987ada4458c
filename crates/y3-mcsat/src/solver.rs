//! The MCSat solver driver
//!
//! Owns every moving part of the search: the term store, the clause
//! database, the plugins, the trail, the watch engine, the decision heap,
//! and the restart/reduction policies. The driver runs the usual state
//! machine: assume, propagate to fixpoint, decide, analyze conflicts,
//! backjump, learn, restart when due, reduce the learned-clause database
//! when it grows past its threshold.
//!
//! Plugins run inside callbacks and talk back exclusively through the
//! [`Actions`] buffer; the driver applies the buffered requests in
//! emission order and converts misuse (propagating an atom assigned the
//! other way) into an ordinary conflict on the propagating justification.

use std::cmp::Ordering;

use hashbrown::HashMap;
use tracing::{debug, trace};

use y3_core::atom::{Atom, BVar};
use y3_core::clause::{ClauseDb, ClauseFlags, ClauseRef, Premise, Step, TheoryLemma};
use y3_core::plugin::{Action, Actions, BacktrackHook, Plugin, WatchRes};
use y3_core::proof::{self, Proof, ProofError};
use y3_core::term::{Assignment, PluginId, Reason, TermFlags, TermId, TermStore};
use y3_core::value::Value;

use crate::analyze::Analyzer;
use crate::config::{Budget, SolverConfig};
use crate::heap::TermHeap;
use crate::restart::RestartState;
use crate::trail::Trail;
use crate::watch::{WatchLists, Watcher};

/// Activity ceiling triggering a rescale.
const RESCALE_LIMIT: f64 = 1e100;
/// Rescale factor applied to all activities and the increment.
const RESCALE_FACTOR: f64 = 1e-100;

/// Search statistics.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Decisions made (Boolean and semantic).
    pub decisions: u64,
    /// Trail entries processed by the propagation fixpoint.
    pub propagations: u64,
    /// Conflicts analyzed.
    pub conflicts: u64,
    /// Restarts performed.
    pub restarts: u64,
    /// Clause-database reductions.
    pub reductions: u64,
    /// Clauses learned.
    pub learned: u64,
    /// Learned clauses deleted by reduction.
    pub deleted_clauses: u64,
    /// Terms swept by garbage collection.
    pub deleted_terms: u64,
}

/// A model extracted from a satisfying trail.
#[derive(Debug, Clone, Default)]
pub struct Model {
    values: HashMap<TermId, Value>,
}

impl Model {
    /// The value of a term, if it was assigned.
    pub fn value(&self, t: TermId) -> Option<&Value> {
        self.values.get(&t)
    }

    /// The Boolean value of a term, if assigned one.
    pub fn bool_value(&self, t: TermId) -> Option<bool> {
        self.values.get(&t).and_then(Value::as_bool)
    }

    /// Number of assigned terms.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the model is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Why an instance is unsatisfiable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsatCause {
    /// Refuted outright: the proof DAG roots at the empty clause.
    Root(Proof),
    /// Refuted under the current assumption stack; the final conflict
    /// clause mentions only (negations of) assumption atoms.
    Assumptions(Vec<Atom>),
}

/// Result of a solve call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Satisfiable; the model assigns every added term.
    Sat(Model),
    /// Unsatisfiable.
    Unsat(UnsatCause),
    /// The budget ran out; the instance is untouched and re-enterable.
    Unknown,
}

/// Display adaptor routing through the owning plugin's printer.
struct TermDisplay<'a> {
    solver: &'a Solver,
    t: TermId,
}

impl std::fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plugin = &self.solver.plugins[self.t.plugin().index()];
        plugin.print(&self.solver.store, self.t, f)
    }
}

/// The learned clause produced by conflict analysis.
struct LearnedClause {
    /// Atoms with the asserting atom first and a backtrack-level atom
    /// second.
    atoms: Vec<Atom>,
    /// Level to backtrack to before attaching.
    backtrack: u32,
    /// The conflict clause the resolution chain starts from.
    init: ClauseRef,
    /// The chain, in application order.
    steps: Vec<Step>,
}

/// The MCSat solver.
pub struct Solver {
    config: SolverConfig,
    store: TermStore,
    db: ClauseDb,
    plugins: Vec<Box<dyn Plugin>>,
    trail: Trail,
    watches: WatchLists,
    heap: TermHeap,
    analyzer: Analyzer,
    restart: RestartState,
    /// Attached learned clauses, candidates for reduction.
    learned: Vec<ClauseRef>,
    /// Attached unit clauses, re-asserted after backtracking.
    unit_clauses: Vec<ClauseRef>,
    /// Learned-clause count triggering the next reduction.
    reduce_limit: usize,
    /// Assumption stack; flattened at solve entry.
    assumption_frames: Vec<Vec<Atom>>,
    active_assumptions: Vec<Atom>,
    /// One-atom `Local` clauses justifying asserted assumptions.
    local_clauses: HashMap<Atom, ClauseRef>,
    /// The empty clause, once a level-0 refutation has been derived.
    root_conflict: Option<ClauseRef>,
    /// Conflict raised outside the propagation fixpoint (registration,
    /// decisions), consumed by the next `propagate` call.
    pending_conflict: Option<ClauseRef>,
    term_inc: f64,
    clause_inc: f64,
    stats: Stats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver {
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        let restart = RestartState::new(config.restart);
        let reduce_limit = config.first_reduce;
        Solver {
            config,
            store: TermStore::new(),
            db: ClauseDb::new(),
            plugins: Vec::new(),
            trail: Trail::new(),
            watches: WatchLists::new(),
            heap: TermHeap::new(),
            analyzer: Analyzer::default(),
            restart,
            learned: Vec::new(),
            unit_clauses: Vec::new(),
            reduce_limit,
            assumption_frames: Vec::new(),
            active_assumptions: Vec::new(),
            local_clauses: HashMap::new(),
            root_conflict: None,
            pending_conflict: None,
            term_inc: 1.0,
            clause_inc: 1.0,
            stats: Stats::default(),
        }
    }

    // --- Registration --------------------------------------------------

    /// Register a plugin. The constructor receives the allocated id.
    pub fn add_plugin<P: Plugin + 'static>(&mut self, build: impl FnOnce(PluginId) -> P) -> PluginId {
        let pid = PluginId(self.plugins.len() as u8);
        let plugin = build(pid);
        let allocated = self.store.register_plugin(plugin.name());
        assert_eq!(allocated, pid, "plugin registration out of sync");
        self.plugins.push(Box::new(plugin));
        pid
    }

    /// Run `f` with mutable access to a plugin and the term store, for
    /// plugin-specific term construction outside solver callbacks.
    pub fn with_plugin<P: Plugin + 'static, R>(
        &mut self,
        pid: PluginId,
        f: impl FnOnce(&mut P, &mut TermStore) -> R,
    ) -> R {
        let plugin = self.plugins[pid.index()]
            .as_any_mut()
            .downcast_mut::<P>()
            .expect("plugin downcast to foreign type");
        f(plugin, &mut self.store)
    }

    /// The term store.
    pub fn store(&self) -> &TermStore {
        &self.store
    }

    /// Mutable access to the term store.
    pub fn store_mut(&mut self) -> &mut TermStore {
        &mut self.store
    }

    /// The clause database (hypotheses, lemmas, learned clauses).
    pub fn clause_db(&self) -> &ClauseDb {
        &self.db
    }

    /// Search statistics.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The current decision level.
    pub fn level(&self) -> u32 {
        self.trail.level()
    }

    /// The assignments in trail order.
    pub fn trail_terms(&self) -> &[TermId] {
        self.trail.assignments()
    }

    /// The current value of a term.
    pub fn value(&self, t: TermId) -> Option<&Value> {
        self.store.term(t).value()
    }

    /// Render a term through its plugin's printer.
    pub fn display_term(&self, t: TermId) -> impl std::fmt::Display + '_ {
        TermDisplay { solver: self, t }
    }

    /// Register a term (and its sub-terms) with the engine: allocate its
    /// atom pair if Boolean, queue it for decision, and let its plugin
    /// initialise watches. Idempotent.
    pub fn add_term(&mut self, t: TermId) {
        if self.store.has_flag(t, TermFlags::ADDED) {
            return;
        }
        self.store.set_flag(t, TermFlags::ADDED);
        let pid = t.plugin();
        let mut subs = Vec::new();
        self.plugins[pid.index()].subterms(&self.store, t, &mut |s| subs.push(s));
        for s in subs {
            self.add_term(s);
        }
        if self.store.ty(t).is_bool() {
            self.store.ensure_bvar(t);
            self.watches.ensure_bvars(self.store.num_bvars());
            self.analyzer.ensure_bvars(self.store.num_bvars());
        } else {
            self.store.mark_semantic(t);
        }
        self.heap.insert(&mut self.store, t);
        let ((), confl) = self.dispatch(pid, |p, acts| p.init(acts, t));
        if let Some(c) = confl {
            self.pending_conflict.get_or_insert(c);
        }
    }

    /// The atom of `t` with the given polarity, registering `t` first.
    pub fn atom(&mut self, t: TermId, polarity: bool) -> Atom {
        self.add_term(t);
        self.store.atom_of(t, polarity)
    }

    // --- Clause addition ----------------------------------------------

    /// Add a hypothesis clause. Duplicated atoms are simplified away
    /// (recorded with a [`Premise::Simplify`] wrapper); tautologies are
    /// stored but never attached.
    pub fn add_clause(&mut self, atoms: Vec<Atom>, tag: Option<u32>) {
        self.backtrack_to(0);
        let mut sorted = atoms.clone();
        sorted.sort_unstable();
        let tautology = sorted.windows(2).any(|w| w[0] == w[1].negated());
        let duplicated = sorted.windows(2).any(|w| w[0] == w[1]);

        let hyp = self.db.push(atoms, Premise::Hyp, tag);
        if tautology {
            return;
        }
        let attached = if duplicated {
            let atoms = self.db.get(hyp).atoms().to_vec();
            self.db.push(atoms, Premise::Simplify(hyp), tag)
        } else {
            hyp
        };
        if let Some(confl) = self.attach_clause(attached) {
            self.on_root_conflict(confl);
        }
    }

    /// Push a frame of assumption atoms; they hold until popped.
    pub fn push_assumptions(&mut self, atoms: &[Atom]) {
        self.backtrack_to(0);
        self.assumption_frames.push(atoms.to_vec());
    }

    /// Pop the most recent assumption frame.
    pub fn pop_assumptions(&mut self) -> Option<Vec<Atom>> {
        self.backtrack_to(0);
        self.assumption_frames.pop()
    }

    /// The assumption stack, oldest frame first.
    pub fn assumption_frames(&self) -> &[Vec<Atom>] {
        &self.assumption_frames
    }

    // --- Solving -------------------------------------------------------

    /// Solve under the current hypotheses and assumptions.
    pub fn solve(&mut self, budget: Budget) -> Outcome {
        if let Some(root) = self.root_conflict {
            return Outcome::Unsat(UnsatCause::Root(Proof::new(root)));
        }
        self.backtrack_to(0);
        self.active_assumptions = self.assumption_frames.concat();
        let start_conflicts = self.stats.conflicts;

        loop {
            if let Some(conflict) = self.propagate() {
                self.stats.conflicts += 1;
                self.restart.on_conflict();
                self.term_inc /= self.config.term_decay;
                self.clause_inc /= self.config.clause_decay;

                let conflict_level = self.clause_level(conflict);
                if conflict_level == 0 {
                    self.backtrack_to(0);
                    let root = self.on_root_conflict(conflict);
                    return Outcome::Unsat(UnsatCause::Root(Proof::new(root)));
                }
                if conflict_level < self.trail.level() {
                    self.backtrack_to(conflict_level);
                }

                let learned = self.analyze(conflict);
                self.learn_and_backjump(learned);

                if budget.exhausted(self.stats.conflicts - start_conflicts) {
                    return Outcome::Unknown;
                }
                if self.restart.due() {
                    self.restart.on_restart();
                    self.stats.restarts += 1;
                    debug!(restarts = self.stats.restarts, "restart");
                    self.backtrack_to(0);
                }
                if self.learned.len() >= self.reduce_limit {
                    self.reduce_db();
                }
            } else {
                if let Some(c) = self.reassert_units() {
                    self.pending_conflict = Some(c);
                    continue;
                }
                let assumed = self.active_assumptions.len() as u32;
                if self.trail.level() < assumed {
                    let a = self.active_assumptions[self.trail.level() as usize];
                    match self.store.atom_value(a) {
                        Some(true) => self.trail.new_level(),
                        Some(false) => {
                            let conflict = self.analyze_final(a);
                            return Outcome::Unsat(UnsatCause::Assumptions(conflict));
                        }
                        None => {
                            self.trail.new_level();
                            let local = self.local_clause(a);
                            let t = self.store.atom_term(a);
                            let confl = self.assign_bool(t, a.is_positive(), Reason::Bcp(local));
                            debug_assert!(confl.is_none());
                        }
                    }
                    continue;
                }
                match self.pick_branch_term() {
                    None => return Outcome::Sat(self.extract_model()),
                    Some(t) => {
                        if let Some(c) = self.make_decision(t) {
                            self.pending_conflict = Some(c);
                        }
                    }
                }
            }
        }
    }

    /// The resolution proof of a level-0 refutation, with raw chains
    /// rewritten to their simplified form.
    ///
    /// Panics if the instance has not been refuted at level 0.
    pub fn resolution_proof(&mut self) -> Result<Proof, ProofError> {
        let root = self
            .root_conflict
            .expect("resolution proof requested without a refutation");
        proof::tidy(&self.store, &mut self.db, root)?;
        Ok(Proof::new(root))
    }

    // --- Propagation ---------------------------------------------------

    /// Run Boolean and theory propagation to fixpoint; `Some` is a
    /// conflict clause whose atoms are all false.
    fn propagate(&mut self) -> Option<ClauseRef> {
        if let Some(c) = self.pending_conflict.take() {
            // A pending conflict can be stale if a backtrack unassigned
            // some of its atoms; only a fully falsified clause counts.
            let live = self
                .db
                .get(c)
                .atoms()
                .iter()
                .all(|&a| self.store.atom_value(a) == Some(false));
            if live {
                return Some(c);
            }
        }
        while let Some(t) = self.trail.next_queued() {
            self.stats.propagations += 1;
            if let Some(var) = self.store.bvar(t) {
                let b = self
                    .store
                    .bool_value(t)
                    .expect("queued Boolean term unassigned");
                let falsified = Atom::with_polarity(var, !b);
                if let Some(c) = self.propagate_atom(falsified) {
                    return Some(c);
                }
            }
            if let Some(c) = self.notify_watchers(t) {
                return Some(c);
            }
        }
        None
    }

    /// Visit every clause watching the newly-false `falsified` atom.
    fn propagate_atom(&mut self, falsified: Atom) -> Option<ClauseRef> {
        let mut list = self.watches.take(falsified);
        let mut conflict = None;
        let mut i = 0;
        let mut j = 0;
        'watchers: while i < list.len() {
            let w = list[i];
            i += 1;
            if self.store.atom_value(w.blocker) == Some(true) {
                list[j] = w;
                j += 1;
                continue;
            }
            let c = w.clause;
            // Normalise: the falsified atom sits at position 1.
            if self.db.get(c).atoms()[0] == falsified {
                self.db.get_mut(c).swap_atoms(0, 1);
            }
            debug_assert_eq!(self.db.get(c).atoms()[1], falsified);
            let other = self.db.get(c).atoms()[0];
            let other_val = self.store.atom_value(other);
            if other_val == Some(true) {
                list[j] = Watcher { clause: c, blocker: other };
                j += 1;
                continue;
            }
            // Search a replacement watch among the tail atoms.
            let len = self.db.get(c).len();
            for k in 2..len {
                let ak = self.db.get(c).atoms()[k];
                if self.store.atom_value(ak) != Some(false) {
                    self.db.get_mut(c).swap_atoms(1, k);
                    self.watches.add(ak, Watcher { clause: c, blocker: other });
                    continue 'watchers; // dropped from this list
                }
            }
            // No replacement: the clause is unit or conflicting.
            list[j] = Watcher { clause: c, blocker: other };
            j += 1;
            if other_val == Some(false) {
                while i < list.len() {
                    list[j] = list[i];
                    j += 1;
                    i += 1;
                }
                conflict = Some(c);
                break;
            }
            let t = self.store.atom_term(other);
            let confl = self.assign_bool(t, other.is_positive(), Reason::Bcp(c));
            debug_assert!(confl.is_none(), "unit atom was unassigned");
        }
        list.truncate(j);
        self.watches.restore(falsified, list);
        conflict
    }

    /// Wake the plugins of every term watching `t`.
    fn notify_watchers(&mut self, t: TermId) -> Option<ClauseRef> {
        let mut watchers = self.store.take_watchers(t);
        let mut conflict = None;
        let mut i = 0;
        while i < watchers.len() {
            let w = watchers[i];
            if self.store.has_flag(w, TermFlags::DELETED) {
                watchers.swap_remove(i);
                continue;
            }
            let (res, confl) = self.dispatch(w.plugin(), |p, acts| p.update_watches(acts, w, t));
            match res {
                WatchRes::Keep => i += 1,
                WatchRes::Remove => {
                    watchers.swap_remove(i);
                }
            }
            if let Some(c) = confl {
                conflict = Some(c);
                break;
            }
        }
        // Callbacks may have registered fresh watches on `t` while the
        // list was detached; merge rather than overwrite.
        let mut merged = self.store.take_watchers(t);
        for w in watchers {
            if !merged.contains(&w) {
                merged.push(w);
            }
        }
        self.store.set_watchers(t, merged);
        conflict
    }

    /// Call into a plugin and apply its buffered actions.
    fn dispatch<R>(
        &mut self,
        pid: PluginId,
        f: impl FnOnce(&mut dyn Plugin, &mut Actions<'_>) -> R,
    ) -> (R, Option<ClauseRef>) {
        let level = self.trail.level();
        let (r, queue, hooks) = {
            let plugin = self.plugins[pid.index()].as_mut();
            let mut acts = Actions::new(&mut self.store, pid, level);
            let r = f(plugin, &mut acts);
            let (queue, hooks) = acts.finish();
            (r, queue, hooks)
        };
        let confl = self.apply_actions(queue, hooks);
        (r, confl)
    }

    /// Apply buffered plugin requests in emission order; a conflict stops
    /// the application of the requests that follow it.
    fn apply_actions(
        &mut self,
        queue: Vec<Action>,
        hooks: Vec<(PluginId, BacktrackHook)>,
    ) -> Option<ClauseRef> {
        let level = self.trail.level();
        for (pid, hook) in hooks {
            if level > 0 {
                self.trail.add_hook(level, pid, hook);
            }
        }
        for action in queue {
            match action {
                Action::PushClause { atoms, lemma } => {
                    for &a in &atoms {
                        let t = self.store.atom_term(a);
                        self.add_term(t);
                    }
                    let c = self.db.push(atoms, Premise::Lemma(lemma), None);
                    if let Some(confl) = self.attach_clause(c) {
                        return Some(confl);
                    }
                }
                Action::PropagateEval { term, value, subs } => {
                    // Registering the sub-terms first lets freshly interned
                    // value atoms evaluate before the propagation that
                    // cites them.
                    for &s in &subs {
                        self.add_term(s);
                    }
                    self.add_term(term);
                    if let Some(confl) = self.assign_bool(term, value, Reason::Eval(subs)) {
                        return Some(confl);
                    }
                }
                Action::PropagateLemma {
                    term,
                    value,
                    others,
                    lemma,
                } => {
                    for &a in &others {
                        let t = self.store.atom_term(a);
                        self.add_term(t);
                    }
                    self.add_term(term);
                    debug_assert!(others
                        .iter()
                        .all(|&a| self.store.atom_value(a) == Some(false)));
                    let pending = y3_core::term::PendingLemma { others, lemma };
                    if let Some(confl) = self.assign_bool(term, value, Reason::BcpLazy(pending)) {
                        return Some(confl);
                    }
                }
                Action::Conflict { atoms, lemma } => {
                    for &a in &atoms {
                        let t = self.store.atom_term(a);
                        self.add_term(t);
                    }
                    debug_assert!(atoms
                        .iter()
                        .all(|&a| self.store.atom_value(a) == Some(false)));
                    let c = self.db.push(atoms, Premise::Lemma(lemma), None);
                    return Some(c);
                }
            }
        }
        None
    }

    /// Assign a Boolean value to `t`. An opposite existing assignment is
    /// converted into a conflict on the propagating justification.
    fn assign_bool(&mut self, t: TermId, b: bool, reason: Reason) -> Option<ClauseRef> {
        debug_assert!(self.store.has_flag(t, TermFlags::ADDED));
        match self.store.bool_value(t) {
            Some(v) if v == b => None,
            Some(_) => Some(self.conflict_from_justification(t, b, reason)),
            None => {
                let level = self.trail.level();
                self.store.term_mut(t).assign = Some(Assignment {
                    value: Value::Bool(b),
                    level,
                    reason,
                });
                self.trail.push(t);
                None
            }
        }
    }

    /// Build the conflict clause for a propagation of `t = b` that found
    /// `t` assigned the other way.
    fn conflict_from_justification(&mut self, t: TermId, b: bool, reason: Reason) -> ClauseRef {
        match reason {
            Reason::Bcp(c) => c,
            Reason::BcpLazy(pending) => {
                let mut atoms = Vec::with_capacity(pending.others.len() + 1);
                atoms.push(self.store.atom_of(t, b));
                atoms.extend(pending.others);
                self.db.push(atoms, Premise::Lemma(pending.lemma), None)
            }
            Reason::Eval(_) => {
                let pid = t.plugin();
                let others = self.plugins[pid.index()].explain(&self.store, t);
                let mut atoms = Vec::with_capacity(others.len() + 1);
                atoms.push(self.store.atom_of(t, b));
                atoms.extend(others);
                let lemma = TheoryLemma { plugin: pid, rule: "eval" };
                self.db.push(atoms, Premise::Lemma(lemma), None)
            }
            Reason::Decision => unreachable!("decisions target unassigned terms"),
        }
    }

    /// The reason clause of an assigned term, forcing lazy lemmas and
    /// synthesising evaluation lemmas at most once each.
    fn reason_clause(&mut self, t: TermId) -> ClauseRef {
        enum Kind {
            Done(ClauseRef),
            Lazy,
            Eval,
        }
        let kind = match self.store.reason(t).expect("reason of unassigned term") {
            Reason::Bcp(c) => Kind::Done(*c),
            Reason::BcpLazy(_) => Kind::Lazy,
            Reason::Eval(_) => Kind::Eval,
            Reason::Decision => panic!("decision has no reason clause"),
        };
        match kind {
            Kind::Done(c) => c,
            Kind::Lazy => {
                let b = self.store.bool_value(t).expect("lazy reason on non-Boolean");
                let assign = self.store.term_mut(t).assign.as_mut().expect("assigned");
                let pending =
                    match std::mem::replace(&mut assign.reason, Reason::Decision) {
                        Reason::BcpLazy(p) => p,
                        _ => unreachable!(),
                    };
                let mut atoms = Vec::with_capacity(pending.others.len() + 1);
                atoms.push(self.store.atom_of(t, b));
                atoms.extend(pending.others);
                let c = self.db.push(atoms, Premise::Lemma(pending.lemma), None);
                self.store.term_mut(t).assign.as_mut().expect("assigned").reason =
                    Reason::Bcp(c);
                c
            }
            Kind::Eval => {
                let b = self.store.bool_value(t).expect("eval reason on non-Boolean");
                let pid = t.plugin();
                let others = self.plugins[pid.index()].explain(&self.store, t);
                debug_assert!(others
                    .iter()
                    .all(|&a| self.store.atom_value(a) == Some(false)));
                let mut atoms = Vec::with_capacity(others.len() + 1);
                atoms.push(self.store.atom_of(t, b));
                atoms.extend(others);
                let lemma = TheoryLemma { plugin: pid, rule: "eval" };
                let c = self.db.push(atoms, Premise::Lemma(lemma), None);
                self.store.term_mut(t).assign.as_mut().expect("assigned").reason =
                    Reason::Bcp(c);
                c
            }
        }
    }

    // --- Clause attachment --------------------------------------------

    /// Attach a clause at the current state: set up watches, propagate if
    /// it is unit, report it as the conflict if it is falsified.
    fn attach_clause(&mut self, c: ClauseRef) -> Option<ClauseRef> {
        let atoms: Vec<Atom> = self.db.get(c).atoms().to_vec();
        match atoms.len() {
            0 => return Some(c),
            1 => {
                self.db.get_mut(c).flags.insert(ClauseFlags::ATTACHED);
                self.unit_clauses.push(c);
                let a = atoms[0];
                return match self.store.atom_value(a) {
                    Some(true) => None,
                    Some(false) => Some(c),
                    None => {
                        self.assign_bool(self.store.atom_term(a), a.is_positive(), Reason::Bcp(c))
                    }
                };
            }
            _ => {}
        }
        // Watch the two best atoms: non-false first, then deepest false.
        let mut order: Vec<usize> = (0..atoms.len()).collect();
        order.sort_by_key(|&i| {
            let a = atoms[i];
            match self.store.atom_value(a) {
                None | Some(true) => (0u8, 0i64),
                Some(false) => {
                    let lvl = self.store.level(self.store.atom_term(a)).unwrap_or(0);
                    (1u8, -(lvl as i64))
                }
            }
        });
        let (i0, i1) = (order[0], order[1]);
        self.db.get_mut(c).swap_atoms(0, i0);
        let j1 = if i1 == 0 { i0 } else { i1 };
        if j1 != 1 {
            self.db.get_mut(c).swap_atoms(1, j1);
        }
        let a0 = self.db.get(c).atoms()[0];
        let a1 = self.db.get(c).atoms()[1];
        debug_assert_ne!(a0, a1, "attached clause with a duplicated atom");
        self.watches.add(a0, Watcher { clause: c, blocker: a1 });
        self.watches.add(a1, Watcher { clause: c, blocker: a0 });
        self.db.get_mut(c).flags.insert(ClauseFlags::ATTACHED);

        match (self.store.atom_value(a0), self.store.atom_value(a1)) {
            (Some(false), _) => Some(c),
            (None, Some(false)) => {
                self.assign_bool(self.store.atom_term(a0), a0.is_positive(), Reason::Bcp(c))
            }
            _ => None,
        }
    }

    /// Remove a clause from the watch scheme.
    fn detach_clause(&mut self, c: ClauseRef) {
        if !self.db.get(c).is_attached() {
            return;
        }
        if self.db.get(c).len() >= 2 {
            let a0 = self.db.get(c).atoms()[0];
            let a1 = self.db.get(c).atoms()[1];
            self.watches.remove(a0, c);
            self.watches.remove(a1, c);
        }
        self.db.get_mut(c).flags.remove(ClauseFlags::ATTACHED);
    }

    /// Re-assert attached unit clauses whose atom was unassigned by
    /// backtracking.
    fn reassert_units(&mut self) -> Option<ClauseRef> {
        for idx in 0..self.unit_clauses.len() {
            let c = self.unit_clauses[idx];
            if self.db.get(c).is_deleted() {
                continue;
            }
            let a = self.db.get(c).atoms()[0];
            match self.store.atom_value(a) {
                Some(true) => {}
                Some(false) => return Some(c),
                None => {
                    let t = self.store.atom_term(a);
                    if let Some(confl) = self.assign_bool(t, a.is_positive(), Reason::Bcp(c)) {
                        return Some(confl);
                    }
                }
            }
        }
        None
    }

    // --- Decisions -----------------------------------------------------

    fn pick_branch_term(&mut self) -> Option<TermId> {
        while let Some(t) = self.heap.pop_max(&mut self.store) {
            if self.store.term(t).assign.is_some() || self.store.has_flag(t, TermFlags::DELETED) {
                continue;
            }
            return Some(t);
        }
        None
    }

    fn make_decision(&mut self, t: TermId) -> Option<ClauseRef> {
        self.stats.decisions += 1;
        trace!(term = %self.display_term(t), level = self.trail.level() + 1, "decide");
        if self.store.ty(t).is_bool() {
            let polarity = match self.store.term(t).phase {
                Some(Value::Bool(b)) => b,
                _ => self.config.default_phase,
            };
            self.trail.new_level();
            let confl = self.assign_bool(t, polarity, Reason::Decision);
            debug_assert!(confl.is_none());
            None
        } else {
            self.trail.new_level();
            let (value, confl) = self.dispatch(t.plugin(), |p, acts| p.decide(acts, t));
            if confl.is_some() {
                return confl;
            }
            if self.store.term(t).assign.is_none() {
                let level = self.trail.level();
                self.store.term_mut(t).assign = Some(Assignment {
                    value,
                    level,
                    reason: Reason::Decision,
                });
                self.trail.push(t);
            }
            None
        }
    }

    // --- Backtracking --------------------------------------------------

    /// Backtrack to `level`: clear popped assignments (saving phases),
    /// requeue the popped terms for decision, and run the backtrack hooks
    /// in LIFO order.
    pub fn backtrack_to(&mut self, level: u32) {
        if level >= self.trail.level() {
            return;
        }
        let (popped, hooks) = self.trail.pop_to(level);
        for t in popped {
            let term = self.store.term_mut(t);
            if let Some(assign) = term.assign.take() {
                term.phase = Some(assign.value);
            }
            self.heap.insert(&mut self.store, t);
        }
        for (pid, hook) in hooks {
            hook(self.plugins[pid.index()].as_any_mut());
        }
    }

    // --- Conflict analysis --------------------------------------------

    /// Highest assignment level among a (falsified) clause's atoms.
    fn clause_level(&self, c: ClauseRef) -> u32 {
        self.db
            .get(c)
            .atoms()
            .iter()
            .map(|&a| self.store.level(self.store.atom_term(a)).unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Whether `t`'s assignment rests purely on semantic assignments and
    /// therefore cannot be resolved through a clause.
    fn semantically_forced(&self, t: TermId) -> bool {
        match self.store.reason(t) {
            Some(Reason::Eval(subs)) => subs.iter().all(|&s| self.store.bvar(s).is_none()),
            _ => false,
        }
    }

    /// The one-atom `Local` clause justifying assumption `a`, created on
    /// first assertion. Never attached: the driver re-asserts assumptions
    /// itself, and the clause's validity is scoped to the stack.
    fn local_clause(&mut self, a: Atom) -> ClauseRef {
        if let Some(&c) = self.local_clauses.get(&a) {
            return c;
        }
        let c = self.db.push(vec![a], Premise::Local, None);
        self.local_clauses.insert(a, c);
        c
    }

    /// Whether `t` was assigned by a local assumption; such assignments
    /// are boundaries for minimisation and final-conflict analysis.
    fn locally_assumed(&self, t: TermId) -> bool {
        match self.store.reason(t) {
            Some(Reason::Bcp(c)) => matches!(self.db.get(*c).premise, Premise::Local),
            _ => false,
        }
    }

    /// 1-UIP conflict analysis with clause minimisation and resolution
    /// recording.
    fn analyze(&mut self, conflict: ClauseRef) -> LearnedClause {
        let d = self.trail.level();
        debug_assert!(d > 0, "level-0 conflicts are refutations");
        self.analyzer.ensure_bvars(self.store.num_bvars());
        self.analyzer.clear();
        self.bump_clause(conflict);

        let mut clause_atoms: Vec<Atom> = self.db.get(conflict).atoms().to_vec();
        let mut steps: Vec<Step> = Vec::new();
        let mut pivot: Option<BVar> = None;
        let mut counter: u32 = 0;
        let mut index = self.trail.len();
        let mut semantic_kept = false;
        let uip;

        loop {
            for k in 0..clause_atoms.len() {
                let a = clause_atoms[k];
                let v = a.var();
                if Some(v) == pivot || self.analyzer.is_seen(v) {
                    continue;
                }
                debug_assert_eq!(self.store.atom_value(a), Some(false));
                let at = self.store.atom_term(a);
                let lvl = self.store.level(at).expect("false atom is assigned");
                self.analyzer.mark_seen(v);
                self.bump_term(at);
                if lvl == d {
                    counter += 1;
                } else if lvl > 0 {
                    self.analyzer.learned.push(a);
                } else {
                    // Level-0 atoms are resolved out at the end so the
                    // recorded chain still concludes the learned clause.
                    self.analyzer.mark_eliminated(v);
                }
            }

            let (p_term, p_var) = loop {
                debug_assert!(index > 0, "analysis walked off the trail");
                index -= 1;
                let t = self.trail.assignments()[index];
                if let Some(v) = self.store.bvar(t) {
                    if self.analyzer.is_seen(v) {
                        break (t, v);
                    }
                }
            };
            self.analyzer.unmark_seen(p_var);
            counter -= 1;
            let p_value = self.store.bool_value(p_term).expect("marked term assigned");
            let p_false = Atom::with_polarity(p_var, !p_value);

            if counter == 0 {
                uip = p_false;
                break;
            }
            if self.semantically_forced(p_term) {
                // Semantic backjump: the atom is forced by a semantic
                // decision and stays in the learned clause.
                self.analyzer.learned.push(p_false);
                self.analyzer.mark_seen(p_var);
                semantic_kept = true;
                clause_atoms.clear();
                pivot = None;
                continue;
            }
            let side = self.reason_clause(p_term);
            self.bump_clause(side);
            steps.push(Step {
                clause: side,
                pivot: p_term,
            });
            clause_atoms = self.db.get(side).atoms().to_vec();
            pivot = Some(p_var);
        }

        self.minimize_learned();

        let bt = {
            let store = &self.store;
            let level_of = |a: Atom| store.level(store.atom_term(a)).unwrap_or(0);
            let bt = self.analyzer.backtrack_level(level_of);
            if semantic_kept && bt >= d {
                d - 1
            } else {
                bt
            }
        };

        self.append_elimination_steps(&mut steps);

        let mut atoms = Vec::with_capacity(self.analyzer.learned.len() + 1);
        atoms.push(uip);
        atoms.extend(self.analyzer.learned.iter().copied());
        {
            let store = &self.store;
            Analyzer::reorder_for_watches(&mut atoms, |a| {
                store.level(store.atom_term(a)).unwrap_or(0)
            });
        }
        trace!(len = atoms.len(), backtrack = bt, "learned clause");
        LearnedClause {
            atoms,
            backtrack: bt,
            init: conflict,
            steps,
        }
    }

    /// Self-subsumption minimisation of the learned clause, bounded in
    /// depth; removed literals are recorded for chain completion.
    fn minimize_learned(&mut self) {
        let learned = std::mem::take(&mut self.analyzer.learned);
        let mut kept = Vec::with_capacity(learned.len());
        for &a in &learned {
            if self.is_redundant(a, 0) {
                self.analyzer.mark_eliminated(a.var());
            } else {
                kept.push(a);
            }
        }
        self.analyzer.learned = kept;
    }

    fn is_redundant(&mut self, a: Atom, depth: u32) -> bool {
        let v = a.var();
        let t = self.store.atom_term(a);
        let lvl = self.store.level(t).expect("learned atom is assigned");
        if lvl == 0 {
            self.analyzer.mark_eliminated(v);
            return true;
        }
        if self.analyzer.is_removable(v) {
            return true;
        }
        if self.analyzer.is_poison(v) {
            return false;
        }
        if depth > 0 && self.analyzer.is_seen(v) {
            return true;
        }
        if depth > self.config.minimize_depth {
            return false;
        }
        let c = match self.store.reason(t) {
            Some(Reason::Bcp(c)) => *c,
            _ => {
                self.analyzer.mark_poison(v);
                return false;
            }
        };
        // An assumption's Local clause holds only while the assumption is
        // pushed; resolving through it would detach the learned clause
        // from the stack.
        if matches!(self.db.get(c).premise, Premise::Local) {
            self.analyzer.mark_poison(v);
            return false;
        }
        let reason_atoms: Vec<Atom> = self.db.get(c).atoms().to_vec();
        for ra in reason_atoms {
            if ra.var() == v {
                continue;
            }
            if !self.is_redundant(ra, depth + 1) {
                self.analyzer.mark_poison(v);
                return false;
            }
        }
        self.analyzer.mark_removable(v);
        true
    }

    /// Resolve every eliminated variable through its reason, in reverse
    /// trail order, appending the steps so the chain concludes exactly
    /// the learned clause.
    fn append_elimination_steps(&mut self, steps: &mut Vec<Step>) {
        for idx in (0..self.trail.len()).rev() {
            let t = self.trail.assignments()[idx];
            let Some(v) = self.store.bvar(t) else { continue };
            if !self.analyzer.is_eliminated(v) {
                continue;
            }
            let side = self.reason_clause(t);
            self.bump_clause(side);
            steps.push(Step { clause: side, pivot: t });
            let side_atoms: Vec<Atom> = self.db.get(side).atoms().to_vec();
            for a in side_atoms {
                let av = a.var();
                if av == v || self.analyzer.is_seen(av) || self.analyzer.is_eliminated(av) {
                    continue;
                }
                debug_assert!(
                    self.store.level(self.store.atom_term(a)) == Some(0)
                        || self.analyzer.is_removable(av),
                    "unexpected atom introduced while completing the chain"
                );
                self.analyzer.mark_eliminated(av);
            }
        }
    }

    /// Attach the learned clause after backjumping; the asserting atom
    /// propagates immediately.
    fn learn_and_backjump(&mut self, learned: LearnedClause) {
        self.backtrack_to(learned.backtrack);
        let c = self.db.push(
            learned.atoms,
            Premise::Raw {
                init: learned.init,
                steps: learned.steps,
            },
            None,
        );
        self.stats.learned += 1;
        self.learned.push(c);
        self.db.get_mut(c).activity = self.clause_inc;
        if let Some(confl) = self.attach_clause(c) {
            debug_assert!(false, "learned clause falsified after backjump");
            self.pending_conflict = Some(confl);
        }
    }

    /// Derive the empty clause from a level-0 conflict.
    fn on_root_conflict(&mut self, conflict: ClauseRef) -> ClauseRef {
        if let Some(root) = self.root_conflict {
            return root;
        }
        debug_assert_eq!(self.trail.level(), 0);
        if self.db.get(conflict).is_empty() {
            self.root_conflict = Some(conflict);
            return conflict;
        }
        self.analyzer.ensure_bvars(self.store.num_bvars());
        self.analyzer.clear();
        let atoms: Vec<Atom> = self.db.get(conflict).atoms().to_vec();
        for a in atoms {
            self.analyzer.mark_eliminated(a.var());
        }
        let mut steps = Vec::new();
        self.append_elimination_steps(&mut steps);
        let empty = self.db.push(
            Vec::new(),
            Premise::Raw {
                init: conflict,
                steps,
            },
            None,
        );
        debug!(root = %empty, "derived the empty clause");
        self.root_conflict = Some(empty);
        empty
    }

    /// Express a failed assumption as a conflict over assumption atoms.
    fn analyze_final(&mut self, failed: Atom) -> Vec<Atom> {
        self.analyzer.ensure_bvars(self.store.num_bvars());
        self.analyzer.clear();
        let mut out = vec![failed];
        self.analyzer.mark_seen(failed.var());
        for idx in (0..self.trail.len()).rev() {
            let t = self.trail.assignments()[idx];
            let Some(v) = self.store.bvar(t) else { continue };
            if !self.analyzer.is_seen(v) {
                continue;
            }
            let boundary = matches!(self.store.reason(t), Some(Reason::Decision))
                || self.locally_assumed(t);
            if boundary {
                let b = self.store.bool_value(t).expect("assigned");
                let falsified = Atom::with_polarity(v, !b);
                if falsified != failed {
                    out.push(falsified);
                }
            } else {
                let side = self.reason_clause(t);
                let atoms: Vec<Atom> = self.db.get(side).atoms().to_vec();
                for a in atoms {
                    self.analyzer.mark_seen(a.var());
                }
            }
        }
        out
    }

    // --- Activities ----------------------------------------------------

    fn bump_term(&mut self, t: TermId) {
        let inc = self.term_inc;
        self.store.term_mut(t).weight += inc;
        if self.store.term(t).weight > RESCALE_LIMIT {
            let all: Vec<TermId> = self.store.all_terms().collect();
            for id in all {
                self.store.term_mut(id).weight *= RESCALE_FACTOR;
            }
            self.term_inc *= RESCALE_FACTOR;
        }
        self.heap.update(&mut self.store, t);
    }

    fn bump_clause(&mut self, c: ClauseRef) {
        let inc = self.clause_inc;
        let clause = self.db.get_mut(c);
        clause.activity += inc;
        if clause.activity > RESCALE_LIMIT {
            for r in self.db.refs().collect::<Vec<_>>() {
                self.db.get_mut(r).activity *= RESCALE_FACTOR;
            }
            self.clause_inc *= RESCALE_FACTOR;
        }
    }

    // --- Reduction and garbage collection ------------------------------

    /// A clause currently acting as the reason of a trail literal must
    /// not be deleted.
    fn locked(&self, c: ClauseRef) -> bool {
        let atoms = self.db.get(c).atoms();
        if atoms.is_empty() {
            return true;
        }
        let t = self.store.atom_term(atoms[0]);
        self.store.atom_value(atoms[0]) == Some(true)
            && matches!(self.store.reason(t), Some(Reason::Bcp(r)) if *r == c)
    }

    /// Delete the low-activity half of the learned clauses, skipping
    /// binary clauses and current reasons, then sweep unreachable terms.
    fn reduce_db(&mut self) {
        self.stats.reductions += 1;
        self.learned.retain(|&c| !self.db.get(c).is_deleted());
        let mut order = self.learned.clone();
        order.sort_by(|&a, &b| {
            self.db
                .get(a)
                .activity
                .partial_cmp(&self.db.get(b).activity)
                .unwrap_or(Ordering::Equal)
        });
        let half = order.len() / 2;
        let mut removed = 0usize;
        for &c in &order[..half] {
            if self.db.get(c).len() <= 2 || self.locked(c) {
                continue;
            }
            self.detach_clause(c);
            self.db.get_mut(c).flags.insert(ClauseFlags::DELETED);
            self.stats.deleted_clauses += 1;
            removed += 1;
        }
        self.learned.retain(|&c| !self.db.get(c).is_deleted());
        self.reduce_limit = (self.reduce_limit as f64 * self.config.reduce_growth) as usize;
        debug!(removed, next_limit = self.reduce_limit, "reduced clause database");
        self.gc_terms();
    }

    /// Mark terms reachable from attached clauses, the trail, and the
    /// assumption stack; sweep the rest through the plugin delete hooks.
    fn gc_terms(&mut self) {
        let all: Vec<TermId> = self.store.all_terms().collect();
        for &t in &all {
            self.store.clear_flag(t, TermFlags::GC_MARKED);
        }
        let mut work: Vec<TermId> = Vec::new();
        for c in self.db.refs().collect::<Vec<_>>() {
            let clause = self.db.get(c);
            if !clause.is_attached() || clause.is_deleted() {
                continue;
            }
            for &a in clause.atoms() {
                work.push(self.store.atom_term(a));
            }
        }
        work.extend(self.trail.assignments().iter().copied());
        for frame in &self.assumption_frames {
            for &a in frame {
                work.push(self.store.atom_term(a));
            }
        }
        while let Some(t) = work.pop() {
            if self.store.has_flag(t, TermFlags::GC_MARKED) {
                continue;
            }
            self.store.set_flag(t, TermFlags::GC_MARKED);
            let mut kids = Vec::new();
            self.plugins[t.plugin().index()].subterms(&self.store, t, &mut |s| kids.push(s));
            work.extend(kids);
        }
        for &t in &all {
            if self.store.has_flag(t, TermFlags::ADDED)
                && !self.store.has_flag(t, TermFlags::GC_MARKED)
                && !self.store.has_flag(t, TermFlags::DELETED)
            {
                self.store.set_flag(t, TermFlags::DELETED);
                self.store.term_mut(t).watchers.clear();
                self.plugins[t.plugin().index()].on_delete(t);
                self.stats.deleted_terms += 1;
            }
        }
        for &t in &all {
            if self.store.has_flag(t, TermFlags::DELETED) {
                continue;
            }
            let mut ws = self.store.take_watchers(t);
            ws.retain(|&w| !self.store.has_flag(w, TermFlags::DELETED));
            self.store.set_watchers(t, ws);
        }
    }

    // --- Model extraction and invariants -------------------------------

    fn extract_model(&self) -> Model {
        let mut values = HashMap::new();
        for &t in self.trail.assignments() {
            if let Some(v) = self.store.term(t).value() {
                values.insert(t, v.clone());
            }
        }
        Model { values }
    }

    /// Check the structural invariants of the watch scheme and the trail.
    /// Meant for tests; panics on violation.
    pub fn check_invariants(&self) {
        for c in self.db.refs() {
            let clause = self.db.get(c);
            if !clause.is_attached() || clause.is_deleted() || clause.len() < 2 {
                continue;
            }
            for k in 0..2 {
                let a = clause.atoms()[k];
                let n = self.watches.get(a).iter().filter(|w| w.clause == c).count();
                assert_eq!(n, 1, "{c} must appear once in the watch list of {a:?}");
            }
            assert_eq!(self.watches.count_for_clause(c), 2, "{c} watch count");
        }
        let mut pos: HashMap<TermId, usize> = HashMap::new();
        for (i, &t) in self.trail.assignments().iter().enumerate() {
            let assign = self.store.term(t).assign.as_ref().expect("trail term assigned");
            match &assign.reason {
                Reason::Bcp(c) => {
                    let b = assign.value.as_bool().expect("Bcp on Boolean term");
                    let lit = self.store.atom_of(t, b);
                    let clause = self.db.get(*c);
                    assert!(clause.atoms().contains(&lit), "{c} must contain its literal");
                    for &a in clause.atoms() {
                        if a == lit {
                            continue;
                        }
                        assert_eq!(self.store.atom_value(a), Some(false));
                        let at = self.store.atom_term(a);
                        assert!(self.store.level(at).expect("assigned") <= assign.level);
                        let p = pos
                            .get(&at)
                            .copied()
                            .expect("reason atom precedes its literal on the trail");
                        assert!(p < i, "trail must topologically order reasons");
                    }
                }
                Reason::Eval(subs) => {
                    for s in subs {
                        let p = pos.get(s).copied().expect("evaluation sub is on the trail");
                        assert!(p < i, "evaluation subs precede the evaluation");
                    }
                }
                _ => {}
            }
            pos.insert(t, i);
        }
    }
}
