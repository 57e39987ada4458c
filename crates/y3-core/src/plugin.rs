//! The theory plugin contract
//!
//! Plugins own term views and the decision procedures over them. They
//! never mutate the trail directly: every effect goes through an
//! [`Actions`] buffer handed to each callback, and the engine applies the
//! buffered requests in emission order once the callback returns. A
//! conflict request stops the application of the requests that follow it.

use std::any::Any;
use std::fmt;

use crate::atom::Atom;
use crate::clause::TheoryLemma;
use crate::term::{PluginId, TermId, TermStore};
use crate::value::Value;

/// Verdict of a generalised-watch callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRes {
    /// Keep the watch on this term.
    Keep,
    /// Drop the watch; the plugin re-registered elsewhere or is done.
    Remove,
}

/// Result of evaluating a term under the current partial assignment.
#[derive(Debug)]
pub enum EvalRes {
    /// Not determined by the current assignment.
    Unknown,
    /// Evaluates to `value` because of the listed sub-term assignments.
    Into {
        /// The computed value.
        value: Value,
        /// The assigned terms the evaluation rests on.
        used: Vec<TermId>,
    },
}

/// A deferred undo action, run when the engine backtracks past the level
/// that registered it. Receives the registering plugin, to be downcast.
pub type BacktrackHook = Box<dyn FnOnce(&mut dyn Any)>;

/// A buffered plugin request.
#[derive(Debug)]
pub enum Action {
    /// Add a permanent clause (not erased on backtrack).
    PushClause {
        /// The clause atoms.
        atoms: Vec<Atom>,
        /// Lemma provenance.
        lemma: TheoryLemma,
    },
    /// Assert `term = value` with an evaluation reason.
    PropagateEval {
        /// The Boolean term being assigned.
        term: TermId,
        /// Its value.
        value: bool,
        /// The assigned terms whose values force the evaluation.
        subs: Vec<TermId>,
    },
    /// Assert `term = value` justified by the tautology
    /// `others \/ (term = value)`; every atom in `others` is false now.
    PropagateLemma {
        /// The Boolean term being assigned.
        term: TermId,
        /// Its value.
        value: bool,
        /// The other atoms of the lemma clause, all currently false.
        others: Vec<Atom>,
        /// Lemma provenance.
        lemma: TheoryLemma,
    },
    /// Raise a conflict; every atom is false under the current assignment.
    Conflict {
        /// The conflict clause atoms.
        atoms: Vec<Atom>,
        /// Lemma provenance.
        lemma: TheoryLemma,
    },
}

/// The action buffer handed to every plugin callback.
pub struct Actions<'a> {
    /// The term store, for reading assignments and interning new terms.
    pub store: &'a mut TermStore,
    plugin: PluginId,
    level: u32,
    queue: Vec<Action>,
    hooks: Vec<(PluginId, BacktrackHook)>,
    conflict: bool,
}

impl<'a> Actions<'a> {
    /// Open a buffer for a callback into `plugin` at decision `level`.
    pub fn new(store: &'a mut TermStore, plugin: PluginId, level: u32) -> Self {
        Actions {
            store,
            plugin,
            level,
            queue: Vec::new(),
            hooks: Vec::new(),
            conflict: false,
        }
    }

    /// The current decision level.
    #[inline]
    pub fn current_level(&self) -> u32 {
        self.level
    }

    /// Whether a conflict has been raised through this buffer.
    #[inline]
    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    /// Add a permanent clause justified as a theory tautology.
    pub fn push_clause(&mut self, atoms: Vec<Atom>, rule: &'static str) {
        let lemma = TheoryLemma {
            plugin: self.plugin,
            rule,
        };
        self.queue.push(Action::PushClause { atoms, lemma });
    }

    /// Assert `term = value` with reason `Eval(subs)`.
    pub fn propagate_bool_eval(&mut self, term: TermId, value: bool, subs: Vec<TermId>) {
        self.queue.push(Action::PropagateEval { term, value, subs });
    }

    /// Assert `term = value` justified by a theory tautology
    /// `others \/ (term = value)` whose clause is built lazily.
    pub fn propagate_bool_lemma(
        &mut self,
        term: TermId,
        value: bool,
        others: Vec<Atom>,
        rule: &'static str,
    ) {
        let lemma = TheoryLemma {
            plugin: self.plugin,
            rule,
        };
        self.queue.push(Action::PropagateLemma {
            term,
            value,
            others,
            lemma,
        });
    }

    /// Raise a conflict. All `atoms` must be false now.
    pub fn raise_conflict(&mut self, atoms: Vec<Atom>, rule: &'static str) {
        let lemma = TheoryLemma {
            plugin: self.plugin,
            rule,
        };
        self.conflict = true;
        self.queue.push(Action::Conflict { atoms, lemma });
    }

    /// Schedule `hook` to run when the engine next backtracks past the
    /// current level. Hooks for one level fire in LIFO order and receive
    /// the registering plugin for downcasting.
    pub fn on_backtrack(&mut self, hook: BacktrackHook) {
        self.hooks.push((self.plugin, hook));
    }

    /// Register `watcher` to be woken when `watched` becomes assigned.
    pub fn watch(&mut self, watcher: TermId, watched: TermId) {
        self.store.add_watcher(watched, watcher);
    }

    /// Close the buffer, yielding the queued requests and hooks.
    pub fn finish(self) -> (Vec<Action>, Vec<(PluginId, BacktrackHook)>) {
        (self.queue, self.hooks)
    }
}

/// A theory plugin.
///
/// One plugin instance is registered per theory; it owns its term views
/// and all decide state for its semantic variables. The engine calls into
/// the plugin only through this trait.
pub trait Plugin {
    /// The id allocated at registration.
    fn id(&self) -> PluginId;

    /// Human-readable name (also recorded in the term store).
    fn name(&self) -> &'static str;

    /// Upcast for backtrack-hook dispatch.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called once when a term of this plugin is registered with the
    /// engine; the place to set up generalised watches.
    fn init(&mut self, acts: &mut Actions<'_>, t: TermId);

    /// `t` watches `watch`, which has just been assigned. The sole
    /// mechanism by which a theory is awakened.
    fn update_watches(&mut self, acts: &mut Actions<'_>, t: TermId, watch: TermId) -> WatchRes {
        let _ = (acts, t, watch);
        WatchRes::Keep
    }

    /// Yield the direct sub-terms of `t` to `f`.
    fn subterms(&self, store: &TermStore, t: TermId, f: &mut dyn FnMut(TermId)) {
        let _ = (store, t, f);
    }

    /// Evaluate `t` under the current partial assignment.
    fn eval(&self, store: &TermStore, t: TermId) -> EvalRes {
        let _ = (store, t);
        EvalRes::Unknown
    }

    /// Produce the lemma clause explaining an `Eval` assignment of `t`:
    /// the returned atoms, together with `t`'s atom, form a theory
    /// tautology, and every returned atom is a currently-false assigned
    /// atom at a level no higher than `t`'s.
    ///
    /// Only called for terms this plugin propagated by evaluation with
    /// Boolean support; plugins that never do so keep the default.
    fn explain(&mut self, store: &TermStore, t: TermId) -> Vec<Atom> {
        let _ = store;
        panic!("plugin cannot explain evaluation of {t}")
    }

    /// Choose a value for an unassigned semantic term of this plugin.
    fn decide(&mut self, acts: &mut Actions<'_>, t: TermId) -> Value {
        let _ = acts;
        panic!("plugin has no semantic decisions ({t})")
    }

    /// The term was swept by garbage collection; drop plugin state for it.
    fn on_delete(&mut self, t: TermId) {
        let _ = t;
    }

    /// Print the term for diagnostics.
    fn print(&self, store: &TermStore, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Type;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct V(&'static str);

    #[test]
    fn test_actions_buffer_order() {
        let mut store = TermStore::new();
        let pid = store.register_plugin("t");
        let t = store.intern(pid, V("x"), Type::Bool);
        store.ensure_bvar(t);
        let a = store.atom_of(t, true);

        let mut acts = Actions::new(&mut store, pid, 3);
        assert_eq!(acts.current_level(), 3);
        acts.propagate_bool_eval(t, true, vec![]);
        acts.push_clause(vec![a], "unit");
        assert!(!acts.has_conflict());
        acts.raise_conflict(vec![a.negated()], "contra");
        assert!(acts.has_conflict());

        let (queue, hooks) = acts.finish();
        assert!(hooks.is_empty());
        assert!(matches!(queue[0], Action::PropagateEval { .. }));
        assert!(matches!(queue[1], Action::PushClause { .. }));
        assert!(matches!(queue[2], Action::Conflict { .. }));
    }

    #[test]
    fn test_watch_registers_on_store() {
        let mut store = TermStore::new();
        let pid = store.register_plugin("t");
        let t = store.intern(pid, V("x"), Type::Bool);
        let u = store.intern(pid, V("y"), Type::Bool);

        let mut acts = Actions::new(&mut store, pid, 0);
        acts.watch(t, u);
        let _ = acts.finish();
        assert_eq!(store.term(u).watchers, vec![t]);
    }
}
