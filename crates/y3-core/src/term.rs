//! Terms and the term store
//!
//! A term is the universal unit of reasoning: Boolean atoms, theory
//! expressions and semantic variables are all terms. Terms are owned by
//! the plugin that constructed them; the owning plugin id is packed into
//! the high bits of the term id and the per-plugin arena index into the
//! low bits. Terms are hash-consed per plugin (constructing the same view
//! twice yields the same id) and are never moved once created; deletion is
//! deferred to garbage collection.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hashbrown::HashMap;

use crate::atom::{Atom, BVar};
use crate::clause::{ClauseRef, TheoryLemma};
use crate::value::Value;

/// Identifier of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(pub u8);

impl PluginId {
    /// Maximum number of plugins an engine can register.
    pub const LIMIT: usize = 64;

    /// Index for per-plugin arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable term identifier.
///
/// The high 6 bits carry the owning plugin id, the low 26 bits the index
/// into that plugin's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub u32);

impl TermId {
    const INDEX_BITS: u32 = 26;
    const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;

    /// Largest per-plugin arena index representable.
    pub const MAX_INDEX: u32 = Self::INDEX_MASK;

    /// Pack a plugin id and arena index.
    #[inline]
    pub fn new(plugin: PluginId, index: u32) -> Self {
        debug_assert!(index <= Self::MAX_INDEX, "term arena overflow");
        TermId(((plugin.0 as u32) << Self::INDEX_BITS) | index)
    }

    /// The plugin that owns this term.
    #[inline]
    pub fn plugin(self) -> PluginId {
        PluginId((self.0 >> Self::INDEX_BITS) as u8)
    }

    /// Index into the owning plugin's arena.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 & Self::INDEX_MASK) as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}#{}", self.plugin().0, self.index())
    }
}

/// Identifier of a plugin-defined sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// The plugin owning the sort's operation table.
    pub plugin: PluginId,
    /// Plugin-local sort index.
    pub sort: u32,
}

/// The type of a term: Boolean, or a plugin-defined sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// The Boolean type, known to the core.
    Bool,
    /// A sort whose operations dispatch through the owning plugin.
    Sort(SortKey),
}

impl Type {
    /// Whether this is the Boolean type.
    #[inline]
    pub fn is_bool(self) -> bool {
        matches!(self, Type::Bool)
    }
}

/// Per-term flag bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermFlags(u8);

impl TermFlags {
    /// Term has been registered with the engine (atoms allocated, heap entry).
    pub const ADDED: TermFlags = TermFlags(1 << 0);
    /// Term was swept by garbage collection; must not be referenced.
    pub const DELETED: TermFlags = TermFlags(1 << 1);
    /// Positive-polarity mark used by conflict analysis.
    pub const MARK_POS: TermFlags = TermFlags(1 << 2);
    /// Negative-polarity mark used by conflict analysis.
    pub const MARK_NEG: TermFlags = TermFlags(1 << 3);
    /// Generic visitation mark.
    pub const SEEN: TermFlags = TermFlags(1 << 4);
    /// Reachability mark used during garbage collection.
    pub const GC_MARKED: TermFlags = TermFlags(1 << 5);
    /// The term is the negation of another term.
    pub const NEGATED: TermFlags = TermFlags(1 << 6);

    /// Whether all bits of `flag` are set.
    #[inline]
    pub fn contains(self, flag: TermFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Set all bits of `flag`.
    #[inline]
    pub fn insert(&mut self, flag: TermFlags) {
        self.0 |= flag.0;
    }

    /// Clear all bits of `flag`.
    #[inline]
    pub fn remove(&mut self, flag: TermFlags) {
        self.0 &= !flag.0;
    }
}

/// The decision slot of a term.
#[derive(Debug, Default)]
pub enum VarSlot {
    /// Not yet registered for decision.
    #[default]
    None,
    /// Boolean term bound to its atom pair through a dense variable index.
    Bool(BVar),
    /// Semantic term decided by its owning plugin; decide state lives in
    /// the plugin, keyed by term id.
    Semantic,
}

/// A theory lemma clause whose construction is deferred.
///
/// Stored in place of a reason clause by `propagate_bool_lemma`; the
/// engine forces it at most once, memoising the built clause in place.
#[derive(Debug)]
pub struct PendingLemma {
    /// The other atoms of the lemma clause, all false at propagation time.
    pub others: Vec<Atom>,
    /// Provenance recorded on the built clause.
    pub lemma: TheoryLemma,
}

/// Why a term holds its current value.
#[derive(Debug)]
pub enum Reason {
    /// Chosen by the decision heuristic.
    Decision,
    /// Unit-propagated from a clause.
    Bcp(ClauseRef),
    /// Unit-propagated from a lemma whose clause has not been built yet.
    BcpLazy(PendingLemma),
    /// Evaluated by a plugin from the values of the listed sub-terms.
    Eval(Vec<TermId>),
}

/// A trail assignment: value, decision level, and justification.
#[derive(Debug)]
pub struct Assignment {
    /// The assigned value.
    pub value: Value,
    /// Decision level at which the assignment was made.
    pub level: u32,
    /// Why the assignment holds.
    pub reason: Reason,
}

/// Heap-index marker for terms not currently on the decision heap.
pub const NO_HEAP_IDX: u32 = u32::MAX;

/// A stored term.
///
/// The view payload is opaque to the core; only the owning plugin
/// constructs and inspects it (see [`TermStore::view`]).
pub struct Term {
    view: Rc<dyn View>,
    /// The term's type.
    pub ty: Type,
    /// Decision-heap activity weight.
    pub weight: f64,
    /// Position in the decision heap, or [`NO_HEAP_IDX`].
    pub heap_idx: u32,
    /// Flag bitfield.
    pub flags: TermFlags,
    /// Decision slot.
    pub var: VarSlot,
    /// Current assignment, if any.
    pub assign: Option<Assignment>,
    /// Terms whose plugin asked to be notified when this term is assigned.
    /// Grown lazily; traversed with swap-remove by the watch engine.
    pub watchers: Vec<TermId>,
    /// Value saved from the last assignment, used for phase saving.
    pub phase: Option<Value>,
}

impl Term {
    fn new(view: Rc<dyn View>, ty: Type) -> Self {
        Term {
            view,
            ty,
            weight: 0.0,
            heap_idx: NO_HEAP_IDX,
            flags: TermFlags::default(),
            var: VarSlot::None,
            assign: None,
            watchers: Vec::new(),
            phase: None,
        }
    }

    /// The term's current value, if assigned.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.assign.as_ref().map(|a| &a.value)
    }

    /// The term's assignment level, if assigned.
    #[inline]
    pub fn level(&self) -> Option<u32> {
        self.assign.as_ref().map(|a| a.level)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("view", &self.view)
            .field("ty", &self.ty)
            .field("assign", &self.assign)
            .finish_non_exhaustive()
    }
}

/// Object-safe face of a plugin view payload.
///
/// Implemented for free on any `Eq + Hash + Debug` type, so plugins just
/// define ordinary view enums. Equality and hashing are type-aware, which
/// is what lets one cons table hold several view types.
pub trait View: Any + fmt::Debug {
    /// Upcast for downcasting by the owning plugin.
    fn as_any(&self) -> &dyn Any;
    /// Type-aware structural equality.
    fn eq_dyn(&self, other: &dyn View) -> bool;
    /// Type-aware structural hash.
    fn hash_dyn(&self, state: &mut dyn Hasher);
}

impl<T: Any + fmt::Debug + Eq + Hash> View for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn View) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        self.type_id().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Hash-cons key wrapping a shared view payload.
struct ConsKey(Rc<dyn View>);

impl PartialEq for ConsKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl Eq for ConsKey {}

impl Hash for ConsKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_dyn(state);
    }
}

/// The term arena: one term vector and one cons table per plugin.
#[derive(Default)]
pub struct TermStore {
    plugin_names: Vec<&'static str>,
    arenas: Vec<Vec<Term>>,
    cons: Vec<HashMap<ConsKey, TermId>>,
    /// Dense Boolean variable index -> owning term.
    bvar_terms: Vec<TermId>,
}

impl TermStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin slot and return its id.
    ///
    /// Panics if the plugin limit is exceeded.
    pub fn register_plugin(&mut self, name: &'static str) -> PluginId {
        assert!(
            self.plugin_names.len() < PluginId::LIMIT,
            "plugin limit exceeded"
        );
        let id = PluginId(self.plugin_names.len() as u8);
        self.plugin_names.push(name);
        self.arenas.push(Vec::new());
        self.cons.push(HashMap::new());
        id
    }

    /// Name of a registered plugin.
    #[inline]
    pub fn plugin_name(&self, plugin: PluginId) -> &'static str {
        self.plugin_names[plugin.index()]
    }

    /// Number of registered plugins.
    #[inline]
    pub fn num_plugins(&self) -> usize {
        self.plugin_names.len()
    }

    /// Intern a term: return the existing id for an equal view, or store a
    /// new term. Hash-consing is per plugin. Interning a view whose term
    /// was swept by garbage collection revives it for re-registration.
    pub fn intern<V>(&mut self, plugin: PluginId, view: V, ty: Type) -> TermId
    where
        V: Any + fmt::Debug + Eq + Hash,
    {
        let key = ConsKey(Rc::new(view));
        if let Some(&id) = self.cons[plugin.index()].get(&key) {
            let term = self.term_mut(id);
            if term.flags.contains(TermFlags::DELETED) {
                term.flags.remove(TermFlags::DELETED);
                term.flags.remove(TermFlags::ADDED);
                term.flags.remove(TermFlags::GC_MARKED);
            }
            return id;
        }
        let arena = &mut self.arenas[plugin.index()];
        let id = TermId::new(plugin, arena.len() as u32);
        arena.push(Term::new(key.0.clone(), ty));
        self.cons[plugin.index()].insert(key, id);
        id
    }

    /// Look up the term interned for `view`, without inserting.
    pub fn find<V>(&self, plugin: PluginId, view: V) -> Option<TermId>
    where
        V: Any + fmt::Debug + Eq + Hash,
    {
        let key = ConsKey(Rc::new(view));
        self.cons[plugin.index()].get(&key).copied()
    }

    /// Immutable access to a term.
    #[inline]
    pub fn term(&self, id: TermId) -> &Term {
        &self.arenas[id.plugin().index()][id.index()]
    }

    /// Mutable access to a term.
    #[inline]
    pub fn term_mut(&mut self, id: TermId) -> &mut Term {
        &mut self.arenas[id.plugin().index()][id.index()]
    }

    /// Downcast a term's view to the owning plugin's concrete type.
    ///
    /// Panics on a type mismatch; only the owning plugin should call this.
    #[inline]
    pub fn view<V: Any>(&self, id: TermId) -> &V {
        self.term(id)
            .view
            .as_any()
            .downcast_ref::<V>()
            .expect("term view downcast to foreign type")
    }

    /// The term's type.
    #[inline]
    pub fn ty(&self, id: TermId) -> Type {
        self.term(id).ty
    }

    /// Total number of terms across all plugins.
    pub fn num_terms(&self) -> usize {
        self.arenas.iter().map(Vec::len).sum()
    }

    /// Iterate the term ids of one plugin's arena.
    pub fn plugin_terms(&self, plugin: PluginId) -> impl Iterator<Item = TermId> + '_ {
        let len = self.arenas[plugin.index()].len() as u32;
        (0..len).map(move |i| TermId::new(plugin, i))
    }

    /// Iterate all term ids.
    pub fn all_terms(&self) -> impl Iterator<Item = TermId> + '_ {
        (0..self.arenas.len() as u8)
            .flat_map(move |p| self.plugin_terms(PluginId(p)))
    }

    // --- Boolean variable binding -------------------------------------

    /// Bind a Boolean term to a dense variable index, allocating the atom
    /// pair. Idempotent. Panics if the term is not Boolean.
    pub fn ensure_bvar(&mut self, id: TermId) -> BVar {
        assert!(self.ty(id).is_bool(), "atom pair over non-Boolean term");
        match self.term(id).var {
            VarSlot::Bool(v) => v,
            VarSlot::Semantic => panic!("Boolean term registered as semantic"),
            VarSlot::None => {
                let v = BVar(self.bvar_terms.len() as u32);
                self.bvar_terms.push(id);
                self.term_mut(id).var = VarSlot::Bool(v);
                v
            }
        }
    }

    /// Mark a non-Boolean term as a semantic decision variable. Idempotent.
    pub fn mark_semantic(&mut self, id: TermId) {
        match self.term(id).var {
            VarSlot::Semantic => {}
            VarSlot::Bool(_) => panic!("semantic registration of a Boolean term"),
            VarSlot::None => self.term_mut(id).var = VarSlot::Semantic,
        }
    }

    /// The dense variable of a registered Boolean term, if any.
    #[inline]
    pub fn bvar(&self, id: TermId) -> Option<BVar> {
        match self.term(id).var {
            VarSlot::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The term owning a dense Boolean variable.
    #[inline]
    pub fn bvar_term(&self, var: BVar) -> TermId {
        self.bvar_terms[var.index()]
    }

    /// The term under an atom.
    #[inline]
    pub fn atom_term(&self, atom: Atom) -> TermId {
        self.bvar_term(atom.var())
    }

    /// The atom of a registered Boolean term with the given polarity.
    ///
    /// Panics if the term has no atom pair yet.
    #[inline]
    pub fn atom_of(&self, id: TermId, polarity: bool) -> Atom {
        match self.term(id).var {
            VarSlot::Bool(v) => Atom::with_polarity(v, polarity),
            _ => panic!("atom requested for unregistered term"),
        }
    }

    /// Number of allocated Boolean variables.
    #[inline]
    pub fn num_bvars(&self) -> usize {
        self.bvar_terms.len()
    }

    // --- Assignment queries -------------------------------------------

    /// The Boolean value of a term, if it is assigned a Boolean.
    #[inline]
    pub fn bool_value(&self, id: TermId) -> Option<bool> {
        self.term(id).value().and_then(Value::as_bool)
    }

    /// The truth value of an atom under the current assignment.
    #[inline]
    pub fn atom_value(&self, atom: Atom) -> Option<bool> {
        self.bool_value(self.atom_term(atom))
            .map(|b| b == atom.is_positive())
    }

    /// The assignment level of a term.
    #[inline]
    pub fn level(&self, id: TermId) -> Option<u32> {
        self.term(id).level()
    }

    /// The assignment reason of a term.
    #[inline]
    pub fn reason(&self, id: TermId) -> Option<&Reason> {
        self.term(id).assign.as_ref().map(|a| &a.reason)
    }

    // --- Flags ---------------------------------------------------------

    /// Whether the term has the flag set.
    #[inline]
    pub fn has_flag(&self, id: TermId, flag: TermFlags) -> bool {
        self.term(id).flags.contains(flag)
    }

    /// Set a flag on the term.
    #[inline]
    pub fn set_flag(&mut self, id: TermId, flag: TermFlags) {
        self.term_mut(id).flags.insert(flag);
    }

    /// Clear a flag on the term.
    #[inline]
    pub fn clear_flag(&mut self, id: TermId, flag: TermFlags) {
        self.term_mut(id).flags.remove(flag);
    }

    // --- Watchers ------------------------------------------------------

    /// Register `watcher` to be notified when `watched` becomes assigned.
    /// Duplicate registrations are dropped; hash-consing makes the check
    /// meaningful.
    pub fn add_watcher(&mut self, watched: TermId, watcher: TermId) {
        let list = &mut self.term_mut(watched).watchers;
        if !list.contains(&watcher) {
            list.push(watcher);
        }
    }

    /// Detach the watcher list of `watched` for traversal.
    /// Pair with [`TermStore::set_watchers`].
    #[inline]
    pub fn take_watchers(&mut self, watched: TermId) -> Vec<TermId> {
        std::mem::take(&mut self.term_mut(watched).watchers)
    }

    /// Restore a watcher list detached by [`TermStore::take_watchers`].
    #[inline]
    pub fn set_watchers(&mut self, watched: TermId, watchers: Vec<TermId>) {
        self.term_mut(watched).watchers = watchers;
    }
}
