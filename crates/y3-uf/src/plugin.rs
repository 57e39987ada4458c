//! The uninterpreted functions and sorts plugin
//!
//! Terms of an uninterpreted sort take abstract elements as values. Every
//! decision picks either a value forced by the asserted equality atoms or
//! a fresh element of the sort, so two terms share a value exactly when a
//! chain of asserted equalities connects them. Each forced value records
//! its provenance (the chain origin and the equality atoms used), which
//! is what conflict clauses and explanations are built from.
//!
//! Congruence is enforced reactively: when two applications of the same
//! symbol hold different values over pairwise-equal arguments, the plugin
//! pushes the congruence lemma, which is falsified on arrival and drives
//! conflict analysis.

use std::any::Any;
use std::fmt;

use hashbrown::HashMap;

use y3_core::atom::Atom;
use y3_core::plugin::{Actions, EvalRes, Plugin, WatchRes};
use y3_core::term::{PluginId, SortKey, TermFlags, TermId, TermStore, Type};
use y3_core::value::Value;
use y3_mcsat::Solver;

/// Views owned by the UF plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UfView {
    /// An uninterpreted constant of a sort.
    Const {
        /// The constant's name.
        name: String,
        /// Plugin-local sort index.
        sort: u32,
    },
    /// An application `sym(args)` of an uninterpreted function.
    App {
        /// The function symbol.
        sym: String,
        /// Argument terms.
        args: Vec<TermId>,
        /// Plugin-local result sort index.
        sort: u32,
    },
    /// The Boolean equality atom between two sort terms, sides in
    /// canonical id order.
    Eq(TermId, TermId),
}

/// The UF plugin.
#[derive(Debug)]
pub struct Uf {
    id: PluginId,
    /// Registered sort names; the index is the sort key.
    sorts: Vec<String>,
    /// Registered application terms, scanned for congruence.
    apps: Vec<TermId>,
    /// Equality atoms mentioning each sort term.
    occs: HashMap<TermId, Vec<TermId>>,
    /// Fresh-element counters per sort; every free decision takes a new
    /// element, so equal values always share a chain origin.
    next_elt: HashMap<u32, u32>,
    /// For each assigned term: the chain origin its value came from and
    /// the (currently false) equality atoms that forced it.
    provenance: HashMap<TermId, (TermId, Vec<Atom>)>,
}

impl Uf {
    /// Register the plugin with a solver.
    pub fn install(solver: &mut Solver) -> UfTheory {
        let pid = solver.add_plugin(|id| Uf {
            id,
            sorts: Vec::new(),
            apps: Vec::new(),
            occs: HashMap::new(),
            next_elt: HashMap::new(),
            provenance: HashMap::new(),
        });
        UfTheory { pid }
    }

    fn canon(a: TermId, b: TermId) -> (TermId, TermId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn eq_term(&self, store: &mut TermStore, a: TermId, b: TermId) -> TermId {
        let (lo, hi) = Self::canon(a, b);
        store.intern(self.id, UfView::Eq(lo, hi), Type::Bool)
    }

    fn record_occurrence(&mut self, side: TermId, eq: TermId) {
        let list = self.occs.entry(side).or_default();
        if !list.contains(&eq) {
            list.push(eq);
        }
    }

    fn sort_of(&self, store: &TermStore, t: TermId) -> u32 {
        match store.view::<UfView>(t) {
            UfView::Const { sort, .. } | UfView::App { sort, .. } => *sort,
            UfView::Eq(..) => panic!("equality atoms have no element sort"),
        }
    }

    fn try_eval(&mut self, acts: &mut Actions<'_>, t: TermId) {
        if let EvalRes::Into { value, used } = self.eval(acts.store, t) {
            if let Value::Bool(b) = value {
                acts.propagate_bool_eval(t, b, used);
            }
        }
    }

    /// Raise a conflict over two incompatible equality chains, including
    /// the origin equality when the chains start at different terms.
    fn chain_conflict(
        &mut self,
        acts: &mut Actions<'_>,
        chain1: &[Atom],
        chain2: &[Atom],
        o1: TermId,
        o2: TermId,
        rule: &'static str,
    ) {
        let mut atoms: Vec<Atom> = Vec::new();
        for &a in chain1.iter().chain(chain2.iter()) {
            if !atoms.contains(&a) {
                atoms.push(a);
            }
        }
        if o1 != o2 {
            let eq = self.eq_term(acts.store, o1, o2);
            acts.store.ensure_bvar(eq);
            atoms.push(acts.store.atom_of(eq, true));
        }
        acts.raise_conflict(atoms, rule);
    }

    /// Push the congruence lemma if `t` disagrees with a congruent
    /// application.
    fn check_congruence(&mut self, acts: &mut Actions<'_>, t: TermId) {
        let (sym, args) = match acts.store.view::<UfView>(t) {
            UfView::App { sym, args, .. } => (sym.clone(), args.clone()),
            _ => return,
        };
        let Some(vt) = acts.store.term(t).value().cloned() else { return };
        if args
            .iter()
            .any(|&a| acts.store.term(a).value().is_none())
        {
            return;
        }
        for other in self.apps.clone() {
            if other == t || acts.store.has_flag(other, TermFlags::DELETED) {
                continue;
            }
            let (osym, oargs) = match acts.store.view::<UfView>(other) {
                UfView::App { sym, args, .. } => (sym.clone(), args.clone()),
                _ => continue,
            };
            if osym != sym || oargs.len() != args.len() {
                continue;
            }
            let Some(vo) = acts.store.term(other).value().cloned() else { continue };
            if vo == vt {
                continue;
            }
            let congruent = args.iter().zip(&oargs).all(|(&a, &b)| {
                a == b
                    || matches!(
                        (acts.store.term(a).value(), acts.store.term(b).value()),
                        (Some(x), Some(y)) if x == y
                    )
            });
            if !congruent {
                continue;
            }
            // sym(args) = sym(oargs) whenever the arguments agree.
            let mut atoms = Vec::new();
            for (&a, &b) in args.iter().zip(&oargs) {
                if a == b {
                    continue;
                }
                let eq = self.eq_term(acts.store, a, b);
                acts.store.ensure_bvar(eq);
                atoms.push(acts.store.atom_of(eq, false));
            }
            let result_eq = self.eq_term(acts.store, t, other);
            acts.store.ensure_bvar(result_eq);
            atoms.push(acts.store.atom_of(result_eq, true));
            acts.push_clause(atoms, "congruence");
            return;
        }
    }
}

impl Plugin for Uf {
    fn id(&self) -> PluginId {
        self.id
    }

    fn name(&self) -> &'static str {
        "uf"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn init(&mut self, acts: &mut Actions<'_>, t: TermId) {
        let view = acts.store.view::<UfView>(t).clone();
        match view {
            UfView::Const { .. } => {}
            UfView::App { args, .. } => {
                if !self.apps.contains(&t) {
                    self.apps.push(t);
                }
                acts.watch(t, t);
                for a in args {
                    acts.watch(t, a);
                }
            }
            UfView::Eq(a, b) => {
                self.record_occurrence(a, t);
                self.record_occurrence(b, t);
                acts.watch(t, a);
                acts.watch(t, b);
                self.try_eval(acts, t);
            }
        }
    }

    fn update_watches(&mut self, acts: &mut Actions<'_>, t: TermId, _watch: TermId) -> WatchRes {
        match acts.store.view::<UfView>(t) {
            UfView::Eq(..) => self.try_eval(acts, t),
            UfView::App { .. } => self.check_congruence(acts, t),
            UfView::Const { .. } => {}
        }
        WatchRes::Keep
    }

    fn subterms(&self, store: &TermStore, t: TermId, f: &mut dyn FnMut(TermId)) {
        match store.view::<UfView>(t) {
            UfView::Const { .. } => {}
            UfView::App { args, .. } => {
                for &a in args {
                    f(a);
                }
            }
            UfView::Eq(a, b) => {
                f(*a);
                f(*b);
            }
        }
    }

    fn eval(&self, store: &TermStore, t: TermId) -> EvalRes {
        match store.view::<UfView>(t) {
            UfView::Eq(a, b) => {
                match (store.term(*a).value(), store.term(*b).value()) {
                    (Some(va), Some(vb)) => EvalRes::Into {
                        value: Value::Bool(va == vb),
                        used: vec![*a, *b],
                    },
                    _ => EvalRes::Unknown,
                }
            }
            _ => EvalRes::Unknown,
        }
    }

    fn explain(&mut self, store: &TermStore, t: TermId) -> Vec<Atom> {
        let UfView::Eq(a, b) = *store.view::<UfView>(t) else {
            unreachable!("only equality atoms evaluate")
        };
        let (oa, ca) = self
            .provenance
            .get(&a)
            .cloned()
            .unwrap_or((a, Vec::new()));
        let (ob, cb) = self
            .provenance
            .get(&b)
            .cloned()
            .unwrap_or((b, Vec::new()));
        let mut atoms = ca;
        for x in cb {
            if !atoms.contains(&x) {
                atoms.push(x);
            }
        }
        if oa != ob {
            let (lo, hi) = Self::canon(oa, ob);
            let eq = store
                .find(self.id, UfView::Eq(lo, hi))
                .expect("origin equality interned before explanation");
            atoms.push(store.atom_of(eq, true));
        }
        atoms
    }

    fn decide(&mut self, acts: &mut Actions<'_>, x: TermId) -> Value {
        let occ_list = self.occs.get(&x).cloned().unwrap_or_default();
        let mut forced: Option<(Value, TermId, Vec<Atom>)> = None;
        let mut excluded: Vec<(Value, TermId, Vec<Atom>)> = Vec::new();

        for eq in occ_list {
            if acts.store.has_flag(eq, TermFlags::DELETED) {
                continue;
            }
            let Some(truth) = acts.store.bool_value(eq) else { continue };
            let UfView::Eq(a, b) = *acts.store.view::<UfView>(eq) else {
                continue;
            };
            let other = if a == x { b } else { a };
            let Some(ov) = acts.store.term(other).value().cloned() else { continue };
            let src = acts.store.atom_of(eq, !truth);
            let (origin, mut chain) = self
                .provenance
                .get(&other)
                .cloned()
                .unwrap_or((other, Vec::new()));
            chain.push(src);
            if truth {
                match &forced {
                    Some((v, o, prev)) if *v != ov => {
                        let (o, prev) = (*o, prev.clone());
                        self.chain_conflict(acts, &prev, &chain, o, origin, "eq-forced");
                        return Value::Elt {
                            sort: SortKey { plugin: self.id, sort: 0 },
                            k: 0,
                        };
                    }
                    Some(_) => {}
                    None => forced = Some((ov, origin, chain)),
                }
            } else {
                excluded.push((ov, origin, chain));
            }
        }

        if let Some((v, o, chain)) = forced {
            if let Some((_, eo, ex_chain)) = excluded.iter().find(|(ev, _, _)| *ev == v) {
                let (eo, ex_chain) = (*eo, ex_chain.clone());
                self.chain_conflict(acts, &chain, &ex_chain, o, eo, "eq-chain");
                return Value::Elt {
                    sort: SortKey { plugin: self.id, sort: 0 },
                    k: 0,
                };
            }
            self.provenance.insert(x, (o, chain));
            return v;
        }

        // Free decision: a fresh element of the sort.
        let sort = self.sort_of(acts.store, x);
        let counter = self.next_elt.entry(sort).or_insert(0);
        let k = *counter;
        *counter += 1;
        self.provenance.insert(x, (x, Vec::new()));
        Value::Elt {
            sort: SortKey { plugin: self.id, sort },
            k,
        }
    }

    fn on_delete(&mut self, t: TermId) {
        self.occs.remove(&t);
        self.provenance.remove(&t);
        self.apps.retain(|&a| a != t);
    }

    fn print(&self, store: &TermStore, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match store.view::<UfView>(t) {
            UfView::Const { name, .. } => write!(f, "{name}"),
            UfView::App { sym, args, .. } => {
                write!(f, "{sym}(")?;
                for (i, &a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.print(store, a, f)?;
                }
                write!(f, ")")
            }
            UfView::Eq(a, b) => {
                self.print(store, *a, f)?;
                write!(f, " = ")?;
                self.print(store, *b, f)
            }
        }
    }
}

/// Handle for constructing UF terms on a solver.
#[derive(Debug, Clone, Copy)]
pub struct UfTheory {
    pid: PluginId,
}

impl UfTheory {
    /// The plugin id.
    pub fn id(&self) -> PluginId {
        self.pid
    }

    /// Register (or look up) an uninterpreted sort by name.
    pub fn sort(&self, solver: &mut Solver, name: &str) -> SortKey {
        let pid = self.pid;
        solver.with_plugin::<Uf, _>(pid, |uf, _| {
            let idx = match uf.sorts.iter().position(|s| s == name) {
                Some(i) => i as u32,
                None => {
                    uf.sorts.push(name.to_string());
                    (uf.sorts.len() - 1) as u32
                }
            };
            SortKey { plugin: pid, sort: idx }
        })
    }

    /// An uninterpreted constant of `sort`.
    pub fn constant(&self, solver: &mut Solver, name: &str, sort: SortKey) -> TermId {
        assert_eq!(sort.plugin, self.pid, "sort belongs to another plugin");
        solver.store_mut().intern(
            self.pid,
            UfView::Const {
                name: name.to_string(),
                sort: sort.sort,
            },
            Type::Sort(sort),
        )
    }

    /// The application `sym(args)` with result sort `sort`.
    pub fn app(&self, solver: &mut Solver, sym: &str, args: Vec<TermId>, sort: SortKey) -> TermId {
        assert_eq!(sort.plugin, self.pid, "sort belongs to another plugin");
        solver.store_mut().intern(
            self.pid,
            UfView::App {
                sym: sym.to_string(),
                args,
                sort: sort.sort,
            },
            Type::Sort(sort),
        )
    }

    /// The equality atom between two sort terms.
    pub fn eq(&self, solver: &mut Solver, a: TermId, b: TermId) -> TermId {
        let (lo, hi) = Uf::canon(a, b);
        solver
            .store_mut()
            .intern(self.pid, UfView::Eq(lo, hi), Type::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use y3_mcsat::{Budget, Outcome, UnsatCause};

    fn setup() -> (Solver, UfTheory, SortKey) {
        let mut solver = Solver::default();
        let uf = Uf::install(&mut solver);
        let sort = uf.sort(&mut solver, "U");
        (solver, uf, sort)
    }

    #[test]
    fn test_free_constants_get_distinct_elements() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let b = uf.constant(&mut solver, "b", u);
        solver.add_term(a);
        solver.add_term(b);
        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => {
                assert_ne!(model.value(a), model.value(b));
            }
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn test_asserted_equality_forces_shared_value() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let b = uf.constant(&mut solver, "b", u);
        let eq = uf.eq(&mut solver, a, b);
        let at = solver.atom(eq, true);
        solver.add_clause(vec![at], None);
        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => assert_eq!(model.value(a), model.value(b)),
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn test_transitivity_chain_is_unsat() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let b = uf.constant(&mut solver, "b", u);
        let c = uf.constant(&mut solver, "c", u);
        let ab = uf.eq(&mut solver, a, b);
        let bc = uf.eq(&mut solver, b, c);
        let ac = uf.eq(&mut solver, a, c);
        let atoms = [
            solver.atom(ab, true),
            solver.atom(bc, true),
            solver.atom(ac, false),
        ];
        for at in atoms {
            solver.add_clause(vec![at], None);
        }
        match solver.solve(Budget::UNLIMITED) {
            Outcome::Unsat(UnsatCause::Root(_)) => {}
            other => panic!("expected root Unsat, got {other:?}"),
        }
        let proof = solver.resolution_proof().unwrap();
        proof.check_empty(solver.store(), solver.clause_db()).unwrap();
    }

    #[test]
    fn test_congruence_violation_is_unsat() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let b = uf.constant(&mut solver, "b", u);
        let fa = uf.app(&mut solver, "f", vec![a], u);
        let fb = uf.app(&mut solver, "f", vec![b], u);
        let ab = uf.eq(&mut solver, a, b);
        let fafb = uf.eq(&mut solver, fa, fb);
        let atoms = [solver.atom(ab, true), solver.atom(fafb, false)];
        for at in atoms {
            solver.add_clause(vec![at], None);
        }
        match solver.solve(Budget::UNLIMITED) {
            Outcome::Unsat(UnsatCause::Root(_)) => {}
            other => panic!("expected root Unsat, got {other:?}"),
        }
    }

    #[test]
    fn test_unconstrained_applications_are_sat() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let b = uf.constant(&mut solver, "b", u);
        let fa = uf.app(&mut solver, "f", vec![a], u);
        let fb = uf.app(&mut solver, "f", vec![b], u);
        solver.add_term(fa);
        solver.add_term(fb);
        assert!(matches!(solver.solve(Budget::UNLIMITED), Outcome::Sat(_)));
    }

    #[test]
    fn test_applications_are_hash_consed() {
        let (mut solver, uf, u) = setup();
        let a = uf.constant(&mut solver, "a", u);
        let f1 = uf.app(&mut solver, "f", vec![a], u);
        let f2 = uf.app(&mut solver, "f", vec![a], u);
        assert_eq!(f1, f2);
    }
}
