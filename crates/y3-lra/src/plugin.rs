//! The linear rational arithmetic plugin
//!
//! Variables take exact rational values chosen at decision time from the
//! bounds induced by the currently asserted constraints. Predicate atoms
//! (`e <= 0`, `e < 0`, `e = 0`) watch their variables and evaluate as
//! soon as every variable is assigned; evaluations cite per-variable
//! value atoms (`x = q`), so conflict analysis resolves predicate atoms
//! into value atoms, and learned clauses exclude decided values directly.
//!
//! An empty decision domain raises a conflict over the bounding
//! constraint atoms plus the value atoms of the other variables they
//! mention.

use std::any::Any;
use std::fmt;

use hashbrown::HashMap;
use num_rational::BigRational;
use num_traits::{One, Zero};

use y3_core::atom::Atom;
use y3_core::plugin::{Actions, EvalRes, Plugin, WatchRes};
use y3_core::term::{PluginId, SortKey, TermFlags, TermId, TermStore, Type};
use y3_core::value::Value;
use y3_mcsat::Solver;

use crate::expr::LinExpr;

/// Predicate comparisons against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredOp {
    /// `expr <= 0`
    Leq,
    /// `expr < 0`
    Lt,
    /// `expr = 0`
    Eq,
}

impl PredOp {
    fn holds(self, v: &BigRational) -> bool {
        match self {
            PredOp::Leq => *v <= BigRational::zero(),
            PredOp::Lt => *v < BigRational::zero(),
            PredOp::Eq => v.is_zero(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            PredOp::Leq => "<=",
            PredOp::Lt => "<",
            PredOp::Eq => "=",
        }
    }
}

/// Views owned by the arithmetic plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LraView {
    /// A rational variable.
    Var(String),
    /// The Boolean atom `expr op 0`.
    Pred {
        /// The linear expression compared against zero.
        expr: LinExpr,
        /// The comparison.
        op: PredOp,
    },
    /// The Boolean value atom `var = value`, used in explanations.
    ValueEq {
        /// The variable.
        var: TermId,
        /// The compared value.
        value: BigRational,
    },
}

/// One bound gathered while deciding a variable.
#[derive(Debug, Clone)]
struct Bound {
    value: BigRational,
    strict: bool,
    /// The currently-false atom of the constraint inducing the bound.
    src: Atom,
    /// The other variables of the constraint (their values parameterise
    /// the bound).
    others: Vec<TermId>,
    /// The effective inequality `e <= 0` / `e < 0` the bound came from,
    /// for Fourier-Motzkin combination. `None` for point constraints.
    ineq: Option<(LinExpr, bool)>,
}

/// The arithmetic plugin.
#[derive(Debug)]
pub struct Lra {
    id: PluginId,
    /// Constraint and value atoms mentioning each variable.
    occs: HashMap<TermId, Vec<TermId>>,
}

/// The plugin-local index of the reals sort.
const REAL_SORT: u32 = 0;

impl Lra {
    /// Register the plugin with a solver.
    pub fn install(solver: &mut Solver) -> LraTheory {
        let pid = solver.add_plugin(|id| Lra {
            id,
            occs: HashMap::new(),
        });
        LraTheory { pid }
    }

    fn record_occurrence(&mut self, var: TermId, atom_term: TermId) {
        let list = self.occs.entry(var).or_default();
        if !list.contains(&atom_term) {
            list.push(atom_term);
        }
    }

    fn rat_value(store: &TermStore, var: TermId) -> Option<BigRational> {
        match store.term(var).value() {
            Some(Value::Rat(q)) => Some(q.clone()),
            _ => None,
        }
    }

    /// Intern the value atom `var = value` and return its false atom
    /// (the value atom evaluates true while `var` keeps this value).
    fn value_atom(&mut self, store: &mut TermStore, var: TermId) -> Atom {
        let value = Self::rat_value(store, var).expect("value atom of an unassigned variable");
        let eq = store.intern(self.id, LraView::ValueEq { var, value }, Type::Bool);
        store.ensure_bvar(eq);
        store.atom_of(eq, false)
    }

    /// Evaluate `t` if its variables are assigned and queue the
    /// propagation, citing value atoms for predicates.
    fn try_propagate(&mut self, acts: &mut Actions<'_>, t: TermId) {
        let view = acts.store.view::<LraView>(t).clone();
        match view {
            LraView::Var(_) => {}
            LraView::Pred { expr, op } => {
                let Some(v) = expr.eval(acts.store) else { return };
                let truth = op.holds(&v);
                let mut subs = Vec::with_capacity(expr.monomials().len());
                for x in expr.vars() {
                    let value =
                        Self::rat_value(acts.store, x).expect("evaluated expression variable");
                    let eq = acts
                        .store
                        .intern(self.id, LraView::ValueEq { var: x, value }, Type::Bool);
                    subs.push(eq);
                }
                acts.propagate_bool_eval(t, truth, subs);
            }
            LraView::ValueEq { .. } => {
                if let EvalRes::Into {
                    value: Value::Bool(b),
                    used,
                } = self.eval(acts.store, t)
                {
                    acts.propagate_bool_eval(t, b, used);
                }
            }
        }
    }

    /// Raise the Fourier-Motzkin conflict for a crossing lower/upper
    /// bound pair on `x`: the resolvent eliminates `x`, so the lemma
    /// `E1 /\ E2 -> R` forces progress on the remaining variables
    /// instead of merely excluding the current values.
    fn fm_conflict(&mut self, acts: &mut Actions<'_>, x: TermId, l: &Bound, h: &Bound) {
        let (e1, s1) = l.ineq.clone().expect("lower bounds come from inequalities");
        let (e2, s2) = h.ineq.clone().expect("upper bounds come from inequalities");
        let c1 = e1.coeff(x).expect("bound constraint mentions x").clone();
        let c2 = e2.coeff(x).expect("bound constraint mentions x").clone();
        debug_assert!(c1 < BigRational::zero() && c2 > BigRational::zero());
        let combined = e1.scaled(&c2).plus(&e2.scaled(&-c1));
        let strict = s1 || s2;
        let mut atoms = vec![l.src, h.src];
        if combined.is_constant() {
            // The bounds contradict outright; the two sources suffice.
            let k = combined.constant_part();
            debug_assert!(if strict {
                *k >= BigRational::zero()
            } else {
                *k > BigRational::zero()
            });
        } else {
            let op = if strict { PredOp::Lt } else { PredOp::Leq };
            let rt = acts
                .store
                .intern(self.id, LraView::Pred { expr: combined, op }, Type::Bool);
            acts.store.ensure_bvar(rt);
            atoms.push(acts.store.atom_of(rt, true));
        }
        acts.raise_conflict(atoms, "la-fm");
    }

    /// Conflict atoms for a set of clashing bounds: their source atoms
    /// plus value atoms for every other variable they mention.
    fn bound_conflict(&mut self, acts: &mut Actions<'_>, bounds: &[&Bound]) -> Vec<Atom> {
        let mut atoms = Vec::new();
        for b in bounds {
            if !atoms.contains(&b.src) {
                atoms.push(b.src);
            }
            for &y in &b.others {
                let a = self.value_atom(acts.store, y);
                if !atoms.contains(&a) {
                    atoms.push(a);
                }
            }
        }
        atoms
    }

    /// Pick a rational inside the interval, avoiding the excluded values.
    fn pick(
        lo: Option<&Bound>,
        hi: Option<&Bound>,
        excluded: &[Bound],
        phase: Option<&BigRational>,
    ) -> BigRational {
        let fits = |v: &BigRational| {
            let above = lo.map_or(true, |l| if l.strict { v > &l.value } else { v >= &l.value });
            let below = hi.map_or(true, |h| if h.strict { v < &h.value } else { v <= &h.value });
            above && below && !excluded.iter().any(|e| e.value == *v)
        };
        if let Some(p) = phase {
            if fits(p) {
                return p.clone();
            }
        }
        let one = BigRational::one;
        match (lo, hi) {
            (Some(l), Some(h)) => {
                let two = &one() + &one();
                let mut c = (&l.value + &h.value) / &two;
                while !fits(&c) {
                    c = (&c + &h.value) / &two;
                }
                c
            }
            (Some(l), None) => {
                let mut c = &l.value + &one();
                while !fits(&c) {
                    c += one();
                }
                c
            }
            (None, Some(h)) => {
                let mut c = &h.value - &one();
                while !fits(&c) {
                    c -= one();
                }
                c
            }
            (None, None) => {
                let mut c = BigRational::zero();
                while !fits(&c) {
                    c += one();
                }
                c
            }
        }
    }
}

impl Plugin for Lra {
    fn id(&self) -> PluginId {
        self.id
    }

    fn name(&self) -> &'static str {
        "lra"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn init(&mut self, acts: &mut Actions<'_>, t: TermId) {
        let view = acts.store.view::<LraView>(t).clone();
        match view {
            LraView::Var(_) => {}
            LraView::Pred { ref expr, .. } => {
                for x in expr.vars() {
                    acts.watch(t, x);
                    self.record_occurrence(x, t);
                }
                self.try_propagate(acts, t);
            }
            LraView::ValueEq { var, .. } => {
                acts.watch(t, var);
                self.record_occurrence(var, t);
                self.try_propagate(acts, t);
            }
        }
    }

    fn update_watches(&mut self, acts: &mut Actions<'_>, t: TermId, _watch: TermId) -> WatchRes {
        self.try_propagate(acts, t);
        WatchRes::Keep
    }

    fn subterms(&self, store: &TermStore, t: TermId, f: &mut dyn FnMut(TermId)) {
        match store.view::<LraView>(t) {
            LraView::Var(_) => {}
            LraView::Pred { expr, .. } => {
                for x in expr.vars() {
                    f(x);
                }
            }
            LraView::ValueEq { var, .. } => f(*var),
        }
    }

    fn eval(&self, store: &TermStore, t: TermId) -> EvalRes {
        match store.view::<LraView>(t) {
            LraView::Var(_) => EvalRes::Unknown,
            LraView::Pred { expr, op } => match expr.eval(store) {
                Some(v) => EvalRes::Into {
                    value: Value::Bool(op.holds(&v)),
                    used: expr.vars().collect(),
                },
                None => EvalRes::Unknown,
            },
            LraView::ValueEq { var, value } => match Self::rat_value(store, *var) {
                Some(v) => EvalRes::Into {
                    value: Value::Bool(v == *value),
                    used: vec![*var],
                },
                None => EvalRes::Unknown,
            },
        }
    }

    fn explain(&mut self, store: &TermStore, t: TermId) -> Vec<Atom> {
        match store.view::<LraView>(t) {
            LraView::Pred { expr, .. } => {
                let mut atoms = Vec::new();
                for x in expr.vars() {
                    let value = Self::rat_value(store, x).expect("explained variable assigned");
                    let eq = store
                        .find(self.id, LraView::ValueEq { var: x, value })
                        .expect("value atom interned at propagation time");
                    atoms.push(store.atom_of(eq, false));
                }
                atoms
            }
            view => unreachable!("no clause explanation for {view:?}"),
        }
    }

    fn decide(&mut self, acts: &mut Actions<'_>, x: TermId) -> Value {
        let occ_list = self.occs.get(&x).cloned().unwrap_or_default();
        let mut lo: Option<Bound> = None;
        let mut hi: Option<Bound> = None;
        let mut point: Option<Bound> = None;
        let mut excluded: Vec<Bound> = Vec::new();

        for t in occ_list {
            if acts.store.has_flag(t, TermFlags::DELETED) {
                continue;
            }
            let Some(truth) = acts.store.bool_value(t) else { continue };
            let src = acts.store.atom_of(t, !truth);
            let view = acts.store.view::<LraView>(t).clone();
            let bound = match view {
                LraView::ValueEq { value, .. } => Bound {
                    value,
                    strict: false,
                    src,
                    others: Vec::new(),
                    ineq: None,
                },
                LraView::Pred { expr, op } => {
                    let Some(rest) = expr.eval_except(acts.store, x) else { continue };
                    let a = expr.coeff(x).expect("occurrence lists track variables").clone();
                    let others: Vec<TermId> = expr.vars().filter(|&y| y != x).collect();
                    let value = -rest / &a;
                    let positive = a > BigRational::zero();
                    // Effective relation of x against `value`.
                    let kind = match (op, truth, positive) {
                        (PredOp::Leq, true, true) | (PredOp::Lt, true, true) => Upper,
                        (PredOp::Leq, true, false) | (PredOp::Lt, true, false) => Lower,
                        (PredOp::Leq, false, true) | (PredOp::Lt, false, true) => Lower,
                        (PredOp::Leq, false, false) | (PredOp::Lt, false, false) => Upper,
                        (PredOp::Eq, true, _) => Point,
                        (PredOp::Eq, false, _) => Exclude,
                    };
                    let strict = match (op, truth) {
                        (PredOp::Leq, false) | (PredOp::Lt, true) => true,
                        (PredOp::Leq, true) | (PredOp::Lt, false) => false,
                        (PredOp::Eq, _) => false,
                    };
                    // The effective inequality `e (<=|<) 0` implied by the
                    // assignment, for Fourier-Motzkin combination.
                    let ineq = match (op, truth) {
                        (PredOp::Leq, true) => Some((expr.clone(), false)),
                        (PredOp::Leq, false) => Some((expr.negated(), true)),
                        (PredOp::Lt, true) => Some((expr.clone(), true)),
                        (PredOp::Lt, false) => Some((expr.negated(), false)),
                        (PredOp::Eq, _) => None,
                    };
                    let bound = Bound { value, strict, src, others, ineq };
                    match kind {
                        Upper => {
                            let tighter = hi.as_ref().map_or(true, |h| {
                                bound.value < h.value
                                    || (bound.value == h.value && bound.strict && !h.strict)
                            });
                            if tighter {
                                hi = Some(bound);
                            }
                            continue;
                        }
                        Lower => {
                            let tighter = lo.as_ref().map_or(true, |l| {
                                bound.value > l.value
                                    || (bound.value == l.value && bound.strict && !l.strict)
                            });
                            if tighter {
                                lo = Some(bound);
                            }
                            continue;
                        }
                        Point => bound,
                        Exclude => {
                            excluded.push(bound);
                            continue;
                        }
                    }
                }
                LraView::Var(_) => continue,
            };
            // `bound` is a point constraint (from Pred-Eq or ValueEq).
            if truth {
                match &point {
                    Some(p) if p.value != bound.value => {
                        let atoms = self.bound_conflict(acts, &[p, &bound]);
                        acts.raise_conflict(atoms, "la-point");
                        return Value::Rat(BigRational::zero());
                    }
                    Some(_) => {}
                    None => point = Some(bound),
                }
            } else {
                excluded.push(bound);
            }
        }

        // Feasibility checks, tightest bounds first.
        if let (Some(l), Some(h)) = (&lo, &hi) {
            let empty = l.value > h.value || (l.value == h.value && (l.strict || h.strict));
            if empty {
                let (l, h) = (l.clone(), h.clone());
                self.fm_conflict(acts, x, &l, &h);
                return Value::Rat(BigRational::zero());
            }
        }
        if let Some(p) = &point {
            let below = lo.as_ref().filter(|l| {
                p.value < l.value || (p.value == l.value && l.strict)
            });
            let above = hi.as_ref().filter(|h| {
                p.value > h.value || (p.value == h.value && h.strict)
            });
            if let Some(l) = below {
                let atoms = self.bound_conflict(acts, &[p, l]);
                acts.raise_conflict(atoms, "la-point-bound");
                return Value::Rat(BigRational::zero());
            }
            if let Some(h) = above {
                let atoms = self.bound_conflict(acts, &[p, h]);
                acts.raise_conflict(atoms, "la-point-bound");
                return Value::Rat(BigRational::zero());
            }
            if let Some(e) = excluded.iter().find(|e| e.value == p.value) {
                let atoms = self.bound_conflict(acts, &[p, e]);
                acts.raise_conflict(atoms, "la-point-diseq");
                return Value::Rat(BigRational::zero());
            }
            return Value::Rat(p.value.clone());
        }
        if let (Some(l), Some(h)) = (&lo, &hi) {
            // A closed degenerate interval forces its endpoint.
            if l.value == h.value {
                if let Some(e) = excluded.iter().find(|e| e.value == l.value) {
                    let atoms = self.bound_conflict(acts, &[l, h, e]);
                    acts.raise_conflict(atoms, "la-pinch");
                    return Value::Rat(BigRational::zero());
                }
                return Value::Rat(l.value.clone());
            }
        }

        let phase = match &acts.store.term(x).phase {
            Some(Value::Rat(q)) => Some(q.clone()),
            _ => None,
        };
        Value::Rat(Self::pick(lo.as_ref(), hi.as_ref(), &excluded, phase.as_ref()))
    }

    fn on_delete(&mut self, t: TermId) {
        self.occs.remove(&t);
    }

    fn print(&self, store: &TermStore, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match store.view::<LraView>(t) {
            LraView::Var(name) => write!(f, "{name}"),
            LraView::Pred { expr, op } => {
                for (i, (c, v)) in expr.monomials().iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{c}*")?;
                    self.print(store, *v, f)?;
                }
                if !expr.constant_part().is_zero() || expr.monomials().is_empty() {
                    write!(f, " + {}", expr.constant_part())?;
                }
                write!(f, " {} 0", op.symbol())
            }
            LraView::ValueEq { var, value } => {
                self.print(store, *var, f)?;
                write!(f, " = {value}")
            }
        }
    }
}

/// Bound direction markers used while classifying constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Upper,
    Lower,
    Point,
    Exclude,
}
use BoundKind::{Exclude, Lower, Point, Upper};

/// Handle for constructing arithmetic terms on a solver.
#[derive(Debug, Clone, Copy)]
pub struct LraTheory {
    pid: PluginId,
}

impl LraTheory {
    /// The plugin id.
    pub fn id(&self) -> PluginId {
        self.pid
    }

    /// The sort of the reals.
    pub fn real_sort(&self) -> SortKey {
        SortKey {
            plugin: self.pid,
            sort: REAL_SORT,
        }
    }

    /// A rational variable.
    pub fn var(&self, solver: &mut Solver, name: &str) -> TermId {
        let sort = self.real_sort();
        solver
            .store_mut()
            .intern(self.pid, LraView::Var(name.to_string()), Type::Sort(sort))
    }

    /// The atom `expr op 0`.
    pub fn pred(&self, solver: &mut Solver, expr: LinExpr, op: PredOp) -> TermId {
        solver
            .store_mut()
            .intern(self.pid, LraView::Pred { expr, op }, Type::Bool)
    }

    /// `lhs <= rhs`
    pub fn leq(&self, solver: &mut Solver, lhs: &LinExpr, rhs: &LinExpr) -> TermId {
        self.pred(solver, lhs.minus(rhs), PredOp::Leq)
    }

    /// `lhs < rhs`
    pub fn lt(&self, solver: &mut Solver, lhs: &LinExpr, rhs: &LinExpr) -> TermId {
        self.pred(solver, lhs.minus(rhs), PredOp::Lt)
    }

    /// `lhs >= rhs`
    pub fn geq(&self, solver: &mut Solver, lhs: &LinExpr, rhs: &LinExpr) -> TermId {
        self.leq(solver, rhs, lhs)
    }

    /// `lhs > rhs`
    pub fn gt(&self, solver: &mut Solver, lhs: &LinExpr, rhs: &LinExpr) -> TermId {
        self.lt(solver, rhs, lhs)
    }

    /// `lhs = rhs`
    pub fn eq(&self, solver: &mut Solver, lhs: &LinExpr, rhs: &LinExpr) -> TermId {
        self.pred(solver, lhs.minus(rhs), PredOp::Eq)
    }

    /// The value atom `var = q`.
    pub fn value_eq(&self, solver: &mut Solver, var: TermId, q: BigRational) -> TermId {
        solver
            .store_mut()
            .intern(self.pid, LraView::ValueEq { var, value: q }, Type::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use y3_mcsat::{Budget, Outcome, UnsatCause};

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn setup() -> (Solver, LraTheory) {
        let mut solver = Solver::default();
        let lra = Lra::install(&mut solver);
        (solver, lra)
    }

    #[test]
    fn test_bounds_decide_inside_interval() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let xe = LinExpr::var(x);
        // 0 <= x and x < 2
        let low = lra.geq(&mut solver, &xe, &LinExpr::constant(q(0)));
        let high = lra.lt(&mut solver, &xe, &LinExpr::constant(q(2)));
        let al = solver.atom(low, true);
        let ah = solver.atom(high, true);
        solver.add_clause(vec![al], None);
        solver.add_clause(vec![ah], None);

        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => {
                let v = model.value(x).and_then(Value::as_rat).cloned().unwrap();
                assert!(v >= q(0) && v < q(2), "x = {v} outside [0, 2)");
            }
            other => panic!("expected Sat, got {other:?}"),
        }
        solver.check_invariants();
    }

    #[test]
    fn test_crossing_bounds_are_unsat_with_proof() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let xe = LinExpr::var(x);
        // x <= 0 and x >= 1
        let low = lra.leq(&mut solver, &xe, &LinExpr::constant(q(0)));
        let high = lra.geq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let al = solver.atom(low, true);
        let ah = solver.atom(high, true);
        solver.add_clause(vec![al], None);
        solver.add_clause(vec![ah], None);

        match solver.solve(Budget::UNLIMITED) {
            Outcome::Unsat(UnsatCause::Root(_)) => {}
            other => panic!("expected root Unsat, got {other:?}"),
        }
        let proof = solver.resolution_proof().unwrap();
        proof.check_empty(solver.store(), solver.clause_db()).unwrap();
    }

    #[test]
    fn test_disequalities_dodge_excluded_points() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let xe = LinExpr::var(x);
        // 0 <= x <= 1, x != 0, x != 1: still satisfiable in the rationals.
        let low = lra.geq(&mut solver, &xe, &LinExpr::constant(q(0)));
        let high = lra.leq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let at0 = lra.eq(&mut solver, &xe, &LinExpr::constant(q(0)));
        let at1 = lra.eq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let clauses: Vec<Atom> = vec![
            solver.atom(low, true),
            solver.atom(high, true),
            solver.atom(at0, false),
            solver.atom(at1, false),
        ];
        for a in clauses {
            solver.add_clause(vec![a], None);
        }

        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => {
                let v = model.value(x).and_then(Value::as_rat).cloned().unwrap();
                assert!(v > q(0) && v < q(1), "x = {v} violates the constraints");
            }
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn test_pinched_interval_with_diseq_is_unsat() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let xe = LinExpr::var(x);
        // 1 <= x <= 1 and x != 1.
        let low = lra.geq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let high = lra.leq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let at1 = lra.eq(&mut solver, &xe, &LinExpr::constant(q(1)));
        let atoms: Vec<Atom> = vec![
            solver.atom(low, true),
            solver.atom(high, true),
            solver.atom(at1, false),
        ];
        for a in atoms {
            solver.add_clause(vec![a], None);
        }
        assert!(matches!(
            solver.solve(Budget::UNLIMITED),
            Outcome::Unsat(UnsatCause::Root(_))
        ));
    }

    #[test]
    fn test_two_variable_constraint_chain() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let y = lra.var(&mut solver, "y");
        let xe = LinExpr::var(x);
        let ye = LinExpr::var(y);
        // x + y <= 1, y >= 2  =>  x <= -1.
        let sum = lra.leq(&mut solver, &xe.plus(&ye), &LinExpr::constant(q(1)));
        let ybound = lra.geq(&mut solver, &ye, &LinExpr::constant(q(2)));
        let xbound = lra.gt(&mut solver, &xe, &LinExpr::constant(q(-1)));
        let atoms: Vec<Atom> = vec![
            solver.atom(sum, true),
            solver.atom(ybound, true),
            solver.atom(xbound, true),
        ];
        for a in atoms {
            solver.add_clause(vec![a], None);
        }
        assert!(matches!(
            solver.solve(Budget::UNLIMITED),
            Outcome::Unsat(UnsatCause::Root(_))
        ));
    }

    #[test]
    fn test_disjunctive_constraints_pick_a_branch() {
        let (mut solver, lra) = setup();
        let x = lra.var(&mut solver, "x");
        let xe = LinExpr::var(x);
        // (x <= 0 or x >= 10) and x > 5.
        let low = lra.leq(&mut solver, &xe, &LinExpr::constant(q(0)));
        let high = lra.geq(&mut solver, &xe, &LinExpr::constant(q(10)));
        let gt5 = lra.gt(&mut solver, &xe, &LinExpr::constant(q(5)));
        let al = solver.atom(low, true);
        let ah = solver.atom(high, true);
        let a5 = solver.atom(gt5, true);
        solver.add_clause(vec![al, ah], None);
        solver.add_clause(vec![a5], None);

        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => {
                let v = model.value(x).and_then(Value::as_rat).cloned().unwrap();
                assert!(v >= q(10), "x = {v} must satisfy the surviving branch");
            }
            other => panic!("expected Sat, got {other:?}"),
        }
    }
}
