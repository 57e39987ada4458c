//! The propositional plugin
//!
//! Owns plain Boolean variables (numbered or named) and the two Boolean
//! constants. Propositional search needs no theory propagation: the
//! engine's clause machinery does all the work, so the plugin's callbacks
//! are almost all trivial. Constants assert themselves by evaluation at
//! registration.

use std::any::Any;
use std::fmt;

use y3_core::atom::Atom;
use y3_core::plugin::{Actions, EvalRes, Plugin};
use y3_core::term::{PluginId, TermId, TermStore, Type};
use y3_core::value::Value;
use y3_mcsat::Solver;

/// Views owned by the propositional plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SatView {
    /// A numbered variable; `Var(i)` prints as the DIMACS id `i + 1`.
    Var(u32),
    /// A named variable.
    Named(String),
    /// A Boolean constant.
    Const(bool),
}

/// The propositional plugin.
#[derive(Debug)]
pub struct Sat {
    id: PluginId,
}

impl Sat {
    /// Register the plugin with a solver.
    pub fn install(solver: &mut Solver) -> SatTheory {
        let pid = solver.add_plugin(|id| Sat { id });
        SatTheory { pid }
    }
}

impl Plugin for Sat {
    fn id(&self) -> PluginId {
        self.id
    }

    fn name(&self) -> &'static str {
        "sat"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn init(&mut self, acts: &mut Actions<'_>, t: TermId) {
        if let SatView::Const(b) = *acts.store.view::<SatView>(t) {
            acts.propagate_bool_eval(t, b, Vec::new());
        }
    }

    fn eval(&self, store: &TermStore, t: TermId) -> EvalRes {
        match store.view::<SatView>(t) {
            SatView::Const(b) => EvalRes::Into {
                value: Value::Bool(*b),
                used: Vec::new(),
            },
            _ => EvalRes::Unknown,
        }
    }

    fn explain(&mut self, _store: &TermStore, _t: TermId) -> Vec<Atom> {
        // Only constants are propagated by evaluation; the lemma is the
        // unit tautology over the constant's atom.
        Vec::new()
    }

    fn print(&self, store: &TermStore, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match store.view::<SatView>(t) {
            SatView::Var(i) => write!(f, "{}", i + 1),
            SatView::Named(name) => write!(f, "{name}"),
            SatView::Const(b) => write!(f, "{b}"),
        }
    }
}

/// Handle for constructing propositional terms on a solver.
#[derive(Debug, Clone, Copy)]
pub struct SatTheory {
    pid: PluginId,
}

impl SatTheory {
    /// The plugin id.
    pub fn id(&self) -> PluginId {
        self.pid
    }

    /// The numbered variable `index` (0-based; DIMACS id `index + 1`).
    pub fn var(&self, solver: &mut Solver, index: u32) -> TermId {
        solver
            .store_mut()
            .intern(self.pid, SatView::Var(index), Type::Bool)
    }

    /// A named variable.
    pub fn named(&self, solver: &mut Solver, name: &str) -> TermId {
        solver
            .store_mut()
            .intern(self.pid, SatView::Named(name.to_string()), Type::Bool)
    }

    /// A Boolean constant term.
    pub fn constant(&self, solver: &mut Solver, b: bool) -> TermId {
        solver
            .store_mut()
            .intern(self.pid, SatView::Const(b), Type::Bool)
    }

    /// The atom for a signed DIMACS literal (`3` or `-3`).
    ///
    /// Panics on 0, which terminates clauses in the format.
    pub fn lit(&self, solver: &mut Solver, dimacs: i32) -> Atom {
        assert!(dimacs != 0, "0 terminates a DIMACS clause");
        let t = self.var(solver, dimacs.unsigned_abs() - 1);
        solver.atom(t, dimacs > 0)
    }

    /// Adapt a list of signed literals into a hypothesis clause's atoms.
    pub fn clause_of_lits(&self, solver: &mut Solver, lits: &[i32]) -> Vec<Atom> {
        lits.iter().map(|&l| self.lit(solver, l)).collect()
    }

    /// Add a hypothesis clause given as signed literals.
    pub fn add_dimacs_clause(&self, solver: &mut Solver, lits: &[i32]) {
        let atoms = self.clause_of_lits(solver, lits);
        solver.add_clause(atoms, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use y3_mcsat::{Budget, Outcome};

    #[test]
    fn test_vars_are_hash_consed() {
        let mut solver = Solver::default();
        let sat = Sat::install(&mut solver);
        let a = sat.var(&mut solver, 3);
        let b = sat.var(&mut solver, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lit_sign_maps_to_polarity() {
        let mut solver = Solver::default();
        let sat = Sat::install(&mut solver);
        let p = sat.lit(&mut solver, 5);
        let n = sat.lit(&mut solver, -5);
        assert_eq!(p.negated(), n);
        assert!(p.is_positive());
    }

    #[test]
    fn test_constants_assert_themselves() {
        let mut solver = Solver::default();
        let sat = Sat::install(&mut solver);
        let tru = sat.constant(&mut solver, true);
        solver.add_term(tru);
        match solver.solve(Budget::UNLIMITED) {
            Outcome::Sat(model) => assert_eq!(model.bool_value(tru), Some(true)),
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Signed DIMACS literals map to atoms and back consistently.
            #[test]
            fn prop_lit_sign_roundtrip(id in 1i32..5000, positive: bool) {
                let mut solver = Solver::default();
                let sat = Sat::install(&mut solver);
                let signed = if positive { id } else { -id };
                let atom = sat.lit(&mut solver, signed);
                prop_assert_eq!(atom.is_positive(), positive);
                let t = solver.store().atom_term(atom);
                prop_assert_eq!(
                    solver.store().view::<SatView>(t),
                    &SatView::Var(id as u32 - 1)
                );
            }
        }
    }

    #[test]
    fn test_dimacs_clause_roundtrip_outcome() {
        let mut solver = Solver::default();
        let sat = Sat::install(&mut solver);
        sat.add_dimacs_clause(&mut solver, &[1, 2]);
        sat.add_dimacs_clause(&mut solver, &[-1, 2]);
        sat.add_dimacs_clause(&mut solver, &[-2]);
        assert!(matches!(
            solver.solve(Budget::UNLIMITED),
            Outcome::Unsat(_)
        ));
    }
}
