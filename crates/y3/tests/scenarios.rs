//! End-to-end scenarios over the propositional surface.

use y3_mcsat::{Budget, Outcome, Solver, UnsatCause};
use y3_sat::Sat;

use y3_core::clause::Premise;

#[test]
fn resolution_to_empty_clause_in_two_steps() {
    // {1, 2} {-1, 2} {-2} is unsatisfiable; the refutation resolves the
    // final conflict through the two unit-propagated literals.
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    sat.add_dimacs_clause(&mut solver, &[1, 2]);
    sat.add_dimacs_clause(&mut solver, &[-1, 2]);
    sat.add_dimacs_clause(&mut solver, &[-2]);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Unsat(UnsatCause::Root(_)) => {}
        other => panic!("expected root Unsat, got {other:?}"),
    }
    let proof = solver.resolution_proof().unwrap();
    proof
        .check_empty(solver.store(), solver.clause_db())
        .unwrap();

    let root = solver.clause_db().get(proof.root());
    assert!(root.is_empty());
    match &root.premise {
        Premise::Steps { steps, .. } => {
            assert!(steps.len() <= 2, "refutation took {} steps", steps.len());
            let mut pivots: Vec<_> = steps
                .iter()
                .map(|s| {
                    let var = solver.store().bvar(s.pivot).expect("Boolean pivot");
                    var.0 + 1
                })
                .collect();
            pivots.sort_unstable();
            assert_eq!(pivots, vec![1, 2]);
        }
        other => panic!("expected a resolution chain, got {other:?}"),
    }
}

#[test]
fn simple_model_extraction() {
    // {1, 2, 3} {-1} {-2} has the unique model 1=F, 2=F, 3=T.
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    sat.add_dimacs_clause(&mut solver, &[1, 2, 3]);
    sat.add_dimacs_clause(&mut solver, &[-1]);
    sat.add_dimacs_clause(&mut solver, &[-2]);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Sat(model) => {
            let mut v = |i: u32| {
                let t = sat.var(&mut solver, i);
                model.bool_value(t)
            };
            // Indices are 0-based; DIMACS ids are 1-based.
            assert_eq!(v(0), Some(false));
            assert_eq!(v(1), Some(false));
            assert_eq!(v(2), Some(true));
        }
        other => panic!("expected Sat, got {other:?}"),
    }
}

#[test]
fn unit_contradiction_needs_no_decisions() {
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    sat.add_dimacs_clause(&mut solver, &[1]);
    sat.add_dimacs_clause(&mut solver, &[-1]);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Unsat(UnsatCause::Root(_)) => {}
        other => panic!("expected root Unsat, got {other:?}"),
    }
    assert_eq!(solver.stats().decisions, 0);
    let proof = solver.resolution_proof().unwrap();
    proof
        .check_empty(solver.store(), solver.clause_db())
        .unwrap();
}

#[test]
fn dimacs_roundtrip_preserves_clauses() {
    let input = "p cnf 3 2\n1 -2 0\n2 3 0\n";

    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    sat.parse_dimacs(&mut solver, input).unwrap();

    let mut exported = Vec::new();
    sat.write_dimacs(&solver, &mut exported).unwrap();
    let exported = String::from_utf8(exported).unwrap();

    let mut reparsed = Solver::default();
    let sat2 = Sat::install(&mut reparsed);
    sat2.parse_dimacs(&mut reparsed, &exported).unwrap();

    let clause_set = |solver: &Solver| {
        let mut out: Vec<Vec<i32>> = Vec::new();
        for c in solver.clause_db().refs() {
            let clause = solver.clause_db().get(c);
            if !matches!(clause.premise, Premise::Hyp) {
                continue;
            }
            let mut lits: Vec<i32> = clause
                .atoms()
                .iter()
                .map(|a| {
                    let id = a.var().0 as i32 + 1;
                    if a.is_positive() {
                        id
                    } else {
                        -id
                    }
                })
                .collect();
            lits.sort_unstable();
            out.push(lits);
        }
        out.sort();
        out
    };
    assert_eq!(clause_set(&solver), clause_set(&reparsed));
}

#[test]
fn assumption_stack_flips_outcomes() {
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    // No hypotheses constrain variable 1.
    sat.add_dimacs_clause(&mut solver, &[2, 3]);

    let pos = sat.lit(&mut solver, 1);
    solver.push_assumptions(&[pos]);
    assert!(matches!(solver.solve(Budget::UNLIMITED), Outcome::Sat(_)));

    let neg = sat.lit(&mut solver, -1);
    solver.push_assumptions(&[neg]);
    match solver.solve(Budget::UNLIMITED) {
        Outcome::Unsat(UnsatCause::Assumptions(conflict)) => {
            assert!(!conflict.is_empty());
            for atom in &conflict {
                assert_eq!(
                    atom.var(),
                    pos.var(),
                    "final conflict may only mention assumptions"
                );
            }
        }
        other => panic!("expected assumption Unsat, got {other:?}"),
    }

    solver.pop_assumptions();
    assert!(matches!(solver.solve(Budget::UNLIMITED), Outcome::Sat(_)));
}

#[test]
fn solving_is_idempotent_after_backtracking() {
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    sat.add_dimacs_clause(&mut solver, &[1, 2]);
    sat.add_dimacs_clause(&mut solver, &[-1, 3]);
    sat.add_dimacs_clause(&mut solver, &[-2, -3]);

    let first = match solver.solve(Budget::UNLIMITED) {
        Outcome::Sat(_) => true,
        Outcome::Unsat(_) => false,
        Outcome::Unknown => panic!("unlimited budget"),
    };
    solver.backtrack_to(0);
    let second = match solver.solve(Budget::UNLIMITED) {
        Outcome::Sat(_) => true,
        Outcome::Unsat(_) => false,
        Outcome::Unknown => panic!("unlimited budget"),
    };
    assert_eq!(first, second);
    solver.check_invariants();
}
