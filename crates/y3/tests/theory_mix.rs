//! Cross-theory scenarios: Boolean structure over arithmetic and
//! uninterpreted-function atoms on one trail.

use num_bigint::BigInt;
use num_rational::BigRational;

use y3_core::value::Value;
use y3_lra::{LinExpr, Lra};
use y3_mcsat::{Budget, Outcome, Solver, UnsatCause};
use y3_sat::Sat;
use y3_uf::Uf;

fn q(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

#[test]
fn boolean_case_split_over_arithmetic_is_unsat() {
    // (p -> x <= 0), (~p -> x >= 1), 0 < x, x < 1: both branches clash
    // with the interval, so the instance is unsatisfiable.
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    let lra = Lra::install(&mut solver);

    let p = sat.named(&mut solver, "p");
    let x = lra.var(&mut solver, "x");
    let xe = LinExpr::var(x);
    let le0 = lra.leq(&mut solver, &xe, &LinExpr::constant(q(0)));
    let ge1 = lra.geq(&mut solver, &xe, &LinExpr::constant(q(1)));
    let gt0 = lra.gt(&mut solver, &xe, &LinExpr::constant(q(0)));
    let lt1 = lra.lt(&mut solver, &xe, &LinExpr::constant(q(1)));

    let ap = solver.atom(p, true);
    let a_le0 = solver.atom(le0, true);
    let a_ge1 = solver.atom(ge1, true);
    let a_gt0 = solver.atom(gt0, true);
    let a_lt1 = solver.atom(lt1, true);

    solver.add_clause(vec![ap.negated(), a_le0], None);
    solver.add_clause(vec![ap, a_ge1], None);
    solver.add_clause(vec![a_gt0], None);
    solver.add_clause(vec![a_lt1], None);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Unsat(UnsatCause::Root(_)) => {}
        other => panic!("expected root Unsat, got {other:?}"),
    }
    let proof = solver.resolution_proof().unwrap();
    proof
        .check_empty(solver.store(), solver.clause_db())
        .unwrap();
}

#[test]
fn boolean_case_split_over_arithmetic_finds_branch() {
    // (p -> x <= 0), (~p -> x >= 1): satisfiable either way.
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    let lra = Lra::install(&mut solver);

    let p = sat.named(&mut solver, "p");
    let x = lra.var(&mut solver, "x");
    let xe = LinExpr::var(x);
    let le0 = lra.leq(&mut solver, &xe, &LinExpr::constant(q(0)));
    let ge1 = lra.geq(&mut solver, &xe, &LinExpr::constant(q(1)));

    let ap = solver.atom(p, true);
    let a_le0 = solver.atom(le0, true);
    let a_ge1 = solver.atom(ge1, true);
    solver.add_clause(vec![ap.negated(), a_le0], None);
    solver.add_clause(vec![ap, a_ge1], None);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Sat(model) => {
            let xv = model.value(x).and_then(Value::as_rat).cloned().unwrap();
            match model.bool_value(p) {
                Some(true) => assert!(xv <= q(0)),
                Some(false) => assert!(xv >= q(1)),
                None => panic!("p left unassigned"),
            }
        }
        other => panic!("expected Sat, got {other:?}"),
    }
    solver.check_invariants();
}

#[test]
fn equalities_guarded_by_booleans() {
    // p -> a = b, p -> b = c, a != c, forced p: transitivity refutes it.
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    let uf = Uf::install(&mut solver);
    let u = uf.sort(&mut solver, "U");

    let p = sat.named(&mut solver, "p");
    let a = uf.constant(&mut solver, "a", u);
    let b = uf.constant(&mut solver, "b", u);
    let c = uf.constant(&mut solver, "c", u);
    let ab = uf.eq(&mut solver, a, b);
    let bc = uf.eq(&mut solver, b, c);
    let ac = uf.eq(&mut solver, a, c);

    let ap = solver.atom(p, true);
    let a_ab = solver.atom(ab, true);
    let a_bc = solver.atom(bc, true);
    let a_ac = solver.atom(ac, false);
    solver.add_clause(vec![ap.negated(), a_ab], None);
    solver.add_clause(vec![ap.negated(), a_bc], None);
    solver.add_clause(vec![a_ac], None);
    solver.add_clause(vec![ap], None);

    assert!(matches!(
        solver.solve(Budget::UNLIMITED),
        Outcome::Unsat(UnsatCause::Root(_))
    ));
}

#[test]
fn three_theories_coexist_on_one_trail() {
    let mut solver = Solver::default();
    let sat = Sat::install(&mut solver);
    let lra = Lra::install(&mut solver);
    let uf = Uf::install(&mut solver);
    let u = uf.sort(&mut solver, "U");

    let p = sat.named(&mut solver, "p");
    let x = lra.var(&mut solver, "x");
    let a = uf.constant(&mut solver, "a", u);
    let b = uf.constant(&mut solver, "b", u);

    let xe = LinExpr::var(x);
    let ge2 = lra.geq(&mut solver, &xe, &LinExpr::constant(q(2)));
    let ab = uf.eq(&mut solver, a, b);

    let ap = solver.atom(p, true);
    let a_ge2 = solver.atom(ge2, true);
    let a_ab = solver.atom(ab, true);
    solver.add_clause(vec![ap, a_ge2], None);
    solver.add_clause(vec![ap.negated(), a_ab], None);

    match solver.solve(Budget::UNLIMITED) {
        Outcome::Sat(model) => {
            match model.bool_value(p) {
                Some(true) => assert_eq!(model.value(a), model.value(b)),
                Some(false) => {
                    let xv = model.value(x).and_then(Value::as_rat).cloned().unwrap();
                    assert!(xv >= q(2));
                }
                None => panic!("p left unassigned"),
            }
        }
        other => panic!("expected Sat, got {other:?}"),
    }
    solver.check_invariants();
}
