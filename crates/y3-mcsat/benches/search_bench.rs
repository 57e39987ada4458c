//! Search benchmarks on seeded random 3-SAT instances.

use std::any::Any;
use std::fmt;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use y3_core::atom::Atom;
use y3_core::plugin::{Actions, Plugin};
use y3_core::term::{PluginId, TermId, TermStore, Type};
use y3_mcsat::{Budget, Solver};

#[derive(Debug)]
struct BenchBool {
    id: PluginId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Var(u32);

impl Plugin for BenchBool {
    fn id(&self) -> PluginId {
        self.id
    }
    fn name(&self) -> &'static str {
        "bench-bool"
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn init(&mut self, _acts: &mut Actions<'_>, _t: TermId) {}
    fn print(&self, store: &TermStore, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", store.view::<Var>(t).0)
    }
}

fn random_3sat(seed: u64, num_vars: u32, num_clauses: u32) -> Solver {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut solver = Solver::default();
    let pid = solver.add_plugin(|id| BenchBool { id });
    let atoms: Vec<Atom> = (0..num_vars)
        .map(|i| {
            let t = solver.store_mut().intern(pid, Var(i), Type::Bool);
            solver.atom(t, true)
        })
        .collect();
    for _ in 0..num_clauses {
        let mut clause = Vec::with_capacity(3);
        while clause.len() < 3 {
            let v = rng.gen_range(0..num_vars) as usize;
            let a = if rng.gen_bool(0.5) {
                atoms[v]
            } else {
                atoms[v].negated()
            };
            if !clause.contains(&a) && !clause.contains(&a.negated()) {
                clause.push(a);
            }
        }
        solver.add_clause(clause, None);
    }
    solver
}

fn bench_random_3sat(c: &mut Criterion) {
    let mut group = c.benchmark_group("random-3sat");
    for &(vars, ratio) in &[(50u32, 4.2f64), (100, 4.2)] {
        let clauses = (vars as f64 * ratio) as u32;
        group.bench_function(format!("v{vars}-c{clauses}"), |b| {
            let mut seed = 0u64;
            b.iter_batched(
                || {
                    seed += 1;
                    random_3sat(seed, vars, clauses)
                },
                |mut solver| solver.solve(Budget::UNLIMITED),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_random_3sat);
criterion_main!(benches);
