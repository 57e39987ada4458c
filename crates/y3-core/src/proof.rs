//! Resolution proofs
//!
//! A proof is the premise DAG rooted at a clause — for an unsatisfiable
//! instance, the empty clause. Internal nodes are resolution chains
//! ([`Premise::Steps`]); leaves are hypotheses, local assumptions, and
//! theory lemmas. This module replays the DAG, checking every step, and
//! rewrites the raw chains recorded during conflict analysis into their
//! simplified form.
//!
//! Replay is insensitive to clause deletion: reduction only detaches a
//! clause and flags it, so the atoms of every premise stay readable.

use hashbrown::{HashMap, HashSet};

use crate::atom::{Atom, BVar};
use crate::clause::{Clause, ClauseDb, ClauseRef, Premise, Step};
use crate::term::{TermId, TermStore};

/// Errors surfaced by proof traversal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// A resolution step's pivot is not present with opposite polarities
    /// in the two premises.
    #[error("resolution pivot {pivot} missing from a premise while replaying {clause}")]
    MalformedResolution {
        /// The clause whose chain failed.
        clause: ClauseRef,
        /// The offending pivot term.
        pivot: TermId,
    },
    /// A replayed chain concluded a different clause than the one stored.
    #[error("replayed conclusion of {clause} differs from its stored atoms")]
    Mismatch {
        /// The clause whose conclusion mismatched.
        clause: ClauseRef,
    },
    /// The root of a claimed unsatisfiability proof is not empty.
    #[error("proof root {clause} does not conclude the empty clause")]
    NonEmptyRoot {
        /// The root clause.
        clause: ClauseRef,
    },
}

/// A handle on the premise DAG rooted at `root`.
///
/// The handle borrows nothing; consumers traverse through the clause
/// database via [`Premise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    root: ClauseRef,
}

impl Proof {
    /// Wrap a root clause.
    pub fn new(root: ClauseRef) -> Self {
        Proof { root }
    }

    /// The root clause of the DAG.
    #[inline]
    pub fn root(&self) -> ClauseRef {
        self.root
    }

    /// Replay the whole DAG, returning the root's computed conclusion
    /// (sorted, deduplicated).
    pub fn replay(&self, store: &TermStore, db: &ClauseDb) -> Result<Vec<Atom>, ProofError> {
        let memo = conclusions(store, db, self.root)?;
        Ok(memo[&self.root].clone())
    }

    /// Replay and require the empty clause at the root.
    pub fn check_empty(&self, store: &TermStore, db: &ClauseDb) -> Result<(), ProofError> {
        if self.replay(store, db)?.is_empty() {
            Ok(())
        } else {
            Err(ProofError::NonEmptyRoot { clause: self.root })
        }
    }
}

fn sorted_atoms(clause: &Clause) -> Vec<Atom> {
    let mut atoms = clause.atoms().to_vec();
    atoms.sort_unstable();
    atoms.dedup();
    atoms
}

fn contains(sorted: &[Atom], atom: Atom) -> bool {
    sorted.binary_search(&atom).is_ok()
}

/// Resolve two sorted clauses on `pivot`, or `None` if the pivot does not
/// appear with opposite polarities.
fn resolve_on(left: &[Atom], right: &[Atom], pivot: BVar) -> Option<Vec<Atom>> {
    let pos = Atom::positive(pivot);
    let neg = Atom::negative(pivot);
    let crossed = (contains(left, pos) && contains(right, neg))
        || (contains(left, neg) && contains(right, pos));
    if !crossed {
        return None;
    }
    let mut out: Vec<Atom> = left
        .iter()
        .chain(right.iter())
        .copied()
        .filter(|a| a.var() != pivot)
        .collect();
    out.sort_unstable();
    out.dedup();
    Some(out)
}

fn premise_deps(premise: &Premise) -> Vec<ClauseRef> {
    match premise {
        Premise::Hyp | Premise::Local | Premise::Lemma(_) => Vec::new(),
        Premise::Simplify(c) => vec![*c],
        Premise::Steps { init, steps } | Premise::Raw { init, steps } => {
            let mut deps = Vec::with_capacity(steps.len() + 1);
            deps.push(*init);
            deps.extend(steps.iter().map(|s| s.clause));
            deps.sort_unstable();
            deps.dedup();
            deps
        }
    }
}

/// Replay a chain over already-replayed premises.
///
/// For raw chains, steps whose pivot no longer occurs are dropped (they
/// arise when an earlier resolution already removed the pivot); the kept
/// steps are returned. For simplified chains, a missing pivot is an error.
fn replay_chain(
    store: &TermStore,
    memo: &HashMap<ClauseRef, Vec<Atom>>,
    clause: ClauseRef,
    init: ClauseRef,
    steps: &[Step],
    raw: bool,
) -> Result<(Vec<Atom>, Vec<Step>), ProofError> {
    let mut current = memo[&init].clone();
    let mut kept = Vec::with_capacity(steps.len());
    for step in steps {
        let pivot_var = match store.bvar(step.pivot) {
            Some(v) => v,
            None => {
                return Err(ProofError::MalformedResolution {
                    clause,
                    pivot: step.pivot,
                })
            }
        };
        match resolve_on(&current, &memo[&step.clause], pivot_var) {
            Some(next) => {
                current = next;
                kept.push(*step);
            }
            None if raw => {}
            None => {
                return Err(ProofError::MalformedResolution {
                    clause,
                    pivot: step.pivot,
                })
            }
        }
    }
    Ok((current, kept))
}

/// Replay the DAG under `root`, returning the computed conclusion of
/// every reachable clause (sorted, deduplicated). Each conclusion is
/// checked against the clause's stored atoms.
pub fn conclusions(
    store: &TermStore,
    db: &ClauseDb,
    root: ClauseRef,
) -> Result<HashMap<ClauseRef, Vec<Atom>>, ProofError> {
    let mut memo: HashMap<ClauseRef, Vec<Atom>> = HashMap::new();
    let mut expanded: HashSet<ClauseRef> = HashSet::new();
    let mut stack = vec![root];

    while let Some(&c) = stack.last() {
        if memo.contains_key(&c) {
            stack.pop();
            continue;
        }
        let clause = db.get(c);
        let deps = premise_deps(&clause.premise);

        if expanded.insert(c) {
            let missing: Vec<ClauseRef> =
                deps.iter().copied().filter(|d| !memo.contains_key(d)).collect();
            if !missing.is_empty() {
                stack.extend(missing);
                continue;
            }
        } else {
            // Reached a second time with unresolved premises: the premise
            // graph is not a DAG, which marks a defect in construction.
            assert!(
                deps.iter().all(|d| memo.contains_key(d)),
                "cyclic premise chain at {c}"
            );
        }

        let computed = match &clause.premise {
            Premise::Hyp | Premise::Local | Premise::Lemma(_) => sorted_atoms(clause),
            Premise::Simplify(src) => memo[src].clone(),
            Premise::Steps { init, steps } => {
                replay_chain(store, &memo, c, *init, steps, false)?.0
            }
            Premise::Raw { init, steps } => replay_chain(store, &memo, c, *init, steps, true)?.0,
        };

        if computed != sorted_atoms(clause) {
            return Err(ProofError::Mismatch { clause: c });
        }
        memo.insert(c, computed);
        stack.pop();
    }

    Ok(memo)
}

/// Proof post-processing: rewrite every [`Premise::Raw`] chain reachable
/// from `root` into its simplified [`Premise::Steps`] form, dropping
/// no-op steps.
pub fn tidy(store: &TermStore, db: &mut ClauseDb, root: ClauseRef) -> Result<(), ProofError> {
    let memo = conclusions(store, db, root)?;
    let raws: Vec<ClauseRef> = memo
        .keys()
        .copied()
        .filter(|&c| matches!(db.get(c).premise, Premise::Raw { .. }))
        .collect();
    for c in raws {
        let (init, steps) = match &db.get(c).premise {
            Premise::Raw { init, steps } => (*init, steps.clone()),
            _ => unreachable!(),
        };
        let (_, kept) = replay_chain(store, &memo, c, init, &steps, true)?;
        db.get_mut(c).premise = Premise::Steps { init, steps: kept };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Type;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct V(u32);

    /// Two hypotheses `{a, b}` and `{-a, b}` plus `{-b}` resolve to the
    /// empty clause through pivots `b` then `a`.
    fn tiny_unsat() -> (TermStore, ClauseDb, Proof) {
        let mut store = TermStore::new();
        let pid = store.register_plugin("bool");
        let ta = store.intern(pid, V(0), Type::Bool);
        let tb = store.intern(pid, V(1), Type::Bool);
        store.ensure_bvar(ta);
        store.ensure_bvar(tb);
        let a = store.atom_of(ta, true);
        let b = store.atom_of(tb, true);

        let mut db = ClauseDb::new();
        let c1 = db.push(vec![a, b], Premise::Hyp, None);
        let c2 = db.push(vec![a.negated(), b], Premise::Hyp, None);
        let c3 = db.push(vec![b.negated()], Premise::Hyp, None);

        // {a, b} x {-b} on b => {a}; x {-a, b} on a => {b}; x {-b} on b => {}
        let empty = db.push(
            Vec::new(),
            Premise::Raw {
                init: c1,
                steps: vec![
                    Step { clause: c3, pivot: tb },
                    Step { clause: c2, pivot: ta },
                    Step { clause: c3, pivot: tb },
                ],
            },
            None,
        );
        (store, db, Proof::new(empty))
    }

    #[test]
    fn test_replay_reaches_empty_clause() {
        let (store, db, proof) = tiny_unsat();
        assert_eq!(proof.replay(&store, &db).unwrap(), Vec::<Atom>::new());
        proof.check_empty(&store, &db).unwrap();
    }

    #[test]
    fn test_tidy_rewrites_raw_to_steps() {
        let (store, mut db, proof) = tiny_unsat();
        tidy(&store, &mut db, proof.root()).unwrap();
        match &db.get(proof.root()).premise {
            Premise::Steps { steps, .. } => assert_eq!(steps.len(), 3),
            other => panic!("expected Steps premise, got {other:?}"),
        }
        // Replays identically after the rewrite.
        proof.check_empty(&store, &db).unwrap();
    }

    #[test]
    fn test_malformed_pivot_is_reported() {
        let mut store = TermStore::new();
        let pid = store.register_plugin("bool");
        let ta = store.intern(pid, V(0), Type::Bool);
        let tb = store.intern(pid, V(1), Type::Bool);
        store.ensure_bvar(ta);
        store.ensure_bvar(tb);
        let a = store.atom_of(ta, true);
        let b = store.atom_of(tb, true);

        let mut db = ClauseDb::new();
        let c1 = db.push(vec![a], Premise::Hyp, None);
        let c2 = db.push(vec![b], Premise::Hyp, None);
        // Pivot a does not occur in c2 with the opposite polarity.
        let bogus = db.push(
            vec![a, b],
            Premise::Steps {
                init: c1,
                steps: vec![Step { clause: c2, pivot: ta }],
            },
            None,
        );
        let err = Proof::new(bogus).replay(&store, &db).unwrap_err();
        assert_eq!(
            err,
            ProofError::MalformedResolution {
                clause: bogus,
                pivot: ta
            }
        );
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut store = TermStore::new();
        let pid = store.register_plugin("bool");
        let ta = store.intern(pid, V(0), Type::Bool);
        store.ensure_bvar(ta);
        let a = store.atom_of(ta, true);

        let mut db = ClauseDb::new();
        let c1 = db.push(vec![a], Premise::Hyp, None);
        // Claims to simplify c1 but stores a different atom set.
        let wrong = db.push(vec![a.negated()], Premise::Simplify(c1), None);
        let err = Proof::new(wrong).replay(&store, &db).unwrap_err();
        assert_eq!(err, ProofError::Mismatch { clause: wrong });
    }

    #[test]
    fn test_nonempty_root_rejected() {
        let mut store = TermStore::new();
        let pid = store.register_plugin("bool");
        let ta = store.intern(pid, V(0), Type::Bool);
        store.ensure_bvar(ta);
        let a = store.atom_of(ta, true);

        let mut db = ClauseDb::new();
        let c1 = db.push(vec![a], Premise::Hyp, None);
        let err = Proof::new(c1).check_empty(&store, &db).unwrap_err();
        assert_eq!(err, ProofError::NonEmptyRoot { clause: c1 });
    }
}
