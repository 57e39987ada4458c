//! DIMACS and iCNF input/output
//!
//! The exporter is bit-exact: `p cnf N M\n` where `N` is the largest
//! variable id used and `M` the clause count, followed by one line per
//! clause of space-separated non-zero signed integers terminated by
//! `0\n`. The iCNF variant starts with `p inccnf\n` and appends
//! `a <lits> 0\n` lines for the current assumptions; it is appendable
//! across invocations. The parser accepts the same dialect plus `c`
//! comment lines, with clauses allowed to span lines.

use std::io::Write;

use y3_core::atom::Atom;
use y3_core::clause::Premise;
use y3_core::term::TermId;
use y3_mcsat::Solver;

use crate::plugin::{SatTheory, SatView};

/// Errors of the DIMACS surface.
#[derive(Debug, thiserror::Error)]
pub enum DimacsError {
    /// Underlying writer failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A clause mentions a term with no DIMACS numbering.
    #[error("atom over a non-DIMACS term {0}")]
    NotNumbered(TermId),
    /// Unparseable problem line.
    #[error("malformed header: {0}")]
    BadHeader(String),
    /// Unparseable literal token.
    #[error("malformed literal: {0}")]
    BadLiteral(String),
    /// Input ended inside a clause.
    #[error("clause not terminated by 0")]
    UnterminatedClause,
}

/// What a parse pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimacsSummary {
    /// Largest variable id seen (or declared, whichever is larger).
    pub num_vars: u32,
    /// Number of clauses added.
    pub num_clauses: usize,
    /// Assumptions collected from `a` lines, in order.
    pub assumptions: Vec<Atom>,
}

impl SatTheory {
    fn dimacs_lit(&self, solver: &Solver, a: Atom) -> Result<i32, DimacsError> {
        let t = solver.store().atom_term(a);
        if t.plugin() != self.id() {
            return Err(DimacsError::NotNumbered(t));
        }
        match solver.store().view::<SatView>(t) {
            SatView::Var(i) => {
                let id = (*i + 1) as i32;
                Ok(if a.is_positive() { id } else { -id })
            }
            _ => Err(DimacsError::NotNumbered(t)),
        }
    }

    fn hyp_clauses(&self, solver: &Solver) -> Result<(Vec<Vec<i32>>, i32), DimacsError> {
        let mut clauses = Vec::new();
        let mut max_var = 0i32;
        for c in solver.clause_db().refs() {
            let clause = solver.clause_db().get(c);
            if !matches!(clause.premise, Premise::Hyp) {
                continue;
            }
            let mut lits = Vec::with_capacity(clause.len());
            for &a in clause.atoms() {
                let l = self.dimacs_lit(solver, a)?;
                max_var = max_var.max(l.abs());
                lits.push(l);
            }
            clauses.push(lits);
        }
        Ok((clauses, max_var))
    }

    /// Export the hypothesis clauses in DIMACS CNF.
    pub fn write_dimacs<W: Write>(&self, solver: &Solver, out: &mut W) -> Result<(), DimacsError> {
        let (clauses, max_var) = self.hyp_clauses(solver)?;
        writeln!(out, "p cnf {} {}", max_var, clauses.len())?;
        for lits in &clauses {
            for l in lits {
                write!(out, "{l} ")?;
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }

    /// Parse DIMACS (or iCNF) text, adding the clauses as hypotheses and
    /// pushing one assumption frame per `a` line.
    pub fn parse_dimacs(
        &self,
        solver: &mut Solver,
        input: &str,
    ) -> Result<DimacsSummary, DimacsError> {
        let mut summary = DimacsSummary::default();
        let mut clause: Vec<i32> = Vec::new();
        let mut in_clause = false;

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('p') {
                let fields: Vec<&str> = rest.split_whitespace().collect();
                match fields.as_slice() {
                    ["cnf", vars, _clauses] => {
                        summary.num_vars = vars
                            .parse()
                            .map_err(|_| DimacsError::BadHeader(line.to_string()))?;
                    }
                    ["inccnf"] => {}
                    _ => return Err(DimacsError::BadHeader(line.to_string())),
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("a ") {
                let mut frame = Vec::new();
                for tok in rest.split_whitespace() {
                    let l: i32 = tok
                        .parse()
                        .map_err(|_| DimacsError::BadLiteral(tok.to_string()))?;
                    if l == 0 {
                        break;
                    }
                    summary.num_vars = summary.num_vars.max(l.unsigned_abs());
                    frame.push(self.lit(solver, l));
                }
                summary.assumptions.extend(frame.iter().copied());
                solver.push_assumptions(&frame);
                continue;
            }
            for tok in line.split_whitespace() {
                let l: i32 = tok
                    .parse()
                    .map_err(|_| DimacsError::BadLiteral(tok.to_string()))?;
                if l == 0 {
                    let lits = std::mem::take(&mut clause);
                    summary.num_vars = summary
                        .num_vars
                        .max(lits.iter().map(|l| l.unsigned_abs()).max().unwrap_or(0));
                    self.add_dimacs_clause(solver, &lits);
                    summary.num_clauses += 1;
                    in_clause = false;
                } else {
                    clause.push(l);
                    in_clause = true;
                }
            }
        }
        if in_clause {
            return Err(DimacsError::UnterminatedClause);
        }
        Ok(summary)
    }
}

/// Appendable iCNF writer.
///
/// Each [`IcnfWriter::append`] call emits the header (first call only),
/// the hypothesis clauses added since the previous call, and one
/// `a <lits> 0` line for the currently pushed assumptions.
#[derive(Debug, Default)]
pub struct IcnfWriter {
    cursor: usize,
    header_written: bool,
}

impl IcnfWriter {
    /// Create a writer positioned at the start of the clause database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the new clauses and the current assumptions.
    pub fn append<W: Write>(
        &mut self,
        sat: &SatTheory,
        solver: &Solver,
        out: &mut W,
    ) -> Result<(), DimacsError> {
        if !self.header_written {
            writeln!(out, "p inccnf")?;
            self.header_written = true;
        }
        let db = solver.clause_db();
        for c in db.refs().skip(self.cursor) {
            let clause = db.get(c);
            if !matches!(clause.premise, Premise::Hyp) {
                continue;
            }
            for &a in clause.atoms() {
                write!(out, "{} ", sat.dimacs_lit(solver, a)?)?;
            }
            writeln!(out, "0")?;
        }
        self.cursor = db.len();

        let assumptions: Vec<Atom> = solver
            .assumption_frames()
            .iter()
            .flatten()
            .copied()
            .collect();
        if !assumptions.is_empty() {
            write!(out, "a")?;
            for a in assumptions {
                write!(out, " {}", sat.dimacs_lit(solver, a)?)?;
            }
            writeln!(out, " 0")?;
        }
        Ok(())
    }
}
