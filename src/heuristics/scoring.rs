use crate::engine::OccurrenceManager;
use crate::sat::{Solver, Value};
use crate::{Literal, Var};
use std::str::FromStr;

/// The variable scoring methods offered by the engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VariableHeuristicKind {
    /// Activity plus occurrence count.
    Vsads,
    /// The SAT core activity.
    Vsids,
    /// Occurrence count.
    Dlcs,
    /// Occurrences weighted by residual clause size.
    Jwts,
    /// Occurrences in short residual clauses.
    Mom,
}

impl FromStr for VariableHeuristicKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VSADS" => Ok(Self::Vsads),
            "VSIDS" => Ok(Self::Vsids),
            "DLCS" => Ok(Self::Dlcs),
            "JW-TS" => Ok(Self::Jwts),
            "MOM" => Ok(Self::Mom),
            _ => Err(anyhow::anyhow!(r#"unknown variable heuristic "{s}""#)),
        }
    }
}

impl VariableHeuristicKind {
    /// Computes the score of a variable; higher is better.
    #[must_use]
    pub fn score(self, v: Var, solver: &Solver, occ: &OccurrenceManager) -> f64 {
        match self {
            Self::Vsads => solver.activities()[v] + occ.n_clauses_with_var(v) as f64,
            Self::Vsids => solver.activities()[v],
            Self::Dlcs => occ.n_clauses_with_var(v) as f64,
            Self::Jwts => jwts(v, solver, occ),
            Self::Mom => mom(v, solver, occ) as f64 * 0.25,
        }
    }
}

/// Counts the occurrences of a variable in residual clauses of at most two
/// unassigned literals.
fn mom(v: Var, solver: &Solver, occ: &OccurrenceManager) -> usize {
    let mut n = occ.n_effective_binary(v);
    for polarity in [true, false] {
        for &idx in occ.occ_list(Literal::from_var(v, polarity)) {
            if n_unassigned(occ.clause(idx as usize), solver) <= 2 {
                n += 1;
            }
        }
    }
    n
}

/// The two-sided Jeroslow-Wang score, restricted to short clauses.
fn jwts(v: Var, solver: &Solver, occ: &OccurrenceManager) -> f64 {
    let mut score = occ.n_effective_binary(v) as f64 * 0.25;
    for polarity in [true, false] {
        for &idx in occ.occ_list(Literal::from_var(v, polarity)) {
            let clause = occ.clause(idx as usize);
            if clause.len() > 5 {
                continue;
            }
            score += 1. / f64::from(1 << n_unassigned(clause, solver));
        }
    }
    score
}

fn n_unassigned(clause: &[Literal], solver: &Solver) -> u32 {
    u32::try_from(
        clause
            .iter()
            .filter(|l| solver.value_var(l.var_index()) == Value::Undef)
            .count(),
    )
    .expect("clause length fits in 32 bits")
}
