use crate::engine::OccurrenceManager;
use crate::sat::Solver;
use crate::{Literal, Var};
use std::str::FromStr;

/// The phase selection policies: which polarity of the decision variable is
/// explored first.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PhaseHeuristicKind {
    /// Always the positive literal.
    True,
    /// Always the negative literal.
    False,
    /// The polarity the variable last had on the trail.
    Polarity,
    /// The polarity occurring in the majority of the remaining clauses.
    Occurrence,
}

impl FromStr for PhaseHeuristicKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRUE" => Ok(Self::True),
            "FALSE" => Ok(Self::False),
            "POLARITY" => Ok(Self::Polarity),
            "OCCURRENCE" => Ok(Self::Occurrence),
            _ => Err(anyhow::anyhow!(r#"unknown phase heuristic "{s}""#)),
        }
    }
}

impl PhaseHeuristicKind {
    /// Returns `true` when the positive literal of `v` must be assumed first.
    #[must_use]
    pub fn select_phase(self, v: Var, solver: &Solver, occ: &OccurrenceManager) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Polarity => solver.saved_polarity(v),
            Self::Occurrence => {
                occ.n_clauses_with(Literal::from_var(v, true))
                    >= occ.n_clauses_with(Literal::from_var(v, false))
            }
        }
    }
}
