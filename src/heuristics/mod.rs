mod partitioner;
pub use partitioner::Partitioner;
pub use partitioner::PartitionerConfig;
pub use partitioner::PartitionerKind;

mod phase;
pub use phase::PhaseHeuristicKind;

mod scoring;
pub use scoring::VariableHeuristicKind;

use crate::engine::OccurrenceManager;
use crate::sat::{Solver, Value};
use crate::{ProjectedVars, Var};

/// The variable and phase selection of the engine's decision nodes.
///
/// Within a candidate set, the unassigned projected variable of maximum
/// score is picked; non-projected variables are never decided.
pub struct VariableHeuristic {
    kind: VariableHeuristicKind,
    phase: PhaseHeuristicKind,
    projected: ProjectedVars,
}

impl VariableHeuristic {
    /// Builds the heuristic from a scoring method, a phase policy and the
    /// projection.
    #[must_use]
    pub fn new(
        kind: VariableHeuristicKind,
        phase: PhaseHeuristicKind,
        projected: ProjectedVars,
    ) -> Self {
        Self {
            kind,
            phase,
            projected,
        }
    }

    /// Returns `true` if the variable belongs to the projection.
    #[must_use]
    pub fn is_projected(&self, v: Var) -> bool {
        self.projected.contains(v)
    }

    /// Returns the projection.
    #[must_use]
    pub fn projected(&self) -> &ProjectedVars {
        &self.projected
    }

    /// Selects the unassigned projected variable of maximum score among the
    /// candidates, or `None` if every candidate is assigned or out of the
    /// projection.
    #[must_use]
    pub fn select_variable(
        &self,
        candidates: &[Var],
        solver: &Solver,
        occ: &OccurrenceManager,
    ) -> Option<Var> {
        let mut next = None;
        let mut max_score = -1.;
        for &v in candidates {
            if solver.value_var(v) != Value::Undef || !self.projected.contains(v) {
                continue;
            }
            let score = self.kind.score(v, solver, occ);
            if next.is_none() || score > max_score {
                next = Some(v);
                max_score = score;
            }
        }
        next
    }

    /// Returns `true` when the positive literal of `v` must be assumed first.
    #[must_use]
    pub fn select_phase(&self, v: Var, solver: &Solver, occ: &OccurrenceManager) -> bool {
        self.phase.select_phase(v, solver, occ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Literal;

    fn setting(clauses: &[&[isize]], n_vars: usize) -> (Solver, OccurrenceManager) {
        let mut solver = Solver::new();
        for _ in 0..n_vars {
            solver.new_var();
        }
        let clauses: Vec<Vec<Literal>> = clauses
            .iter()
            .map(|c| c.iter().map(|n| Literal::from(*n)).collect())
            .collect();
        for c in &clauses {
            solver.add_clause(c.clone());
        }
        (solver, OccurrenceManager::new(clauses, n_vars))
    }

    #[test]
    fn test_selection_ignores_non_projected() {
        let (solver, occ) = setting(&[&[1, 2], &[1, 3]], 3);
        let h = VariableHeuristic::new(
            VariableHeuristicKind::Dlcs,
            PhaseHeuristicKind::True,
            ProjectedVars::from_vars(3, &[1, 2]),
        );
        assert_eq!(Some(1), h.select_variable(&[0, 1, 2], &solver, &occ));
    }

    #[test]
    fn test_selection_ignores_assigned() {
        let (mut solver, occ) = setting(&[&[1, 2], &[1, 3]], 3);
        solver.add_clause(vec![Literal::from(1)]);
        let h = VariableHeuristic::new(
            VariableHeuristicKind::Dlcs,
            PhaseHeuristicKind::True,
            ProjectedVars::all(3),
        );
        assert_ne!(Some(0), h.select_variable(&[0, 1, 2], &solver, &occ));
    }

    #[test]
    fn test_selection_none_when_exhausted() {
        let (solver, occ) = setting(&[&[1, 2]], 2);
        let h = VariableHeuristic::new(
            VariableHeuristicKind::Dlcs,
            PhaseHeuristicKind::True,
            ProjectedVars::from_vars(2, &[]),
        );
        assert_eq!(None, h.select_variable(&[0, 1], &solver, &occ));
    }
}
