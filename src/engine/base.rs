use super::occurrence::OccurrenceManager;
use super::EngineConfig;
use crate::cache::BucketManager;
use crate::heuristics::{Partitioner, VariableHeuristic};
use crate::sat::{SolveStatus, Solver, Value};
use crate::{CnfFormula, Literal, ProjectedVars, Var};
use anyhow::{bail, Result};
use std::io::Write;

/// The units and free variables collected along one branch of the recursion.
#[derive(Default)]
pub(crate) struct BranchData {
    pub units: Vec<Literal>,
    pub free_vars: Vec<Var>,
}

/// The state shared by the compiler and the counter: the SAT core, the
/// occurrence manager, the key builder and the selection heuristics.
pub(crate) struct SearchCore {
    pub solver: Solver,
    pub occ: OccurrenceManager,
    pub bm: BucketManager,
    pub heuristic: VariableHeuristic,
    pub partitioner: Option<Partitioner>,
    pub init_unsat: bool,
    pub reverse_polarity: bool,
    stamp_var: Vec<u64>,
    stamp: u64,
}

impl SearchCore {
    /// Loads the formula into a fresh SAT core, decides its satisfiability,
    /// and sets up the residual-formula machinery on the simplified clauses.
    pub fn new(
        cnf: &CnfFormula,
        projected: ProjectedVars,
        config: &EngineConfig,
        trace: Option<Box<dyn Write>>,
    ) -> Result<Self> {
        let mut solver = Solver::new();
        for _ in 0..cnf.n_vars() {
            solver.new_var();
        }
        if let Some(trace) = trace {
            solver.set_trace(trace);
        }
        for clause in cnf.clauses() {
            solver.add_clause(clause.clone());
        }
        let init_unsat = match solver.solve_with_assumptions() {
            SolveStatus::Sat => false,
            SolveStatus::Unsat => true,
            SolveStatus::Interrupted => bail!("the SAT core exhausted its budget on the input"),
        };
        let mut reduced = Vec::new();
        if !init_unsat {
            solver.simplify();
            solver.set_remove_satisfied(false);
            solver.set_need_model(false);
            // keep, for each clause, its not-yet-assigned part
            for clause in cnf.clauses() {
                let mut residual = Vec::new();
                let mut satisfied = false;
                for &l in clause {
                    match solver.value_lit(l) {
                        Value::True => {
                            satisfied = true;
                            break;
                        }
                        Value::False => {}
                        Value::Undef => residual.push(l),
                    }
                }
                if satisfied {
                    continue;
                }
                residual.sort_unstable();
                residual.dedup();
                if residual.windows(2).any(|w| w[0] == w[1].flip()) {
                    continue; // tautology
                }
                debug_assert!(!residual.is_empty());
                reduced.push(residual);
            }
        }
        let occ = OccurrenceManager::new(reduced, cnf.n_vars());
        let bm = BucketManager::new(cnf.n_vars(), occ.n_clauses(), config.store_mode);
        let heuristic =
            VariableHeuristic::new(config.var_heuristic, config.phase_heuristic, projected);
        let partitioner = Partitioner::from_config(config.partitioner);
        Ok(Self {
            solver,
            occ,
            bm,
            heuristic,
            partitioner,
            init_unsat,
            reverse_polarity: config.reverse_polarity,
            stamp_var: vec![0; cnf.n_vars()],
            stamp: 0,
        })
    }

    /// Restricts the parent priority list to the unassigned variables of the
    /// component.
    pub fn current_priority(&mut self, component: &[Var], priority: &[Var]) -> Vec<Var> {
        self.stamp += 1;
        for &v in component {
            self.stamp_var[v] = self.stamp;
        }
        priority
            .iter()
            .copied()
            .filter(|&v| self.stamp_var[v] == self.stamp && self.solver.value_var(v) == Value::Undef)
            .collect()
    }

    /// Computes the priority list of a decision node: the supplied one, or a
    /// fresh cut set when it is empty and the component is worth partitioning.
    pub fn decision_priority(&mut self, component: &[Var], priority: &[Var]) -> Vec<Var> {
        if priority.is_empty() && component.len() > 10 && component.len() < 5000 {
            if let Some(partitioner) = self.partitioner.as_mut() {
                return partitioner.compute_partition(component, &self.occ);
            }
        }
        priority.to_vec()
    }

    pub fn n_partitioner_calls(&self) -> u64 {
        self.partitioner.as_ref().map_or(0, Partitioner::n_calls)
    }
}
