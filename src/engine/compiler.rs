use super::base::{BranchData, SearchCore};
use super::stats::EngineStats;
use super::EngineConfig;
use crate::cache::{ComponentCache, Lookup};
use crate::core::process_memory_mb;
use crate::dag::{DecisionDnnf, NodeIndex, FALSE_NODE, TRUE_NODE};
use crate::sat::SolveStatus;
use crate::{CnfFormula, Literal, ProjectedVars, Var};
use anyhow::{bail, Result};
use std::io::Write;

/// The top-down Decision-DNNF compiler.
///
/// The compiler runs an exhaustive DPLL search with component caching: each
/// recursive step propagates the current assumptions, splits the residual
/// formula into connected components, looks every component up in the cache
/// and builds a decision node for the missing ones, branching on a variable
/// chosen by the configured heuristics.
///
/// # Example
///
/// ```
/// use sharpdnnf_rs::{
///     Compiler, DimacsReader, EngineConfig, EvaluationContext, ProjectedVars, Weights,
/// };
///
/// fn compile_and_count(dimacs: &str) -> anyhow::Result<rug::Integer> {
///     let cnf = DimacsReader::default().read(dimacs.as_bytes())?;
///     let weights = Weights::new(cnf.n_vars());
///     let projected = ProjectedVars::all(cnf.n_vars());
///     let compiler = Compiler::new(&cnf, projected.clone(), &EngineConfig::default())?;
///     let ddnnf = compiler.compile()?;
///     let ctx = EvaluationContext::new(&weights, &projected, 128, ddnnf.n_vars());
///     Ok(ddnnf.count_models(&ctx))
/// }
/// # assert_eq!(2, compile_and_count("p cnf 1 0\n").unwrap());
/// ```
pub struct Compiler {
    core: SearchCore,
    cache: ComponentCache<NodeIndex>,
    dag: DecisionDnnf,
    stats: EngineStats,
    certified: bool,
}

impl Compiler {
    /// Builds a compiler for the given formula and projection.
    ///
    /// # Errors
    ///
    /// An error is returned if the initial satisfiability call is interrupted.
    pub fn new(cnf: &CnfFormula, projected: ProjectedVars, config: &EngineConfig) -> Result<Self> {
        Self::build(cnf, projected, config, None)
    }

    /// Builds a compiler that also emits a resolution trace; the compiled
    /// graph is then meant to be written in the certified format.
    ///
    /// # Errors
    ///
    /// An error is returned if the initial satisfiability call is interrupted.
    pub fn with_trace(
        cnf: &CnfFormula,
        projected: ProjectedVars,
        config: &EngineConfig,
        trace: Box<dyn Write>,
    ) -> Result<Self> {
        Self::build(cnf, projected, config, Some(trace))
    }

    fn build(
        cnf: &CnfFormula,
        projected: ProjectedVars,
        config: &EngineConfig,
        trace: Option<Box<dyn Write>>,
    ) -> Result<Self> {
        let certified = trace.is_some();
        let core = SearchCore::new(cnf, projected, config, trace)?;
        Ok(Self {
            core,
            cache: ComponentCache::new(config.cache, cnf.n_vars()),
            dag: DecisionDnnf::new(cnf.n_vars()),
            stats: EngineStats::new(),
            certified,
        })
    }

    /// Compiles the formula and returns the graph.
    ///
    /// # Errors
    ///
    /// An error is returned when a SAT-core budget is exhausted or the
    /// interrupt flag is raised; no partial result is available then.
    pub fn compile(mut self) -> Result<DecisionDnnf> {
        if self.core.init_unsat {
            let units: Vec<Literal> = self.core.solver.trail().to_vec();
            let reasons = self
                .core
                .solver
                .final_trace_index()
                .into_iter()
                .collect::<Vec<_>>();
            let root = self.dag.make_branch(FALSE_NODE, &units, &[], false);
            self.dag.set_root(root, reasons);
            return Ok(self.dag);
        }
        let vars: Vec<Var> = (0..self.dag.n_vars()).collect();
        let mut data = BranchData::default();
        let mut reasons = Vec::new();
        let (node, from_cache) = self.compile_rec(&vars, &[], None, &mut data, &mut reasons)?;
        let root = self
            .dag
            .make_branch(node, &data.units, &data.free_vars, from_cache);
        self.dag.set_root(root, reasons);
        self.log_final_stats();
        Ok(self.dag)
    }

    fn compile_rec(
        &mut self,
        vars: &[Var],
        priority: &[Var],
        dec: Option<Literal>,
        out: &mut BranchData,
        reasons: &mut Vec<usize>,
    ) -> Result<(NodeIndex, bool)> {
        if self.stats.on_call() {
            self.log_progress();
        }
        self.core.solver.set_decision_scope(vars);
        match self.core.solver.solve_with_assumptions() {
            SolveStatus::Interrupted => bail!("the SAT core exhausted its budget; the compilation cannot be resumed"),
            SolveStatus::Unsat => {
                if let Some(l) = dec {
                    out.units.push(l);
                }
                if self.certified {
                    if let Some(i) = self.core.solver.final_trace_index() {
                        reasons.push(i);
                    }
                }
                return Ok((FALSE_NODE, false));
            }
            SolveStatus::Sat => {}
        }
        out.units = self.core.solver.collect_units(vars);
        self.core.occ.pre_update(&out.units);
        let result = self.compile_components(vars, priority, out);
        self.core.occ.post_update(&out.units);
        let (node, from_cache) = result?;
        if self.certified {
            for &v in vars {
                if let Some(i) = self.core.solver.reason_trace_index(v) {
                    reasons.push(i);
                }
            }
        }
        Ok((node, from_cache))
    }

    fn compile_components(
        &mut self,
        vars: &[Var],
        priority: &[Var],
        out: &mut BranchData,
    ) -> Result<(NodeIndex, bool)> {
        let split = self.core.occ.compute_components(vars);
        out.free_vars = split.free_vars;
        if split.components.is_empty() {
            // a tautology modulo the collected unit literals
            return Ok((TRUE_NODE, false));
        }
        let mut children = Vec::with_capacity(split.components.len());
        let mut from_cache = Vec::with_capacity(split.components.len());
        for component in &split.components {
            self.core.occ.update_current_clause_set(component);
            let result = self.compile_component(component, priority);
            self.core.occ.pop_previous_clause_set();
            let (node, cached) = result?;
            children.push(node);
            from_cache.push(cached);
        }
        if children.len() == 1 {
            return Ok((children[0], from_cache[0]));
        }
        self.stats.n_split += children.len() as u64;
        let flags = self.certified.then_some(from_cache);
        Ok((self.dag.add_and(children, flags), false))
    }

    fn compile_component(
        &mut self,
        component: &[Var],
        priority: &[Var],
    ) -> Result<(NodeIndex, bool)> {
        if self.cache.wants(component.len()) {
            let key = self.core.bm.build_key(component, &self.core.occ);
            match self.cache.search(key, &mut self.core.bm) {
                Lookup::Hit(node) => Ok((node, true)),
                Lookup::Miss(handle) => {
                    let current = self.core.current_priority(component, priority);
                    let node = self.compile_decision_node(component, &current)?;
                    self.cache.insert(handle, node, &mut self.core.bm);
                    Ok((node, false))
                }
            }
        } else {
            let current = self.core.current_priority(component, priority);
            Ok((self.compile_decision_node(component, &current)?, false))
        }
    }

    fn compile_decision_node(
        &mut self,
        component: &[Var],
        priority: &[Var],
    ) -> Result<NodeIndex> {
        let priority = self.core.decision_priority(component, priority);
        let candidates: &[Var] = if priority.is_empty() {
            component
        } else {
            &priority
        };
        let mut selected = self
            .core
            .heuristic
            .select_variable(candidates, &self.core.solver, &self.core.occ);
        if selected.is_none() && !priority.is_empty() {
            // the cut set may hold no projected variable while the component does
            selected = self
                .core
                .heuristic
                .select_variable(component, &self.core.solver, &self.core.occ);
        }
        let Some(v) = selected else {
            return Ok(self.true_leaf(component));
        };
        self.stats.n_decisions += 1;
        let positive = self
            .core
            .heuristic
            .select_phase(v, &self.core.solver, &self.core.occ)
            != self.core.reverse_polarity;
        let l = Literal::from_var(v, positive);
        let mut reasons = Vec::new();

        self.core.solver.push_assumption(l);
        let mut pos_data = BranchData::default();
        let pos = self.compile_rec(component, &priority, Some(l), &mut pos_data, &mut reasons);
        self.core.solver.pop_assumption();
        self.core.solver.cancel_to_assumptions();
        let (pos_node, pos_cached) = pos?;

        self.core.solver.push_assumption(l.flip());
        let mut neg_data = BranchData::default();
        let neg = self.compile_rec(
            component,
            &priority,
            Some(l.flip()),
            &mut neg_data,
            &mut reasons,
        );
        self.core.solver.pop_assumption();
        self.core.solver.cancel_to_assumptions();
        let (neg_node, neg_cached) = neg?;

        let pos_branch =
            self.dag
                .make_branch(pos_node, &pos_data.units, &pos_data.free_vars, pos_cached);
        let neg_branch =
            self.dag
                .make_branch(neg_node, &neg_data.units, &neg_data.free_vars, neg_cached);
        Ok(self
            .dag
            .add_decision(pos_branch, neg_branch, self.certified.then_some(reasons)))
    }

    /// The leaf reached when no projected variable is left to decide.
    fn true_leaf(&mut self, component: &[Var]) -> NodeIndex {
        let units = self.core.solver.collect_units(component);
        if units.is_empty() {
            TRUE_NODE
        } else {
            let branch = self.dag.make_branch(TRUE_NODE, &units, &[], false);
            self.dag.add_unary(branch)
        }
    }

    fn log_progress(&self) {
        log::info!(
            "#compile {} | time {:.2} | #posHit {} | #negHit {} | #split {} | mem(MB) {} | #nodes {} | #edges {} | #decisions {} | #partitioner {}",
            self.stats.n_calls,
            self.stats.elapsed_secs(),
            self.cache.n_positive_hits(),
            self.cache.n_negative_hits(),
            self.stats.n_split,
            process_memory_mb(),
            self.dag.n_nodes(),
            self.dag.n_edges(),
            self.stats.n_decisions,
            self.core.n_partitioner_calls(),
        );
    }

    fn log_final_stats(&self) {
        log::info!("Number of compiled nodes: {}", self.stats.n_calls);
        log::info!("Number of split formulas: {}", self.stats.n_split);
        log::info!("Number of decision nodes: {}", self.stats.n_decisions);
        log::info!(
            "Number of partitioner calls: {}",
            self.core.n_partitioner_calls()
        );
        log::info!("Number of nodes: {}", self.dag.n_nodes());
        log::info!("Number of edges: {}", self.dag.n_edges());
        self.cache.log_final_stats();
        log::info!("Final time: {:.3}", self.stats.elapsed_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::EvaluationContext;
    use crate::Weights;
    use rug::Integer;

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    fn cnf(n_vars: usize, clauses: &[&[isize]]) -> CnfFormula {
        CnfFormula::from_clauses(n_vars, clauses.iter().map(|c| lits(c)).collect())
    }

    fn compile(cnf: &CnfFormula) -> DecisionDnnf {
        Compiler::new(cnf, ProjectedVars::all(cnf.n_vars()), &EngineConfig::default())
            .unwrap()
            .compile()
            .unwrap()
    }

    fn count(ddnnf: &DecisionDnnf) -> Integer {
        let weights = Weights::new(ddnnf.n_vars());
        let projected = ProjectedVars::all(ddnnf.n_vars());
        let ctx = EvaluationContext::new(&weights, &projected, 0, ddnnf.n_vars());
        ddnnf.count_models(&ctx)
    }

    #[test]
    fn test_compile_empty_formula() {
        let ddnnf = compile(&cnf(2, &[]));
        assert_eq!(Integer::from(4), count(&ddnnf));
    }

    #[test]
    fn test_compile_single_clause() {
        let ddnnf = compile(&cnf(2, &[&[1, 2]]));
        assert_eq!(Integer::from(3), count(&ddnnf));
    }

    #[test]
    fn test_compile_unsat() {
        let ddnnf = compile(&cnf(1, &[&[1], &[-1]]));
        assert_eq!(Integer::from(0), count(&ddnnf));
        assert!(matches!(
            ddnnf.node(ddnnf.root().target),
            crate::dag::Node::False
        ));
    }

    #[test]
    fn test_compile_two_chains() {
        let ddnnf = compile(&cnf(3, &[&[1, 2], &[-1, 3]]));
        assert_eq!(Integer::from(4), count(&ddnnf));
    }

    #[test]
    fn test_compile_disjoint_components() {
        let ddnnf = compile(&cnf(4, &[&[1, 2], &[3, 4]]));
        assert_eq!(Integer::from(9), count(&ddnnf));
    }

    #[test]
    fn test_projected_compilation() {
        let formula = cnf(3, &[&[1, 2, 3]]);
        let ddnnf = Compiler::new(
            &formula,
            ProjectedVars::from_vars(3, &[0]),
            &EngineConfig::default(),
        )
        .unwrap()
        .compile()
        .unwrap();
        let weights = Weights::new(3);
        let projected = ProjectedVars::from_vars(3, &[0]);
        let ctx = EvaluationContext::new(&weights, &projected, 0, 3);
        assert_eq!(Integer::from(2), ddnnf.count_models::<Integer>(&ctx));
    }
}
