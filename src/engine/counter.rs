use super::base::{BranchData, SearchCore};
use super::stats::EngineStats;
use super::EngineConfig;
use crate::cache::{ComponentCache, Lookup};
use crate::core::process_memory_mb;
use crate::sat::SolveStatus;
use crate::{CnfFormula, Literal, Num, ProjectedVars, Var, Weights};
use anyhow::{bail, Result};

/// The weighted model counter.
///
/// Structurally the same recursion as the compiler, but emitting numbers: a
/// decomposable conjunction multiplies, a decision adds its two branches,
/// and each branch is weighted by its projected unit literals and free
/// variables.
///
/// # Example
///
/// ```
/// use sharpdnnf_rs::{
///     DimacsReader, EngineConfig, ModelCounter, ProjectedVars, Weights,
/// };
///
/// fn count(dimacs: &str) -> anyhow::Result<rug::Integer> {
///     let cnf = DimacsReader::default().read(dimacs.as_bytes())?;
///     let weights = Weights::new(cnf.n_vars());
///     let projected = ProjectedVars::all(cnf.n_vars());
///     let mut counter =
///         ModelCounter::new(&cnf, weights, projected, &EngineConfig::default())?;
///     counter.count()
/// }
/// # assert_eq!(3, count("p cnf 2 1\n1 2 0\n").unwrap());
/// ```
pub struct ModelCounter<T: Num> {
    core: SearchCore,
    cache: ComponentCache<T>,
    stats: EngineStats,
    weights: Weights,
    precision: u32,
}

impl<T: Num> ModelCounter<T> {
    /// Builds a counter for the given formula, weights and projection.
    ///
    /// # Errors
    ///
    /// An error is returned if the initial satisfiability call is interrupted.
    pub fn new(
        cnf: &CnfFormula,
        weights: Weights,
        projected: ProjectedVars,
        config: &EngineConfig,
    ) -> Result<Self> {
        let core = SearchCore::new(cnf, projected, config, None)?;
        Ok(Self {
            core,
            cache: ComponentCache::new(config.cache, cnf.n_vars()),
            stats: EngineStats::new(),
            weights,
            precision: config.precision,
        })
    }

    /// Computes the weighted number of models, restricted to the projected
    /// variables.
    ///
    /// # Errors
    ///
    /// An error is returned when a SAT-core budget is exhausted or the
    /// interrupt flag is raised; no partial result is available then.
    pub fn count(&mut self) -> Result<T> {
        if self.core.init_unsat {
            return Ok(T::zero(self.precision));
        }
        let vars: Vec<Var> = (0..self.core.occ.n_vars()).collect();
        let mut data = BranchData::default();
        let mut count = self.count_rec(&vars, &[], &mut data)?;
        count.mul_assign(&self.weight_units_free(&data.units, &data.free_vars));
        self.log_final_stats();
        Ok(count)
    }

    fn count_rec(&mut self, vars: &[Var], priority: &[Var], out: &mut BranchData) -> Result<T> {
        if self.stats.on_call() {
            self.log_progress();
        }
        self.core.solver.set_decision_scope(vars);
        match self.core.solver.solve_with_assumptions() {
            SolveStatus::Interrupted => {
                bail!("the SAT core exhausted its budget; the count cannot be resumed")
            }
            SolveStatus::Unsat => return Ok(T::zero(self.precision)),
            SolveStatus::Sat => {}
        }
        out.units = self.core.solver.collect_units(vars);
        self.core.occ.pre_update(&out.units);
        let result = self.count_components(vars, priority, out);
        self.core.occ.post_update(&out.units);
        result
    }

    fn count_components(
        &mut self,
        vars: &[Var],
        priority: &[Var],
        out: &mut BranchData,
    ) -> Result<T> {
        let split = self.core.occ.compute_components(vars);
        out.free_vars = split.free_vars;
        let mut count = T::one(self.precision);
        if split.components.len() > 1 {
            self.stats.n_split += split.components.len() as u64;
        }
        for component in &split.components {
            self.core.occ.update_current_clause_set(component);
            let result = self.count_component(component, priority);
            self.core.occ.pop_previous_clause_set();
            count.mul_assign(&result?);
            if count.is_zero() {
                break;
            }
        }
        Ok(count)
    }

    fn count_component(&mut self, component: &[Var], priority: &[Var]) -> Result<T> {
        if self.cache.wants(component.len()) {
            let key = self.core.bm.build_key(component, &self.core.occ);
            match self.cache.search(key, &mut self.core.bm) {
                Lookup::Hit(count) => Ok(count),
                Lookup::Miss(handle) => {
                    let current = self.core.current_priority(component, priority);
                    let count = self.count_decision_node(component, &current)?;
                    self.cache.insert(handle, count.clone(), &mut self.core.bm);
                    Ok(count)
                }
            }
        } else {
            let current = self.core.current_priority(component, priority);
            self.count_decision_node(component, &current)
        }
    }

    fn count_decision_node(&mut self, component: &[Var], priority: &[Var]) -> Result<T> {
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
            // every projected variable of the component is decided
            return Ok(T::one(self.precision));
        };
        self.stats.n_decisions += 1;
        let positive = self
            .core
            .heuristic
            .select_phase(v, &self.core.solver, &self.core.occ)
            != self.core.reverse_polarity;
        let l = Literal::from_var(v, positive);

        self.core.solver.push_assumption(l);
        let mut pos_data = BranchData::default();
        let pos = self.count_rec(component, &priority, &mut pos_data);
        self.core.solver.pop_assumption();
        self.core.solver.cancel_to_assumptions();
        let mut pos = pos?;
        pos.mul_assign(&self.weight_units_free(&pos_data.units, &pos_data.free_vars));

        self.core.solver.push_assumption(l.flip());
        let mut neg_data = BranchData::default();
        let neg = self.count_rec(component, &priority, &mut neg_data);
        self.core.solver.pop_assumption();
        self.core.solver.cancel_to_assumptions();
        let mut neg = neg?;
        neg.mul_assign(&self.weight_units_free(&neg_data.units, &neg_data.free_vars));

        pos.add_assign(&neg);
        Ok(pos)
    }

    /// The weight factor of a branch: the weights of its projected unit
    /// literals times, for each projected free variable, the sum of the
    /// weights of its two phases.
    fn weight_units_free(&self, units: &[Literal], free_vars: &[Var]) -> T {
        let mut weight = T::one(self.precision);
        for &l in units {
            if self.core.heuristic.is_projected(l.var_index()) {
                weight.mul_assign(&T::from_weight(self.weights.weight(l), self.precision));
            }
        }
        for &v in free_vars {
            if self.core.heuristic.is_projected(v) {
                weight.mul_assign(&T::from_weight(self.weights.var_weight(v), self.precision));
            }
        }
        weight
    }

    fn log_progress(&self) {
        log::info!(
            "#call {} | time {:.2} | #posHit {} | #negHit {} | #split {} | mem(MB) {} | #decisions {} | #partitioner {}",
            self.stats.n_calls,
            self.stats.elapsed_secs(),
            self.cache.n_positive_hits(),
            self.cache.n_negative_hits(),
            self.stats.n_split,
            process_memory_mb(),
            self.stats.n_decisions,
            self.core.n_partitioner_calls(),
        );
    }

    fn log_final_stats(&self) {
        log::info!("Number of recursive calls: {}", self.stats.n_calls);
        log::info!("Number of split formulas: {}", self.stats.n_split);
        log::info!("Number of decisions: {}", self.stats.n_decisions);
        log::info!(
            "Number of partitioner calls: {}",
            self.core.n_partitioner_calls()
        );
        self.cache.log_final_stats();
        log::info!("Final time: {:.3}", self.stats.elapsed_secs());
    }
}
