use super::graph::{Branch, DecisionDnnf, Node};
use crate::sat::Value;
use crate::{Literal, Num, ProjectedVars, Var, Weights};

/// Everything a graph operation needs besides the graph itself: the weight
/// table, the projection, the float precision and the conditioning values.
///
/// Consolidating this state in one value keeps the graph immutable across
/// operations; conditioning a query mutates only the context.
pub struct EvaluationContext<'a> {
    weights: &'a Weights,
    projected: &'a ProjectedVars,
    precision: u32,
    fixed: Vec<Value>,
}

impl<'a> EvaluationContext<'a> {
    /// Builds a context with no conditioning.
    #[must_use]
    pub fn new(
        weights: &'a Weights,
        projected: &'a ProjectedVars,
        precision: u32,
        n_vars: usize,
    ) -> Self {
        Self {
            weights,
            projected,
            precision,
            fixed: vec![Value::Undef; n_vars],
        }
    }

    /// Forces the given literals to true for the next operations.
    pub fn condition(&mut self, lits: &[Literal]) {
        for l in lits {
            self.fixed[l.var_index()] = Value::from_polarity(l.polarity());
        }
    }

    /// Releases the conditioning of the given literals.
    pub fn release(&mut self, lits: &[Literal]) {
        for l in lits {
            self.fixed[l.var_index()] = Value::Undef;
        }
    }

    fn fixed_value(&self, v: Var) -> Value {
        self.fixed[v]
    }
}

impl DecisionDnnf {
    /// Counts the models of the compiled formula, weighted and restricted to
    /// the projected variables, under the context's conditioning.
    ///
    /// The count runs in time linear in the size of the graph.
    #[must_use]
    pub fn count_models<T: Num>(&self, ctx: &EvaluationContext) -> T {
        let mut memo: Vec<Option<T>> = vec![None; self.n_nodes()];
        self.branch_count(self.root(), ctx, &mut memo)
    }

    /// Counts the models with the given literals conditioned to true.
    #[must_use]
    pub fn count_models_under<T: Num>(
        &self,
        ctx: &mut EvaluationContext,
        lits: &[Literal],
    ) -> T {
        ctx.condition(lits);
        let count = self.count_models(ctx);
        ctx.release(lits);
        count
    }

    /// Decides whether the compiled formula is satisfiable under the
    /// context's conditioning.
    #[must_use]
    pub fn is_sat(&self, ctx: &EvaluationContext) -> bool {
        let mut memo: Vec<Option<bool>> = vec![None; self.n_nodes()];
        self.branch_sat(self.root(), ctx, &mut memo)
    }

    /// Decides satisfiability with the given literals conditioned to true.
    #[must_use]
    pub fn is_sat_under(&self, ctx: &mut EvaluationContext, lits: &[Literal]) -> bool {
        ctx.condition(lits);
        let sat = self.is_sat(ctx);
        ctx.release(lits);
        sat
    }

    fn branch_count<T: Num>(
        &self,
        b: Branch,
        ctx: &EvaluationContext,
        memo: &mut Vec<Option<T>>,
    ) -> T {
        let mut value = T::one(ctx.precision);
        for &l in self.units_from(b.units) {
            let fixed = ctx.fixed_value(l.var_index());
            if fixed != Value::Undef && fixed != Value::from_polarity(l.polarity()) {
                return T::zero(ctx.precision);
            }
            if ctx.projected.contains(l.var_index()) {
                value.mul_assign(&T::from_weight(ctx.weights.weight(l), ctx.precision));
            }
        }
        value.mul_assign(&self.node_count(b.target, ctx, memo));
        for &v in self.free_vars_from(b.free_vars) {
            if !ctx.projected.contains(v) {
                continue;
            }
            let weight = match ctx.fixed_value(v) {
                Value::Undef => ctx.weights.var_weight(v),
                Value::True => ctx.weights.weight(Literal::from_var(v, true)),
                Value::False => ctx.weights.weight(Literal::from_var(v, false)),
            };
            value.mul_assign(&T::from_weight(weight, ctx.precision));
        }
        value
    }

    fn node_count<T: Num>(
        &self,
        idx: usize,
        ctx: &EvaluationContext,
        memo: &mut Vec<Option<T>>,
    ) -> T {
        if let Some(v) = &memo[idx] {
            return v.clone();
        }
        let value = match self.node(idx) {
            Node::False => T::zero(ctx.precision),
            Node::True => T::one(ctx.precision),
            Node::Unary(b) => self.branch_count(*b, ctx, memo),
            Node::Decision(pos, neg) => {
                let mut v = self.branch_count(*pos, ctx, memo);
                v.add_assign(&self.branch_count(*neg, ctx, memo));
                v
            }
            Node::And(children) => {
                let mut v = T::one(ctx.precision);
                for &child in children {
                    v.mul_assign(&self.node_count(child, ctx, memo));
                }
                v
            }
        };
        memo[idx] = Some(value.clone());
        value
    }

    fn branch_sat(
        &self,
        b: Branch,
        ctx: &EvaluationContext,
        memo: &mut Vec<Option<bool>>,
    ) -> bool {
        for &l in self.units_from(b.units) {
            let fixed = ctx.fixed_value(l.var_index());
            if fixed != Value::Undef && fixed != Value::from_polarity(l.polarity()) {
                return false;
            }
        }
        self.node_sat(b.target, ctx, memo)
    }

    fn node_sat(&self, idx: usize, ctx: &EvaluationContext, memo: &mut Vec<Option<bool>>) -> bool {
        if let Some(v) = memo[idx] {
            return v;
        }
        let value = match self.node(idx) {
            Node::False => false,
            Node::True => true,
            Node::Unary(b) => self.branch_sat(*b, ctx, memo),
            Node::Decision(pos, neg) => {
                self.branch_sat(*pos, ctx, memo) || self.branch_sat(*neg, ctx, memo)
            }
            Node::And(children) => {
                let mut sat = true;
                for &child in children {
                    if !self.node_sat(child, ctx, memo) {
                        sat = false;
                        break;
                    }
                }
                sat
            }
        };
        memo[idx] = Some(value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::TRUE_NODE;
    use rug::Integer;

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    /// A decision on variable 1 with a free variable 2 on the positive side.
    fn single_decision_dag() -> DecisionDnnf {
        let mut dag = DecisionDnnf::new(2);
        let pos = dag.make_branch(TRUE_NODE, &lits(&[1]), &[1], false);
        let neg = dag.make_branch(TRUE_NODE, &lits(&[-1, -2]), &[], false);
        let d = dag.add_decision(pos, neg, None);
        let root = dag.make_branch(d, &[], &[], false);
        dag.set_root(root, Vec::new());
        dag
    }

    #[test]
    fn test_unweighted_count() {
        let dag = single_decision_dag();
        let weights = Weights::new(2);
        let projected = ProjectedVars::all(2);
        let ctx = EvaluationContext::new(&weights, &projected, 0, 2);
        assert_eq!(Integer::from(3), dag.count_models::<Integer>(&ctx));
    }

    #[test]
    fn test_conditioned_count() {
        let dag = single_decision_dag();
        let weights = Weights::new(2);
        let projected = ProjectedVars::all(2);
        let mut ctx = EvaluationContext::new(&weights, &projected, 0, 2);
        assert_eq!(
            Integer::from(2),
            dag.count_models_under::<Integer>(&mut ctx, &lits(&[1]))
        );
        assert_eq!(
            Integer::from(1),
            dag.count_models_under::<Integer>(&mut ctx, &lits(&[-1]))
        );
        // conditioning is released after the call
        assert_eq!(Integer::from(3), dag.count_models::<Integer>(&ctx));
    }

    #[test]
    fn test_projected_count() {
        let dag = single_decision_dag();
        let weights = Weights::new(2);
        let projected = ProjectedVars::from_vars(2, &[0]);
        let ctx = EvaluationContext::new(&weights, &projected, 0, 2);
        assert_eq!(Integer::from(2), dag.count_models::<Integer>(&ctx));
    }

    #[test]
    fn test_sat_under_conditioning() {
        let dag = single_decision_dag();
        let weights = Weights::new(2);
        let projected = ProjectedVars::all(2);
        let mut ctx = EvaluationContext::new(&weights, &projected, 0, 2);
        assert!(dag.is_sat(&ctx));
        assert!(dag.is_sat_under(&mut ctx, &lits(&[1, 2])));
        assert!(dag.is_sat_under(&mut ctx, &lits(&[-1, -2])));
        assert!(!dag.is_sat_under(&mut ctx, &lits(&[-1, 2])));
    }

    #[test]
    fn test_false_root() {
        let mut dag = DecisionDnnf::new(1);
        let root = dag.make_branch(super::super::graph::FALSE_NODE, &[], &[], false);
        dag.set_root(root, Vec::new());
        let weights = Weights::new(1);
        let projected = ProjectedVars::all(1);
        let ctx = EvaluationContext::new(&weights, &projected, 0, 1);
        assert_eq!(Integer::from(0), dag.count_models::<Integer>(&ctx));
        assert!(!dag.is_sat(&ctx));
    }
}
