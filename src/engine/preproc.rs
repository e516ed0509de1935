use crate::sat::{SolveStatus, Solver, Value};
use crate::{CnfFormula, Literal, ProjectedVars, Var};
use anyhow::{bail, Result};
use std::str::FromStr;

/// The bound on `|occurrences(v)| * |occurrences(-v)|` above which a
/// variable is not considered for forgetting.
const FORGET_OCC_LIMIT: usize = 16;

/// The counting-safe preprocessing passes.
///
/// The first three preserve the set of models; forgetting eliminates
/// non-projected variables by resolution, which preserves the projected
/// (weighted) count.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PreprocPass {
    /// Add the literals true in every model as unit clauses.
    Backbone,
    /// Shorten clauses whose prefix is already implied by the rest of the
    /// formula.
    Vivification,
    /// Remove literal occurrences that propagation proves redundant.
    OccElimination,
    /// Eliminate non-projected variables whose resolvent set is no larger
    /// than the clauses it replaces.
    Forget,
}

impl FromStr for PreprocPass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backbone" => Ok(Self::Backbone),
            "vivification" => Ok(Self::Vivification),
            "occElimination" => Ok(Self::OccElimination),
            "forgetting" => Ok(Self::Forget),
            _ => Err(anyhow::anyhow!(r#"unknown preprocessing pass "{s}""#)),
        }
    }
}

/// Parses a `+`-separated preprocessing pipeline, e.g.
/// `backbone+vivification`. The empty string denotes the empty pipeline.
///
/// # Errors
///
/// An error is returned when a pass name is unknown.
pub fn parse_preproc_pipeline(s: &str) -> Result<Vec<PreprocPass>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split('+').map(PreprocPass::from_str).collect()
}

/// The preprocessor: applies a pipeline of counting-safe passes to a CNF
/// formula before handing it to the engine.
pub struct Preproc;

impl Preproc {
    /// Runs the pipeline, rewriting the formula in place. The projection is
    /// only consulted by the forgetting pass, which must not eliminate an
    /// observable variable.
    ///
    /// Returns `false` when a pass proves the formula unsatisfiable; the
    /// formula content is unspecified in this case and the caller reports
    /// the trivial count.
    ///
    /// # Errors
    ///
    /// An error is returned when a SAT call is interrupted.
    pub fn run(
        cnf: &mut CnfFormula,
        projected: &ProjectedVars,
        passes: &[PreprocPass],
    ) -> Result<bool> {
        for pass in passes {
            let state = match pass {
                PreprocPass::Backbone => backbone(cnf)?,
                PreprocPass::Vivification => vivification(cnf)?,
                PreprocPass::OccElimination => occ_elimination(cnf)?,
                PreprocPass::Forget => forgetting(cnf, projected)?,
            };
            if !state {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn solver_from(cnf: &CnfFormula) -> Solver {
    let mut solver = Solver::new();
    for _ in 0..cnf.n_vars() {
        solver.new_var();
    }
    for clause in cnf.clauses() {
        solver.add_clause(clause.clone());
    }
    solver
}

/// Computes the backbone by testing, for each variable of a model, whether
/// the complement literal can be extended to a model too.
fn backbone(cnf: &mut CnfFormula) -> Result<bool> {
    let mut solver = solver_from(cnf);
    match solver.solve_with_assumptions() {
        SolveStatus::Unsat => return Ok(false),
        SolveStatus::Interrupted => bail!("the backbone extraction was interrupted"),
        SolveStatus::Sat => {}
    }
    let model = solver.model().to_vec();
    for v in 0..cnf.n_vars() {
        if solver.value_var(v) != Value::Undef {
            continue; // already a fact
        }
        let l = Literal::from_var(v, model[v] == Value::True);
        solver.set_assumptions(vec![l.flip()]);
        match solver.solve_with_assumptions() {
            SolveStatus::Unsat => {
                solver.set_assumptions(Vec::new());
                solver.add_clause(vec![l]);
            }
            SolveStatus::Sat => {}
            SolveStatus::Interrupted => bail!("the backbone extraction was interrupted"),
        }
    }
    solver.set_assumptions(Vec::new());
    if !solver.is_ok() || solver.propagate().is_some() {
        return Ok(false);
    }
    let clauses = cnf.clauses().to_vec();
    Ok(rebuild(cnf, &solver, &clauses))
}

/// Probes each clause literal by literal: assuming the complement of a
/// prefix either reaches a conflict (the prefix is the whole clause) or
/// forces a later literal (the clause shrinks to the prefix plus it).
fn vivification(cnf: &mut CnfFormula) -> Result<bool> {
    probe_clauses(cnf, |solver, lits| {
        let mut kept = Vec::with_capacity(lits.len());
        let mut dropped = false;
        let mut result = None;
        for &l in lits {
            match solver.value_lit(l) {
                Value::True => {
                    kept.push(l);
                    result = Some(kept.clone());
                    break;
                }
                Value::False => dropped = true,
                Value::Undef => {
                    kept.push(l);
                    solver.new_decision_level();
                    solver.unchecked_enqueue(l.flip(), None);
                    if solver.propagate().is_some() {
                        result = Some(kept.clone());
                        break;
                    }
                }
            }
        }
        solver.cancel_until(0);
        if result.is_none() && dropped {
            result = Some(kept);
        }
        result
    })
}

/// Removes, one at a time, the literals `l` of a clause `c` such that the
/// rest of the formula and the complement of `c \ {l}` force `l` to false.
fn occ_elimination(cnf: &mut CnfFormula) -> Result<bool> {
    probe_clauses(cnf, |solver, lits| {
        let mut kept = lits.to_vec();
        let mut changed = false;
        let mut j = 0;
        while j < kept.len() && kept.len() > 1 {
            solver.new_decision_level();
            let mut subsumed = false;
            let mut conflict = false;
            for (k, &other) in kept.iter().enumerate() {
                if k == j {
                    continue;
                }
                match solver.value_lit(other) {
                    Value::True => {
                        subsumed = true;
                        break;
                    }
                    Value::False => {}
                    Value::Undef => {
                        solver.unchecked_enqueue(other.flip(), None);
                        if solver.propagate().is_some() {
                            conflict = true;
                            break;
                        }
                    }
                }
            }
            let removable = subsumed || conflict || solver.value_lit(kept[j]) == Value::False;
            solver.cancel_until(0);
            if removable {
                kept.remove(j);
                changed = true;
            } else {
                j += 1;
            }
        }
        changed.then_some(kept)
    })
}

/// Forgets non-projected variables: a variable is eliminated by replacing
/// the clauses containing it with their pairwise resolvents, provided the
/// occurrence product stays small and the surviving resolvents are no more
/// numerous than the clauses they replace. Tautological resolvents are
/// dropped, as are resolvents subsumed by another resolvent or by a clause
/// untouched by the elimination; the whole process iterates to fixpoint.
fn forgetting(cnf: &mut CnfFormula, projected: &ProjectedVars) -> Result<bool> {
    let mut solver = solver_from(cnf);
    if !solver.is_ok() || solver.propagate().is_some() {
        return Ok(false);
    }
    let initial = cnf.clauses().to_vec();
    if !rebuild(cnf, &solver, &initial) {
        return Ok(false);
    }
    let mut clauses: Vec<Vec<Literal>> = cnf
        .clauses()
        .iter()
        .map(|c| {
            let mut c = c.clone();
            c.sort_unstable();
            c.dedup();
            c
        })
        .collect();
    let mut forgotten = vec![false; cnf.n_vars()];
    let mut changed = true;
    while changed {
        changed = false;
        for v in 0..cnf.n_vars() {
            if projected.contains(v) || forgotten[v] || solver.value_var(v) != Value::Undef {
                continue;
            }
            let pos_lit = Literal::from_var(v, true);
            let occurrences = |l: Literal, clauses: &[Vec<Literal>]| -> Vec<usize> {
                clauses
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| c.contains(&l).then_some(i))
                    .collect()
            };
            let pos = occurrences(pos_lit, &clauses);
            let neg = occurrences(pos_lit.flip(), &clauses);
            if pos.is_empty() && neg.is_empty() {
                forgotten[v] = true;
                continue;
            }
            if pos.len() * neg.len() > FORGET_OCC_LIMIT {
                continue;
            }
            let Some(resolvents) = resolvents_on(v, &pos, &neg, &clauses) else {
                return Ok(false);
            };
            let mut kept: Vec<Vec<Literal>> = Vec::with_capacity(resolvents.len());
            'resolvent: for (i, r) in resolvents.iter().enumerate() {
                for (j, other) in resolvents.iter().enumerate() {
                    if j != i && subsumes(other, r) {
                        continue 'resolvent;
                    }
                }
                for (k, c) in clauses.iter().enumerate() {
                    if !pos.contains(&k) && !neg.contains(&k) && subsumes(c, r) {
                        continue 'resolvent;
                    }
                }
                kept.push(r.clone());
            }
            if kept.len() > pos.len() + neg.len() {
                continue;
            }
            clauses = clauses
                .into_iter()
                .enumerate()
                .filter_map(|(i, c)| (!pos.contains(&i) && !neg.contains(&i)).then_some(c))
                .collect();
            clauses.extend(kept);
            forgotten[v] = true;
            changed = true;
        }
    }
    cnf.set_clauses(clauses);
    Ok(true)
}

/// The non-tautological resolvents on `v` of the clauses at `pos` × `neg`,
/// deduplicated; `None` stands for a derived empty clause.
fn resolvents_on(
    v: Var,
    pos: &[usize],
    neg: &[usize],
    clauses: &[Vec<Literal>],
) -> Option<Vec<Vec<Literal>>> {
    let mut resolvents = Vec::with_capacity(pos.len() * neg.len());
    for &i in pos {
        for &j in neg {
            let mut r: Vec<Literal> = clauses[i]
                .iter()
                .chain(clauses[j].iter())
                .copied()
                .filter(|l| l.var_index() != v)
                .collect();
            r.sort_unstable();
            r.dedup();
            if r.is_empty() {
                return None;
            }
            if r.windows(2).any(|w| w[0] == w[1].flip()) {
                continue; // tautology
            }
            resolvents.push(r);
        }
    }
    resolvents.sort_unstable();
    resolvents.dedup();
    Some(resolvents)
}

/// Whether the sorted clause `a` subsumes the sorted clause `b`.
fn subsumes(a: &[Literal], b: &[Literal]) -> bool {
    if a.len() > b.len() {
        return false;
    }
    let mut it = b.iter();
    a.iter().all(|l| it.any(|m| m == l))
}

/// Shared driver of the clause-probing passes: detaches each clause, lets
/// the pass inspect it against the rest of the formula, and applies the
/// replacement it proposes.
fn probe_clauses(
    cnf: &mut CnfFormula,
    mut probe: impl FnMut(&mut Solver, &[Literal]) -> Option<Vec<Literal>>,
) -> Result<bool> {
    let mut solver = solver_from(cnf);
    if !solver.is_ok() {
        return Ok(false);
    }
    let mut final_clauses = Vec::new();
    for i in 0..solver.n_original_clauses() {
        let lits = solver.clause_at(i).lits().to_vec();
        if lits
            .iter()
            .any(|l| solver.value_lit(*l) == Value::True)
        {
            continue; // satisfied at level 0, a fact covers it
        }
        solver.detach_clause_at(i);
        match probe(&mut solver, &lits) {
            Some(replacement) => {
                debug_assert!(!replacement.is_empty());
                if !solver.add_clause(replacement.clone()) {
                    return Ok(false);
                }
                final_clauses.push(replacement);
            }
            None => {
                solver.reattach_clause_at(i);
                final_clauses.push(lits);
            }
        }
    }
    if !solver.is_ok() || solver.propagate().is_some() {
        return Ok(false);
    }
    Ok(rebuild(cnf, &solver, &final_clauses))
}

/// Rewrites the formula as the solver's level-0 facts plus the residual
/// parts of the given clauses. Returns `false` when a clause is falsified
/// by the facts, making the formula unsatisfiable.
#[must_use]
fn rebuild(cnf: &mut CnfFormula, solver: &Solver, clauses: &[Vec<Literal>]) -> bool {
    let mut result: Vec<Vec<Literal>> = Vec::new();
    for v in 0..cnf.n_vars() {
        match solver.value_var(v) {
            Value::True => result.push(vec![Literal::from_var(v, true)]),
            Value::False => result.push(vec![Literal::from_var(v, false)]),
            Value::Undef => {}
        }
    }
    for clause in clauses {
        let mut residual = Vec::with_capacity(clause.len());
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
        if !satisfied {
            if residual.is_empty() {
                return false;
            }
            result.push(residual);
        }
    }
    cnf.set_clauses(result);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_literals(cnf: &CnfFormula) -> Vec<Literal> {
        cnf.clauses()
            .iter()
            .filter_map(|c| match c.as_slice() {
                [l] => Some(*l),
                _ => None,
            })
            .collect()
    }

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    fn cnf(n_vars: usize, clauses: &[&[isize]]) -> CnfFormula {
        CnfFormula::from_clauses(n_vars, clauses.iter().map(|c| lits(c)).collect())
    }

    #[test]
    fn test_parse_pipeline() {
        assert!(parse_preproc_pipeline("").unwrap().is_empty());
        assert_eq!(
            vec![PreprocPass::Backbone, PreprocPass::Vivification],
            parse_preproc_pipeline("backbone+vivification").unwrap()
        );
        assert_eq!(
            vec![PreprocPass::Forget],
            parse_preproc_pipeline("forgetting").unwrap()
        );
        assert!(parse_preproc_pipeline("backbone+unknown").is_err());
    }

    #[test]
    fn test_backbone_extracts_forced_literals() {
        // x1 is true in every model
        let mut formula = cnf(2, &[&[1, 2], &[1, -2]]);
        let projected = ProjectedVars::all(2);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::Backbone]).unwrap());
        assert!(unit_literals(&formula).contains(&Literal::from(1)));
    }

    #[test]
    fn test_backbone_detects_unsat() {
        let mut formula = cnf(2, &[&[1, 2], &[1, -2], &[-1, 2], &[-1, -2]]);
        let projected = ProjectedVars::all(2);
        assert!(!Preproc::run(&mut formula, &projected, &[PreprocPass::Backbone]).unwrap());
    }

    #[test]
    fn test_vivification_shortens() {
        // (x1 ∨ x2) subsumes (x1 ∨ x2 ∨ x3): the long clause shrinks
        let mut formula = cnf(3, &[&[1, 2], &[1, 2, 3]]);
        let projected = ProjectedVars::all(3);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::Vivification]).unwrap());
        assert!(formula.clauses().iter().all(|c| c.len() <= 2));
    }

    #[test]
    fn test_occ_elimination_drops_redundant_occurrence() {
        // in (x1 ∨ x2) ∧ (-x1 ∨ x3) ∧ (x2 ∨ x3 ∨ x1), assuming -x2 and -x3
        // forces x1 through the first two clauses… and -x1 as well, so the
        // third clause loses x1
        let mut formula = cnf(3, &[&[1, 2], &[-1, 3], &[2, 3, 1]]);
        let projected = ProjectedVars::all(3);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::OccElimination]).unwrap());
        assert!(formula.clauses().iter().all(|c| c.len() <= 2));
    }

    #[test]
    fn test_subsumes_on_sorted_clauses() {
        assert!(subsumes(&lits(&[1, 3]), &lits(&[1, 2, 3])));
        assert!(subsumes(&lits(&[2]), &lits(&[2])));
        assert!(!subsumes(&lits(&[1, 2, 3]), &lits(&[1, 3])));
        assert!(!subsumes(&lits(&[-1]), &lits(&[1, 2])));
    }

    #[test]
    fn test_forgetting_eliminates_a_chained_variable() {
        // x2 is not observed: (x1 ∨ x2) ∧ (-x2 ∨ x3) resolves to (x1 ∨ x3)
        let mut formula = cnf(3, &[&[1, 2], &[-2, 3]]);
        let projected = ProjectedVars::from_vars(3, &[0, 2]);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::Forget]).unwrap());
        assert_eq!(1, formula.clauses().len());
        assert!(formula
            .clauses()
            .iter()
            .all(|c| c.iter().all(|l| l.var_index() != 1)));
    }

    #[test]
    fn test_forgetting_keeps_projected_variables() {
        let mut formula = cnf(3, &[&[1, 2], &[-2, 3]]);
        let projected = ProjectedVars::all(3);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::Forget]).unwrap());
        assert_eq!(2, formula.clauses().len());
    }

    #[test]
    fn test_forgetting_preserves_the_projected_count() {
        use crate::{EngineConfig, ModelCounter, Weights};
        let clauses: &[&[isize]] = &[&[1, 2, 3], &[-2, 4], &[-3, -4], &[1, -2]];
        let projected = ProjectedVars::from_vars(4, &[0, 3]);
        let count = |formula: &CnfFormula| -> rug::Integer {
            ModelCounter::new(
                formula,
                Weights::new(formula.n_vars()),
                projected.clone(),
                &EngineConfig::default(),
            )
            .unwrap()
            .count()
            .unwrap()
        };
        let reference = count(&cnf(4, clauses));
        let mut formula = cnf(4, clauses);
        assert!(Preproc::run(&mut formula, &projected, &[PreprocPass::Forget]).unwrap());
        assert_eq!(reference, count(&formula));
    }

    #[test]
    fn test_pipeline_preserves_models() {
        use crate::{EngineConfig, ModelCounter, ProjectedVars, Weights};
        let clauses: &[&[isize]] = &[&[1, 2, 3], &[-1, 2], &[-2, 3], &[1, -3, 2]];
        let count = |formula: &CnfFormula| -> rug::Integer {
            ModelCounter::new(
                formula,
                Weights::new(formula.n_vars()),
                ProjectedVars::all(formula.n_vars()),
                &EngineConfig::default(),
            )
            .unwrap()
            .count()
            .unwrap()
        };
        let reference = count(&cnf(3, clauses));
        for passes in [
            vec![PreprocPass::Backbone],
            vec![PreprocPass::Vivification],
            vec![PreprocPass::OccElimination],
            vec![
                PreprocPass::Backbone,
                PreprocPass::Vivification,
                PreprocPass::OccElimination,
            ],
        ] {
            let mut formula = cnf(3, clauses);
            let projected = ProjectedVars::all(3);
            assert!(Preproc::run(&mut formula, &projected, &passes).unwrap());
            assert_eq!(reference, count(&formula));
        }
    }
}
