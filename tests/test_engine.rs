//! Library-level tests of the counting and compilation engines: the
//! end-to-end scenarios, agreement between the two drivers, and randomized
//! properties checked against brute-force enumeration.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rug::Integer;
use sharpdnnf_rs::{
    CacheMode, CacheSettings, CnfFormula, Compiler, EngineConfig, EvaluationContext, Literal,
    ModelCounter, PartitionerConfig, PartitionerKind, PhaseHeuristicKind, ProjectedVars,
    ReductionStrategy, VariableHeuristicKind, Weights,
};

fn lits(dimacs: &[isize]) -> Vec<Literal> {
    dimacs.iter().map(|n| Literal::from(*n)).collect()
}

fn cnf(n_vars: usize, clauses: &[&[isize]]) -> CnfFormula {
    CnfFormula::from_clauses(n_vars, clauses.iter().map(|c| lits(c)).collect())
}

fn count(formula: &CnfFormula, config: &EngineConfig) -> Integer {
    ModelCounter::new(
        formula,
        Weights::new(formula.n_vars()),
        ProjectedVars::all(formula.n_vars()),
        config,
    )
    .unwrap()
    .count()
    .unwrap()
}

fn compile(formula: &CnfFormula, config: &EngineConfig) -> sharpdnnf_rs::DecisionDnnf {
    Compiler::new(formula, ProjectedVars::all(formula.n_vars()), config)
        .unwrap()
        .compile()
        .unwrap()
}

fn brute_force(formula: &CnfFormula) -> u64 {
    let n = formula.n_vars();
    let mut count = 0;
    for assignment in 0u64..(1 << n) {
        let satisfied = formula.clauses().iter().all(|clause| {
            clause.iter().any(|l| {
                let bit = assignment >> l.var_index() & 1 == 1;
                bit == l.polarity()
            })
        });
        if satisfied {
            count += 1;
        }
    }
    count
}

fn random_cnf(rng: &mut Pcg64, n_vars: usize, n_clauses: usize) -> CnfFormula {
    let mut clauses = Vec::with_capacity(n_clauses);
    for _ in 0..n_clauses {
        let len = rng.gen_range(1..=3);
        let mut clause = Vec::with_capacity(len);
        for _ in 0..len {
            let v = rng.gen_range(0..n_vars);
            clause.push(Literal::from_var(v, rng.gen_bool(0.5)));
        }
        clauses.push(clause);
    }
    CnfFormula::from_clauses(n_vars, clauses)
}

#[test]
fn test_scenario_chain() {
    // (x1 ∨ x2) ∧ (¬x1 ∨ x3): models 010 011 101 111
    let formula = cnf(3, &[&[1, 2], &[-1, 3]]);
    assert_eq!(Integer::from(4), count(&formula, &EngineConfig::default()));
}

#[test]
fn test_scenario_unsat() {
    let formula = cnf(1, &[&[1], &[-1]]);
    assert_eq!(Integer::from(0), count(&formula, &EngineConfig::default()));
    let ddnnf = compile(&formula, &EngineConfig::default());
    assert!(matches!(
        ddnnf.node(ddnnf.root().target),
        sharpdnnf_rs::Node::False
    ));
}

#[test]
fn test_scenario_decomposition() {
    let formula = cnf(4, &[&[1, 2], &[3, 4]]);
    assert_eq!(Integer::from(9), count(&formula, &EngineConfig::default()));
    let ddnnf = compile(&formula, &EngineConfig::default());
    // the root reaches a decomposable AND of the two components
    let mut target = ddnnf.root().target;
    while let sharpdnnf_rs::Node::Unary(b) = ddnnf.node(target) {
        target = b.target;
    }
    assert!(matches!(ddnnf.node(target), sharpdnnf_rs::Node::And(_)));
}

#[test]
fn test_scenario_weighted_matches_brute_force() {
    // w(x1) = 0.4, w(¬x1) = 0.6, others 0.5
    let formula = cnf(3, &[&[1, 2], &[-1, 3]]);
    let mut weights = Weights::new(3);
    weights.set_weight(Literal::from(1), 0.4);
    weights.set_weight(Literal::from(-1), 0.6);
    for l in lits(&[2, -2, 3, -3]) {
        weights.set_weight(l, 0.5);
    }
    let mut expected = 0.;
    for assignment in 0u64..8 {
        let model = [
            assignment & 1 == 1,
            assignment >> 1 & 1 == 1,
            assignment >> 2 & 1 == 1,
        ];
        if (model[0] || model[1]) && (!model[0] || model[2]) {
            expected += (0..3)
                .map(|v| weights.weight(Literal::from_var(v, model[v])))
                .product::<f64>();
        }
    }
    let n: rug::Float = ModelCounter::new(
        &formula,
        weights,
        ProjectedVars::all(3),
        &EngineConfig::default(),
    )
    .unwrap()
    .count()
    .unwrap();
    assert!((n.to_f64() - expected).abs() < 1e-9);
}

#[test]
fn test_scenario_projection() {
    let formula = cnf(3, &[&[1, 2, 3]]);
    let n: Integer = ModelCounter::new(
        &formula,
        Weights::new(3),
        ProjectedVars::from_vars(3, &[0]),
        &EngineConfig::default(),
    )
    .unwrap()
    .count()
    .unwrap();
    assert_eq!(Integer::from(2), n);
}

#[test]
fn test_scenario_conditioning_queries() {
    let formula = cnf(3, &[&[1, 2], &[-1, 3]]);
    let ddnnf = compile(&formula, &EngineConfig::default());
    let weights = Weights::new(3);
    let projected = ProjectedVars::all(3);
    let mut ctx = EvaluationContext::new(&weights, &projected, 0, 3);
    assert!(ddnnf.is_sat_under(&mut ctx, &lits(&[1])));
    assert_eq!(
        Integer::from(0),
        ddnnf.count_models_under::<Integer>(&mut ctx, &lits(&[-1, -2, -3]))
    );
}

#[test]
fn test_compile_count_agreement_on_random_cnfs() {
    let mut rng = Pcg64::seed_from_u64(0x5eed);
    for round in 0..40 {
        let n_vars = 3 + round % 8;
        let formula = random_cnf(&mut rng, n_vars, 2 * n_vars);
        let expected = Integer::from(brute_force(&formula));
        let counted = count(&formula, &EngineConfig::default());
        assert_eq!(expected, counted, "count mismatch at round {round}");
        let ddnnf = compile(&formula, &EngineConfig::default());
        let weights = Weights::new(n_vars);
        let projected = ProjectedVars::all(n_vars);
        let ctx = EvaluationContext::new(&weights, &projected, 0, n_vars);
        assert_eq!(
            expected,
            ddnnf.count_models::<Integer>(&ctx),
            "compilation mismatch at round {round}"
        );
    }
}

#[test]
fn test_splitting_law() {
    let mut rng = Pcg64::seed_from_u64(42);
    for _ in 0..10 {
        let n_vars = 5;
        let formula = random_cnf(&mut rng, n_vars, 8);
        let ddnnf = compile(&formula, &EngineConfig::default());
        let weights = Weights::new(n_vars);
        let projected = ProjectedVars::all(n_vars);
        let mut ctx = EvaluationContext::new(&weights, &projected, 0, n_vars);
        let total = ddnnf.count_models::<Integer>(&ctx);
        for v in 0..n_vars {
            let pos: Integer =
                ddnnf.count_models_under(&mut ctx, &[Literal::from_var(v, true)]);
            let neg: Integer =
                ddnnf.count_models_under(&mut ctx, &[Literal::from_var(v, false)]);
            assert_eq!(total, pos + neg, "splitting law broken on variable {v}");
        }
    }
}

#[test]
fn test_tautology_absorption() {
    let mut rng = Pcg64::seed_from_u64(7);
    for _ in 0..10 {
        let formula = random_cnf(&mut rng, 6, 10);
        let reference = count(&formula, &EngineConfig::default());
        let mut with_tautology =
            CnfFormula::from_clauses(6, formula.clauses().to_vec());
        with_tautology.add_clause(lits(&[4, -4]));
        assert_eq!(reference, count(&with_tautology, &EngineConfig::default()));
    }
}

#[test]
fn test_every_configuration_agrees() {
    let formula = cnf(
        6,
        &[
            &[1, 2, 3],
            &[-1, 4],
            &[-2, 5],
            &[4, 5, 6],
            &[-3, -6],
            &[2, 6],
        ],
    );
    let reference = count(&formula, &EngineConfig::default());
    for var_heuristic in [
        VariableHeuristicKind::Vsads,
        VariableHeuristicKind::Vsids,
        VariableHeuristicKind::Dlcs,
        VariableHeuristicKind::Jwts,
        VariableHeuristicKind::Mom,
    ] {
        for phase_heuristic in [
            PhaseHeuristicKind::True,
            PhaseHeuristicKind::False,
            PhaseHeuristicKind::Polarity,
            PhaseHeuristicKind::Occurrence,
        ] {
            for partitioner in [
                PartitionerKind::No,
                PartitionerKind::ClauseBipartite,
                PartitionerKind::VarBipartite,
            ] {
                for reverse_polarity in [false, true] {
                    let config = EngineConfig {
                        var_heuristic,
                        phase_heuristic,
                        reverse_polarity,
                        partitioner: PartitionerConfig {
                            kind: partitioner,
                            ..PartitionerConfig::default()
                        },
                        ..EngineConfig::default()
                    };
                    assert_eq!(reference, count(&formula, &config));
                }
            }
        }
    }
}

#[test]
fn test_cache_strategies_agree() {
    let formula = cnf(
        6,
        &[&[1, 2], &[3, 4], &[5, 6], &[-1, -3], &[-3, -5]],
    );
    let reference = count(&formula, &EngineConfig::default());
    for mode in [CacheMode::Off, CacheMode::Classic, CacheMode::Dynamic] {
        for strategy in [ReductionStrategy::Subtract, ReductionStrategy::Halve] {
            for reduce_period_bits in [0, 2, 20] {
                let config = EngineConfig {
                    cache: CacheSettings {
                        mode,
                        reduce_period_bits,
                        strategy,
                    },
                    ..EngineConfig::default()
                };
                assert_eq!(reference, count(&formula, &config));
            }
        }
    }
}

#[test]
fn test_partitioner_on_a_long_chain() {
    // x_{i+1} → x_i over 20 variables: the models are the 21 prefixes, and
    // the single component is large enough to trigger the partitioner
    let clauses: Vec<Vec<Literal>> = (0..19)
        .map(|i| vec![Literal::from_var(i, true), Literal::from_var(i + 1, false)])
        .collect();
    let formula = CnfFormula::from_clauses(20, clauses);
    for kind in [
        PartitionerKind::No,
        PartitionerKind::ClauseBipartite,
        PartitionerKind::VarBipartite,
    ] {
        let config = EngineConfig {
            partitioner: PartitionerConfig {
                kind,
                ..PartitionerConfig::default()
            },
            ..EngineConfig::default()
        };
        assert_eq!(Integer::from(21), count(&formula, &config));
        let ddnnf = compile(&formula, &config);
        let weights = Weights::new(20);
        let projected = ProjectedVars::all(20);
        let ctx = EvaluationContext::new(&weights, &projected, 0, 20);
        assert_eq!(Integer::from(21), ddnnf.count_models::<Integer>(&ctx));
    }
}

#[test]
fn test_idempotence() {
    let formula = cnf(4, &[&[1, 2], &[-2, 3], &[3, 4]]);
    let first = count(&formula, &EngineConfig::default());
    let second = count(&formula, &EngineConfig::default());
    assert_eq!(first, second);
}
