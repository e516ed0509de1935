use anyhow::{Context, Result};
use clap::{Arg, ArgMatches};
use log::info;
use sharpdnnf_rs::{
    parse_preproc_pipeline, read_projected, read_weights, CacheMode, CacheSettings, CnfFormula,
    DimacsReader, EngineConfig, Literal, PartitionerConfig, Preproc, ProjectedVars,
    ReductionStrategy, Weights,
};
use std::{
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
};

const ARG_INPUT: &str = "ARG_INPUT";
const ARG_WEIGHTS: &str = "ARG_WEIGHTS";
const ARG_PROJECTED: &str = "ARG_PROJECTED";
const ARG_PREPROC: &str = "ARG_PREPROC";
const ARG_VAR_HEURISTIC: &str = "ARG_VAR_HEURISTIC";
const ARG_PHASE_HEURISTIC: &str = "ARG_PHASE_HEURISTIC";
const ARG_PARTITIONER: &str = "ARG_PARTITIONER";
const ARG_REVERSE_POLARITY: &str = "ARG_REVERSE_POLARITY";
const ARG_REDUCE_PRIMAL_GRAPH: &str = "ARG_REDUCE_PRIMAL_GRAPH";
const ARG_EQUIV_SIMPLIFICATION: &str = "ARG_EQUIV_SIMPLIFICATION";
const ARG_CACHE: &str = "ARG_CACHE";
const ARG_REDUCE_CACHE: &str = "ARG_REDUCE_CACHE";
const ARG_STRATEGY_REDUCE_CACHE: &str = "ARG_STRATEGY_REDUCE_CACHE";
const ARG_PRECISION: &str = "ARG_PRECISION";

pub(crate) fn arg_input_var() -> Arg<'static, 'static> {
    Arg::with_name(ARG_INPUT)
        .short("i")
        .long("input")
        .empty_values(false)
        .multiple(false)
        .help("the input file that contains the CNF formula (possibly gzipped)")
        .required(true)
}

pub(crate) fn input_args() -> Vec<Arg<'static, 'static>> {
    vec![
        arg_input_var(),
        Arg::with_name(ARG_WEIGHTS)
            .long("weights")
            .empty_values(false)
            .help("a file giving the weight of some literals (default weight is 1)"),
        Arg::with_name(ARG_PROJECTED)
            .long("projected-vars")
            .empty_values(false)
            .help("a file giving the projected variables (default is all variables)"),
        Arg::with_name(ARG_PREPROC)
            .long("preproc")
            .empty_values(false)
            .help("a +-separated preprocessing pipeline among backbone, vivification, occElimination, forgetting"),
    ]
}

pub(crate) fn engine_args() -> Vec<Arg<'static, 'static>> {
    vec![
        Arg::with_name(ARG_VAR_HEURISTIC)
            .long("var-heuristic")
            .default_value("VSADS")
            .possible_values(&["VSADS", "VSIDS", "DLCS", "JW-TS", "MOM"])
            .help("the variable scoring method"),
        Arg::with_name(ARG_PHASE_HEURISTIC)
            .long("phase-heuristic")
            .default_value("TRUE")
            .possible_values(&["TRUE", "FALSE", "POLARITY", "OCCURRENCE"])
            .help("the phase selection policy"),
        Arg::with_name(ARG_PARTITIONER)
            .long("partitioner")
            .default_value("CB")
            .possible_values(&["NO", "CB", "VB"])
            .help("the graph partitioning heuristic"),
        Arg::with_name(ARG_REVERSE_POLARITY)
            .long("reverse-polarity")
            .takes_value(false)
            .help("invert the phase chosen by the phase heuristic"),
        Arg::with_name(ARG_REDUCE_PRIMAL_GRAPH)
            .long("reduce-primal-graph")
            .takes_value(false)
            .help("reduce the primal graph before partitioning"),
        Arg::with_name(ARG_EQUIV_SIMPLIFICATION)
            .long("equiv-simplification")
            .takes_value(false)
            .help("simplify the primal graph through literal equivalences"),
        Arg::with_name(ARG_CACHE)
            .long("cache")
            .default_value("1")
            .possible_values(&["0", "1", "2"])
            .help("caching: 0 (off), 1 (classic), 2 (dynamic)"),
        Arg::with_name(ARG_REDUCE_CACHE)
            .long("reduce-cache")
            .default_value("20")
            .help("cache-reduction periodicity is 1 << value (0 to deactivate)"),
        Arg::with_name(ARG_STRATEGY_REDUCE_CACHE)
            .long("strategy-reduce-cache")
            .default_value("0")
            .possible_values(&["0", "1", "2"])
            .help("cache aging: 0 (subtract), 1 or 2 (halve)"),
        Arg::with_name(ARG_PRECISION)
            .long("precision")
            .default_value("128")
            .help("the float precision, in bits, used for weighted counting"),
    ]
}

pub(crate) fn read_input_cnf(arg_matches: &ArgMatches<'_>) -> Result<CnfFormula> {
    let file_reader = create_input_file_reader(arg_matches)?;
    DimacsReader::default()
        .read(file_reader)
        .context("while parsing the input CNF")
}

fn create_input_file_reader(arg_matches: &ArgMatches<'_>) -> Result<BufReader<File>> {
    let input_file_canonicalized = realpath_from_arg(arg_matches, ARG_INPUT)?;
    info!("reading input file {:?}", input_file_canonicalized);
    Ok(BufReader::new(File::open(input_file_canonicalized)?))
}

fn realpath_from_arg(arg_matches: &ArgMatches<'_>, arg: &str) -> Result<PathBuf> {
    let file_path = arg_matches.value_of(arg).expect("a required argument");
    fs::canonicalize(PathBuf::from(file_path))
        .with_context(|| format!(r#"while opening file "{file_path}""#))
}

/// Applies the requested preprocessing pipeline; an unsatisfiable outcome
/// replaces the formula with a trivial contradiction, as the engine reports
/// the zero count itself.
pub(crate) fn apply_preproc(
    arg_matches: &ArgMatches<'_>,
    cnf: &mut CnfFormula,
    projected: &ProjectedVars,
) -> Result<()> {
    let passes = parse_preproc_pipeline(arg_matches.value_of(ARG_PREPROC).unwrap_or(""))
        .context("while parsing the preprocessing pipeline")?;
    if passes.is_empty() {
        return Ok(());
    }
    let state =
        Preproc::run(cnf, projected, &passes).context("while preprocessing the formula")?;
    if !state {
        info!("the preprocessor proved the formula unsatisfiable");
        if cnf.n_vars() == 0 {
            cnf.set_clauses(vec![Vec::new()]);
        } else {
            cnf.set_clauses(vec![vec![Literal::from(1)], vec![Literal::from(-1)]]);
        }
    }
    Ok(())
}

pub(crate) fn read_weights_arg(arg_matches: &ArgMatches<'_>, n_vars: usize) -> Result<Weights> {
    match arg_matches.value_of(ARG_WEIGHTS) {
        None => Ok(Weights::new(n_vars)),
        Some(_) => {
            let path = realpath_from_arg(arg_matches, ARG_WEIGHTS)?;
            info!("reading weights file {path:?}");
            read_weights(BufReader::new(File::open(path)?), n_vars)
                .context("while parsing the weights file")
        }
    }
}

pub(crate) fn read_projected_arg(
    arg_matches: &ArgMatches<'_>,
    n_vars: usize,
) -> Result<ProjectedVars> {
    match arg_matches.value_of(ARG_PROJECTED) {
        None => Ok(ProjectedVars::all(n_vars)),
        Some(_) => {
            let path = realpath_from_arg(arg_matches, ARG_PROJECTED)?;
            info!("reading projected-variables file {path:?}");
            read_projected(BufReader::new(File::open(path)?), n_vars)
                .context("while parsing the projected-variables file")
        }
    }
}

pub(crate) fn engine_config_from(arg_matches: &ArgMatches<'_>) -> Result<EngineConfig> {
    let parse = |arg: &str| {
        arg_matches
            .value_of(arg)
            .expect("a defaulted argument")
            .to_owned()
    };
    let cache_mode = match parse(ARG_CACHE).as_str() {
        "0" => CacheMode::Off,
        "2" => CacheMode::Dynamic,
        _ => CacheMode::Classic,
    };
    let strategy = match parse(ARG_STRATEGY_REDUCE_CACHE).as_str() {
        "0" => ReductionStrategy::Subtract,
        _ => ReductionStrategy::Halve,
    };
    let reduce_period_bits = parse(ARG_REDUCE_CACHE)
        .parse::<u32>()
        .context("while parsing the cache-reduction periodicity")?;
    let precision = parse(ARG_PRECISION)
        .parse::<u32>()
        .context("while parsing the float precision")?;
    Ok(EngineConfig {
        var_heuristic: parse(ARG_VAR_HEURISTIC)
            .parse()
            .context("while parsing the variable heuristic")?,
        phase_heuristic: parse(ARG_PHASE_HEURISTIC)
            .parse()
            .context("while parsing the phase heuristic")?,
        reverse_polarity: arg_matches.is_present(ARG_REVERSE_POLARITY),
        partitioner: PartitionerConfig {
            kind: parse(ARG_PARTITIONER)
                .parse()
                .context("while parsing the partitioner kind")?,
            reduce_primal_graph: arg_matches.is_present(ARG_REDUCE_PRIMAL_GRAPH),
            equiv_simplification: arg_matches.is_present(ARG_EQUIV_SIMPLIFICATION),
        },
        cache: CacheSettings {
            mode: cache_mode,
            reduce_period_bits,
            strategy,
        },
        precision,
        ..EngineConfig::default()
    })
}
