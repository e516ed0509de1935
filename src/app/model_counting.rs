use super::cli::logging_level_cli_arg;
use super::common::{
    apply_preproc, engine_args, engine_config_from, input_args, read_input_cnf, read_projected_arg,
    read_weights_arg,
};
use anyhow::Result;
use clap::{App, AppSettings, SubCommand};
use log::info;
use rug::{Float, Integer};
use sharpdnnf_rs::{CnfFormula, EngineConfig, ModelCounter, Num, ProjectedVars, Weights};

#[derive(Default)]
pub struct Command;

const CMD_NAME: &str = "model-counting";

impl super::cli::Command for Command {
    fn name(&self) -> &str {
        CMD_NAME
    }

    fn clap_subcommand(&self) -> App<'static, 'static> {
        SubCommand::with_name(CMD_NAME)
            .about("computes the weighted number of models of the formula")
            .setting(AppSettings::DisableVersion)
            .args(&input_args())
            .args(&engine_args())
            .arg(logging_level_cli_arg())
    }

    fn execute(&self, arg_matches: &clap::ArgMatches<'_>) -> Result<()> {
        let mut cnf = read_input_cnf(arg_matches)?;
        let projected = read_projected_arg(arg_matches, cnf.n_vars())?;
        apply_preproc(arg_matches, &mut cnf, &projected)?;
        let weights = read_weights_arg(arg_matches, cnf.n_vars())?;
        let config = engine_config_from(arg_matches)?;
        if weights.is_integer() {
            info!("integer mode");
            count_and_report::<Integer>(&cnf, weights, projected, &config)
        } else {
            info!("float mode, precision {}", config.precision);
            count_and_report::<Float>(&cnf, weights, projected, &config)
        }
    }
}

fn count_and_report<T: Num>(
    cnf: &CnfFormula,
    weights: Weights,
    projected: ProjectedVars,
    config: &EngineConfig,
) -> Result<()> {
    let mut counter = ModelCounter::<T>::new(cnf, weights, projected, config)?;
    let count = counter.count()?;
    println!("s {count}");
    Ok(())
}
