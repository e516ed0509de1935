use super::cli::logging_level_cli_arg;
use super::common::{apply_preproc, input_args, read_input_cnf, read_projected_arg};
use anyhow::Result;
use clap::{App, AppSettings, SubCommand};

#[derive(Default)]
pub struct Command;

const CMD_NAME: &str = "print-cnf";

impl super::cli::Command for Command {
    fn name(&self) -> &str {
        CMD_NAME
    }

    fn clap_subcommand(&self) -> App<'static, 'static> {
        SubCommand::with_name(CMD_NAME)
            .about("echoes the (possibly preprocessed) formula in DIMACS")
            .setting(AppSettings::DisableVersion)
            .args(&input_args())
            .arg(logging_level_cli_arg())
    }

    fn execute(&self, arg_matches: &clap::ArgMatches<'_>) -> Result<()> {
        let mut cnf = read_input_cnf(arg_matches)?;
        let projected = read_projected_arg(arg_matches, cnf.n_vars())?;
        apply_preproc(arg_matches, &mut cnf, &projected)?;
        let stdout = std::io::stdout();
        cnf.write_dimacs(stdout.lock())
    }
}
