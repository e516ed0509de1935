use super::cli::logging_level_cli_arg;
use super::common::{
    apply_preproc, engine_args, engine_config_from, input_args, read_input_cnf, read_projected_arg,
    read_weights_arg,
};
use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, SubCommand};
use log::info;
use rug::{Float, Integer};
use sharpdnnf_rs::{Compiler, DdnnfWriter, DecisionDnnf, EvaluationContext, Literal, Num};
use std::{
    fs::File,
    io::{BufRead, BufWriter, Write},
};

#[derive(Default)]
pub struct Command;

const CMD_NAME: &str = "compilation";

const ARG_OUTPUT: &str = "ARG_OUTPUT";
const ARG_QUERY: &str = "ARG_QUERY";
const ARG_TRACE: &str = "ARG_TRACE";

impl super::cli::Command for Command {
    fn name(&self) -> &str {
        CMD_NAME
    }

    fn clap_subcommand(&self) -> App<'static, 'static> {
        SubCommand::with_name(CMD_NAME)
            .about("compiles the formula into a Decision-DNNF")
            .setting(AppSettings::DisableVersion)
            .args(&input_args())
            .args(&engine_args())
            .arg(
                Arg::with_name(ARG_OUTPUT)
                    .short("o")
                    .long("output")
                    .empty_values(false)
                    .help("the file the Decision-DNNF is written to"),
            )
            .arg(
                Arg::with_name(ARG_QUERY)
                    .long("query")
                    .takes_value(false)
                    .help("after the compilation, answer the queries read on the standard input"),
            )
            .arg(
                Arg::with_name(ARG_TRACE)
                    .long("trace")
                    .empty_values(false)
                    .help("emit a resolution trace and write the output in the certified format"),
            )
            .arg(logging_level_cli_arg())
    }

    fn execute(&self, arg_matches: &clap::ArgMatches<'_>) -> Result<()> {
        let mut cnf = read_input_cnf(arg_matches)?;
        let projected = read_projected_arg(arg_matches, cnf.n_vars())?;
        apply_preproc(arg_matches, &mut cnf, &projected)?;
        let weights = read_weights_arg(arg_matches, cnf.n_vars())?;
        let config = engine_config_from(arg_matches)?;
        let certified = arg_matches.is_present(ARG_TRACE);
        let compiler = match arg_matches.value_of(ARG_TRACE) {
            Some(path) => {
                let trace = File::create(path)
                    .with_context(|| format!(r#"while creating the trace file "{path}""#))?;
                Compiler::with_trace(
                    &cnf,
                    projected.clone(),
                    &config,
                    Box::new(BufWriter::new(trace)),
                )?
            }
            None => Compiler::new(&cnf, projected.clone(), &config)?,
        };
        let ddnnf = compiler.compile()?;
        info!(
            "compiled into {} nodes and {} edges",
            ddnnf.n_nodes(),
            ddnnf.n_edges()
        );
        if let Some(path) = arg_matches.value_of(ARG_OUTPUT) {
            let out = File::create(path)
                .with_context(|| format!(r#"while creating the output file "{path}""#))?;
            if certified {
                DdnnfWriter::write_certified(BufWriter::new(out), &ddnnf)?;
            } else {
                DdnnfWriter::write(BufWriter::new(out), &ddnnf)?;
            }
            info!("Decision-DNNF written to {path}");
        }
        let mut ctx =
            EvaluationContext::new(&weights, &projected, config.precision, ddnnf.n_vars());
        if arg_matches.is_present(ARG_QUERY) {
            let stdin = std::io::stdin();
            if weights.is_integer() {
                run_queries::<Integer>(&ddnnf, &mut ctx, stdin.lock())
            } else {
                run_queries::<Float>(&ddnnf, &mut ctx, stdin.lock())
            }
        } else {
            if weights.is_integer() {
                println!("s {}", ddnnf.count_models::<Integer>(&ctx));
            } else {
                println!("s {}", ddnnf.count_models::<Float>(&ctx));
            }
            Ok(())
        }
    }
}

/// Answers the query stream: `m <lits> 0` prints the count under the
/// conditioning, `d <lits> 0` prints `SAT` or `UNS`. The stream ends at EOF
/// or on an empty query.
fn run_queries<T: Num>(
    ddnnf: &DecisionDnnf,
    ctx: &mut EvaluationContext,
    input: impl BufRead,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut tokens = Tokens::new(input);
    while let Some(kind) = tokens.next()? {
        if kind != "m" && kind != "d" {
            continue;
        }
        let mut lits = Vec::new();
        while let Some(word) = tokens.next()? {
            if word == "0" {
                break;
            }
            lits.push(
                word.parse::<Literal>()
                    .with_context(|| format!(r#"while parsing the query literal "{word}""#))?,
            );
        }
        if lits.is_empty() {
            break;
        }
        info!(
            "query: {} {}",
            kind,
            lits.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );
        if kind == "m" {
            let count: T = ddnnf.count_models_under(ctx, &lits);
            writeln!(out, "s {count}")?;
        } else {
            let sat = ddnnf.is_sat_under(ctx, &lits);
            writeln!(out, "s {}", if sat { "SAT" } else { "UNS" })?;
        }
        out.flush()?;
    }
    Ok(())
}

/// A whitespace tokenizer over a line-buffered reader.
struct Tokens<R> {
    reader: R,
    pending: Vec<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<Option<String>> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending = line.split_whitespace().rev().map(ToOwned::to_owned).collect();
        }
        Ok(self.pending.pop())
    }
}
