use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// A subcommand of the application: its clap definition and its behavior.
pub(crate) trait Command {
    fn name(&self) -> &str;

    fn clap_subcommand(&self) -> App<'static, 'static>;

    fn execute(&self, arg_matches: &ArgMatches<'_>) -> Result<()>;
}

/// The application dispatcher: builds the clap application from the
/// registered commands, initializes the logger and runs the selected
/// command, translating its result into the process exit code.
pub(crate) struct AppHelper {
    name: &'static str,
    version: &'static str,
    about: &'static str,
    commands: Vec<Box<dyn Command>>,
}

impl AppHelper {
    pub fn new(name: &'static str, version: &'static str, about: &'static str) -> Self {
        Self {
            name,
            version,
            about,
            commands: Vec::new(),
        }
    }

    pub fn add_command(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    pub fn launch_app(self) -> ! {
        let app = App::new(self.name)
            .version(self.version)
            .about(self.about)
            .setting(AppSettings::SubcommandRequiredElseHelp)
            .subcommands(self.commands.iter().map(|c| c.clap_subcommand()));
        let matches = app.get_matches();
        let (subcommand_name, subcommand_matches) = matches.subcommand();
        let subcommand_matches = subcommand_matches.expect("a subcommand is required");
        if let Err(e) = init_logging(subcommand_matches) {
            eprintln!("cannot initialize the logger: {e:#}");
            std::process::exit(1);
        }
        let command = self
            .commands
            .iter()
            .find(|c| c.name() == subcommand_name)
            .expect("the subcommand is one of the registered commands");
        match command.execute(subcommand_matches) {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                log::error!("{e:#}");
                std::process::exit(1);
            }
        }
    }
}

const ARG_LOGGING_LEVEL: &str = "LOGGING_LEVEL";

/// The `--logging-level` argument, shared by every subcommand.
pub(crate) fn logging_level_cli_arg() -> Arg<'static, 'static> {
    Arg::with_name(ARG_LOGGING_LEVEL)
        .long("logging-level")
        .possible_values(&["off", "error", "warn", "info", "debug", "trace"])
        .default_value("info")
        .help("set the minimal logging level")
}

fn init_logging(arg_matches: &ArgMatches<'_>) -> Result<()> {
    let level = match arg_matches
        .value_of(ARG_LOGGING_LEVEL)
        .expect("the logging level has a default value")
    {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Magenta)
        .trace(Color::BrightBlack);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "c [{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ));
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context("while initializing the logger")
}
