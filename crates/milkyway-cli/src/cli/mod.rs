mod commands;
mod helpers;

use clap::Parser;
use milkyway_core::domain::MilkywayError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_milkyway_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("milkyway-rs".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.log_level.as_deref())?;
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "milkyway-rs", version, about = "MilkyWay@home separation and N-body scoring")]
struct Cli {
    /// Log filter (e.g. `debug`, `milkyway_core=trace`); defaults to RUST_LOG, then `info`
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Integrate the stream/background mixture and compute the star likelihood
    Separation(commands::SeparationArgs),
    /// Score simulated bodies against an observed lambda histogram
    NbodyChisq(commands::NbodyArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Separation(args) => commands::run_separation_command(args),
        CliCommand::NbodyChisq(args) => commands::run_nbody_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(MilkywayError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<MilkywayError> for CliError {
    fn from(error: MilkywayError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_milkyway_error(&self) -> MilkywayError {
        match self {
            Self::Usage(message) => {
                MilkywayError::configuration("CONFIG.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => MilkywayError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
