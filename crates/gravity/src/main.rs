//! `gravity`: drive cluster lifecycle operations on a Gravity portal.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gravity_core::RemoteOperator;

use crate::cli::{Cli, Command, CompletionsArgs};
use crate::error::CliError;

const BIN_NAME: &str = "gravity";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = u8::try_from(err.exit_code()).unwrap_or(1);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr so table and JSON output stay clean. `RUST_LOG`
/// wins over the verbosity flags.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { command, global } = cli;
    match command {
        Command::Config(args) => commands::config_cmd::handle(args, &global),
        Command::Completions(args) => {
            print_completions(&args);
            Ok(())
        }
        command => {
            let target = config::resolve_target(&global)?;
            debug!(
                portal = %target.portal.url,
                cluster = ?target.cluster,
                "Connecting to portal"
            );
            let portal = RemoteOperator::connect(&target.portal)?;
            commands::dispatch(command, &portal, &target, &global).await
        }
    }
}

fn print_completions(args: &CompletionsArgs) {
    clap_complete::generate(
        args.shell,
        &mut Cli::command(),
        BIN_NAME,
        &mut std::io::stdout(),
    );
}
