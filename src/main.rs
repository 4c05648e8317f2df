mod cli;
mod execute;

use clap::Parser;
use colored::Colorize;
use graft::GraftError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use crate::cli::CLI;

fn main() {
    let cli = CLI::parse();
    init_tracing(cli.verbose, cli.quiet);
    if let Err(err) = execute::execute(cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        if let Some(hint) = err.downcast_ref::<GraftError>().and_then(GraftError::hint) {
            eprintln!("{} {hint}", "hint:".cyan().bold());
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_env("GRAFT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
