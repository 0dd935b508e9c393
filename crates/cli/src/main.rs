//! CLI entry point for movavg
//!
//! Parses command line arguments, sets up logging on stderr (stdout carries
//! sample data), and dispatches to the subcommands.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod exit_codes;

use cli::{Cli, Command};

/// Log level selected by the `-v` count
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let level = log_level(verbose);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("movavg={level},movavg_cli={level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Command::Run(args) => commands::run::execute(args, cli.config.as_deref()).await,
        Command::Encode(args) => commands::encode::execute(args),
        Command::Decode => commands::decode::execute(),
    };

    ExitCode::from(code)
}
