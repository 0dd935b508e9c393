use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// movavg - trailing moving averages over binary f64 streams
#[derive(Parser, Debug)]
#[command(name = "movavg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a TOML configuration file (defaults plus MOVAVG_* env vars if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute moving averages for one or more streams
    Run(RunArgs),
    /// Encode whitespace-separated decimal text from stdin into binary samples
    Encode(EncodeArgs),
    /// Decode binary samples from stdin into one decimal value per line
    Decode,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run every file-backed stream on a worker pool (no retry on missing inputs)
    #[arg(long)]
    pub parallel: bool,

    /// Write a JSON report of every stream's outcome to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Stream specs as WINDOW,INPUT,OUTPUT; `-` selects stdin/stdout
    #[arg(required = true, value_name = "SPEC")]
    pub specs: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Output file (stdout if omitted)
    pub output: Option<PathBuf>,
}
