//! Kiln command-line launcher
//!
//! Boots a runtime and hands it one of the bundled programs, the same way
//! the entry stub of an ahead-of-time compiled program would.

mod commands;
mod programs;

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "KILN_LOG";

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Kiln native runtime launcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundled program
    Run {
        /// Program name (see `kiln info`)
        program: String,
        /// Arena size in bytes: decimal, 0x-prefixed hex or 0-prefixed octal
        #[arg(long, value_parser = parse_heap_size)]
        heap_size: Option<usize>,
        /// Arguments passed to the program's main
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },

    /// Show runtime configuration and the bundled programs
    Info,
}

fn parse_heap_size(raw: &str) -> Result<usize, String> {
    kiln_runtime::config::parse_heap_size(raw)
        .ok_or_else(|| format!("'{}' is not a positive size", raw))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            program,
            heap_size,
            args,
        } => commands::run::execute(&program, heap_size, &args),
        Commands::Info => commands::info::execute(),
    }
}
