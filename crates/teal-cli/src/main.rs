//! # teal
//!
//! Command-line runner for TEAL listings.
//!
//! ## Usage
//!
//! ```bash
//! # Run a program, printing the final stack and scratch space
//! teal run approval.teal
//!
//! # Run against initial state and a calling transaction, saving a trace
//! teal run approval.teal --context ctx.json --trace run.trace
//!
//! # Summarize opcode usage and cost from a saved trace
//! teal summarize run.trace --json
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use teal_vm::{ErrorKind, VmError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{run::RunArgs, summarize::SummarizeArgs};

/// Exit code for programs that panicked or failed an assertion
const EXIT_PANIC: i32 = 1;
/// Exit code for everything else: bad input, usage and load errors
const EXIT_ERROR: i32 = 2;

/// TEAL stack-machine runner
#[derive(Parser, Debug)]
#[command(name = "teal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a program listing
    Run(RunArgs),
    /// Summarize opcode usage and cost from a trace
    Summarize(SummarizeArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run(args) => args.execute(cli.json),
        Commands::Summarize(args) => args.execute(cli.json),
    };

    if let Err(e) = result {
        let vm_error = e.downcast_ref::<VmError>();
        if cli.json {
            println!(
                "{}",
                json!({
                    "success": false,
                    "error": format!("{:#}", e),
                    "kind": vm_error.map(|v| kind_name(v.kind())),
                    "line": vm_error.and_then(VmError::line),
                })
            );
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(exit_code(vm_error));
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Panic => "panic",
        ErrorKind::AssertionFailed => "assertion_failed",
        ErrorKind::Usage => "usage",
        ErrorKind::StackUnderflow => "stack_underflow",
        ErrorKind::Load => "load",
    }
}

fn exit_code(error: Option<&VmError>) -> i32 {
    match error {
        Some(e) if e.is_panic() => EXIT_PANIC,
        Some(e) if e.kind() == ErrorKind::StackUnderflow => EXIT_PANIC,
        _ => EXIT_ERROR,
    }
}
