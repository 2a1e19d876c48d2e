//! `teal run`: execute a listing

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use teal_vm::context::display_key;
use teal_vm::{Execution, ExecutionConfig, ExecutionContext, Halt, Interpreter, Program, VmError};
use tracing::{debug, info};

use crate::output::Output;

/// Arguments of `teal run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Program listing
    pub file: PathBuf,

    /// Initial state and transaction (.json or .toml)
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Execution settings (.toml); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Return only the top of the stack on `return`
    #[arg(long)]
    pub top_only: bool,

    /// Do not enforce state, log and string-size ceilings
    #[arg(long)]
    pub no_bounds_check: bool,

    /// Write the execution trace to FILE, or to stdout with `-`
    #[arg(long, value_name = "FILE")]
    pub trace: Option<PathBuf>,

    /// Save the context after execution as JSON
    #[arg(long, value_name = "FILE")]
    pub write_context: Option<PathBuf>,
}

impl RunArgs {
    /// Run the command
    pub fn execute(self, json: bool) -> Result<()> {
        let config = self.execution_config()?;
        let source = fs::read(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let program = Program::from_bytes(&source).map_err(VmError::from)?;
        debug!(
            file = %self.file.display(),
            lines = program.len(),
            instructions = program.instruction_count(),
            "loaded program"
        );

        let mut context = match &self.context {
            Some(path) => Some(load_context(path)?),
            None => None,
        };
        let mut sink = self.trace.as_deref().map(open_trace).transpose()?;

        let mut interpreter = Interpreter::new(&program, config);
        if let Some(ctx) = context.as_mut() {
            interpreter = interpreter.with_context(ctx);
        }
        if let Some(sink) = sink.as_mut() {
            interpreter = interpreter.with_trace(&mut **sink);
        }
        let result = interpreter.run();
        if let Some(sink) = sink.as_mut() {
            sink.flush().context("failed to flush trace")?;
        }
        let execution = result?;
        info!(halt = ?execution.halt, steps = execution.steps, "program finished");

        if let (Some(path), Some(ctx)) = (&self.write_context, &context) {
            let text = serde_json::to_string_pretty(ctx)?;
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        }

        report(&execution, context.as_ref(), json).print();
        Ok(())
    }

    fn execution_config(&self) -> Result<ExecutionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ExecutionConfig::default(),
        };
        if self.top_only {
            config.return_full_stack = false;
        }
        if self.no_bounds_check {
            config.bounds_checking = false;
        }
        Ok(config)
    }
}

/// Parse a context file, choosing the format by extension
pub fn load_context(path: &Path) -> Result<ExecutionContext> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let context = if is_toml {
        toml::from_str(&text).with_context(|| format!("invalid context {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("invalid context {}", path.display()))?
    };
    Ok(context)
}

fn open_trace(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdout()));
    }
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn halt_name(halt: Halt) -> &'static str {
    match halt {
        Halt::Return => "return",
        Halt::EndOfProgram => "end",
    }
}

fn report(execution: &Execution, context: Option<&ExecutionContext>, json_mode: bool) -> Output {
    let scratch: Vec<(usize, &teal_vm::Value)> = execution.scratch.non_zero().collect();
    let stack_text: Vec<String> = execution.stack.iter().map(|v| v.to_string()).collect();

    let mut out = Output::new(json_mode)
        .field("success", true)
        .field("halt", halt_name(execution.halt))
        .field("steps", execution.steps)
        .field("stack", json!(execution.stack))
        .field(
            "scratch",
            scratch
                .iter()
                .map(|(slot, value)| (slot.to_string(), json!(value)))
                .collect::<serde_json::Map<_, _>>(),
        )
        .line(format!("halt: {}", halt_name(execution.halt)))
        .line(format!("steps: {}", execution.steps))
        .line(format!("stack: [{}]", stack_text.join(", ")));

    if !scratch.is_empty() {
        out = out
            .line("scratch:")
            .lines(scratch.iter().map(|(slot, value)| format!("  {}: {}", slot, value)));
    }

    if let Some(ctx) = context {
        out = out.field("context", json!(ctx));
        if !ctx.global_state.is_empty() {
            out = out.line("global state:").lines(
                ctx.global_state
                    .iter()
                    .map(|(k, v)| format!("  {}: {}", display_key(k), v)),
            );
        }
        if !ctx.local_state.is_empty() {
            out = out.line("local state:").lines(
                ctx.local_state
                    .iter()
                    .map(|(k, v)| format!("  {}: {}", display_key(k), v)),
            );
        }
        if !ctx.logs.is_empty() {
            out = out
                .line("logs:")
                .lines(ctx.logs.iter().map(|log| format!("  0x{}", hex::encode(log))));
        }
    }
    out
}
