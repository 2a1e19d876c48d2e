//! `teal summarize`: opcode usage from a trace

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use teal_analytics::summarize_execution;

use crate::output::Output;

/// Arguments of `teal summarize`
#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Trace file written by `teal run --trace`, or `-` for stdin
    pub trace: PathBuf,
}

impl SummarizeArgs {
    /// Run the command
    pub fn execute(self, json: bool) -> Result<()> {
        let text = read_trace(&self.trace)?;
        let summary = summarize_execution(&text)?;
        let value = serde_json::to_value(&summary)?;
        let mut out = Output::new(json);
        if let serde_json::Value::Object(fields) = value {
            for (key, field) in fields {
                out = out.field(&key, field);
            }
        }
        out.line(summary.to_string().trim_end()).print();
        Ok(())
    }
}

fn read_trace(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read trace from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
