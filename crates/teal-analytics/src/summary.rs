//! Opcode usage summary built from trace text

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use teal_vm::Opcode;
use tracing::trace;

use crate::error::{AnalyticsError, AnalyticsResult};

/// Opcode frequency, label visits and estimated cost of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    /// Times each mnemonic was executed
    pub opcode_usage: BTreeMap<String, u64>,
    /// Times each label was reached
    pub call_count: BTreeMap<String, u64>,
    /// Sum of opcode costs
    pub execution_cost: u64,
}

impl ExecutionSummary {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one visit of `label`
    pub fn add_call(&mut self, label: &str) {
        *self.call_count.entry(label.to_string()).or_insert(0) += 1;
    }

    /// Record one execution of `opcode` and add its cost
    pub fn add_opcode(&mut self, opcode: Opcode) {
        *self
            .opcode_usage
            .entry(opcode.mnemonic().to_string())
            .or_insert(0) += 1;
        self.execution_cost += opcode.cost();
    }

    /// Total executed instructions
    pub fn total_opcodes(&self) -> u64 {
        self.opcode_usage.values().sum()
    }

    /// Opcodes ordered by descending use, ties broken by mnemonic
    pub fn most_used(&self) -> Vec<(&str, u64)> {
        let mut usage: Vec<(&str, u64)> = self
            .opcode_usage
            .iter()
            .map(|(name, &count)| (name.as_str(), count))
            .collect();
        usage.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        usage
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "execution cost: {}", self.execution_cost)?;
        writeln!(f, "opcodes executed: {}", self.total_opcodes())?;
        for (name, count) in self.most_used() {
            writeln!(f, "  {:<20} {}", name, count)?;
        }
        if !self.call_count.is_empty() {
            writeln!(f, "labels reached:")?;
            for (label, count) in &self.call_count {
                writeln!(f, "  {:<20} {}", label, count)?;
            }
        }
        Ok(())
    }
}

/// Summarize trace text written by the interpreter
///
/// Each trace line reads `<line>: <operation> [operands] | <stack>`. Label
/// lines count as calls to that label; operations starting with `#` are
/// skipped. Blank lines are ignored.
pub fn summarize_execution(trace_text: &str) -> AnalyticsResult<ExecutionSummary> {
    let mut summary = ExecutionSummary::new();
    for (index, line) in trace_text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        if tokens.next().is_none() {
            continue;
        }
        let operation = tokens
            .next()
            .ok_or(AnalyticsError::MalformedLine { line: index + 1 })?;
        if operation.starts_with('#') {
            continue;
        }
        if let Some(label) = operation.strip_suffix(':') {
            summary.add_call(label);
            continue;
        }
        let opcode =
            Opcode::from_mnemonic(operation).ok_or_else(|| AnalyticsError::UnknownOpcode {
                line: index + 1,
                opcode: operation.to_string(),
            })?;
        summary.add_opcode(opcode);
    }
    trace!(
        cost = summary.execution_cost,
        opcodes = summary.total_opcodes(),
        "summarized trace"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Counting ====================

    #[test]
    fn test_counts_opcodes_and_cost() {
        let trace = "1: int 5 | []\n2: int 3 | [5]\n3: + | [5, 3]\n4: return | [8]\n";
        let summary = summarize_execution(trace).unwrap();
        assert_eq!(summary.opcode_usage.get("int"), Some(&2));
        assert_eq!(summary.opcode_usage.get("+"), Some(&1));
        assert_eq!(summary.opcode_usage.get("return"), Some(&1));
        assert_eq!(summary.execution_cost, 4);
        assert!(summary.call_count.is_empty());
    }

    #[test]
    fn test_labels_count_as_calls() {
        let trace = "1: callsub f | []\n3: f: | []\n4: retsub | []\n3: f: | []\n";
        let summary = summarize_execution(trace).unwrap();
        assert_eq!(summary.call_count.get("f"), Some(&2));
        assert_eq!(summary.total_opcodes(), 2);
    }

    #[test]
    fn test_expensive_opcodes() {
        let trace = "1: b* | []\n2: divmodw | []\n";
        let summary = summarize_execution(trace).unwrap();
        assert_eq!(summary.execution_cost, 40);
    }

    #[test]
    fn test_skips_hash_and_blank_lines() {
        let trace = "\n1: #pragma version 8 | []\n   \n2: int 1 | []\n";
        let summary = summarize_execution(trace).unwrap();
        assert_eq!(summary.total_opcodes(), 1);
    }

    // ==================== Errors ====================

    #[test]
    fn test_unknown_opcode() {
        let err = summarize_execution("1: int 1 | []\n2: frobnicate | [1]\n").unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::UnknownOpcode {
                line: 2,
                opcode: "frobnicate".into()
            }
        );
    }

    #[test]
    fn test_malformed_line() {
        let err = summarize_execution("1:\n").unwrap_err();
        assert_eq!(err, AnalyticsError::MalformedLine { line: 1 });
    }

    // ==================== Presentation ====================

    #[test]
    fn test_most_used_ordering() {
        let mut summary = ExecutionSummary::new();
        summary.add_opcode(Opcode::Pop);
        summary.add_opcode(Opcode::Int);
        summary.add_opcode(Opcode::Int);
        summary.add_opcode(Opcode::Dup);
        assert_eq!(summary.most_used(), vec![("int", 2), ("dup", 1), ("pop", 1)]);
    }

    #[test]
    fn test_display() {
        let mut summary = ExecutionSummary::new();
        summary.add_opcode(Opcode::Int);
        summary.add_call("main");
        let text = summary.to_string();
        assert!(text.starts_with("execution cost: 1\n"));
        assert!(text.contains("labels reached:"));
        assert!(text.contains("main"));
    }

    #[test]
    fn test_serializes_to_json() {
        let mut summary = ExecutionSummary::new();
        summary.add_opcode(Opcode::Int);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["execution_cost"], 1);
        assert_eq!(json["opcode_usage"]["int"], 1);
    }
}
