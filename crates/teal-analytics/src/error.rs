//! Analytics error types

use thiserror::Error;

/// Errors raised while summarizing a trace
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Trace names an opcode the cost table does not know
    #[error("trace line {line}: unknown opcode {opcode:?}")]
    UnknownOpcode {
        /// 1-based line of the trace text
        line: usize,
        /// Offending mnemonic
        opcode: String,
    },

    /// Non-blank trace line without an operation column
    #[error("trace line {line}: expected `<line>: <operation> ...`")]
    MalformedLine {
        /// 1-based line of the trace text
        line: usize,
    },
}

/// Result type for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
