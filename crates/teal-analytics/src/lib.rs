//! # teal-analytics
//!
//! Execution summaries computed from teal-vm trace output.
//!
//! The summarizer reads only the trace text, so it works equally on a live
//! trace buffer and on a trace file written by an earlier run.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod summary;

pub use error::{AnalyticsError, AnalyticsResult};
pub use summary::{summarize_execution, ExecutionSummary};
