//! `teal` subcommands

pub mod run;
pub mod summarize;
