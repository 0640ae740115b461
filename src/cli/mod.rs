//! Command-line interface

pub mod dump;
pub mod error;

pub use dump::{Cli, DumpSummary};
pub use error::CliError;
