//! refdict CLI library
//!
//! The command-line entry point lives here so it can be driven from tests
//! and embedded by other binaries.

mod cli;

pub use cli::run;
