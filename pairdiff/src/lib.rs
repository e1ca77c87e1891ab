//! Compare the output of two related commands.
//!
//! `pairdiff` runs a left and a right command that share an argument prefix,
//! optionally pipes both outputs through the same filters, and hands the
//! results to an external diff tool. The crate is split the same way the
//! work is:
//!
//! - **[`core`]**: pure logic (argument grouping, command records, shell strings).
//! - **[`io`]**: workspace slots, child processes, pipelines, signals, telemetry.
//! - **[`run`]**: the generate → preprocess → diff state machine.

pub mod config;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
