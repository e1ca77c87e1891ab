//! Stable exit codes for the pairdiff binary.
//!
//! When the failing command exited normally its own code is used instead.

/// Outputs are identical, or differences were accepted with `--success`.
pub const OK: i32 = 0;
/// Invalid flags or configuration, launch failure, interruption, or any error without an exit code.
pub const FAILURE: i32 = 1;
/// Exit code conventionally returned by diff tools when the inputs differ.
pub const DIFF_FOUND: i32 = 1;
