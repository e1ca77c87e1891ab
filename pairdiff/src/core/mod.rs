//! Pure logic: no processes, no filesystem.

pub mod args;
pub mod command_log;
pub mod shell;
