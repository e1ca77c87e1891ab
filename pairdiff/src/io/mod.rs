//! Side-effecting pieces: temp files, child processes, signals, telemetry.

pub mod pipeline;
pub mod process;
pub mod shutdown;
pub mod telemetry;
pub mod workspace;
