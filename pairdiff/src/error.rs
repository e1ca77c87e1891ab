//! Error kinds for execution and orchestration.

use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::config::ConfigError;

/// Failure of a single subprocess.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` {status}")]
    Exit { command: String, status: ExitStatus },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

impl ExecError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Exit code of the failed process, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Failure of one stage in a pipeline.
#[derive(Debug, Error)]
#[error("stage {index}: {source}")]
pub struct StageError {
    /// 0-based stage index.
    pub index: usize,
    #[source]
    pub source: ExecError,
}

/// Which side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Orchestration step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generate(Side),
    Interceptor(usize),
    Preprocess { index: usize, side: Side },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Generate(side) => write!(f, "run {side}"),
            Phase::Interceptor(i) => write!(f, "run interceptor[{i}]"),
            Phase::Preprocess { index, side } => write!(f, "run preprocess[{index}] for {side}"),
        }
    }
}

/// Error returned by a comparison run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("{phase}: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: ExecError,
    },

    /// The diff command failed; exit code 1 usually means "inputs differ".
    #[error("diff: {0}")]
    Diff(#[source] ExecError),

    #[error("cancelled")]
    Cancelled,
}

impl RunError {
    pub(crate) fn phase(phase: Phase, source: ExecError) -> Self {
        match source {
            ExecError::Cancelled => Self::Cancelled,
            source => Self::Phase { phase, source },
        }
    }

    /// Exit code of the underlying failed command, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Phase { source, .. } | Self::Diff(source) => source.exit_code(),
            _ => None,
        }
    }

    pub fn is_diff(&self) -> bool {
        matches!(self, Self::Diff(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_labels() {
        assert_eq!(Phase::Generate(Side::Left).to_string(), "run left");
        assert_eq!(Phase::Generate(Side::Right).to_string(), "run right");
        assert_eq!(Phase::Interceptor(2).to_string(), "run interceptor[2]");
        assert_eq!(
            Phase::Preprocess {
                index: 0,
                side: Side::Right
            }
            .to_string(),
            "run preprocess[0] for right"
        );
    }

    #[test]
    fn cancelled_exec_collapses_to_run_cancelled() {
        let err = RunError::phase(Phase::Interceptor(0), ExecError::Cancelled);
        assert!(matches!(err, RunError::Cancelled));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn exit_code_absent_without_exit_status() {
        let err = RunError::Diff(ExecError::EmptyCommand);
        assert!(err.is_diff());
        assert_eq!(err.exit_code(), None);
    }
}
