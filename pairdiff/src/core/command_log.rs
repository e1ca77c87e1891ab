//! Per-command execution records.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A command that has been launched but not finished yet.
#[derive(Debug, Clone)]
pub struct PendingLog {
    args: Vec<String>,
    input: Option<PathBuf>,
    start: DateTime<Utc>,
}

impl PendingLog {
    /// Start the clock for `args`. Call immediately before launching.
    pub fn start(args: Vec<String>) -> Self {
        Self {
            args,
            input: None,
            start: Utc::now(),
        }
    }

    pub fn with_input(mut self, input: &Path) -> Self {
        self.input = Some(input.to_path_buf());
        self
    }

    /// Stop the clock and freeze the record.
    pub fn finish<E: Display>(self, output: Option<&Path>, err: Option<&E>) -> CommandLog {
        let end = Utc::now();
        CommandLog {
            args: self.args,
            input: self.input,
            output: output.map(Path::to_path_buf),
            start: self.start,
            end,
            elapsed_ms: (end - self.start).num_milliseconds(),
            error: err.map(|e| e.to_string()),
        }
    }
}

/// Finished command record pushed to the telemetry queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLog {
    pub args: Vec<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(rename = "out", skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub elapsed_ms: i64,
    #[serde(rename = "err", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandLog {
    /// Argv joined with single spaces.
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_records_paths_and_error() {
        let pending = PendingLog::start(vec!["sh".into(), "-c".into(), "cat".into()])
            .with_input(Path::new("/tmp/in"));
        let log = pending.finish(Some(Path::new("/tmp/out")), Some(&"exit status: 2"));

        assert_eq!(log.joined_args(), "sh -c cat");
        assert_eq!(log.input.as_deref(), Some(Path::new("/tmp/in")));
        assert_eq!(log.output.as_deref(), Some(Path::new("/tmp/out")));
        assert_eq!(log.error.as_deref(), Some("exit status: 2"));
        assert!(log.end >= log.start);
        assert!(log.elapsed_ms >= 0);
    }

    #[test]
    fn serializes_optional_fields_only_when_present() {
        let log = PendingLog::start(vec!["true".into()]).finish::<String>(None, None);
        let json = serde_json::to_value(&log).expect("json");
        assert!(json.get("in").is_none());
        assert!(json.get("out").is_none());
        assert!(json.get("err").is_none());
        assert_eq!(json["args"][0], "true");
    }
}
