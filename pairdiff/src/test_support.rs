//! Test-only helpers for building configs and capturing telemetry.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::config::{Config, Settings};
use crate::core::command_log::CommandLog;
use crate::io::telemetry::{QUEUE_CAPACITY, Telemetry, spawn_sink};

/// Owned argv from string slices.
pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Settings that use `sh` so tests do not depend on bash.
pub fn sh_settings() -> Settings {
    Settings {
        shell: "sh".to_string(),
        ..Settings::default()
    }
}

/// Config from `sh_settings` adjusted by `adjust`, grouping `args` with `--`.
pub fn sh_config(args: &[&str], adjust: impl FnOnce(&mut Settings)) -> Config {
    let mut settings = sh_settings();
    adjust(&mut settings);
    Config::new(settings, &argv(args)).expect("test config")
}

/// Telemetry whose records are collected in memory.
pub struct CapturedTelemetry {
    pub telemetry: Telemetry,
    records: Arc<Mutex<Vec<CommandLog>>>,
    sink: JoinHandle<()>,
}

impl CapturedTelemetry {
    pub fn new() -> Self {
        let (telemetry, rx) = Telemetry::channel(QUEUE_CAPACITY);
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink_records = Arc::clone(&records);
        let sink = spawn_sink(rx, move |log| {
            sink_records.lock().expect("lock").push(log.clone());
        });
        Self {
            telemetry,
            records,
            sink,
        }
    }

    /// Wait for the sink to drain. Every clone of `telemetry` must be dropped first.
    pub async fn finish(self) -> Vec<CommandLog> {
        let Self {
            telemetry,
            records,
            sink,
        } = self;
        drop(telemetry);
        sink.await.expect("sink");
        let records = records.lock().expect("lock");
        records.clone()
    }
}

impl Default for CapturedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
