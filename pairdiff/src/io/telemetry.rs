//! Bounded queue of command records with a single consumer.
//!
//! Producers run concurrently; only the sink task writes log lines, so records
//! never interleave.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::command_log::CommandLog;

/// Queue capacity; producers wait when the sink falls behind.
pub const QUEUE_CAPACITY: usize = 100;

/// Producer handle. Dropping every clone closes the queue.
#[derive(Debug, Clone)]
pub struct Telemetry {
    tx: mpsc::Sender<CommandLog>,
}

impl Telemetry {
    pub fn channel(capacity: usize) -> (Telemetry, mpsc::Receiver<CommandLog>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Telemetry { tx }, rx)
    }

    /// Push a finished record, waiting for room if the queue is full.
    pub async fn record(&self, log: CommandLog) {
        if self.tx.send(log).await.is_err() {
            debug!("telemetry sink is gone, dropping command log");
        }
    }
}

/// Drain `rx` until every producer is dropped, handing each record to `emit`.
pub fn spawn_sink<F>(mut rx: mpsc::Receiver<CommandLog>, mut emit: F) -> JoinHandle<()>
where
    F: FnMut(&CommandLog) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(log) = rx.recv().await {
            emit(&log);
        }
    })
}

/// Emit a record as a structured log line; `info` when `verbose`, `debug` otherwise.
pub fn log_command(log: &CommandLog, verbose: bool) {
    let args = log.joined_args();
    let input = log.input.as_ref().map(|p| p.display().to_string());
    let output = log.output.as_ref().map(|p| p.display().to_string());
    let start = log.start.to_rfc3339();
    let end = log.end.to_rfc3339();
    macro_rules! emit {
        ($level:ident) => {
            $level!(
                args = %args,
                input = input.as_deref(),
                output = output.as_deref(),
                start = %start,
                end = %end,
                elapsed_ms = log.elapsed_ms,
                err = log.error.as_deref(),
                "command log"
            )
        };
    }
    if verbose {
        emit!(info);
    } else {
        emit!(debug);
    }
}
