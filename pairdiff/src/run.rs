//! Orchestration for one comparison: generate, preprocess, diff.
//!
//! Phases run in strict order and the first failure skips everything after it.
//! The workspace is closed exactly once whatever happened.

use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::io::AsyncWrite;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::core::command_log::PendingLog;
use crate::core::shell::{DiffLabels, diff_script, shell_argv};
use crate::error::{ExecError, Phase, RunError, Side};
use crate::io::pipeline::PipelineRunner;
use crate::io::process::{ProcessRunner, run_to_stderr, run_to_writer};
use crate::io::shutdown::Shutdown;
use crate::io::telemetry::{QUEUE_CAPACITY, Telemetry, log_command, spawn_sink};
use crate::io::workspace::Workspace;

/// Current output file for each side. Replaced at every phase boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideOutputs {
    pub left: PathBuf,
    pub right: PathBuf,
}

impl SideOutputs {
    pub fn get(&self, side: Side) -> &Path {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// How left and right outputs are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// Both sides at once.
    Concurrent,
    /// Left, then every interceptor in order, then right.
    Intercepted,
}

impl GenerationStrategy {
    pub fn for_config(config: &Config) -> Self {
        if config.interceptor.is_empty() {
            Self::Concurrent
        } else {
            Self::Intercepted
        }
    }

    async fn generate(self, runner: &Runner<'_>) -> Result<SideOutputs, RunError> {
        match self {
            Self::Concurrent => runner.generate_concurrently().await,
            Self::Intercepted => runner.generate_with_interceptors().await,
        }
    }
}

/// Phase state machine for a single run.
pub struct Runner<'a> {
    config: &'a Config,
    workspace: &'a Workspace,
    telemetry: Telemetry,
    shutdown: Shutdown,
    strategy: GenerationStrategy,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a Config,
        workspace: &'a Workspace,
        telemetry: Telemetry,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            workspace,
            telemetry,
            shutdown,
            strategy: GenerationStrategy::for_config(config),
        }
    }

    /// Run every phase. Consumes the runner so its telemetry handle is released on return.
    pub async fn run<W>(self, writer: &mut W) -> Result<(), RunError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.ensure_active()?;
        let outputs = self.strategy.generate(&self).await?;
        self.ensure_active()?;
        let outputs = self.preprocess(outputs).await?;
        self.ensure_active()?;
        self.diff(&outputs, writer).await
    }

    fn ensure_active(&self) -> Result<(), RunError> {
        if self.shutdown.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(())
    }

    fn side_args(&self, side: Side) -> Vec<String> {
        match side {
            Side::Left => self.config.left_args(),
            Side::Right => self.config.right_args(),
        }
    }

    async fn run_side(&self, side: Side) -> Result<PathBuf, RunError> {
        let argv = self.side_args(side);
        debug!(%side, args = ?argv, "start run");

        let pending = PendingLog::start(argv.clone());
        let result = ProcessRunner::new(self.workspace, self.shutdown.clone())
            .run(&argv)
            .await;
        let log = pending.finish(result.as_deref().ok(), result.as_ref().err());
        self.telemetry.record(log).await;

        let out = result.map_err(|e| RunError::phase(Phase::Generate(side), e))?;
        debug!(%side, out = %out.display(), "end run");
        Ok(out)
    }

    #[instrument(skip_all)]
    async fn generate_concurrently(&self) -> Result<SideOutputs, RunError> {
        self.for_both_sides(move |side| self.run_side(side)).await
    }

    #[instrument(skip_all, fields(interceptors = self.config.interceptor.len()))]
    async fn generate_with_interceptors(&self) -> Result<SideOutputs, RunError> {
        let left = self.run_side(Side::Left).await?;
        self.run_interceptors().await?;
        self.ensure_active()?;
        let right = self.run_side(Side::Right).await?;
        Ok(SideOutputs { left, right })
    }

    async fn run_interceptors(&self) -> Result<(), RunError> {
        for (index, script) in self.config.interceptor.iter().enumerate() {
            self.ensure_active()?;
            let argv = shell_argv(&self.config.shell, script);
            debug!(index, interceptor = %script, "start run interceptor");

            let pending = PendingLog::start(argv.clone());
            let result = run_to_stderr(&argv, &self.shutdown).await;
            self.telemetry
                .record(pending.finish(None, result.as_ref().err()))
                .await;

            result.map_err(|e| RunError::phase(Phase::Interceptor(index), e))?;
            debug!(index, "end run interceptor");
        }
        Ok(())
    }

    /// Run `f` for both sides concurrently and wait for both.
    ///
    /// If both fail, the one that finished first wins.
    async fn for_both_sides<F, Fut>(&self, f: F) -> Result<SideOutputs, RunError>
    where
        F: Fn(Side) -> Fut,
        Fut: Future<Output = Result<PathBuf, RunError>>,
    {
        let timed = |side| {
            let fut = f(side);
            async move { (fut.await, Instant::now()) }
        };
        let (left, right) = tokio::join!(timed(Side::Left), timed(Side::Right));
        match (left, right) {
            ((Ok(left), _), (Ok(right), _)) => Ok(SideOutputs { left, right }),
            ((Err(err), _), (Ok(_), _)) | ((Ok(_), _), (Err(err), _)) => Err(err),
            ((Err(left), left_at), (Err(right), right_at)) => {
                Err(if left_at <= right_at { left } else { right })
            }
        }
    }

    #[instrument(skip_all, fields(filters = self.config.preprocess.len()))]
    async fn preprocess(&self, outputs: SideOutputs) -> Result<SideOutputs, RunError> {
        if self.config.preprocess.is_empty() {
            return Ok(outputs);
        }
        let stages: Vec<Vec<String>> = self
            .config
            .preprocess
            .iter()
            .map(|script| shell_argv(&self.config.shell, script))
            .collect();
        let stages = stages.as_slice();
        let outputs = &outputs;
        self.for_both_sides(move |side| self.preprocess_side(side, outputs.get(side), stages))
            .await
    }

    async fn preprocess_side(
        &self,
        side: Side,
        input: &Path,
        stages: &[Vec<String>],
    ) -> Result<PathBuf, RunError> {
        debug!(%side, input = %input.display(), "start preprocess");
        let stdin = File::open(input).map_err(|e| {
            RunError::phase(
                Phase::Preprocess { index: 0, side },
                ExecError::io(format!("open {}", input.display()), e),
            )
        })?;

        let pending: Vec<PendingLog> = stages
            .iter()
            .enumerate()
            .map(|(index, argv)| {
                let log = PendingLog::start(argv.clone());
                if index == 0 { log.with_input(input) } else { log }
            })
            .collect();
        let result = PipelineRunner::new(self.workspace, self.shutdown.clone())
            .run(stdin, stages)
            .await;
        for log in pending {
            let log = log.finish(result.as_deref().ok(), result.as_ref().err());
            self.telemetry.record(log).await;
        }

        let out = result.map_err(|e| {
            RunError::phase(
                Phase::Preprocess {
                    index: e.index,
                    side,
                },
                e.source,
            )
        })?;
        debug!(%side, out = %out.display(), "end preprocess");
        Ok(out)
    }

    #[instrument(skip_all)]
    async fn diff<W>(&self, outputs: &SideOutputs, writer: &mut W) -> Result<(), RunError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let left_args = self.config.left_args();
        let right_args = self.config.right_args();
        let labels = self.config.label.then_some(DiffLabels {
            left: &left_args,
            right: &right_args,
        });
        let script = diff_script(&self.config.diff, &outputs.left, &outputs.right, labels);
        let argv = shell_argv(&self.config.shell, &script);
        debug!(command = ?argv, "start run diff");

        let pending = PendingLog::start(argv.clone());
        let result = run_to_writer(&argv, writer, &self.shutdown).await;
        self.telemetry
            .record(pending.finish(None, result.as_ref().err()))
            .await;
        debug!(ok = result.is_ok(), "end run diff");

        match result {
            Ok(()) => Ok(()),
            Err(ExecError::Cancelled) => Err(RunError::Cancelled),
            Err(err) => Err(RunError::Diff(err)),
        }
    }
}

/// Run all phases inside `workspace`, then close it.
///
/// `telemetry` is dropped before this returns, closing the queue if it was the last handle.
pub async fn run_in<W>(
    config: &Config,
    workspace: Workspace,
    telemetry: Telemetry,
    shutdown: Shutdown,
    writer: &mut W,
) -> Result<(), RunError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = Runner::new(config, &workspace, telemetry, shutdown)
        .run(writer)
        .await;
    let root = workspace.root().to_path_buf();
    if let Err(e) = workspace.close() {
        warn!(root = %root.display(), err = %e, "failed to remove workspace");
    }
    result
}

/// Compare left and right per `config`, writing the diff to `writer`.
///
/// Owns the workspace and the telemetry sink; the sink is drained before returning.
pub async fn compare<W>(config: &Config, writer: &mut W, shutdown: Shutdown) -> Result<(), RunError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let workspace = Workspace::open(config.work_dir.as_deref()).map_err(RunError::Workspace)?;
    debug!(
        root = %workspace.root().display(),
        persistent = workspace.is_persistent(),
        "workspace ready"
    );

    let (telemetry, rx) = Telemetry::channel(QUEUE_CAPACITY);
    let verbose = config.show_cmd_log;
    let sink = spawn_sink(rx, move |log| log_command(log, verbose));

    let result = run_in(config, workspace, telemetry, shutdown, writer).await;
    if let Err(e) = sink.await {
        warn!(err = %e, "telemetry sink failed");
    }
    result
}
