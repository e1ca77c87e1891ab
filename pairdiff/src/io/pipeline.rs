//! Multi-stage pipelines joined by OS pipes.
//!
//! Only the final stage writes to the workspace; interior stages stream
//! straight into each other.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, instrument, warn};

use crate::error::{ExecError, StageError};
use crate::io::process::{command, spawn, wait};
use crate::io::shutdown::Shutdown;
use crate::io::workspace::Workspace;

/// Runs `stage[0] < stdin | stage[1] | ... | stage[n-1] > slot`.
#[derive(Debug, Clone)]
pub struct PipelineRunner<'a> {
    workspace: &'a Workspace,
    shutdown: Shutdown,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(workspace: &'a Workspace, shutdown: Shutdown) -> Self {
        Self {
            workspace,
            shutdown,
        }
    }

    /// Start every stage, then wait for all of them.
    ///
    /// Returns the path holding the last stage's stdout, or the first stage to fail.
    #[instrument(skip_all, fields(stages = stages.len()))]
    pub async fn run(&self, stdin: File, stages: &[Vec<String>]) -> Result<PathBuf, StageError> {
        let Some(last) = stages.len().checked_sub(1) else {
            return Err(StageError {
                index: 0,
                source: ExecError::EmptyCommand,
            });
        };

        let out = self.workspace.new_slot().map_err(|e| StageError {
            index: last,
            source: ExecError::io("allocate slot", e),
        })?;
        let mut stdout = Some(File::create(&out).map_err(|e| StageError {
            index: last,
            source: ExecError::io(format!("create {}", out.display()), e),
        })?);

        let mut input = Some(Stdio::from(stdin));
        let mut children = Vec::with_capacity(stages.len());
        for (index, argv) in stages.iter().enumerate() {
            let at_stage = |source: ExecError| StageError { index, source };

            let mut cmd = command(argv).map_err(at_stage)?;
            let rendered = argv.join(" ");
            if let Some(input) = input.take() {
                cmd.stdin(input);
            }
            if index == last {
                if let Some(file) = stdout.take() {
                    cmd.stdout(file);
                }
            } else {
                cmd.stdout(Stdio::piped());
            }

            // Already-started stages are killed when `children` drops on error.
            let mut child = spawn(&mut cmd, &rendered).map_err(at_stage)?;
            if index != last {
                let pipe = child.stdout.take().ok_or_else(|| {
                    at_stage(ExecError::io(
                        "take stdout",
                        io::Error::other("stdout was not piped"),
                    ))
                })?;
                let piped = TryInto::<Stdio>::try_into(pipe)
                    .map_err(|e| at_stage(ExecError::io("connect pipe", e)))?;
                input = Some(piped);
            }
            children.push((index, rendered, child));
        }
        debug!(stages = children.len(), "all stages started");

        let mut pending: FuturesUnordered<_> = children
            .into_iter()
            .map(|(index, rendered, mut child)| {
                let shutdown = self.shutdown.clone();
                async move { (index, wait(&mut child, &rendered, &shutdown).await) }
            })
            .collect();

        let mut failure: Option<StageError> = None;
        while let Some((index, result)) = pending.next().await {
            if let Err(source) = result {
                warn!(stage = index, err = %source, "pipeline stage failed");
                failure.get_or_insert(StageError { index, source });
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }
}
