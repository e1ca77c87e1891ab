//! Helpers for running child processes with cancellation.
//!
//! Children inherit the environment and stderr. Stdout goes wherever the
//! caller needs it: a workspace slot, the ambient stderr, or a writer.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::io::shutdown::Shutdown;
use crate::io::workspace::Workspace;

/// Build a command from argv; the child is killed if its handle is dropped.
pub(crate) fn command(argv: &[String]) -> Result<Command, ExecError> {
    let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stderr(Stdio::inherit()).kill_on_drop(true);
    Ok(cmd)
}

pub(crate) fn spawn(cmd: &mut Command, rendered: &str) -> Result<Child, ExecError> {
    debug!(command = rendered, "spawning child process");
    cmd.spawn().map_err(|source| ExecError::Spawn {
        command: rendered.to_string(),
        source,
    })
}

/// Wait for `child` to exit, killing it if `shutdown` fires first.
pub(crate) async fn wait(
    child: &mut Child,
    rendered: &str,
    shutdown: &Shutdown,
) -> Result<(), ExecError> {
    let mut shutdown = shutdown.clone();
    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| ExecError::io(format!("wait `{rendered}`"), e))?,
        _ = shutdown.cancelled() => {
            warn!(command = rendered, "cancelled, killing child");
            let _ = child.kill().await;
            return Err(ExecError::Cancelled);
        }
    };
    debug!(command = rendered, exit_code = ?status.code(), "command finished");
    if status.success() {
        Ok(())
    } else {
        Err(ExecError::Exit {
            command: rendered.to_string(),
            status,
        })
    }
}

/// Runs one argv with stdout captured in a fresh workspace slot.
#[derive(Debug, Clone)]
pub struct ProcessRunner<'a> {
    workspace: &'a Workspace,
    shutdown: Shutdown,
}

impl<'a> ProcessRunner<'a> {
    pub fn new(workspace: &'a Workspace, shutdown: Shutdown) -> Self {
        Self {
            workspace,
            shutdown,
        }
    }

    /// Run `argv` and return the path holding its stdout.
    #[instrument(skip_all, fields(program = argv.first().map(String::as_str)))]
    pub async fn run(&self, argv: &[String]) -> Result<PathBuf, ExecError> {
        let mut cmd = command(argv)?;
        let rendered = argv.join(" ");

        let out = self
            .workspace
            .new_slot()
            .map_err(|e| ExecError::io("allocate slot", e))?;
        let stdout = File::create(&out)
            .map_err(|e| ExecError::io(format!("create {}", out.display()), e))?;
        cmd.stdout(stdout);

        let mut child = spawn(&mut cmd, &rendered)?;
        wait(&mut child, &rendered, &self.shutdown).await?;
        Ok(out)
    }
}

/// Run `argv` with both stdout and stderr sent to the ambient stderr.
///
/// Used for side-effecting commands whose output must never reach the diff output.
pub async fn run_to_stderr(argv: &[String], shutdown: &Shutdown) -> Result<(), ExecError> {
    let mut cmd = command(argv)?;
    let rendered = argv.join(" ");
    cmd.stdout(io::stderr());
    let mut child = spawn(&mut cmd, &rendered)?;
    wait(&mut child, &rendered, shutdown).await
}

/// Run `argv` streaming its stdout into `writer`.
pub async fn run_to_writer<W>(
    argv: &[String],
    writer: &mut W,
    shutdown: &Shutdown,
) -> Result<(), ExecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut cmd = command(argv)?;
    let rendered = argv.join(" ");
    cmd.stdout(Stdio::piped());
    let mut child = spawn(&mut cmd, &rendered)?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::io("take stdout", io::Error::other("stdout was not piped")))?;

    let mut cancel = shutdown.clone();
    let copied = tokio::select! {
        copied = tokio::io::copy(&mut stdout, writer) => copied,
        _ = cancel.cancelled() => {
            warn!(command = %rendered, "cancelled, killing child");
            let _ = child.kill().await;
            return Err(ExecError::Cancelled);
        }
    };
    copied.map_err(|e| ExecError::io("copy stdout", e))?;
    writer
        .flush()
        .await
        .map_err(|e| ExecError::io("flush stdout", e))?;
    drop(stdout);

    wait(&mut child, &rendered, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::argv;

    #[tokio::test]
    async fn run_captures_stdout_in_slot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let runner = ProcessRunner::new(&ws, Shutdown::never());

        let out = runner.run(&argv(&["echo", "hello"])).await.expect("run");

        assert_eq!(std::fs::read_to_string(&out).expect("read"), "hello\n");
        assert!(out.starts_with(ws.root()));
    }

    #[tokio::test]
    async fn run_rejects_empty_argv() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let runner = ProcessRunner::new(&ws, Shutdown::never());

        let err = runner.run(&[]).await.unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[tokio::test]
    async fn run_preserves_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let runner = ProcessRunner::new(&ws, Shutdown::never());

        let err = runner.run(&argv(&["sh", "-c", "exit 7"])).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(7));
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let runner = ProcessRunner::new(&ws, Shutdown::never());

        let err = runner
            .run(&argv(&["pairdiff-definitely-not-a-program"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
    }

    #[tokio::test]
    async fn run_inherits_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let runner = ProcessRunner::new(&ws, Shutdown::never());

        let out = runner
            .run(&argv(&["sh", "-c", "test -n \"$PATH\" && echo ok"]))
            .await
            .expect("run");
        assert_eq!(std::fs::read_to_string(&out).expect("read"), "ok\n");
    }

    #[tokio::test]
    async fn cancellation_kills_running_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::temporary_in(temp.path()).expect("workspace");
        let (trigger, shutdown) = Shutdown::new();
        let runner = ProcessRunner::new(&ws, shutdown);

        let sleep = argv(&["sleep", "30"]);
        let started = std::time::Instant::now();
        let run = runner.run(&sleep);
        let cancel = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(run, cancel);

        assert!(matches!(result, Err(ExecError::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn run_to_writer_streams_stdout() {
        let mut buf: Vec<u8> = Vec::new();
        run_to_writer(&argv(&["printf", "a\\nb\\n"]), &mut buf, &Shutdown::never())
            .await
            .expect("run");
        assert_eq!(buf, b"a\nb\n");
    }

    #[tokio::test]
    async fn run_to_writer_reports_exit_after_copying() {
        let mut buf: Vec<u8> = Vec::new();
        let err = run_to_writer(
            &argv(&["sh", "-c", "echo partial; exit 2"]),
            &mut buf,
            &Shutdown::never(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(buf, b"partial\n");
    }

    #[tokio::test]
    async fn run_to_stderr_keeps_stdout_out_of_capture() {
        run_to_stderr(&argv(&["echo", "side effect"]), &Shutdown::never())
            .await
            .expect("run");
        let err = run_to_stderr(&argv(&["false"]), &Shutdown::never())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }
}
