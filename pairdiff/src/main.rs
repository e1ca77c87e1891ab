//! `pairdiff`: compare the output of two commands.
//!
//! Flags come before the first `--`; everything after it is grouped into
//! common, left and right arguments.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

use pairdiff::config::{Config, Settings, load_settings};
use pairdiff::core::args::split_once;
use pairdiff::error::RunError;
use pairdiff::exit_codes;
use pairdiff::io::shutdown::{Shutdown, listen_for_signals};
use pairdiff::logging;
use pairdiff::run::compare;

const EXAMPLES: &str = "\
Usage: pairdiff [FLAGS] -- COMMON_ARGS [-- LEFT_ARGS [-- RIGHT_ARGS]]

Examples:
  # echo a > left; echo b > right; diff left right
  pairdiff -- echo -- a -- b

  # same, with a unified diff
  pairdiff -x 'diff -u' -- echo -- a -- b

  # sed 's|a|c|' on both outputs before diffing
  pairdiff -p 'sed \"s|a|c|\"' -- echo -- a -- b

  # filters apply in order: yq, then gron
  pairdiff -p \"yq -o json '.spec'\" -p gron -x 'diff -u' -- helm template chart -- --version 1.0 -- --version 1.1

  # render, switch branches, render again
  pairdiff -i 'git checkout release-2' -x 'diff -u' -- helm template ./charts/app

  # use a different delimiter when the commands themselves need `--`
  pairdiff -d '---' -- echo --- echo -- a --- echo -- b
";

#[derive(Parser, Debug)]
#[command(
    name = "pairdiff",
    version,
    about = "Compare the output of two commands with optional preprocessing and a customizable diff",
    after_long_help = EXAMPLES
)]
struct Cli {
    /// Enable debug logs.
    #[arg(long)]
    debug: bool,

    /// Working directory; temporary files are kept.
    #[arg(short = 'w', long, alias = "work_dir", value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Shell used to run interceptor, preprocess and diff commands [default: bash].
    #[arg(short, long)]
    shell: Option<String>,

    /// Token separating COMMON_ARGS, LEFT_ARGS and RIGHT_ARGS [default: --].
    #[arg(short, long, allow_hyphen_values = true)]
    delimiter: Option<String>,

    /// Exit successfully even if the diff command exits with status 1.
    #[arg(long)]
    success: bool,

    /// Run after the left command and before the right one. Repeatable.
    #[arg(short, long = "interceptor", value_name = "CMD")]
    interceptor: Vec<String>,

    /// Filter applied to both outputs before diffing; reads stdin, writes stdout. Repeatable.
    #[arg(short, long = "preprocess", value_name = "CMD")]
    preprocess: Vec<String>,

    /// Diff command, invoked as `DIFF LEFT_FILE RIGHT_FILE` [default: diff].
    #[arg(short = 'x', long)]
    diff: Option<String>,

    /// Pass `--label` with the effective arguments to the diff command.
    #[arg(long)]
    label: bool,

    /// Log every command record at info level.
    #[arg(long)]
    show_cmd_log: bool,

    /// TOML file with default settings; flags override it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Settings from `--config` (or defaults) with flags laid on top.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => load_settings(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(shell) = &self.shell {
            settings.shell.clone_from(shell);
        }
        if let Some(delimiter) = &self.delimiter {
            settings.delimiter.clone_from(delimiter);
        }
        if let Some(diff) = &self.diff {
            settings.diff.clone_from(diff);
        }
        if !self.interceptor.is_empty() {
            settings.interceptor.clone_from(&self.interceptor);
        }
        if !self.preprocess.is_empty() {
            settings.preprocess.clone_from(&self.preprocess);
        }
        settings.label |= self.label;
        settings.show_cmd_log |= self.show_cmd_log;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let (flags, args) = split_once(&argv, &"--".to_string());
    let cli = match Cli::try_parse_from(&flags) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            return exit(exit_codes::FAILURE);
        }
    };
    logging::init(cli.debug);
    debug!(args = ?flags, "parse args");
    debug!(args = ?args, "init args");

    let config = match build_config(&cli, &args) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return exit(exit_codes::FAILURE);
        }
    };

    let (trigger, shutdown) = Shutdown::new();
    let signals = listen_for_signals(trigger);
    let result = compare(&config, &mut tokio::io::stdout(), shutdown).await;
    signals.abort();

    match result {
        Ok(()) => exit(exit_codes::OK),
        Err(err) => exit(exit_code_for(&err, cli.success)),
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(exit_codes::FAILURE as u8))
}

fn build_config(cli: &Cli, args: &[String]) -> Result<Config> {
    let config = Config::new(cli.settings()?, args)
        .context("parse arguments")?
        .with_work_dir(cli.work_dir.clone())
        .with_debug(cli.debug);
    match serde_json::to_string(&config) {
        Ok(json) => debug!(json = %json, "config"),
        Err(e) => debug!(err = %e, "config is not serializable"),
    }
    Ok(config)
}

/// Map a failed run onto the process exit code.
///
/// The failing command's own code is propagated; `--success` turns a diff
/// exit of 1 into success.
fn exit_code_for(err: &RunError, success: bool) -> i32 {
    match err.exit_code() {
        Some(exit_codes::DIFF_FOUND) if err.is_diff() => {
            debug!("outputs differ");
            if success {
                exit_codes::OK
            } else {
                exit_codes::DIFF_FOUND
            }
        }
        Some(code) => {
            error!(err = %err, "comparison failed");
            code
        }
        None => {
            error!(err = %err, "comparison failed");
            exit_codes::FAILURE
        }
    }
}
