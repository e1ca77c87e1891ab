//! Settings file (`--config`, TOML) and the validated run configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::args::ArgGroups;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no args")]
    NoArgs,
    #[error("no left args")]
    NoLeftArgs,
    #[error("no right args")]
    NoRightArgs,
    #[error("{0} must not be empty")]
    EmptySetting(&'static str),
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Defaults that can live in a TOML file and be overridden by flags.
///
/// Missing fields take the same defaults as the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Shell used to interpret interceptor, preprocess and diff strings.
    pub shell: String,
    /// Diff command, invoked as `diff LEFT RIGHT`.
    pub diff: String,
    /// Token separating common, left and right arguments.
    pub delimiter: String,
    /// Commands run between left and right generation.
    pub interceptor: Vec<String>,
    /// Filters applied to both outputs before diffing.
    pub preprocess: Vec<String>,
    /// Pass `--label` arguments to the diff command.
    pub label: bool,
    /// Emit per-command records at info level.
    pub show_cmd_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            diff: "diff".to_string(),
            delimiter: "--".to_string(),
            interceptor: Vec::new(),
            preprocess: Vec::new(),
            label: false,
            show_cmd_log: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.trim().is_empty() {
            return Err(ConfigError::EmptySetting("shell"));
        }
        if self.diff.trim().is_empty() {
            return Err(ConfigError::EmptySetting("diff"));
        }
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptySetting("delimiter"));
        }
        Ok(())
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Settings = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Validated configuration for one comparison run.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub interceptor: Vec<String>,
    pub preprocess: Vec<String>,
    pub diff: String,
    pub shell: String,
    pub delimiter: String,
    pub args: ArgGroups,
    /// Pinned working directory; temporary files are kept when set.
    pub work_dir: Option<PathBuf>,
    pub debug: bool,
    pub label: bool,
    pub show_cmd_log: bool,
}

impl Config {
    /// Group `args` by the settings' delimiter and freeze everything.
    pub fn new(settings: Settings, args: &[String]) -> Result<Self, ConfigError> {
        settings.validate()?;
        let groups = ArgGroups::parse(args, &settings.delimiter)?;
        Ok(Self {
            interceptor: settings.interceptor,
            preprocess: settings.preprocess,
            diff: settings.diff,
            shell: settings.shell,
            delimiter: settings.delimiter,
            args: groups,
            work_dir: None,
            debug: false,
            label: settings.label,
            show_cmd_log: settings.show_cmd_log,
        })
    }

    pub fn with_work_dir(mut self, work_dir: Option<PathBuf>) -> Self {
        self.work_dir = work_dir;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn left_args(&self) -> Vec<String> {
        self.args.left_args()
    }

    pub fn right_args(&self) -> Vec<String> {
        self.args.right_args()
    }
}
