//! Temporary output slots for captured command output.
//!
//! Every execution gets its own directory under the workspace root holding a
//! single `out` file, so concurrent executions never share a path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::debug;

const ROOT_PREFIX: &str = "pairdiff";
const SLOT_PREFIX: &str = "slot";
const OUT_FILE: &str = "out";

/// Allocate a fresh slot under `parent` and return its (not yet created) output path.
///
/// Uniqueness comes from exclusive directory creation, not from the caller.
pub fn new_slot(parent: &Path) -> io::Result<PathBuf> {
    let dir = Builder::new()
        .prefix(SLOT_PREFIX)
        .tempdir_in(parent)?
        .keep();
    Ok(dir.join(OUT_FILE))
}

/// Root directory that owns all slots for one run.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl Workspace {
    /// Auto-allocated root under the system temp dir; removed on [`Workspace::close`].
    pub fn temporary() -> io::Result<Self> {
        Self::temporary_in(&std::env::temp_dir())
    }

    /// Auto-allocated root under `parent`; removed on [`Workspace::close`].
    pub fn temporary_in(parent: &Path) -> io::Result<Self> {
        let temp = Builder::new().prefix(ROOT_PREFIX).tempdir_in(parent)?;
        Ok(Self {
            root: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    /// Caller-supplied root; slots are kept after the run.
    pub fn pinned(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            root: dir.to_path_buf(),
            temp: None,
        })
    }

    /// Pinned if `work_dir` is set, temporary otherwise.
    pub fn open(work_dir: Option<&Path>) -> io::Result<Self> {
        match work_dir {
            Some(dir) => Self::pinned(dir),
            None => Self::temporary(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_persistent(&self) -> bool {
        self.temp.is_none()
    }

    pub fn new_slot(&self) -> io::Result<PathBuf> {
        new_slot(&self.root)
    }

    /// Remove the root recursively unless it was pinned.
    pub fn close(self) -> io::Result<()> {
        match self.temp {
            Some(temp) => {
                debug!(root = %self.root.display(), "removing workspace");
                temp.close()
            }
            None => Ok(()),
        }
    }
}
