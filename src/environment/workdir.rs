//! Scoped Install Directory
//!
//! A temporary directory that exists for the lifetime of a guard value.
//! External commands are pointed at it with `current_dir`; the process
//! working directory never changes.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;

/// Name of the temporary install directory.
pub const INSTALL_DIR_NAME: &str = "tmpbcbio-install";

/// Temporary working directory removed on drop.
#[derive(Debug)]
pub struct ScopedWorkDir {
    path: PathBuf,
}

impl ScopedWorkDir {
    /// Creates `<parent>/tmpbcbio-install`.
    pub fn acquire(parent: &Path) -> Result<Self> {
        let path = parent.join(INSTALL_DIR_NAME);
        fs::create_dir_all(&path)?;
        debug!("Using install directory {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScopedWorkDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
