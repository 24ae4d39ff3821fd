//! Scoped ownership of a packaging session's filesystem resources.
//!
//! A [`Workspace`] is opened when a stream resolves its destination and
//! closed when the session ends, successfully or not. Closing removes the
//! temporary directory (if one was allocated) and, when the source itself is
//! temporary, the source file.
//!
//! The source is removed only after a grace delay: the engine may still hold
//! its input open for a moment after the process has exited. The delay is a
//! heuristic, not a handle-release acknowledgement.

use crate::files;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Default delay before a temporary source is deleted.
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Where a session's output lives and whether that place is temporary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceHandle {
    /// Primary output path (manifest or file) as currently known.
    pub final_path: PathBuf,
    /// Whether the output was produced in a temporary directory.
    pub is_temporary: bool,
    /// The temporary directory, while it exists.
    pub temporary_directory: Option<PathBuf>,
}

/// Filesystem resources held for the lifetime of one packaging session.
///
/// Call [`Workspace::close`] on every exit path; dropping an unclosed
/// workspace performs the same teardown and logs failures.
pub struct Workspace {
    temp_dir: Option<TempDir>,
    temporary_source: Option<PathBuf>,
    grace: Duration,
    closed: bool,
}

impl Workspace {
    /// Open a workspace, allocating a temporary directory when `with_temp_dir`.
    ///
    /// `temporary_source` is the source path to delete on close, if any.
    pub fn open(
        with_temp_dir: bool,
        temporary_source: Option<PathBuf>,
        grace: Duration,
    ) -> Result<Self> {
        let temp_dir = if with_temp_dir {
            let dir = files::temp_dir()?;
            tracing::debug!("allocated temporary directory {}", dir.path().display());
            Some(dir)
        } else {
            None
        };

        Ok(Self {
            temp_dir,
            temporary_source,
            grace,
            closed: false,
        })
    }

    /// Path to the temporary directory, if one was allocated.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|d| d.path())
    }

    /// Path for a named file inside the temporary directory.
    pub fn temp_file(&self, name: &str) -> Option<PathBuf> {
        self.temp_dir().map(|d| d.join(name))
    }

    /// Tear down: remove the temporary directory, then the temporary source
    /// after the grace delay. Both removals are attempted even if the first
    /// one fails; the first error is returned.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error: Option<Error> = None;

        if let Some(dir) = self.temp_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("failed to remove temporary directory {}: {}", path.display(), e);
                first_error.get_or_insert(Error::Io(e));
            } else {
                tracing::debug!("removed temporary directory {}", path.display());
            }
        }

        if let Some(source) = self.temporary_source.take() {
            if !self.grace.is_zero() {
                std::thread::sleep(self.grace);
            }
            if let Err(e) = files::remove(&source) {
                tracing::warn!("failed to remove temporary source {}: {}", source.display(), e);
                first_error.get_or_insert(e);
            } else {
                tracing::debug!("removed temporary source {}", source.display());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!("workspace teardown on drop failed: {}", e);
        }
    }
}
