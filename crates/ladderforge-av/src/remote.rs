//! Remote destinations for finished output.
//!
//! The packager only needs "put this directory's files over there"; the
//! transport behind a [`RemoteTarget`] is the implementor's business.

use crate::files;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Somewhere finished output can be uploaded to.
pub trait RemoteTarget {
    /// Short name used in logs and errors.
    fn name(&self) -> String;

    /// Upload every file under `dir`, keeping relative paths.
    fn upload(&self, dir: &Path) -> Result<()>;
}

/// Mirrors output into another local directory (a mounted bucket, an NFS
/// export, a web root).
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    root: PathBuf,
}

impl DirectoryTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RemoteTarget for DirectoryTarget {
    fn name(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn upload(&self, dir: &Path) -> Result<()> {
        files::make_dir(&self.root).map_err(|e| Error::upload(self.name(), e.to_string()))?;
        files::copy_dir(dir, &self.root).map_err(|e| Error::upload(self.name(), e.to_string()))?;
        tracing::info!(
            "uploaded {} ({} bytes) to {}",
            dir.display(),
            files::directory_size(dir),
            self.name()
        );
        Ok(())
    }
}
