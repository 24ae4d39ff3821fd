//! Filesystem helpers shared by streams, key rotation and metadata export.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;

/// Prefix for every temporary directory or file this crate creates.
pub const TEMP_PREFIX: &str = "ladderforge-";

/// Create a directory and all of its parents.
pub fn make_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create {}: {e}", path.display()),
        ))
    })
}

/// Create the parent directory of `path`, if it has one.
pub fn make_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => make_dir(parent),
        None => Ok(()),
    }
}

/// Allocate a fresh temporary directory.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir()
        .map_err(Error::Io)
}

/// Write `contents` to an unnamed sibling of `path` without touching `path`.
///
/// The caller decides when to `persist` the staged file over `path`; dropping
/// it discards the contents.
pub fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    make_dir(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    Ok(tmp)
}

/// Write `contents` to `path` atomically: a sibling temp file is written and
/// then renamed over the destination, so readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    stage(path, contents)?
        .persist(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Total size in bytes of all regular files below `path`.
///
/// Missing directories count as zero.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Move every entry of `src` into `dest`, creating `dest` if needed.
///
/// Entries are renamed when possible and copied otherwise (e.g. across
/// filesystems). Existing destination files are overwritten.
pub fn move_dir_contents(src: &Path, dest: &Path) -> Result<()> {
    make_dir(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());

        if fs::rename(entry.path(), &target).is_err() {
            if entry.file_type()?.is_dir() {
                copy_dir(&entry.path(), &target)?;
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::copy(entry.path(), &target)?;
                fs::remove_file(entry.path())?;
            }
        }
    }

    Ok(())
}

/// Recursively copy `src` into `dest`.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            make_dir(&target)?;
        } else {
            make_parent(&target)?;
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
