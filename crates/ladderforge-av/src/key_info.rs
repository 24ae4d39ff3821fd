//! AES key and key-info management for encrypted HLS output.
//!
//! ffmpeg reads a key-info file (`-hls_key_info_file`) with three lines: the
//! URI clients fetch the key from, the local key path, and the IV in hex.
//! With `-hls_flags periodic_rekey` it re-reads that file whenever it starts
//! a new segment, so rotating a key means writing a new key file and
//! rewriting the key-info file while the engine runs.

use crate::engine::LineListener;
use crate::files;
use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Default key length in bytes (AES-128).
pub const DEFAULT_KEY_LENGTH: usize = 16;

/// IV length in bytes; one AES block.
const IV_LENGTH: usize = 16;

/// Key and key-info state for one encrypted HLS session.
#[derive(Debug)]
pub struct KeyInfo {
    base_path: PathBuf,
    base_url: String,
    current_path: PathBuf,
    current_url: String,
    key_info_path: PathBuf,
    // Deletes the default key-info file when the controller is dropped.
    _key_info_guard: Option<TempPath>,
    suffix: String,
    length: usize,
    segments: Vec<String>,
    seen: HashSet<String>,
    since_rotation: usize,
    generations: usize,
    rotations: usize,
}

impl KeyInfo {
    /// Create a controller writing keys to `key_path`, served at `key_url`.
    ///
    /// The key's directory is created; the key-info file lives in a fresh
    /// temporary file unless [`with_key_info_path`](Self::with_key_info_path)
    /// is used. No key is written until [`generate`](Self::generate).
    pub fn new(key_path: impl Into<PathBuf>, key_url: impl Into<String>) -> Result<Self> {
        let key_path = key_path.into();
        let key_url = key_url.into();

        files::make_parent(&key_path)
            .map_err(|e| Error::key_generation(format!("cannot create key directory: {e}")))?;

        let key_info = tempfile::Builder::new()
            .prefix(files::TEMP_PREFIX)
            .suffix(".keyinfo")
            .tempfile()
            .map_err(|e| Error::key_generation(format!("cannot create key info file: {e}")))?
            .into_temp_path();

        Ok(Self {
            current_path: key_path.clone(),
            current_url: key_url.clone(),
            base_path: key_path,
            base_url: key_url,
            key_info_path: key_info.to_path_buf(),
            _key_info_guard: Some(key_info),
            suffix: String::new(),
            length: DEFAULT_KEY_LENGTH,
            segments: Vec::new(),
            seen: HashSet::new(),
            since_rotation: 0,
            generations: 0,
            rotations: 0,
        })
    }

    /// Key length in bytes.
    pub fn with_length(mut self, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::invalid_config("key length must be at least one byte"));
        }
        self.length = length;
        Ok(self)
    }

    /// Static suffix appended after the unique part of rotated key names.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Write the key-info file to a fixed path instead of a temporary file.
    pub fn with_key_info_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_info_path = path.into();
        self._key_info_guard = None;
        self
    }

    pub fn key_info_path(&self) -> &Path {
        &self.key_info_path
    }

    pub fn current_key_path(&self) -> &Path {
        &self.current_path
    }

    pub fn current_key_url(&self) -> &str {
        &self.current_url
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Segment lines observed so far, in the order they were first seen.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of successful [`generate`](Self::generate) calls.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Number of successful rotations triggered by observed segments.
    pub fn rotations(&self) -> usize {
        self.rotations
    }

    /// Write a new random key at the current key path, then rewrite the
    /// key-info file to point at it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if randomness is unavailable or a
    /// file cannot be written. Both files are replaced atomically and the
    /// key last, so on failure the previous key bytes are still in place.
    pub fn generate(&mut self) -> Result<()> {
        let path = self.current_path.clone();
        let url = self.current_url.clone();
        self.write_key(&path, &url)
    }

    fn write_key(&mut self, path: &Path, url: &str) -> Result<()> {
        let mut key = vec![0u8; self.length];
        let mut iv = [0u8; IV_LENGTH];
        OsRng
            .try_fill_bytes(&mut key)
            .and_then(|_| OsRng.try_fill_bytes(&mut iv))
            .map_err(|e| Error::key_generation(format!("random source unavailable: {e}")))?;

        let staged = files::stage(path, &key).map_err(|e| {
            Error::key_generation(format!("cannot write key {}: {e}", path.display()))
        })?;

        let contents = format!("{}\n{}\n{}", url, path.display(), hex::encode(iv));
        files::write_atomic(&self.key_info_path, contents.as_bytes()).map_err(|e| {
            Error::key_generation(format!(
                "cannot write key info {}: {e}",
                self.key_info_path.display()
            ))
        })?;

        // The key only lands at `path` once the key-info file names it.
        staged.persist(path).map_err(|e| {
            Error::key_generation(format!("cannot write key {}: {}", path.display(), e.error))
        })?;

        self.generations += 1;
        tracing::debug!("generated key {} ({})", path.display(), url);
        Ok(())
    }

    /// Rotate to a fresh key under a new unique name.
    ///
    /// The new path and URL only become current once both files are written.
    pub fn rotate(&mut self) -> Result<()> {
        let unique = format!("_{}{}", uuid::Uuid::new_v4().simple(), self.suffix);
        let mut path = self.base_path.clone().into_os_string();
        path.push(&unique);
        let path = PathBuf::from(path);
        let url = format!("{}{}", self.base_url, unique);

        self.write_key(&path, &url)?;

        self.current_path = path;
        self.current_url = url;
        self.rotations += 1;
        tracing::info!("rotated encryption key to {}", self.current_url);
        Ok(())
    }

    /// Feed one engine line. Lines containing `needle` that were never seen
    /// before are recorded; every `period` new lines trigger a rotation.
    ///
    /// Returns whether this line triggered a rotation. A failed rotation
    /// keeps the previous key; the counter is reset so the next `period`
    /// segments try again.
    pub fn observe(&mut self, line: &str, period: usize, needle: &str) -> Result<bool> {
        if period == 0 || !line.contains(needle) || self.seen.contains(line) {
            return Ok(false);
        }

        self.seen.insert(line.to_string());
        self.segments.push(line.to_string());
        self.since_rotation += 1;

        if self.since_rotation < period {
            return Ok(false);
        }
        self.since_rotation = 0;
        self.rotate()?;
        Ok(true)
    }

    /// Listener that rotates this controller's key every `period` segments.
    pub fn rotation_listener(
        &mut self,
        period: usize,
        needle: impl Into<String>,
    ) -> Result<RotationListener<'_>> {
        if period == 0 {
            return Err(Error::invalid_config("key rotation period must be positive"));
        }
        Ok(RotationListener {
            key_info: self,
            period,
            needle: needle.into(),
        })
    }
}

/// [`LineListener`] wiring a [`KeyInfo`] into the engine's line stream.
pub struct RotationListener<'a> {
    key_info: &'a mut KeyInfo,
    period: usize,
    needle: String,
}

impl LineListener for RotationListener<'_> {
    fn on_line(&mut self, line: &str) -> Result<()> {
        self.key_info
            .observe(line, self.period, &self.needle)
            .map(|_| ())
    }
}
