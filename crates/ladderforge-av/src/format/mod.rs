//! Packaging formats.
//!
//! A closed set of variants sharing two capabilities: the output mapping
//! arguments they append after the input, and the primary output path they
//! derive from the requested destination.

mod dash;
mod file;
mod hls;

pub use dash::{DashOptions, DEFAULT_ADAPTATION_SETS};
pub use file::FileOptions;
pub use hls::{HlsOptions, DEFAULT_SEGMENT_DURATION};

use crate::representation::Ladder;
use crate::Result;
use std::path::{Path, PathBuf};

/// Encoders applied to every output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codecs {
    pub video: String,
    pub audio: String,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            video: "libx264".to_string(),
            audio: "aac".to_string(),
        }
    }
}

/// Inputs shared by every format's output mapping.
pub(crate) struct OutputContext<'a> {
    pub ladder: &'a Ladder,
    pub codecs: &'a Codecs,
    /// Raw parameters placed before each output path.
    pub additional: &'a [String],
    pub strict: Option<&'a str>,
}

impl OutputContext<'_> {
    /// Caller-supplied trailing options for one output.
    fn trailing(&self, args: &mut Vec<String>) {
        if let Some(strict) = self.strict {
            args.push("-strict".to_string());
            args.push(strict.to_string());
        }
        args.extend(self.additional.iter().cloned());
    }
}

/// Target packaging mode.
#[derive(Debug)]
pub enum Format {
    Hls(HlsOptions),
    Dash(DashOptions),
    File(FileOptions),
}

impl Format {
    /// Name reported as the streaming technique in metadata.
    pub fn technique(&self) -> &'static str {
        match self {
            Format::Hls(_) => "HLS",
            Format::Dash(_) => "DASH",
            Format::File(_) => "StreamToFile",
        }
    }

    /// Manifest extension, for the manifest-producing formats.
    pub fn manifest_extension(&self) -> Option<&'static str> {
        match self {
            Format::Hls(_) => Some("m3u8"),
            Format::Dash(_) => Some("mpd"),
            Format::File(_) => None,
        }
    }

    /// Primary output for a requested destination: the manifest next to the
    /// requested name for HLS and DASH, the path itself for plain files.
    pub fn output_path(&self, requested: &Path) -> PathBuf {
        match self.manifest_extension() {
            Some(ext) => requested.with_extension(ext),
            None => requested.to_path_buf(),
        }
    }

    pub fn as_hls(&self) -> Option<&HlsOptions> {
        match self {
            Format::Hls(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_dash(&self) -> Option<&DashOptions> {
        match self {
            Format::Dash(d) => Some(d),
            _ => None,
        }
    }

    /// Check the profile fields this format requires.
    pub(crate) fn validate(&self, ladder: &Ladder) -> Result<()> {
        match self {
            Format::Hls(h) => h.validate(ladder),
            Format::Dash(d) => d.validate(ladder),
            Format::File(f) => f.validate(ladder),
        }
    }

    /// Output mapping arguments, ending with the output path(s).
    pub(crate) fn output_args(&self, ctx: &OutputContext<'_>, output: &Path) -> Vec<String> {
        match self {
            Format::Hls(h) => h.output_args(ctx, output),
            Format::Dash(d) => d.output_args(ctx, output),
            Format::File(f) => f.output_args(ctx, output),
        }
    }
}

/// Directory and file stem of an output path, as strings.
pub(crate) fn split_output(output: &Path) -> (PathBuf, String) {
    let dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "stream".to_string());
    (dir, stem)
}

/// Bitrate argument value, e.g. `2500k`.
pub(crate) fn kbps(value: u32) -> String {
    format!("{value}k")
}
