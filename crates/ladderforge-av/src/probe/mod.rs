//! Source media probing.
//!
//! Probing is a seam: packaging sessions ask a [`Prober`] for source
//! information (duration for progress, audio bitrate for manifest bandwidth,
//! raw fields for metadata export). The default implementation shells out to
//! ffprobe.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use types::*;

use crate::source::Source;
use crate::Result;
use std::path::PathBuf;

/// Something that can describe a source asset.
pub trait Prober {
    fn probe(&self, source: &Source) -> Result<MediaInfo>;
}

/// [`Prober`] backed by the ffprobe CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    path: PathBuf,
}

impl FfprobeProber {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Prober for FfprobeProber {
    fn probe(&self, source: &Source) -> Result<MediaInfo> {
        probe_with_ffprobe(&self.path, &source.input())
    }
}

/// [`Prober`] that returns fixed information; for sources that cannot be
/// probed (capture devices) or when the caller already knows the answer.
#[derive(Debug, Clone, Default)]
pub struct KnownMedia(pub MediaInfo);

impl Prober for KnownMedia {
    fn probe(&self, _source: &Source) -> Result<MediaInfo> {
        Ok(self.0.clone())
    }
}
