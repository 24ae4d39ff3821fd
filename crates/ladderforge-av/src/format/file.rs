//! Single-file output.

use super::{kbps, OutputContext};
use crate::representation::Ladder;
use crate::{Error, Result};
use std::path::Path;

/// Parameters for packaging into one plain media file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOptions {
    /// Forced container (`-f`); otherwise ffmpeg picks it from the extension.
    pub container: Option<String>,
}

impl FileOptions {
    pub(super) fn validate(&self, ladder: &Ladder) -> Result<()> {
        if ladder.len() > 1 {
            return Err(Error::invalid_config(format!(
                "a single file holds one representation, got {}",
                ladder.len()
            )));
        }
        Ok(())
    }

    pub(super) fn output_args(&self, ctx: &OutputContext<'_>, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            ctx.codecs.video.clone(),
            "-c:a".to_string(),
            ctx.codecs.audio.clone(),
        ];

        if let Some(rep) = ctx.ladder.iter().next() {
            if let Some(size) = rep.size_string() {
                args.extend(["-s:v".to_string(), size]);
            }
            args.extend(["-b:v".to_string(), kbps(rep.kilo_bitrate())]);
            if let Some(audio) = rep.audio_kilo_bitrate() {
                args.extend(["-b:a".to_string(), kbps(audio)]);
            }
        }

        if let Some(container) = &self.container {
            args.extend(["-f".to_string(), container.clone()]);
        }

        ctx.trailing(&mut args);
        args.push(output.to_string_lossy().to_string());
        args
    }
}
