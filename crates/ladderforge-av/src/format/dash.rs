//! DASH output mapping: one video stream per representation, a shared audio
//! stream, and a single `.mpd` output.

use super::{kbps, OutputContext};
use crate::representation::Ladder;
use crate::{Error, Result};
use std::path::Path;

/// Video streams in one adaptation set, audio in another.
pub const DEFAULT_ADAPTATION_SETS: &str = "id=0,streams=v id=1,streams=a";

/// DASH packaging parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashOptions {
    /// Segment duration in seconds (`-seg_duration`).
    pub segment_duration: Option<u32>,
    pub adaptation_sets: String,
    /// Also write an HLS playlist next to the MPD (`-hls_playlist 1`).
    pub generate_hls_playlist: bool,
}

impl Default for DashOptions {
    fn default() -> Self {
        Self {
            segment_duration: Some(super::DEFAULT_SEGMENT_DURATION),
            adaptation_sets: DEFAULT_ADAPTATION_SETS.to_string(),
            generate_hls_playlist: false,
        }
    }
}

impl DashOptions {
    pub fn with_segment_duration(mut self, seconds: u32) -> Self {
        self.segment_duration = Some(seconds);
        self
    }

    pub(super) fn validate(&self, ladder: &Ladder) -> Result<()> {
        if ladder.is_empty() {
            return Err(Error::invalid_config(
                "DASH packaging needs at least one representation",
            ));
        }
        match self.segment_duration {
            None | Some(0) => Err(Error::invalid_config(
                "DASH packaging needs a positive segment duration",
            )),
            Some(_) => Ok(()),
        }
    }

    pub(super) fn output_args(&self, ctx: &OutputContext<'_>, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        for (i, rep) in ctx.ladder.iter().enumerate() {
            args.extend(["-map".to_string(), "0:v:0".to_string()]);
            if let Some(size) = rep.size_string() {
                args.extend([format!("-s:v:{i}"), size]);
            }
            args.extend([format!("-b:v:{i}"), kbps(rep.kilo_bitrate())]);
        }

        args.extend(["-map".to_string(), "0:a:0?".to_string()]);
        if let Some(audio) = ctx.ladder.iter().filter_map(|r| r.audio_kilo_bitrate()).max() {
            args.extend(["-b:a".to_string(), kbps(audio)]);
        }

        args.extend(["-c:v".to_string(), ctx.codecs.video.clone()]);
        args.extend(["-c:a".to_string(), ctx.codecs.audio.clone()]);
        args.extend(["-use_timeline".to_string(), "1".to_string()]);
        args.extend(["-use_template".to_string(), "1".to_string()]);
        args.extend([
            "-seg_duration".to_string(),
            self.segment_duration
                .unwrap_or(super::DEFAULT_SEGMENT_DURATION)
                .to_string(),
        ]);
        args.extend(["-adaptation_sets".to_string(), self.adaptation_sets.clone()]);
        if self.generate_hls_playlist {
            args.extend(["-hls_playlist".to_string(), "1".to_string()]);
        }
        args.extend(["-f".to_string(), "dash".to_string()]);

        ctx.trailing(&mut args);
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Codecs;
    use crate::representation::Representation;

    #[test]
    fn maps_each_representation_then_single_manifest() {
        let ladder: Ladder = vec![
            Representation::new(1920, 1080, 4000)
                .unwrap()
                .with_audio_kilo_bitrate(96)
                .unwrap(),
            Representation::new(640, 360, 800)
                .unwrap()
                .with_audio_kilo_bitrate(128)
                .unwrap(),
        ]
        .into_iter()
        .collect();
        let codecs = Codecs::default();
        let ctx = OutputContext {
            ladder: &ladder,
            codecs: &codecs,
            additional: &["-preset".to_string(), "fast".to_string()],
            strict: Some("-2"),
        };

        let args = DashOptions::default().output_args(&ctx, Path::new("/out/movie.mpd"));

        let sizes: Vec<&String> = args
            .windows(2)
            .filter(|w| w[0].starts_with("-s:v:"))
            .map(|w| &w[1])
            .collect();
        assert_eq!(sizes, ["1920x1080", "640x360"]);
        assert!(args.windows(2).any(|w| w[0] == "-b:v:1" && w[1] == "800k"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "128k"));
        assert!(args.windows(2).any(|w| w[0] == "-seg_duration" && w[1] == "10"));

        let tail = &args[args.len() - 5..];
        assert_eq!(tail, ["-strict", "-2", "-preset", "fast", "/out/movie.mpd"]);
    }

    #[test]
    fn requires_ladder_and_duration() {
        assert!(DashOptions::default().validate(&Ladder::new()).is_err());

        let ladder: Ladder = vec![Representation::new(640, 360, 800).unwrap()]
            .into_iter()
            .collect();
        let opts = DashOptions {
            segment_duration: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            opts.validate(&ladder),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(DashOptions::default().validate(&ladder).is_ok());
    }
}
