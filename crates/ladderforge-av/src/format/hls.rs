//! HLS output mapping: one ffmpeg output per representation.

use super::{kbps, split_output, OutputContext};
use crate::key_info::KeyInfo;
use crate::playlist::{rendition_label, rendition_playlist_name, SegmentType};
use crate::representation::Ladder;
use crate::{Error, Result};
use std::path::Path;

/// Default target segment duration in seconds.
pub const DEFAULT_SEGMENT_DURATION: u32 = 10;

/// HLS packaging parameters.
#[derive(Debug)]
pub struct HlsOptions {
    /// Target segment duration (`-hls_time`).
    pub segment_duration: Option<u32>,
    pub segment_type: SegmentType,
    /// Emits `-hls_allow_cache 1|0`.
    pub allow_cache: bool,
    /// Prefix written in front of segment URIs.
    pub base_url: Option<String>,
    /// Sub-directory (relative to the manifest) receiving the segments.
    pub seg_sub_directory: Option<String>,
    /// Extra `-hls_flags` values.
    pub flags: Vec<String>,
    /// Extra master playlist header lines.
    pub playlist_header: Vec<String>,
    /// Key controller, when the output is encrypted.
    pub encryption: Option<KeyInfo>,
    /// Rotate the key every this many new segments.
    pub key_rotation_period: Option<usize>,
    /// Line fragment identifying a new segment; defaults to
    /// `.<ext>' for writing`.
    pub segment_needle: Option<String>,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            segment_duration: Some(DEFAULT_SEGMENT_DURATION),
            segment_type: SegmentType::default(),
            allow_cache: true,
            base_url: None,
            seg_sub_directory: None,
            flags: Vec::new(),
            playlist_header: Vec::new(),
            encryption: None,
            key_rotation_period: None,
            segment_needle: None,
        }
    }
}

impl HlsOptions {
    pub fn with_segment_duration(mut self, seconds: u32) -> Self {
        self.segment_duration = Some(seconds);
        self
    }

    pub fn fragmented_mp4(mut self, enabled: bool) -> Self {
        self.segment_type = if enabled {
            SegmentType::Fmp4
        } else {
            SegmentType::MpegTs
        };
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_seg_sub_directory(mut self, dir: impl Into<String>) -> Self {
        self.seg_sub_directory = Some(dir.into());
        self
    }

    /// Encrypt segments with keys from `key_info`.
    pub fn encrypt(mut self, key_info: KeyInfo) -> Self {
        self.encryption = Some(key_info);
        self
    }

    /// Rotate the encryption key every `period` new segments.
    pub fn rotate_every(mut self, period: usize) -> Self {
        self.key_rotation_period = Some(period);
        self
    }

    /// Fragment of the engine line announcing a new segment.
    pub fn needle(&self) -> String {
        self.segment_needle
            .clone()
            .unwrap_or_else(|| format!(".{}' for writing", self.segment_type.extension()))
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    pub(super) fn validate(&self, ladder: &Ladder) -> Result<()> {
        if ladder.is_empty() {
            return Err(Error::invalid_config(
                "HLS packaging needs at least one representation",
            ));
        }
        match self.segment_duration {
            None | Some(0) => {
                return Err(Error::invalid_config(
                    "HLS packaging needs a positive segment duration",
                ))
            }
            Some(_) => {}
        }
        match (self.key_rotation_period, &self.encryption) {
            (Some(0), _) => Err(Error::invalid_config(
                "key rotation period must be positive",
            )),
            (Some(_), None) => Err(Error::invalid_config(
                "key rotation requires encryption to be configured",
            )),
            _ => Ok(()),
        }
    }

    fn hls_flags(&self) -> Option<String> {
        let mut flags = self.flags.clone();
        if self.key_rotation_period.is_some() && !flags.iter().any(|f| f == "periodic_rekey") {
            flags.push("periodic_rekey".to_string());
        }
        if flags.is_empty() {
            None
        } else {
            Some(flags.join("+"))
        }
    }

    fn segment_base_url(&self) -> Option<String> {
        match (&self.base_url, &self.seg_sub_directory) {
            (None, None) => None,
            (Some(url), None) => Some(url.clone()),
            (url, Some(sub)) => Some(format!(
                "{}{}/",
                url.as_deref().unwrap_or(""),
                sub.trim_matches('/')
            )),
        }
    }

    pub(super) fn output_args(&self, ctx: &OutputContext<'_>, output: &Path) -> Vec<String> {
        let (dir, stem) = split_output(output);
        let segment_dir = match &self.seg_sub_directory {
            Some(sub) => dir.join(sub.trim_matches('/')),
            None => dir.clone(),
        };
        let duration = self
            .segment_duration
            .unwrap_or(DEFAULT_SEGMENT_DURATION)
            .to_string();
        let base_url = self.segment_base_url();
        let flags = self.hls_flags();
        let ext = self.segment_type.extension();

        let mut args = Vec::new();
        for rep in ctx.ladder {
            let label = rendition_label(rep);

            args.extend(["-c:v".to_string(), ctx.codecs.video.clone()]);
            args.extend(["-c:a".to_string(), ctx.codecs.audio.clone()]);
            if let Some(size) = rep.size_string() {
                args.extend(["-s:v".to_string(), size]);
            }
            args.extend(["-b:v".to_string(), kbps(rep.kilo_bitrate())]);
            if let Some(audio) = rep.audio_kilo_bitrate() {
                args.extend(["-b:a".to_string(), kbps(audio)]);
            }

            args.extend(["-f".to_string(), "hls".to_string()]);
            args.extend(["-hls_time".to_string(), duration.clone()]);
            args.extend(["-hls_list_size".to_string(), "0".to_string()]);
            args.extend([
                "-hls_allow_cache".to_string(),
                if self.allow_cache { "1" } else { "0" }.to_string(),
            ]);
            args.extend([
                "-hls_segment_type".to_string(),
                self.segment_type.ffmpeg_name().to_string(),
            ]);
            if self.segment_type == SegmentType::Fmp4 {
                args.extend([
                    "-hls_fmp4_init_filename".to_string(),
                    format!("{stem}_{label}_init.mp4"),
                ]);
            }
            args.extend([
                "-hls_segment_filename".to_string(),
                segment_dir
                    .join(format!("{stem}_{label}_%04d.{ext}"))
                    .to_string_lossy()
                    .to_string(),
            ]);
            if let Some(url) = &base_url {
                args.extend(["-hls_base_url".to_string(), url.clone()]);
            }
            if let Some(key_info) = &self.encryption {
                args.extend([
                    "-hls_key_info_file".to_string(),
                    key_info.key_info_path().to_string_lossy().to_string(),
                ]);
            }
            if let Some(flags) = &flags {
                args.extend(["-hls_flags".to_string(), flags.clone()]);
            }

            ctx.trailing(&mut args);
            args.push(
                dir.join(rendition_playlist_name(&stem, rep))
                    .to_string_lossy()
                    .to_string(),
            );
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Codecs;
    use crate::representation::Representation;

    fn ladder() -> Ladder {
        vec![
            Representation::new(640, 360, 800).unwrap(),
            Representation::new(1280, 720, 2500)
                .unwrap()
                .with_audio_kilo_bitrate(128)
                .unwrap(),
        ]
        .into_iter()
        .collect()
    }

    fn args_for(opts: &HlsOptions, ladder: &Ladder) -> Vec<String> {
        let codecs = Codecs::default();
        let ctx = OutputContext {
            ladder,
            codecs: &codecs,
            additional: &[],
            strict: None,
        };
        opts.output_args(&ctx, Path::new("/out/movie.m3u8"))
    }

    #[test]
    fn one_output_per_representation_in_order() {
        let ladder = ladder();
        let args = args_for(&HlsOptions::default(), &ladder);

        let outputs: Vec<&String> = args.iter().filter(|a| a.ends_with(".m3u8")).collect();
        assert_eq!(outputs, ["/out/movie_360p.m3u8", "/out/movie_720p.m3u8"]);

        assert!(args
            .windows(2)
            .any(|w| w[0] == "-hls_segment_filename" && w[1] == "/out/movie_720p_%04d.ts"));
        assert_eq!(args.iter().filter(|a| *a == "-b:a").count(), 1);
    }

    #[test]
    fn sub_directory_and_base_url() {
        let ladder = ladder();
        let opts = HlsOptions::default()
            .with_base_url("https://cdn.example/v/")
            .with_seg_sub_directory("ts");
        let args = args_for(&opts, &ladder);

        assert!(args
            .windows(2)
            .any(|w| w[0] == "-hls_segment_filename" && w[1] == "/out/ts/movie_360p_%04d.ts"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-hls_base_url" && w[1] == "https://cdn.example/v/ts/"));
    }

    #[test]
    fn fmp4_segments() {
        let ladder = ladder();
        let opts = HlsOptions::default().fragmented_mp4(true);
        let args = args_for(&opts, &ladder);

        assert!(args.windows(2).any(|w| w[0] == "-hls_segment_type" && w[1] == "fmp4"));
        assert!(args.iter().any(|a| a == "movie_360p_init.mp4"));
        assert_eq!(opts.needle(), ".m4s' for writing");
    }

    #[test]
    fn validation_rules() {
        let empty = Ladder::new();
        assert!(matches!(
            HlsOptions::default().validate(&empty),
            Err(Error::InvalidConfiguration(_))
        ));

        let ladder = ladder();
        let mut opts = HlsOptions::default();
        opts.segment_duration = None;
        assert!(opts.validate(&ladder).is_err());

        let opts = HlsOptions::default().rotate_every(5);
        assert!(matches!(
            opts.validate(&ladder),
            Err(Error::InvalidConfiguration(_))
        ));

        assert!(HlsOptions::default().validate(&ladder).is_ok());
    }

    #[test]
    fn rotation_adds_periodic_rekey() {
        let dir = tempfile::tempdir().unwrap();
        let key = KeyInfo::new(dir.path().join("k/key"), "https://k.example/key").unwrap();
        let info_path = key.key_info_path().to_string_lossy().to_string();
        let opts = HlsOptions::default().encrypt(key).rotate_every(3);
        let args = args_for(&opts, &ladder());

        assert!(args
            .windows(2)
            .any(|w| w[0] == "-hls_key_info_file" && w[1] == info_path));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-hls_flags" && w[1] == "periodic_rekey"));
    }
}
