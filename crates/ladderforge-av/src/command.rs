//! Building the engine command line.
//!
//! [`CommandBuilder::build`] is pure: it reads the source, profile and output
//! path and returns an [`EngineInvocation`] without touching the filesystem.
//! Arguments are ordered as global options, then per-input options followed
//! by `-i <input>`, then the format's output mappings in ladder order.

use crate::engine::EngineInvocation;
use crate::format::{Codecs, Format, OutputContext};
use crate::representation::Ladder;
use crate::source::Source;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Everything about a packaging job except where its input and output live.
#[derive(Debug)]
pub struct Profile {
    pub format: Format,
    pub ladder: Ladder,
    pub codecs: Codecs,
    /// Encoder thread count (`-threads`).
    pub threads: Option<u32>,
    /// Value for `-strict`, e.g. `-2` for experimental encoders.
    pub strict: Option<String>,
    /// Raw engine parameters placed before each output path.
    pub additional_params: Vec<String>,
}

impl Profile {
    pub fn new(format: Format, ladder: Ladder) -> Self {
        Self {
            format,
            ladder,
            codecs: Codecs::default(),
            threads: None,
            strict: None,
            additional_params: Vec::new(),
        }
    }

    pub fn with_codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_strict(mut self, strict: impl Into<String>) -> Self {
        self.strict = Some(strict.into());
        self
    }

    pub fn with_additional_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_params
            .extend(params.into_iter().map(Into::into));
        self
    }

    /// Check the profile without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        self.format.validate(&self.ladder)?;
        if self.threads == Some(0) {
            return Err(Error::invalid_config("thread count must be positive"));
        }
        Ok(())
    }
}

/// Turns a source, a profile and an output path into an [`EngineInvocation`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    executable: PathBuf,
    working_directory: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_directory: None,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Build the invocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when the profile lacks fields
    /// its format requires (an empty ladder for HLS or DASH, a missing
    /// segment duration, rotation without encryption).
    pub fn build(&self, source: &Source, profile: &Profile, output: &Path) -> Result<EngineInvocation> {
        profile.validate()?;

        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ];
        if let Some(threads) = profile.threads {
            args.extend(["-threads".to_string(), threads.to_string()]);
        }

        args.extend(source.input_options().iter().cloned());
        args.extend(["-i".to_string(), source.input()]);

        let ctx = OutputContext {
            ladder: &profile.ladder,
            codecs: &profile.codecs,
            additional: &profile.additional_params,
            strict: profile.strict.as_deref(),
        };
        args.extend(profile.format.output_args(&ctx, output));

        Ok(EngineInvocation::new(
            self.executable.clone(),
            args,
            self.working_directory.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DashOptions, FileOptions, HlsOptions};
    use crate::representation::Representation;
    use crate::source::Platform;

    fn ladder() -> Ladder {
        vec![
            Representation::new(640, 360, 800).unwrap(),
            Representation::new(1280, 720, 2500).unwrap(),
            Representation::new(1920, 1080, 4000).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    fn position(args: &[String], value: &str) -> usize {
        args.iter().position(|a| a == value).unwrap()
    }

    #[test]
    fn globals_then_input_options_then_outputs() {
        let source = Source::capture("0", Some("0"), Platform::MacOs)
            .with_input_option("-framerate")
            .with_input_option("30");
        let profile = Profile::new(Format::Hls(HlsOptions::default()), ladder()).with_threads(4);

        let inv = CommandBuilder::new("ffmpeg")
            .build(&source, &profile, Path::new("/out/live.m3u8"))
            .unwrap();
        let args = inv.arguments();

        assert_eq!(&args[..5], ["-y", "-hide_banner", "-progress", "pipe:2", "-nostats"]);
        assert_eq!(&args[5..7], ["-threads", "4"]);
        assert_eq!(
            &args[7..13],
            ["-f", "avfoundation", "-framerate", "30", "-i", "0:0"]
        );

        let first = position(args, "/out/live_360p.m3u8");
        let second = position(args, "/out/live_720p.m3u8");
        let third = position(args, "/out/live_1080p.m3u8");
        assert!(position(args, "-i") < first && first < second && second < third);
        assert_eq!(inv.executable(), Path::new("ffmpeg"));
    }

    #[test]
    fn additional_params_precede_each_output() {
        let profile = Profile::new(Format::Hls(HlsOptions::default()), ladder())
            .with_additional_params(["-preset", "veryfast"]);
        let inv = CommandBuilder::new("ffmpeg")
            .build(&Source::file("in.mp4"), &profile, Path::new("out/m.m3u8"))
            .unwrap();

        let args = inv.arguments();
        for (i, arg) in args.iter().enumerate() {
            if arg.ends_with(".m3u8") {
                assert_eq!(args[i - 2], "-preset");
                assert_eq!(args[i - 1], "veryfast");
            }
        }
    }

    #[test]
    fn empty_ladder_is_invalid_for_manifest_formats() {
        let source = Source::file("in.mp4");
        for format in [
            Format::Hls(HlsOptions::default()),
            Format::Dash(DashOptions::default()),
        ] {
            let profile = Profile::new(format, Ladder::new());
            let err = CommandBuilder::new("ffmpeg")
                .build(&source, &profile, Path::new("out.m3u8"))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration(_)));
        }

        let file = Profile::new(Format::File(FileOptions::default()), Ladder::new());
        assert!(CommandBuilder::new("ffmpeg")
            .build(&source, &file, Path::new("out.mp4"))
            .is_ok());
    }

    #[test]
    fn missing_segment_duration_is_invalid() {
        let mut hls = HlsOptions::default();
        hls.segment_duration = None;
        let profile = Profile::new(Format::Hls(hls), ladder());
        assert!(matches!(
            CommandBuilder::new("ffmpeg").build(&Source::file("in.mp4"), &profile, Path::new("o.m3u8")),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn build_is_deterministic_and_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/never/created.mpd");
        let profile = Profile::new(Format::Dash(DashOptions::default()), ladder());
        let builder = CommandBuilder::new("ffmpeg").with_working_directory(dir.path());

        let a = builder.build(&Source::file("in.mp4"), &profile, &output).unwrap();
        let b = builder.build(&Source::file("in.mp4"), &profile, &output).unwrap();
        assert_eq!(a, b);
        assert!(!dir.path().join("nested").exists());
        assert_eq!(a.working_directory(), Some(dir.path()));
    }

    #[test]
    fn zero_threads_is_invalid() {
        let profile = Profile::new(Format::Dash(DashOptions::default()), ladder()).with_threads(0);
        assert!(matches!(profile.validate(), Err(Error::InvalidConfiguration(_))));
        assert!(CommandBuilder::new("ffmpeg")
            .build(&Source::file("in.mp4"), &profile, Path::new("o.mpd"))
            .is_err());
    }
}
