//! Packaging sessions.
//!
//! A [`Stream`] owns one packaging job from configuration to teardown:
//!
//! ```text
//! Configuring -> PathResolved -> Running -> Completed | Failed
//!             -> Finalizing (upload / move) -> Closed
//! ```
//!
//! Filesystem resources are held by a [`Workspace`] that is closed on every
//! exit path, so the temporary directory and a temporary source are removed
//! whether the engine succeeded or not.

use crate::command::{CommandBuilder, Profile};
use crate::engine::{self, LineListener, Progress, ProgressListener};
use crate::files;
use crate::format::{DashOptions, FileOptions, Format, HlsOptions};
use crate::key_info::RotationListener;
use crate::playlist::PlaylistWriter;
use crate::probe::{FfprobeProber, MediaInfo, Prober};
use crate::remote::RemoteTarget;
use crate::representation::{Ladder, Representation};
use crate::source::{Source, SourceKind};
use crate::tools::Toolchain;
use crate::workspace::{ResourceHandle, Workspace, DEFAULT_TEARDOWN_GRACE};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest output path accepted, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// Where a packaging session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Configuring,
    PathResolved,
    Running,
    Completed,
    Failed,
    Finalizing,
    Closed,
}

/// Where finished output should end up.
#[derive(Default)]
pub struct Destination {
    /// Local output path. With a remote target, the output is moved here
    /// after the upload.
    pub local: Option<PathBuf>,
    /// Remote target; output is produced in a temporary directory first.
    pub remote: Option<Box<dyn RemoteTarget>>,
}

impl Destination {
    /// No explicit destination: output goes next to the source.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local: Some(path.into()),
            remote: None,
        }
    }

    pub fn remote(target: impl RemoteTarget + 'static) -> Self {
        Self {
            local: None,
            remote: Some(Box::new(target)),
        }
    }

    /// Also keep a local copy at `path` after uploading.
    pub fn and_local(mut self, path: impl Into<PathBuf>) -> Self {
        self.local = Some(path.into());
        self
    }
}

/// Result of a successful packaging run.
#[derive(Debug)]
pub struct PackagingReport {
    /// Primary output (manifest or file) at its final location.
    pub output: PathBuf,
    /// Engine output lines read.
    pub lines: usize,
    /// Key rotations performed while encoding.
    pub rotations: usize,
    /// Listener failures that were logged but did not stop the run.
    pub listener_errors: Vec<Error>,
}

/// One packaging session.
pub struct Stream {
    source: Source,
    profile: Profile,
    toolchain: Toolchain,
    grace: Duration,
    prober: Option<Box<dyn Prober>>,
    media_info: Option<MediaInfo>,
    probed: bool,
    on_progress: Option<Box<dyn FnMut(Progress)>>,
    state: SessionState,
    handle: ResourceHandle,
}

impl Stream {
    pub fn new(source: Source, profile: Profile) -> Self {
        let handle = ResourceHandle {
            final_path: source.path().map(Path::to_path_buf).unwrap_or_default(),
            is_temporary: false,
            temporary_directory: None,
        };
        Self {
            source,
            profile,
            toolchain: Toolchain::default(),
            grace: DEFAULT_TEARDOWN_GRACE,
            prober: None,
            media_info: None,
            probed: false,
            on_progress: None,
            state: SessionState::Configuring,
            handle,
        }
    }

    /// HLS packaging of `ladder`.
    pub fn hls(source: Source, options: HlsOptions, ladder: Ladder) -> Self {
        Self::new(source, Profile::new(Format::Hls(options), ladder))
    }

    /// DASH packaging of `ladder`.
    pub fn dash(source: Source, options: DashOptions, ladder: Ladder) -> Self {
        Self::new(source, Profile::new(Format::Dash(options), ladder))
    }

    /// Re-encode into a single file, optionally at one representation.
    pub fn to_file(source: Source, options: FileOptions, rep: Option<Representation>) -> Self {
        let ladder = rep.into_iter().collect();
        Self::new(source, Profile::new(Format::File(options), ladder))
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Delay before a temporary source is deleted at teardown.
    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Use `prober` instead of ffprobe to describe the source.
    pub fn with_prober(mut self, prober: impl Prober + 'static) -> Self {
        self.prober = Some(Box::new(prober));
        self
    }

    /// Receive a [`Progress`] report for every engine progress block.
    pub fn on_progress(mut self, callback: impl FnMut(Progress) + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Mutable profile access; only while the session is still configuring.
    pub fn profile_mut(&mut self) -> Option<&mut Profile> {
        match self.state {
            SessionState::Configuring => Some(&mut self.profile),
            _ => None,
        }
    }

    pub fn format(&self) -> &Format {
        &self.profile.format
    }

    pub fn ladder(&self) -> &Ladder {
        &self.profile.ladder
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Primary output path as currently known.
    pub fn output_path(&self) -> &Path {
        &self.handle.final_path
    }

    /// Whether the output was produced in (and left in) a temporary directory.
    pub fn is_temp_dir(&self) -> bool {
        self.handle.is_temporary
    }

    pub fn media_info(&self) -> Option<&MediaInfo> {
        self.media_info.as_ref()
    }

    /// Whether a probe was attempted, successful or not.
    pub fn was_probed(&self) -> bool {
        self.probed || self.media_info.is_some()
    }

    /// Describe the source, probing it on first use.
    pub fn probe(&mut self) -> Result<&MediaInfo> {
        if self.media_info.is_none() {
            self.probed = true;
            let info = match &self.prober {
                Some(prober) => prober.probe(&self.source)?,
                None => FfprobeProber::new(&self.toolchain.ffprobe).probe(&self.source)?,
            };
            self.media_info = Some(info);
        }
        self.media_info
            .as_ref()
            .ok_or_else(|| Error::parse_error("ffprobe", "no media information"))
    }

    /// Probe once for progress and bandwidth; failures only lose those.
    fn probe_quietly(&mut self) {
        if self.probed || self.media_info.is_some() {
            return;
        }
        if self.prober.is_none() && matches!(self.source.kind(), SourceKind::Capture(_)) {
            self.probed = true;
            return;
        }
        if let Err(e) = self.probe().map(|_| ()) {
            tracing::warn!("could not probe {}: {}", self.source.input(), e);
        }
    }

    /// Package the source to `destination`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingOutputPath`] when a temporary source has no
    ///   destination; nothing is spawned.
    /// - [`Error::InvalidConfiguration`] for profile problems, before any
    ///   resource is allocated.
    /// - [`Error::Packaging`] when the engine fails; teardown has already
    ///   run when this is returned.
    pub fn save(&mut self, destination: Destination) -> Result<PackagingReport> {
        self.ensure_configuring()?;
        let Destination { local, remote } = destination;

        if let Some(path) = &local {
            if path.as_os_str().len() > MAX_PATH_LEN {
                return Err(Error::invalid_config(format!(
                    "output path is longer than {MAX_PATH_LEN} bytes"
                )));
            }
        }
        let use_temp_dir = remote.is_some();
        let requested = match (&local, use_temp_dir) {
            (Some(path), _) => path.clone(),
            (None, true) => PathBuf::from(self.default_file_name()),
            (None, false) => self.default_local_path()?,
        };
        self.profile.validate()?;

        let workspace = Workspace::open(use_temp_dir, self.temporary_source(), self.grace)?;

        let output = match workspace.temp_dir() {
            Some(dir) => {
                let name = requested
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(self.default_file_name()));
                self.profile.format.output_path(&dir.join(name))
            }
            None => self.profile.format.output_path(&requested),
        };

        self.handle = ResourceHandle {
            final_path: output.clone(),
            is_temporary: use_temp_dir,
            temporary_directory: workspace.temp_dir().map(Path::to_path_buf),
        };
        self.state = SessionState::PathResolved;
        tracing::info!(
            "packaging {} as {} into {}",
            self.source.input(),
            self.profile.format.technique(),
            output.display()
        );

        let result = self.package(&output, &workspace, remote.as_deref(), local.as_deref());
        self.close(workspace, result)
    }

    /// Stream to a live ingest URL instead of files.
    ///
    /// No playlist is written and nothing is moved; the temporary-source
    /// teardown still applies.
    pub fn live(&mut self, url: &str) -> Result<PackagingReport> {
        self.ensure_configuring()?;
        self.profile.validate()?;

        let workspace = Workspace::open(false, self.temporary_source(), self.grace)?;
        let output = PathBuf::from(url);
        self.handle = ResourceHandle {
            final_path: output.clone(),
            is_temporary: false,
            temporary_directory: None,
        };
        self.state = SessionState::PathResolved;
        tracing::info!("streaming {} live to {}", self.source.input(), url);

        let result = self.run(&output, false);
        self.close(workspace, result)
    }

    fn ensure_configuring(&self) -> Result<()> {
        if self.state != SessionState::Configuring {
            return Err(Error::invalid_config(format!(
                "session already used (state {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn temporary_source(&self) -> Option<PathBuf> {
        if self.source.is_temporary() {
            self.source.path().map(Path::to_path_buf)
        } else {
            None
        }
    }

    fn default_file_name(&self) -> String {
        self.source
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "stream".to_string())
    }

    /// Output next to the source, for sessions saved without a destination.
    fn default_local_path(&self) -> Result<PathBuf> {
        if self.source.is_temporary() {
            return Err(Error::MissingOutputPath);
        }
        let path = self.source.path().ok_or(Error::MissingOutputPath)?;
        if matches!(self.profile.format, Format::File(_)) {
            return Err(Error::invalid_config(
                "a file output needs an explicit path; the default would overwrite the source",
            ));
        }
        Ok(path.to_path_buf())
    }

    fn package(
        &mut self,
        output: &Path,
        workspace: &Workspace,
        remote: Option<&dyn RemoteTarget>,
        local: Option<&Path>,
    ) -> Result<PackagingReport> {
        files::make_parent(output)?;
        let report = self.run(output, true)?;
        self.finalize(report, workspace, remote, local)
    }

    /// Spawn the engine and feed its output through the listener chain.
    fn run(&mut self, output: &Path, write_playlist: bool) -> Result<PackagingReport> {
        self.probe_quietly();

        let invocation = CommandBuilder::new(&self.toolchain.ffmpeg).build(
            &self.source,
            &self.profile,
            output,
        )?;

        if let Format::Hls(hls) = &mut self.profile.format {
            if let Some(sub) = &hls.seg_sub_directory {
                if let Some(parent) = output.parent() {
                    files::make_dir(&parent.join(sub.trim_matches('/')))?;
                }
            }
            if let Some(key_info) = hls.encryption.as_mut() {
                key_info.generate()?;
            }
        }

        let mut progress =
            ProgressListener::new(self.media_info.as_ref().and_then(MediaInfo::duration_secs));
        if let Some(callback) = self.on_progress.take() {
            progress = progress.with_callback(callback);
        }

        self.state = SessionState::Running;
        let outcome = {
            let mut rotation: Option<RotationListener<'_>> = match &mut self.profile.format {
                Format::Hls(hls) => {
                    let needle = hls.needle();
                    match (hls.key_rotation_period, hls.encryption.as_mut()) {
                        (Some(period), Some(key_info)) => {
                            Some(key_info.rotation_listener(period, needle)?)
                        }
                        _ => None,
                    }
                }
                _ => None,
            };

            let mut listeners: Vec<&mut dyn LineListener> = vec![&mut progress];
            if let Some(rotation) = rotation.as_mut() {
                listeners.push(rotation);
            }
            engine::run(&invocation, &mut listeners)
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = SessionState::Failed;
                tracing::error!("packaging {} failed: {}", self.source.input(), e);
                return Err(e);
            }
        };
        self.state = SessionState::Completed;

        let rotations = self
            .profile
            .format
            .as_hls()
            .and_then(|h| h.encryption.as_ref())
            .map(|k| k.rotations())
            .unwrap_or(0);

        if write_playlist {
            if let Format::Hls(hls) = &self.profile.format {
                let stem = output
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "stream".to_string());
                PlaylistWriter::new(&self.profile.ladder, stem)
                    .with_segment_type(hls.segment_type)
                    .with_source_audio_bit_rate(
                        self.media_info.as_ref().and_then(MediaInfo::audio_bit_rate),
                    )
                    .save(output, &hls.playlist_header)?;
            }
        }

        Ok(PackagingReport {
            output: output.to_path_buf(),
            lines: outcome.lines,
            rotations,
            listener_errors: outcome.listener_errors,
        })
    }

    /// Upload and/or move output produced in the temporary directory.
    fn finalize(
        &mut self,
        mut report: PackagingReport,
        workspace: &Workspace,
        remote: Option<&dyn RemoteTarget>,
        local: Option<&Path>,
    ) -> Result<PackagingReport> {
        let (Some(remote), Some(temp_dir)) = (remote, workspace.temp_dir()) else {
            return Ok(report);
        };

        self.state = SessionState::Finalizing;
        remote.upload(temp_dir)?;

        if let Some(local) = local {
            let final_path = self.profile.format.output_path(local);
            let target_dir = final_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            files::move_dir_contents(temp_dir, &target_dir)?;

            self.handle = ResourceHandle {
                final_path: final_path.clone(),
                is_temporary: false,
                temporary_directory: None,
            };
            report.output = final_path;
        }
        Ok(report)
    }

    /// Tear down and settle the session's outcome. A packaging error wins
    /// over a teardown error.
    fn close(
        &mut self,
        workspace: Workspace,
        result: Result<PackagingReport>,
    ) -> Result<PackagingReport> {
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        let teardown = workspace.close();
        self.handle.temporary_directory = None;
        self.state = SessionState::Closed;

        match (result, teardown) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(report), Ok(())) => {
                tracing::info!("packaged {}", report.output.display());
                Ok(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::KnownMedia;

    fn ladder() -> Ladder {
        vec![Representation::new(640, 360, 800).unwrap()]
            .into_iter()
            .collect()
    }

    #[test]
    fn temporary_source_without_destination_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("upload.mp4");
        std::fs::write(&source_path, b"media").unwrap();

        let mut stream = Stream::hls(
            Source::file(&source_path).temporary(true),
            HlsOptions::default(),
            ladder(),
        )
        .with_toolchain(Toolchain::new("nonexistent_engine_xyz", "nonexistent_probe_xyz"));

        let err = stream.save(Destination::none()).unwrap_err();
        assert!(matches!(err, Error::MissingOutputPath));
        assert_eq!(stream.state(), SessionState::Configuring);
        assert!(source_path.exists());
    }

    #[test]
    fn overlong_path_is_rejected() {
        let mut stream = Stream::hls(Source::file("in.mp4"), HlsOptions::default(), ladder());
        let long = "a".repeat(MAX_PATH_LEN + 1);
        assert!(matches!(
            stream.save(Destination::local(long)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn invalid_profile_fails_before_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Stream::dash(Source::file("in.mp4"), DashOptions::default(), Ladder::new());
        let out = dir.path().join("nested/out.mpd");

        assert!(matches!(
            stream.save(Destination::local(&out)),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn file_output_next_to_source_is_refused() {
        let mut stream = Stream::to_file(Source::file("in.mp4"), FileOptions::default(), None);
        assert!(matches!(
            stream.save(Destination::none()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn spawn_failure_closes_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Stream::hls(Source::file("in.mp4"), HlsOptions::default(), ladder())
            .with_toolchain(Toolchain::new("nonexistent_engine_xyz", "nonexistent_probe_xyz"))
            .with_prober(KnownMedia::default());

        let err = stream
            .save(Destination::local(dir.path().join("out/movie.m3u8")))
            .unwrap_err();
        assert!(matches!(err, Error::Packaging { .. }));
        assert_eq!(stream.state(), SessionState::Closed);
        assert!(stream.save(Destination::none()).is_err());
    }

    #[test]
    fn manifest_path_follows_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Stream::dash(Source::file("in.mp4"), DashOptions::default(), ladder())
            .with_toolchain(Toolchain::new("nonexistent_engine_xyz", "nonexistent_probe_xyz"))
            .with_prober(KnownMedia::default());

        let _ = stream.save(Destination::local(dir.path().join("movie.mp4")));
        assert_eq!(stream.output_path(), dir.path().join("movie.mpd"));
        assert!(!stream.is_temp_dir());
    }
}
