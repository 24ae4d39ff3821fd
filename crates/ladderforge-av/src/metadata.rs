//! Post-run description of a packaging session and its output.

use crate::files;
use crate::format::Format;
use crate::probe::MediaInfo;
use crate::stream::Stream;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// `created_at` value when the primary output no longer exists.
pub const FILE_DELETED: &str = "The file has been deleted";

/// Everything known about a session's input and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub video: VideoMetadata,
    pub stream: StreamMetadata,
}

/// Source metadata exactly as the prober reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub format: Map<String, Value>,
    pub streams: Vec<Map<String, Value>>,
}

/// Output metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Primary output path.
    pub filename: String,
    /// Bytes under the output's directory.
    pub size_of_stream_dir: u64,
    /// Modification time of the primary output, or [`FILE_DELETED`].
    pub created_at: String,
    pub resolutions: Vec<Resolution>,
    /// Video encoder used.
    pub format: String,
    /// `HLS`, `DASH` or `StreamToFile`.
    pub streaming_technique: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls: Option<HlsMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<DashMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// `WIDTHXHEIGHT`, absent when the representation keeps the source size.
    pub dimension: Option<String>,
    pub video_kilo_bitrate: u32,
    pub audio_kilo_bitrate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsMetadata {
    pub hls_time: Option<u32>,
    pub hls_cache: bool,
    pub encrypted_hls: bool,
    pub ts_sub_directory: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashMetadata {
    pub seg_duration: Option<u32>,
}

/// Describes a [`Stream`] and exports that description as JSON.
pub struct Metadata<'a> {
    stream: &'a Stream,
    media: Option<&'a MediaInfo>,
}

impl<'a> Metadata<'a> {
    /// Probe the stream's source unless the session already tried to.
    ///
    /// After a run the source may be gone (temporary sources are deleted at
    /// teardown), so a failed probe during the run leaves the `video`
    /// section empty instead of probing again.
    pub fn new(stream: &'a mut Stream) -> Result<Self> {
        if !stream.was_probed() {
            stream.probe()?;
        }
        let stream: &'a Stream = stream;
        Ok(Self {
            stream,
            media: stream.media_info(),
        })
    }

    /// Build the record from the current state of the output.
    pub fn describe(&self) -> MetadataRecord {
        let video = match self.media {
            Some(media) => VideoMetadata {
                format: media.raw_format.clone(),
                streams: media.raw_streams.clone(),
            },
            None => VideoMetadata {
                format: Map::new(),
                streams: Vec::new(),
            },
        };
        MetadataRecord {
            video,
            stream: self.stream_metadata(),
        }
    }

    fn stream_metadata(&self) -> StreamMetadata {
        let output = self.stream.output_path();
        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let format = self.stream.format();

        StreamMetadata {
            filename: output.display().to_string(),
            size_of_stream_dir: files::directory_size(dir),
            created_at: modified_at(output),
            resolutions: self
                .stream
                .ladder()
                .iter()
                .map(|rep| Resolution {
                    dimension: rep.size_string().map(|s| s.to_uppercase()),
                    video_kilo_bitrate: rep.kilo_bitrate(),
                    audio_kilo_bitrate: rep.audio_kilo_bitrate(),
                })
                .collect(),
            format: self.stream.profile().codecs.video.clone(),
            streaming_technique: format.technique().to_string(),
            hls: match format {
                Format::Hls(h) => Some(HlsMetadata {
                    hls_time: h.segment_duration,
                    hls_cache: h.allow_cache,
                    encrypted_hls: h.is_encrypted(),
                    ts_sub_directory: h.seg_sub_directory.clone(),
                    base_url: h.base_url.clone(),
                }),
                _ => None,
            },
            dash: format.as_dash().map(|d| DashMetadata {
                seg_duration: d.segment_duration,
            }),
        }
    }

    /// Write the record as pretty JSON and return where it went.
    ///
    /// Without `path`, the file is named `<stem>-<uuid>.json` next to the
    /// output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPersistentLocation`] when no path is given and the
    /// output lives only in a temporary directory.
    pub fn export(&self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self.default_export_path()?,
        };

        let record = self.describe();
        let json = serde_json::to_string_pretty(&record)?;
        files::write_atomic(&target, json.as_bytes())?;
        tracing::info!("exported metadata to {}", target.display());
        Ok(target)
    }

    fn default_export_path(&self) -> Result<PathBuf> {
        let output = self.stream.output_path();
        if self.stream.is_temp_dir() {
            return Err(Error::NoPersistentLocation(format!(
                "{} is in a temporary directory",
                output.display()
            )));
        }
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::NoPersistentLocation("the session has no output path".to_string())
            })?;
        let name = format!("{}-{}.json", stem, uuid::Uuid::new_v4().simple());
        Ok(output.with_file_name(name))
    }
}

/// Read an exported record back.
pub fn read_record(path: &Path) -> Result<MetadataRecord> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::file_not_found(path)
        } else {
            Error::Io(e)
        }
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn modified_at(path: &Path) -> String {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => DateTime::<Utc>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => FILE_DELETED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DashOptions, HlsOptions};
    use crate::probe::KnownMedia;
    use crate::representation::{Ladder, Representation};
    use crate::source::Source;

    fn media() -> MediaInfo {
        let json = r#"{
            "streams": [{"index": 0, "codec_type": "video", "codec_name": "h264",
                         "width": 1920, "height": 1080}],
            "format": {"filename": "in.mp4", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;
        crate::probe::parse_ffprobe_json("in.mp4", json).unwrap()
    }

    fn ladder() -> Ladder {
        vec![Representation::new(1280, 720, 2500)
            .unwrap()
            .with_audio_kilo_bitrate(128)
            .unwrap()]
        .into_iter()
        .collect()
    }

    #[test]
    fn describes_hls_session() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        std::fs::write(&source, b"media").unwrap();

        let mut stream = Stream::hls(
            Source::file(&source),
            HlsOptions::default().with_seg_sub_directory("ts"),
            ladder(),
        )
        .with_prober(KnownMedia(media()));

        let meta = Metadata::new(&mut stream).unwrap();
        let record = meta.describe();

        assert_eq!(record.video.format["format_name"], "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(record.video.streams.len(), 1);
        assert_eq!(record.stream.streaming_technique, "HLS");
        assert_eq!(record.stream.format, "libx264");
        assert_eq!(record.stream.resolutions[0].dimension.as_deref(), Some("1280X720"));
        assert_eq!(record.stream.size_of_stream_dir, 5);

        let hls = record.stream.hls.unwrap();
        assert_eq!(hls.hls_time, Some(10));
        assert!(!hls.encrypted_hls);
        assert_eq!(hls.ts_sub_directory.as_deref(), Some("ts"));
        assert!(record.stream.dash.is_none());
    }

    #[test]
    fn missing_output_is_marked_deleted() {
        let mut stream = Stream::dash(
            Source::file("/nonexistent/movie.mp4"),
            DashOptions::default(),
            ladder(),
        )
        .with_prober(KnownMedia(media()));

        let record = Metadata::new(&mut stream).unwrap().describe();
        assert_eq!(record.stream.created_at, FILE_DELETED);
        assert_eq!(record.stream.dash.unwrap().seg_duration, Some(10));
    }

    #[test]
    fn export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        std::fs::write(&source, b"media").unwrap();

        let mut stream = Stream::hls(Source::file(&source), HlsOptions::default(), ladder())
            .with_prober(KnownMedia(media()));
        let meta = Metadata::new(&mut stream).unwrap();

        let described = meta.describe();
        let out = dir.path().join("meta/movie.json");
        let written = meta.export(Some(&out)).unwrap();
        assert_eq!(written, out);
        assert_eq!(read_record(&out).unwrap(), described);
    }

    #[test]
    fn export_without_path_uses_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        std::fs::write(&source, b"media").unwrap();

        let mut stream = Stream::hls(Source::file(&source), HlsOptions::default(), ladder())
            .with_prober(KnownMedia(media()));
        let meta = Metadata::new(&mut stream).unwrap();

        let first = meta.export(None).unwrap();
        let second = meta.export(None).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.path()));
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("movie-") && name.ends_with(".json"));
    }

    #[test]
    fn reading_missing_export_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_record(&dir.path().join("nope.json")),
            Err(Error::FileNotFound { .. })
        ));
    }
}
