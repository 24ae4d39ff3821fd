//! HLS master playlist rendering.

use crate::files;
use crate::representation::{Ladder, Representation};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container used for HLS media segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// Classic MPEG transport stream segments (`.ts`).
    #[default]
    MpegTs,
    /// Fragmented MP4 segments (`.m4s` plus an init section).
    Fmp4,
}

impl SegmentType {
    /// `#EXT-X-VERSION` required by this segment container.
    pub fn hls_version(self) -> u8 {
        match self {
            SegmentType::Fmp4 => 7,
            SegmentType::MpegTs => 3,
        }
    }

    /// Segment file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            SegmentType::Fmp4 => "m4s",
            SegmentType::MpegTs => "ts",
        }
    }

    /// Value for ffmpeg's `-hls_segment_type`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            SegmentType::Fmp4 => "fmp4",
            SegmentType::MpegTs => "mpegts",
        }
    }
}

/// Label for one rendition: `<height>p`, or `<kbps>k` when no size is set.
pub fn rendition_label(rep: &Representation) -> String {
    match rep.height() {
        Some(h) => format!("{h}p"),
        None => format!("{}k", rep.kilo_bitrate()),
    }
}

/// File name of a rendition's media playlist, e.g. `movie_720p.m3u8`.
pub fn rendition_playlist_name(base_name: &str, rep: &Representation) -> String {
    format!("{}_{}.m3u8", base_name, rendition_label(rep))
}

/// Renders the master playlist for a ladder.
///
/// The playlist is regenerated from scratch on every render; representations
/// appear in ladder order.
#[derive(Debug, Clone)]
pub struct PlaylistWriter<'a> {
    ladder: &'a Ladder,
    base_name: String,
    segment_type: SegmentType,
    source_audio_bit_rate: Option<u64>,
}

impl<'a> PlaylistWriter<'a> {
    /// `base_name` is the manifest's file stem; rendition playlists are named
    /// after it.
    pub fn new(ladder: &'a Ladder, base_name: impl Into<String>) -> Self {
        Self {
            ladder,
            base_name: base_name.into(),
            segment_type: SegmentType::default(),
            source_audio_bit_rate: None,
        }
    }

    pub fn with_segment_type(mut self, segment_type: SegmentType) -> Self {
        self.segment_type = segment_type;
        self
    }

    /// Audio bitrate of the source in bits per second, used for renditions
    /// that do not set their own audio bitrate.
    pub fn with_source_audio_bit_rate(mut self, bits: Option<u64>) -> Self {
        self.source_audio_bit_rate = bits;
        self
    }

    /// `BANDWIDTH` for a rendition in bits per second.
    pub fn bandwidth(&self, rep: &Representation) -> u64 {
        let video = u64::from(rep.kilo_bitrate()) * 1024;
        let audio = match rep.audio_kilo_bitrate() {
            Some(kbps) => u64::from(kbps) * 1024,
            None => self.source_audio_bit_rate.unwrap_or(0),
        };
        video + audio
    }

    /// Render the playlist text. `extra_header` lines follow the version tag.
    pub fn render(&self, extra_header: &[String]) -> String {
        let mut out = String::from("#EXTM3U\n");
        out.push_str(&format!(
            "#EXT-X-VERSION:{}\n",
            self.segment_type.hls_version()
        ));
        for line in extra_header {
            out.push_str(line);
            out.push('\n');
        }

        for rep in self.ladder {
            out.push_str(&self.stream_inf(rep));
            out.push('\n');
            out.push_str(&rendition_playlist_name(&self.base_name, rep));
            out.push('\n');
        }

        out
    }

    fn stream_inf(&self, rep: &Representation) -> String {
        let mut attrs = vec![format!("BANDWIDTH={}", self.bandwidth(rep))];
        if let Some(size) = rep.size_string() {
            attrs.push(format!("RESOLUTION={size}"));
        }
        let name = match rep.height() {
            Some(h) => h.to_string(),
            None => rendition_label(rep),
        };
        attrs.push(format!("NAME=\"{name}\""));
        attrs.extend(rep.stream_info().iter().map(|(k, v)| format!("{k}={v}")));

        format!("#EXT-X-STREAM-INF:{}", attrs.join(","))
    }

    /// Render and write the playlist to `path`, creating parent directories.
    pub fn save(&self, path: &Path, extra_header: &[String]) -> Result<()> {
        let text = self.render(extra_header);
        files::write_atomic(path, text.as_bytes())?;
        tracing::info!(
            "wrote master playlist {} ({} renditions)",
            path.display(),
            self.ladder.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(w: u32, h: u32, kbps: i64) -> Representation {
        Representation::new(w, h, kbps).unwrap()
    }

    #[test]
    fn renders_in_ladder_order() {
        let ladder: Ladder = vec![
            rep(640, 360, 800),
            rep(1280, 720, 2500),
            rep(1920, 1080, 4000),
        ]
        .into_iter()
        .collect();

        let text = PlaylistWriter::new(&ladder, "movie").render(&[]);
        let names: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .map(|l| l.rsplit("NAME=").next().unwrap())
            .collect();
        assert_eq!(names, vec!["\"360\"", "\"720\"", "\"1080\""]);

        let playlists: Vec<&str> = text.lines().filter(|l| l.ends_with(".m3u8")).collect();
        assert_eq!(
            playlists,
            vec!["movie_360p.m3u8", "movie_720p.m3u8", "movie_1080p.m3u8"]
        );
    }

    #[test]
    fn does_not_resort_by_bitrate() {
        let ladder: Ladder = vec![rep(1920, 1080, 4000), rep(640, 360, 800)]
            .into_iter()
            .collect();
        let text = PlaylistWriter::new(&ladder, "m").render(&[]);
        let first = text.find("m_1080p.m3u8").unwrap();
        let second = text.find("m_360p.m3u8").unwrap();
        assert!(first < second);
    }

    #[test]
    fn bandwidth_with_explicit_audio() {
        let ladder = Ladder::new();
        let writer = PlaylistWriter::new(&ladder, "m");
        let r = rep(1280, 720, 1000).with_audio_kilo_bitrate(128).unwrap();
        assert_eq!(writer.bandwidth(&r), 1_155_072);
    }

    #[test]
    fn bandwidth_falls_back_to_source_audio_then_zero() {
        let ladder = Ladder::new();
        let r = rep(1280, 720, 1000);

        let probed = PlaylistWriter::new(&ladder, "m").with_source_audio_bit_rate(Some(96_000));
        assert_eq!(probed.bandwidth(&r), 1000 * 1024 + 96_000);

        let unknown = PlaylistWriter::new(&ladder, "m");
        assert_eq!(unknown.bandwidth(&r), 1000 * 1024);
    }

    #[test]
    fn header_version_follows_segment_type() {
        let ladder = Ladder::new();
        let ts = PlaylistWriter::new(&ladder, "m").render(&[]);
        assert!(ts.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));

        let fmp4 = PlaylistWriter::new(&ladder, "m")
            .with_segment_type(SegmentType::Fmp4)
            .render(&["#EXT-X-INDEPENDENT-SEGMENTS".to_string()]);
        assert!(fmp4.starts_with("#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-INDEPENDENT-SEGMENTS\n"));
    }

    #[test]
    fn stream_info_pairs_are_appended() {
        let ladder: Ladder = vec![rep(1280, 720, 2500)
            .with_audio_kilo_bitrate(128)
            .unwrap()
            .with_stream_info("CODECS", "\"avc1.64001f,mp4a.40.2\"")]
        .into_iter()
        .collect();
        let text = PlaylistWriter::new(&ladder, "m").render(&[]);
        assert!(text.contains(
            "#EXT-X-STREAM-INF:BANDWIDTH=2691072,RESOLUTION=1280x720,NAME=\"720\",CODECS=\"avc1.64001f,mp4a.40.2\"\n"
        ));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ladder: Ladder = vec![rep(640, 360, 800)].into_iter().collect();
        let path = dir.path().join("out/hls/movie.m3u8");

        let writer = PlaylistWriter::new(&ladder, "movie");
        writer.save(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), writer.render(&[]));
    }
}
