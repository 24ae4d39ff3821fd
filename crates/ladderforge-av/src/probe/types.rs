//! Media information types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Information about a source asset, as reported by the prober.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Input the information was gathered from (path or URL).
    pub input: String,
    /// File size in bytes, when known.
    pub file_size: Option<u64>,
    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2").
    pub container: String,
    /// Duration of the media.
    pub duration: Option<Duration>,
    /// Overall bitrate in bits per second.
    pub bit_rate: Option<u64>,
    /// Video tracks in the input.
    pub video_tracks: Vec<VideoTrack>,
    /// Audio tracks in the input.
    pub audio_tracks: Vec<AudioTrack>,
    /// Container-level fields exactly as the prober reported them.
    #[serde(default)]
    pub raw_format: Map<String, Value>,
    /// Per-stream fields exactly as the prober reported them.
    #[serde(default)]
    pub raw_streams: Vec<Map<String, Value>>,
}

/// Information about a video track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    /// Track index.
    pub index: u32,
    /// Video codec (e.g. "h264", "hevc").
    pub codec: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
    /// Bitrate in bits per second.
    pub bit_rate: Option<u64>,
}

/// Information about an audio track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Track index.
    pub index: u32,
    /// Audio codec (e.g. "aac", "opus").
    pub codec: String,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Bitrate in bits per second.
    pub bit_rate: Option<u64>,
    /// Language code (e.g. "eng", "spa").
    pub language: Option<String>,
}

impl MediaInfo {
    /// Get the primary (first) video track.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    /// Bitrate of the first audio track that reports one, in bits per second.
    pub fn audio_bit_rate(&self) -> Option<u64> {
        self.audio_tracks.iter().find_map(|a| a.bit_rate)
    }

    /// Video bitrate in kbit/s: the primary track's own rate, or the
    /// container rate minus audio when the track does not report one.
    pub fn video_kilo_bit_rate(&self) -> Option<u32> {
        let bits = self
            .primary_video()
            .and_then(|v| v.bit_rate)
            .or_else(|| {
                self.bit_rate
                    .map(|total| total.saturating_sub(self.audio_bit_rate().unwrap_or(0)))
            })?;
        u32::try_from(bits / 1000).ok().filter(|k| *k > 0)
    }

    /// Duration in seconds, if known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> MediaInfo {
        MediaInfo {
            input: "in.mp4".into(),
            bit_rate: Some(3_128_000),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".into(),
                width: 1920,
                height: 1080,
                frame_rate: Some(25.0),
                bit_rate: None,
            }],
            audio_tracks: vec![AudioTrack {
                index: 0,
                codec: "aac".into(),
                channels: 2,
                sample_rate: Some(48000),
                bit_rate: Some(128_000),
                language: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn video_rate_falls_back_to_container_minus_audio() {
        assert_eq!(info().video_kilo_bit_rate(), Some(3000));
    }

    #[test]
    fn audio_rate_from_first_reporting_track() {
        assert_eq!(info().audio_bit_rate(), Some(128_000));
        let mut silent = info();
        silent.audio_tracks.clear();
        assert_eq!(silent.audio_bit_rate(), None);
    }
}
