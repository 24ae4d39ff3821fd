//! FFprobe-based media probing.

use super::types::*;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Map<String, Value>,
    #[serde(default)]
    streams: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Probe an input (file path or URL) using the ffprobe at `ffprobe`.
pub fn probe_with_ffprobe(ffprobe: &Path, input: &str) -> Result<MediaInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::parse_error(
            "ffprobe",
            format!("probing {} failed: {}", input, stderr.trim()),
        ));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_json(input, &json_str)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_json(input: &str, json: &str) -> Result<MediaInfo> {
    let raw: FfprobeOutput = serde_json::from_str(json)?;

    let format: FfprobeFormat = serde_json::from_value(Value::Object(raw.format.clone()))
        .map_err(|e| Error::parse_error("ffprobe", format!("bad format section: {e}")))?;

    let mut info = MediaInfo {
        input: input.to_string(),
        file_size: format.size.and_then(|s| s.parse().ok()),
        container: format.format_name,
        duration: format
            .duration
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64),
        bit_rate: format.bit_rate.and_then(|s| s.parse().ok()),
        video_tracks: Vec::new(),
        audio_tracks: Vec::new(),
        raw_format: raw.format,
        raw_streams: Vec::new(),
    };

    let mut video_index = 0u32;
    let mut audio_index = 0u32;

    for stream_map in raw.streams {
        let stream: FfprobeStream = serde_json::from_value(Value::Object(stream_map.clone()))
            .map_err(|e| Error::parse_error("ffprobe", format!("bad stream section: {e}")))?;

        match stream.codec_type.as_deref() {
            Some("video") => {
                info.video_tracks.push(VideoTrack {
                    index: video_index,
                    codec: stream.codec_name.unwrap_or_default(),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: stream.r_frame_rate.and_then(|s| parse_frame_rate(&s)),
                    bit_rate: stream.bit_rate.and_then(|s| s.parse().ok()),
                });
                video_index += 1;
            }
            Some("audio") => {
                info.audio_tracks.push(AudioTrack {
                    index: audio_index,
                    codec: stream.codec_name.unwrap_or_default(),
                    channels: stream.channels.unwrap_or(2),
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                    bit_rate: stream.bit_rate.and_then(|s| s.parse().ok()),
                    language: stream.tags.language,
                });
                audio_index += 1;
            }
            _ => {}
        }

        info.raw_streams.push(stream_map);
    }

    Ok(info)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
    }
    rate_str.parse().ok()
}
