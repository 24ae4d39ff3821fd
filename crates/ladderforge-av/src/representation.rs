//! Quality rungs and the ordered ladder they form.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Standard output heights used by [`Ladder::auto`], highest first.
const STANDARD_HEIGHTS: &[u32] = &[2160, 1440, 1080, 720, 480, 360, 240, 144];

/// A single quality rung: resolution plus bitrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    width: Option<u32>,
    height: Option<u32>,
    video_kilo_bitrate: u32,
    audio_kilo_bitrate: Option<u32>,
    #[serde(default)]
    stream_info: BTreeMap<String, String>,
}

impl Representation {
    /// Create a representation with a size and a video bitrate in kbit/s.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for zero dimensions or a non-positive bitrate.
    pub fn new(width: u32, height: u32, video_kilo_bitrate: i64) -> Result<Self> {
        let mut rep = Self {
            width: None,
            height: None,
            video_kilo_bitrate: 1,
            audio_kilo_bitrate: None,
            stream_info: BTreeMap::new(),
        };
        rep.set_resize(width, height)?;
        rep.set_kilo_bitrate(video_kilo_bitrate)?;
        Ok(rep)
    }

    /// Set the output dimensions.
    pub fn set_resize(&mut self, width: u32, height: u32) -> Result<&mut Self> {
        if width == 0 || height == 0 {
            return Err(Error::validation(format!(
                "invalid dimensions {width}x{height}: both sides must be positive"
            )));
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(Error::validation(format!(
                "invalid dimensions {width}x{height}: both sides must be even"
            )));
        }
        self.width = Some(width);
        self.height = Some(height);
        Ok(self)
    }

    /// Set the video bitrate in kbit/s.
    pub fn set_kilo_bitrate(&mut self, kilo_bitrate: i64) -> Result<&mut Self> {
        self.video_kilo_bitrate = positive_bitrate("video", kilo_bitrate)?;
        Ok(self)
    }

    /// Set the audio bitrate in kbit/s.
    pub fn set_audio_kilo_bitrate(&mut self, kilo_bitrate: i64) -> Result<&mut Self> {
        self.audio_kilo_bitrate = Some(positive_bitrate("audio", kilo_bitrate)?);
        Ok(self)
    }

    /// Builder form of [`set_audio_kilo_bitrate`](Self::set_audio_kilo_bitrate).
    pub fn with_audio_kilo_bitrate(mut self, kilo_bitrate: i64) -> Result<Self> {
        self.set_audio_kilo_bitrate(kilo_bitrate)?;
        Ok(self)
    }

    /// Add an extra `#EXT-X-STREAM-INF` attribute (e.g. `CODECS`).
    pub fn with_stream_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.stream_info.insert(key.into(), value.into());
        self
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn kilo_bitrate(&self) -> u32 {
        self.video_kilo_bitrate
    }

    pub fn audio_kilo_bitrate(&self) -> Option<u32> {
        self.audio_kilo_bitrate
    }

    pub fn stream_info(&self) -> &BTreeMap<String, String> {
        &self.stream_info
    }

    /// `"{width}x{height}"`, or `None` when no size was set.
    pub fn size_string(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }
}

fn positive_bitrate(kind: &str, kilo_bitrate: i64) -> Result<u32> {
    if kilo_bitrate <= 0 {
        return Err(Error::validation(format!(
            "{kind} bitrate must be a positive integer, got {kilo_bitrate}"
        )));
    }
    u32::try_from(kilo_bitrate)
        .map_err(|_| Error::validation(format!("{kind} bitrate {kilo_bitrate} is too large")))
}

/// Parses `WIDTHxHEIGHT@KBPS` with an optional `/AUDIO_KBPS` suffix,
/// e.g. `1280x720@2500/128`.
impl FromStr for Representation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            Error::validation(format!(
                "malformed representation '{s}', expected WIDTHxHEIGHT@KBPS[/AUDIO_KBPS]"
            ))
        };

        let (size, rates) = s.trim().split_once('@').ok_or_else(malformed)?;
        let (width, height) = size.split_once(['x', 'X']).ok_or_else(malformed)?;
        let width: u32 = width.parse().map_err(|_| malformed())?;
        let height: u32 = height.parse().map_err(|_| malformed())?;

        let (video, audio) = match rates.split_once('/') {
            Some((v, a)) => (v, Some(a)),
            None => (rates, None),
        };
        let video: i64 = video.parse().map_err(|_| malformed())?;

        let mut rep = Representation::new(width, height, video)?;
        if let Some(audio) = audio {
            let audio: i64 = audio.parse().map_err(|_| malformed())?;
            rep.set_audio_kilo_bitrate(audio)?;
        }
        Ok(rep)
    }
}

/// Ordered, append-only collection of representations.
///
/// Insertion order drives both argument order and manifest order; nothing
/// in the crate re-sorts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ladder {
    representations: Vec<Representation>,
}

impl Ladder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a representation at the end of the ladder.
    pub fn push(&mut self, rep: Representation) -> &mut Self {
        self.representations.push(rep);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Representation> {
        self.representations.iter()
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    /// Derive a descending ladder from a source's size and video bitrate.
    ///
    /// Every standard height at or below the source height gets a rung, with
    /// the width following the source aspect ratio and the bitrate scaled by
    /// pixel count. The source's own height is the first rung when it is not
    /// a standard height.
    pub fn auto(source_width: u32, source_height: u32, source_kilo_bitrate: u32) -> Result<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(Error::validation(
                "cannot derive a ladder from a source without dimensions",
            ));
        }
        let source_kbps = source_kilo_bitrate.max(1) as f64;
        let source_pixels = source_width as f64 * source_height as f64;

        let mut heights: Vec<u32> = Vec::new();
        if !STANDARD_HEIGHTS.contains(&source_height) {
            heights.push(source_height);
        }
        heights.extend(STANDARD_HEIGHTS.iter().copied().filter(|h| *h <= source_height));

        let mut ladder = Ladder::new();
        for height in heights {
            let width = even(source_width as f64 * height as f64 / source_height as f64);
            let height = even(height as f64);
            let pixels = width as f64 * height as f64;
            let kbps = (source_kbps * pixels / source_pixels).round().max(1.0) as i64;
            ladder.push(Representation::new(width, height, kbps)?);
        }
        Ok(ladder)
    }
}

fn even(value: f64) -> u32 {
    let rounded = value.round() as u32;
    (rounded - rounded % 2).max(2)
}

impl FromIterator<Representation> for Ladder {
    fn from_iter<I: IntoIterator<Item = Representation>>(iter: I) -> Self {
        Self {
            representations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a Representation;
    type IntoIter = std::slice::Iter<'a, Representation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
