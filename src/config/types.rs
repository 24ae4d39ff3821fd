use ladderforge_av::{
    Codecs, DashOptions, HlsOptions, Ladder, Platform, Representation, Toolchain,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub packaging: PackagingConfig,

    #[serde(default)]
    pub hls: HlsConfig,

    #[serde(default)]
    pub dash: DashConfig,

    /// Default ladder, used when no representation is given on the command line
    #[serde(default)]
    pub ladder: Vec<RepresentationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Custom path to ffmpeg
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Custom path to ffprobe
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagingConfig {
    /// Platform used for capture-device syntax; detected when unset
    #[serde(default)]
    pub platform: Option<Platform>,

    /// Delay before a temporary source is deleted, in milliseconds
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,

    /// Encoder thread count (`-threads`); ffmpeg decides when unset
    #[serde(default)]
    pub threads: Option<u32>,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// `-strict` level, e.g. `experimental`
    #[serde(default)]
    pub strict: Option<String>,

    /// Raw ffmpeg options placed before every output
    #[serde(default)]
    pub additional_params: Vec<String>,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            platform: None,
            teardown_grace_ms: default_teardown_grace_ms(),
            threads: None,
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            strict: None,
            additional_params: Vec::new(),
        }
    }
}

fn default_teardown_grace_ms() -> u64 {
    1000
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HlsConfig {
    /// Target segment duration in seconds
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u32,

    /// Fragmented MP4 segments instead of MPEG-TS
    #[serde(default)]
    pub fmp4: bool,

    #[serde(default = "default_true")]
    pub allow_cache: bool,

    /// Prefix for segment URIs in rendition playlists
    #[serde(default)]
    pub base_url: Option<String>,

    /// Segment subdirectory, relative to the master playlist
    #[serde(default)]
    pub seg_sub_directory: Option<String>,

    /// Rotate the encryption key every N segments
    #[serde(default)]
    pub key_rotation_period: Option<usize>,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_duration: default_segment_duration(),
            fmp4: false,
            allow_cache: true,
            base_url: None,
            seg_sub_directory: None,
            key_rotation_period: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashConfig {
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u32,

    /// `-adaptation_sets` value; video and audio sets when unset
    #[serde(default)]
    pub adaptation_sets: Option<String>,

    /// Also write an HLS playlist next to the MPD
    #[serde(default)]
    pub hls_playlist: bool,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            segment_duration: default_segment_duration(),
            adaptation_sets: None,
            hls_playlist: false,
        }
    }
}

fn default_segment_duration() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepresentationConfig {
    pub width: u32,
    pub height: u32,
    pub video_kilo_bitrate: i64,
    #[serde(default)]
    pub audio_kilo_bitrate: Option<i64>,
}

impl RepresentationConfig {
    pub fn to_representation(&self) -> ladderforge_av::Result<Representation> {
        let rep = Representation::new(self.width, self.height, self.video_kilo_bitrate)?;
        match self.audio_kilo_bitrate {
            Some(audio) => rep.with_audio_kilo_bitrate(audio),
            None => Ok(rep),
        }
    }
}

impl Config {
    /// The configured default ladder, in file order.
    pub fn ladder(&self) -> ladderforge_av::Result<Ladder> {
        self.ladder
            .iter()
            .map(RepresentationConfig::to_representation)
            .collect()
    }

    /// Locate ffmpeg and ffprobe, preferring configured paths.
    pub fn toolchain(&self) -> ladderforge_av::Result<Toolchain> {
        Toolchain::discover(
            self.tools.ffmpeg_path.as_deref(),
            self.tools.ffprobe_path.as_deref(),
        )
    }

    /// Configured paths or bare names, without checking that they exist.
    pub fn unchecked_toolchain(&self) -> Toolchain {
        let defaults = Toolchain::default();
        Toolchain::new(
            self.tools.ffmpeg_path.clone().unwrap_or(defaults.ffmpeg),
            self.tools.ffprobe_path.clone().unwrap_or(defaults.ffprobe),
        )
    }

    pub fn codecs(&self) -> Codecs {
        Codecs {
            video: self.packaging.video_codec.clone(),
            audio: self.packaging.audio_codec.clone(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.packaging.platform.unwrap_or_else(Platform::current)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.packaging.teardown_grace_ms)
    }

    /// HLS options from the `[hls]` section, without encryption.
    pub fn hls_options(&self) -> HlsOptions {
        let mut options = HlsOptions::default()
            .with_segment_duration(self.hls.segment_duration)
            .fragmented_mp4(self.hls.fmp4);
        options.allow_cache = self.hls.allow_cache;
        if let Some(url) = &self.hls.base_url {
            options = options.with_base_url(url.clone());
        }
        if let Some(dir) = &self.hls.seg_sub_directory {
            options = options.with_seg_sub_directory(dir.clone());
        }
        options
    }

    pub fn dash_options(&self) -> DashOptions {
        let mut options = DashOptions::default().with_segment_duration(self.dash.segment_duration);
        if let Some(sets) = &self.dash.adaptation_sets {
            options.adaptation_sets = sets.clone();
        }
        options.generate_hls_playlist = self.dash.hls_playlist;
        options
    }
}
