//! Source media descriptors.
//!
//! A [`Source`] is what the engine reads: a file, a URL, or a capture device.
//! Capture syntax depends on the host platform; the platform is passed in as
//! a [`Platform`] value resolved once at startup instead of being sniffed at
//! every call site.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Host platform, used only to pick capture-device input syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "macos" | "darwin" | "osx" => Ok(Platform::MacOs),
            "windows" | "win" => Ok(Platform::Windows),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// What the engine reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A local media file.
    File(PathBuf),
    /// A network input (rtmp, http, srt, ...).
    Url(String),
    /// A capture device, already rendered into engine input syntax.
    Capture(String),
}

/// The source media handed to a packaging session.
#[derive(Debug, Clone)]
pub struct Source {
    kind: SourceKind,
    input_options: Vec<String>,
    temporary: bool,
}

impl Source {
    /// A local file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::File(path.into()),
            input_options: Vec::new(),
            temporary: false,
        }
    }

    /// A network input.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Url(url.into()),
            input_options: Vec::new(),
            temporary: false,
        }
    }

    /// A capture device (webcam/microphone) in the syntax of `platform`.
    ///
    /// - Linux: `-f v4l2 -i <video>` (audio devices are not combined)
    /// - macOS: `-f avfoundation -i "<video>:<audio>"`
    /// - Windows: `-f dshow -i video="<video>":audio="<audio>"`
    pub fn capture(video: &str, audio: Option<&str>, platform: Platform) -> Self {
        let (format, input) = match platform {
            Platform::Linux => ("v4l2", video.to_string()),
            Platform::MacOs => (
                "avfoundation",
                match audio {
                    Some(a) => format!("{video}:{a}"),
                    None => video.to_string(),
                },
            ),
            Platform::Windows => (
                "dshow",
                match audio {
                    Some(a) => format!("video={video}:audio={a}"),
                    None => format!("video={video}"),
                },
            ),
        };

        Self {
            kind: SourceKind::Capture(input),
            input_options: vec!["-f".to_string(), format.to_string()],
            temporary: false,
        }
    }

    /// Add an input-level engine option placed right before `-i`.
    pub fn with_input_option(mut self, option: impl Into<String>) -> Self {
        self.input_options.push(option.into());
        self
    }

    /// Mark the source as temporary: it is deleted when the session closes.
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn input_options(&self) -> &[String] {
        &self.input_options
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// The local file path, when the source is a file.
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            SourceKind::File(p) => Some(p),
            _ => None,
        }
    }

    /// The value passed after `-i`.
    pub fn input(&self) -> String {
        match &self.kind {
            SourceKind::File(p) => p.to_string_lossy().to_string(),
            SourceKind::Url(u) => u.clone(),
            SourceKind::Capture(c) => c.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_syntax_per_platform() {
        let linux = Source::capture("/dev/video0", Some("hw:0"), Platform::Linux);
        assert_eq!(linux.input_options(), ["-f", "v4l2"]);
        assert_eq!(linux.input(), "/dev/video0");

        let mac = Source::capture("0", Some("1"), Platform::MacOs);
        assert_eq!(mac.input_options(), ["-f", "avfoundation"]);
        assert_eq!(mac.input(), "0:1");

        let win = Source::capture("Integrated Camera", Some("Microphone"), Platform::Windows);
        assert_eq!(win.input_options(), ["-f", "dshow"]);
        assert_eq!(win.input(), "video=Integrated Camera:audio=Microphone");
    }

    #[test]
    fn file_source_exposes_path() {
        let src = Source::file("/media/in.mp4").temporary(true);
        assert!(src.is_temporary());
        assert_eq!(src.path(), Some(Path::new("/media/in.mp4")));
        assert_eq!(src.input(), "/media/in.mp4");
        assert!(Source::url("rtmp://host/live").path().is_none());
    }

    #[test]
    fn platform_parsing() {
        assert_eq!("darwin".parse::<Platform>().unwrap(), Platform::MacOs);
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("beos".parse::<Platform>().is_err());
    }
}
