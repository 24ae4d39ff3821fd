//! # ladderforge-av
//!
//! Adaptive bitrate packaging on top of ffmpeg.
//!
//! This crate provides:
//! - Representations and ordered ladders of them
//! - Building ffmpeg command lines for HLS, DASH and single-file output
//! - Running ffmpeg and reacting to its output line by line
//! - AES key generation and rotation for encrypted HLS
//! - Master playlist rendering
//! - Scoped cleanup of temporary directories and temporary sources
//! - Metadata description and JSON export
//!
//! ## Example
//!
//! ```no_run
//! use ladderforge_av::{Destination, HlsOptions, Ladder, Representation, Source, Stream};
//!
//! let mut ladder = Ladder::new();
//! ladder
//!     .push(Representation::new(640, 360, 800)?)
//!     .push(Representation::new(1280, 720, 2500)?);
//!
//! let mut stream = Stream::hls(Source::file("movie.mp4"), HlsOptions::default(), ladder);
//! let report = stream.save(Destination::local("out/movie.m3u8"))?;
//! println!("master playlist: {}", report.output.display());
//! # Ok::<(), ladderforge_av::Error>(())
//! ```

pub mod command;
pub mod engine;
mod error;
pub mod files;
pub mod format;
pub mod key_info;
pub mod metadata;
pub mod playlist;
pub mod probe;
pub mod remote;
pub mod representation;
pub mod source;
pub mod stream;
pub mod tools;
pub mod workspace;

// Re-exports
pub use command::{CommandBuilder, Profile};
pub use engine::{EngineInvocation, FnListener, LineListener, Progress, ProgressListener};
pub use error::{Error, Result, Stage};
pub use format::{Codecs, DashOptions, FileOptions, Format, HlsOptions};
pub use key_info::KeyInfo;
pub use metadata::{Metadata, MetadataRecord};
pub use playlist::{PlaylistWriter, SegmentType};
pub use probe::{AudioTrack, MediaInfo, Prober, VideoTrack};
pub use remote::{DirectoryTarget, RemoteTarget};
pub use representation::{Ladder, Representation};
pub use source::{Platform, Source};
pub use stream::{Destination, PackagingReport, SessionState, Stream};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo, Toolchain};
pub use workspace::{ResourceHandle, Workspace};
