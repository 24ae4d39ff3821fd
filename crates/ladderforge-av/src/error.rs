//! Error types for ladderforge-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The packaging stage an error was raised in.
///
/// Lets an operator tell bad input from an engine crash from a disk or
/// permission problem without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Caller-supplied parameters or profile were rejected.
    Configuration,
    /// The engine could not be spawned or exited unsuccessfully.
    Invocation,
    /// Key or key-info generation failed.
    Rotation,
    /// Metadata description or export failed.
    Export,
    /// Filesystem placement, upload or cleanup failed.
    Storage,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Configuration => write!(f, "configuration"),
            Stage::Invocation => write!(f, "invocation"),
            Stage::Rotation => write!(f, "rotation"),
            Stage::Export => write!(f, "export"),
            Stage::Storage => write!(f, "storage"),
        }
    }
}

/// Errors that can occur while packaging media.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A representation parameter is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The packaging profile is missing fields or contradicts itself.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A temporary source was saved without any destination.
    #[error("a temporary source needs an explicit output path")]
    MissingOutputPath,

    /// The engine failed to spawn or exited with a non-zero status.
    #[error("packaging failed: {message}")]
    Packaging { message: String },

    /// A key or key-info file could not be produced.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Metadata export has no stable location to name the file after.
    #[error("no persistent location to export metadata to: {0}")]
    NoPersistentLocation(String),

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// Uploading finished output to a remote target failed.
    #[error("upload to {target} failed: {message}")]
    Upload { target: String, message: String },

    /// The specified file was not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a packaging error wrapping the engine's diagnostic text.
    pub fn packaging(message: impl Into<String>) -> Self {
        Self::Packaging {
            message: message.into(),
        }
    }

    /// Create a key generation error.
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration(message.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an upload error.
    pub fn upload(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Validation(_)
            | Error::InvalidConfiguration(_)
            | Error::MissingOutputPath
            | Error::FileNotFound { .. } => Stage::Configuration,
            Error::Packaging { .. } | Error::ToolNotFound { .. } | Error::ParseError { .. } => {
                Stage::Invocation
            }
            Error::KeyGeneration(_) => Stage::Rotation,
            Error::NoPersistentLocation(_) | Error::Json(_) => Stage::Export,
            Error::Upload { .. } | Error::Io(_) => Stage::Storage,
        }
    }
}
