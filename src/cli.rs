use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ladderforge")]
#[command(author, version, about = "Adaptive bitrate packager for HLS and DASH")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Hls,
    Dash,
    File,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package a source into an adaptive bitrate ladder
    Package(PackageArgs),

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(clap::Args)]
pub struct PackageArgs {
    /// Input file, URL or capture device
    #[arg(required = true)]
    pub input: String,

    /// Packaging format
    #[arg(short, long, value_enum, default_value = "hls")]
    pub format: OutputFormat,

    /// Output path; the manifest extension follows the format
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Representation as WIDTHxHEIGHT@KBPS[/AUDIO_KBPS], repeatable
    #[arg(short, long = "rep", value_name = "REP")]
    pub reps: Vec<String>,

    /// Derive the ladder from the probed source
    #[arg(long, conflicts_with = "reps")]
    pub auto_ladder: bool,

    /// Encrypt HLS segments with a key written to this path
    #[arg(long, requires = "encrypt_url")]
    pub encrypt_key: Option<PathBuf>,

    /// URL players fetch the key from
    #[arg(long, requires = "encrypt_key")]
    pub encrypt_url: Option<String>,

    /// Rotate the key every N segments
    #[arg(long, requires = "encrypt_key")]
    pub rotate: Option<usize>,

    /// Produce output in a temporary directory and mirror it here first
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Treat the input as a capture device name
    #[arg(long)]
    pub capture: bool,

    /// Audio device captured together with the input device
    #[arg(long, requires = "capture")]
    pub audio_device: Option<String>,

    /// Stream to a live ingest URL instead of writing files
    #[arg(long, value_name = "URL", conflicts_with_all = ["output", "upload_dir", "export_metadata"])]
    pub live: Option<String>,

    /// Delete the input once packaging is over
    #[arg(long)]
    pub temporary_source: bool,

    /// Write metadata JSON, next to the output unless a path is given
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub export_metadata: Option<Option<PathBuf>>,

    /// Print the ffmpeg command without running it
    #[arg(long)]
    pub dry_run: bool,
}
