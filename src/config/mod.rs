mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./ladderforge.toml",
        "~/.config/ladderforge/config.toml",
        "/etc/ladderforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.hls.segment_duration == 0 {
        anyhow::bail!("HLS segment duration cannot be 0");
    }
    if config.dash.segment_duration == 0 {
        anyhow::bail!("DASH segment duration cannot be 0");
    }
    if config.hls.key_rotation_period == Some(0) {
        anyhow::bail!("HLS key rotation period cannot be 0");
    }
    if config.packaging.threads == Some(0) {
        anyhow::bail!("Thread count cannot be 0");
    }

    for (i, rep) in config.ladder.iter().enumerate() {
        rep.to_representation()
            .with_context(|| format!("Invalid ladder entry #{}", i + 1))?;
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
