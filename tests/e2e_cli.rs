//! CLI end-to-end tests
//!
//! Tests for the ladderforge command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the ladderforge binary
#[allow(deprecated)]
fn ladderforge_cmd() -> Command {
    Command::cargo_bin("ladderforge").unwrap()
}

/// An empty config so tests never pick up a config from the host.
fn empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "").unwrap();
    path
}

fn fake_source(dir: &Path) -> PathBuf {
    let path = dir.join("movie.mp4");
    fs::write(&path, b"not really media").unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = ladderforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = ladderforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ladderforge"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = ladderforge_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ladderforge"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = ladderforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let temp = tempdir().unwrap();
    let config = empty_config(temp.path());

    let mut cmd = ladderforge_cmd();
    cmd.args(["check-tools", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_check_tools_reports_missing_configured_tool() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(
        &config,
        r#"
[tools]
ffmpeg_path = "/nonexistent/bin/ffmpeg"
ffprobe_path = "/nonexistent/bin/ffprobe"
"#,
    )
    .unwrap();

    let mut cmd = ladderforge_cmd();
    cmd.args(["check-tools", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("✗ ffmpeg"))
        .stdout(predicate::str::contains("Some tools are missing"));
}

#[test]
fn test_cli_package_help() {
    let mut cmd = ladderforge_cmd();
    cmd.args(["package", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Package a source"))
        .stdout(predicate::str::contains("--rep"));
}

#[test]
fn test_cli_probe_help() {
    let mut cmd = ladderforge_cmd();
    cmd.args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Probe a media file"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = ladderforge_cmd();
    cmd.args(["probe", "/nonexistent/path/movie.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found").or(predicate::str::contains("exist")));
}

#[test]
fn test_cli_package_nonexistent_file() {
    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "/nonexistent/path/movie.mkv",
        "--rep",
        "640x360@800",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_package_dry_run_prints_hls_command() {
    let temp = tempdir().unwrap();
    let config = empty_config(temp.path());
    let source = fake_source(temp.path());
    let output = temp.path().join("out/movie.m3u8");

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "--config",
        config.to_str().unwrap(),
        source.to_str().unwrap(),
        "--rep",
        "640x360@800/96",
        "--rep",
        "1280x720@2500/128",
        "--output",
        output.to_str().unwrap(),
        "--dry-run",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("[DRY RUN]"))
    .stdout(predicate::str::contains("-f hls"))
    .stdout(predicate::str::contains("-hls_time 10"))
    .stdout(predicate::str::contains("movie_360p.m3u8"))
    .stdout(predicate::str::contains("movie_720p.m3u8"));

    // A dry run never writes output.
    assert!(!output.exists());
}

#[test]
fn test_cli_package_dry_run_dash_uses_config() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(
        &config,
        r#"
[dash]
segment_duration = 4

[[ladder]]
width = 640
height = 360
video_kilo_bitrate = 800
"#,
    )
    .unwrap();
    let source = fake_source(temp.path());

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "--config",
        config.to_str().unwrap(),
        source.to_str().unwrap(),
        "--format",
        "dash",
        "--dry-run",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("-f dash"))
    .stdout(predicate::str::contains("-seg_duration 4"))
    .stdout(predicate::str::contains("movie.mpd"));
}

#[test]
fn test_cli_package_rejects_malformed_representation() {
    let temp = tempdir().unwrap();
    let config = empty_config(temp.path());
    let source = fake_source(temp.path());

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "--config",
        config.to_str().unwrap(),
        source.to_str().unwrap(),
        "--rep",
        "640x360",
        "--dry-run",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid representation"));
}

#[test]
fn test_cli_package_needs_a_ladder() {
    let temp = tempdir().unwrap();
    let config = empty_config(temp.path());
    let source = fake_source(temp.path());

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "--config",
        config.to_str().unwrap(),
        source.to_str().unwrap(),
        "--dry-run",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No representations"));
}

#[test]
fn test_cli_rotate_requires_encryption() {
    let temp = tempdir().unwrap();
    let source = fake_source(temp.path());

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        source.to_str().unwrap(),
        "--rep",
        "640x360@800",
        "--rotate",
        "5",
    ])
    .assert()
    .failure();
}

#[test]
fn test_cli_validate_good_config() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(
        &config,
        r#"
[packaging]
video_codec = "libx265"

[hls]
segment_duration = 6
"#,
    )
    .unwrap();

    let mut cmd = ladderforge_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("libx265"))
        .stdout(predicate::str::contains("6s"));
}

#[test]
fn test_cli_config_validation() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(
        &config,
        r#"
[hls]
segment_duration = 0
"#,
    )
    .unwrap();

    let mut cmd = ladderforge_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("segment duration"));
}

#[test]
fn test_cli_package_dry_run_capture_uses_configured_platform() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(&config, "[packaging]\nplatform = \"linux\"\n").unwrap();

    let mut cmd = ladderforge_cmd();
    cmd.args([
        "package",
        "--config",
        config.to_str().unwrap(),
        "/dev/video0",
        "--capture",
        "--format",
        "file",
        "--rep",
        "1280x720@2500",
        "--live",
        "rtmp://ingest.example/live/key",
        "--dry-run",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("-f v4l2 -i /dev/video0"))
    .stdout(predicate::str::contains("rtmp://ingest.example/live/key"));
}
