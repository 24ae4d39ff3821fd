mod cli;

use ladderforge::config::{self, Config};
use ladderforge_av::{
    CommandBuilder, Destination, DirectoryTarget, Format, KeyInfo, Ladder, Metadata,
    Profile, Representation, Source, Stream, Toolchain,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OutputFormat, PackageArgs};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ladderforge=trace,ladderforge_av=trace".to_string()
        } else {
            "ladderforge=info,ladderforge_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Package(args) => package(args, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ladderforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn package(args: PackageArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let source = resolve_source(&args, &config)?;

    let toolchain = if args.dry_run {
        config.unchecked_toolchain()
    } else {
        config.toolchain()?
    };

    let ladder = resolve_ladder(&args, &config, &source, &toolchain)?;
    let format = resolve_format(&args, &config)?;

    let mut profile = Profile::new(format, ladder)
        .with_codecs(config.codecs())
        .with_additional_params(config.packaging.additional_params.iter().cloned());
    if let Some(threads) = config.packaging.threads {
        profile = profile.with_threads(threads);
    }
    if let Some(ref strict) = config.packaging.strict {
        profile = profile.with_strict(strict.clone());
    }

    if args.dry_run {
        let output = match &args.live {
            Some(url) => PathBuf::from(url),
            None => {
                let requested = args
                    .output
                    .clone()
                    .or_else(|| source.path().map(Path::to_path_buf))
                    .context("An output path is required for this input")?;
                profile.format.output_path(&requested)
            }
        };
        let invocation = CommandBuilder::new(&toolchain.ffmpeg).build(&source, &profile, &output)?;
        println!("[DRY RUN] {}", invocation.command_line());
        return Ok(());
    }

    let mut stream = Stream::new(source, profile)
        .with_toolchain(toolchain)
        .with_teardown_grace(config.teardown_grace());

    if let Some(url) = &args.live {
        let report = stream.live(url)?;
        println!("Streamed {} to {}", stream.source().input(), url);
        println!("Engine output lines: {}", report.lines);
        return Ok(());
    }

    let destination = match (&args.upload_dir, &args.output) {
        (Some(dir), Some(output)) => {
            Destination::remote(DirectoryTarget::new(dir)).and_local(output.clone())
        }
        (Some(dir), None) => Destination::remote(DirectoryTarget::new(dir)),
        (None, Some(output)) => Destination::local(output.clone()),
        (None, None) => Destination::none(),
    };

    let report = stream.save(destination)?;

    println!("Packaged {} as {}", stream.source().input(), stream.format().technique());
    println!("Output: {}", report.output.display());
    println!("Representations: {}", stream.ladder().len());
    if report.rotations > 0 {
        println!("Key rotations: {}", report.rotations);
    }
    for e in &report.listener_errors {
        println!("Warning: {}", e);
    }

    if let Some(export) = args.export_metadata {
        let metadata = Metadata::new(&mut stream)?;
        let written = metadata.export(export.as_deref())?;
        println!("Metadata: {}", written.display());
    }

    Ok(())
}

fn resolve_source(args: &PackageArgs, config: &Config) -> Result<Source> {
    if args.capture {
        return Ok(Source::capture(
            &args.input,
            args.audio_device.as_deref(),
            config.platform(),
        ));
    }
    if args.input.contains("://") {
        return Ok(Source::url(&args.input));
    }

    let path = PathBuf::from(&args.input);
    if !path.exists() {
        anyhow::bail!("Input file does not exist: {:?}", path);
    }
    Ok(Source::file(path).temporary(args.temporary_source))
}

fn resolve_ladder(
    args: &PackageArgs,
    config: &Config,
    source: &Source,
    toolchain: &Toolchain,
) -> Result<Ladder> {
    if !args.reps.is_empty() {
        return args
            .reps
            .iter()
            .map(|s| {
                s.parse::<Representation>()
                    .with_context(|| format!("Invalid representation: {}", s))
            })
            .collect();
    }

    if args.auto_ladder {
        let info = ladderforge_av::probe::probe_with_ffprobe(&toolchain.ffprobe, &source.input())?;
        let video = info
            .primary_video()
            .context("Cannot derive a ladder: the source has no video track")?;
        let kbps = info.video_kilo_bit_rate().unwrap_or(5000);
        return Ok(Ladder::auto(video.width, video.height, kbps)?);
    }

    let ladder = config.ladder()?;
    if ladder.is_empty() && !matches!(args.format, OutputFormat::File) {
        anyhow::bail!("No representations given; use --rep, --auto-ladder or a [[ladder]] config");
    }
    Ok(ladder)
}

fn resolve_format(args: &PackageArgs, config: &Config) -> Result<Format> {
    let format = match args.format {
        OutputFormat::Hls => {
            let mut options = config.hls_options();
            if let (Some(key), Some(url)) = (&args.encrypt_key, &args.encrypt_url) {
                options = options.encrypt(KeyInfo::new(key, url.clone())?);
                if let Some(period) = args.rotate.or(config.hls.key_rotation_period) {
                    options = options.rotate_every(period);
                }
            }
            Format::Hls(options)
        }
        OutputFormat::Dash => {
            if args.encrypt_key.is_some() {
                anyhow::bail!("Encryption is only supported for HLS output");
            }
            Format::Dash(config.dash_options())
        }
        OutputFormat::File => {
            if args.encrypt_key.is_some() {
                anyhow::bail!("Encryption is only supported for HLS output");
            }
            Format::File(Default::default())
        }
    };
    Ok(format)
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let toolchain = config.toolchain()?;
    let media_info =
        ladderforge_av::probe::probe_with_ffprobe(&toolchain.ffprobe, &file.to_string_lossy())?;

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", media_info.input);
        println!("Container: {}", media_info.container);
        if let Some(size) = media_info.file_size {
            println!("Size: {} bytes", size);
        }
        if let Some(ref duration) = media_info.duration {
            let secs = duration.as_secs();
            let mins = secs / 60;
            let hours = mins / 60;
            println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
        }
        if let Some(rate) = media_info.bit_rate {
            println!("Bitrate: {} kb/s", rate / 1000);
        }

        println!("\nVideo Tracks: {}", media_info.video_tracks.len());
        for (i, track) in media_info.video_tracks.iter().enumerate() {
            print!("  [{}] {} {}x{}", i, track.codec, track.width, track.height);
            if let Some(fps) = track.frame_rate {
                print!(", {:.3} fps", fps);
            }
            println!();
        }

        println!("\nAudio Tracks: {}", media_info.audio_tracks.len());
        for (i, track) in media_info.audio_tracks.iter().enumerate() {
            print!("  [{}] {} {}ch", i, track.codec, track.channels);
            if let Some(ref lang) = track.language {
                print!(" ({})", lang);
            }
            println!();
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = match (&config.tools.ffmpeg_path, &config.tools.ffprobe_path) {
        (None, None) => ladderforge_av::check_tools(),
        _ => config.unchecked_toolchain().check(),
    };
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            print_config_summary(&config);
        }
    }

    Ok(())
}

fn print_config_summary(config: &Config) {
    println!(
        "  Codecs: {} / {}",
        config.packaging.video_codec, config.packaging.audio_codec
    );
    println!("  HLS segment duration: {}s", config.hls.segment_duration);
    println!("  DASH segment duration: {}s", config.dash.segment_duration);
    println!("  Ladder entries: {}", config.ladder.len());
    let toolchain = config.unchecked_toolchain();
    println!("  ffmpeg: {}", toolchain.ffmpeg.display());
    println!("  ffprobe: {}", toolchain.ffprobe.display());
}
