//! Running the encoding engine and feeding its output to listeners.
//!
//! The engine reports progress only as unstructured text on stderr. The
//! runner reads that stream line by line on the calling thread and invokes
//! every [`LineListener`] synchronously, in registration order, before the
//! next line is read. Listener failures are logged and collected; they never
//! abort the run.

use crate::{Error, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Number of trailing engine lines kept for error reports.
const DIAGNOSTIC_TAIL: usize = 20;

/// The exact engine command for one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    executable: PathBuf,
    arguments: Vec<String>,
    working_directory: Option<PathBuf>,
}

impl EngineInvocation {
    pub(crate) fn new(
        executable: PathBuf,
        arguments: Vec<String>,
        working_directory: Option<PathBuf>,
    ) -> Self {
        Self {
            executable,
            arguments,
            working_directory,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.executable.to_string_lossy().to_string()];
        parts.extend(self.arguments.iter().map(|a| {
            if a.contains(' ') {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }

    fn program_name(&self) -> String {
        self.executable
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.executable.to_string_lossy().to_string())
    }
}

/// A handler subscribed to the engine's line stream.
pub trait LineListener {
    /// Called once per engine output line, in emission order.
    fn on_line(&mut self, line: &str) -> Result<()>;
}

/// Adapts a closure into a [`LineListener`].
pub struct FnListener<F>(pub F);

impl<F> LineListener for FnListener<F>
where
    F: FnMut(&str) -> Result<()>,
{
    fn on_line(&mut self, line: &str) -> Result<()> {
        (self.0)(line)
    }
}

/// What a successful engine run produced besides its files.
#[derive(Debug, Default)]
pub struct EngineOutcome {
    /// Number of non-empty lines read from the engine.
    pub lines: usize,
    /// Errors raised by listeners; the run continued past each of them.
    pub listener_errors: Vec<Error>,
}

/// Spawn the engine, stream its stderr through `listeners`, and wait for it.
///
/// # Errors
///
/// Returns [`Error::Packaging`] if the engine cannot be spawned or exits with
/// a non-zero status; the message carries the last lines the engine printed.
pub fn run(
    invocation: &EngineInvocation,
    listeners: &mut [&mut dyn LineListener],
) -> Result<EngineOutcome> {
    let program = invocation.program_name();
    tracing::info!("engine: {}", invocation.command_line());

    let mut cmd = Command::new(&invocation.executable);
    cmd.args(&invocation.arguments)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    if let Some(dir) = &invocation.working_directory {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::packaging(format!("failed to spawn {program}: {e}")))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::packaging(format!("{program}: stderr was not captured")))?;

    let mut outcome = EngineOutcome::default();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL);

    for chunk in BufReader::new(stderr).split(b'\n') {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("error reading {} output: {}", program, e);
                break;
            }
        };
        let text = String::from_utf8_lossy(&chunk);

        // Stats lines are separated by carriage returns rather than newlines.
        for line in text.split('\r').map(str::trim_end).filter(|l| !l.is_empty()) {
            outcome.lines += 1;
            tracing::trace!("{}: {}", program, line);

            if tail.len() == DIAGNOSTIC_TAIL {
                tail.pop_front();
            }
            tail.push_back(line.to_string());

            for listener in listeners.iter_mut() {
                if let Err(e) = listener.on_line(line) {
                    tracing::warn!("line listener failed: {}", e);
                    outcome.listener_errors.push(e);
                }
            }
        }
    }

    let status = child
        .wait()
        .map_err(|e| Error::packaging(format!("failed waiting for {program}: {e}")))?;

    if !status.success() {
        let diagnostics: Vec<String> = tail.into_iter().collect();
        return Err(Error::packaging(format!(
            "{program} exited with {status}: {}",
            diagnostics.join("\n")
        )));
    }

    tracing::info!("{} finished ({} lines of output)", program, outcome.lines);
    Ok(outcome)
}

/// Progress snapshot parsed from the engine's `-progress` blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// 0.0..=1.0 when the source duration is known.
    pub pct: Option<f64>,
    /// Media time encoded so far.
    pub out_time: Duration,
    pub speed: Option<String>,
    /// Set on the final block (`progress=end`).
    pub finished: bool,
}

/// Parses `-progress pipe:2` key/value output into [`Progress`] reports.
///
/// Percentages are logged in 10% steps; every block is handed to the
/// optional callback.
pub struct ProgressListener {
    duration_secs: Option<f64>,
    out_time_us: Option<i64>,
    speed: Option<String>,
    last_logged_decile: Option<u32>,
    callback: Option<Box<dyn FnMut(Progress)>>,
}

impl ProgressListener {
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs,
            out_time_us: None,
            speed: None,
            last_logged_decile: None,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: impl FnMut(Progress) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    fn emit(&mut self, finished: bool) {
        let out_us = self.out_time_us.unwrap_or(0).max(0);
        let elapsed = out_us as f64 / 1_000_000.0;
        let pct = match self.duration_secs {
            Some(d) if d > 0.0 => Some((elapsed / d).clamp(0.0, 1.0)),
            _ => None,
        };

        if let Some(p) = pct {
            let decile = (p * 10.0).floor() as u32;
            if self.last_logged_decile != Some(decile) {
                self.last_logged_decile = Some(decile);
                tracing::info!("[{:.0}%] encoding", p * 100.0);
            }
        }

        let report = Progress {
            pct,
            out_time: Duration::from_micros(out_us as u64),
            speed: self.speed.clone(),
            finished,
        };
        if let Some(cb) = self.callback.as_mut() {
            cb(report);
        }
    }
}

impl LineListener for ProgressListener {
    fn on_line(&mut self, line: &str) -> Result<()> {
        if let Some(val) = line.strip_prefix("out_time_us=") {
            self.out_time_us = val.trim().parse::<i64>().ok();
        } else if let Some(val) = line.strip_prefix("speed=") {
            let v = val.trim();
            if v != "N/A" {
                self.speed = Some(v.to_string());
            }
        } else if let Some(val) = line.strip_prefix("progress=") {
            self.emit(val.trim() == "end");
        } else {
            tracing::debug!("{}", line);
        }
        Ok(())
    }
}
