//! External media engine invocation.
//!
//! Everything that touches the ffmpeg/ffprobe processes lives behind
//! the [`MediaEngine`] trait: availability and capability probes, the
//! display-dimension probe, and the blocking render invocation with
//! line-buffered progress parsing. The orchestrator and its tests only
//! see the trait, so a recording fake can stand in for the real tools.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use castweld_common::error::{CastweldError, CastweldResult};

/// How many trailing stderr lines are kept for failure diagnostics.
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Progress parsed from the engine's `-progress pipe:1` stream, updated
/// key by key and flushed to the callback on each `progress` marker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineProgress {
    pub frame: u64,
    pub fps: f64,
    pub out_time_secs: f64,
    pub speed: f64,
    pub finished: bool,
}

impl EngineProgress {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "frame" => {
                if let Ok(v) = value.parse() {
                    self.frame = v;
                }
            }
            "fps" => {
                if let Ok(v) = value.parse() {
                    self.fps = v;
                }
            }
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(v) = value.parse::<i64>() {
                    self.out_time_secs = v as f64 / 1_000_000.0;
                }
            }
            "speed" => {
                if let Ok(v) = value.trim_end_matches('x').parse() {
                    self.speed = v;
                }
            }
            "progress" => self.finished = value == "end",
            _ => {}
        }
    }
}

/// Apply one `key=value` progress line; returns true when the engine
/// flushed a progress block and the callback should fire.
fn apply_progress_line(state: &mut EngineProgress, line: &str) -> bool {
    let Some((key, value)) = line.split_once('=') else {
        return false;
    };
    let key = key.trim();
    state.update(key, value.trim());
    key == "progress"
}

/// Outcome of one engine invocation. A non-zero exit is a value here,
/// not an error, because the orchestrator decides whether to fall back.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub success: bool,
    /// Trailing stderr lines, newest last.
    pub diagnostic_tail: Vec<String>,
}

/// Seam between the render pipeline and the external tools.
pub trait MediaEngine {
    /// Whether the engine binary responds at all.
    fn is_available(&self) -> bool;

    /// Engine name for logs and reports.
    fn name(&self) -> &str;

    /// Raw registered-encoder listing, for the encoder-presence probe.
    fn registered_encoders(&self) -> CastweldResult<String>;

    /// Driver-level compute accelerator probe.
    fn accelerator_present(&self) -> bool;

    /// Width and height of a video file's first video stream.
    fn video_dimensions(&self, path: &Path) -> CastweldResult<(u32, u32)>;

    /// Run the engine to completion, forwarding progress as it arrives.
    /// The callback fires on the calling thread, line-buffered.
    fn execute(
        &self,
        args: &[String],
        progress: &dyn Fn(EngineProgress),
    ) -> CastweldResult<EngineRun>;
}

/// The real ffmpeg/ffprobe pair. Binary locations honor the
/// `CASTWELD_FFMPEG` and `CASTWELD_FFPROBE` environment overrides and
/// otherwise resolve on PATH.
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn discover() -> Self {
        let ffmpeg = std::env::var_os("CASTWELD_FFMPEG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe = std::env::var_os("CASTWELD_FFPROBE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffprobe"));
        Self { ffmpeg, ffprobe }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Whether the ffprobe companion responds.
    pub fn probe_available(&self) -> bool {
        binary_responds(&self.ffprobe)
    }
}

impl MediaEngine for FfmpegEngine {
    fn is_available(&self) -> bool {
        binary_responds(&self.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn registered_encoders(&self) -> CastweldResult<String> {
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
            .map_err(|e| CastweldError::engine(format!("failed to list encoders: {e}")))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn accelerator_present(&self) -> bool {
        match Command::new("nvidia-smi").arg("-L").output() {
            Ok(output) => output.status.success() && !output.stdout.is_empty(),
            Err(_) => false,
        }
    }

    fn video_dimensions(&self, path: &Path) -> CastweldResult<(u32, u32)> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=p=0:s=x",
            ])
            .arg(path)
            .output()
            .map_err(|e| CastweldError::engine(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(CastweldError::engine(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_dimensions(String::from_utf8_lossy(&output.stdout).trim())
    }

    fn execute(
        &self,
        args: &[String],
        progress: &dyn Fn(EngineProgress),
    ) -> CastweldResult<EngineRun> {
        tracing::info!(engine = %self.ffmpeg.display(), "Invoking media engine");
        tracing::debug!(?args, "Engine arguments");

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CastweldError::engine(format!(
                    "failed to start {}: {e}",
                    self.ffmpeg.display()
                ))
            })?;

        // Drain stderr on its own thread so a chatty engine cannot
        // deadlock against the progress pipe.
        let tail_thread = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || {
                let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    tracing::trace!(target: "castweld::engine", "{line}");
                    if tail.len() == DIAGNOSTIC_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut state = EngineProgress::default();
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if apply_progress_line(&mut state, &line) {
                    progress(state);
                }
            }
        }

        let status = child.wait()?;
        let diagnostic_tail: Vec<String> = tail_thread
            .and_then(|handle| handle.join().ok())
            .map(|tail| tail.into_iter().collect())
            .unwrap_or_default();

        if !status.success() {
            tracing::warn!(code = ?status.code(), "Engine exited with failure");
        }
        Ok(EngineRun {
            success: status.success(),
            diagnostic_tail,
        })
    }
}

fn binary_responds(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn parse_dimensions(raw: &str) -> CastweldResult<(u32, u32)> {
    let (w, h) = raw
        .split_once('x')
        .ok_or_else(|| CastweldError::engine(format!("unparseable dimensions: {raw:?}")))?;
    let width = w
        .trim()
        .parse()
        .map_err(|_| CastweldError::engine(format!("bad width in {raw:?}")))?;
    let height = h
        .trim()
        .parse()
        .map_err(|_| CastweldError::engine(format!("bad height in {raw:?}")))?;
    Ok((width, height))
}
