//! Local transcription via the whisper.cpp command-line tool.
//!
//! Speech-to-text runs fully offline. The render pipeline treats the
//! transcriber as a black box that yields timestamped text segments;
//! anything implementing [`Transcriber`] can stand in for it.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use castweld_common::error::{CastweldError, CastweldResult};

/// Whisper model size selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    /// Fastest, least accurate (~39 MB).
    Tiny,
    /// Good balance of speed and accuracy (~142 MB).
    Base,
    /// Better accuracy, slower (~466 MB).
    Small,
    /// High accuracy (~1.5 GB).
    Medium,
    /// Best accuracy, slowest (~2.9 GB).
    Large,
}

impl WhisperModel {
    /// Resolve a model name from configuration; unknown names fall back
    /// to `base`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "tiny" => WhisperModel::Tiny,
            "small" => WhisperModel::Small,
            "medium" => WhisperModel::Medium,
            "large" => WhisperModel::Large,
            _ => WhisperModel::Base,
        }
    }

    /// Approximate model file size in bytes.
    pub fn size_bytes(&self) -> u64 {
        match self {
            WhisperModel::Tiny => 39_000_000,
            WhisperModel::Base => 142_000_000,
            WhisperModel::Small => 466_000_000,
            WhisperModel::Medium => 1_500_000_000,
            WhisperModel::Large => 2_900_000_000,
        }
    }

    /// Model filename inside the models directory.
    pub fn filename(&self) -> &str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large.bin",
        }
    }
}

/// Configuration for one transcription run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Model to use.
    pub model: WhisperModel,

    /// Language hint (ISO 639-1 code, e.g., "en"). `None` auto-detects.
    pub language: Option<String>,

    /// Number of CPU threads for inference.
    pub threads: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: WhisperModel::Base,
            language: None,
            threads: 4,
        }
    }
}

/// A single transcribed segment with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_secs: f64,
    /// End time in seconds.
    pub end_secs: f64,
    /// Transcribed text, trimmed.
    pub text: String,
}

/// Speech-to-text seam consumed by the render pipeline.
pub trait Transcriber {
    /// Transcribe an audio file into timestamped segments.
    fn transcribe(
        &self,
        audio_path: &Path,
        config: &TranscriptionConfig,
    ) -> CastweldResult<Vec<TranscriptSegment>>;

    /// Check whether this transcriber can run on this system.
    fn is_available(&self) -> bool;

    /// Transcriber name for logs.
    fn name(&self) -> &str;
}

/// Transcriber backed by the whisper.cpp CLI (`whisper-cli`).
///
/// The binary location can be overridden with `CASTWELD_WHISPER`, the
/// model directory with `CASTWELD_WHISPER_MODELS`.
pub struct WhisperCli {
    binary: PathBuf,
    models_dir: PathBuf,
}

impl WhisperCli {
    pub fn discover() -> Self {
        let binary = std::env::var_os("CASTWELD_WHISPER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("whisper-cli"));
        let models_dir = std::env::var_os("CASTWELD_WHISPER_MODELS")
            .map(PathBuf::from)
            .unwrap_or_else(default_models_dir);
        Self { binary, models_dir }
    }

    /// Path the given model is expected at.
    pub fn model_path(&self, model: WhisperModel) -> PathBuf {
        self.models_dir.join(model.filename())
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(
        &self,
        audio_path: &Path,
        config: &TranscriptionConfig,
    ) -> CastweldResult<Vec<TranscriptSegment>> {
        if !audio_path.exists() {
            return Err(CastweldError::FileNotFound {
                path: audio_path.to_path_buf(),
            });
        }

        let model_path = self.model_path(config.model);
        if !model_path.exists() {
            return Err(CastweldError::captions(format!(
                "whisper model not found: {} (expected at {})",
                config.model.filename(),
                model_path.display()
            )));
        }

        let started = std::time::Instant::now();
        let output_prefix =
            std::env::temp_dir().join(format!("castweld-transcript-{}", std::process::id()));

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m")
            .arg(&model_path)
            .arg("-f")
            .arg(audio_path)
            .args(["-t", &config.threads.to_string()])
            .arg("-oj")
            .arg("-of")
            .arg(&output_prefix);
        if let Some(lang) = &config.language {
            cmd.args(["-l", lang]);
        }

        tracing::info!(
            audio = %audio_path.display(),
            model = ?config.model,
            "Starting transcription"
        );

        let output = cmd
            .output()
            .map_err(|e| CastweldError::captions(format!("failed to start whisper: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CastweldError::captions(format!(
                "whisper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let json_path = output_prefix.with_extension("json");
        let content = std::fs::read_to_string(&json_path)?;
        std::fs::remove_file(&json_path).ok();

        let segments = parse_whisper_json(&content)?;
        tracing::info!(
            segments = segments.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Transcription finished"
        );
        Ok(segments)
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--help")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "whisper-cli"
    }
}

/// Parse the whisper.cpp `-oj` JSON output into segments. Offsets are
/// integer milliseconds; empty segments are dropped.
pub fn parse_whisper_json(content: &str) -> CastweldResult<Vec<TranscriptSegment>> {
    #[derive(Deserialize)]
    struct Output {
        transcription: Vec<Segment>,
    }

    #[derive(Deserialize)]
    struct Segment {
        offsets: Offsets,
        text: String,
    }

    #[derive(Deserialize)]
    struct Offsets {
        from: u64,
        to: u64,
    }

    let parsed: Output = serde_json::from_str(content)?;
    Ok(parsed
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start_secs: seg.offsets.from as f64 / 1000.0,
                end_secs: seg.offsets.to as f64 / 1000.0,
                text,
            })
        })
        .collect())
}

fn default_models_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("castweld").join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_name_with_fallback() {
        assert_eq!(WhisperModel::from_name("tiny"), WhisperModel::Tiny);
        assert_eq!(WhisperModel::from_name("Base"), WhisperModel::Base);
        assert_eq!(WhisperModel::from_name("medium"), WhisperModel::Medium);
        assert_eq!(WhisperModel::from_name("turbo-xxl"), WhisperModel::Base);
    }

    #[test]
    fn test_model_filenames() {
        assert_eq!(WhisperModel::Tiny.filename(), "ggml-tiny.bin");
        assert_eq!(WhisperModel::Large.filename(), "ggml-large.bin");
    }

    #[test]
    fn test_parse_whisper_json_offsets_are_milliseconds() {
        let json = r#"{
            "transcription": [
                {
                    "timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                    "offsets": {"from": 0, "to": 2500},
                    "text": " Hello world"
                },
                {
                    "timestamps": {"from": "00:00:03,000", "to": "00:00:05,000"},
                    "offsets": {"from": 3000, "to": 5000},
                    "text": " second line "
                }
            ]
        }"#;

        let segments = parse_whisper_json(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert!((segments[0].start_secs - 0.0).abs() < 1e-9);
        assert!((segments[0].end_secs - 2.5).abs() < 1e-9);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[1].text, "second line");
    }

    #[test]
    fn test_parse_whisper_json_drops_empty_segments() {
        let json = r#"{
            "transcription": [
                {"offsets": {"from": 0, "to": 100}, "text": "   "},
                {"offsets": {"from": 100, "to": 900}, "text": " kept"}
            ]
        }"#;

        let segments = parse_whisper_json(json).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
    }

    #[test]
    fn test_parse_whisper_json_rejects_malformed() {
        assert!(parse_whisper_json("{\"transcription\": 7}").is_err());
    }
}
