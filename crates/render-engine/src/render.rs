//! Render orchestration.
//!
//! Sequences one render end to end: validate the session, generate
//! captions (optional, never fatal), load and prepare cursor samples,
//! compile the positional and identity expressions, assemble and write
//! the filter script, probe capabilities, then invoke the engine with
//! the selected encoder. A failed hardware encode is retried exactly
//! once on the software variant with the same filter script and inputs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use castweld_captions::subtitles::save_caption_files;
use castweld_captions::transcription::{Transcriber, TranscriptionConfig, WhisperModel};
use castweld_common::error::{CastweldError, CastweldResult};
use castweld_project_model::project::SessionPaths;
use castweld_project_model::sample::load_cursor_track;
use castweld_project_model::settings::{CaptionSettings, RenderSettings};

use crate::encoder::{
    audio_args, select_encoder, software_variant, CapabilitySnapshot, EncoderConfig, EncoderKind,
};
use crate::engine::{EngineProgress, EngineRun, MediaEngine};
use crate::expr::PiecewiseExpr;
use crate::filter::FilterGraph;

/// Assumed display size when the probe fails; matches the most common
/// capture resolution.
const DEFAULT_DISPLAY_DIMS: (u32, u32) = (1920, 1080);

/// One render request: where the session lives, where the output goes,
/// how to composite. Owned by the orchestrator for the render's
/// duration; never shared between concurrent renders.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub session: SessionPaths,
    pub output: PathBuf,
    pub settings: RenderSettings,
}

/// Stages of the render process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Captioning,
    Compiling,
    Encoding,
    Retrying,
    Complete,
    Failed,
}

impl RenderStage {
    pub fn label(&self) -> &'static str {
        match self {
            RenderStage::Preparing => "preparing",
            RenderStage::Captioning => "captioning",
            RenderStage::Compiling => "compiling",
            RenderStage::Encoding => "encoding",
            RenderStage::Retrying => "retrying (software encoder)",
            RenderStage::Complete => "complete",
            RenderStage::Failed => "failed",
        }
    }
}

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current stage.
    pub stage: RenderStage,

    /// Progress in [0.0, 1.0]; 0.0 while the total duration is unknown.
    pub progress: f64,

    /// Output timestamp reached by the engine, in seconds.
    pub out_time_secs: f64,

    /// Encode speed relative to realtime.
    pub speed: f64,
}

impl RenderProgress {
    fn at_stage(stage: RenderStage) -> Self {
        Self {
            stage,
            progress: 0.0,
            out_time_secs: 0.0,
            speed: 0.0,
        }
    }
}

/// Progress callback for render jobs.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// What a finished render produced.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub output: PathBuf,
    pub encoder: EncoderConfig,
    /// True when the hardware attempt failed and the software retry
    /// produced the output.
    pub fell_back: bool,
    pub script_path: PathBuf,
    pub captions: Option<PathBuf>,
}

/// Render a session to a video file.
///
/// This is the main entry point. The blocking engine invocation runs on
/// a worker thread so an async caller stays responsive.
pub async fn render_session(
    job: RenderJob,
    engine: Arc<dyn MediaEngine + Send + Sync>,
    transcriber: Option<Box<dyn Transcriber + Send>>,
    progress: Option<ProgressCallback>,
) -> CastweldResult<RenderOutcome> {
    tokio::task::spawn_blocking(move || {
        let transcriber: Option<&dyn Transcriber> =
            transcriber.as_deref().map(|t| t as &dyn Transcriber);
        run_render(&job, engine.as_ref(), transcriber, &progress)
    })
    .await
    .map_err(|e| CastweldError::engine(format!("render worker panicked: {e}")))?
}

/// Synchronous render used by [`render_session`] and direct callers
/// that already live on a worker thread.
pub fn run_render(
    job: &RenderJob,
    engine: &dyn MediaEngine,
    transcriber: Option<&dyn Transcriber>,
    progress: &Option<ProgressCallback>,
) -> CastweldResult<RenderOutcome> {
    let started = Instant::now();
    tracing::info!(
        session = %job.session.root.display(),
        output = %job.output.display(),
        "Starting render"
    );

    if let Some(cb) = progress {
        cb(RenderProgress::at_stage(RenderStage::Preparing));
    }

    let missing = job.session.validate();
    if !missing.is_empty() {
        return Err(CastweldError::session(format!(
            "session {} is missing: {}",
            job.session.root.display(),
            missing.join(", ")
        )));
    }
    if let Some(parent) = job.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let captions = if job.settings.captions.enabled {
        if let Some(cb) = progress {
            cb(RenderProgress::at_stage(RenderStage::Captioning));
        }
        match prepare_captions(&job.session, &job.settings.captions, transcriber, &job.output) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Captioning failed; rendering without captions");
                None
            }
        }
    } else {
        None
    };

    let track = load_cursor_track(&job.session.cursor_track)?;
    let samples = track.prepare_samples(job.settings.duration_limit_secs)?;

    if let Some(cb) = progress {
        cb(RenderProgress::at_stage(RenderStage::Compiling));
    }

    let (width, height) = match engine.video_dimensions(&job.session.display) {
        Ok(dims) => dims,
        Err(e) => {
            tracing::warn!(
                error = %e,
                assumed_width = DEFAULT_DISPLAY_DIMS.0,
                assumed_height = DEFAULT_DISPLAY_DIMS.1,
                "Display dimension probe failed"
            );
            DEFAULT_DISPLAY_DIMS
        }
    };

    let times: Vec<f64> = samples.iter().map(|s| s.time_secs()).collect();
    let xs: Vec<f64> = samples.iter().map(|s| s.x * width as f64).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.y * height as f64).collect();
    let ids: Vec<f64> = samples.iter().map(|s| s.pointer_id as f64).collect();

    let x_expr = PiecewiseExpr::linear(&times, &xs)?;
    let y_expr = PiecewiseExpr::linear(&times, &ys)?;
    let id_expr = PiecewiseExpr::step(&times, &ids)?;
    tracing::debug!(
        samples = samples.len(),
        depth = x_expr.depth(),
        "Compiled cursor expressions"
    );

    let out_of_frame = out_of_frame_count(&x_expr, &y_expr, width, height, track.span_secs());
    if out_of_frame > 0 {
        tracing::warn!(
            out_of_frame,
            "Compiled cursor positions leave the frame; the track may be scaled for a different display"
        );
    }

    let graph = FilterGraph::assemble(
        &job.settings,
        &x_expr.to_string(),
        &y_expr.to_string(),
        &id_expr.to_string(),
        captions.as_deref(),
    );
    let script_path = job.output.with_extension("filter.txt");
    graph.write_script(&script_path)?;
    tracing::info!(
        script = %script_path.display(),
        statements = graph.statements().len(),
        "Wrote filter script"
    );

    let caps = CapabilitySnapshot::detect(engine, job.settings.codec_family);
    let selected = select_encoder(job.settings.codec_family, &caps);

    let duration_hint = job
        .settings
        .duration_limit_secs
        .or_else(|| Some(track.span_secs()).filter(|s| *s > 0.0));

    write_debug_report(
        job,
        samples.len(),
        out_of_frame,
        &x_expr,
        &graph,
        &caps,
        &selected,
    );

    let attempt = |encoder: EncoderConfig, stage: RenderStage| -> CastweldResult<EngineRun> {
        let args = build_engine_args(
            &job.session,
            &script_path,
            graph.output_label(),
            &encoder,
            job.settings.duration_limit_secs,
            &job.output,
        );
        tracing::info!(codec = encoder.codec, "Starting encode");
        engine.execute(&args, &|p: EngineProgress| {
            if let Some(cb) = progress {
                cb(RenderProgress {
                    stage,
                    progress: duration_hint
                        .map(|d| (p.out_time_secs / d).clamp(0.0, 1.0))
                        .unwrap_or(0.0),
                    out_time_secs: p.out_time_secs,
                    speed: p.speed,
                });
            }
        })
    };

    if let Some(cb) = progress {
        cb(RenderProgress::at_stage(RenderStage::Encoding));
    }
    let first = attempt(selected, RenderStage::Encoding)?;

    let (run, encoder, fell_back) = if !first.success && selected.kind == EncoderKind::Nvenc {
        tracing::warn!(
            codec = selected.codec,
            "Hardware encode failed; retrying once with the software encoder"
        );
        if let Some(cb) = progress {
            cb(RenderProgress::at_stage(RenderStage::Retrying));
        }
        let fallback = software_variant(job.settings.codec_family);
        let second = attempt(fallback, RenderStage::Retrying)?;
        (second, fallback, true)
    } else {
        (first, selected, false)
    };

    let success = run.success && job.output.exists();
    if !success {
        if let Some(cb) = progress {
            cb(RenderProgress::at_stage(RenderStage::Failed));
        }
        let tail = run.diagnostic_tail.join("\n");
        return Err(CastweldError::engine(format!(
            "encode with {} failed; engine output:\n{}",
            encoder.codec,
            if tail.is_empty() {
                "<no diagnostics captured>"
            } else {
                tail.as_str()
            }
        )));
    }

    if let Some(cb) = progress {
        cb(RenderProgress {
            stage: RenderStage::Complete,
            progress: 1.0,
            out_time_secs: duration_hint.unwrap_or(0.0),
            speed: 0.0,
        });
    }
    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        output = %job.output.display(),
        codec = encoder.codec,
        fell_back,
        "Render complete"
    );

    Ok(RenderOutcome {
        output: job.output.clone(),
        encoder,
        fell_back,
        script_path,
        captions,
    })
}

/// Transcribe the session audio and write the caption files next to
/// the output. Every skip path is deliberate: missing transcriber,
/// missing audio, unavailable binary, or an empty transcript all
/// degrade to a render without captions.
fn prepare_captions(
    session: &SessionPaths,
    settings: &CaptionSettings,
    transcriber: Option<&dyn Transcriber>,
    output: &Path,
) -> CastweldResult<Option<PathBuf>> {
    let Some(transcriber) = transcriber else {
        tracing::info!("No transcriber configured; skipping captions");
        return Ok(None);
    };
    if !session.audio.exists() {
        tracing::info!("Session has no audio track; skipping captions");
        return Ok(None);
    }
    if !transcriber.is_available() {
        tracing::warn!(
            transcriber = transcriber.name(),
            "Transcriber not available on this system; skipping captions"
        );
        return Ok(None);
    }

    let config = TranscriptionConfig {
        model: WhisperModel::from_name(&settings.model),
        ..TranscriptionConfig::default()
    };
    let segments = transcriber.transcribe(&session.audio, &config)?;
    if segments.is_empty() {
        tracing::info!("Transcription produced no segments; skipping captions");
        return Ok(None);
    }

    let ass_path = output.with_extension("ass");
    save_caption_files(&segments, settings, &ass_path)?;
    tracing::info!(
        segments = segments.len(),
        captions = %ass_path.display(),
        "Caption files written"
    );
    Ok(Some(ass_path))
}

/// Full engine argument list for one attempt. Input order is the fixed
/// convention the filter graph addresses: display, camera, audio, then
/// the glyph catalog.
fn build_engine_args(
    session: &SessionPaths,
    script_path: &Path,
    output_label: &str,
    encoder: &EncoderConfig,
    duration_limit_secs: Option<f64>,
    output: &Path,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in [&session.display, &session.camera, &session.audio] {
        args.push("-i".to_string());
        args.push(path_arg(input));
    }
    for glyph in &session.glyphs {
        args.push("-i".to_string());
        args.push(path_arg(glyph));
    }

    args.push("-filter_complex_script".to_string());
    args.push(path_arg(script_path));
    args.push("-map".to_string());
    args.push(format!("[{output_label}]"));
    args.push("-map".to_string());
    args.push("2:a".to_string());

    args.extend(encoder.video_args());
    args.extend(audio_args());

    args.push("-progress".to_string());
    args.push("pipe:1".to_string());
    args.push("-nostats".to_string());

    if let Some(limit) = duration_limit_secs {
        args.push("-t".to_string());
        args.push(format!("{limit}"));
    }

    args.push(path_arg(output));
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Spot-check the compiled position expressions at evenly spaced times
/// across the track span and count positions outside the frame. Nonzero
/// usually means the track was recorded against a different display.
fn out_of_frame_count(
    x_expr: &PiecewiseExpr,
    y_expr: &PiecewiseExpr,
    width: u32,
    height: u32,
    span_secs: f64,
) -> usize {
    const PROBES: usize = 20;
    (0..=PROBES)
        .map(|i| span_secs * i as f64 / PROBES as f64)
        .filter(|&t| {
            let x = x_expr.eval(t);
            let y = y_expr.eval(t);
            x < 0.0 || x > width as f64 || y < 0.0 || y > height as f64
        })
        .count()
}

/// Plain key=value debug report next to the output; failure to write it
/// never fails the render.
fn write_debug_report(
    job: &RenderJob,
    sample_count: usize,
    out_of_frame: usize,
    x_expr: &PiecewiseExpr,
    graph: &FilterGraph,
    caps: &CapabilitySnapshot,
    encoder: &EncoderConfig,
) {
    let report = format!(
        "generated={}\nsession={}\nsamples={}\nout_of_frame_positions={}\nexpr_depth={}\nexpr_len_x={}\nfilter_statements={}\nencoder={}\npreset={}\naccelerator_present={}\ngpu_encoder_present={}\nduration_limit_secs={}\ncaptions_enabled={}\n",
        chrono::Local::now().to_rfc3339(),
        job.session.root.display(),
        sample_count,
        out_of_frame,
        x_expr.depth(),
        x_expr.to_string().len(),
        graph.statements().len(),
        encoder.codec,
        encoder.preset,
        caps.accelerator_present,
        caps.gpu_encoder_present,
        job.settings
            .duration_limit_secs
            .map(|l| l.to_string())
            .unwrap_or_else(|| "none".to_string()),
        job.settings.captions.enabled,
    );

    let report_path = job.output.with_extension("render-debug.txt");
    if let Err(err) = std::fs::write(&report_path, report) {
        tracing::warn!(error = %err, path = %report_path.display(), "Failed to write render debug report");
    } else {
        tracing::debug!(path = %report_path.display(), "Wrote render debug report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castweld_project_model::project::POINTER_GLYPH_COUNT;

    fn test_session() -> SessionPaths {
        SessionPaths::layout(Path::new("/data/session"))
    }

    #[test]
    fn test_engine_args_fixed_input_order() {
        let encoder = software_variant(Default::default());
        let args = build_engine_args(
            &test_session(),
            Path::new("/out/render.filter.txt"),
            "outv",
            &encoder,
            None,
            Path::new("/out/render.mp4"),
        );

        assert_eq!(args[0], "-y");
        assert_eq!(args[1], "-i");
        assert_eq!(args[2], "/data/session/segments/segment-0/display.mp4");
        assert_eq!(args[4], "/data/session/segments/segment-0/camera.mp4");
        assert_eq!(args[6], "/data/session/segments/segment-0/audio-input.ogg");
        // Glyphs follow in catalog order.
        assert_eq!(args[8], "/data/session/cursors/cursor_0.png");
        assert_eq!(
            args[6 + 2 * POINTER_GLYPH_COUNT],
            "/data/session/cursors/cursor_10.png"
        );

        let script_flag = args.iter().position(|a| a == "-filter_complex_script");
        assert!(script_flag.is_some());
        assert_eq!(args[script_flag.unwrap() + 1], "/out/render.filter.txt");

        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "[outv]");
        assert_eq!(args[map + 2], "-map");
        assert_eq!(args[map + 3], "2:a");

        assert!(args.contains(&"-progress".to_string()));
        assert!(args.contains(&"pipe:1".to_string()));
        assert!(args.contains(&"-nostats".to_string()));
        assert!(!args.contains(&"-t".to_string()));
        assert_eq!(args.last().unwrap(), "/out/render.mp4");
    }

    #[test]
    fn test_duration_limit_adds_truncation_arg() {
        let encoder = software_variant(Default::default());
        let args = build_engine_args(
            &test_session(),
            Path::new("/out/render.filter.txt"),
            "outv",
            &encoder,
            Some(60.0),
            Path::new("/out/render.mp4"),
        );

        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "60");
        // Truncation applies before the output path.
        assert!(t + 2 == args.len() - 1 || args[t + 2] == "/out/render.mp4");
    }

    #[test]
    fn test_out_of_frame_spot_check() {
        let times = vec![0.0, 1.0, 2.0];
        let inside_x = PiecewiseExpr::linear(&times, &[100.0, 960.0, 1820.0]).unwrap();
        let inside_y = PiecewiseExpr::linear(&times, &[100.0, 540.0, 980.0]).unwrap();
        assert_eq!(out_of_frame_count(&inside_x, &inside_y, 1920, 1080, 2.0), 0);

        // A track recorded against a wider display walks off the right edge.
        let outside_x = PiecewiseExpr::linear(&times, &[100.0, 2000.0, 2800.0]).unwrap();
        assert!(out_of_frame_count(&outside_x, &inside_y, 1920, 1080, 2.0) > 0);
    }

    #[test]
    fn test_encoder_args_spliced_between_maps_and_progress() {
        let gpu = crate::encoder::gpu_variant(Default::default());
        let args = build_engine_args(
            &test_session(),
            Path::new("/out/render.filter.txt"),
            "outv",
            &gpu,
            None,
            Path::new("/out/render.mp4"),
        );

        let cv = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[cv + 1], "h264_nvenc");
        let progress = args.iter().position(|a| a == "-progress").unwrap();
        assert!(cv < progress);
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "aac");
    }
}
