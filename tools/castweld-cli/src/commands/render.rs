//! Render a session to video.

use std::path::PathBuf;
use std::sync::Arc;

use castweld_captions::transcription::{Transcriber, WhisperCli};
use castweld_common::config::AppConfig;
use castweld_project_model::project::SessionPaths;
use castweld_project_model::settings::{CameraAnchor, CameraShape, CodecFamily, RenderSettings};
use castweld_render_engine::engine::{FfmpegEngine, MediaEngine};
use castweld_render_engine::render::{render_session, ProgressCallback, RenderJob, RenderProgress};

pub async fn run(
    session: PathBuf,
    output: Option<PathBuf>,
    test: bool,
    captions: bool,
    hevc: bool,
    camera_width: Option<u32>,
    anchor: Option<String>,
    shape: Option<String>,
    cursor_size: Option<u32>,
    settings_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Rendering session at: {}", session.display());

    let paths = SessionPaths::resolve(&session)
        .map_err(|e| anyhow::anyhow!("Failed to resolve session: {e}"))?;

    let config = AppConfig::load();
    let mut settings: RenderSettings = match settings_file {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read settings file: {e}"))?;
            serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse settings file: {e}"))?
        }
        None => RenderSettings::default(),
    };

    if hevc || config.render.use_hevc {
        settings.codec_family = CodecFamily::Hevc;
    }
    if captions || config.render.captions {
        settings.captions.enabled = true;
        settings.captions.model = config.render.whisper_model.clone();
    }
    if let Some(width) = camera_width {
        settings.camera = settings.camera.with_width(width);
    }
    if let Some(ref anchor) = anchor {
        // Unrecognized names fall back to the top-right default.
        settings.camera.anchor = CameraAnchor::from_name(anchor);
    }
    if let Some(ref shape) = shape {
        settings.camera.shape = match shape.as_str() {
            "rect" => CameraShape::Rectangle,
            "rounded" => CameraShape::Rounded,
            "circle" => CameraShape::Circle,
            _ => {
                return Err(anyhow::anyhow!(
                    "Unknown shape: {shape}. Use: rect, rounded, circle"
                ));
            }
        };
    }
    if let Some(size) = cursor_size {
        settings.cursor_size = size;
    }
    if test {
        settings.duration_limit_secs = Some(config.render.preview_limit_secs);
    }

    let output_path = output.unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let mode = if test { "test" } else { "full" };
        session.join(format!("render_{stamp}_{mode}.mp4"))
    });

    let engine = FfmpegEngine::discover();
    if !engine.is_available() {
        return Err(anyhow::anyhow!(
            "ffmpeg not found at {}. Install it or set CASTWELD_FFMPEG",
            engine.ffmpeg_path().display()
        ));
    }

    let transcriber: Option<Box<dyn Transcriber + Send>> = if settings.captions.enabled {
        Some(Box::new(WhisperCli::discover()))
    } else {
        None
    };

    println!("  Output: {}", output_path.display());
    println!("  Codec family: {:?}", settings.codec_family);
    println!(
        "  Camera: {}x{} {:?} at {:?}",
        settings.camera.width, settings.camera.height, settings.camera.shape, settings.camera.anchor
    );
    if let Some(limit) = settings.duration_limit_secs {
        println!("  Duration limit: {limit}s");
    }
    println!(
        "  Captions: {}",
        if settings.captions.enabled { "on" } else { "off" }
    );

    let job = RenderJob {
        session: paths,
        output: output_path,
        settings,
    };

    let progress_cb: ProgressCallback = Box::new(|p: RenderProgress| {
        if p.progress > 0.0 {
            print!(
                "\r  {}: {:.1}% ({:.2}x)            ",
                p.stage.label(),
                p.progress * 100.0,
                p.speed
            );
        } else {
            print!("\r  {}...                        ", p.stage.label());
        }
    });

    match render_session(job, Arc::new(engine), transcriber, Some(progress_cb)).await {
        Ok(outcome) => {
            println!("\nRender complete: {}", outcome.output.display());
            if outcome.fell_back {
                println!(
                    "  Hardware encode failed; finished on {}",
                    outcome.encoder.codec
                );
            }
            if let Some(captions) = outcome.captions {
                println!("  Captions: {}", captions.display());
            }
        }
        Err(e) => {
            println!("\nRender failed: {e}");
        }
    }

    Ok(())
}
