//! Check system capabilities.

use castweld_captions::transcription::{Transcriber, WhisperCli, WhisperModel};
use castweld_project_model::settings::CodecFamily;
use castweld_render_engine::encoder::{select_encoder, CapabilitySnapshot};
use castweld_render_engine::engine::{FfmpegEngine, MediaEngine};

pub fn run() -> anyhow::Result<()> {
    println!("Castweld System Check");
    println!("{}", "=".repeat(50));

    let engine = FfmpegEngine::discover();
    if engine.is_available() {
        println!("[OK] ffmpeg: {}", engine.ffmpeg_path().display());
    } else {
        println!(
            "[FAIL] ffmpeg: not found at {} (install it or set CASTWELD_FFMPEG)",
            engine.ffmpeg_path().display()
        );
    }
    if engine.probe_available() {
        println!("[OK] ffprobe responds");
    } else {
        println!("[WARN] ffprobe: not found (display dimensions will be assumed)");
    }

    // Encoders
    match engine.registered_encoders() {
        Ok(encoders) => {
            for name in ["libx264", "libx265", "h264_nvenc", "hevc_nvenc"] {
                if encoders.contains(name) {
                    println!("[OK] encoder: {name}");
                } else {
                    println!("[----] encoder: {name}");
                }
            }
        }
        Err(e) => println!("[WARN] encoder probe failed: {e}"),
    }

    if engine.accelerator_present() {
        println!("[OK] NVIDIA accelerator detected");
    } else {
        println!("[----] no NVIDIA accelerator (software encoding only)");
    }

    let caps = CapabilitySnapshot::detect(&engine, CodecFamily::H264);
    let selected = select_encoder(CodecFamily::H264, &caps);
    println!();
    println!(
        "Selected encoder: {} (-preset {})",
        selected.codec, selected.preset
    );

    // Captions
    println!();
    let whisper = WhisperCli::discover();
    if whisper.is_available() {
        println!("[OK] whisper-cli found; captions available");
        for model in [WhisperModel::Tiny, WhisperModel::Base, WhisperModel::Small] {
            let path = whisper.model_path(model);
            if path.exists() {
                println!("[OK] model: {}", path.display());
            } else {
                println!("[----] model: {} (not downloaded)", path.display());
            }
        }
    } else {
        println!("[WARN] whisper-cli not found; captions unavailable");
    }

    println!();
    if engine.is_available() {
        println!("Castweld is ready.");
    } else {
        println!("Required tools are missing. See above for fixes.");
    }

    Ok(())
}
