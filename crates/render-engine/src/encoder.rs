//! Encoder capability probing and selection.
//!
//! Two independent probes feed the selection: a compute-accelerator
//! query (driver-level) and an encoder-presence query against the
//! engine's registered encoder list. Presence of the GPU encoder alone
//! is enough to attempt hardware encoding; the accelerator probe is
//! informational and surfaced in diagnostics. A failed GPU attempt is
//! retried once on the software variant by the render orchestrator.

use castweld_project_model::settings::CodecFamily;

use crate::engine::MediaEngine;

/// What the host can do, probed once per render. Never cached across
/// renders since hardware state can change under us (driver installs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    /// A compute accelerator answered the driver query.
    pub accelerator_present: bool,
    /// The engine's registered encoder list names the GPU encoder for
    /// the requested codec family.
    pub gpu_encoder_present: bool,
}

impl CapabilitySnapshot {
    /// Build a snapshot from raw probe results. Kept separate from the
    /// probing itself so tests can inject synthetic capability states.
    pub fn from_probes(
        accelerator_present: bool,
        encoder_list: Option<&str>,
        family: CodecFamily,
    ) -> Self {
        let gpu_encoder_present = encoder_list
            .map(|list| list.contains(gpu_codec_name(family)))
            .unwrap_or(false);
        Self {
            accelerator_present,
            gpu_encoder_present,
        }
    }

    /// Run both probes against the engine.
    pub fn detect(engine: &dyn MediaEngine, family: CodecFamily) -> Self {
        let accelerator_present = engine.accelerator_present();
        let encoder_list = match engine.registered_encoders() {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::debug!(error = %e, "Encoder list probe failed");
                None
            }
        };
        let snapshot = Self::from_probes(accelerator_present, encoder_list.as_deref(), family);
        tracing::info!(
            accelerator = snapshot.accelerator_present,
            gpu_encoder = snapshot.gpu_encoder_present,
            family = ?family,
            "Probed encoding capabilities"
        );
        snapshot
    }
}

/// Encoder implementation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// NVIDIA NVENC hardware encoder.
    Nvenc,
    /// Software encoder (libx264/libx265).
    Software,
}

/// A concrete encoder choice with its rate-control arguments. GPU and
/// CPU paths use different rate modes (`-cq` vs `-crf`) and the two
/// must never be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub kind: EncoderKind,
    pub codec: &'static str,
    pub preset: &'static str,
    pub quality_flag: &'static str,
    pub quality_value: u32,
}

impl EncoderConfig {
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.to_string(),
            "-preset".to_string(),
            self.preset.to_string(),
            self.quality_flag.to_string(),
            self.quality_value.to_string(),
        ]
    }
}

/// Passthrough-style audio encode used for every render.
pub fn audio_args() -> Vec<String> {
    vec![
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
    ]
}

fn gpu_codec_name(family: CodecFamily) -> &'static str {
    match family {
        CodecFamily::H264 => "h264_nvenc",
        CodecFamily::Hevc => "hevc_nvenc",
    }
}

/// The hardware variant of a codec family. NVENC's p-presets run p1
/// (fastest) to p7 (best); p4 balances speed and quality.
pub fn gpu_variant(family: CodecFamily) -> EncoderConfig {
    EncoderConfig {
        kind: EncoderKind::Nvenc,
        codec: gpu_codec_name(family),
        preset: "p4",
        quality_flag: "-cq",
        quality_value: 23,
    }
}

/// The software variant of a codec family.
pub fn software_variant(family: CodecFamily) -> EncoderConfig {
    EncoderConfig {
        kind: EncoderKind::Software,
        codec: match family {
            CodecFamily::H264 => "libx264",
            CodecFamily::Hevc => "libx265",
        },
        preset: "veryfast",
        quality_flag: "-crf",
        quality_value: 23,
    }
}

/// Prefer the GPU encoder whenever the engine registers it; the
/// accelerator probe does not gate the attempt.
pub fn select_encoder(family: CodecFamily, caps: &CapabilitySnapshot) -> EncoderConfig {
    if caps.gpu_encoder_present {
        tracing::info!(codec = gpu_codec_name(family), "Selected hardware encoder");
        gpu_variant(family)
    } else {
        let config = software_variant(family);
        tracing::info!(codec = config.codec, "Selected software encoder");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODER_LIST_WITH_NVENC: &str = "\
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC\n\
 V....D libx265              libx265 H.265 / HEVC\n\
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder\n\
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder\n";

    const ENCODER_LIST_SOFTWARE_ONLY: &str = "\
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC\n\
 V....D libx265              libx265 H.265 / HEVC\n";

    #[test]
    fn test_gpu_selected_on_encoder_presence_alone() {
        // No accelerator visible to the driver probe, but the encoder
        // is registered: GPU is still attempted.
        let caps =
            CapabilitySnapshot::from_probes(false, Some(ENCODER_LIST_WITH_NVENC), CodecFamily::H264);
        assert!(caps.gpu_encoder_present);

        let config = select_encoder(CodecFamily::H264, &caps);
        assert_eq!(config.kind, EncoderKind::Nvenc);
        assert_eq!(config.codec, "h264_nvenc");
    }

    #[test]
    fn test_software_selected_when_encoder_missing() {
        let caps = CapabilitySnapshot::from_probes(
            true,
            Some(ENCODER_LIST_SOFTWARE_ONLY),
            CodecFamily::H264,
        );
        assert!(!caps.gpu_encoder_present);

        let config = select_encoder(CodecFamily::H264, &caps);
        assert_eq!(config.kind, EncoderKind::Software);
        assert_eq!(config.codec, "libx264");
    }

    #[test]
    fn test_probe_failure_degrades_to_software() {
        let caps = CapabilitySnapshot::from_probes(true, None, CodecFamily::Hevc);
        assert!(!caps.gpu_encoder_present);
        assert_eq!(
            select_encoder(CodecFamily::Hevc, &caps).kind,
            EncoderKind::Software
        );
    }

    #[test]
    fn test_codec_families_map_to_variants() {
        assert_eq!(gpu_variant(CodecFamily::H264).codec, "h264_nvenc");
        assert_eq!(gpu_variant(CodecFamily::Hevc).codec, "hevc_nvenc");
        assert_eq!(software_variant(CodecFamily::H264).codec, "libx264");
        assert_eq!(software_variant(CodecFamily::Hevc).codec, "libx265");
    }

    #[test]
    fn test_rate_modes_never_mix() {
        for family in [CodecFamily::H264, CodecFamily::Hevc] {
            let gpu = gpu_variant(family).video_args();
            assert!(gpu.contains(&"-cq".to_string()));
            assert!(!gpu.contains(&"-crf".to_string()));

            let cpu = software_variant(family).video_args();
            assert!(cpu.contains(&"-crf".to_string()));
            assert!(!cpu.contains(&"-cq".to_string()));
        }
    }

    #[test]
    fn test_audio_args_passthrough_encode() {
        assert_eq!(audio_args(), vec!["-c:a", "aac", "-b:a", "128k"]);
    }
}
