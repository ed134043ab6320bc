//! Render configuration types.
//!
//! Settings are assembled once (from CLI flags or the saved app config)
//! before a render begins and passed by reference into each stage; they
//! are never mutated mid-render.

use serde::{Deserialize, Serialize};

/// Immutable configuration for one render invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Webcam overlay treatment.
    pub camera: CameraSettings,

    /// Pointer glyph render size in pixels (square).
    pub cursor_size: u32,

    /// Caption burn-in treatment.
    pub captions: CaptionSettings,

    /// Preferred codec family; the encoder selector picks the GPU or
    /// CPU variant within it.
    pub codec_family: CodecFamily,

    /// Optional duration cutoff in seconds (test renders).
    pub duration_limit_secs: Option<f64>,
}

/// Webcam overlay size, shape, and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Target width in pixels.
    pub width: u32,

    /// Target height in pixels.
    pub height: u32,

    /// Alpha-mask shape applied after scaling.
    pub shape: CameraShape,

    /// Screen position the overlay is pinned to.
    pub anchor: CameraAnchor,

    /// Horizontal margin from the anchored edge, in pixels.
    pub margin_x: u32,

    /// Vertical margin from the anchored edge, in pixels.
    pub margin_y: u32,
}

/// Camera overlay shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraShape {
    /// No mask; the scaled frame as-is.
    Rectangle,
    /// Rounded rectangle with a fixed corner radius.
    #[default]
    Rounded,
    /// Circle inscribed in the scaled frame.
    Circle,
}

/// Named screen positions for the camera overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraAnchor {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
    TopCenter,
    BottomCenter,
}

/// Caption burn-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// Whether to transcribe audio and burn captions in.
    pub enabled: bool,

    /// Subtitle font family.
    pub font: String,

    /// Subtitle font size.
    pub size: u32,

    /// Primary text color in subtitle hex notation (`&HAABBGGRR`).
    pub primary_color: String,

    /// Outline color in subtitle hex notation.
    pub outline_color: String,

    /// Vertical margin from the bottom edge, in subtitle units.
    pub margin_v: u32,

    /// Whisper model name used for transcription ("tiny", "base", ...).
    pub model: String,
}

/// Codec family preference; each has a GPU and a CPU encoder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    #[default]
    H264,
    Hevc,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            cursor_size: 48,
            captions: CaptionSettings::default(),
            codec_family: CodecFamily::default(),
            duration_limit_secs: None,
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 280,
            height: 158,
            shape: CameraShape::default(),
            anchor: CameraAnchor::default(),
            margin_x: 20,
            margin_y: 20,
        }
    }
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            font: "Arial".to_string(),
            size: 24,
            primary_color: "&H00FFFFFF".to_string(),
            outline_color: "&H00000000".to_string(),
            margin_v: 50,
            model: "base".to_string(),
        }
    }
}

impl CameraSettings {
    /// Resize to a 16:9 box of the requested width, keeping shape,
    /// anchor, and margins.
    pub fn with_width(self, width: u32) -> Self {
        Self {
            width,
            height: width * 9 / 16,
            ..self
        }
    }
}

impl CameraAnchor {
    /// Resolve a user-facing anchor name ("Top-Right", "bottom_center",
    /// ...). Unrecognized names fall back to the top-right default; this
    /// is a documented default, not an error.
    pub fn from_name(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "topleft" => Self::TopLeft,
            "topright" => Self::TopRight,
            "bottomleft" => Self::BottomLeft,
            "bottomright" => Self::BottomRight,
            "topcenter" => Self::TopCenter,
            "bottomcenter" => Self::BottomCenter,
            _ => Self::TopRight,
        }
    }

    /// Position expressions for an overlay pinned to this anchor.
    ///
    /// `W`/`H` are the frame dimensions and `w`/`h` the overlaid stream's,
    /// substituted by the compositing engine at evaluation time. Center
    /// variants average the two edges.
    pub fn overlay_expr(&self, margin_x: u32, margin_y: u32) -> (String, String) {
        match self {
            Self::TopLeft => (format!("{margin_x}"), format!("{margin_y}")),
            Self::TopRight => (format!("W-w-{margin_x}"), format!("{margin_y}")),
            Self::BottomLeft => (format!("{margin_x}"), format!("H-h-{margin_y}")),
            Self::BottomRight => (format!("W-w-{margin_x}"), format!("H-h-{margin_y}")),
            Self::TopCenter => ("(W-w)/2".to_string(), format!("{margin_y}")),
            Self::BottomCenter => ("(W-w)/2".to_string(), format!("H-h-{margin_y}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_render() {
        let settings = RenderSettings::default();
        assert_eq!(settings.camera.width, 280);
        assert_eq!(settings.camera.height, 158);
        assert_eq!(settings.camera.shape, CameraShape::Rounded);
        assert_eq!(settings.camera.anchor, CameraAnchor::TopRight);
        assert_eq!(settings.cursor_size, 48);
        assert!(!settings.captions.enabled);
        assert_eq!(settings.captions.font, "Arial");
        assert_eq!(settings.captions.margin_v, 50);
        assert_eq!(settings.codec_family, CodecFamily::H264);
    }

    #[test]
    fn test_anchor_from_gui_style_names() {
        assert_eq!(CameraAnchor::from_name("Top-Left"), CameraAnchor::TopLeft);
        assert_eq!(CameraAnchor::from_name("Top-Right"), CameraAnchor::TopRight);
        assert_eq!(
            CameraAnchor::from_name("Bottom-Left"),
            CameraAnchor::BottomLeft
        );
        assert_eq!(
            CameraAnchor::from_name("Bottom-Right"),
            CameraAnchor::BottomRight
        );
        assert_eq!(
            CameraAnchor::from_name("Top-Center"),
            CameraAnchor::TopCenter
        );
        assert_eq!(
            CameraAnchor::from_name("bottom_center"),
            CameraAnchor::BottomCenter
        );
    }

    #[test]
    fn test_unrecognized_anchor_falls_back_to_top_right() {
        assert_eq!(
            CameraAnchor::from_name("middle-everywhere"),
            CameraAnchor::TopRight
        );
        assert_eq!(CameraAnchor::from_name(""), CameraAnchor::TopRight);
    }

    #[test]
    fn test_six_anchors_produce_distinct_expressions() {
        let anchors = [
            CameraAnchor::TopLeft,
            CameraAnchor::TopRight,
            CameraAnchor::BottomLeft,
            CameraAnchor::BottomRight,
            CameraAnchor::TopCenter,
            CameraAnchor::BottomCenter,
        ];
        let exprs: Vec<(String, String)> =
            anchors.iter().map(|a| a.overlay_expr(20, 20)).collect();
        for (i, a) in exprs.iter().enumerate() {
            for b in exprs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(exprs[1], ("W-w-20".to_string(), "20".to_string()));
        assert_eq!(exprs[5], ("(W-w)/2".to_string(), "H-h-20".to_string()));
    }

    #[test]
    fn test_with_width_keeps_16_9_and_placement() {
        let camera = CameraSettings {
            anchor: CameraAnchor::BottomLeft,
            ..CameraSettings::default()
        }
        .with_width(320);
        assert_eq!(camera.height, 180);
        assert_eq!(camera.anchor, CameraAnchor::BottomLeft);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = RenderSettings::default();
        settings.camera.anchor = CameraAnchor::BottomCenter;
        settings.codec_family = CodecFamily::Hevc;
        settings.duration_limit_secs = Some(60.0);

        let json = serde_json::to_string(&settings).unwrap();
        let parsed: RenderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.camera.anchor, CameraAnchor::BottomCenter);
        assert_eq!(parsed.codec_family, CodecFamily::Hevc);
        assert_eq!(parsed.duration_limit_secs, Some(60.0));
    }

    #[test]
    fn test_settings_deserialization_defaults_missing_fields() {
        let parsed: RenderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.cursor_size, 48);
        assert_eq!(parsed.captions.model, "base");
    }
}
