//! Subtitle file writers (ASS and SRT).
//!
//! The ASS file is what the render pipeline burns into the video; the
//! SRT sibling is written alongside it for players and editors.

use std::path::Path;

use castweld_common::error::CastweldResult;
use castweld_project_model::settings::CaptionSettings;

use crate::transcription::TranscriptSegment;

/// Reference resolution the ASS style block is authored against.
/// Subtitle renderers scale styles from this to the actual frame size.
const ASS_PLAY_RES_W: u32 = 1920;
const ASS_PLAY_RES_H: u32 = 1080;

/// Generate ASS (Advanced SubStation Alpha) content with a single
/// bottom-centered style derived from the caption settings.
pub fn generate_ass(segments: &[TranscriptSegment], settings: &CaptionSettings) -> String {
    let mut output = String::new();

    output.push_str("[Script Info]\n");
    output.push_str("ScriptType: v4.00+\n");
    output.push_str(&format!("PlayResX: {ASS_PLAY_RES_W}\n"));
    output.push_str(&format!("PlayResY: {ASS_PLAY_RES_H}\n\n"));

    output.push_str("[V4+ Styles]\n");
    output.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BorderStyle, \
         Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    output.push_str(&format!(
        "Style: Default,{},{},{},{},1,2,0,2,10,10,{},1\n\n",
        settings.font, settings.size, settings.primary_color, settings.outline_color,
        settings.margin_v,
    ));

    output.push_str("[Events]\n");
    output.push_str(
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );
    for segment in segments {
        output.push_str(&format!(
            "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
            format_ass_time(segment.start_secs),
            format_ass_time(segment.end_secs),
            segment.text,
        ));
    }

    output
}

/// Generate SRT subtitle content from transcript segments.
pub fn generate_srt(segments: &[TranscriptSegment]) -> String {
    let mut output = String::new();

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(segment.start_secs),
            format_srt_time(segment.end_secs),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Format seconds as an ASS timestamp: H:MM:SS.cc (centisecond
/// precision, single-digit hour field).
fn format_ass_time(secs: f64) -> String {
    let hours = (secs / 3600.0) as u64;
    let minutes = ((secs % 3600.0) / 60.0) as u64;
    let seconds = secs % 60.0;
    format!("{hours}:{minutes:02}:{seconds:05.2}")
}

/// Format seconds as an SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Write the ASS file and its SRT sibling next to each other.
pub fn save_caption_files(
    segments: &[TranscriptSegment],
    settings: &CaptionSettings,
    ass_path: &Path,
) -> CastweldResult<()> {
    std::fs::write(ass_path, generate_ass(segments, settings))?;
    std::fs::write(ass_path.with_extension("srt"), generate_srt(segments))?;
    Ok(())
}
