//! Pointer-track samples for the cursor overlay.
//!
//! A recorder writes sparse pointer observations into `cursor.json`. All
//! coordinates are normalized to `[0.0, 1.0]` relative to the display
//! frame so a track survives resolution changes between machines. Sample
//! order is not guaranteed at rest and is established before rendering.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use castweld_common::error::{CastweldError, CastweldResult};

use crate::project::POINTER_GLYPH_COUNT;

/// Extra window kept past a duration cutoff so cursor motion stays
/// defined right up to the final rendered frame.
pub const DURATION_FILTER_SLACK_SECS: f64 = 1.0;

/// A single recorded pointer observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    /// Milliseconds since session start.
    pub time_ms: u64,

    /// Normalized X coordinate [0.0, 1.0].
    pub x: f64,

    /// Normalized Y coordinate [0.0, 1.0].
    pub y: f64,

    /// Index into the pointer-glyph catalog (arrow, hand, I-beam, ...).
    /// Recorders emit this as a string-encoded integer.
    #[serde(
        rename = "cursor_id",
        deserialize_with = "pointer_id_lenient",
        serialize_with = "pointer_id_as_string"
    )]
    pub pointer_id: u32,
}

/// The on-disk cursor track (`cursor.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CursorTrack {
    /// Movement samples, in recording order (not necessarily sorted).
    #[serde(default)]
    pub moves: Vec<PointerSample>,
}

impl PointerSample {
    /// Create a sample from fractional-second timing.
    pub fn new(time_secs: f64, x: f64, y: f64, pointer_id: u32) -> Self {
        Self {
            time_ms: (time_secs * 1000.0).round() as u64,
            x,
            y,
            pointer_id,
        }
    }

    /// Timestamp as fractional seconds since session start.
    pub fn time_secs(&self) -> f64 {
        self.time_ms as f64 / 1000.0
    }
}

impl CursorTrack {
    /// Samples ready for expression compilation: filtered by an optional
    /// duration cutoff (with [`DURATION_FILTER_SLACK_SECS`] of slack),
    /// validated, and sorted by ascending time. Equal timestamps keep
    /// their recording order.
    pub fn prepare_samples(
        &self,
        duration_limit_secs: Option<f64>,
    ) -> CastweldResult<Vec<PointerSample>> {
        let mut samples: Vec<PointerSample> = match duration_limit_secs {
            Some(limit) => self
                .moves
                .iter()
                .copied()
                .filter(|s| s.time_secs() <= limit + DURATION_FILTER_SLACK_SECS)
                .collect(),
            None => self.moves.clone(),
        };

        if samples.is_empty() {
            return Err(CastweldError::samples(
                "cursor track has no samples within the render window",
            ));
        }

        for sample in &samples {
            if !sample.x.is_finite() || !sample.y.is_finite() {
                return Err(CastweldError::samples(format!(
                    "non-finite coordinate at t={}ms",
                    sample.time_ms
                )));
            }
            if sample.pointer_id as usize >= POINTER_GLYPH_COUNT {
                return Err(CastweldError::samples(format!(
                    "pointer id {} exceeds glyph catalog (0..{})",
                    sample.pointer_id,
                    POINTER_GLYPH_COUNT - 1
                )));
            }
        }

        samples.sort_by_key(|s| s.time_ms);
        Ok(samples)
    }

    /// Timestamp of the last sample after sorting, in seconds.
    pub fn span_secs(&self) -> f64 {
        self.moves
            .iter()
            .map(|s| s.time_ms)
            .max()
            .map(|ms| ms as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

/// Parse a cursor track from JSON content.
pub fn parse_cursor_track(json: &str) -> Result<CursorTrack, serde_json::Error> {
    serde_json::from_str(json)
}

/// Load a cursor track from disk.
pub fn load_cursor_track(path: &std::path::Path) -> CastweldResult<CursorTrack> {
    if !path.exists() {
        return Err(CastweldError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_cursor_track(&content)?)
}

/// Recorders have historically written `cursor_id` both as a bare integer
/// and as a string-encoded integer; accept either.
fn pointer_id_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(id) => Ok(id),
        Raw::Str(s) => s.trim().parse::<u32>().map_err(serde::de::Error::custom),
    }
}

fn pointer_id_as_string<S>(id: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(samples: &[(u64, f64, f64, u32)]) -> CursorTrack {
        CursorTrack {
            moves: samples
                .iter()
                .map(|&(time_ms, x, y, pointer_id)| PointerSample {
                    time_ms,
                    x,
                    y,
                    pointer_id,
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_string_encoded_pointer_id() {
        let json = r#"{"moves":[{"cursor_id":"2","time_ms":150,"x":0.5,"y":0.25}]}"#;
        let parsed = parse_cursor_track(json).unwrap();
        assert_eq!(parsed.moves.len(), 1);
        assert_eq!(parsed.moves[0].pointer_id, 2);
        assert_eq!(parsed.moves[0].time_ms, 150);
    }

    #[test]
    fn test_parse_integer_pointer_id() {
        let json = r#"{"moves":[{"cursor_id":2,"time_ms":150,"x":0.5,"y":0.25}]}"#;
        let parsed = parse_cursor_track(json).unwrap();
        assert_eq!(parsed.moves[0].pointer_id, 2);
    }

    #[test]
    fn test_serialize_pointer_id_as_string() {
        let sample = PointerSample::new(0.15, 0.5, 0.25, 2);
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"cursor_id\":\"2\""));
    }

    #[test]
    fn test_parse_ignores_unknown_sections() {
        let json = r#"{"moves":[{"cursor_id":"0","time_ms":0,"x":0.1,"y":0.1}],"clicks":[]}"#;
        let parsed = parse_cursor_track(json).unwrap();
        assert_eq!(parsed.moves.len(), 1);
    }

    #[test]
    fn test_prepare_sorts_by_time() {
        let track = track(&[(2000, 0.3, 0.3, 0), (0, 0.1, 0.1, 0), (1000, 0.2, 0.2, 0)]);
        let samples = track.prepare_samples(None).unwrap();
        let times: Vec<u64> = samples.iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![0, 1000, 2000]);
    }

    #[test]
    fn test_prepare_keeps_co_timed_samples_in_order() {
        let track = track(&[(500, 0.1, 0.1, 0), (500, 0.9, 0.9, 1), (0, 0.0, 0.0, 0)]);
        let samples = track.prepare_samples(None).unwrap();
        assert_eq!(samples.len(), 3);
        // Stable sort: the 0.1 sample recorded first stays first at t=500.
        assert!((samples[1].x - 0.1).abs() < 1e-12);
        assert!((samples[2].x - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_duration_cutoff_keeps_one_second_of_slack() {
        let track = track(&[
            (0, 0.0, 0.0, 0),
            (60_500, 0.5, 0.5, 0),
            (61_000, 0.6, 0.6, 0),
            (61_001, 0.7, 0.7, 0),
            (120_000, 1.0, 1.0, 0),
        ]);
        let samples = track.prepare_samples(Some(60.0)).unwrap();
        let times: Vec<u64> = samples.iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![0, 60_500, 61_000]);
    }

    #[test]
    fn test_prepare_rejects_empty_window() {
        let track = track(&[(90_000, 0.5, 0.5, 0)]);
        let err = track.prepare_samples(Some(10.0)).unwrap_err();
        assert!(err.to_string().contains("no samples"));
    }

    #[test]
    fn test_prepare_rejects_non_finite_coordinate() {
        let track = track(&[(0, f64::NAN, 0.5, 0)]);
        let err = track.prepare_samples(None).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_prepare_rejects_out_of_catalog_pointer_id() {
        let track = track(&[(0, 0.5, 0.5, 42)]);
        let err = track.prepare_samples(None).unwrap_err();
        assert!(err.to_string().contains("glyph catalog"));
    }

    #[test]
    fn test_span_secs() {
        let track = track(&[(0, 0.0, 0.0, 0), (2500, 0.5, 0.5, 0)]);
        assert!((track.span_secs() - 2.5).abs() < 1e-9);
    }
}
