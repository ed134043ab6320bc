//! Session directory layout and validation.
//!
//! A recorded session is a directory with a fixed shape:
//!
//! ```text
//! session/
//! ├── segments/
//! │   └── segment-0/
//! │       ├── display.mp4       screen capture
//! │       ├── camera.mp4        webcam capture
//! │       ├── audio-input.ogg   microphone track
//! │       └── cursor.json       pointer track
//! └── cursors/
//!     ├── cursor_0.png          pointer glyphs, catalog order
//!     └── ... cursor_10.png
//! ```

use std::path::{Path, PathBuf};

use castweld_common::error::{CastweldError, CastweldResult};

use crate::sample::PointerSample;

/// Number of pointer glyphs in the fixed catalog.
pub const POINTER_GLYPH_COUNT: usize = 11;

/// Resolved file paths inside one session directory.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    /// Session root directory.
    pub root: PathBuf,

    /// Screen capture video.
    pub display: PathBuf,

    /// Webcam capture video.
    pub camera: PathBuf,

    /// Microphone audio track.
    pub audio: PathBuf,

    /// Pointer track JSON.
    pub cursor_track: PathBuf,

    /// Glyph images in catalog order (`cursor_0.png` .. `cursor_10.png`).
    pub glyphs: Vec<PathBuf>,
}

impl SessionPaths {
    /// Resolve the fixed layout under `root` and verify every required
    /// file exists. The first missing file aborts resolution.
    pub fn resolve(root: impl AsRef<Path>) -> CastweldResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CastweldError::session(format!(
                "session directory does not exist: {}",
                root.display()
            )));
        }

        let paths = Self::layout(&root);
        for path in paths.required_files() {
            if !path.exists() {
                return Err(CastweldError::FileNotFound { path: path.clone() });
            }
        }
        Ok(paths)
    }

    /// The fixed layout under `root`, without existence checks.
    pub fn layout(root: &Path) -> Self {
        let segment = root.join("segments").join("segment-0");
        let cursors = root.join("cursors");
        Self {
            root: root.to_path_buf(),
            display: segment.join("display.mp4"),
            camera: segment.join("camera.mp4"),
            audio: segment.join("audio-input.ogg"),
            cursor_track: segment.join("cursor.json"),
            glyphs: (0..POINTER_GLYPH_COUNT)
                .map(|i| cursors.join(format!("cursor_{i}.png")))
                .collect(),
        }
    }

    /// Report every missing file as a human-readable line. Empty means
    /// the session is complete.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = vec![];
        for path in self.required_files() {
            if !path.exists() {
                let shown = path.strip_prefix(&self.root).unwrap_or(path);
                errors.push(format!("missing: {}", shown.display()));
            }
        }
        errors
    }

    /// Create the session directory skeleton with a starter cursor track,
    /// for recorders or manual assembly. Media files are not created.
    pub fn scaffold(root: impl AsRef<Path>) -> CastweldResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root.join("segments").join("segment-0"))?;
        std::fs::create_dir_all(root.join("cursors"))?;

        let paths = Self::layout(root);
        if !paths.cursor_track.exists() {
            let starter = serde_json::json!({
                "moves": [
                    PointerSample::new(0.0, 0.1, 0.1, 0),
                    PointerSample::new(1.0, 0.9, 0.9, 0),
                ],
                "clicks": [],
            });
            std::fs::write(&paths.cursor_track, serde_json::to_string_pretty(&starter)?)?;
        }
        Ok(paths)
    }

    fn required_files(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.display, &self.camera, &self.audio, &self.cursor_track]
            .into_iter()
            .chain(self.glyphs.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_layout_addresses_eleven_glyphs() {
        let paths = SessionPaths::layout(Path::new("/sess"));
        assert_eq!(paths.glyphs.len(), POINTER_GLYPH_COUNT);
        assert!(paths.glyphs[0].ends_with("cursors/cursor_0.png"));
        assert!(paths.glyphs[10].ends_with("cursors/cursor_10.png"));
        assert!(paths.display.ends_with("segments/segment-0/display.mp4"));
    }

    #[test]
    fn test_resolve_rejects_missing_directory() {
        let err = SessionPaths::resolve("/definitely/not/a/session").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_reports_first_missing_file() {
        let dir = temp_session("castweld_test_resolve_missing");
        std::fs::create_dir_all(&dir).unwrap();

        let err = SessionPaths::resolve(&dir).unwrap_err();
        match err {
            CastweldError::FileNotFound { path } => {
                assert!(path.ends_with("display.mp4"));
            }
            other => panic!("expected FileNotFound, got {other}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_accepts_complete_session() {
        let dir = temp_session("castweld_test_resolve_complete");
        let layout = SessionPaths::layout(&dir);
        touch(&layout.display);
        touch(&layout.camera);
        touch(&layout.audio);
        touch(&layout.cursor_track);
        for glyph in &layout.glyphs {
            touch(glyph);
        }

        let resolved = SessionPaths::resolve(&dir).unwrap();
        assert_eq!(resolved.glyphs.len(), POINTER_GLYPH_COUNT);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_lists_all_missing_files() {
        let dir = temp_session("castweld_test_validate");
        let layout = SessionPaths::layout(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        touch(&layout.display);

        let errors = layout.validate();
        // camera, audio, cursor.json, 11 glyphs
        assert_eq!(errors.len(), 3 + POINTER_GLYPH_COUNT);
        assert!(errors.iter().any(|e| e.contains("camera.mp4")));
        assert!(errors.iter().any(|e| e.contains("cursor_10.png")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_scaffold_writes_starter_track() {
        let dir = temp_session("castweld_test_scaffold");

        let paths = SessionPaths::scaffold(&dir).unwrap();
        assert!(paths.cursor_track.exists());

        let track =
            crate::sample::load_cursor_track(&paths.cursor_track).unwrap();
        assert_eq!(track.moves.len(), 2);
        assert_eq!(track.moves[1].time_ms, 1000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
