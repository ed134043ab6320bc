//! Show session information.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use castweld_project_model::project::SessionPaths;
use castweld_project_model::sample::load_cursor_track;

pub fn run(session: PathBuf) -> anyhow::Result<()> {
    let paths = SessionPaths::resolve(&session)
        .map_err(|e| anyhow::anyhow!("Failed to resolve session: {e}"))?;

    println!("Session: {}", paths.root.display());
    println!();

    println!("Tracks:");
    print_track("Display", &paths.display);
    print_track("Camera", &paths.camera);
    print_track("Audio", &paths.audio);
    println!("  Glyphs: {} files", paths.glyphs.len());
    println!();

    let track = load_cursor_track(&paths.cursor_track)
        .map_err(|e| anyhow::anyhow!("Failed to load cursor track: {e}"))?;

    println!("Cursor track:");
    println!("  Moves: {}", track.moves.len());
    println!("  Span: {:.1}s", track.span_secs());

    let samples = track.prepare_samples(None)?;
    let glyphs_used: BTreeSet<u32> = samples.iter().map(|s| s.pointer_id).collect();
    println!("  Prepared samples: {}", samples.len());
    println!("  Pointer glyphs used: {glyphs_used:?}");

    Ok(())
}

fn print_track(label: &str, path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => println!(
            "  {label}: {} ({:.1} MiB)",
            path.display(),
            meta.len() as f64 / (1024.0 * 1024.0)
        ),
        Err(_) => println!("  {label}: {} (missing)", path.display()),
    }
}
