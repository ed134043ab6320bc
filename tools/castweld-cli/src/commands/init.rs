//! Initialize an empty Castweld session.

use std::path::PathBuf;

use castweld_project_model::project::SessionPaths;

pub fn run(name: String, output: PathBuf) -> anyhow::Result<()> {
    let session_dir = output.join(&name);
    println!("Creating session '{}' at {}", name, session_dir.display());

    let paths = SessionPaths::scaffold(&session_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create session: {e}"))?;

    println!("Session created:");
    println!("  Directory: {}", paths.root.display());
    println!();
    println!("Directory structure:");
    println!("  {}/", name);
    println!("  ├── segments/segment-0/   (display.mp4, camera.mp4, audio-input.ogg, cursor.json)");
    println!("  └── cursors/              (cursor_0.png .. cursor_10.png)");
    println!();
    println!("A starter cursor.json was written. Drop the recorded media and");
    println!("glyph images into place, then run: castweld render {}", session_dir.display());

    Ok(())
}
