//! Castweld CLI for rendering recorded sessions.
//!
//! Usage:
//!   castweld render <PATH>     Render a session to video
//!   castweld info <PATH>       Show session information
//!   castweld check             Check system capabilities
//!   castweld init <NAME>       Create an empty session skeleton

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "castweld",
    about = "Composite screen recordings into finished videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a session to video
    Render {
        /// Path to the session directory
        session: PathBuf,

        /// Output file path (default: render_<timestamp>_<mode>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Test render, truncated to the configured preview length
        #[arg(long)]
        test: bool,

        /// Transcribe audio and burn captions into the output
        #[arg(long)]
        captions: bool,

        /// Prefer the HEVC codec family over H.264
        #[arg(long)]
        hevc: bool,

        /// Webcam overlay width in pixels (height follows at 16:9)
        #[arg(long)]
        camera_width: Option<u32>,

        /// Webcam anchor: top-left|top-right|bottom-left|bottom-right|top-center|bottom-center
        #[arg(long)]
        anchor: Option<String>,

        /// Webcam mask shape: rect|rounded|circle
        #[arg(long)]
        shape: Option<String>,

        /// Pointer glyph size in pixels
        #[arg(long)]
        cursor_size: Option<u32>,

        /// Render settings file (JSON), applied before other flags
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Show session information
    Info {
        /// Path to the session directory
        session: PathBuf,
    },

    /// Check system capabilities
    Check,

    /// Create an empty session skeleton
    Init {
        /// Session name
        name: String,

        /// Parent directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    castweld_common::logging::init_logging(&castweld_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
    });

    match cli.command {
        Commands::Render {
            session,
            output,
            test,
            captions,
            hevc,
            camera_width,
            anchor,
            shape,
            cursor_size,
            settings,
        } => {
            commands::render::run(
                session,
                output,
                test,
                captions,
                hevc,
                camera_width,
                anchor,
                shape,
                cursor_size,
                settings,
            )
            .await
        }
        Commands::Info { session } => commands::info::run(session),
        Commands::Check => commands::check::run(),
        Commands::Init { name, output } => commands::init::run(name, output),
    }
}
