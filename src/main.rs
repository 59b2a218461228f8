// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use ircam::backends::camera::{SourceBackendType, default_source_type};
use ircam::config::Config;
use ircam::constants::{ColorMode, FilterMode};
use ircam::storage;
use ircam::terminal::{self, OutputDirs};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "ircam")]
#[command(about = "Infrared camera viewer with illumination filtering")]
#[command(version = ircam::constants::app_version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Frame source to capture from (synthetic, gstreamer)
    #[arg(long, global = true, default_value_t = default_source_type())]
    source: SourceBackendType,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (default; renders camera to terminal)
    Terminal {
        /// Camera index to use (from 'ircam list')
        #[arg(short, long)]
        camera: Option<usize>,
    },

    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// Camera index to use (from 'ircam list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Output file or directory (default: ~/Pictures/IR Camera/IR_Photo_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only capture frames of this illumination class (off, raw, illum)
        #[arg(short, long)]
        filter: Option<FilterMode>,

        /// Color mapping (off, green, heat, jet)
        #[arg(long)]
        color: Option<ColorMode>,
    },

    /// Record a video
    #[command(alias = "video")]
    Record {
        /// Camera index to use (from 'ircam list')
        #[arg(short, long)]
        camera: Option<usize>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Output file or directory (default: ~/Videos/IR Camera/IR_Video_TIMESTAMP_FILTER.EXT)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only record frames of this illumination class (off, raw, illum)
        #[arg(short, long)]
        filter: Option<FilterMode>,

        /// Color mapping (off, green, heat, jet)
        #[arg(long)]
        color: Option<ColorMode>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=ircam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command.unwrap_or(Commands::Terminal { camera: None }) {
        Commands::Terminal { camera } => {
            let dirs = OutputDirs {
                photos: config
                    .photo_dir
                    .clone()
                    .unwrap_or_else(storage::default_photo_dir),
                videos: config
                    .video_dir
                    .clone()
                    .unwrap_or_else(storage::default_video_dir),
            };
            let manager = cli::open_session(cli.source, camera, config)?;
            terminal::run(manager, dirs)
        }
        Commands::List => cli::list_cameras(cli.source),
        Commands::Photo {
            camera,
            output,
            filter,
            color,
        } => {
            let manager = cli::open_session(cli.source, camera, config)?;
            cli::take_photo(manager, output, cli::CaptureModes { filter, color })
        }
        Commands::Record {
            camera,
            duration,
            output,
            filter,
            color,
        } => {
            let manager = cli::open_session(cli.source, camera, config)?;
            cli::record_video(
                manager,
                duration,
                output,
                cli::CaptureModes { filter, color },
            )
        }
    }
}
