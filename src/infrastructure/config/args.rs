//! Command-line arguments.

use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "glint",
    version,
    about = "Load an image through the memory, disk and network tiers",
    long_about = None
)]
pub struct CliArgs {
    /// Image URL to load.
    #[arg(value_name = "URL", required_unless_present = "clear_cache")]
    pub url: Option<String>,

    /// Where to write the loaded image as PNG.
    #[arg(short, long, value_name = "PATH", default_value = "glint.png")]
    pub output: PathBuf,

    /// Target width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Crop the image to a circle.
    #[arg(long)]
    pub circle_crop: bool,

    /// Round the corners with this radius in pixels.
    #[arg(long, value_name = "RADIUS")]
    pub rounded_corners: Option<f32>,

    /// Clear both cache tiers before loading.
    #[arg(long)]
    pub clear_cache: bool,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Memory cache budget in bytes.
    #[arg(long, value_name = "BYTES")]
    pub memory_cache_bytes: Option<u64>,

    /// Disk cache budget in bytes.
    #[arg(long, value_name = "BYTES")]
    pub disk_cache_bytes: Option<u64>,

    /// Network timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}
