use clap::Parser;
use std::path::PathBuf;

/// Locates detected objects on the ground from drone video detections,
/// flight telemetry and terrain elevation tiles.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct MainArgs {
    /// The path to the config file for the run
    #[clap(long, short)]
    pub config: PathBuf,

    /// Folder to write results to, overriding the config file
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    /// Only process the named videos (file stem, may be repeated)
    #[clap(long = "video", short = 'v')]
    pub videos: Vec<String>,

    /// Folder of consolidated per-video JSON files to use instead of the
    /// raw sources and predictions
    #[clap(long)]
    pub detections_json: Option<PathBuf>,
}
