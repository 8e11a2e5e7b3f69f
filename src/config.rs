use std::path::{Path, PathBuf};

use config::{Config, ConfigError};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct SourcesConfig {
    /// Folder containing the flight videos
    pub videos: PathBuf,

    /// Folder containing one `.srt` telemetry file per video
    pub subtitles: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VideoConfig {
    /// Path or name of the ffprobe executable
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_ffprobe() -> String {
    "ffprobe".to_owned()
}

fn default_logs() -> PathBuf {
    PathBuf::from("logs")
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeolocateConfig {
    pub sources: Option<SourcesConfig>,

    /// Folder of YOLO label files named `<video>_<frame>.txt`
    pub predictions: Option<PathBuf>,

    /// Folder of camera parameter files named `<video>.txt`
    pub camera_params: PathBuf,

    /// Folder of GeoTIFF elevation tiles
    pub terrain: PathBuf,

    pub output: PathBuf,

    #[serde(default = "default_logs")]
    pub logs: PathBuf,

    #[serde(default)]
    pub video: VideoConfig,

    /// Maximum number of videos processed at once
    pub parallelism: Option<usize>,
}

impl GeolocateConfig {
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::from(path.as_ref()))?;
        c.merge(config::Environment::with_prefix("GEOLOCATE").separator("__"))?;

        c.try_into()
    }
}
