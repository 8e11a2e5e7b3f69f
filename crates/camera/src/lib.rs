pub mod config;
mod model;

pub use config::{CameraParameters, ConfigError};
pub use model::CameraModel;
