mod pipeline;
mod provider;
mod stats;

pub use pipeline::*;
pub use provider::*;
pub use stats::VideoStats;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] gl_camera::ConfigError),

    #[error("invalid frame rate {0}")]
    FrameRate(f64),
}
