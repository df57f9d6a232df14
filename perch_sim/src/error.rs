// perch_sim/src/error.rs

use perch_core::error::PerchError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the simulation driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration, initialization or out-of-bounds errors from the core.
    #[error(transparent)]
    Core(#[from] PerchError),

    #[error("failed to load scenario configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("failed to serialize scenario configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to load image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A previous step hit a fatal error; the runner must be rebuilt.
    #[error("mission halted after a fatal error; build a new runner to fly again")]
    Halted,
}
