//! Wavemesh library - procedural wave surface mesh engine

pub mod backend;
pub mod error;
pub mod params;
pub mod wave;

pub use error::{ConfigError, FrameError};
pub use params::WaveMeshConfig;
pub use wave::{FrameStatus, MeshVertex, WaveMeshController, WaveParameters};
