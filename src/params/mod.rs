//! Parameter definitions with units and documented semantics.
//!
//! Magic numbers live here with:
//! - Units (model-space meters, seconds, cycles per unit)
//! - Documented ranges and meanings

mod wave;

// Re-export all types
pub use wave::{ThreadGroupExtent, WaveMeshConfig};
