//! Error taxonomy for the wave mesh engine.
//!
//! Construction problems are fatal and surface as [`ConfigError`]. Anything
//! that goes wrong while producing a single frame is a [`FrameError`]; the
//! controller logs it and skips the frame, the next call retries.

use thiserror::Error;

/// Fatal setup errors. The engine cannot produce correct output without fixing these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Maximum segment count of zero leaves no room for a single quad.
    #[error("mesh capacity is zero (max_segment_count must be at least 1)")]
    ZeroCapacity,

    /// Vertex indices and index counts are 32-bit; the grid must stay addressable.
    #[error("max_segment_count {max} exceeds 32-bit vertex or index range")]
    CapacityOverflow { max: u32 },

    /// Thread-group extent with a zero axis cannot cover any work.
    #[error("thread-group extent {width}x{height} must be non-zero on both axes")]
    InvalidThreadGroup { width: u32, height: u32 },

    /// Backend kernels were compiled for a different thread-group size.
    #[error("thread-group extent {requested:?} does not match compiled kernels {compiled:?}")]
    ThreadGroupMismatch {
        requested: (u32, u32),
        compiled: (u32, u32),
    },

    /// Compute backend does not expose a kernel the controller needs.
    #[error("compute kernel entry point `{0}` is missing")]
    MissingKernel(&'static str),

    /// Producer and consumer disagree on the vertex record layout.
    #[error("vertex layout mismatch on {field}: {detail}")]
    LayoutMismatch { field: String, detail: String },

    /// Externally owned buffers are smaller than the grid ceiling.
    #[error("{buffer} buffer holds {available} elements, {required} required")]
    InsufficientCapacity {
        buffer: &'static str,
        available: u64,
        required: u64,
    },

    /// GPU adapter or device could not be acquired.
    #[error("GPU initialisation failed: {0}")]
    Device(String),

    /// Kernel source failed to parse or validate.
    #[error("wave shader rejected: {0}")]
    Shader(String),
}

/// Per-frame failures. Never fatal; the frame is abandoned before anything becomes visible.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// Buffer owner could not hand out a writable region this submission.
    #[error("{0} buffer region unavailable")]
    RegionUnavailable(&'static str),

    /// Compute backend could not open a command batch.
    #[error("dispatch resources unavailable: {0}")]
    DispatchUnavailable(String),

    /// Backend cannot execute the requested dispatch shape.
    #[error("backend does not support {0} dispatch")]
    UnsupportedDispatch(&'static str),

    /// Work was recorded but could not be handed to the device.
    #[error("submission failed: {0}")]
    Submission(String),
}
