//! Collaborator interfaces the wave controller drives, plus CPU and wgpu implementations.
//!
//! The controller never allocates. A [`BufferOwner`] hands out writable
//! regions of buffers it manages, scoped to one submission, and decides when
//! written data becomes visible. A [`ComputeBackend`] records kernel launches
//! against those regions into a batch and submits the batch as one unit.

pub mod cpu;
pub mod gpu;
pub mod shader;

use crate::error::FrameError;
use crate::params::ThreadGroupExtent;
use crate::wave::{Dispatch, MeshPart, WaveParameters};

/// Kernel entry points the controller needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    VertexUpdate,
    IndexUpdate,
}

impl Kernel {
    pub const ALL: [Kernel; 2] = [Kernel::VertexUpdate, Kernel::IndexUpdate];

    /// Entry point name in `wave.wgsl`
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::VertexUpdate => "update_vertices",
            Self::IndexUpdate => "update_indices",
        }
    }
}

/// Owner of the vertex/index storage and of its visibility to consumers
pub trait BufferOwner {
    /// Writable vertex storage for one submission
    type VertexRegion;
    /// Writable index storage for one submission
    type IndexRegion;

    /// Vertex slots available (elements)
    fn vertex_capacity(&self) -> u64;

    /// Index slots available (elements)
    fn index_capacity(&self) -> u64;

    fn acquire_vertices(&mut self) -> Result<Self::VertexRegion, FrameError>;

    fn acquire_indices(&mut self) -> Result<Self::IndexRegion, FrameError>;

    /// Stage a new part list; published by the next [`complete`](Self::complete)
    fn replace_parts(&mut self, parts: Vec<MeshPart>);

    /// All writes of the current submission are issued; publish them
    fn complete(&mut self);

    /// The current submission was abandoned; drop anything staged
    fn discard(&mut self);
}

/// Compute device able to run the wave kernels against an owner's regions
pub trait ComputeBackend<O: BufferOwner> {
    /// Recorded but not yet submitted work
    type Batch;

    fn has_kernel(&self, kernel: Kernel) -> bool;

    /// Whether exact thread grids can be launched without rounding up to whole groups
    fn supports_nonuniform_dispatch(&self) -> bool;

    /// Thread-group size baked into the kernels, if the backend cannot change it
    fn compiled_thread_group(&self) -> Option<ThreadGroupExtent> {
        None
    }

    fn begin_batch(&mut self) -> Result<Self::Batch, FrameError>;

    fn dispatch_vertices(
        &mut self,
        batch: &mut Self::Batch,
        target: &O::VertexRegion,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError>;

    fn dispatch_indices(
        &mut self,
        batch: &mut Self::Batch,
        target: &O::IndexRegion,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError>;

    /// Hand the batch to the device. Must not block on completion.
    fn submit(&mut self, batch: Self::Batch) -> Result<(), FrameError>;
}
