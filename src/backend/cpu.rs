//! Host reference backend.
//!
//! Runs the same kernel bodies the GPU runs, one emulated thread at a time,
//! over storage shared with [`CpuMesh`]. Recorded launches execute when the
//! batch is submitted, so a batch is still one atomic unit of work.

use std::sync::{Arc, Mutex, PoisonError};

use super::{BufferOwner, ComputeBackend, Kernel};
use crate::error::{ConfigError, FrameError};
use crate::params::WaveMeshConfig;
use crate::wave::{write_quad, write_vertex, Dispatch, MeshPart, MeshVertex, WaveParameters};

pub type SharedVertices = Arc<Mutex<Vec<MeshVertex>>>;
pub type SharedIndices = Arc<Mutex<Vec<u32>>>;

/// Double-buffered host mesh storage
pub struct CpuMesh {
    vertex_buffers: [SharedVertices; 2],
    index_buffer: SharedIndices,
    /// Buffer consumers read from; the other one receives writes
    front: usize,
    parts: Vec<MeshPart>,
    staged_parts: Option<Vec<MeshPart>>,
    published: u64,
}

impl CpuMesh {
    /// Allocate storage for the configuration's full capacity
    pub fn new(config: &WaveMeshConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let vertex_capacity = config.vertex_capacity() as usize;
        let index_capacity = config.index_capacity() as usize;
        let vertices = || Arc::new(Mutex::new(vec![MeshVertex::default(); vertex_capacity]));

        Ok(Self {
            vertex_buffers: [vertices(), vertices()],
            index_buffer: Arc::new(Mutex::new(vec![0; index_capacity])),
            front: 0,
            parts: Vec::new(),
            staged_parts: None,
            published: 0,
        })
    }

    /// Copy of the visible vertex buffer (full capacity)
    pub fn front_vertices(&self) -> Vec<MeshVertex> {
        self.vertex_buffers[self.front]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of the index buffer (full capacity)
    pub fn indices(&self) -> Vec<u32> {
        self.index_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Visible part list
    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// Number of completed submissions
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl BufferOwner for CpuMesh {
    type VertexRegion = SharedVertices;
    type IndexRegion = SharedIndices;

    fn vertex_capacity(&self) -> u64 {
        self.vertex_buffers[0]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64
    }

    fn index_capacity(&self) -> u64 {
        self.index_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64
    }

    fn acquire_vertices(&mut self) -> Result<SharedVertices, FrameError> {
        Ok(Arc::clone(&self.vertex_buffers[1 - self.front]))
    }

    fn acquire_indices(&mut self) -> Result<SharedIndices, FrameError> {
        Ok(Arc::clone(&self.index_buffer))
    }

    fn replace_parts(&mut self, parts: Vec<MeshPart>) {
        self.staged_parts = Some(parts);
    }

    fn complete(&mut self) {
        self.front = 1 - self.front;
        if let Some(parts) = self.staged_parts.take() {
            self.parts = parts;
        }
        self.published += 1;
    }

    fn discard(&mut self) {
        self.staged_parts = None;
    }
}

/// Work counters for the host backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub batches_submitted: u64,
    pub vertex_dispatches: u64,
    pub index_dispatches: u64,
    /// Emulated threads, including ones rejected by bounds checks
    pub threads_launched: u64,
    pub vertex_writes: u64,
    pub index_writes: u64,
}

enum CpuCommand {
    Vertices {
        target: SharedVertices,
        params: WaveParameters,
        dispatch: Dispatch,
    },
    Indices {
        target: SharedIndices,
        params: WaveParameters,
        dispatch: Dispatch,
    },
}

/// Recorded launches awaiting submission
#[derive(Default)]
pub struct CpuBatch {
    commands: Vec<CpuCommand>,
}

/// Host compute backend
pub struct CpuCompute {
    nonuniform: bool,
    stats: KernelStats,
}

impl CpuCompute {
    /// Backend launching exact thread grids
    pub fn new() -> Self {
        Self {
            nonuniform: true,
            stats: KernelStats::default(),
        }
    }

    /// Backend that only launches whole thread groups, like WebGPU
    pub fn uniform_groups_only() -> Self {
        Self {
            nonuniform: false,
            stats: KernelStats::default(),
        }
    }

    pub fn stats(&self) -> KernelStats {
        self.stats
    }

    fn run(&mut self, command: CpuCommand) -> Result<(), FrameError> {
        match command {
            CpuCommand::Vertices {
                target,
                params,
                dispatch,
            } => {
                let mut out = target
                    .lock()
                    .map_err(|_| FrameError::Submission("vertex storage poisoned".to_string()))?;
                let extent = dispatch.thread_extent();
                for j in 0..extent.height {
                    for i in 0..extent.width {
                        if write_vertex(i, j, &params, &mut out) {
                            self.stats.vertex_writes += 1;
                        }
                    }
                }
                self.stats.threads_launched += extent.area();
                self.stats.vertex_dispatches += 1;
            }
            CpuCommand::Indices {
                target,
                params,
                dispatch,
            } => {
                let mut out = target
                    .lock()
                    .map_err(|_| FrameError::Submission("index storage poisoned".to_string()))?;
                let extent = dispatch.thread_extent();
                for j in 0..extent.height {
                    for i in 0..extent.width {
                        if write_quad(i, j, params.segment_count, &mut out) {
                            self.stats.index_writes += 1;
                        }
                    }
                }
                self.stats.threads_launched += extent.area();
                self.stats.index_dispatches += 1;
            }
        }
        Ok(())
    }

    fn check_shape(&self, dispatch: &Dispatch) -> Result<(), FrameError> {
        match dispatch {
            Dispatch::Threads { .. } if !self.nonuniform => {
                Err(FrameError::UnsupportedDispatch("non-uniform"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for CpuCompute {
    fn default() -> Self {
        Self::new()
    }
}

// Any owner exposing shared host storage can be driven by the host backend
impl<O> ComputeBackend<O> for CpuCompute
where
    O: BufferOwner<VertexRegion = SharedVertices, IndexRegion = SharedIndices>,
{
    type Batch = CpuBatch;

    fn has_kernel(&self, _kernel: Kernel) -> bool {
        true
    }

    fn supports_nonuniform_dispatch(&self) -> bool {
        self.nonuniform
    }

    fn begin_batch(&mut self) -> Result<CpuBatch, FrameError> {
        Ok(CpuBatch::default())
    }

    fn dispatch_vertices(
        &mut self,
        batch: &mut CpuBatch,
        target: &SharedVertices,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError> {
        self.check_shape(&dispatch)?;
        batch.commands.push(CpuCommand::Vertices {
            target: Arc::clone(target),
            params: *params,
            dispatch,
        });
        Ok(())
    }

    fn dispatch_indices(
        &mut self,
        batch: &mut CpuBatch,
        target: &SharedIndices,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError> {
        self.check_shape(&dispatch)?;
        batch.commands.push(CpuCommand::Indices {
            target: Arc::clone(target),
            params: *params,
            dispatch,
        });
        Ok(())
    }

    fn submit(&mut self, batch: CpuBatch) -> Result<(), FrameError> {
        for command in batch.commands {
            self.run(command)?;
        }
        self.stats.batches_submitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ThreadGroupExtent;
    use crate::wave::{DispatchPlanner, INDICES_PER_QUAD};

    type HostBackend = dyn ComputeBackend<CpuMesh, Batch = CpuBatch>;

    fn host(compute: &mut CpuCompute) -> &mut HostBackend {
        compute
    }

    fn small_config() -> WaveMeshConfig {
        WaveMeshConfig {
            max_segment_count: 10,
            segment_count: 10,
            ..Default::default()
        }
    }

    fn params(segment_count: u32) -> WaveParameters {
        WaveParameters {
            segment_count,
            time: 0.5,
            density: 5.0,
            amplitude: 0.1,
        }
    }

    #[test]
    fn test_mesh_allocates_full_capacity() {
        let mesh = CpuMesh::new(&small_config()).unwrap();

        assert_eq!(mesh.vertex_capacity(), 121);
        assert_eq!(mesh.index_capacity(), 600);
    }

    #[test]
    fn test_writes_hidden_until_complete() {
        let mut mesh = CpuMesh::new(&small_config()).unwrap();
        let mut compute = CpuCompute::new();
        let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, false);
        let p = params(4);

        let region = mesh.acquire_vertices().unwrap();
        let mut batch = host(&mut compute).begin_batch().unwrap();
        host(&mut compute)
            .dispatch_vertices(&mut batch, &region, &p, planner.vertex_dispatch(4))
            .unwrap();
        host(&mut compute).submit(batch).unwrap();

        assert!(mesh.front_vertices().iter().all(|v| *v == MeshVertex::default()));

        mesh.complete();
        assert_ne!(mesh.front_vertices()[0], MeshVertex::default());
    }

    #[test]
    fn test_recorded_work_runs_on_submit() {
        let mut mesh = CpuMesh::new(&small_config()).unwrap();
        let mut compute = CpuCompute::new();
        let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, false);

        let region = mesh.acquire_indices().unwrap();
        let mut batch = host(&mut compute).begin_batch().unwrap();
        host(&mut compute)
            .dispatch_indices(&mut batch, &region, &params(3), planner.index_dispatch(3))
            .unwrap();

        assert_eq!(compute.stats().index_dispatches, 0);
        host(&mut compute).submit(batch).unwrap();
        assert_eq!(compute.stats().index_dispatches, 1);
        assert_eq!(compute.stats().index_writes, 9);
        assert_eq!(&mesh.indices()[..6], &[0, 4, 1, 1, 4, 5]);
    }

    #[test]
    fn test_group_dispatch_discards_surplus_threads() {
        let mut mesh = CpuMesh::new(&small_config()).unwrap();
        let mut compute = CpuCompute::uniform_groups_only();
        let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, true);

        let vertices = mesh.acquire_vertices().unwrap();
        let indices = mesh.acquire_indices().unwrap();
        let mut batch = host(&mut compute).begin_batch().unwrap();
        host(&mut compute)
            .dispatch_vertices(&mut batch, &vertices, &params(10), planner.vertex_dispatch(10))
            .unwrap();
        host(&mut compute)
            .dispatch_indices(&mut batch, &indices, &params(10), planner.index_dispatch(10))
            .unwrap();
        host(&mut compute).submit(batch).unwrap();

        let stats = compute.stats();
        // 2x2 groups of 8x8 for both passes
        assert_eq!(stats.threads_launched, 256 * 2);
        assert_eq!(stats.vertex_writes, 121);
        assert_eq!(stats.index_writes, 100);
        assert_eq!(mesh.indices().len() as u32, 100 * INDICES_PER_QUAD);
    }

    #[test]
    fn test_exact_dispatch_rejected_when_groups_only() {
        let mut mesh = CpuMesh::new(&small_config()).unwrap();
        let mut compute = CpuCompute::uniform_groups_only();
        let exact = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, false);

        let region = mesh.acquire_vertices().unwrap();
        let mut batch = host(&mut compute).begin_batch().unwrap();
        let result = host(&mut compute).dispatch_vertices(
            &mut batch,
            &region,
            &params(4),
            exact.vertex_dispatch(4),
        );

        assert_eq!(result, Err(FrameError::UnsupportedDispatch("non-uniform")));
    }

    #[test]
    fn test_discard_drops_staged_parts() {
        let mut mesh = CpuMesh::new(&small_config()).unwrap();

        mesh.replace_parts(vec![MeshPart {
            index_offset: 0,
            index_count: 6,
            topology: crate::wave::PrimitiveTopology::TriangleList,
            material_slot: 0,
            bounds: crate::wave::Aabb::wave_bounds(1.0),
        }]);
        mesh.discard();
        mesh.complete();

        assert!(mesh.parts().is_empty());
        assert_eq!(mesh.published(), 1);
    }
}
