//! Per-frame wave mesh scheduling.

use log::{debug, info, warn};

use super::dispatch::DispatchPlanner;
use super::parts::{Aabb, MeshPart, PrimitiveTopology};
use super::WaveParameters;
use crate::backend::{BufferOwner, ComputeBackend, Kernel};
use crate::error::{ConfigError, FrameError};
use crate::params::WaveMeshConfig;

/// Whether the index buffer and part list still reflect the current resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopologyState {
    Idle,
    Dirty,
}

/// Outcome of one [`WaveMeshController::advance`] call
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// Vertex data submitted and published
    Updated { topology_rebuilt: bool },
    /// Frame abandoned before anything became visible; the next call retries
    Skipped(FrameError),
}

/// Fixed element capacity of the mesh buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshCapacity {
    pub vertices: u64,
    pub indices: u64,
}

/// Wave mesh state and per-frame update scheduling
///
/// Vertex attributes are recomputed on every [`advance`](Self::advance).
/// Index generation and part/bounds replacement run only while the topology
/// is dirty, which any call to [`set_segment_count`](Self::set_segment_count)
/// causes, including one that assigns the current value.
pub struct WaveMeshController {
    config: WaveMeshConfig,
    segment_count: u32,
    amplitude: f32,
    density: f32,
    speed: f32,
    /// Accumulated seconds, unscaled
    elapsed_s: f32,
    topology: TopologyState,
    /// Half height of the bounding box in the last published part list
    published_half_height: f32,
}

impl WaveMeshController {
    /// Create a controller sized for `config`.
    ///
    /// Fails if the configuration is degenerate, the backend lacks a kernel or
    /// was compiled for another thread-group size, or the owner's buffers are
    /// smaller than the configured capacity.
    pub fn new<O, C>(config: WaveMeshConfig, backend: &C, owner: &O) -> Result<Self, ConfigError>
    where
        O: BufferOwner,
        C: ComputeBackend<O>,
    {
        config.validate()?;

        for kernel in Kernel::ALL {
            if !backend.has_kernel(kernel) {
                return Err(ConfigError::MissingKernel(kernel.entry_point()));
            }
        }

        if let Some(compiled) = backend.compiled_thread_group() {
            if compiled != config.thread_group {
                return Err(ConfigError::ThreadGroupMismatch {
                    requested: (config.thread_group.width, config.thread_group.height),
                    compiled: (compiled.width, compiled.height),
                });
            }
        }

        let required_vertices = config.vertex_capacity();
        if owner.vertex_capacity() < required_vertices {
            return Err(ConfigError::InsufficientCapacity {
                buffer: "vertex",
                available: owner.vertex_capacity(),
                required: required_vertices,
            });
        }

        let required_indices = config.index_capacity();
        if owner.index_capacity() < required_indices {
            return Err(ConfigError::InsufficientCapacity {
                buffer: "index",
                available: owner.index_capacity(),
                required: required_indices,
            });
        }

        info!(
            "Wave mesh controller: max {} segments ({} vertices, {} indices), {} dispatch",
            config.max_segment_count,
            required_vertices,
            required_indices,
            if backend.supports_nonuniform_dispatch() {
                "exact"
            } else {
                "grouped"
            }
        );

        let mut controller = Self {
            segment_count: 0,
            amplitude: config.amplitude,
            density: config.density,
            speed: config.speed,
            elapsed_s: 0.0,
            topology: TopologyState::Dirty,
            published_half_height: 0.0,
            config,
        };
        controller.set_segment_count(controller.config.segment_count);

        Ok(controller)
    }

    /// Change grid resolution. Always marks topology dirty.
    ///
    /// Values above the configured maximum are clamped.
    pub fn set_segment_count(&mut self, segment_count: u32) {
        let max = self.config.max_segment_count;
        if segment_count > max {
            warn!(
                "Segment count {} exceeds capacity, clamping to {}",
                segment_count, max
            );
        }

        self.segment_count = segment_count.min(max);
        self.topology = TopologyState::Dirty;
    }

    /// Takes effect next frame. Growing past the published bounds republishes parts.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    pub fn set_density(&mut self, density: f32) {
        self.density = density;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Accumulated seconds passed to `advance`
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_s
    }

    pub fn is_topology_dirty(&self) -> bool {
        self.topology == TopologyState::Dirty
    }

    pub fn capacity(&self) -> MeshCapacity {
        MeshCapacity {
            vertices: self.config.vertex_capacity(),
            indices: self.config.index_capacity(),
        }
    }

    pub fn active_vertex_count(&self) -> u32 {
        self.parameters().vertex_count()
    }

    pub fn active_index_count(&self) -> u32 {
        self.parameters().index_count()
    }

    /// Half height of the bounding box covering the current amplitude
    pub fn bounds_half_height(&self) -> f32 {
        self.config.bounds_half_height.max(self.amplitude.abs())
    }

    /// Snapshot handed to the kernels
    pub fn parameters(&self) -> WaveParameters {
        WaveParameters {
            segment_count: self.segment_count.min(self.config.max_segment_count),
            time: self.elapsed_s * self.speed,
            density: self.density,
            amplitude: self.amplitude,
        }
    }

    /// Advance the simulation by `delta_time_s` seconds and submit this frame's work.
    ///
    /// Failures skip the frame: nothing is published, the topology stays
    /// dirty if it was, and the next call starts from scratch.
    pub fn advance<O, C>(
        &mut self,
        delta_time_s: f32,
        backend: &mut C,
        owner: &mut O,
    ) -> FrameStatus
    where
        O: BufferOwner,
        C: ComputeBackend<O>,
    {
        let dt = if delta_time_s.is_finite() && delta_time_s >= 0.0 {
            delta_time_s
        } else {
            warn!("Ignoring invalid frame delta {}", delta_time_s);
            0.0
        };
        self.elapsed_s += dt;

        self.segment_count = self.segment_count.min(self.config.max_segment_count);
        let params = self.parameters();

        let rebuild = self.topology == TopologyState::Dirty;
        let half_height = self.bounds_half_height();
        let republish = rebuild || half_height > self.published_half_height;

        match self.encode_frame(&params, rebuild, republish, backend, owner) {
            Ok(()) => {
                owner.complete();
                if republish {
                    self.published_half_height = half_height;
                }
                if rebuild {
                    self.topology = TopologyState::Idle;
                    debug!(
                        "Rebuilt wave topology: {} segments, {} indices",
                        params.segment_count,
                        params.index_count()
                    );
                } else if republish {
                    debug!("Grew wave bounds to half height {}", half_height);
                }
                FrameStatus::Updated {
                    topology_rebuilt: rebuild,
                }
            }
            Err(e) => {
                owner.discard();
                warn!("Skipping wave frame: {}", e);
                FrameStatus::Skipped(e)
            }
        }
    }

    /// Record and submit one frame.
    ///
    /// `rebuild` regenerates indices; `republish` stages a fresh part list.
    fn encode_frame<O, C>(
        &self,
        params: &WaveParameters,
        rebuild: bool,
        republish: bool,
        backend: &mut C,
        owner: &mut O,
    ) -> Result<(), FrameError>
    where
        O: BufferOwner,
        C: ComputeBackend<O>,
    {
        let planner = DispatchPlanner::new(
            self.config.thread_group,
            !backend.supports_nonuniform_dispatch(),
        );

        let mut batch = backend.begin_batch()?;

        let vertices = owner.acquire_vertices()?;
        let dispatch = planner.vertex_dispatch(params.segment_count);
        backend.dispatch_vertices(&mut batch, &vertices, params, dispatch)?;

        if rebuild {
            let indices = owner.acquire_indices()?;
            let dispatch = planner.index_dispatch(params.segment_count);
            backend.dispatch_indices(&mut batch, &indices, params, dispatch)?;
        }
        if republish {
            owner.replace_parts(vec![self.mesh_part(params)]);
        }

        backend.submit(batch)?;
        Ok(())
    }

    /// Single triangle-list part over the active index range
    fn mesh_part(&self, params: &WaveParameters) -> MeshPart {
        MeshPart {
            index_offset: 0,
            index_count: params.index_count(),
            topology: PrimitiveTopology::TriangleList,
            material_slot: 0,
            bounds: Aabb::wave_bounds(self.bounds_half_height()),
        }
    }
}
