//! Procedural wave surface: height field, per-vertex kernels, topology and scheduling.

mod controller;
mod dispatch;
mod height;
mod parts;
mod topology;
mod vertex;

use bytemuck::{Pod, Zeroable};

// Re-export public types
pub use controller::{FrameStatus, MeshCapacity, WaveMeshController};
pub use dispatch::{Dispatch, DispatchPlanner, GridExtent};
pub use height::{height, NORMAL_EPSILON};
pub use parts::{Aabb, MeshPart, PrimitiveTopology};
pub use topology::{quad_indices, write_quad, INDICES_PER_QUAD};
pub use vertex::{
    compute_vertex, write_vertex, MeshVertex, VertexField, VertexFormat, VertexLayout,
    VertexSemantic,
};

/// Per-frame wave snapshot (matches `WaveParameters` uniform in `wave.wgsl`)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WaveParameters {
    /// Grid subdivisions per axis, already clamped to capacity
    pub segment_count: u32,
    /// Elapsed seconds scaled by speed
    pub time: f32,
    /// Spatial frequency multiplier
    pub density: f32,
    /// Vertical scale
    pub amplitude: f32,
}

impl WaveParameters {
    /// Vertices along one grid axis
    pub fn width_vertex_count(&self) -> u32 {
        self.segment_count + 1
    }

    /// Vertices the vertex kernel writes for this snapshot: (n + 1)^2
    pub fn vertex_count(&self) -> u32 {
        self.width_vertex_count() * self.width_vertex_count()
    }

    /// Indices the topology kernel writes for this snapshot: n^2 * 6
    pub fn index_count(&self) -> u32 {
        self.segment_count * self.segment_count * INDICES_PER_QUAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_match_uniform_layout() {
        // Four 32-bit scalars, no padding
        assert_eq!(std::mem::size_of::<WaveParameters>(), 16);
        assert_eq!(std::mem::offset_of!(WaveParameters, segment_count), 0);
        assert_eq!(std::mem::offset_of!(WaveParameters, time), 4);
        assert_eq!(std::mem::offset_of!(WaveParameters, density), 8);
        assert_eq!(std::mem::offset_of!(WaveParameters, amplitude), 12);
    }

    #[test]
    fn test_grid_counts() {
        let params = WaveParameters {
            segment_count: 2,
            ..Default::default()
        };

        assert_eq!(params.vertex_count(), 9);
        assert_eq!(params.index_count(), 24);

        let empty = WaveParameters::default();
        assert_eq!(empty.vertex_count(), 1);
        assert_eq!(empty.index_count(), 0);
    }
}
