//! Mesh vertex record, its self-described binary layout, and the vertex attribute kernel.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::height::{height, NORMAL_EPSILON};
use super::WaveParameters;
use crate::error::ConfigError;

/// Vertex data for the wave mesh (position + normal + UV), 32 bytes, no padding
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// What a vertex field means to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    Position,
    Normal,
    TexCoord,
}

/// Numeric format of a vertex field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub fn size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
        }
    }

    fn from_wgpu(format: wgpu::VertexFormat) -> Option<Self> {
        match format {
            wgpu::VertexFormat::Float32x2 => Some(Self::Float32x2),
            wgpu::VertexFormat::Float32x3 => Some(Self::Float32x3),
            _ => None,
        }
    }
}

/// One field of a vertex record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexField {
    pub name: &'static str,
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    /// Byte offset from the start of the record
    pub offset: u32,
}

/// Explicit binary layout of a vertex record as seen by one side of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub fields: &'static [VertexField],
}

// Semantics by shader location for consumer-side layouts
const LOCATION_SEMANTICS: [(&str, VertexSemantic); 3] = [
    ("position", VertexSemantic::Position),
    ("normal", VertexSemantic::Normal),
    ("uv", VertexSemantic::TexCoord),
];

impl VertexLayout {
    /// Check that `other` interprets the same bytes the same way.
    ///
    /// Field names are informational; semantics, formats and offsets must agree.
    pub fn validate(&self, other: &VertexLayout) -> Result<(), ConfigError> {
        if self.stride != other.stride {
            return Err(ConfigError::LayoutMismatch {
                field: "stride".to_string(),
                detail: format!("{} bytes vs {} bytes", self.stride, other.stride),
            });
        }

        if self.fields.len() != other.fields.len() {
            return Err(ConfigError::LayoutMismatch {
                field: "fields".to_string(),
                detail: format!("{} fields vs {}", self.fields.len(), other.fields.len()),
            });
        }

        for (ours, theirs) in self.fields.iter().zip(other.fields) {
            if ours.semantic != theirs.semantic
                || ours.format != theirs.format
                || ours.offset != theirs.offset
            {
                return Err(ConfigError::LayoutMismatch {
                    field: ours.name.to_string(),
                    detail: format!(
                        "{:?} {:?} @{} vs {:?} {:?} @{}",
                        ours.semantic,
                        ours.format,
                        ours.offset,
                        theirs.semantic,
                        theirs.format,
                        theirs.offset
                    ),
                });
            }
        }

        // Fields must tile the record exactly
        let covered: u32 = self.fields.iter().map(|f| f.format.size()).sum();
        if covered != self.stride {
            return Err(ConfigError::LayoutMismatch {
                field: "stride".to_string(),
                detail: format!("{} bytes of fields in a {} byte record", covered, self.stride),
            });
        }

        Ok(())
    }

    /// Describe a consumer's wgpu vertex buffer layout.
    ///
    /// Shader locations 0, 1, 2 are read as position, normal, uv.
    pub fn from_wgpu(layout: &wgpu::VertexBufferLayout<'_>) -> Result<Self, ConfigError> {
        let mut fields = Vec::with_capacity(layout.attributes.len());

        for attribute in layout.attributes {
            let (name, semantic) = LOCATION_SEMANTICS
                .get(attribute.shader_location as usize)
                .copied()
                .ok_or_else(|| ConfigError::LayoutMismatch {
                    field: format!("location {}", attribute.shader_location),
                    detail: "no vertex field bound to this shader location".to_string(),
                })?;

            let format = VertexFormat::from_wgpu(attribute.format).ok_or_else(|| {
                ConfigError::LayoutMismatch {
                    field: name.to_string(),
                    detail: format!("unsupported format {:?}", attribute.format),
                }
            })?;

            fields.push(VertexField {
                name,
                semantic,
                format,
                offset: attribute.offset as u32,
            });
        }

        fields.sort_by_key(|f| f.offset);

        Ok(Self {
            stride: layout.array_stride as u32,
            // Layout descriptions are built once at setup
            fields: Vec::leak(fields),
        })
    }
}

impl MeshVertex {
    /// Layout of the Rust record, derived from the compiler's field offsets
    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: size_of::<MeshVertex>() as u32,
        fields: &[
            VertexField {
                name: "position",
                semantic: VertexSemantic::Position,
                format: VertexFormat::Float32x3,
                offset: offset_of!(MeshVertex, position) as u32,
            },
            VertexField {
                name: "normal",
                semantic: VertexSemantic::Normal,
                format: VertexFormat::Float32x3,
                offset: offset_of!(MeshVertex, normal) as u32,
            },
            VertexField {
                name: "uv",
                semantic: VertexSemantic::TexCoord,
                format: VertexFormat::Float32x2,
                offset: offset_of!(MeshVertex, uv) as u32,
            },
        ],
    };

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    /// Vertex buffer layout for render pipelines consuming the mesh
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Compute the vertex at grid coordinate `(i, j)`.
///
/// Returns `None` outside `[0, segment_count]` on either axis. The mesh spans
/// the unit square centred on the origin in the XZ plane. A segment count of
/// zero yields the single corner vertex at `(-0.5, h, -0.5)`.
pub fn compute_vertex(i: u32, j: u32, params: &WaveParameters) -> Option<MeshVertex> {
    let n = params.segment_count;
    if i > n || j > n {
        return None;
    }

    let (segment_width, u, v) = if n == 0 {
        (0.0, 0.0, 1.0)
    } else {
        let n = n as f32;
        (1.0 / n, i as f32 / n, 1.0 - j as f32 / n)
    };

    let x = i as f32 * segment_width - 0.5;
    let z = j as f32 * segment_width - 0.5;
    let y = height(x, z, params);

    // Central differences; same formula as the WGSL kernel
    let dydx = height(x + NORMAL_EPSILON, z, params) - height(x - NORMAL_EPSILON, z, params);
    let dydz = height(x, z + NORMAL_EPSILON, params) - height(x, z - NORMAL_EPSILON, params);
    let dydy = 2.0 * NORMAL_EPSILON;
    let normal = Vec3::new(dydx, dydy, dydz).normalize();

    Some(MeshVertex {
        position: [x, y, z],
        normal: normal.to_array(),
        uv: [u, v],
    })
}

/// Vertex kernel body for one thread: write `(i, j)` into its linear slot.
///
/// Returns whether a write happened. Threads outside the active grid or past
/// the end of `out` write nothing.
pub fn write_vertex(i: u32, j: u32, params: &WaveParameters, out: &mut [MeshVertex]) -> bool {
    let Some(vertex) = compute_vertex(i, j, params) else {
        return false;
    };

    let index = j as usize * params.width_vertex_count() as usize + i as usize;
    match out.get_mut(index) {
        Some(slot) => {
            *slot = vertex;
            true
        }
        None => false,
    }
}
