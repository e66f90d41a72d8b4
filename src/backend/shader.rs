//! Reflection over the WGSL wave kernels.
//!
//! Entry points, workgroup size and the vertex record layout are read from the
//! parsed `wave.wgsl` module, so the host never carries its own copy of them.

use super::Kernel;
use crate::error::ConfigError;
use crate::params::ThreadGroupExtent;
use crate::wave::{VertexField, VertexFormat, VertexLayout, VertexSemantic};

/// Source of the wave kernels
pub const WAVE_SHADER: &str = include_str!("../wave.wgsl");

const FLOAT_BYTES: u32 = 4;

// Float-offset constant in the shader for each vertex field
const VERTEX_FIELDS: [(&str, &str, VertexSemantic, VertexFormat); 3] = [
    (
        "POSITION_OFFSET",
        "position",
        VertexSemantic::Position,
        VertexFormat::Float32x3,
    ),
    (
        "NORMAL_OFFSET",
        "normal",
        VertexSemantic::Normal,
        VertexFormat::Float32x3,
    ),
    (
        "UV_OFFSET",
        "uv",
        VertexSemantic::TexCoord,
        VertexFormat::Float32x2,
    ),
];

/// Parsed and validated kernel module
pub struct ShaderReflection {
    module: naga::Module,
}

impl ShaderReflection {
    /// Parse and validate WGSL source. Needs no GPU device.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| ConfigError::Shader(e.emit_to_string(source)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| ConfigError::Shader(e.into_inner().to_string()))?;

        Ok(Self { module })
    }

    /// Reflect the built-in wave kernels
    pub fn wave() -> Result<Self, ConfigError> {
        Self::parse(WAVE_SHADER)
    }

    fn entry_point(&self, kernel: Kernel) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Compute && ep.name == kernel.entry_point())
    }

    pub fn has_kernel(&self, kernel: Kernel) -> bool {
        self.entry_point(kernel).is_some()
    }

    /// `@workgroup_size` of one kernel, ignoring depth
    pub fn workgroup_size(&self, kernel: Kernel) -> Option<ThreadGroupExtent> {
        self.entry_point(kernel).map(|ep| ThreadGroupExtent {
            width: ep.workgroup_size[0],
            height: ep.workgroup_size[1],
        })
    }

    /// Workgroup size shared by every kernel.
    ///
    /// Kernels must be flat (depth 1) and declare the same extent.
    pub fn thread_group(&self) -> Result<ThreadGroupExtent, ConfigError> {
        let mut shared: Option<ThreadGroupExtent> = None;

        for kernel in Kernel::ALL {
            let ep = self
                .entry_point(kernel)
                .ok_or(ConfigError::MissingKernel(kernel.entry_point()))?;

            let [width, height, depth] = ep.workgroup_size;
            if depth != 1 {
                return Err(ConfigError::Shader(format!(
                    "{} has workgroup depth {}, kernels must be 2D",
                    kernel.entry_point(),
                    depth
                )));
            }

            let extent = ThreadGroupExtent { width, height };
            match shared {
                Some(first) if first != extent => {
                    return Err(ConfigError::ThreadGroupMismatch {
                        requested: (first.width, first.height),
                        compiled: (width, height),
                    });
                }
                _ => shared = Some(extent),
            }
        }

        shared.ok_or_else(|| ConfigError::Shader("module declares no kernels".to_string()))
    }

    /// Value of a module-scope `u32` constant
    pub fn u32_constant(&self, name: &str) -> Option<u32> {
        let (_, constant) = self
            .module
            .constants
            .iter()
            .find(|(_, c)| c.name.as_deref() == Some(name))?;

        match self.module.global_expressions[constant.init] {
            naga::Expression::Literal(naga::Literal::U32(value)) => Some(value),
            _ => None,
        }
    }

    /// Vertex record layout the vertex kernel writes, from its float-offset constants
    pub fn vertex_layout(&self) -> Result<VertexLayout, ConfigError> {
        let stride = self.byte_offset("FLOATS_PER_VERTEX")?;

        let mut fields = Vec::with_capacity(VERTEX_FIELDS.len());
        for (constant, name, semantic, format) in VERTEX_FIELDS {
            fields.push(VertexField {
                name,
                semantic,
                format,
                offset: self.byte_offset(constant)?,
            });
        }
        fields.sort_by_key(|f| f.offset);

        Ok(VertexLayout {
            stride,
            // Layout descriptions are built once at setup
            fields: Vec::leak(fields),
        })
    }

    /// Float-count constant converted to bytes
    fn byte_offset(&self, constant: &'static str) -> Result<u32, ConfigError> {
        let floats = self
            .u32_constant(constant)
            .ok_or_else(|| ConfigError::LayoutMismatch {
                field: constant.to_string(),
                detail: "shader declares no u32 constant with this name".to_string(),
            })?;

        floats
            .checked_mul(FLOAT_BYTES)
            .ok_or_else(|| ConfigError::LayoutMismatch {
                field: constant.to_string(),
                detail: format!("{} floats overflows a byte offset", floats),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave::MeshVertex;

    #[test]
    fn test_wave_shader_validates() {
        let shader = ShaderReflection::wave().unwrap();

        for kernel in Kernel::ALL {
            assert!(shader.has_kernel(kernel), "{} missing", kernel.entry_point());
        }
    }

    #[test]
    fn test_kernels_use_default_thread_group() {
        let shader = ShaderReflection::wave().unwrap();

        assert_eq!(
            shader.workgroup_size(Kernel::VertexUpdate),
            Some(ThreadGroupExtent::DEFAULT)
        );
        assert_eq!(
            shader.workgroup_size(Kernel::IndexUpdate),
            Some(ThreadGroupExtent::DEFAULT)
        );
        assert_eq!(shader.thread_group(), Ok(ThreadGroupExtent::DEFAULT));
    }

    #[test]
    fn test_shader_vertex_layout_matches_record() {
        let shader = ShaderReflection::wave().unwrap();
        assert_eq!(shader.u32_constant("FLOATS_PER_VERTEX"), Some(8));

        let layout = shader.vertex_layout().unwrap();
        assert_eq!(layout.stride, 32);
        MeshVertex::LAYOUT.validate(&layout).unwrap();
    }

    #[test]
    fn test_shifted_field_detected() {
        let source = WAVE_SHADER.replace(
            "const UV_OFFSET: u32 = 6u;",
            "const UV_OFFSET: u32 = 7u;",
        );
        assert_ne!(source, WAVE_SHADER);
        let shader = ShaderReflection::parse(&source).unwrap();

        let result = MeshVertex::LAYOUT.validate(&shader.vertex_layout().unwrap());

        assert!(matches!(
            result,
            Err(ConfigError::LayoutMismatch { field, .. }) if field == "uv"
        ));
    }

    #[test]
    fn test_renamed_kernel_is_missing() {
        let source = WAVE_SHADER.replace("fn update_indices(", "fn rebuild_indices(");
        let shader = ShaderReflection::parse(&source).unwrap();

        assert!(shader.has_kernel(Kernel::VertexUpdate));
        assert!(!shader.has_kernel(Kernel::IndexUpdate));
        assert_eq!(
            shader.thread_group(),
            Err(ConfigError::MissingKernel("update_indices"))
        );
    }

    #[test]
    fn test_disagreeing_workgroup_sizes_rejected() {
        let source = WAVE_SHADER.replacen(
            "@workgroup_size(8, 8, 1)",
            "@workgroup_size(16, 16, 1)",
            1,
        );
        let shader = ShaderReflection::parse(&source).unwrap();

        assert!(matches!(
            shader.thread_group(),
            Err(ConfigError::ThreadGroupMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_source_rejected() {
        let result = ShaderReflection::parse("fn broken( {");
        assert!(matches!(result, Err(ConfigError::Shader(_))));
    }
}
