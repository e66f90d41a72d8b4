//! Wave mesh construction parameters.

use crate::error::ConfigError;

/// Compute thread-group size (threads per group along each grid axis)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadGroupExtent {
    pub width: u32,
    pub height: u32,
}

impl ThreadGroupExtent {
    /// `@workgroup_size` declared in `wave.wgsl`; the wgpu backend reads it back at startup
    pub const DEFAULT: Self = Self {
        width: 8,
        height: 8,
    };
}

impl Default for ThreadGroupExtent {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wave mesh parameters
#[derive(Debug, Clone)]
pub struct WaveMeshConfig {
    /// Capacity ceiling: grid subdivisions per axis the buffers are sized for.
    /// 256 = 66,049 vertices, 393,216 indices
    pub max_segment_count: u32,

    /// Initial grid subdivisions per axis (clamped to `max_segment_count`)
    pub segment_count: u32,

    /// Wave height (model units, mesh spans a 1x1 square)
    pub amplitude: f32,

    /// Spatial frequency (rings per model unit of radius)
    pub density: f32,

    /// Animation speed multiplier (dimensionless, scales elapsed seconds)
    pub speed: f32,

    /// Minimum half height of the published bounding box (model units)
    pub bounds_half_height: f32,

    /// Thread-group extent used for dispatch planning
    pub thread_group: ThreadGroupExtent,
}

impl Default for WaveMeshConfig {
    fn default() -> Self {
        Self {
            max_segment_count: 256,
            segment_count: 64,
            amplitude: 0.1,
            density: 5.0,
            speed: 1.0,
            bounds_half_height: 1.0,
            thread_group: ThreadGroupExtent::DEFAULT,
        }
    }
}

impl WaveMeshConfig {
    /// Vertex slots the buffers must hold: (max + 1)^2
    pub fn vertex_capacity(&self) -> u64 {
        let side = self.max_segment_count as u64 + 1;
        side * side
    }

    /// Index slots the buffers must hold: max^2 * 6
    pub fn index_capacity(&self) -> u64 {
        let side = self.max_segment_count as u64;
        side * side * 6
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_segment_count == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        // Vertex indices and index counts are u32 on both sides of the buffer
        if self.vertex_capacity() > u32::MAX as u64 || self.index_capacity() > u32::MAX as u64 {
            return Err(ConfigError::CapacityOverflow {
                max: self.max_segment_count,
            });
        }

        if self.thread_group.width == 0 || self.thread_group.height == 0 {
            return Err(ConfigError::InvalidThreadGroup {
                width: self.thread_group.width,
                height: self.thread_group.height,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_max_segments() {
        let config = WaveMeshConfig {
            max_segment_count: 4,
            ..Default::default()
        };

        assert_eq!(config.vertex_capacity(), 25);
        assert_eq!(config.index_capacity(), 96);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = WaveMeshConfig {
            max_segment_count: 0,
            ..Default::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_index_overflow_rejected() {
        let config = WaveMeshConfig {
            max_segment_count: 70_000,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::CapacityOverflow { max: 70_000 })
        ));
    }

    #[test]
    fn test_index_count_overflow_rejected() {
        // Vertices still fit in u32, indices do not
        let config = WaveMeshConfig {
            max_segment_count: 30_000,
            ..Default::default()
        };
        assert!(config.vertex_capacity() <= u32::MAX as u64);
        assert!(config.index_capacity() > u32::MAX as u64);

        assert_eq!(
            config.validate(),
            Err(ConfigError::CapacityOverflow { max: 30_000 })
        );
    }

    #[test]
    fn test_largest_valid_index_capacity() {
        // 26_754^2 * 6 is the last square grid whose index count fits in u32
        let config = WaveMeshConfig {
            max_segment_count: 26_754,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let too_large = WaveMeshConfig {
            max_segment_count: 26_755,
            ..Default::default()
        };
        assert!(too_large.validate().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(WaveMeshConfig::default().validate().is_ok());
    }
}
