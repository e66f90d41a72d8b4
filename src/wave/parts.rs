//! Mesh part metadata published alongside the index buffer.

use glam::Vec3;

/// Axis-aligned bounding box in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box over the unit-square footprint reaching `half_height` above and below the plane
    pub fn wave_bounds(half_height: f32) -> Self {
        let h = half_height.abs();
        Self {
            min: Vec3::new(-0.5, -h, -0.5),
            max: Vec3::new(0.5, h, 0.5),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Primitive assembly for a part's index range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
}

/// Sub-range of the index buffer drawn with one material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshPart {
    /// First index (elements, not bytes)
    pub index_offset: u32,
    pub index_count: u32,
    pub topology: PrimitiveTopology,
    pub material_slot: u32,
    pub bounds: Aabb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_bounds_cover_footprint() {
        let bounds = Aabb::wave_bounds(0.2);

        assert!(bounds.contains(Vec3::new(-0.5, 0.2, 0.5)));
        assert!(bounds.contains(Vec3::new(0.5, -0.2, -0.5)));
        assert!(!bounds.contains(Vec3::new(0.0, 0.21, 0.0)));
    }

    #[test]
    fn test_negative_half_height_normalised() {
        assert_eq!(Aabb::wave_bounds(-1.0), Aabb::wave_bounds(1.0));
    }
}
