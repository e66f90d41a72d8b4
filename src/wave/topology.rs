//! Index buffer triangulation: two counter-clockwise triangles per grid quad.

/// Indices emitted per quad (2 triangles x 3)
pub const INDICES_PER_QUAD: u32 = 6;

/// Index sextuple for quad `(i, j)`, or `None` outside `[0, segment_count)`.
///
/// Winding is fixed for back-face culling:
/// `top_left, bottom_left, top_right, top_right, bottom_left, bottom_right`
pub fn quad_indices(i: u32, j: u32, segment_count: u32) -> Option<[u32; 6]> {
    if i >= segment_count || j >= segment_count {
        return None;
    }

    let width_vertex_count = segment_count + 1;
    let top_left = j * width_vertex_count + i;
    let top_right = top_left + 1;
    let bottom_left = top_left + width_vertex_count;
    let bottom_right = bottom_left + 1;

    Some([
        top_left,
        bottom_left,
        top_right,
        top_right,
        bottom_left,
        bottom_right,
    ])
}

/// Topology kernel body for one thread: write quad `(i, j)` at `(j * n + i) * 6`.
///
/// Returns whether a write happened. Threads outside the quad grid or whose
/// sextuple would run past the end of `out` write nothing.
pub fn write_quad(i: u32, j: u32, segment_count: u32, out: &mut [u32]) -> bool {
    let Some(quad) = quad_indices(i, j, segment_count) else {
        return false;
    };

    let base = (j as usize * segment_count as usize + i as usize) * INDICES_PER_QUAD as usize;
    match out.get_mut(base..base + INDICES_PER_QUAD as usize) {
        Some(slot) => {
            slot.copy_from_slice(&quad);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(segment_count: u32) -> Vec<u32> {
        let mut out = vec![u32::MAX; (segment_count * segment_count * INDICES_PER_QUAD) as usize];
        for j in 0..segment_count {
            for i in 0..segment_count {
                assert!(write_quad(i, j, segment_count, &mut out));
            }
        }
        out
    }

    #[test]
    fn test_first_quad_winding() {
        assert_eq!(quad_indices(0, 0, 2), Some([0, 3, 1, 1, 3, 4]));
    }

    #[test]
    fn test_quad_offsets() {
        let out = build(2);
        // Quad (1, 1) lives at (1 * 2 + 1) * 6
        assert_eq!(&out[18..24], &[4, 7, 5, 5, 7, 8]);
    }

    #[test]
    fn test_every_index_references_a_vertex() {
        for n in 1..=9 {
            let out = build(n);
            let vertex_count = (n + 1) * (n + 1);

            assert_eq!(out.len() as u32, n * n * 6);
            assert!(out.iter().all(|&index| index < vertex_count));
        }
    }

    #[test]
    fn test_triangles_are_counter_clockwise_seen_from_above() {
        // Grid rows grow along +Z, so CCW from +Y means a negative XZ cross product
        let n = 3;
        let out = build(n);
        let pos = |index: u32| {
            let i = (index % (n + 1)) as f32;
            let j = (index / (n + 1)) as f32;
            (i, j)
        };

        for tri in out.chunks(3) {
            let (ax, az) = pos(tri[0]);
            let (bx, bz) = pos(tri[1]);
            let (cx, cz) = pos(tri[2]);
            let cross = (bx - ax) * (cz - az) - (bz - az) * (cx - ax);
            assert!(cross < 0.0, "triangle {:?} has inconsistent winding", tri);
        }
    }

    #[test]
    fn test_boundary_quads_skipped() {
        let mut out = vec![u32::MAX; 24];

        assert!(!write_quad(2, 0, 2, &mut out));
        assert!(!write_quad(0, 2, 2, &mut out));
        assert!(out.iter().all(|&index| index == u32::MAX));
    }

    #[test]
    fn test_zero_segments_write_nothing() {
        let mut out = vec![u32::MAX; 6];

        assert_eq!(quad_indices(0, 0, 0), None);
        assert!(!write_quad(0, 0, 0, &mut out));
    }

    #[test]
    fn test_write_respects_buffer_end() {
        let mut out = vec![0; 8];

        assert!(write_quad(0, 0, 2, &mut out));
        assert!(!write_quad(1, 0, 2, &mut out));
    }
}
