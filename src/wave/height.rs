//! Closed-form radial wave height field.

use std::f32::consts::TAU;

use super::WaveParameters;

/// Central-difference step for normal estimation (model units).
/// Must match `NORMAL_EPSILON` in `wave.wgsl`.
pub const NORMAL_EPSILON: f32 = 0.01;

/// Surface height at planar position `(x, z)`.
///
/// Concentric rings travelling outward from the origin:
/// `amplitude * cos(-r * 2π * density + time)` with `r = sqrt(x² + z²)`.
/// Used for both the main sample and the finite-difference samples, so it
/// must stay the single source of truth for the CPU path.
#[inline]
pub fn height(x: f32, z: f32, params: &WaveParameters) -> f32 {
    let r = (x * x + z * z).sqrt();
    params.amplitude * (-r * TAU * params.density + params.time).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(amplitude: f32, density: f32, time: f32) -> WaveParameters {
        WaveParameters {
            segment_count: 8,
            time,
            density,
            amplitude,
        }
    }

    #[test]
    fn test_height_at_origin() {
        let p = params(0.1, 5.0, 0.0);
        assert_eq!(height(0.0, 0.0, &p), 0.1);
    }

    #[test]
    fn test_height_is_radially_symmetric() {
        let p = params(0.25, 3.0, 1.7);
        let a = height(0.3, 0.0, &p);
        let b = height(0.0, -0.3, &p);
        let c = height(-0.3, 0.0, &p);

        assert!((a - b).abs() < 1e-6);
        assert!((a - c).abs() < 1e-6);
    }

    #[test]
    fn test_height_bounded_by_amplitude() {
        let p = params(0.4, 7.0, 2.5);
        for step in 0..50 {
            let x = step as f32 * 0.02 - 0.5;
            assert!(height(x, 0.1, &p).abs() <= 0.4 + 1e-6);
        }
    }

    #[test]
    fn test_time_shifts_phase() {
        let p = params(1.0, 1.0, std::f32::consts::PI);
        // cos(pi) at the origin
        assert!((height(0.0, 0.0, &p) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_amplitude_is_flat() {
        let p = params(0.0, 5.0, 0.3);
        assert_eq!(height(0.2, -0.1, &p), 0.0);
    }
}
