//! Command-line argument parsing.

use clap::{Parser, ValueEnum};

use wavemesh::WaveMeshConfig;

/// Compute backend to drive the mesh with
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Host reference kernels
    Cpu,
    /// wgpu compute shaders
    Gpu,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "wavemesh")]
#[command(about = "Headless procedural wave mesh driver", long_about = None)]
pub struct Args {
    /// Compute backend: cpu (default) or gpu
    #[arg(long, value_enum, default_value = "cpu")]
    pub backend: BackendKind,

    /// Grid subdivisions per axis
    #[arg(long, value_name = "COUNT", default_value = "64")]
    pub segments: u32,

    /// Capacity ceiling for the grid (buffers are sized once for this)
    #[arg(long, value_name = "COUNT", default_value = "256")]
    pub max_segments: u32,

    /// Number of frames to simulate
    #[arg(long, value_name = "FRAMES", default_value = "600")]
    pub frames: u32,

    /// Frame delta (seconds)
    #[arg(long, value_name = "SECONDS", default_value = "0.016666")]
    pub dt: f32,

    /// Wave height (model units)
    #[arg(long, default_value = "0.1")]
    pub amplitude: f32,

    /// Spatial frequency (rings per model unit)
    #[arg(long, default_value = "5.0")]
    pub density: f32,

    /// Animation speed multiplier
    #[arg(long, default_value = "1.0")]
    pub speed: f32,

    /// Alternate between full and half resolution every N frames
    #[arg(long, value_name = "FRAMES")]
    pub resize_every: Option<u32>,
}

impl Args {
    /// Wave configuration from command-line values
    pub fn wave_config(&self) -> WaveMeshConfig {
        WaveMeshConfig {
            max_segment_count: self.max_segments,
            segment_count: self.segments,
            amplitude: self.amplitude,
            density: self.density,
            speed: self.speed,
            ..Default::default()
        }
    }

    /// New segment count to apply before `frame`, if a resize is due
    pub fn segments_for_frame(&self, frame: u32) -> Option<u32> {
        let every = self.resize_every.filter(|&n| n > 0)?;
        if frame == 0 || frame % every != 0 {
            return None;
        }

        // Odd cycles run at half resolution
        if (frame / every) % 2 == 1 {
            Some((self.segments / 2).max(1))
        } else {
            Some(self.segments)
        }
    }
}
