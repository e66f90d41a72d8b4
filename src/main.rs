//! Wavemesh - headless driver for the procedural wave mesh engine
//!
//! Runs the frame loop a presentation layer would run, without a window,
//! and reports what the engine produced.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};

use cli::{Args, BackendKind};
use wavemesh::backend::cpu::{CpuCompute, CpuMesh};
use wavemesh::backend::gpu::{GpuCompute, GpuContext, GpuMeshBuffers};
use wavemesh::backend::{BufferOwner, ComputeBackend};
use wavemesh::{ConfigError, FrameStatus, MeshVertex, WaveMeshController};

/// Frame loop results
#[derive(Debug, Default)]
struct RunSummary {
    updated: u32,
    skipped: u32,
    topology_rebuilds: u32,
    wall_time: Duration,
}

impl RunSummary {
    fn print(&self, controller: &WaveMeshController, centre: Option<MeshVertex>) {
        let frames = (self.updated + self.skipped).max(1);
        println!("\nFrames updated:     {}", self.updated);
        println!("Frames skipped:     {}", self.skipped);
        println!("Topology rebuilds:  {}", self.topology_rebuilds);
        println!(
            "Avg submit time:    {:.3} ms",
            self.wall_time.as_secs_f64() * 1000.0 / frames as f64
        );
        println!(
            "Active mesh:        {} vertices, {} indices",
            controller.active_vertex_count(),
            controller.active_index_count()
        );
        println!("Simulated time:     {:.3} s", controller.elapsed_time());
        if let Some(vertex) = centre {
            println!(
                "Centre vertex:      pos {:?} normal {:?} uv {:?}",
                vertex.position, vertex.normal, vertex.uv
            );
        }
    }
}

/// Linear index of the vertex nearest the grid centre
fn centre_index(segment_count: u32) -> u32 {
    let half = segment_count / 2;
    half * (segment_count + 1) + half
}

fn run_frames<O, C>(
    args: &Args,
    controller: &mut WaveMeshController,
    backend: &mut C,
    owner: &mut O,
) -> RunSummary
where
    O: BufferOwner,
    C: ComputeBackend<O>,
{
    let mut summary = RunSummary::default();
    let start = Instant::now();

    for frame in 0..args.frames {
        if let Some(segments) = args.segments_for_frame(frame) {
            info!("Frame {}: resizing grid to {} segments", frame, segments);
            controller.set_segment_count(segments);
        }

        match controller.advance(args.dt, backend, owner) {
            FrameStatus::Updated { topology_rebuilt } => {
                summary.updated += 1;
                if topology_rebuilt {
                    summary.topology_rebuilds += 1;
                }
            }
            FrameStatus::Skipped(_) => summary.skipped += 1,
        }
    }

    summary.wall_time = start.elapsed();
    summary
}

fn run_cpu(args: &Args) -> Result<(), ConfigError> {
    let config = args.wave_config();
    let mut mesh = CpuMesh::new(&config)?;
    let mut compute = CpuCompute::new();
    let mut controller = WaveMeshController::new(config, &compute, &mesh)?;

    let summary = run_frames(args, &mut controller, &mut compute, &mut mesh);

    let centre = centre_index(controller.segment_count()) as usize;
    let vertex = mesh.front_vertices().get(centre).copied();
    summary.print(&controller, vertex);

    let stats = compute.stats();
    println!(
        "Kernel work:        {} vertex / {} index dispatches, {} threads",
        stats.vertex_dispatches, stats.index_dispatches, stats.threads_launched
    );

    Ok(())
}

fn run_gpu(args: &Args) -> Result<(), ConfigError> {
    let config = args.wave_config();
    let context = Arc::new(pollster::block_on(GpuContext::headless())?);
    let mut buffers = GpuMeshBuffers::new(Arc::clone(&context), &config)?;
    let mut compute = GpuCompute::new(Arc::clone(&context))?;
    let mut controller = WaveMeshController::new(config, &compute, &buffers)?;

    let summary = run_frames(args, &mut controller, &mut compute, &mut buffers);
    context.device.poll(wgpu::Maintain::Wait);

    let centre = centre_index(controller.segment_count());
    let vertex = match buffers.read_front_vertices(centre + 1) {
        Ok(vertices) => vertices.last().copied(),
        Err(e) => {
            error!("Could not read back vertices: {}", e);
            None
        }
    };
    println!("GPU adapter:        {}", context.adapter_name());
    summary.print(&controller, vertex);

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    println!("Wavemesh - procedural wave surface");
    println!(
        "Backend: {:?}, {} segments, {} frames\n",
        args.backend, args.segments, args.frames
    );

    let result = match args.backend {
        BackendKind::Cpu => run_cpu(&args),
        BackendKind::Gpu => run_gpu(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Setup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
