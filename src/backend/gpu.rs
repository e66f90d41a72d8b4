//! wgpu compute backend and GPU-resident mesh buffers.

use std::sync::{mpsc, Arc};

use log::{error, info};

use super::shader::{ShaderReflection, WAVE_SHADER};
use super::{BufferOwner, ComputeBackend, Kernel};
use crate::error::{ConfigError, FrameError};
use crate::params::{ThreadGroupExtent, WaveMeshConfig};
use crate::wave::{Dispatch, GridExtent, MeshPart, MeshVertex, VertexLayout, WaveParameters};

/// Device and queue shared by the compute backend and the mesh buffers
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_name: String,
}

impl GpuContext {
    /// Open a device without a presentation surface
    pub async fn headless() -> Result<Self, ConfigError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| ConfigError::Device("no suitable GPU adapter".to_string()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Wave Mesh Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| ConfigError::Device(format!("failed to request device: {}", e)))?;

        // Frame-time validation errors would otherwise panic
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| error!("wgpu: {}", e)));

        let adapter_name = adapter.get_info().name;
        info!("GPU adapter: {}", adapter_name);

        Ok(Self {
            device,
            queue,
            adapter_name,
        })
    }

    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            adapter_name: String::from("external"),
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Copy the first `len` bytes of `buffer` back to the host, blocking until done.
    fn read_back(&self, buffer: &wgpu::Buffer, len: u64) -> Result<Vec<u8>, FrameError> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wave Readback Buffer"),
            size: len,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Wave Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, len);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| FrameError::Submission("readback callback dropped".to_string()))?
            .map_err(|e| FrameError::Submission(format!("readback map failed: {}", e)))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

/// Double-buffered vertex storage plus one index buffer, all fixed capacity
pub struct GpuMeshBuffers {
    context: Arc<GpuContext>,
    vertex_buffers: [Arc<wgpu::Buffer>; 2],
    index_buffer: Arc<wgpu::Buffer>,
    front: usize,
    parts: Vec<MeshPart>,
    staged_parts: Option<Vec<MeshPart>>,
    vertex_capacity: u64,
    index_capacity: u64,
}

impl GpuMeshBuffers {
    pub fn new(context: Arc<GpuContext>, config: &WaveMeshConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        // Kernel writes, host record and render pipeline must read the same bytes
        MeshVertex::LAYOUT.validate(&ShaderReflection::wave()?.vertex_layout()?)?;
        MeshVertex::LAYOUT.validate(&VertexLayout::from_wgpu(&MeshVertex::buffer_layout())?)?;

        let vertex_capacity = config.vertex_capacity();
        let index_capacity = config.index_capacity();
        let vertex_bytes = vertex_capacity * std::mem::size_of::<MeshVertex>() as u64;
        let index_bytes = index_capacity * std::mem::size_of::<u32>() as u64;

        let limits = context.device.limits();
        let max_binding = limits.max_storage_buffer_binding_size as u64;
        if vertex_bytes.max(index_bytes) > max_binding.min(limits.max_buffer_size) {
            return Err(ConfigError::Device(format!(
                "mesh buffers of {} / {} bytes exceed storage binding limit of {} bytes",
                vertex_bytes, index_bytes, max_binding
            )));
        }

        let create_vertices = |label: &str| {
            Arc::new(context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: vertex_bytes,
                usage: wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }))
        };
        let vertex_buffers = [
            create_vertices("Wave Vertex Buffer A"),
            create_vertices("Wave Vertex Buffer B"),
        ];

        let index_buffer = Arc::new(context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wave Index Buffer"),
            size: index_bytes,
            usage: wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));

        info!(
            "Allocated wave mesh buffers: {} vertices x2, {} indices",
            vertex_capacity, index_capacity
        );

        Ok(Self {
            context,
            vertex_buffers,
            index_buffer,
            front: 0,
            parts: Vec::new(),
            staged_parts: None,
            vertex_capacity,
            index_capacity,
        })
    }

    /// Vertex buffer safe to bind for rendering
    pub fn front_vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffers[self.front]
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// Read back the first `count` visible vertices (blocks on the device)
    pub fn read_front_vertices(&self, count: u32) -> Result<Vec<MeshVertex>, FrameError> {
        let count = (count as u64).min(self.vertex_capacity);
        let bytes = self.context.read_back(
            self.front_vertex_buffer(),
            count * std::mem::size_of::<MeshVertex>() as u64,
        )?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<MeshVertex>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Read back the first `count` indices (blocks on the device)
    pub fn read_indices(&self, count: u32) -> Result<Vec<u32>, FrameError> {
        let count = (count as u64).min(self.index_capacity);
        let bytes = self
            .context
            .read_back(&self.index_buffer, count * std::mem::size_of::<u32>() as u64)?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<u32>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

impl BufferOwner for GpuMeshBuffers {
    type VertexRegion = Arc<wgpu::Buffer>;
    type IndexRegion = Arc<wgpu::Buffer>;

    fn vertex_capacity(&self) -> u64 {
        self.vertex_capacity
    }

    fn index_capacity(&self) -> u64 {
        self.index_capacity
    }

    fn acquire_vertices(&mut self) -> Result<Arc<wgpu::Buffer>, FrameError> {
        Ok(Arc::clone(&self.vertex_buffers[1 - self.front]))
    }

    fn acquire_indices(&mut self) -> Result<Arc<wgpu::Buffer>, FrameError> {
        Ok(Arc::clone(&self.index_buffer))
    }

    fn replace_parts(&mut self, parts: Vec<MeshPart>) {
        self.staged_parts = Some(parts);
    }

    fn complete(&mut self) {
        // Queue ordering keeps later render submissions behind the compute work
        self.front = 1 - self.front;
        if let Some(parts) = self.staged_parts.take() {
            self.parts = parts;
        }
    }

    fn discard(&mut self) {
        self.staged_parts = None;
    }
}

/// Compute pipelines for the two wave kernels
pub struct GpuCompute {
    context: Arc<GpuContext>,
    vertex_pipeline: wgpu::ComputePipeline,
    index_pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    /// `@workgroup_size` declared by both kernels
    thread_group: ThreadGroupExtent,
}

impl GpuCompute {
    /// Compile `wave.wgsl` and build one pipeline per kernel.
    ///
    /// Fails if the shader does not validate or an entry point is missing.
    pub fn new(context: Arc<GpuContext>) -> Result<Self, ConfigError> {
        let reflection = ShaderReflection::wave()?;
        for kernel in Kernel::ALL {
            if !reflection.has_kernel(kernel) {
                return Err(ConfigError::MissingKernel(kernel.entry_point()));
            }
        }
        let thread_group = reflection.thread_group()?;

        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Wave Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(WAVE_SHADER.into()),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ConfigError::Shader(e.to_string()));
        }

        let vertex_pipeline = Self::create_pipeline(device, &shader, Kernel::VertexUpdate)?;
        let index_pipeline = Self::create_pipeline(device, &shader, Kernel::IndexUpdate)?;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wave Parameters Buffer"),
            size: std::mem::size_of::<WaveParameters>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        info!(
            "Wave compute pipelines ready ({}x{} thread groups)",
            thread_group.width, thread_group.height
        );

        Ok(Self {
            context,
            vertex_pipeline,
            index_pipeline,
            params_buffer,
            thread_group,
        })
    }

    fn create_pipeline(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        kernel: Kernel,
    ) -> Result<wgpu::ComputePipeline, ConfigError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel.entry_point()),
            layout: None,
            module: shader,
            entry_point: Some(kernel.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(e) => {
                error!("Pipeline for {} failed: {}", kernel.entry_point(), e);
                Err(ConfigError::MissingKernel(kernel.entry_point()))
            }
            None => Ok(pipeline),
        }
    }

    /// Group counts for a dispatch; WebGPU only launches whole groups
    fn group_count(
        dispatch: Dispatch,
        compiled: ThreadGroupExtent,
    ) -> Result<GridExtent, FrameError> {
        match dispatch {
            Dispatch::Groups { count, group } if group == compiled => Ok(count),
            Dispatch::Groups { .. } => Err(FrameError::UnsupportedDispatch("thread-group size")),
            Dispatch::Threads { .. } => Err(FrameError::UnsupportedDispatch("non-uniform")),
        }
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        kernel: Kernel,
        target: &wgpu::Buffer,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError> {
        let count = Self::group_count(dispatch, self.thread_group)?;
        if count.is_empty() {
            return Ok(());
        }

        let (pipeline, target_binding, label) = match kernel {
            Kernel::VertexUpdate => (&self.vertex_pipeline, 1, "Wave Vertex Pass"),
            Kernel::IndexUpdate => (&self.index_pipeline, 2, "Wave Index Pass"),
        };

        // Staged write lands before this batch's command buffer executes
        self.context
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: target_binding,
                        resource: target.as_entire_binding(),
                    },
                ],
            });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(count.width, count.height, 1);

        Ok(())
    }
}

impl ComputeBackend<GpuMeshBuffers> for GpuCompute {
    type Batch = wgpu::CommandEncoder;

    fn has_kernel(&self, _kernel: Kernel) -> bool {
        // Both pipelines are validated in `new`
        true
    }

    fn supports_nonuniform_dispatch(&self) -> bool {
        false
    }

    fn compiled_thread_group(&self) -> Option<ThreadGroupExtent> {
        Some(self.thread_group)
    }

    fn begin_batch(&mut self) -> Result<wgpu::CommandEncoder, FrameError> {
        Ok(self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Wave Compute Encoder"),
            }))
    }

    fn dispatch_vertices(
        &mut self,
        batch: &mut wgpu::CommandEncoder,
        target: &Arc<wgpu::Buffer>,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError> {
        self.encode(batch, Kernel::VertexUpdate, target, params, dispatch)
    }

    fn dispatch_indices(
        &mut self,
        batch: &mut wgpu::CommandEncoder,
        target: &Arc<wgpu::Buffer>,
        params: &WaveParameters,
        dispatch: Dispatch,
    ) -> Result<(), FrameError> {
        self.encode(batch, Kernel::IndexUpdate, target, params, dispatch)
    }

    fn submit(&mut self, batch: wgpu::CommandEncoder) -> Result<(), FrameError> {
        self.context.queue.submit(std::iter::once(batch.finish()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_dispatch_required() {
        let exact = Dispatch::Threads {
            extent: GridExtent::square(65),
            group: ThreadGroupExtent::DEFAULT,
        };
        assert_eq!(
            GpuCompute::group_count(exact, ThreadGroupExtent::DEFAULT),
            Err(FrameError::UnsupportedDispatch("non-uniform"))
        );

        let groups = Dispatch::Groups {
            count: GridExtent::square(9),
            group: ThreadGroupExtent::DEFAULT,
        };
        assert_eq!(
            GpuCompute::group_count(groups, ThreadGroupExtent::DEFAULT),
            Ok(GridExtent::square(9))
        );
    }

    #[test]
    fn test_foreign_group_size_rejected() {
        let groups = Dispatch::Groups {
            count: GridExtent::square(4),
            group: ThreadGroupExtent {
                width: 16,
                height: 16,
            },
        };
        assert!(GpuCompute::group_count(groups, ThreadGroupExtent::DEFAULT).is_err());
    }
}
