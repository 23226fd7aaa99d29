use log::{debug, info};
use ndarray::Array2;
use std::borrow::Cow;
use thiserror::Error;
use wgpu::{PollType, util::DeviceExt};

use crate::enums::{ProjectionAxis, ReductionMode};
use crate::volume::VolumeBuffer;
use crate::window::WindowSpec;

const WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Could not open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Volume needs {bytes} bytes but the device allows {limit} per buffer")]
    VolumeTooLarge { bytes: u64, limit: u64 },

    #[error("Could not map output buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Output buffer mapping was cancelled")]
    MapCancelled,
}

pub struct WGPU {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl WGPU {
    /// Opens the default high-performance adapter with its full limits
    pub async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await?;
        let info = adapter.get_info();
        info!("Using GPU adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Projection Device"),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await?;
        Ok(Self { device, queue })
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    output_width: u32,
    output_height: u32,
    ray_length: u32,
    mode: u32,
    stride_i: u32,
    stride_j: u32,
    stride_k: u32,
    _padding0: u32,
    low: f32,
    high: f32,
    _padding1: u32,
    _padding2: u32,
}

/// Linear-index strides of `(i, j, k)` for an `[x, y, z]` standard-layout volume
fn ray_strides(axis: ProjectionAxis, dim: (usize, usize, usize)) -> (u32, u32, u32) {
    let (_, height, depth) = dim;
    let (x, y, z) = ((height * depth) as u32, depth as u32, 1);
    match axis {
        ProjectionAxis::AlongZ => (x, y, z),
        ProjectionAxis::AlongY => (x, z, y),
        ProjectionAxis::AlongX => (y, z, x),
    }
}

/// Packs two voxels per word, lower half first, padding an odd tail with zero.
fn pack_voxels(volume: &VolumeBuffer) -> Vec<u32> {
    let voxels: Vec<i16> = volume.data().iter().copied().collect();
    voxels
        .chunks(2)
        .map(|pair| {
            let low = pair[0] as u16 as u32;
            let high = pair.get(1).map_or(0, |&v| v as u16 as u32);
            low | (high << 16)
        })
        .collect()
}

/// Extremum projection on the GPU. The volume is uploaded once on
/// construction and reused by every [`GpuProjector::project`] call.
pub struct GpuProjector {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    volume_buffer: wgpu::Buffer,
    dimensions: (usize, usize, usize), // (width, height, depth)
}

impl GpuProjector {
    pub fn new(volume: &VolumeBuffer, wgpu: &WGPU) -> Result<Self, GpuError> {
        let WGPU { device, queue } = wgpu;
        let dimensions = volume.dimensions();

        let packed = pack_voxels(volume);
        let bytes = (packed.len() * std::mem::size_of::<u32>()) as u64;
        let limits = device.limits();
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if bytes > limit {
            return Err(GpuError::VolumeTooLarge { bytes, limit });
        }

        let volume_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Volume Buffer"),
            contents: bytemuck::cast_slice(&packed),
            usage: wgpu::BufferUsages::STORAGE,
        });
        debug!("Uploaded {bytes} bytes of volume data {dimensions:?}");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Projection Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/projection.wgsl"
            ))),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Projection Bind Group Layout"),
            entries: &[
                // Packed volume
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Output buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Projection Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Projection Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            bind_group_layout,
            volume_buffer,
            dimensions,
        })
    }

    /// Runs one dispatch and blocks until the result is mapped back.
    ///
    /// Returns the gray values indexed `[i, j]` like the CPU path.
    pub fn project(
        &self,
        axis: ProjectionAxis,
        mode: ReductionMode,
        window: &WindowSpec,
    ) -> Result<Array2<u8>, GpuError> {
        let (output_width, output_height) = axis.output_shape(self.dimensions);
        let (stride_i, stride_j, stride_k) = ray_strides(axis, self.dimensions);
        let uniforms = Uniforms {
            output_width: output_width as u32,
            output_height: output_height as u32,
            ray_length: axis.ray_length(self.dimensions) as u32,
            mode: match mode {
                ReductionMode::Maximum => 0,
                ReductionMode::Minimum => 1,
            },
            stride_i,
            stride_j,
            stride_k,
            _padding0: 0,
            low: window.low() as f32,
            high: window.high() as f32,
            _padding1: 0,
            _padding2: 0,
        };
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let output_size = output_width * output_height;
        let output_bytes = (output_size * std::mem::size_of::<u32>()) as u64;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: output_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: output_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Projection Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.volume_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Projection Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Projection Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            let dispatch_x = (output_width as u32).div_ceil(WORKGROUP_SIZE);
            let dispatch_y = (output_height as u32).div_ceil(WORKGROUP_SIZE);
            compute_pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_bytes);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        futures::executor::block_on(receiver).map_err(|_| GpuError::MapCancelled)??;

        let data = buffer_slice.get_mapped_range();
        let u32_data: &[u32] = bytemuck::cast_slice(&data);
        // The shader writes row-major (j, i); the engine stores [i, j].
        let gray: Array2<u8> = Array2::from_shape_fn((output_width, output_height), |(i, j)| {
            u32_data[j * output_width + i] as u8
        });

        drop(data);
        staging_buffer.unmap();
        Ok(gray)
    }
}
