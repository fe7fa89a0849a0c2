// SPDX-License-Identifier: GPL-3.0-only
//! GPU engine: wgpu compute shaders over device-resident buffers
//!
//! Layers live in one storage buffer of packed RGBA8 texels
//! (`width * height * capacity` u32s), the aggregate in a `vec4<f32>` buffer
//! that persists across frames, and the output in a packed u32 buffer. Host
//! copies are read back through staging buffers: the aggregate only when the
//! exposure stage needs it, the output every frame.

use super::{ComputeEngine, EngineKind, unallocated, zeroed};
use crate::config::AggregationPolicy;
use crate::constants::{BYTES_PER_PIXEL, gpu::WORKGROUP_SIZE};
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::helpers::{self, BindingKind};
use crate::gpu::{self, GpuDeviceInfo};
use crate::kernels::ToneTransform;
use crate::pixel::Rgba;
use crate::ring_buffer::RingCursor;
use crate::shaders::{self, KernelParams};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Buffer usage patterns for GPU memory allocation
#[derive(Debug, Clone, Copy)]
enum BufferKind {
    /// Read/write storage buffer that can be copied to/from
    Storage,
    /// Uniform buffer for shader parameters
    Uniform,
    /// Staging buffer for GPU-to-CPU readback
    Staging,
}

/// Everything sized by the current frame shape
struct GpuResources {
    width: u32,
    height: u32,
    cursor: RingCursor,
    layers: wgpu::Buffer,
    aggregate: wgpu::Buffer,
    output: wgpu::Buffer,
    aggregate_params: wgpu::Buffer,
    tonemap_params: wgpu::Buffer,
    aggregate_staging: wgpu::Buffer,
    output_staging: wgpu::Buffer,
    aggregate_bind_group: wgpu::BindGroup,
    tonemap_bind_group: wgpu::BindGroup,
    /// Host mirror of `aggregate`, refreshed by `aggregate_snapshot`
    roi_scratch: Vec<Rgba>,
    /// Host copy of `output`, refreshed by `tone_map`
    output_host: Vec<u8>,
}

impl GpuResources {
    fn layer_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * BYTES_PER_PIXEL as u64
    }

    fn aggregate_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * std::mem::size_of::<Rgba>() as u64
    }

    fn workgroups(&self) -> (u32, u32, u32) {
        (
            helpers::compute_dispatch_size(self.width, WORKGROUP_SIZE),
            helpers::compute_dispatch_size(self.height, WORKGROUP_SIZE),
            1,
        )
    }
}

pub struct GpuEngine {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
    aggregate_pipeline: wgpu::ComputePipeline,
    tonemap_pipeline: wgpu::ComputePipeline,
    aggregate_layout: wgpu::BindGroupLayout,
    tonemap_layout: wgpu::BindGroupLayout,
    resources: Option<GpuResources>,
}

impl GpuEngine {
    /// Create the device and compile both kernels; no frame resources yet
    pub async fn new() -> PipelineResult<Self> {
        info!("Initializing GPU frame engine");

        let (device, queue, info) = gpu::create_compute_device("lowlight_engine_gpu").await?;

        info!(
            adapter_name = %info.adapter_name,
            adapter_backend = ?info.backend,
            "GPU device created for frame engine"
        );

        let aggregate_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("aggregate_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::AGGREGATE_SHADER.into()),
        });
        let tonemap_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tonemap_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::TONEMAP_SHADER.into()),
        });

        let aggregate_layout = {
            use BindingKind::*;
            helpers::create_layout(
                &device,
                "aggregate_layout",
                &[StorageRead, StorageReadWrite, Uniform],
            )
        };
        let tonemap_layout = {
            use BindingKind::*;
            helpers::create_layout(
                &device,
                "tonemap_layout",
                &[StorageRead, StorageReadWrite, Uniform],
            )
        };

        let aggregate_pipeline = helpers::create_pipeline(
            &device,
            "aggregate_pipeline",
            &aggregate_layout,
            &aggregate_module,
            shaders::AGGREGATE_ENTRY,
        );
        let tonemap_pipeline = helpers::create_pipeline(
            &device,
            "tonemap_pipeline",
            &tonemap_layout,
            &tonemap_module,
            shaders::TONEMAP_ENTRY,
        );

        Ok(Self {
            device,
            queue,
            info,
            aggregate_pipeline,
            tonemap_pipeline,
            aggregate_layout,
            tonemap_layout,
            resources: None,
        })
    }

    /// Create a GPU buffer with the specified usage pattern
    fn create_buffer(&self, label: &str, size: u64, kind: BufferKind) -> wgpu::Buffer {
        let usage = match kind {
            BufferKind::Storage => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            BufferKind::Staging => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        };
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Reject shapes the device cannot bind before creating anything
    fn check_binding_size(&self, label: &str, size: u64) -> PipelineResult<()> {
        if size > self.info.max_storage_binding {
            return Err(PipelineError::ResourceAllocation(format!(
                "{} needs {} bytes, device limit is {}",
                label, size, self.info.max_storage_binding
            )));
        }
        Ok(())
    }

    /// Buffers and bind groups for one frame shape
    ///
    /// Call inside an error scope; failures surface there, not here.
    fn create_resources(
        &self,
        width: u32,
        height: u32,
        capacity: usize,
        layers_bytes: u64,
        roi_scratch: Vec<Rgba>,
        output_host: Vec<u8>,
    ) -> GpuResources {
        let pixels = width as u64 * height as u64;
        let layer_bytes = pixels * BYTES_PER_PIXEL as u64;
        let aggregate_bytes = pixels * std::mem::size_of::<Rgba>() as u64;

        // New buffers are zero-initialized, so the first frame warm-starts from zero
        let layers = self.create_buffer("layers_buffer", layers_bytes, BufferKind::Storage);
        let aggregate = self.create_buffer("aggregate_buffer", aggregate_bytes, BufferKind::Storage);
        let output = self.create_buffer("output_buffer", layer_bytes, BufferKind::Storage);
        let params_size = std::mem::size_of::<KernelParams>() as u64;
        let aggregate_params =
            self.create_buffer("aggregate_params", params_size, BufferKind::Uniform);
        let tonemap_params = self.create_buffer("tonemap_params", params_size, BufferKind::Uniform);
        let aggregate_staging =
            self.create_buffer("aggregate_staging", aggregate_bytes, BufferKind::Staging);
        let output_staging = self.create_buffer("output_staging", layer_bytes, BufferKind::Staging);

        let aggregate_bind_group = helpers::bind_buffers(
            &self.device,
            "aggregate_bind_group",
            &self.aggregate_layout,
            &[&layers, &aggregate, &aggregate_params],
        );
        let tonemap_bind_group = helpers::bind_buffers(
            &self.device,
            "tonemap_bind_group",
            &self.tonemap_layout,
            &[&aggregate, &output, &tonemap_params],
        );

        GpuResources {
            width,
            height,
            cursor: RingCursor::new(capacity),
            layers,
            aggregate,
            output,
            aggregate_params,
            tonemap_params,
            aggregate_staging,
            output_staging,
            aggregate_bind_group,
            tonemap_bind_group,
            roi_scratch,
            output_host,
        }
    }

    /// Dispatch a single compute pass with the given pipeline and bind group
    fn dispatch_compute(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups: (u32, u32, u32),
    ) -> PipelineResult<()> {
        let ((), error) = helpers::capture_errors(&self.device, || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, Some(bind_group), &[]);
                pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        });
        match error {
            Some(e) => Err(PipelineError::Gpu(format!("{}: {}", label, e))),
            None => Ok(()),
        }
    }
}

impl ComputeEngine for GpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gpu
    }

    fn allocate(&mut self, width: u32, height: u32, capacity: usize) -> PipelineResult<()> {
        self.resources = None;

        let pixels = width as u64 * height as u64;
        let layer_bytes = pixels * BYTES_PER_PIXEL as u64;
        let layers_bytes = layer_bytes
            .checked_mul(capacity as u64)
            .ok_or_else(|| PipelineError::ResourceAllocation("layer store overflows".into()))?;
        let aggregate_bytes = pixels * std::mem::size_of::<Rgba>() as u64;

        self.check_binding_size("layer ring buffer", layers_bytes)?;
        self.check_binding_size("aggregate estimate", aggregate_bytes)?;

        debug!(width, height, capacity, layers_bytes, "Allocating GPU engine resources");

        let roi_scratch = zeroed(pixels as usize, "ROI scratch")?;
        let output_host = zeroed(layer_bytes as usize, "host output")?;

        let (resources, error) = helpers::capture_errors(&self.device, || {
            self.create_resources(width, height, capacity, layers_bytes, roi_scratch, output_host)
        });
        if let Some(e) = error {
            warn!(width, height, capacity, error = %e, "GPU resource allocation failed");
            return Err(PipelineError::ResourceAllocation(format!(
                "GPU buffers for {}x{}x{}: {}",
                width, height, capacity, e
            )));
        }

        self.resources = Some(resources);
        Ok(())
    }

    fn release(&mut self) {
        self.resources = None;
    }

    fn cursor(&self) -> Option<&RingCursor> {
        self.resources.as_ref().map(|r| &r.cursor)
    }

    fn write_layer(&mut self, layer: &[u8]) -> PipelineResult<usize> {
        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        let expected = resources.layer_bytes();
        if layer.len() as u64 != expected {
            return Err(PipelineError::InvalidInputSize {
                expected: expected as usize,
                actual: layer.len(),
            });
        }

        let slot = resources.cursor.write_index();
        let queue = &self.queue;
        let ((), error) = helpers::capture_errors(&self.device, || {
            queue.write_buffer(&resources.layers, slot as u64 * expected, layer);
        });
        if let Some(e) = error {
            return Err(PipelineError::Gpu(format!("layer upload: {}", e)));
        }
        resources.cursor.advance();
        Ok(slot)
    }

    fn aggregate(&mut self, policy: AggregationPolicy, epsilon: f32) -> PipelineResult<()> {
        let resources = self.resources.as_ref().ok_or_else(unallocated)?;
        let params = KernelParams {
            width: resources.width,
            height: resources.height,
            num_layers: resources.cursor.active_count() as u32,
            policy: match policy {
                AggregationPolicy::WeightedRobust => 0,
                AggregationPolicy::PlainAverage => 1,
            },
            epsilon,
            ..Default::default()
        };
        self.queue.write_buffer(
            &resources.aggregate_params,
            0,
            bytemuck::bytes_of(&params),
        );
        self.dispatch_compute(
            "aggregate_pass",
            &self.aggregate_pipeline,
            &resources.aggregate_bind_group,
            resources.workgroups(),
        )
    }

    fn aggregate_snapshot(&mut self) -> PipelineResult<&[Rgba]> {
        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        let bytes = pollster::block_on(helpers::read_buffer_async(
            &self.device,
            &self.queue,
            &resources.aggregate,
            &resources.aggregate_staging,
            resources.aggregate_bytes(),
        ))?;
        // Staging bytes carry no alignment guarantee
        for (texel, chunk) in resources
            .roi_scratch
            .iter_mut()
            .zip(bytes.chunks_exact(std::mem::size_of::<Rgba>()))
        {
            *texel = bytemuck::pod_read_unaligned(chunk);
        }
        Ok(&resources.roi_scratch)
    }

    fn tone_map(&mut self, transform: ToneTransform) -> PipelineResult<&[u8]> {
        let resources = self.resources.as_ref().ok_or_else(unallocated)?;
        let params = KernelParams {
            width: resources.width,
            height: resources.height,
            mode: transform.mode(),
            factor: transform.factor(),
            ..Default::default()
        };
        self.queue
            .write_buffer(&resources.tonemap_params, 0, bytemuck::bytes_of(&params));
        self.dispatch_compute(
            "tonemap_pass",
            &self.tonemap_pipeline,
            &resources.tonemap_bind_group,
            resources.workgroups(),
        )?;

        let bytes = pollster::block_on(helpers::read_buffer_async(
            &self.device,
            &self.queue,
            &resources.output,
            &resources.output_staging,
            resources.layer_bytes(),
        ))?;

        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        resources.output_host.copy_from_slice(&bytes);
        Ok(&resources.output_host)
    }
}
