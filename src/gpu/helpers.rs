// SPDX-License-Identifier: GPL-3.0-only
//
// Shared GPU helper utilities for the compute engine
//
// Bind group layouts here are plain buffer bindings numbered in order, so a
// layout is fully described by its list of binding kinds.

use crate::errors::{PipelineError, PipelineResult};

/// Buffer binding type for bind group layout creation
#[derive(Clone, Copy, Debug)]
pub enum BindingKind {
    /// Read-only storage buffer
    StorageRead,
    /// Read-write storage buffer
    StorageReadWrite,
    /// Uniform buffer
    Uniform,
}

/// Create a bind group layout entry with common defaults
pub fn layout_entry(binding: u32, kind: BindingKind) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        BindingKind::StorageRead => wgpu::BufferBindingType::Storage { read_only: true },
        BindingKind::StorageReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
        BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Create a bind group layout from a specification of binding kinds
pub fn create_layout(
    device: &wgpu::Device,
    label: &str,
    bindings: &[BindingKind],
) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = bindings
        .iter()
        .enumerate()
        .map(|(i, kind)| layout_entry(i as u32, *kind))
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Bind `buffers` to bindings 0, 1, 2, ... of `layout`
pub fn bind_buffers(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let entries: Vec<_> = buffers
        .iter()
        .enumerate()
        .map(|(i, buf)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: buf.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// Single-layout compute pipeline for one WGSL entry point
pub fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Calculate compute shader dispatch size (workgroups needed)
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size)
}

/// Run `f` with out-of-memory and validation errors captured instead of
/// reaching the device's uncaptured-error handler
///
/// Returns the first error caught, out-of-memory taking precedence.
pub fn capture_errors<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = f();
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());
    (value, out_of_memory.or(validation))
}

/// Copy `size` bytes of `src` into `staging` and map it for reading
///
/// Blocks until the GPU has finished every submission up to the copy.
pub async fn read_buffer_async(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    staging: &wgpu::Buffer,
    size: u64,
) -> PipelineResult<Vec<u8>> {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(src, 0, staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..size);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| PipelineError::Gpu(format!("device poll failed: {:?}", e)))?;

    receiver
        .await
        .map_err(|_| PipelineError::Gpu("buffer mapping callback dropped".to_string()))?
        .map_err(|e| PipelineError::Gpu(format!("failed to map buffer: {}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    staging.unmap();

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_dispatch_size() {
        assert_eq!(compute_dispatch_size(640, 16), 40);
        assert_eq!(compute_dispatch_size(641, 16), 41);
        assert_eq!(compute_dispatch_size(16, 16), 1);
        assert_eq!(compute_dispatch_size(1, 16), 1);
    }

    #[test]
    fn test_capture_errors_catches_invalid_buffer() {
        let (device, _queue, _info) =
            match pollster::block_on(crate::gpu::create_compute_device("capture_errors_test")) {
                Ok(created) => created,
                Err(e) => {
                    eprintln!("Skipping error scope test: {}", e);
                    return;
                }
            };

        let (_, error) = capture_errors(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("valid"),
                size: 256,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });
        assert!(error.is_none());

        // MAP_READ may only be combined with COPY_DST
        let (_, error) = capture_errors(&device, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("invalid"),
                size: 256,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(matches!(error, Some(wgpu::Error::Validation { .. })));
    }

    #[test]
    fn test_layout_entry_kinds() {
        let entry = layout_entry(2, BindingKind::Uniform);
        assert_eq!(entry.binding, 2);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));
    }
}
