// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for compute pipelines.
//!
//! Device creation and the small helpers shared by the GPU engine: bind
//! group layouts from binding kinds, dispatch sizing and buffer readback.

pub mod helpers;

use crate::errors::{PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Largest storage buffer a single binding may cover
    pub max_storage_binding: u64,
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

async fn request_adapter(instance: &wgpu::Instance) -> PipelineResult<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| PipelineError::DeviceUnavailable(format!("no suitable GPU adapter: {}", e)))
}

/// Describe the adapter a compute device would be created on, without creating it
pub async fn query_adapter() -> PipelineResult<wgpu::AdapterInfo> {
    let adapter = request_adapter(&instance()).await?;
    Ok(adapter.get_info())
}

/// Create a wgpu device and queue for compute work.
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
pub async fn create_compute_device(
    label: &str,
) -> PipelineResult<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo)> {
    info!(label = label, "Creating GPU device for compute");

    let adapter = request_adapter(&instance()).await?;
    let adapter_info = adapter.get_info();
    let adapter_limits = adapter.limits();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for compute"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter_limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| PipelineError::DeviceUnavailable(format!("failed to create GPU device: {}", e)))?;

    let max_storage_binding = (adapter_limits.max_storage_buffer_binding_size as u64)
        .min(adapter_limits.max_buffer_size);
    debug!(max_storage_binding, "GPU device limits");

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        max_storage_binding,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}
