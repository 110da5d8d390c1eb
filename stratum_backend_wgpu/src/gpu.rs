// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device acquisition and the backend's error type.

use stratum_core::layer::SurfaceId;

/// Why the backend could not start or read pixels back.
#[derive(Debug, thiserror::Error)]
pub enum WgpuError {
    /// No adapter matched the request. Tests treat this as "skip".
    #[error("no GPU adapter available")]
    NoAdapter,
    /// The adapter request failed for another reason.
    #[error("adapter request failed: {0}")]
    Adapter(#[source] wgpu::RequestAdapterError),
    /// The device request failed.
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// Frame buffers and surfaces must be 8-bit RGBA or BGRA.
    #[error("unsupported target format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
    /// Waiting for the device failed.
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    /// Mapping a readback buffer failed.
    #[error("readback mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    /// The mapping callback never reported back.
    #[error("readback was abandoned")]
    ReadbackLost,
    /// There is no frame buffer or surface to read.
    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),
    /// Nothing has been rendered yet.
    #[error("no frame has been started")]
    NoFrame,
}

/// A device and its queue.
///
/// Cheap to clone; textures keep a clone so they can upload on update.
#[derive(Clone, Debug)]
pub struct Gpu {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
}

impl Gpu {
    /// Requests the default adapter and a device with default limits.
    ///
    /// # Errors
    ///
    /// [`WgpuError::NoAdapter`] when the system has no usable adapter.
    pub fn new() -> Result<Self, WgpuError> {
        pollster::block_on(Self::request())
    }

    /// Wraps a device the application already owns.
    #[must_use]
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// The device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    async fn request() -> Result<Self, WgpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| match e {
                wgpu::RequestAdapterError::NotFound { .. } => WgpuError::NoAdapter,
                other => WgpuError::Adapter(other),
            })?;
        let info = adapter.get_info();
        tracing::debug!(name = %info.name, backend = ?info.backend, "adapter selected");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("stratum"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;
        Ok(Self { device, queue })
    }
}
