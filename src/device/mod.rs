//! Compute device abstraction used by the GPU execution path.
//!
//! A device owns opaque buffers and runs [`Kernel`]s on them. Devices are opened once per job
//! through a [`DeviceFactory`] and held by a [`DeviceLease`], which releases the device when the
//! job ends on every exit path.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{AudioChunk, Frame};

/// Kernels and their host reference implementations.
pub mod kernel;
/// Host-memory device used for tests and for exercising the device path without a GPU.
pub mod simulated;
/// `wgpu` compute backend.
#[cfg(feature = "gpu")]
pub mod wgpu_device;

pub use kernel::Kernel;

/// Failures raised by a compute device. Always recoverable by re-running the unit on the host.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No usable device could be opened.
    #[error("device unavailable: {0}")]
    Unavailable(String),
    /// Buffer allocation or host→device transfer failed.
    #[error("device allocation failed: {0}")]
    Allocation(String),
    /// A kernel failed to run.
    #[error("device kernel '{kernel}' failed: {reason}")]
    Kernel {
        /// Kernel name.
        kernel: &'static str,
        /// Backend-specific reason.
        reason: String,
    },
    /// Device→host readback failed.
    #[error("device readback failed: {0}")]
    Readback(String),
    /// Downloaded data does not fit the payload shape.
    #[error("device buffer shape mismatch: {0}")]
    Shape(String),
}

/// Device-resident `f32` buffer. The concrete storage is owned by the device that created it.
pub struct DeviceBuffer {
    len: usize,
    inner: Box<dyn Any + Send>,
}

impl DeviceBuffer {
    /// Wrap backend storage holding `len` elements.
    pub fn new<T: Any + Send>(len: usize, inner: T) -> Self {
        Self {
            len,
            inner: Box::new(inner),
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the backend storage.
    pub fn storage<T: Any>(&self) -> Result<&T, DeviceError> {
        self.inner
            .downcast_ref::<T>()
            .ok_or_else(|| DeviceError::Allocation("buffer belongs to another device".into()))
    }

    /// Mutably borrow the backend storage.
    pub fn storage_mut<T: Any>(&mut self) -> Result<&mut T, DeviceError> {
        self.inner
            .downcast_mut::<T>()
            .ok_or_else(|| DeviceError::Allocation("buffer belongs to another device".into()))
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer").field("len", &self.len).finish()
    }
}

/// A device capable of holding `f32` buffers and running [`Kernel`]s on them.
///
/// Transfers are synchronous from the caller's point of view. Implementations must be safe to
/// share between worker threads.
pub trait ComputeDevice: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;
    /// Copy host data into a new device buffer.
    fn upload(&self, data: &[f32]) -> Result<DeviceBuffer, DeviceError>;
    /// Run `kernel` in place on `buf`.
    fn dispatch(&self, buf: &mut DeviceBuffer, kernel: &Kernel) -> Result<(), DeviceError>;
    /// Copy a device buffer back to host memory.
    fn download(&self, buf: &DeviceBuffer) -> Result<Vec<f32>, DeviceError>;
    /// Release device resources at job end. Called exactly once per lease.
    fn release(&self) {}
}

/// Opens a device for one job.
pub trait DeviceFactory: Send + Sync {
    /// Open (or re-open) the device.
    fn open(&self) -> Result<Arc<dyn ComputeDevice>, DeviceError>;
}

/// Scoped device acquisition; dropping the lease releases the device.
pub struct DeviceLease {
    device: Arc<dyn ComputeDevice>,
}

impl DeviceLease {
    /// Open a device through `factory`.
    pub fn acquire(factory: &dyn DeviceFactory) -> Result<Self, DeviceError> {
        let device = factory.open()?;
        tracing::info!(device = device.name(), "compute device acquired");
        Ok(Self { device })
    }

    /// Shared handle to the leased device.
    pub fn device(&self) -> &Arc<dyn ComputeDevice> {
        &self.device
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.device.release();
        tracing::debug!(device = self.device.name(), "compute device released");
    }
}

/// Which execution device an export should prefer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    /// Host-only execution.
    #[default]
    Cpu,
    /// Use a GPU when one can be opened; fall back to the host otherwise.
    Gpu,
}

/// Resolve a [`DeviceChoice`] into a factory, or `None` for host-only execution.
pub fn device_factory(choice: DeviceChoice) -> Option<Arc<dyn DeviceFactory>> {
    match choice {
        DeviceChoice::Cpu => None,
        #[cfg(feature = "gpu")]
        DeviceChoice::Gpu => Some(Arc::new(wgpu_device::WgpuFactory::default())),
        #[cfg(not(feature = "gpu"))]
        DeviceChoice::Gpu => {
            tracing::warn!("gpu requested but fxpipe was built without the 'gpu' feature; using cpu");
            None
        }
    }
}

/// Conversion between a unit payload and the flat `f32` layout devices operate on.
pub trait DevicePayload: Sized {
    /// Dimensions needed to rebuild the payload from flat data.
    type Shape: Copy + Send;

    /// Current shape of the payload.
    fn shape(&self) -> Self::Shape;
    /// Flatten to `f32` elements.
    fn to_f32(&self) -> Vec<f32>;
    /// Rebuild from flat data with the given shape.
    fn from_f32(data: Vec<f32>, shape: Self::Shape) -> Result<Self, DeviceError>;
}

impl DevicePayload for AudioChunk {
    type Shape = usize;

    fn shape(&self) -> usize {
        self.len()
    }

    fn to_f32(&self) -> Vec<f32> {
        self.clone()
    }

    fn from_f32(data: Vec<f32>, len: usize) -> Result<Self, DeviceError> {
        if data.len() != len {
            return Err(DeviceError::Shape(format!(
                "expected {len} samples, got {}",
                data.len()
            )));
        }
        Ok(data)
    }
}

impl DevicePayload for Frame {
    type Shape = (u32, u32);

    fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&b| f32::from(b)).collect()
    }

    fn from_f32(data: Vec<f32>, (width, height): (u32, u32)) -> Result<Self, DeviceError> {
        let bytes = data
            .into_iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect::<Vec<u8>>();
        Frame::new(width, height, bytes).map_err(|e| DeviceError::Shape(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/mod.rs"]
mod tests;
