use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::device::{ComputeDevice, DeviceBuffer, DeviceError, DeviceFactory, Kernel};

/// Host-memory [`ComputeDevice`] that runs kernels through their reference implementations.
///
/// Faults can be injected to exercise the fallback path: failing uploads, failing every
/// dispatch, or failing every dispatch after a number of successful ones. Counters record how
/// the device was used.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    fail_uploads: bool,
    fail_dispatch_after: Option<usize>,
    uploads: AtomicUsize,
    dispatches: AtomicUsize,
    opens: AtomicUsize,
    releases: AtomicUsize,
}

struct HostStorage(Vec<f32>);

impl SimulatedDevice {
    /// Device that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail with an allocation error.
    pub fn fail_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Let the first `n` dispatches succeed and fail all later ones.
    pub fn fail_dispatch_after(mut self, n: usize) -> Self {
        self.fail_dispatch_after = Some(n);
        self
    }

    /// Number of uploads attempted.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Number of dispatches attempted.
    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    /// Number of times the device was opened through its factory.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of times the device was released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ComputeDevice for SimulatedDevice {
    fn name(&self) -> &str {
        "simulated"
    }

    fn upload(&self, data: &[f32]) -> Result<DeviceBuffer, DeviceError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(DeviceError::Allocation("simulated allocation failure".into()));
        }
        Ok(DeviceBuffer::new(data.len(), HostStorage(data.to_vec())))
    }

    fn dispatch(&self, buf: &mut DeviceBuffer, kernel: &Kernel) -> Result<(), DeviceError> {
        let n = self.dispatches.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_dispatch_after
            && n >= limit
        {
            return Err(DeviceError::Kernel {
                kernel: kernel.name(),
                reason: "simulated kernel fault".into(),
            });
        }
        let storage = buf.storage_mut::<HostStorage>()?;
        kernel.run_host(&mut storage.0);
        Ok(())
    }

    fn download(&self, buf: &DeviceBuffer) -> Result<Vec<f32>, DeviceError> {
        Ok(buf.storage::<HostStorage>()?.0.clone())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out the same shared simulated device on every open so callers can inspect counters.
impl DeviceFactory for Arc<SimulatedDevice> {
    fn open(&self) -> Result<Arc<dyn ComputeDevice>, DeviceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}

/// Factory that never yields a device (capability absent).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDevice;

impl DeviceFactory for NoDevice {
    fn open(&self) -> Result<Arc<dyn ComputeDevice>, DeviceError> {
        Err(DeviceError::Unavailable("no compute device present".into()))
    }
}
