//! Accelerator execution context.
//!
//! An [`EngineContext`] owns one accelerator session: the device handle, its
//! submission queue and the compiled programs. It is created once per engine,
//! shared read-only by every operation on that engine, and released exactly
//! once when the engine (or the caller holding it) lets go of it.
//!
//! Creation never panics. If the backend cannot provide a device the factory
//! returns `None`, and the engine runs every operation on the CPU.

use crate::backend::{Backend, EngineConfig};
use crate::ops::host::HostDevice;
use core::fmt;
use thiserror::Error;

/// The synchronous accelerator contract.
///
/// Buffers are canonical row-major `f32`. Both calls block until results are
/// in host memory and return a status code: `0` on success, a negative value
/// from [`crate::ops::primitive`] otherwise. On a non-zero status the contents
/// of the output buffer are unspecified.
pub trait ComputeDevice: Send + Sync {
    /// Human readable device name.
    fn name(&self) -> &str;

    /// `c[m x n] = a[m x k] * b[k x n]`.
    fn matmul_f32(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) -> i32;

    /// `y[r] = sum(x[r, ..])` over a `rows x cols` matrix.
    fn rowsum_f32(&self, x: &[f32], y: &mut [f32], rows: usize, cols: usize) -> i32;
}

/// Why a context could not be created.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The configured backend has no accelerator.
    #[error("backend `{}` does not provide an accelerator", .0.as_str())]
    NoAccelerator(Backend),
    /// The backend exists but was not compiled into this build.
    #[error("backend `{}` is not compiled in (enable the `{}` feature)", .0.as_str(), .0.as_str())]
    Disabled(Backend),
    /// GPU initialization failed.
    #[cfg(feature = "wgpu")]
    #[error(transparent)]
    Gpu(#[from] crate::ops::wgpu::GpuError),
}

/// An owned accelerator session.
///
/// Operations borrow the context, [`release`](Self::release) consumes it, so a
/// context can neither be released twice nor while an operation is using it.
pub struct EngineContext {
    device: Box<dyn ComputeDevice>,
}

impl EngineContext {
    /// Opens the accelerator named by `config`.
    ///
    /// Returns `None` on any failure; the reason is logged.
    #[must_use]
    pub fn create(config: &EngineConfig) -> Option<Self> {
        match Self::try_create(config) {
            Ok(ctx) => {
                log::info!("accelerator context created on {}", ctx.device_name());
                Some(ctx)
            }
            Err(ContextError::NoAccelerator(backend)) => {
                log::debug!("backend `{}` runs without accelerator", backend.as_str());
                None
            }
            Err(e) => {
                log::warn!("accelerator initialization failed, using CPU fallback: {e}");
                None
            }
        }
    }

    /// Opens the accelerator named by `config`, reporting why it failed.
    ///
    /// # Errors
    /// See [`ContextError`].
    pub fn try_create(config: &EngineConfig) -> Result<Self, ContextError> {
        match config.backend() {
            Backend::Cpu => Err(ContextError::NoAccelerator(Backend::Cpu)),
            Backend::Host => Ok(Self::from_device(HostDevice::new())),
            Backend::Wgpu => Self::open_wgpu(config),
        }
    }

    #[cfg(feature = "wgpu")]
    fn open_wgpu(config: &EngineConfig) -> Result<Self, ContextError> {
        let device = crate::ops::wgpu::WgpuDevice::new(config)?;
        Ok(Self::from_device(device))
    }

    #[cfg(not(feature = "wgpu"))]
    fn open_wgpu(_config: &EngineConfig) -> Result<Self, ContextError> {
        Err(ContextError::Disabled(Backend::Wgpu))
    }

    /// Wraps an already opened device.
    pub fn from_device(device: impl ComputeDevice + 'static) -> Self {
        Self {
            device: Box::new(device),
        }
    }

    /// The device behind this context.
    #[must_use]
    pub fn device(&self) -> &dyn ComputeDevice {
        &*self.device
    }

    /// Name of the device behind this context.
    #[must_use]
    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Releases the session.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        log::debug!("releasing accelerator context on {}", self.device.name());
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("device", &self.device.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backend_has_no_context() {
        let config = EngineConfig::new(Backend::Cpu);
        assert!(EngineContext::create(&config).is_none());
        assert!(matches!(
            EngineContext::try_create(&config),
            Err(ContextError::NoAccelerator(Backend::Cpu))
        ));
    }

    #[test]
    fn host_backend_opens() {
        let ctx = EngineContext::create(&EngineConfig::new(Backend::Host)).unwrap();
        assert_eq!(ctx.device_name(), "host");
        ctx.release();
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn wgpu_backend_without_feature_is_absent() {
        let config = EngineConfig::new(Backend::Wgpu);
        assert!(matches!(
            EngineContext::try_create(&config),
            Err(ContextError::Disabled(Backend::Wgpu))
        ));
        assert!(EngineContext::create(&config).is_none());
    }
}
