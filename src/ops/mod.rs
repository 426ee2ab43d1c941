//! # Operations
//!
//! Matrix multiplication and axis sums, with an accelerated path and a CPU
//! reference path behind one trait.
//!
//! ## Submodules
//!
//! - [`dispatch`]: the engines and the classify, normalize, invoke, fallback protocol
//! - [`cpu`]: multi-threaded CPU reference kernels
//! - [`primitive`]: status codes and the checked entry points into a device
//! - [`host`]: in-process reference device
//! - [`wgpu`] *(opt-in)*: GPU device using `wgpu`
//!
//! ## Feature Flags
//!
//! - `wgpu`: enables the WebGPU device

pub mod cpu;
pub mod dispatch;
pub mod host;
pub mod primitive;
#[cfg(feature = "wgpu")]
pub mod wgpu;

use crate::error::EngineError;
use crate::tensors::{Dense, Tensor};

/// A numeric engine for matrix products and reductions.
///
/// Implementations agree on results up to `f32` tolerance and on the error
/// surface: shape problems are reported as [`EngineError::ShapeMismatch`] or
/// [`EngineError::PreallocShapeMismatch`], everything else as the CPU kernel
/// reports it.
pub trait TensorEngine {
    /// Computes `dest = a x b`, overwriting `dest`.
    ///
    /// # Errors
    /// See [`EngineError`].
    fn matmul(&self, a: &Tensor, b: &Tensor, dest: &mut Tensor) -> Result<(), EngineError>;

    /// Sums `a` along `along` into `dest`, whose shape must be the reduced shape.
    ///
    /// An empty `along` sums every axis. Negative axes count from the end.
    ///
    /// # Errors
    /// See [`EngineError`].
    fn sum_into(&self, a: &Tensor, along: &[isize], dest: &mut Tensor) -> Result<(), EngineError>;

    /// Sums `a` along `along` into a freshly allocated tensor.
    ///
    /// # Errors
    /// See [`EngineError`].
    fn sum(&self, a: &Tensor, along: &[isize]) -> Result<Tensor, EngineError> {
        let shape = cpu::reduced_shape(a.shape(), along)?;
        let mut dest: Tensor = Dense::zeros(a.dtype(), shape).into();
        self.sum_into(a, along, &mut dest)?;
        Ok(dest)
    }
}
