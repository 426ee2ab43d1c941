//! Operation dispatch.
//!
//! [`AccelEngine`] runs every operation through the same protocol:
//!
//! 1. validate operand and destination shapes (errors go to the caller)
//! 2. check that a context is attached
//! 3. classify the operands
//! 4. normalize them into canonical buffers
//! 5. invoke the accelerator
//! 6. publish the result into the destination
//!
//! Any failure in steps 2 to 6 is logged and the whole operation is recomputed
//! by the CPU kernel on the original operands. The caller only ever sees the
//! shape errors of step 1 or the CPU kernel's own errors.
//!
//! # Example
//! ```rust
//! use accel_engine::backend::{Backend, EngineConfig};
//! use accel_engine::ops::{TensorEngine, dispatch::AccelEngine};
//! use accel_engine::tensors::{DType, Dense, Tensor};
//! use accel_engine::tensor;
//!
//! let engine = AccelEngine::new(&EngineConfig::new(Backend::Host));
//! let a: Tensor = tensor!([[1.0f32, 2.0], [3.0, 4.0]]).into();
//! let b: Tensor = tensor!([[5.0f32, 6.0], [7.0, 8.0]]).into();
//! let mut c: Tensor = Dense::zeros(DType::F32, vec![2, 2]).into();
//! engine.matmul(&a, &b, &mut c).unwrap();
//! assert_eq!(engine.stats().accelerated, 1);
//! ```

use super::primitive::{self, AcceleratorFailure};
use super::{TensorEngine, cpu};
use crate::backend::EngineConfig;
use crate::context::EngineContext;
use crate::eligibility::{self, Ineligible, MatMulShape, Verdict};
use crate::error::{EngineError, KernelError};
use crate::layout::{self, LayoutError, OutputTarget};
use crate::tensors::Tensor;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Why an operation left the accelerated path.
#[derive(Debug)]
enum Fallback {
    NoContext,
    Ineligible(Ineligible),
    Layout(LayoutError),
    Accelerator(AcceleratorFailure),
}

impl Fallback {
    /// Whether the operation was rejected before any buffer work.
    const fn is_ineligible(&self) -> bool {
        matches!(self, Self::NoContext | Self::Ineligible(_))
    }
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContext => write!(f, "no accelerator context"),
            Self::Ineligible(reason) => write!(f, "ineligible: {reason}"),
            Self::Layout(e) => write!(f, "layout: {e}"),
            Self::Accelerator(e) => write!(f, "accelerator failure (status {}): {e}", e.status()),
        }
    }
}

impl From<Ineligible> for Fallback {
    fn from(reason: Ineligible) -> Self {
        Self::Ineligible(reason)
    }
}

impl From<LayoutError> for Fallback {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl From<AcceleratorFailure> for Fallback {
    fn from(e: AcceleratorFailure) -> Self {
        Self::Accelerator(e)
    }
}

fn eligible<S>(verdict: Verdict<S>) -> Result<S, Fallback> {
    match verdict {
        Verdict::Eligible(shape) => Ok(shape),
        Verdict::Ineligible(reason) => Err(reason.into()),
    }
}

/// A snapshot of how an engine's operations were routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Operations completed by the accelerator.
    pub accelerated: u64,
    /// Operations sent to the CPU before any buffer work.
    pub ineligible: u64,
    /// Operations that failed on the accelerated path and were recomputed.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accelerated: AtomicU64,
    ineligible: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn accelerated(&self) {
        self.accelerated.fetch_add(1, Ordering::Relaxed);
    }

    fn fallback(&self, op: &str, reason: &Fallback) {
        if reason.is_ineligible() {
            self.ineligible.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("{op}: using CPU fallback ({reason})");
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            accelerated: self.accelerated.load(Ordering::Relaxed),
            ineligible: self.ineligible.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Checks that `dest` has the shape of `a` summed along `along`.
fn check_sum_destination(a: &Tensor, along: &[isize], dest: &Tensor) -> Result<(), EngineError> {
    let expected = cpu::reduced_shape(a.shape(), along)?;
    if dest.shape() != expected {
        return Err(EngineError::PreallocShapeMismatch {
            op: "sum",
            expected,
            actual: dest.shape().to_vec(),
        });
    }
    Ok(())
}

/// Runs the CPU sum and writes it through `dest`'s strides.
fn cpu_sum_into(a: &Tensor, along: &[isize], dest: &mut Tensor) -> Result<(), KernelError> {
    let result = cpu::sum(a, along)?;
    let out = dest
        .as_dense_mut()
        .ok_or(KernelError::SparseDestination { op: "sum" })?;
    out.assign(&result.to_dense())
}

/// The reference engine: every operation runs the CPU kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEngine;

impl TensorEngine for CpuEngine {
    fn matmul(&self, a: &Tensor, b: &Tensor, dest: &mut Tensor) -> Result<(), EngineError> {
        MatMulShape::validate(a.shape(), b.shape(), dest.shape())?;
        Ok(cpu::matmul(a, b, dest)?)
    }

    fn sum_into(&self, a: &Tensor, along: &[isize], dest: &mut Tensor) -> Result<(), EngineError> {
        check_sum_destination(a, along, dest)?;
        Ok(cpu_sum_into(a, along, dest)?)
    }
}

/// An engine that offloads eligible operations to an accelerator.
///
/// Without a context (construction failed, or the CPU backend was chosen)
/// every operation falls back; results are the same either way up to
/// floating-point tolerance.
#[derive(Debug, Default)]
pub struct AccelEngine {
    context: Option<EngineContext>,
    counters: Counters,
}

impl AccelEngine {
    /// Creates an engine and eagerly opens the accelerator named by `config`.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_context(EngineContext::create(config))
    }

    /// Creates an engine configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(&EngineConfig::from_env())
    }

    /// An engine without accelerator.
    #[must_use]
    pub fn cpu_only() -> Self {
        Self::with_context(None)
    }

    /// An engine around an existing context.
    #[must_use]
    pub fn with_context(context: Option<EngineContext>) -> Self {
        Self {
            context,
            counters: Counters::default(),
        }
    }

    /// Whether operations may be offloaded.
    #[must_use]
    pub const fn has_accelerator(&self) -> bool {
        self.context.is_some()
    }

    /// Name of the attached device.
    #[must_use]
    pub fn device_name(&self) -> Option<&str> {
        self.context.as_ref().map(EngineContext::device_name)
    }

    /// The attached context.
    #[must_use]
    pub const fn context(&self) -> Option<&EngineContext> {
        self.context.as_ref()
    }

    /// Tears the engine down, handing back its context.
    #[must_use]
    pub fn into_context(self) -> Option<EngineContext> {
        self.context
    }

    /// Routing counters since construction.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    fn accelerated_matmul(&self, a: &Tensor, b: &Tensor, dest: &mut Tensor) -> Result<(), Fallback> {
        let ctx = self.context.as_ref().ok_or(Fallback::NoContext)?;
        let shape = eligible(eligibility::classify_matmul(a, b, dest))?;
        let (Some(a), Some(b), Some(dest)) = (a.as_dense(), b.as_dense(), dest.as_dense_mut()) else {
            return Err(Ineligible::NotDense.into());
        };

        let lhs = layout::to_canonical(a)?;
        let rhs = layout::to_canonical(b)?;
        let mut target = OutputTarget::matrix(dest)?;
        primitive::matmul(ctx, &lhs, &rhs, target.buffer_mut(), shape)?;
        target.commit()?;
        Ok(())
    }

    fn accelerated_sum(&self, a: &Tensor, along: &[isize], dest: &mut Tensor) -> Result<(), Fallback> {
        let ctx = self.context.as_ref().ok_or(Fallback::NoContext)?;
        let shape = eligible(eligibility::classify_sum(a, along, Some(&*dest)))?;
        let (Some(a), Some(dest)) = (a.as_dense(), dest.as_dense_mut()) else {
            return Err(Ineligible::NotDense.into());
        };

        let input = layout::to_canonical(a)?;
        let mut target = OutputTarget::vector(dest)?;
        primitive::rowsum(ctx, &input, target.buffer_mut(), shape)?;
        target.commit()?;
        Ok(())
    }
}

impl TensorEngine for AccelEngine {
    fn matmul(&self, a: &Tensor, b: &Tensor, dest: &mut Tensor) -> Result<(), EngineError> {
        MatMulShape::validate(a.shape(), b.shape(), dest.shape())?;
        match self.accelerated_matmul(a, b, dest) {
            Ok(()) => {
                self.counters.accelerated();
                Ok(())
            }
            Err(reason) => {
                self.counters.fallback("matmul", &reason);
                Ok(cpu::matmul(a, b, dest)?)
            }
        }
    }

    fn sum_into(&self, a: &Tensor, along: &[isize], dest: &mut Tensor) -> Result<(), EngineError> {
        check_sum_destination(a, along, dest)?;
        match self.accelerated_sum(a, along, dest) {
            Ok(()) => {
                self.counters.accelerated();
                Ok(())
            }
            Err(reason) => {
                self.counters.fallback("sum", &reason);
                Ok(cpu_sum_into(a, along, dest)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::tensors::{DType, Dense};

    #[test]
    fn engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccelEngine>();
        assert_send_sync::<CpuEngine>();
    }

    #[test]
    fn host_engine_reports_device() {
        let engine = AccelEngine::new(&EngineConfig::new(Backend::Host));
        assert!(engine.has_accelerator());
        assert_eq!(engine.device_name(), Some("host"));
        assert!(engine.into_context().is_some());
    }

    #[test]
    fn missing_context_counts_as_ineligible() {
        let engine = AccelEngine::cpu_only();
        let a: Tensor = Dense::zeros(DType::F32, vec![2, 2]).into();
        let mut c: Tensor = Dense::zeros(DType::F32, vec![2, 2]).into();
        engine.matmul(&a, &a, &mut c).unwrap();
        assert_eq!(
            engine.stats(),
            DispatchStats {
                accelerated: 0,
                ineligible: 1,
                failed: 0
            }
        );
    }

    #[test]
    fn sum_destination_shape_is_checked() {
        let a: Tensor = Dense::zeros(DType::F32, vec![4, 3]).into();
        let mut wrong: Tensor = Dense::zeros(DType::F32, vec![3]).into();
        assert_eq!(
            CpuEngine.sum_into(&a, &[1], &mut wrong),
            Err(EngineError::PreallocShapeMismatch {
                op: "sum",
                expected: vec![4],
                actual: vec![3],
            })
        );
    }
}
