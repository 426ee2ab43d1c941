//! accel_engine: a tensor engine that offloads to an accelerator and falls back to the CPU.
//!
//! Matrix products and axis sums run on an attached accelerator when their
//! operands qualify, and on a multi-threaded CPU reference kernel otherwise.
//! Which path ran is invisible to the caller apart from floating-point
//! rounding: results agree within [`approx::F32_TOLERANCE`] and errors are the
//! same on both paths.
//!
//! # Modules
//!
//! - [`tensors`]: dense strided views, sparse tensors and the `tensor!` macro.
//! - [`backend`]: per-engine backend configuration.
//! - [`context`]: the accelerator session and the device contract.
//! - [`layout`]: conversion between strided views and canonical buffers.
//! - [`eligibility`]: which operations may be offloaded.
//! - [`ops`]: the engines, the CPU kernels and the devices.
//! - [`error`]: errors visible to callers.
//!
//! # Example
//!
//! ```rust
//! use accel_engine::backend::{Backend, EngineConfig};
//! use accel_engine::ops::{TensorEngine, dispatch::AccelEngine};
//! use accel_engine::tensors::Tensor;
//! use accel_engine::tensor;
//!
//! let engine = AccelEngine::new(&EngineConfig::new(Backend::Host));
//! let x: Tensor = tensor!([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).into();
//! let rows = engine.sum(&x, &[-1]).unwrap();
//! assert_eq!(rows.shape(), &[2]);
//! ```
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and installs no logger.
//! Fallbacks are reported at `debug`, failed context creation at `warn`.

pub mod approx;
pub mod backend;
pub mod context;
pub mod eligibility;
pub mod error;
pub mod layout;
pub mod ops;
pub mod tensors;

pub use backend::{Backend, EngineConfig};
pub use context::{ComputeDevice, EngineContext};
pub use error::{EngineError, KernelError};
pub use ops::TensorEngine;
pub use ops::dispatch::{AccelEngine, CpuEngine, DispatchStats};
pub use tensors::{DType, Dense, Sparse, Tensor};
