//! Status-code boundary to the accelerator.
//!
//! Devices speak integer status codes. This module names them, checks buffer
//! sizes before a device sees them, and turns every non-zero status into an
//! [`AcceleratorFailure`].

use crate::context::EngineContext;
use crate::eligibility::{MatMulShape, RowSumShape};
use thiserror::Error;

/// The call completed and the output buffer holds the result.
pub const STATUS_OK: i32 = 0;
/// Dimensions or buffer lengths were rejected.
pub const STATUS_INVALID_ARGUMENT: i32 = -1;
/// Device memory could not be allocated.
pub const STATUS_ALLOCATION: i32 = -2;
/// A program failed to build or validate.
pub const STATUS_PROGRAM: i32 = -3;
/// Submission failed or the device was lost.
pub const STATUS_SUBMISSION: i32 = -4;
/// Results could not be copied back to host memory.
pub const STATUS_READBACK: i32 = -5;

/// A non-zero accelerator status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcceleratorFailure {
    /// Dimensions or buffer lengths were rejected.
    #[error("invalid argument")]
    InvalidArgument,
    /// Device memory could not be allocated.
    #[error("device allocation failed")]
    Allocation,
    /// A program failed to build or validate.
    #[error("program error")]
    Program,
    /// Submission failed or the device was lost.
    #[error("submission failed")]
    Submission,
    /// Results could not be read back.
    #[error("readback failed")]
    Readback,
    /// A status this crate does not know.
    #[error("unknown status {0}")]
    Unknown(i32),
}

impl AcceleratorFailure {
    /// Interprets a device status code.
    ///
    /// # Errors
    /// Every non-zero status.
    pub const fn from_status(status: i32) -> Result<(), Self> {
        Err(match status {
            STATUS_OK => return Ok(()),
            STATUS_INVALID_ARGUMENT => Self::InvalidArgument,
            STATUS_ALLOCATION => Self::Allocation,
            STATUS_PROGRAM => Self::Program,
            STATUS_SUBMISSION => Self::Submission,
            STATUS_READBACK => Self::Readback,
            other => Self::Unknown(other),
        })
    }

    /// The status code of this failure.
    #[must_use]
    pub const fn status(self) -> i32 {
        match self {
            Self::InvalidArgument => STATUS_INVALID_ARGUMENT,
            Self::Allocation => STATUS_ALLOCATION,
            Self::Program => STATUS_PROGRAM,
            Self::Submission => STATUS_SUBMISSION,
            Self::Readback => STATUS_READBACK,
            Self::Unknown(code) => code,
        }
    }
}

/// Whether buffer lengths fit `c[m x n] = a[m x k] * b[k x n]`.
#[must_use]
pub fn matmul_args_valid(a: usize, b: usize, c: usize, m: usize, n: usize, k: usize) -> bool {
    m > 0 && n > 0 && k > 0 && a == m * k && b == k * n && c == m * n
}

/// Whether buffer lengths fit a `rows x cols` row sum.
#[must_use]
pub fn rowsum_args_valid(x: usize, y: usize, rows: usize, cols: usize) -> bool {
    rows > 0 && cols > 0 && x == rows * cols && y == rows
}

/// Runs a matrix product on the context's device.
///
/// # Errors
/// [`AcceleratorFailure::InvalidArgument`] if the buffers do not match
/// `shape`, otherwise whatever status the device reports.
pub fn matmul(
    ctx: &EngineContext,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    shape: MatMulShape,
) -> Result<(), AcceleratorFailure> {
    let MatMulShape { m, k, n } = shape;
    if !matmul_args_valid(a.len(), b.len(), c.len(), m, n, k) {
        return Err(AcceleratorFailure::InvalidArgument);
    }
    log::trace!("submitting {m}x{k}x{n} matmul to {}", ctx.device_name());
    AcceleratorFailure::from_status(ctx.device().matmul_f32(a, b, c, m, n, k))
}

/// Runs a last-axis sum on the context's device.
///
/// # Errors
/// [`AcceleratorFailure::InvalidArgument`] if the buffers do not match
/// `shape`, otherwise whatever status the device reports.
pub fn rowsum(
    ctx: &EngineContext,
    x: &[f32],
    y: &mut [f32],
    shape: RowSumShape,
) -> Result<(), AcceleratorFailure> {
    let RowSumShape { rows, cols } = shape;
    if !rowsum_args_valid(x.len(), y.len(), rows, cols) {
        return Err(AcceleratorFailure::InvalidArgument);
    }
    log::trace!("submitting {rows}x{cols} row sum to {}", ctx.device_name());
    AcceleratorFailure::from_status(ctx.device().rowsum_f32(x, y, rows, cols))
}
