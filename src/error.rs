//! Error types that cross the engine boundary.
//!
//! Only two kinds of failure ever reach a caller:
//!
//! - caller misuse detected before dispatch (mismatched operand or
//!   destination shapes), and
//! - whatever the CPU reference kernel reports while running the fallback.
//!
//! Layout and accelerator failures are absorbed inside the dispatcher and are
//! defined next to the code that produces them ([`crate::layout::LayoutError`],
//! [`crate::ops::primitive::AcceleratorFailure`]).

use crate::tensors::DType;
use thiserror::Error;

/// Errors reported by [`crate::ops::TensorEngine`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The inner dimensions of a matrix product disagree.
    #[error("matmul shape mismatch: a={a:?}, b={b:?} (inner dims {k_a} vs {k_b})")]
    ShapeMismatch {
        /// Shape of the left operand.
        a: Vec<usize>,
        /// Shape of the right operand.
        b: Vec<usize>,
        /// Column count of `a`.
        k_a: usize,
        /// Row count of `b`.
        k_b: usize,
    },
    /// The destination's declared shape differs from the implied result shape.
    #[error("{op} prealloc shape mismatch: expected {expected:?}, got {actual:?}")]
    PreallocShapeMismatch {
        /// Operation name.
        op: &'static str,
        /// Shape implied by the operands.
        expected: Vec<usize>,
        /// Shape of the supplied destination.
        actual: Vec<usize>,
    },
    /// An error reported verbatim by the CPU reference kernel.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Errors raised by the CPU reference kernels in [`crate::ops::cpu`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// An operand has the wrong number of dimensions.
    #[error("{op}: expected a rank-{expected} tensor for `{operand}`, got rank {actual}")]
    Rank {
        /// Operation name.
        op: &'static str,
        /// Operand name.
        operand: &'static str,
        /// Required rank.
        expected: usize,
        /// Actual rank.
        actual: usize,
    },
    /// Operands carry different element types.
    #[error("{op}: element type mismatch ({lhs:?} vs {rhs:?})")]
    DType {
        /// Operation name.
        op: &'static str,
        /// First element type.
        lhs: DType,
        /// Second element type.
        rhs: DType,
    },
    /// Shapes are incompatible for the operation.
    #[error("{op}: incompatible shapes {lhs:?} and {rhs:?}")]
    Shape {
        /// Operation name.
        op: &'static str,
        /// First shape.
        lhs: Vec<usize>,
        /// Second shape.
        rhs: Vec<usize>,
    },
    /// A reduction axis was requested on a scalar.
    #[error("{op}: cannot reduce along axis {axis} of a rank-0 tensor")]
    ScalarAxis {
        /// Operation name.
        op: &'static str,
        /// Requested axis.
        axis: isize,
    },
    /// The same axis was named twice after normalization.
    #[error("{op}: axis {axis} given more than once")]
    DuplicateAxis {
        /// Operation name.
        op: &'static str,
        /// Resolved axis.
        axis: usize,
    },
    /// The destination cannot receive results (e.g. it is sparse).
    #[error("{op}: destination must be a dense tensor")]
    SparseDestination {
        /// Operation name.
        op: &'static str,
    },
}
