//! Parallel CPU reference kernels.
//!
//! These kernels define the results every other path must reproduce. They
//! accept any tensor the engine accepts: `f32` or `f64`, dense views with
//! arbitrary strides, and sparse operands (which are densified first). Output
//! rows are computed in parallel with [`rayon`].
//!
//! Errors are reported as [`KernelError`] and surface to callers unchanged.

use crate::eligibility::resolve_axis;
use crate::error::KernelError;
use crate::tensors::{DType, Dense, Element, Tensor};
use rayon::prelude::*;

fn expect_rank(op: &'static str, operand: &'static str, t: &Tensor, expected: usize) -> Result<(), KernelError> {
    if t.rank() == expected {
        Ok(())
    } else {
        Err(KernelError::Rank {
            op,
            operand,
            expected,
            actual: t.rank(),
        })
    }
}

fn expect_dtype(op: &'static str, lhs: DType, rhs: DType) -> Result<(), KernelError> {
    if lhs == rhs {
        Ok(())
    } else {
        Err(KernelError::DType { op, lhs, rhs })
    }
}

/// Computes `dest = a x b` for matrices.
///
/// `dest` is overwritten through its own strides, so it may be a transposed
/// or sliced view.
///
/// # Errors
/// - [`KernelError::Rank`] if any tensor is not a matrix
/// - [`KernelError::DType`] if element types differ
/// - [`KernelError::Shape`] if inner dimensions disagree or `dest` is not `[m, n]`
/// - [`KernelError::SparseDestination`] if `dest` is sparse
///
/// # Example
/// ```
/// use accel_engine::{ops::cpu, tensor, tensors::{DType, Dense, Tensor}};
///
/// let a: Tensor = tensor!([[1.0, 2.0], [3.0, 4.0]]).into();
/// let b: Tensor = tensor!([[5.0, 6.0], [7.0, 8.0]]).into();
/// let mut c: Tensor = Dense::zeros(DType::F64, vec![2, 2]).into();
/// cpu::matmul(&a, &b, &mut c).unwrap();
/// assert_eq!(c.as_dense().unwrap().logical_values::<f64>().unwrap(), vec![19.0, 22.0, 43.0, 50.0]);
/// ```
pub fn matmul(a: &Tensor, b: &Tensor, dest: &mut Tensor) -> Result<(), KernelError> {
    const OP: &str = "matmul";
    expect_rank(OP, "a", a, 2)?;
    expect_rank(OP, "b", b, 2)?;
    expect_rank(OP, "dest", dest, 2)?;
    expect_dtype(OP, a.dtype(), b.dtype())?;
    expect_dtype(OP, a.dtype(), dest.dtype())?;

    let (m, k) = (a.shape()[0], a.shape()[1]);
    let n = b.shape()[1];
    if k != b.shape()[0] {
        return Err(KernelError::Shape {
            op: OP,
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }
    if dest.shape() != [m, n] {
        return Err(KernelError::Shape {
            op: OP,
            lhs: dest.shape().to_vec(),
            rhs: vec![m, n],
        });
    }
    let out = dest
        .as_dense_mut()
        .ok_or(KernelError::SparseDestination { op: OP })?;

    let (a, b) = (a.to_dense(), b.to_dense());
    let product = match a.dtype() {
        DType::F32 => matmul_typed::<f32>(&a, &b, m, k, n),
        DType::F64 => matmul_typed::<f64>(&a, &b, m, k, n),
    }?;
    out.assign(&product)
}

fn matmul_typed<T: Element>(a: &Dense, b: &Dense, m: usize, k: usize, n: usize) -> Result<Dense, KernelError> {
    let dtype_error = || KernelError::DType {
        op: "matmul",
        lhs: a.dtype(),
        rhs: b.dtype(),
    };
    let a_data = a.logical_values::<T>().ok_or_else(dtype_error)?;
    let b_data = b.logical_values::<T>().ok_or_else(dtype_error)?;

    let mut out_data = vec![T::default(); m * n];
    if n > 0 {
        out_data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            for (j, out) in row.iter_mut().enumerate() {
                let mut sum = T::default();
                for l in 0..k {
                    sum += a_data[i * k + l] * b_data[l * n + j];
                }
                *out = sum;
            }
        });
    }
    Ok(Dense::from_vec(vec![m, n], out_data))
}

/// Resolves reduction axes against `rank`.
///
/// An empty `along` selects every axis. The returned mask has one entry per
/// dimension.
///
/// # Errors
/// [`KernelError::ScalarAxis`] for axes on a rank-0 tensor,
/// [`KernelError::DuplicateAxis`] if two axes resolve to the same dimension.
pub fn reduction_mask(rank: usize, along: &[isize]) -> Result<Vec<bool>, KernelError> {
    if along.is_empty() {
        return Ok(vec![true; rank]);
    }
    let mut mask = vec![false; rank];
    for &axis in along {
        let axis = resolve_axis(axis, rank).ok_or(KernelError::ScalarAxis { op: "sum", axis })?;
        if mask[axis] {
            return Err(KernelError::DuplicateAxis { op: "sum", axis });
        }
        mask[axis] = true;
    }
    Ok(mask)
}

/// Shape left after summing `shape` along `along`.
///
/// # Errors
/// As [`reduction_mask`].
pub fn reduced_shape(shape: &[usize], along: &[isize]) -> Result<Vec<usize>, KernelError> {
    let mask = reduction_mask(shape.len(), along)?;
    Ok(shape
        .iter()
        .zip(&mask)
        .filter(|&(_, &reduced)| !reduced)
        .map(|(&dim, _)| dim)
        .collect())
}

/// Sums `a` along `along`, dropping the reduced dimensions.
///
/// # Errors
/// As [`reduction_mask`].
pub fn sum(a: &Tensor, along: &[isize]) -> Result<Tensor, KernelError> {
    let mask = reduction_mask(a.rank(), along)?;
    let a = a.to_dense();
    let out = match a.dtype() {
        DType::F32 => sum_typed::<f32>(&a, &mask),
        DType::F64 => sum_typed::<f64>(&a, &mask),
    }?;
    Ok(out.into())
}

fn sum_typed<T: Element>(a: &Dense, mask: &[bool]) -> Result<Dense, KernelError> {
    // Kept axes first, so every output element owns one contiguous group.
    let perm: Vec<usize> = (0..mask.len())
        .filter(|&axis| !mask[axis])
        .chain((0..mask.len()).filter(|&axis| mask[axis]))
        .collect();
    let out_shape: Vec<usize> = perm
        .iter()
        .take_while(|&&axis| !mask[axis])
        .map(|&axis| a.shape()[axis])
        .collect();
    let group: usize = perm
        .iter()
        .filter(|&&axis| mask[axis])
        .map(|&axis| a.shape()[axis])
        .product();

    let mut out = vec![T::default(); out_shape.iter().product()];
    if group > 0 {
        let packed = a.clone().permute(&perm).to_contiguous();
        let values = packed.data::<T>().ok_or(KernelError::DType {
            op: "sum",
            lhs: a.dtype(),
            rhs: T::DTYPE,
        })?;
        out.par_iter_mut()
            .zip(values.par_chunks(group))
            .for_each(|(acc, chunk)| {
                for &v in chunk {
                    *acc += v;
                }
            });
    }
    Ok(Dense::from_vec(out_shape, out))
}
