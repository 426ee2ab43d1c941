//! Accelerator eligibility.
//!
//! Pure predicates that look at operand kind, element type, rank, axis
//! selection and layout, and decide whether an operation may run on the
//! accelerator. They never touch tensor data, so an ineligible call reaches the
//! CPU kernel without any buffer work.

use crate::error::EngineError;
use crate::tensors::{DType, Tensor};
use core::fmt;

/// Validated dimensions of `C[m, n] = A[m, k] x B[k, n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatMulShape {
    /// Rows of `A` and `C`.
    pub m: usize,
    /// Columns of `A`, rows of `B`.
    pub k: usize,
    /// Columns of `B` and `C`.
    pub n: usize,
}

impl MatMulShape {
    /// Checks operand and destination shapes of a matrix product.
    ///
    /// Returns `Ok(None)` when either operand is not a matrix: there is no
    /// product shape to check and the CPU kernel reports the rank problem.
    ///
    /// # Errors
    /// [`EngineError::ShapeMismatch`] if the inner dimensions disagree,
    /// [`EngineError::PreallocShapeMismatch`] if `dest` is not `[m, n]`.
    pub fn validate(a: &[usize], b: &[usize], dest: &[usize]) -> Result<Option<Self>, EngineError> {
        let (&[m, k_a], &[k_b, n]) = (a, b) else {
            return Ok(None);
        };
        if k_a != k_b {
            return Err(EngineError::ShapeMismatch {
                a: a.to_vec(),
                b: b.to_vec(),
                k_a,
                k_b,
            });
        }
        if dest != [m, n] {
            return Err(EngineError::PreallocShapeMismatch {
                op: "matmul",
                expected: vec![m, n],
                actual: dest.to_vec(),
            });
        }
        Ok(Some(Self { m, k: k_a, n }))
    }

    /// Shape of the product.
    #[must_use]
    pub const fn output(&self) -> [usize; 2] {
        [self.m, self.n]
    }
}

/// Dimensions of a last-axis sum over a `rows x cols` matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSumShape {
    /// Rows of the input, length of the output.
    pub rows: usize,
    /// Columns summed per row.
    pub cols: usize,
}

/// Why an operation has to use the CPU kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// An operand is not a dense tensor.
    NotDense,
    /// An operand's element type is not `f32`.
    DType(DType),
    /// An operand is not a matrix.
    Rank(usize),
    /// A sum names zero or several axes.
    AxisCount(usize),
    /// A sum reduces an axis other than the last one.
    Axis(usize),
    /// A dimension is zero.
    ZeroSized,
    /// The operand cannot be read as one flat run of storage.
    Strided,
    /// The destination shape disagrees with the implied result.
    DestinationShape,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDense => write!(f, "operand is not dense"),
            Self::DType(dtype) => write!(f, "unsupported element type {dtype:?}"),
            Self::Rank(rank) => write!(f, "unsupported rank {rank}"),
            Self::AxisCount(count) => write!(f, "{count} reduction axes given, need exactly one"),
            Self::Axis(axis) => write!(f, "reduction along axis {axis} is not the last axis"),
            Self::ZeroSized => write!(f, "zero-sized operand"),
            Self::Strided => write!(f, "operand requires strided iteration"),
            Self::DestinationShape => write!(f, "destination shape does not match result"),
        }
    }
}

/// Outcome of classifying one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<S> {
    /// The accelerator may run the operation with these dimensions.
    Eligible(S),
    /// The CPU kernel must run it.
    Ineligible(Ineligible),
}

/// Maps a possibly negative axis into `0..rank`, wrapping out-of-range values.
///
/// Returns `None` for a rank-0 tensor, which has no axes.
///
/// ```
/// use accel_engine::eligibility::resolve_axis;
/// assert_eq!(resolve_axis(-1, 2), Some(1));
/// assert_eq!(resolve_axis(3, 2), Some(1));
/// assert_eq!(resolve_axis(0, 0), None);
/// ```
#[must_use]
pub const fn resolve_axis(axis: isize, rank: usize) -> Option<usize> {
    if rank == 0 {
        return None;
    }
    let rank = rank as isize;
    Some((((axis % rank) + rank) % rank) as usize)
}

fn dense_f32_matrix(t: &Tensor) -> Result<[usize; 2], Ineligible> {
    let dense = t.as_dense().ok_or(Ineligible::NotDense)?;
    if dense.dtype() != DType::F32 {
        return Err(Ineligible::DType(dense.dtype()));
    }
    match *dense.shape() {
        [rows, cols] => Ok([rows, cols]),
        _ => Err(Ineligible::Rank(dense.rank())),
    }
}

/// Classifies `dest = a x b`.
///
/// Eligible iff all three tensors are dense `f32` matrices, the inner
/// dimensions agree and `dest` has the product's shape.
#[must_use]
pub fn classify_matmul(a: &Tensor, b: &Tensor, dest: &Tensor) -> Verdict<MatMulShape> {
    let shapes = dense_f32_matrix(a)
        .and_then(|a| Ok((a, dense_f32_matrix(b)?)))
        .and_then(|(a, b)| Ok((a, b, dense_f32_matrix(dest)?)));
    let ([m, k], [k_b, n], out) = match shapes {
        Ok(shapes) => shapes,
        Err(reason) => return Verdict::Ineligible(reason),
    };
    if k != k_b || out != [m, n] {
        return Verdict::Ineligible(Ineligible::DestinationShape);
    }
    Verdict::Eligible(MatMulShape { m, k, n })
}

/// Classifies a sum of `a` along `along`, optionally into `dest`.
///
/// Eligible iff exactly one axis is given, `a` is a dense, flat-addressable,
/// non-empty `f32` matrix, the axis resolves to the last dimension, and `dest`
/// (when given) is a dense `f32` tensor.
#[must_use]
pub fn classify_sum(a: &Tensor, along: &[isize], dest: Option<&Tensor>) -> Verdict<RowSumShape> {
    if along.len() != 1 {
        return Verdict::Ineligible(Ineligible::AxisCount(along.len()));
    }
    let [rows, cols] = match dense_f32_matrix(a) {
        Ok(dims) => dims,
        Err(reason) => return Verdict::Ineligible(reason),
    };
    match resolve_axis(along[0], 2) {
        Some(1) => {}
        Some(axis) => return Verdict::Ineligible(Ineligible::Axis(axis)),
        None => return Verdict::Ineligible(Ineligible::Rank(0)),
    }
    if rows == 0 || cols == 0 {
        return Verdict::Ineligible(Ineligible::ZeroSized);
    }
    if a.as_dense().is_some_and(|d| d.requires_iterator()) {
        return Verdict::Ineligible(Ineligible::Strided);
    }
    if let Some(dest) = dest {
        match dest.as_dense() {
            None => return Verdict::Ineligible(Ineligible::NotDense),
            Some(d) if d.dtype() != DType::F32 => {
                return Verdict::Ineligible(Ineligible::DType(d.dtype()));
            }
            Some(d) if d.shape() != [rows] => {
                return Verdict::Ineligible(Ineligible::DestinationShape);
            }
            Some(_) => {}
        }
    }
    Verdict::Eligible(RowSumShape { rows, cols })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::{Dense, Sparse};

    fn f32m(rows: usize, cols: usize) -> Tensor {
        Dense::zeros(DType::F32, vec![rows, cols]).into()
    }

    #[test]
    fn negative_axes_wrap() {
        assert_eq!(resolve_axis(-1, 2), Some(1));
        assert_eq!(resolve_axis(-2, 2), Some(0));
        assert_eq!(resolve_axis(0, 2), Some(0));
        assert_eq!(resolve_axis(5, 2), Some(1));
        assert_eq!(resolve_axis(-3, 2), Some(1));
    }

    #[test]
    fn scalars_have_no_axes() {
        assert_eq!(resolve_axis(0, 0), None);
        assert_eq!(resolve_axis(-1, 0), None);
    }

    #[test]
    fn f32_matrices_are_eligible() {
        let verdict = classify_matmul(&f32m(4, 3), &f32m(3, 5), &f32m(4, 5));
        assert_eq!(verdict, Verdict::Eligible(MatMulShape { m: 4, k: 3, n: 5 }));
    }

    #[test]
    fn transposed_operands_stay_eligible() {
        let at: Tensor = Dense::zeros(DType::F32, vec![3, 4]).transpose().into();
        let verdict = classify_matmul(&at, &f32m(3, 5), &f32m(4, 5));
        assert!(matches!(verdict, Verdict::Eligible(_)));
    }

    #[test]
    fn matmul_rejects_f64_sparse_and_rank() {
        let f64m: Tensor = Dense::zeros(DType::F64, vec![2, 2]).into();
        assert_eq!(
            classify_matmul(&f64m, &f32m(2, 2), &f32m(2, 2)),
            Verdict::Ineligible(Ineligible::DType(DType::F64))
        );

        let sparse: Tensor = Sparse::from_entries(vec![2, 2], vec![(vec![0, 0], 1.0f32)]).into();
        assert_eq!(
            classify_matmul(&f32m(2, 2), &sparse, &f32m(2, 2)),
            Verdict::Ineligible(Ineligible::NotDense)
        );

        let cube: Tensor = Dense::zeros(DType::F32, vec![2, 2, 2]).into();
        assert_eq!(
            classify_matmul(&f32m(2, 2), &f32m(2, 2), &cube),
            Verdict::Ineligible(Ineligible::Rank(3))
        );
    }

    #[test]
    fn shape_validation_reports_caller_errors() {
        assert!(matches!(
            MatMulShape::validate(&[2, 3], &[4, 5], &[2, 5]),
            Err(EngineError::ShapeMismatch { k_a: 3, k_b: 4, .. })
        ));
        assert!(matches!(
            MatMulShape::validate(&[2, 3], &[3, 4], &[2, 3]),
            Err(EngineError::PreallocShapeMismatch { .. })
        ));
        assert_eq!(MatMulShape::validate(&[2, 2, 2], &[2, 2], &[2, 2]).unwrap(), None);
        assert_eq!(
            MatMulShape::validate(&[2, 3], &[3, 4], &[2, 4]).unwrap(),
            Some(MatMulShape { m: 2, k: 3, n: 4 })
        );
    }

    #[test]
    fn sum_over_last_axis_is_eligible() {
        let x = f32m(8, 16);
        for axis in [1, -1, 3] {
            assert_eq!(
                classify_sum(&x, &[axis], None),
                Verdict::Eligible(RowSumShape { rows: 8, cols: 16 })
            );
        }
    }

    #[test]
    fn sum_rejects_other_axes_and_layouts() {
        let x = f32m(8, 16);
        assert_eq!(classify_sum(&x, &[0], None), Verdict::Ineligible(Ineligible::Axis(0)));
        assert_eq!(classify_sum(&x, &[], None), Verdict::Ineligible(Ineligible::AxisCount(0)));
        assert_eq!(
            classify_sum(&x, &[0, 1], None),
            Verdict::Ineligible(Ineligible::AxisCount(2))
        );

        let strided: Tensor = Dense::zeros(DType::F32, vec![16, 8]).transpose().into();
        assert_eq!(
            classify_sum(&strided, &[1], None),
            Verdict::Ineligible(Ineligible::Strided)
        );

        let empty: Tensor = Dense::zeros(DType::F32, vec![0, 4]).into();
        assert_eq!(
            classify_sum(&empty, &[1], None),
            Verdict::Ineligible(Ineligible::ZeroSized)
        );

        let wrong_dest: Tensor = Dense::zeros(DType::F64, vec![8]).into();
        assert_eq!(
            classify_sum(&x, &[1], Some(&wrong_dest)),
            Verdict::Ineligible(Ineligible::DType(DType::F64))
        );
    }
}
