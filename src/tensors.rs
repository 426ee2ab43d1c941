//! Core tensor data structures.
//!
//! # Tensor Views
//!
//! A [`Dense`] tensor is a view: a shape, per-dimension strides (in elements)
//! and an offset over a flat, dtype-tagged [`Storage`] block. The view is
//! *canonical row-major* when the last stride is `1` and every other stride is
//! the product of the next dimension's size and stride. Transposes, permutes
//! and slices only rewrite the stride description; they never move data.
//!
//! [`Sparse`] is a coordinate-list tensor. Together the two form the closed
//! [`Tensor`] enum that every engine operation accepts.
//!
//! ## Design Highlights
//! - Element types are a closed set ([`DType`]), matched exhaustively
//! - Shapes and strides are runtime `Vec<usize>`s
//! - The [`tensor!`](crate::tensor) macro builds dense tensors from literals
//!
//! ## Example
//!
//! ```rust
//! use accel_engine::tensors::Dense;
//! let t = Dense::from_vec(vec![2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape(), &[2, 3]);
//! let tt = t.transpose();
//! assert_eq!(tt.shape(), &[3, 2]);
//! assert!(!tt.is_row_major());
//! ```

use crate::error::KernelError;
use crate::layout::LayoutError;
use briny::prelude::{Validate, ValidationError};
use std::borrow::Cow;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Range};

/// Element types a tensor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
}

/// Flat backing storage, tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// `f32` elements.
    F32(Vec<f32>),
    /// `f64` elements.
    F64(Vec<f64>),
}

impl Storage {
    /// A zero-filled block of `len` elements.
    #[must_use]
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Self::F32(vec![0.0; len]),
            DType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// The element type of this block.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }

    /// Number of elements in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Whether the block holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A scalar type that can back a tensor.
///
/// Implemented for `f32` and `f64` only.
pub trait Element:
    sealed::Sealed
    + Copy
    + Default
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + 'static
{
    /// The [`DType`] tag for this scalar.
    const DTYPE: DType;

    /// Borrows the storage as `&[Self]` if the tags agree.
    fn slice(storage: &Storage) -> Option<&[Self]>;

    /// Borrows the storage as `&mut [Self]` if the tags agree.
    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]>;

    /// Wraps a vector in a tagged storage block.
    fn into_storage(data: Vec<Self>) -> Storage;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::F32(v) => Some(v),
            Storage::F64(_) => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::F32(v) => Some(v),
            Storage::F64(_) => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::F32(data)
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn slice(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::F64(v) => Some(v),
            Storage::F32(_) => None,
        }
    }

    fn slice_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::F64(v) => Some(v),
            Storage::F32(_) => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::F64(data)
    }
}

/// Canonical row-major strides for `shape`.
#[must_use]
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

/// Stride description checked against the size of its storage.
struct ViewBounds<'a> {
    shape: &'a [usize],
    strides: &'a [usize],
    offset: usize,
    available: usize,
}

impl ViewBounds<'_> {
    /// One past the highest storage offset the view can address.
    ///
    /// `None` if that offset does not fit in a `usize`.
    fn required(&self) -> Option<usize> {
        if self.shape.contains(&0) {
            return Some(0);
        }
        self.shape
            .iter()
            .zip(self.strides)
            .try_fold(self.offset, |end, (&dim, &stride)| {
                end.checked_add((dim - 1).checked_mul(stride)?)
            })?
            .checked_add(1)
    }
}

impl Validate for ViewBounds<'_> {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.shape.len() != self.strides.len() {
            return Err(ValidationError);
        }
        match self.required() {
            Some(required) if required <= self.available => Ok(()),
            _ => Err(ValidationError),
        }
    }
}

/// A strided, possibly non-contiguous view over dense storage.
#[derive(Debug, Clone)]
pub struct Dense {
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    storage: Storage,
}

impl Dense {
    /// Creates a canonical row-major tensor over `storage`.
    ///
    /// # Panics
    /// Panics if the number of elements in `storage` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, storage: Storage) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            storage.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            storage.len()
        );
        let strides = row_major_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
            storage,
        }
    }

    /// Creates a canonical row-major tensor from a flat vector.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn from_vec<T: Element>(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        Self::new(shape, T::into_storage(data))
    }

    /// A zero-filled canonical tensor.
    pub fn zeros(dtype: DType, shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self::new(shape, Storage::zeros(dtype, len))
    }

    /// Builds an arbitrary view, checking that every addressable element lies
    /// inside `storage`.
    ///
    /// # Errors
    /// [`LayoutError::OutOfBounds`] if the strides reach past the storage, or
    /// if `shape` and `strides` have different lengths.
    pub fn from_parts(
        shape: impl Into<Vec<usize>>,
        strides: impl Into<Vec<usize>>,
        offset: usize,
        storage: Storage,
    ) -> Result<Self, LayoutError> {
        let shape = shape.into();
        let strides = strides.into();
        let bounds = ViewBounds {
            shape: &shape,
            strides: &strides,
            offset,
            available: storage.len(),
        };
        if bounds.validate().is_err() {
            return Err(LayoutError::OutOfBounds {
                required: bounds.required().unwrap_or(usize::MAX),
                available: storage.len(),
            });
        }
        Ok(Self {
            shape,
            strides,
            offset,
            storage,
        })
    }

    /// Logical shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Per-dimension element strides.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Storage offset of the logical origin.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Backing storage.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the view addresses no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the strides describe canonical row-major order.
    #[must_use]
    pub fn is_row_major(&self) -> bool {
        let rank = self.shape.len();
        if rank == 0 {
            return true;
        }
        if self.strides[rank - 1] != 1 {
            return false;
        }
        (0..rank - 1).all(|i| self.strides[i] == self.shape[i + 1] * self.strides[i + 1])
    }

    /// Whether reading the view in logical order needs stride arithmetic,
    /// i.e. it cannot be addressed as one flat run of storage.
    #[must_use]
    pub fn requires_iterator(&self) -> bool {
        !self.is_row_major()
    }

    /// The whole backing block as `&[T]`, ignoring the view.
    #[must_use]
    pub fn data<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.storage)
    }

    /// The whole backing block as `&mut [T]`, ignoring the view.
    pub fn data_mut<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(&mut self.storage)
    }

    /// Storage offset of a logical index.
    ///
    /// # Panics
    /// Panics if `index` has the wrong length or is out of range.
    #[must_use]
    pub fn offset_of(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.rank(), "index rank mismatch");
        self.offset
            + index
                .iter()
                .zip(&self.shape)
                .zip(&self.strides)
                .map(|((&i, &dim), &stride)| {
                    assert!(i < dim, "index {i} out of range for dimension of size {dim}");
                    i * stride
                })
                .sum::<usize>()
    }

    /// Reads one element.
    ///
    /// Returns `None` if `T` is not the tensor's element type.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn get<T: Element>(&self, index: &[usize]) -> Option<T> {
        let at = self.offset_of(index);
        self.data::<T>().map(|data| data[at])
    }

    /// Storage offsets of every logical element, in row-major logical order.
    #[must_use]
    pub fn offsets(&self) -> Offsets<'_> {
        Offsets {
            shape: &self.shape,
            strides: &self.strides,
            coord: vec![0; self.shape.len()],
            next: self.offset,
            remaining: self.len(),
        }
    }

    /// Gathers the logical contents in row-major order.
    ///
    /// Returns `None` if `T` is not the tensor's element type.
    #[must_use]
    pub fn logical_values<T: Element>(&self) -> Option<Vec<T>> {
        let data = self.data::<T>()?;
        Some(self.offsets().map(|at| data[at]).collect())
    }

    /// A canonical row-major copy of this view.
    #[must_use]
    pub fn to_contiguous(&self) -> Self {
        let storage = match &self.storage {
            Storage::F32(data) => Storage::F32(self.offsets().map(|at| data[at]).collect()),
            Storage::F64(data) => Storage::F64(self.offsets().map(|at| data[at]).collect()),
        };
        Self::new(self.shape.clone(), storage)
    }

    /// Reverses the axis order (a matrix transpose for rank 2).
    #[must_use]
    pub fn transpose(mut self) -> Self {
        self.shape.reverse();
        self.strides.reverse();
        self
    }

    /// Reorders axes so that new axis `i` is old axis `axes[i]`.
    ///
    /// # Panics
    /// Panics if `axes` is not a permutation of `0..rank`.
    #[must_use]
    pub fn permute(self, axes: &[usize]) -> Self {
        let rank = self.rank();
        assert_eq!(axes.len(), rank, "permutation length mismatch");
        let mut seen = vec![false; rank];
        for &axis in axes {
            assert!(axis < rank && !seen[axis], "invalid permutation {axes:?}");
            seen[axis] = true;
        }
        let shape = axes.iter().map(|&a| self.shape[a]).collect();
        let strides = axes.iter().map(|&a| self.strides[a]).collect();
        Self {
            shape,
            strides,
            offset: self.offset,
            storage: self.storage,
        }
    }

    /// Restricts leading dimensions to the given ranges.
    ///
    /// Dimensions past `ranges.len()` are kept whole.
    ///
    /// # Panics
    /// Panics if there are more ranges than dimensions or a range exceeds its dimension.
    #[must_use]
    pub fn slice(mut self, ranges: &[Range<usize>]) -> Self {
        assert!(ranges.len() <= self.rank(), "too many slice ranges");
        for (axis, range) in ranges.iter().enumerate() {
            assert!(
                range.start <= range.end && range.end <= self.shape[axis],
                "slice {range:?} out of range for dimension of size {}",
                self.shape[axis]
            );
            if range.start < range.end {
                self.offset += range.start * self.strides[axis];
            }
            self.shape[axis] = range.end - range.start;
        }
        self
    }

    /// Overwrites every logical element with the matching element of `src`.
    ///
    /// # Errors
    /// [`KernelError::DType`] or [`KernelError::Shape`] if the tensors are not
    /// of the same element type and shape.
    pub fn assign(&mut self, src: &Self) -> Result<(), KernelError> {
        if self.dtype() != src.dtype() {
            return Err(KernelError::DType {
                op: "assign",
                lhs: self.dtype(),
                rhs: src.dtype(),
            });
        }
        if self.shape != src.shape {
            return Err(KernelError::Shape {
                op: "assign",
                lhs: self.shape.clone(),
                rhs: src.shape.clone(),
            });
        }
        let targets: Vec<usize> = self.offsets().collect();
        match (&mut self.storage, &src.storage) {
            (Storage::F32(dst), Storage::F32(data)) => {
                for (to, from) in targets.into_iter().zip(src.offsets()) {
                    dst[to] = data[from];
                }
            }
            (Storage::F64(dst), Storage::F64(data)) => {
                for (to, from) in targets.into_iter().zip(src.offsets()) {
                    dst[to] = data[from];
                }
            }
            _ => unreachable!("dtypes checked above"),
        }
        Ok(())
    }
}

/// Iterator over the storage offsets of a [`Dense`] view in logical order.
#[derive(Debug, Clone)]
pub struct Offsets<'a> {
    shape: &'a [usize],
    strides: &'a [usize],
    coord: Vec<usize>,
    next: usize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            for axis in (0..self.shape.len()).rev() {
                self.coord[axis] += 1;
                if self.coord[axis] < self.shape[axis] {
                    self.next += self.strides[axis];
                    break;
                }
                self.next -= (self.shape[axis] - 1) * self.strides[axis];
                self.coord[axis] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}

/// A coordinate-list sparse tensor.
#[derive(Debug, Clone)]
pub struct Sparse {
    shape: Vec<usize>,
    indices: Vec<Vec<usize>>,
    values: Storage,
}

impl Sparse {
    /// Creates a sparse tensor from coordinates and matching values.
    ///
    /// Repeated coordinates accumulate when densified.
    ///
    /// # Panics
    /// Panics if the coordinate and value counts differ, or a coordinate does
    /// not fit `shape`.
    pub fn new(shape: impl Into<Vec<usize>>, indices: Vec<Vec<usize>>, values: Storage) -> Self {
        let shape = shape.into();
        assert_eq!(indices.len(), values.len(), "coordinate/value count mismatch");
        for index in &indices {
            assert!(
                index.len() == shape.len() && index.iter().zip(&shape).all(|(&i, &d)| i < d),
                "coordinate {index:?} out of range for shape {shape:?}"
            );
        }
        Self {
            shape,
            indices,
            values,
        }
    }

    /// Creates a sparse tensor from `(coordinate, value)` pairs.
    ///
    /// # Panics
    /// Same conditions as [`Sparse::new`].
    pub fn from_entries<T: Element>(shape: impl Into<Vec<usize>>, entries: Vec<(Vec<usize>, T)>) -> Self {
        let (indices, values): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Self::new(shape, indices, T::into_storage(values))
    }

    /// Logical shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Materializes the tensor as a canonical dense tensor.
    #[must_use]
    pub fn to_dense(&self) -> Dense {
        let mut dense = Dense::zeros(self.dtype(), self.shape.clone());
        let positions: Vec<usize> = self.indices.iter().map(|i| dense.offset_of(i)).collect();
        match (&mut dense.storage, &self.values) {
            (Storage::F32(dst), Storage::F32(src)) => scatter_add(dst, &positions, src),
            (Storage::F64(dst), Storage::F64(src)) => scatter_add(dst, &positions, src),
            _ => unreachable!("zeros() uses the sparse dtype"),
        }
        dense
    }
}

fn scatter_add<T: Element>(dst: &mut [T], positions: &[usize], values: &[T]) {
    for (&at, &value) in positions.iter().zip(values) {
        dst[at] += value;
    }
}

/// Any tensor the engine accepts.
#[derive(Debug, Clone)]
pub enum Tensor {
    /// Strided dense storage.
    Dense(Dense),
    /// Coordinate-list storage.
    Sparse(Sparse),
}

impl Tensor {
    /// Logical shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Dense(d) => d.shape(),
            Self::Sparse(s) => s.shape(),
        }
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Self::Dense(d) => d.dtype(),
            Self::Sparse(s) => s.dtype(),
        }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// The dense view, if this is a dense tensor.
    #[must_use]
    pub const fn as_dense(&self) -> Option<&Dense> {
        match self {
            Self::Dense(d) => Some(d),
            Self::Sparse(_) => None,
        }
    }

    /// The mutable dense view, if this is a dense tensor.
    pub fn as_dense_mut(&mut self) -> Option<&mut Dense> {
        match self {
            Self::Dense(d) => Some(d),
            Self::Sparse(_) => None,
        }
    }

    /// A dense rendering, borrowed when already dense.
    #[must_use]
    pub fn to_dense(&self) -> Cow<'_, Dense> {
        match self {
            Self::Dense(d) => Cow::Borrowed(d),
            Self::Sparse(s) => Cow::Owned(s.to_dense()),
        }
    }
}

impl From<Dense> for Tensor {
    fn from(dense: Dense) -> Self {
        Self::Dense(dense)
    }
}

impl From<Sparse> for Tensor {
    fn from(sparse: Sparse) -> Self {
        Self::Sparse(sparse)
    }
}

/// Defines a dense tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
/// Unsuffixed float literals produce an `f64` tensor; suffix them with `f32`
/// for single precision.
///
/// # Example
/// ```
/// use accel_engine::tensor;
/// let t = tensor!([[1.0f32, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape(), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    (@parts $lit:literal) => {
        (Vec::<usize>::new(), vec![$lit])
    };

    (@parts [ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!(@parts $inner) ),+ ];
        let first_shape = children[0].0.clone();
        assert!(children.iter().all(|c| c.0 == first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(&first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].1.len());
        for c in children { data.extend(c.1); }
        (shape, data)
    }};

    ($($t:tt)+) => {{
        let (shape, data) = $crate::tensor!(@parts $($t)+);
        $crate::tensors::Dense::from_vec(shape, data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: &[usize]) -> Dense {
        let len = shape.iter().product::<usize>();
        Dense::from_vec(shape.to_vec(), (0..len).map(|v| v as f32).collect())
    }

    #[test]
    fn fresh_tensor_is_row_major() {
        let t = iota(&[3, 4]);
        assert_eq!(t.strides(), &[4, 1]);
        assert!(t.is_row_major());
        assert!(!t.requires_iterator());
    }

    #[test]
    fn transpose_swaps_strides() {
        let t = iota(&[2, 3]).transpose();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.strides(), &[1, 3]);
        assert!(t.requires_iterator());
        assert_eq!(
            t.logical_values::<f32>().unwrap(),
            vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]
        );
    }

    #[test]
    fn column_slice_keeps_parent_strides() {
        let t = iota(&[3, 4]).slice(&[0..3, 1..3]);
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.offset(), 1);
        assert!(!t.is_row_major());
        assert_eq!(
            t.logical_values::<f32>().unwrap(),
            vec![1.0, 2.0, 5.0, 6.0, 9.0, 10.0]
        );
    }

    #[test]
    fn row_slice_stays_row_major() {
        let t = iota(&[4, 3]).slice(&[1..3]);
        assert!(t.is_row_major());
        assert_eq!(t.offset(), 3);
        assert_eq!(t.get::<f32>(&[1, 2]), Some(8.0));
    }

    #[test]
    fn offsets_cover_rank_zero_and_empty() {
        let scalar = Dense::from_vec(Vec::<usize>::new(), vec![7.0f64]);
        assert_eq!(scalar.offsets().collect::<Vec<_>>(), vec![0]);
        let empty = Dense::zeros(DType::F32, vec![0, 5]);
        assert_eq!(empty.offsets().count(), 0);
    }

    #[test]
    fn from_parts_rejects_out_of_bounds_strides() {
        let storage = Storage::zeros(DType::F32, 6);
        let err = Dense::from_parts(vec![2, 3], vec![4, 1], 0, storage).unwrap_err();
        assert_eq!(
            err,
            LayoutError::OutOfBounds {
                required: 7,
                available: 6
            }
        );
    }

    #[test]
    fn to_contiguous_packs_a_permuted_view() {
        let t = iota(&[2, 3, 2]).permute(&[2, 0, 1]).to_contiguous();
        assert_eq!(t.shape(), &[2, 2, 3]);
        assert!(t.is_row_major());
        assert_eq!(t.offset(), 0);
        assert_eq!(
            t.data::<f32>().unwrap(),
            &[0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 1.0, 3.0, 5.0, 7.0, 9.0, 11.0]
        );
    }

    #[test]
    fn from_parts_rejects_overflowing_strides() {
        let storage = Storage::zeros(DType::F32, 1);
        let err = Dense::from_parts(vec![2], vec![usize::MAX], 0, storage).unwrap_err();
        assert_eq!(
            err,
            LayoutError::OutOfBounds {
                required: usize::MAX,
                available: 1
            }
        );

        let storage = Storage::zeros(DType::F32, 4);
        assert!(Dense::from_parts(vec![1], vec![usize::MAX], usize::MAX, storage).is_err());
    }

    #[test]
    fn assign_scatters_into_view() {
        let mut dst = Dense::zeros(DType::F32, vec![3, 2]).transpose();
        let src = iota(&[2, 3]);
        dst.assign(&src).unwrap();
        assert_eq!(dst.logical_values::<f32>(), src.logical_values::<f32>());
        assert_eq!(dst.data::<f32>().unwrap(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn sparse_densifies_with_accumulation() {
        let s = Sparse::from_entries(
            vec![2, 2],
            vec![(vec![0, 1], 2.0f32), (vec![1, 0], 3.0), (vec![0, 1], 1.0)],
        );
        assert_eq!(s.nnz(), 3);
        let d = s.to_dense();
        assert_eq!(d.logical_values::<f32>().unwrap(), vec![0.0, 3.0, 3.0, 0.0]);
    }

    #[test]
    fn tensor_macro_builds_nested_shapes() {
        let t = crate::tensor!([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        let d = crate::tensor!([1.0, 2.0]);
        assert_eq!(d.dtype(), DType::F64);
    }
}
