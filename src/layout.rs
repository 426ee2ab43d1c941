//! Layout normalization between strided views and canonical buffers.
//!
//! Accelerator programs only understand contiguous row-major `f32` matrices.
//! This module converts a [`Dense`] view of any stride pattern into such a
//! buffer ([`to_canonical`]) and writes a canonical buffer back through a view's
//! strides ([`from_canonical`]). When the view already is canonical no data is
//! copied: the buffer aliases the view's storage.
//!
//! Output buffers are handled by [`OutputTarget`], which hands the accelerator
//! the destination's own storage when it is canonical and a scratch buffer
//! (scattered back on [`OutputTarget::commit`]) otherwise.

use crate::tensors::{DType, Dense};
use std::borrow::Cow;
use std::ops::{Deref, Range};
use thiserror::Error;

/// Why a view cannot be expressed as a canonical `f32` matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Only `f32` views are normalized.
    #[error("expected an f32 tensor, got {0:?}")]
    UnsupportedDType(DType),
    /// Only matrices (or vectors, for reduction outputs) are normalized.
    #[error("expected a rank-{expected} tensor, got rank {actual}")]
    UnsupportedRank {
        /// Rank the normalizer needs.
        expected: usize,
        /// Rank of the view.
        actual: usize,
    },
    /// A dimension is zero.
    #[error("zero-sized tensor {0:?}")]
    ZeroSized(Vec<usize>),
    /// The view addresses elements past the end of its storage.
    #[error("backing storage too small: have {available}, need {required}")]
    OutOfBounds {
        /// Storage length the view needs.
        required: usize,
        /// Storage length available.
        available: usize,
    },
    /// A canonical buffer is shorter than the view it is written into.
    #[error("canonical buffer too small: have {have}, need {need}")]
    BufferTooSmall {
        /// Buffer length.
        have: usize,
        /// Elements in the view.
        need: usize,
    },
}

/// A contiguous row-major `rows x cols` block of `f32`.
///
/// Either borrows a view's storage (zero copy) or owns a materialized copy.
/// Owned buffers are released when the value is dropped; borrowed ones are
/// never released by the normalizer.
#[derive(Debug)]
pub struct CanonicalBuffer<'a> {
    data: Cow<'a, [f32]>,
    rows: usize,
    cols: usize,
}

impl CanonicalBuffer<'_> {
    /// Whether this buffer is a fresh copy rather than an alias.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// The buffer contents.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl Deref for CanonicalBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

fn require_f32(view: &Dense) -> Result<(), LayoutError> {
    match view.dtype() {
        DType::F32 => Ok(()),
        other => Err(LayoutError::UnsupportedDType(other)),
    }
}

fn require_rank(view: &Dense, expected: usize) -> Result<(), LayoutError> {
    if view.rank() != expected {
        return Err(LayoutError::UnsupportedRank {
            expected,
            actual: view.rank(),
        });
    }
    if view.is_empty() {
        return Err(LayoutError::ZeroSized(view.shape().to_vec()));
    }
    Ok(())
}

/// Checks that `view` is a non-empty `f32` matrix and returns `(rows, cols)`.
///
/// # Errors
/// [`LayoutError`] describing the first constraint `view` violates.
pub fn matrix_dims(view: &Dense) -> Result<(usize, usize), LayoutError> {
    require_f32(view)?;
    require_rank(view, 2)?;
    Ok((view.shape()[0], view.shape()[1]))
}

/// Materializes the logical contents of an `f32` matrix view in row-major
/// order.
///
/// Canonical views whose storage covers the matrix are aliased; every other
/// layout is gathered element by element into a fresh buffer.
///
/// # Errors
/// [`LayoutError`] if the view is not a non-empty `f32` matrix or its strides
/// reach past its storage.
pub fn to_canonical(view: &Dense) -> Result<CanonicalBuffer<'_>, LayoutError> {
    let (rows, cols) = matrix_dims(view)?;
    let data = view
        .data::<f32>()
        .ok_or(LayoutError::UnsupportedDType(view.dtype()))?;
    let need = rows * cols;

    if view.is_row_major() {
        let end = view.offset() + need;
        if data.len() < end {
            return Err(LayoutError::OutOfBounds {
                required: end,
                available: data.len(),
            });
        }
        return Ok(CanonicalBuffer {
            data: Cow::Borrowed(&data[view.offset()..end]),
            rows,
            cols,
        });
    }

    let gathered = view
        .offsets()
        .map(|at| data.get(at).copied())
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| LayoutError::OutOfBounds {
            required: view.offsets().max().map_or(0, |at| at + 1),
            available: data.len(),
        })?;

    Ok(CanonicalBuffer {
        data: Cow::Owned(gathered),
        rows,
        cols,
    })
}

/// Writes a row-major buffer into an `f32` matrix view.
///
/// Canonical views receive one contiguous copy; other layouts are scattered
/// element by element through their strides.
///
/// # Errors
/// [`LayoutError`] under the same conditions as [`to_canonical`], or if
/// `buffer` holds fewer than `rows * cols` elements.
pub fn from_canonical(buffer: &[f32], view: &mut Dense) -> Result<(), LayoutError> {
    matrix_dims(view)?;
    scatter(buffer, view)
}

fn scatter(buffer: &[f32], view: &mut Dense) -> Result<(), LayoutError> {
    let need = view.len();
    if buffer.len() < need {
        return Err(LayoutError::BufferTooSmall {
            have: buffer.len(),
            need,
        });
    }

    let offset = view.offset();
    let row_major = view.is_row_major();
    let targets: Vec<usize> = if row_major { Vec::new() } else { view.offsets().collect() };
    let dtype = view.dtype();
    let data = view
        .data_mut::<f32>()
        .ok_or(LayoutError::UnsupportedDType(dtype))?;

    if row_major {
        let end = offset + need;
        if data.len() < end {
            return Err(LayoutError::OutOfBounds {
                required: end,
                available: data.len(),
            });
        }
        data[offset..end].copy_from_slice(&buffer[..need]);
        return Ok(());
    }

    if let Some(&max) = targets.iter().max()
        && max >= data.len()
    {
        return Err(LayoutError::OutOfBounds {
            required: max + 1,
            available: data.len(),
        });
    }
    for (&at, &value) in targets.iter().zip(buffer) {
        data[at] = value;
    }
    Ok(())
}

/// Where an accelerator writes its result.
#[derive(Debug)]
pub enum OutputTarget<'a> {
    /// The destination's own canonical storage.
    Direct {
        /// The canonical destination.
        dest: &'a mut Dense,
        /// Storage range holding the matrix.
        range: Range<usize>,
    },
    /// A scratch buffer, scattered into `dest` on commit.
    Staged {
        /// Row-major scratch space.
        buffer: Vec<f32>,
        /// The view that receives the result.
        dest: &'a mut Dense,
    },
}

impl<'a> OutputTarget<'a> {
    /// Prepares an `f32` matrix destination.
    ///
    /// # Errors
    /// [`LayoutError`] if `dest` is not a non-empty `f32` matrix.
    pub fn matrix(dest: &'a mut Dense) -> Result<Self, LayoutError> {
        let (rows, cols) = matrix_dims(dest)?;
        Ok(Self::with_len(dest, rows * cols))
    }

    /// Prepares a non-empty `f32` vector destination.
    ///
    /// # Errors
    /// [`LayoutError`] if `dest` is not a non-empty rank-1 `f32` tensor.
    pub fn vector(dest: &'a mut Dense) -> Result<Self, LayoutError> {
        require_f32(dest)?;
        require_rank(dest, 1)?;
        let len = dest.len();
        Ok(Self::with_len(dest, len))
    }

    fn with_len(dest: &'a mut Dense, need: usize) -> Self {
        let offset = dest.offset();
        let end = offset + need;
        let direct = dest.is_row_major() && dest.data::<f32>().is_some_and(|d| d.len() >= end);
        if direct {
            Self::Direct {
                dest,
                range: offset..end,
            }
        } else {
            Self::Staged {
                buffer: vec![0.0; need],
                dest,
            }
        }
    }

    /// Whether the accelerator writes straight into the destination.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }

    /// The buffer the accelerator should fill.
    pub fn buffer_mut(&mut self) -> &mut [f32] {
        match self {
            Self::Direct { dest, range } => match dest.data_mut::<f32>() {
                Some(data) => &mut data[range.clone()],
                None => &mut [],
            },
            Self::Staged { buffer, .. } => buffer,
        }
    }

    /// Publishes the result into the destination's logical layout.
    ///
    /// # Errors
    /// [`LayoutError`] if scattering a staged buffer fails.
    pub fn commit(self) -> Result<(), LayoutError> {
        match self {
            Self::Direct { .. } => Ok(()),
            Self::Staged { buffer, dest } => scatter(&buffer, dest),
        }
    }
}
