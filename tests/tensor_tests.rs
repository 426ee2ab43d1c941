use accel_engine::layout::{self, LayoutError};
use accel_engine::tensor;
use accel_engine::tensors::{DType, Dense, Sparse, Storage, Tensor};

fn iota(rows: usize, cols: usize) -> Dense {
    Dense::from_vec(vec![rows, cols], (0..rows * cols).map(|v| v as f32).collect())
}

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Dense::from_vec(vec![2, 2], vec![1.0f32, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_tensor_macro_shapes() {
    let t = tensor!([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    assert_eq!(t.shape(), &[2, 3]);
    assert_eq!(t.dtype(), DType::F32);

    let cube = tensor!([[[1.0, 2.0], [3.0, 4.0]], [[5.0, 6.0], [7.0, 8.0]]]);
    assert_eq!(cube.shape(), &[2, 2, 2]);
    assert_eq!(cube.dtype(), DType::F64);
    assert_eq!(cube.get::<f64>(&[1, 0, 1]), Some(6.0));
}

#[test]
fn test_round_trip_transposed_view() {
    let src = iota(3, 5).transpose();
    let buffer = layout::to_canonical(&src).unwrap();
    assert!(buffer.is_owned());
    assert_eq!((buffer.rows(), buffer.cols()), (5, 3));

    let mut dst = Dense::zeros(DType::F32, vec![3, 5]).transpose();
    layout::from_canonical(&buffer, &mut dst).unwrap();
    assert_eq!(dst.logical_values::<f32>(), src.logical_values::<f32>());
}

#[test]
fn test_round_trip_sliced_view() {
    let src = iota(6, 6).slice(&[2..5, 1..4]);
    let buffer = layout::to_canonical(&src).unwrap();
    assert_eq!(buffer.as_slice(), &[13.0, 14.0, 15.0, 19.0, 20.0, 21.0, 25.0, 26.0, 27.0]);

    let mut dst = Dense::zeros(DType::F32, vec![4, 4]).slice(&[1..4, 0..3]);
    layout::from_canonical(&buffer, &mut dst).unwrap();
    assert_eq!(dst.logical_values::<f32>(), src.logical_values::<f32>());
    // Column 3 and row 0 of the parent are outside the window.
    assert_eq!(dst.data::<f32>().unwrap()[..4], [0.0; 4]);
    assert_eq!(dst.data::<f32>().unwrap()[7], 0.0);
}

#[test]
fn test_canonical_rows_alias_storage() {
    let src = iota(6, 4).slice(&[2..4]);
    let buffer = layout::to_canonical(&src).unwrap();
    assert!(!buffer.is_owned());
    assert_eq!(&buffer[..], &[8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
}

#[test]
fn test_unsupported_layouts() {
    let f64m = Dense::zeros(DType::F64, vec![2, 2]);
    assert_eq!(
        layout::to_canonical(&f64m).unwrap_err(),
        LayoutError::UnsupportedDType(DType::F64)
    );

    let vector = Dense::zeros(DType::F32, vec![4]);
    assert_eq!(
        layout::matrix_dims(&vector).unwrap_err(),
        LayoutError::UnsupportedRank {
            expected: 2,
            actual: 1
        }
    );

    let empty = Dense::zeros(DType::F32, vec![0, 3]);
    assert_eq!(
        layout::to_canonical(&empty).unwrap_err(),
        LayoutError::ZeroSized(vec![0, 3])
    );
}

#[test]
fn test_view_bounds_are_checked() {
    let storage = Storage::F32(vec![0.0; 6]);
    assert!(matches!(
        Dense::from_parts(vec![2, 3], vec![3, 2], 0, storage),
        Err(LayoutError::OutOfBounds { .. })
    ));
}

#[test]
fn test_sparse_to_dense_accumulates() {
    let sparse = Sparse::from_entries(
        vec![2, 3],
        vec![(vec![0, 1], 1.5f32), (vec![1, 2], 2.0), (vec![0, 1], 0.5)],
    );
    assert_eq!(sparse.nnz(), 3);
    let dense = Tensor::from(sparse).to_dense().into_owned();
    assert_eq!(
        dense.logical_values::<f32>().unwrap(),
        vec![0.0, 2.0, 0.0, 0.0, 0.0, 2.0]
    );
}
