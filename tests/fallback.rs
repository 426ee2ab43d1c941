use accel_engine::context::{ComputeDevice, EngineContext};
use accel_engine::ops::TensorEngine;
use accel_engine::ops::dispatch::{AccelEngine, CpuEngine, DispatchStats};
use accel_engine::ops::host::HostDevice;
use accel_engine::ops::primitive::{STATUS_ALLOCATION, STATUS_READBACK, STATUS_SUBMISSION};
use accel_engine::tensors::{DType, Dense, Sparse, Tensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fills outputs with garbage and reports a fixed status.
struct Broken(i32);

impl ComputeDevice for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn matmul_f32(&self, _: &[f32], _: &[f32], c: &mut [f32], _: usize, _: usize, _: usize) -> i32 {
        c.fill(f32::NAN);
        self.0
    }

    fn rowsum_f32(&self, _: &[f32], y: &mut [f32], _: usize, _: usize) -> i32 {
        y.fill(f32::NAN);
        self.0
    }
}

/// Counts calls before delegating to the host device.
struct Counting(Arc<AtomicUsize>);

impl ComputeDevice for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn matmul_f32(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) -> i32 {
        self.0.fetch_add(1, Ordering::SeqCst);
        HostDevice.matmul_f32(a, b, c, m, n, k)
    }

    fn rowsum_f32(&self, x: &[f32], y: &mut [f32], rows: usize, cols: usize) -> i32 {
        self.0.fetch_add(1, Ordering::SeqCst);
        HostDevice.rowsum_f32(x, y, rows, cols)
    }
}

fn engine_with(device: impl ComputeDevice + 'static) -> AccelEngine {
    AccelEngine::with_context(Some(EngineContext::from_device(device)))
}

fn counting_engine() -> (AccelEngine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (engine_with(Counting(Arc::clone(&calls))), calls)
}

fn iota(rows: usize, cols: usize) -> Dense {
    Dense::from_vec(vec![rows, cols], (0..rows * cols).map(|v| v as f32 * 0.5).collect())
}

fn values(t: &Tensor) -> Vec<f32> {
    t.as_dense().unwrap().logical_values::<f32>().unwrap()
}

#[test]
fn failed_matmul_is_recomputed() {
    let a: Tensor = iota(3, 4).into();
    let b: Tensor = iota(4, 2).into();
    let mut want: Tensor = Dense::zeros(DType::F32, vec![3, 2]).into();
    CpuEngine.matmul(&a, &b, &mut want).unwrap();

    for status in [STATUS_ALLOCATION, STATUS_SUBMISSION, STATUS_READBACK, 17] {
        let engine = engine_with(Broken(status));
        let mut got: Tensor = Dense::zeros(DType::F32, vec![3, 2]).into();
        engine.matmul(&a, &b, &mut got).unwrap();
        assert_eq!(values(&got), values(&want), "status {status}");
        assert_eq!(
            engine.stats(),
            DispatchStats {
                accelerated: 0,
                ineligible: 0,
                failed: 1
            }
        );
    }
}

#[test]
fn failed_matmul_into_strided_destination_is_recomputed() {
    let a: Tensor = iota(2, 3).into();
    let b: Tensor = iota(3, 2).into();
    let mut got: Tensor = Dense::zeros(DType::F32, vec![2, 2]).transpose().into();
    engine_with(Broken(STATUS_SUBMISSION)).matmul(&a, &b, &mut got).unwrap();

    let mut want: Tensor = Dense::zeros(DType::F32, vec![2, 2]).into();
    CpuEngine.matmul(&a, &b, &mut want).unwrap();
    assert_eq!(values(&got), values(&want));
}

#[test]
fn failed_row_sum_is_recomputed() {
    let x: Tensor = iota(4, 5).into();
    let engine = engine_with(Broken(STATUS_READBACK));
    let got = engine.sum(&x, &[1]).unwrap();
    let want = CpuEngine.sum(&x, &[1]).unwrap();
    assert_eq!(values(&got), values(&want));
    assert_eq!(engine.stats().failed, 1);
}

#[test]
fn ineligible_operations_never_reach_the_device() {
    let (engine, calls) = counting_engine();

    let a64: Tensor = Dense::zeros(DType::F64, vec![2, 2]).into();
    let mut c64: Tensor = Dense::zeros(DType::F64, vec![2, 2]).into();
    engine.matmul(&a64, &a64, &mut c64).unwrap();

    let sparse: Tensor = Sparse::from_entries(vec![2, 2], vec![(vec![1, 0], 2.0f32)]).into();
    let dense: Tensor = iota(2, 2).into();
    let mut c: Tensor = Dense::zeros(DType::F32, vec![2, 2]).into();
    engine.matmul(&sparse, &dense, &mut c).unwrap();
    assert_eq!(values(&c), vec![0.0, 0.0, 0.0, 1.0]);

    let x: Tensor = iota(3, 3).into();
    engine.sum(&x, &[0]).unwrap();
    engine.sum(&x, &[0, 1]).unwrap();
    engine.sum(&iota(3, 3).transpose().into(), &[1]).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.stats().ineligible, 5);
}

#[test]
fn empty_matrices_fail_over_before_the_device() {
    let (engine, calls) = counting_engine();
    let a: Tensor = Dense::zeros(DType::F32, vec![2, 0]).into();
    let b: Tensor = Dense::zeros(DType::F32, vec![0, 3]).into();
    let mut c: Tensor = Dense::from_vec(vec![2, 3], vec![5.0f32; 6]).into();
    engine.matmul(&a, &b, &mut c).unwrap();

    assert_eq!(values(&c), vec![0.0; 6]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.stats().failed, 1);
}

#[test]
fn eligible_operations_reach_the_device_once() {
    let (engine, calls) = counting_engine();
    let a: Tensor = iota(2, 3).into();
    let b: Tensor = iota(3, 4).into();
    let mut c: Tensor = Dense::zeros(DType::F32, vec![2, 4]).into();
    engine.matmul(&a, &b, &mut c).unwrap();
    engine.sum(&a, &[-1]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.stats().accelerated, 2);
}

#[test]
fn context_outlives_engine_and_is_released_once() {
    let (engine, _) = counting_engine();
    let ctx = engine.into_context().unwrap();
    assert_eq!(ctx.device_name(), "counting");

    let reused = AccelEngine::with_context(Some(ctx));
    assert!(reused.has_accelerator());
    if let Some(ctx) = reused.into_context() {
        ctx.release();
    }
}

#[cfg(not(feature = "wgpu"))]
#[test]
fn unavailable_device_degrades_to_reference() {
    use accel_engine::backend::{Backend, EngineConfig};

    let config = EngineConfig::new(Backend::Wgpu);
    assert!(EngineContext::try_create(&config).is_err());

    let engine = AccelEngine::new(&config);
    assert!(!engine.has_accelerator());

    let a: Tensor = iota(3, 4).into();
    let b: Tensor = iota(4, 2).into();
    let mut got: Tensor = Dense::zeros(DType::F32, vec![3, 2]).into();
    let mut want: Tensor = Dense::zeros(DType::F32, vec![3, 2]).into();
    engine.matmul(&a, &b, &mut got).unwrap();
    CpuEngine.matmul(&a, &b, &mut want).unwrap();
    assert_eq!(values(&got), values(&want));

    let got = engine.sum(&a, &[1]).unwrap();
    let want = CpuEngine.sum(&a, &[1]).unwrap();
    assert_eq!(values(&got), values(&want));

    assert_eq!(
        engine.stats(),
        DispatchStats {
            accelerated: 0,
            ineligible: 2,
            failed: 0
        }
    );
}
