//! In-process reference device.
//!
//! [`HostDevice`] implements the accelerator contract on the host CPU, one
//! rayon task per output row, so the full dispatch path can run on machines
//! without a GPU. Arguments are checked the same way a real device checks them.

use super::primitive::{
    STATUS_INVALID_ARGUMENT, STATUS_OK, matmul_args_valid, rowsum_args_valid,
};
use crate::context::ComputeDevice;
use rayon::prelude::*;

/// Reference implementation of [`ComputeDevice`] over host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDevice;

impl HostDevice {
    /// Creates the device.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ComputeDevice for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn matmul_f32(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) -> i32 {
        if !matmul_args_valid(a.len(), b.len(), c.len(), m, n, k) {
            return STATUS_INVALID_ARGUMENT;
        }
        c.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            let lhs = &a[i * k..(i + 1) * k];
            for (j, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (l, &x) in lhs.iter().enumerate() {
                    acc += x * b[l * n + j];
                }
                *out = acc;
            }
        });
        STATUS_OK
    }

    fn rowsum_f32(&self, x: &[f32], y: &mut [f32], rows: usize, cols: usize) -> i32 {
        if !rowsum_args_valid(x.len(), y.len(), rows, cols) {
            return STATUS_INVALID_ARGUMENT;
        }
        y.par_iter_mut()
            .zip(x.par_chunks(cols))
            .for_each(|(out, row)| *out = row.iter().sum());
        STATUS_OK
    }
}
