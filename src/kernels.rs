//! Data-parallel SpMV / gemv3 kernels over BSR and BSC (spec.md §4.C).
//!
//! No synchronization inside either kernel: each block-row (BSR) or
//! block-column (BSC) is visited by exactly one `rayon` task, and the
//! driver is responsible for not aliasing `x` with the output in the apply
//! path. The BSC kernel is the one exception — multiple block-columns can
//! contribute to the same output row, so it scatters through the per-scalar
//! atomic add in [`crate::matrix::bsr::Bsr`]'s sibling helper.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{BlastedError, InputError};
use crate::matrix::{Bsc, Bsr};

fn check_dims(expected: usize, got: usize) -> Result<(), BlastedError> {
    if expected != got {
        return Err(InputError::DimensionMismatch { expected, got }.into());
    }
    Ok(())
}

/// `y = a * A * x`, parallel over block-rows of `A`.
pub fn spmv<const N: usize>(mat: &Bsr<N>, a: f64, x: &[f64], y: &mut [f64]) -> Result<(), BlastedError> {
    check_dims(mat.dim(), x.len())?;
    check_dims(mat.dim(), y.len())?;

    y.par_chunks_mut(N)
        .enumerate()
        .for_each(|(row, y_seg)| {
            let mut acc = [0.0f64; N];
            for j in mat.row_range(row) {
                let col = mat.bcolind()[j];
                mat.block(j).mul_acc(1.0, &x[col * N..(col + 1) * N], &mut acc);
            }
            for k in 0..N {
                y_seg[k] = a * acc[k];
            }
        });
    Ok(())
}

/// `z = a * A * x + b * y`, parallel over block-rows. `z` and `y` may alias
/// (each row reads its own `y` segment before overwriting the matching `z`
/// segment).
pub fn gemv3<const N: usize>(
    mat: &Bsr<N>,
    a: f64,
    x: &[f64],
    b: f64,
    y: &[f64],
    z: &mut [f64],
) -> Result<(), BlastedError> {
    check_dims(mat.dim(), x.len())?;
    check_dims(mat.dim(), y.len())?;
    check_dims(mat.dim(), z.len())?;

    z.par_chunks_mut(N)
        .enumerate()
        .for_each(|(row, z_seg)| {
            let mut acc = [0.0f64; N];
            for k in 0..N {
                acc[k] = b * y[row * N + k];
            }
            for j in mat.row_range(row) {
                let col = mat.bcolind()[j];
                mat.block(j).mul_acc(a, &x[col * N..(col + 1) * N], &mut acc);
            }
            z_seg.copy_from_slice(&acc);
        });
    Ok(())
}

/// `z = a * A * x + b * y` using the BSC view of `A`. Block-columns run in
/// parallel and scatter-add into `z`'s block-row segments, so the
/// accumulation into `z` uses the atomic-add path; the `b * y` prefill does
/// not race because it happens before any scatter and each row is written
/// exactly once in that phase.
pub fn bsc_gemv3<const N: usize>(
    mat: &Bsc<N>,
    a: f64,
    x: &[f64],
    b: f64,
    y: &[f64],
    z: &mut [f64],
) -> Result<(), BlastedError> {
    let dim = mat.nbcols() * N;
    check_dims(dim, x.len())?;
    check_dims(dim, y.len())?;
    check_dims(dim, z.len())?;

    for i in 0..dim {
        z[i] = b * y[i];
    }

    // Safety: `AtomicU64` and `f64` share size and alignment; every element
    // of `z` from here on is touched only through atomic operations (the
    // `b * y` prefill above is the last plain write), so the aliasing of a
    // shared `&[AtomicU64]` view over the `&mut [f64]` storage is sound.
    let z_atomic: &[AtomicU64] =
        unsafe { std::slice::from_raw_parts(z.as_ptr() as *const AtomicU64, z.len()) };

    (0..mat.nbcols()).into_par_iter().for_each(|col| {
        let start = mat.bcolptr()[col];
        let end = mat.bcolptr()[col + 1];
        let x_seg = &x[col * N..(col + 1) * N];
        for k in start..end {
            let row = mat.browind()[k];
            let mut contrib = [0.0f64; N];
            mat.block(k).mul_acc(a, x_seg, &mut contrib);
            for r in 0..N {
                atomic_add(&z_atomic[row * N + r], contrib[r]);
            }
        }
    });
    Ok(())
}

#[inline]
fn atomic_add(slot: &AtomicU64, delta: f64) {
    let mut current = slot.load(Ordering::Relaxed);
    loop {
        let new = f64::from_bits(current) + delta;
        match slot.compare_exchange_weak(current, new.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}
