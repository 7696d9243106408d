//! Symmetric Gauss-Seidel preconditioner: asynchronous forward/backward
//! sweeps plus a level-scheduled synchronous alternative.

use rayon::prelude::*;

use crate::async_engine::AsyncEngine;
use crate::block::BlockView;
use crate::error::{BlastedResult, InputError};
use crate::matrix::Bsr;
use crate::precond::{InvertedDiagonal, Preconditioner};

/// Forward/backward triangular sweep using `diag(A)^-1`, run either as a
/// chaotic asynchronous iteration (the default `apply`/`apply_relax`) or as
/// a level-scheduled synchronous pass ([`Sgs::apply_sync`]).
pub struct Sgs<const N: usize> {
    mat: Bsr<N>,
    diag: InvertedDiagonal<N>,
    ytemp: Vec<f64>,
    engine: AsyncEngine,
    apply_sweeps: usize,
    levels: Option<Vec<Vec<usize>>>,
}

impl<const N: usize> Sgs<N> {
    pub fn new(mat: Bsr<N>, apply_sweeps: usize, thread_chunk_size: usize) -> Self {
        let nbrows = mat.nbrows();
        Self {
            mat,
            diag: InvertedDiagonal::new(),
            ytemp: vec![0.0; nbrows * N],
            engine: AsyncEngine::new(thread_chunk_size),
            apply_sweeps: apply_sweeps.max(1),
            levels: None,
        }
    }

    pub fn wrap(&mut self, vals: Vec<f64>) -> BlastedResult<()> {
        self.mat.vals_mut().copy_from_slice(&vals);
        Ok(())
    }

    fn check_dims(&self, r: &[f64], z: &[f64]) -> BlastedResult<()> {
        let dim = self.mat.dim();
        if r.len() != dim || z.len() != dim {
            return Err(InputError::DimensionMismatch {
                expected: dim,
                got: r.len(),
            }
            .into());
        }
        Ok(())
    }

    /// One forward update of block-row `i`: `y_i = D_i^-1 (r_i - sum_{j<i} A_ij y_j)`.
    fn forward_row(&self, i: usize, r: &[f64], y: &[std::sync::atomic::AtomicU64]) {
        let mut sum = [0.0; N];
        for k in 0..N {
            sum[k] = r[i * N + k];
        }
        for j in self.mat.row_range(i) {
            let col = self.mat.bcolind()[j];
            if col < i {
                let y_col = load_segment::<N>(y, col);
                self.mat.block(j).mul_acc(-1.0, &y_col, &mut sum);
            }
        }
        let mut out = [0.0; N];
        self.diag_block(i).mul_acc(1.0, &sum, &mut out);
        store_segment::<N>(y, i, &out);
    }

    /// One backward update of block-row `i`:
    /// `z_i = D_i^-1 (A_ii y_i - sum_{j>i} A_ij z_j)`.
    fn backward_row(&self, i: usize, z: &[std::sync::atomic::AtomicU64]) {
        let y_i = &self.ytemp[i * N..(i + 1) * N];
        let mut sum = [0.0; N];
        self.mat.block(self.mat.diagind()[i]).mul_acc(1.0, y_i, &mut sum);
        for j in self.mat.row_range(i) {
            let col = self.mat.bcolind()[j];
            if col > i {
                let z_col = load_segment::<N>(z, col);
                self.mat.block(j).mul_acc(-1.0, &z_col, &mut sum);
            }
        }
        let mut out = [0.0; N];
        self.diag_block(i).mul_acc(1.0, &sum, &mut out);
        store_segment::<N>(z, i, &out);
    }

    fn diag_block(&self, i: usize) -> BlockView<'_, N> {
        self.diag.block(i)
    }

    /// Computes (or recomputes) the level schedule used by
    /// [`Sgs::apply_sync`]: block-row `i`'s level is `1 + max` level of the
    /// block-rows `j < i` that appear in its lower part.
    fn compute_levels(&mut self) {
        let nbrows = self.mat.nbrows();
        let mut level_of = vec![0usize; nbrows];
        for i in 0..nbrows {
            let mut lvl = 0usize;
            for j in self.mat.row_range(i) {
                let col = self.mat.bcolind()[j];
                if col < i {
                    lvl = lvl.max(level_of[col] + 1);
                }
            }
            level_of[i] = lvl;
        }
        let max_level = level_of.iter().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); max_level + 1];
        for (row, &lvl) in level_of.iter().enumerate() {
            levels[lvl].push(row);
        }
        self.levels = Some(levels);
    }

    /// Level-scheduled synchronous SGS apply: rows within a level run in
    /// parallel with a barrier between levels, forward then backward.
    pub fn apply_sync(&mut self, r: &[f64], z: &mut [f64]) -> BlastedResult<()> {
        self.check_dims(r, z)?;
        if self.levels.is_none() {
            self.compute_levels();
        }
        let levels = self.levels.clone().unwrap();
        let dim = self.mat.dim();
        let mut y = vec![0.0; dim];

        for level in &levels {
            level.par_iter().for_each(|&i| {
                let mut sum = [0.0; N];
                for k in 0..N {
                    sum[k] = r[i * N + k];
                }
                for j in self.mat.row_range(i) {
                    let col = self.mat.bcolind()[j];
                    if col < i {
                        self.mat.block(j).mul_acc(-1.0, &y[col * N..(col + 1) * N], &mut sum);
                    }
                }
                let mut out = [0.0; N];
                self.diag_block(i).mul_acc(1.0, &sum, &mut out);
                // Safety: within one level, each row is assigned to exactly
                // one task and no task reads another row's still-unwritten
                // slot (backward dependency only on lower levels).
                unsafe {
                    let ptr = y.as_ptr() as *mut f64;
                    std::ptr::copy_nonoverlapping(out.as_ptr(), ptr.add(i * N), N);
                }
            });
        }

        for level in levels.iter().rev() {
            level.par_iter().for_each(|&i| {
                let mut sum = [0.0; N];
                self.mat.block(self.mat.diagind()[i]).mul_acc(1.0, &y[i * N..(i + 1) * N], &mut sum);
                for j in self.mat.row_range(i) {
                    let col = self.mat.bcolind()[j];
                    if col > i {
                        self.mat.block(j).mul_acc(-1.0, &z[col * N..(col + 1) * N], &mut sum);
                    }
                }
                let mut out = [0.0; N];
                self.diag_block(i).mul_acc(1.0, &sum, &mut out);
                unsafe {
                    let ptr = z.as_ptr() as *mut f64;
                    std::ptr::copy_nonoverlapping(out.as_ptr(), ptr.add(i * N), N);
                }
            });
        }
        Ok(())
    }
}

#[inline]
fn load_segment<const N: usize>(buf: &[std::sync::atomic::AtomicU64], row: usize) -> [f64; N] {
    let mut out = [0.0; N];
    for k in 0..N {
        out[k] = f64::from_bits(buf[row * N + k].load(std::sync::atomic::Ordering::Relaxed));
    }
    out
}

#[inline]
fn store_segment<const N: usize>(buf: &[std::sync::atomic::AtomicU64], row: usize, val: &[f64; N]) {
    for k in 0..N {
        buf[row * N + k].store(val[k].to_bits(), std::sync::atomic::Ordering::Relaxed);
    }
}

impl<const N: usize> Preconditioner<N> for Sgs<N> {
    fn compute(&mut self) -> BlastedResult<()> {
        self.diag.compute(&self.mat)?;
        self.ytemp.resize(self.mat.dim(), 0.0);
        Ok(())
    }

    fn apply(&mut self, r: &[f64], z: &mut [f64]) -> BlastedResult<()> {
        self.check_dims(r, z)?;
        let nbrows = self.mat.nbrows();

        let y_atomic: &[std::sync::atomic::AtomicU64] = unsafe {
            std::slice::from_raw_parts(
                self.ytemp.as_ptr() as *const std::sync::atomic::AtomicU64,
                self.ytemp.len(),
            )
        };
        self.engine
            .run_sweeps(nbrows, self.apply_sweeps, |i| self.forward_row(i, r, y_atomic));

        let z_atomic: &[std::sync::atomic::AtomicU64] = unsafe {
            std::slice::from_raw_parts(z.as_ptr() as *const std::sync::atomic::AtomicU64, z.len())
        };
        self.engine
            .run_sweeps(nbrows, self.apply_sweeps, |i| self.backward_row(i, z_atomic));
        Ok(())
    }

    fn relaxation_available(&self) -> bool {
        true
    }

    fn apply_relax(&mut self, b: &[f64], x: &mut [f64]) -> BlastedResult<()> {
        // A single chaotic forward+backward pass, not the configured
        // napplysweeps count.
        self.check_dims(b, x)?;
        let nbrows = self.mat.nbrows();
        let y_atomic: &[std::sync::atomic::AtomicU64] = unsafe {
            std::slice::from_raw_parts(
                self.ytemp.as_ptr() as *const std::sync::atomic::AtomicU64,
                self.ytemp.len(),
            )
        };
        self.engine.run_sweeps(nbrows, 1, |i| self.forward_row(i, b, y_atomic));
        let x_atomic: &[std::sync::atomic::AtomicU64] = unsafe {
            std::slice::from_raw_parts(x.as_ptr() as *const std::sync::atomic::AtomicU64, x.len())
        };
        self.engine.run_sweeps(nbrows, 1, |i| self.backward_row(i, x_atomic));
        Ok(())
    }

    fn dim(&self) -> usize {
        self.mat.dim()
    }
}
