//! Preconditioner capability trait and shared composition pieces.
//!
//! spec.md §9 flattens the source's deep class hierarchy
//! (`Preconditioner ← SRPreconditioner ← JacobiSR ← ABSGS …`) into a trait
//! plus composition: every algorithm implements [`Preconditioner`], and the
//! diagonal-inversion logic shared by Jacobi and SGS lives once, in
//! [`InvertedDiagonal`], held by both rather than inherited.

pub mod ilu0;
pub mod jacobi;
pub mod sgs;

use rayon::prelude::*;

use crate::block::{invert_block, BlockView, BlockViewMut, Storage};
use crate::error::{BlastedError, BlastedResult, InputError};
use crate::matrix::Bsr;

/// `{compute, apply, apply_relax?, dim}` — the capability every
/// preconditioner/relaxation exposes to an outer Krylov driver (spec.md §6).
pub trait Preconditioner<const N: usize> {
    /// Builds factor/inverse state from the currently-bound matrix values.
    fn compute(&mut self) -> BlastedResult<()>;

    /// Produces `z ≈ M⁻¹ r`.
    fn apply(&mut self, r: &[f64], z: &mut [f64]) -> BlastedResult<()>;

    /// Whether [`Preconditioner::apply_relax`] is implemented for this
    /// algorithm.
    fn relaxation_available(&self) -> bool {
        false
    }

    /// Performs one in-place relaxation sweep: `x` holds the current
    /// iterate and is updated using right-hand side `b`. Unlike
    /// [`Preconditioner::apply`], a relaxation call does a single sweep
    /// (or a single forward+backward pass for SGS) using whatever counts
    /// the algorithm's relaxation variant is defined with, never the
    /// preconditioner's own `nbuildsweeps`/`napplysweeps` (spec.md §4.F,
    /// "Relaxation vs preconditioner").
    fn apply_relax(&mut self, _b: &[f64], _x: &mut [f64]) -> BlastedResult<()> {
        Err(BlastedError::Input(InputError::DimensionMismatch {
            expected: 0,
            got: 0,
        }))
    }

    /// Dimension of the system (`nbrows * bs`).
    fn dim(&self) -> usize;
}

/// Owns the per-block-row inverse of `A`'s diagonal block. Shared by
/// [`jacobi::Jacobi`] and [`sgs::Sgs`] (spec.md §9: "composition ... an
/// `InvertedDiagonal` struct held by both Jacobi and SGS").
pub struct InvertedDiagonal<const N: usize> {
    dblocks: Option<Vec<f64>>,
}

impl<const N: usize> InvertedDiagonal<N> {
    pub fn new() -> Self {
        Self { dblocks: None }
    }

    /// Inverts every diagonal block of `mat`, allocating `dblocks` on first
    /// call and reusing it on subsequent calls (spec.md §4.D). Always
    /// stores inverses row-major, independent of `mat`'s storage order, so
    /// the apply kernel doesn't need to know `mat`'s `stor`.
    pub fn compute(&mut self, mat: &Bsr<N>) -> BlastedResult<()> {
        let nbrows = mat.nbrows();
        let mut dblocks = self
            .dblocks
            .take()
            .filter(|v| v.len() == nbrows * N * N)
            .unwrap_or_else(|| vec![0.0; nbrows * N * N]);

        dblocks
            .par_chunks_mut(N * N)
            .enumerate()
            .try_for_each(|(i, chunk)| -> BlastedResult<()> {
                let dense = mat.block(mat.diagind()[i]).to_dense();
                let inv = invert_block(&dense, i)?;
                BlockViewMut::<N>::new(chunk, Storage::RowMajor).copy_from_dense(&inv);
                Ok(())
            })?;

        self.dblocks = Some(dblocks);
        Ok(())
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.dblocks.is_some()
    }

    /// Row-major view of block-row `i`'s inverted diagonal block. Used by
    /// [`sgs::Sgs`] to fold the shared inverse into its own triangular
    /// sweeps instead of duplicating the inversion.
    pub(crate) fn block(&self, i: usize) -> BlockView<'_, N> {
        let dblocks = self.dblocks.as_ref().expect("compute() must run before block()");
        BlockView::<N>::new(&dblocks[i * N * N..(i + 1) * N * N], Storage::RowMajor)
    }

    /// `z = dblocks * r`, block-wise, parallel over block-rows.
    pub fn apply(&self, r: &[f64], z: &mut [f64]) -> BlastedResult<()> {
        let dblocks = self.dblocks.as_ref().ok_or(BlastedError::Input(
            InputError::DimensionMismatch { expected: 1, got: 0 },
        ))?;
        let nbrows = dblocks.len() / (N * N);
        if r.len() != nbrows * N || z.len() != nbrows * N {
            return Err(InputError::DimensionMismatch {
                expected: nbrows * N,
                got: r.len(),
            }
            .into());
        }

        z.par_chunks_mut(N).enumerate().for_each(|(i, z_seg)| {
            let block = BlockView::<N>::new(&dblocks[i * N * N..(i + 1) * N * N], Storage::RowMajor);
            let r_seg = &r[i * N..(i + 1) * N];
            let mut acc = [0.0; N];
            block.mul_acc(1.0, r_seg, &mut acc);
            z_seg.copy_from_slice(&acc);
        });
        Ok(())
    }

    /// One weighted-Jacobi relaxation sweep in place: `x += dblocks * (b - A*x)`.
    pub fn relax(&self, mat: &Bsr<N>, b: &[f64], x: &mut [f64]) -> BlastedResult<()> {
        let dblocks = self.dblocks.as_ref().ok_or(BlastedError::Input(
            InputError::DimensionMismatch { expected: 1, got: 0 },
        ))?;

        let nbrows = mat.nbrows();
        let mut updated = vec![0.0; nbrows * N];
        updated
            .par_chunks_mut(N)
            .enumerate()
            .for_each(|(i, out)| {
                let mut residual = [0.0; N];
                for k in 0..N {
                    residual[k] = b[i * N + k];
                }
                for j in mat.row_range(i) {
                    let col = mat.bcolind()[j];
                    mat.block(j).mul_acc(-1.0, &x[col * N..(col + 1) * N], &mut residual);
                }
                let dblk = BlockView::<N>::new(&dblocks[i * N * N..(i + 1) * N * N], Storage::RowMajor);
                let mut correction = [0.0; N];
                dblk.mul_acc(1.0, &residual, &mut correction);
                for k in 0..N {
                    out[k] = x[i * N + k] + correction[k];
                }
            });
        x.copy_from_slice(&updated);
        Ok(())
    }
}

impl<const N: usize> Default for InvertedDiagonal<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity preconditioner/relaxation: `apply` copies `r` into `z`
/// unchanged. Used when an outer driver is benchmarked unpreconditioned
/// without special-casing the call site.
pub struct NoPreconditioner<const N: usize> {
    dim: usize,
}

impl<const N: usize> NoPreconditioner<N> {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl<const N: usize> Preconditioner<N> for NoPreconditioner<N> {
    fn compute(&mut self) -> BlastedResult<()> {
        Ok(())
    }

    fn apply(&mut self, r: &[f64], z: &mut [f64]) -> BlastedResult<()> {
        if r.len() != self.dim || z.len() != self.dim {
            return Err(InputError::DimensionMismatch {
                expected: self.dim,
                got: r.len(),
            }
            .into());
        }
        z.copy_from_slice(r);
        Ok(())
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
