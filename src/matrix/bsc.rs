//! Block Sparse Column matrix: the column analogue of [`super::bsr::Bsr`],
//! used for format conversion and SAI pattern support (spec.md §4.B, §4.E).

use crate::block::{BlockView, Storage};
use crate::matrix::bsr::Bsr;

pub struct Bsc<const N: usize> {
    nbcols: usize,
    bcolptr: Vec<usize>,
    browind: Vec<usize>,
    diagind: Vec<usize>,
    vals: Vec<f64>,
    stor: Storage,
}

impl<const N: usize> Bsc<N> {
    #[inline]
    pub fn nbcols(&self) -> usize {
        self.nbcols
    }

    #[inline]
    pub fn bcolptr(&self) -> &[usize] {
        &self.bcolptr
    }

    #[inline]
    pub fn browind(&self) -> &[usize] {
        &self.browind
    }

    #[inline]
    pub fn diagind(&self) -> &[usize] {
        &self.diagind
    }

    #[inline]
    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    #[inline]
    pub fn stor(&self) -> Storage {
        self.stor
    }

    #[inline]
    pub fn block(&self, j: usize) -> BlockView<'_, N> {
        BlockView::new(&self.vals[j * N * N..(j + 1) * N * N], self.stor)
    }

    /// Converts a square BSR matrix to BSC (spec.md §4.B).
    ///
    /// Two-pass counting-sort: first tally how many blocks land in each
    /// block-column, prefix-scan into `bcolptr`, then scatter. `O(nnzb)`
    /// time and space, no sorting needed because the scatter preserves
    /// ascending row order within each column automatically (BSR visits rows
    /// in order).
    pub fn from_bsr(mat: &Bsr<N>) -> Self {
        let nbcols = mat.nbrows();
        let nnzb = mat.nnzb();

        let mut bcolptr = vec![0usize; nbcols + 1];
        for &col in mat.bcolind() {
            bcolptr[col + 1] += 1;
        }
        for c in 0..nbcols {
            bcolptr[c + 1] += bcolptr[c];
        }

        let mut browind = vec![0usize; nnzb];
        let mut vals = vec![0.0f64; nnzb * N * N];
        let mut cursor = bcolptr.clone();

        for row in 0..mat.nbrows() {
            for j in mat.row_range(row) {
                let col = mat.bcolind()[j];
                let dest = cursor[col];
                cursor[col] += 1;
                browind[dest] = row;
                vals[dest * N * N..(dest + 1) * N * N]
                    .copy_from_slice(&mat.vals()[j * N * N..(j + 1) * N * N]);
            }
        }

        let mut diagind = vec![0usize; nbcols];
        for c in 0..nbcols {
            let start = bcolptr[c];
            let end = bcolptr[c + 1];
            diagind[c] = (start..end)
                .find(|&k| browind[k] == c)
                .expect("BSR diagonal invariant guarantees every column has a diagonal entry");
        }

        Self {
            nbcols,
            bcolptr,
            browind,
            diagind,
            vals,
            stor: mat.stor(),
        }
    }
}
