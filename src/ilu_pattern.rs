//! ILU(0) symbolic support: precomputes, once per sparsity pattern, the list
//! of `(lower, upper)` position pairs each stored nonzero needs during an
//! asynchronous ILU(0) sweep (spec.md §4.E).
//!
//! Ported from BLASTed's `compute_ILU_positions_CSR_CSR`: for a lower entry
//! `l_{i,c}` at flat position `j` (row `i`, column `c = bcolind[j]`, `i > c`),
//! every `k` in row `i` with `bcolind[k] < c` contributes a product
//! `L_{i,bcolind[k]} * U_{bcolind[k],c}`; the position of that `U` entry is
//! found by binary search in row `bcolind[k]`, restricted to the diagonal
//! and beyond (the upper part). For an upper entry `u_{i,c}` (`i <= c`), the
//! same walk runs over the lower part of row `i` (`bcolind[k] < i`) and
//! looks up `L_{bcolind[k],c}` — wait, the matching column is `c`, in row
//! `bcolind[k]`, again restricted to `>= diagind[bcolind[k]]`.

use crate::matrix::Bsr;

/// Packed `(posptr, lowerp, upperp)` tuple from spec.md §3/§4.E.
pub struct IluPositions {
    /// `posptr[j]..posptr[j+1]` bounds the contributions for position `j`.
    pub posptr: Vec<usize>,
    /// Flat position of the `L` operand for each contribution.
    pub lowerp: Vec<usize>,
    /// Flat position of the `U` operand for each contribution.
    pub upperp: Vec<usize>,
}

impl IluPositions {
    pub fn nnzb(&self) -> usize {
        self.posptr.len().saturating_sub(1)
    }
}

/// Finds the position in `bcolind[lo..hi]` holding `col`, or `None`.
/// `bcolind[lo..hi]` is sorted ascending (D1/D2), so this is a binary
/// search, `O(log(hi-lo))`.
#[inline]
fn inner_search(bcolind: &[usize], lo: usize, hi: usize, col: usize) -> Option<usize> {
    bcolind[lo..hi].binary_search(&col).ok().map(|off| lo + off)
}

/// Computes the ILU(0) positions list for a BSR matrix's sparsity pattern.
/// Runs once per pattern; the result is cached by the owning preconditioner
/// (spec.md §3: "pattern-dependent scratch ... is computed once and
/// cached"). Complexity is `O(nnzb * avg_row_nz * log avg_row_nz)`.
pub fn compute_ilu_positions<const N: usize>(mat: &Bsr<N>) -> IluPositions {
    let bcolind = mat.bcolind();
    let browptr = mat.browptr();
    let diagind = mat.diagind();
    let nnzb = mat.nnzb();

    let mut posptr = vec![0usize; nnzb + 1];

    // Pass 1: count contributions per position.
    for irow in 0..mat.nbrows() {
        for j in browptr[irow]..browptr[irow + 1] {
            let col = bcolind[j];
            let mut count = 0usize;
            if irow > col {
                // l_{irow,col}: walk k in row irow with bcolind[k] < col.
                for k in browptr[irow]..browptr[irow + 1] {
                    if bcolind[k] >= col {
                        break;
                    }
                    let other = bcolind[k];
                    if inner_search(bcolind, diagind[other], browptr[other + 1], col).is_some() {
                        count += 1;
                    }
                }
            } else {
                // u_{irow,col}: walk k in row irow with bcolind[k] < irow.
                for k in browptr[irow]..browptr[irow + 1] {
                    if bcolind[k] >= irow {
                        break;
                    }
                    let other = bcolind[k];
                    if inner_search(bcolind, diagind[other], browptr[other + 1], col).is_some() {
                        count += 1;
                    }
                }
            }
            posptr[j + 1] = count;
        }
    }
    for j in 0..nnzb {
        posptr[j + 1] += posptr[j];
    }

    let total = posptr[nnzb];
    let mut lowerp = vec![0usize; total];
    let mut upperp = vec![0usize; total];

    // Pass 2: fill in the (k, ipos) pairs at the slots counted above.
    for irow in 0..mat.nbrows() {
        for j in browptr[irow]..browptr[irow + 1] {
            let col = bcolind[j];
            let mut slot = posptr[j];
            if irow > col {
                for k in browptr[irow]..browptr[irow + 1] {
                    if bcolind[k] >= col {
                        break;
                    }
                    let other = bcolind[k];
                    if let Some(ipos) = inner_search(bcolind, diagind[other], browptr[other + 1], col) {
                        lowerp[slot] = k;
                        upperp[slot] = ipos;
                        slot += 1;
                    }
                }
            } else {
                for k in browptr[irow]..browptr[irow + 1] {
                    if bcolind[k] >= irow {
                        break;
                    }
                    let other = bcolind[k];
                    if let Some(ipos) = inner_search(bcolind, diagind[other], browptr[other + 1], col) {
                        lowerp[slot] = k;
                        upperp[slot] = ipos;
                        slot += 1;
                    }
                }
            }
            debug_assert_eq!(slot, posptr[j + 1]);
        }
    }

    IluPositions {
        posptr,
        lowerp,
        upperp,
    }
}
