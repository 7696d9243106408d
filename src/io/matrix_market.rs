//! Reads a Matrix Market coordinate file into a scalar (`bs=1`) [`Bsr`],
//! used for loading standard sparse-matrix test fixtures (e.g. the
//! SuiteSparse collection) rather than for block-structured production
//! matrices, which arrive pre-assembled through [`crate::io::sidecar`] or
//! directly via [`Bsr::new`].

use std::path::Path;

use nalgebra_sparse::CsrMatrix;

use crate::block::Storage;
use crate::error::{BlastedResult, InputError};
use crate::matrix::Bsr;

/// Loads the Matrix Market file at `path` as a square scalar BSR matrix.
/// Entries with an implicit (unstored) diagonal are rejected, since every
/// `Bsr` block-row must carry an explicit diagonal entry.
pub fn read_matrix_market_file<P: AsRef<Path>>(path: P) -> BlastedResult<Bsr<1>> {
    let coo = nalgebra_sparse::io::load_coo_from_matrix_market_file::<f64, _>(path)
        .map_err(|e| InputError::MalformedFile { reason: e.to_string() })?;
    coo_to_bsr(&coo)
}

/// Parses Matrix Market coordinate text already in memory (used by tests
/// and by callers embedding a fixture rather than reading from disk).
pub fn read_matrix_market_str(text: &str) -> BlastedResult<Bsr<1>> {
    let coo = nalgebra_sparse::io::load_coo_from_matrix_market_str::<f64>(text)
        .map_err(|e| InputError::MalformedFile { reason: e.to_string() })?;
    coo_to_bsr(&coo)
}

fn coo_to_bsr(coo: &nalgebra_sparse::CooMatrix<f64>) -> BlastedResult<Bsr<1>> {
    if coo.nrows() != coo.ncols() {
        return Err(InputError::DimensionMismatch {
            expected: coo.nrows(),
            got: coo.ncols(),
        }
        .into());
    }
    let csr = CsrMatrix::from(coo);
    let browptr = csr.row_offsets().to_vec();
    let bcolind = csr.col_indices().to_vec();
    let vals = csr.values().to_vec();
    Bsr::<1>::new(csr.nrows(), browptr, bcolind, vals, Storage::RowMajor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_small_symmetric_fixture() {
        let mm = "%%MatrixMarket matrix coordinate real symmetric\n\
                  3 3 4\n\
                  1 1 2.0\n\
                  2 1 -1.0\n\
                  2 2 2.0\n\
                  3 3 2.0\n";
        let mat = read_matrix_market_str(mm).unwrap();
        assert_eq!(mat.nbrows(), 3);
        // symmetric expansion mirrors (2,1) into (1,2); (3,3) has no
        // off-diagonal neighbor, so it must still carry its own diagonal.
        assert_eq!(mat.bcolind()[mat.diagind()[2]], 2);
    }

    #[test]
    fn rejects_non_square_matrix() {
        let mm = "%%MatrixMarket matrix coordinate real general\n\
                  2 3 1\n\
                  1 1 1.0\n";
        assert!(read_matrix_market_str(mm).is_err());
    }
}
