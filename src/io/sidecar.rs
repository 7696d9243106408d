//! Plain-text sidecar format for golden-comparison fixtures (spec.md §6):
//!
//! ```text
//! line 1: nrows ncols nnz
//! line 2: browptr            (nrows+1 entries)
//! line 3: row indices        (nnz entries, one per stored nonzero)
//! line 4: column indices     (nnz entries)
//! line 5: values             (nnz entries)
//! line 6: diagind            (nrows entries)
//! ```
//!
//! This format stores a scalar (`bs=1`) CSR pattern plus values and the
//! diagonal index cache directly, so a golden fixture round-trips without
//! re-deriving `diagind` — useful for regression-pinning a specific matrix
//! used across multiple test scenarios (spec.md §8, E1-E6).

use std::fmt::Write as _;

use crate::block::Storage;
use crate::error::{BlastedResult, InputError};
use crate::matrix::Bsr;

/// Parses the sidecar text format into a scalar [`Bsr`].
///
/// The row-indices line (line 3) is redundant with `browptr` for a
/// well-formed CSR pattern (each nonzero's row is implied by which bucket of
/// `browptr` it falls in); this reader cross-checks it against `browptr`
/// instead of ignoring it, since the coupled redundancy is exactly what
/// makes the sidecar format useful for catching a corrupted golden fixture.
pub fn read_sidecar_str(text: &str) -> BlastedResult<Bsr<1>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = next_line(&mut lines, "nrows ncols nnz")?;
    let mut header_fields = header.split_whitespace();
    let nrows = parse_usize(header_fields.next(), "nrows")?;
    let ncols = parse_usize(header_fields.next(), "ncols")?;
    let nnz = parse_usize(header_fields.next(), "nnz")?;
    if nrows != ncols {
        return Err(InputError::DimensionMismatch {
            expected: nrows,
            got: ncols,
        }
        .into());
    }

    let browptr = parse_usize_line(next_line(&mut lines, "browptr")?, nrows + 1)?;
    let row_indices = parse_usize_line(next_line(&mut lines, "row indices")?, nnz)?;
    let bcolind = parse_usize_line(next_line(&mut lines, "column indices")?, nnz)?;
    let vals = parse_f64_line(next_line(&mut lines, "values")?, nnz)?;
    let diagind = parse_usize_line(next_line(&mut lines, "diagind")?, nrows)?;

    for (j, &r) in row_indices.iter().enumerate() {
        let expected_row = browptr
            .iter()
            .position(|&p| p > j)
            .map(|p| p - 1)
            .unwrap_or(nrows.saturating_sub(1));
        if r != expected_row {
            return Err(InputError::MalformedFile {
                reason: format!(
                    "sidecar row index at nonzero {j} is {r}, but browptr places it in row {expected_row}"
                ),
            }
            .into());
        }
    }

    let mat = Bsr::<1>::new(nrows, browptr, bcolind, vals, Storage::RowMajor)?;
    for (i, &expected) in diagind.iter().enumerate() {
        if mat.diagind()[i] != expected {
            return Err(InputError::MalformedFile {
                reason: format!(
                    "sidecar diagind[{i}]={expected} disagrees with the derived diagonal index {}",
                    mat.diagind()[i]
                ),
            }
            .into());
        }
    }
    Ok(mat)
}

/// Writes a scalar [`Bsr`] to the sidecar text format.
pub fn write_sidecar(mat: &Bsr<1>) -> String {
    let nbrows = mat.nbrows();
    let nnzb = mat.nnzb();
    let mut out = String::new();
    let _ = writeln!(out, "{nbrows} {nbrows} {nnzb}");

    let browptr_str: Vec<String> = mat.browptr().iter().map(|v| v.to_string()).collect();
    let _ = writeln!(out, "{}", browptr_str.join(" "));

    let mut row_indices = Vec::with_capacity(nnzb);
    for i in 0..nbrows {
        for _ in mat.row_range(i) {
            row_indices.push(i.to_string());
        }
    }
    let _ = writeln!(out, "{}", row_indices.join(" "));

    let col_str: Vec<String> = mat.bcolind().iter().map(|v| v.to_string()).collect();
    let _ = writeln!(out, "{}", col_str.join(" "));

    let val_str: Vec<String> = (0..nnzb).map(|j| mat.block(j).get(0, 0).to_string()).collect();
    let _ = writeln!(out, "{}", val_str.join(" "));

    let diag_str: Vec<String> = mat.diagind().iter().map(|v| v.to_string()).collect();
    let _ = writeln!(out, "{}", diag_str.join(" "));

    out
}

fn next_line<'a, I: Iterator<Item = &'a str>>(lines: &mut I, what: &str) -> BlastedResult<&'a str> {
    lines.next().ok_or_else(|| {
        InputError::MalformedFile {
            reason: format!("sidecar file is missing its {what} line"),
        }
        .into()
    })
}

fn parse_usize(field: Option<&str>, what: &str) -> BlastedResult<usize> {
    field
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| InputError::MalformedFile {
            reason: format!("sidecar header field '{what}' is missing or not an integer"),
        }
        .into())
}

fn parse_usize_line(line: &str, expected_len: usize) -> BlastedResult<Vec<usize>> {
    let parsed: Result<Vec<usize>, _> = line.split_whitespace().map(|s| s.parse::<usize>()).collect();
    let parsed = parsed.map_err(|_| InputError::MalformedFile {
        reason: "sidecar line contains a non-integer index".to_string(),
    })?;
    if parsed.len() != expected_len {
        return Err(InputError::DimensionMismatch {
            expected: expected_len,
            got: parsed.len(),
        }
        .into());
    }
    Ok(parsed)
}

fn parse_f64_line(line: &str, expected_len: usize) -> BlastedResult<Vec<f64>> {
    let parsed: Result<Vec<f64>, _> = line.split_whitespace().map(|s| s.parse::<f64>()).collect();
    let parsed = parsed.map_err(|_| InputError::MalformedFile {
        reason: "sidecar values line contains a non-numeric entry".to_string(),
    })?;
    if parsed.len() != expected_len {
        return Err(InputError::DimensionMismatch {
            expected: expected_len,
            got: parsed.len(),
        }
        .into());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag_sidecar_text() -> &'static str {
        "3 3 7\n\
         0 2 5 7\n\
         0 0 1 1 1 2 2\n\
         0 1 0 1 2 1 2\n\
         2.0 -1.0 -1.0 2.0 -1.0 -1.0 2.0\n\
         0 3 6\n"
    }

    #[test]
    fn reads_golden_tridiagonal_fixture() {
        let mat = read_sidecar_str(tridiag_sidecar_text()).unwrap();
        assert_eq!(mat.nbrows(), 3);
        assert_eq!(mat.nnzb(), 7);
        assert_eq!(mat.diagind(), &[0, 3, 6]);
        assert_eq!(mat.block(0).get(0, 0), 2.0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mat = read_sidecar_str(tridiag_sidecar_text()).unwrap();
        let text = write_sidecar(&mat);
        let reread = read_sidecar_str(&text).unwrap();
        assert_eq!(reread.browptr(), mat.browptr());
        assert_eq!(reread.bcolind(), mat.bcolind());
        assert_eq!(reread.vals(), mat.vals());
        assert_eq!(reread.diagind(), mat.diagind());
    }

    #[test]
    fn rejects_row_index_disagreeing_with_browptr() {
        let bad = "2 2 2\n\
                   0 1 2\n\
                   0 0\n\
                   0 1\n\
                   1.0 1.0\n\
                   0 1\n";
        assert!(read_sidecar_str(bad).is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        let bad = "3 3 7\n0 2 5 7\n";
        assert!(read_sidecar_str(bad).is_err());
    }
}
