//! Error types for the preconditioner library

use thiserror::Error;

/// Top-level error type for every preconditioner/matrix operation
#[derive(Error, Debug)]
pub enum BlastedError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("numeric error: {0}")]
    Numeric(#[from] NumericError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Invalid block size, unknown preconditioner tag, invalid storage order
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("block size {0} is not in the committed set {{1,3,4,5,7}}")]
    UnsupportedBlockSize(usize),

    #[error("unknown preconditioner tag '{0}'")]
    UnknownPreconditioner(String),

    #[error("unknown block storage order '{0}' (expected 'rowmajor' or 'colmajor')")]
    UnknownStorageOrder(String),

    #[error("missing required integer parameter '{0}'")]
    MissingIntParam(&'static str),
}

/// Matrix pattern is malformed, or apply() was called with mismatched dimensions
#[derive(Error, Debug)]
pub enum InputError {
    #[error("block-row {block_row} has no diagonal entry")]
    MissingDiagonal { block_row: usize },

    #[error("browptr is not non-decreasing at index {index}")]
    NonMonotonicRowPtr { index: usize },

    #[error("bcolind is not strictly increasing within block-row {block_row}")]
    UnsortedColumnIndices { block_row: usize },

    #[error("expected vector of length {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("block-column {col} referenced in block-row {block_row} is out of range (nbrows={nbrows})")]
    ColumnOutOfRange {
        block_row: usize,
        col: usize,
        nbrows: usize,
    },

    #[error("malformed input file: {reason}")]
    MalformedFile { reason: String },
}

/// Singular diagonal block encountered during inversion or ILU update
#[derive(Error, Debug)]
pub enum NumericError {
    #[error("singular diagonal block at block-row {block_row} (pivot magnitude {pivot:e})")]
    SingularBlock { block_row: usize, pivot: f64 },

    #[error("ILU(0) factorization failed at block-row {block_row}: {reason}")]
    FactorizationFailed { block_row: usize, reason: String },
}

/// Allocation failure for aligned buffers
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to allocate aligned buffer of {bytes} bytes: {reason}")]
    Allocation { bytes: usize, reason: String },
}

/// Result type used throughout the crate
pub type BlastedResult<T> = Result<T, BlastedError>;
