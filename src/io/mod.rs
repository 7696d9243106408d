//! Matrix input: a Matrix Market reader for scalar (block size 1) test
//! fixtures, and a plain-text sidecar format for pre-built BSR patterns of
//! any block size.

pub mod matrix_market;
pub mod sidecar;
