//! Sparse block-row/block-column matrix model (spec.md §4.B).

pub mod bsc;
pub mod bsr;

pub use bsc::Bsc;
pub use bsr::Bsr;
