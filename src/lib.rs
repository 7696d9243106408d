//! blasted-rs: thread-parallel asynchronous preconditioners and relaxations
//! for sparse linear systems stored in compressed sparse (block-)row form.
//!
//! Supplies factorization and apply kernels — Jacobi, symmetric
//! Gauss-Seidel (SGS), incomplete LU with zero fill (ILU(0)), and their
//! chaotic/asynchronous variants — for an outer Krylov solver to invoke as a
//! black-box preconditioner `M^-1 r ~ A^-1 r`.
//!
//! ## Example
//! ```rust
//! use blasted_rs::block::Storage;
//! use blasted_rs::matrix::Bsr;
//! use blasted_rs::precond::{jacobi::Jacobi, Preconditioner};
//!
//! // [[2,-1,0],[-1,2,-1],[0,-1,2]]
//! let browptr = vec![0, 2, 5, 7];
//! let bcolind = vec![0, 1, 0, 1, 2, 1, 2];
//! let vals = vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0];
//! let mat = Bsr::<1>::new(3, browptr, bcolind, vals, Storage::RowMajor).unwrap();
//!
//! let mut prec = Jacobi::new(mat);
//! prec.compute().unwrap();
//!
//! let r = [2.0, 4.0, 6.0];
//! let mut z = [0.0; 3];
//! prec.apply(&r, &mut z).unwrap();
//! ```

pub mod async_engine;
pub mod block;
pub mod error;
pub mod factory;
pub mod ilu_pattern;
pub mod io;
pub mod kernels;
pub mod matrix;
pub mod precond;
pub mod reorder;

/// Re-exports of the types most callers reach for.
pub mod prelude {
    pub use crate::block::Storage;
    pub use crate::error::{BlastedError, BlastedResult};
    pub use crate::factory::{build_preconditioner, tags, DynPreconditioner, FactoryParams};
    pub use crate::matrix::{Bsc, Bsr};
    pub use crate::precond::{ilu0::Ilu0, jacobi::Jacobi, sgs::Sgs, NoPreconditioner, Preconditioner};
}
