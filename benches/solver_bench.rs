//! Benchmarks for the sparse preconditioner kernels.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use blasted_rs::block::Storage;
use blasted_rs::kernels::spmv;
use blasted_rs::matrix::Bsr;
use blasted_rs::precond::ilu0::Ilu0;
use blasted_rs::precond::jacobi::Jacobi;
use blasted_rs::precond::sgs::Sgs;
use blasted_rs::precond::Preconditioner;

/// Builds the scalar 7-point-Laplacian-like tridiagonal chain on `n` rows
/// (spec.md §8, E1's reduced 1D analogue): diagonal 2, off-diagonals -1.
fn tridiag_chain(n: usize) -> Bsr<1> {
    let mut browptr = vec![0usize];
    let mut bcolind = Vec::new();
    let mut vals = Vec::new();
    for i in 0..n {
        if i > 0 {
            bcolind.push(i - 1);
            vals.push(-1.0);
        }
        bcolind.push(i);
        vals.push(2.0);
        if i + 1 < n {
            bcolind.push(i + 1);
            vals.push(-1.0);
        }
        browptr.push(bcolind.len());
    }
    Bsr::<1>::new(n, browptr, bcolind, vals, Storage::RowMajor).unwrap()
}

fn bench_spmv(c: &mut Criterion) {
    let mat = tridiag_chain(10_000);
    let x = vec![1.0; mat.dim()];
    let mut y = vec![0.0; mat.dim()];
    c.bench_function("spmv_10k_tridiag", |b| {
        b.iter(|| {
            spmv(&mat, 1.0, &x, &mut y).unwrap();
            black_box(&y);
        })
    });
}

fn bench_jacobi_apply(c: &mut Criterion) {
    let mat = tridiag_chain(10_000);
    let mut prec = Jacobi::new(mat);
    prec.compute().unwrap();
    let r = vec![1.0; prec.matrix().dim()];
    let mut z = vec![0.0; prec.matrix().dim()];
    c.bench_function("jacobi_apply_10k", |b| {
        b.iter(|| {
            prec.apply(&r, &mut z).unwrap();
            black_box(&z);
        })
    });
}

fn bench_sgs_apply(c: &mut Criterion) {
    let mat = tridiag_chain(5_000);
    let dim = mat.dim();
    let mut prec = Sgs::new(mat, 1, 256);
    prec.compute().unwrap();
    let r = vec![1.0; dim];
    let mut z = vec![0.0; dim];
    c.bench_function("sgs_apply_5k_async_sweep1", |b| {
        b.iter(|| {
            prec.apply(&r, &mut z).unwrap();
            black_box(&z);
        })
    });
}

fn bench_ilu0_compute(c: &mut Criterion) {
    c.bench_function("ilu0_compute_2k_sb10", |b| {
        b.iter(|| {
            let mat = tridiag_chain(2_000);
            let mut prec = Ilu0::<1>::new(mat, 10, 10, 256);
            prec.compute().unwrap();
            black_box(&prec);
        })
    });
}

criterion_group!(benches, bench_spmv, bench_jacobi_apply, bench_sgs_apply, bench_ilu0_compute);
criterion_main!(benches);
