//! Benchmarks FGMRES on tridiagonal Laplacian-like systems of increasing size, with and without
//! an LU preconditioner, and the randomized-sketch orthogonalizer against plain CGS2.

use resolve_rs::backend::CpuBackend;
use resolve_rs::config::FgmresConfig;
use resolve_rs::handler::MatrixHandler;
use resolve_rs::logging::NoOpLogger;
use resolve_rs::matrix::csr::coo_to_csr;
use resolve_rs::matrix::{CooMatrix, CsrMatrix};
use resolve_rs::memory::MemorySpace;
use resolve_rs::solver::{DirectSolver, SimplicialSparseLu};
use resolve_rs::vector::Multivector;
use resolve_rs::Fgmres;

fn main() {
    divan::main();
}

fn tridiagonal(n: usize) -> CsrMatrix {
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for i in 0..n {
        rows.push(i);
        cols.push(i);
        vals.push(4.0);
        if i + 1 < n {
            rows.push(i);
            cols.push(i + 1);
            vals.push(-1.0);
            rows.push(i + 1);
            cols.push(i);
            vals.push(-1.0);
        }
    }
    let mut coo = CooMatrix::new(n, n, 0, false, true);
    coo.update_data(&rows, &cols, &vals, MemorySpace::Host).unwrap();
    coo_to_csr(&mut coo, MemorySpace::Host).unwrap()
}

struct IdentityPrecond;

impl DirectSolver for IdentityPrecond {
    fn state(&self) -> resolve_rs::solver::SolverState {
        resolve_rs::solver::SolverState::Factored
    }
    fn setup(
        &mut self,
        _a: &mut CsrMatrix,
        _seed: Option<resolve_rs::solver::FactorView<'_>>,
        _space: MemorySpace,
    ) -> resolve_rs::ResolveResult<()> {
        Ok(())
    }
    fn analyze(&mut self) -> resolve_rs::ResolveResult<()> {
        Ok(())
    }
    fn factorize(&mut self, _a: &mut CsrMatrix, _space: MemorySpace) -> resolve_rs::ResolveResult<()> {
        Ok(())
    }
    fn refactorize(&mut self, _a: &mut CsrMatrix, _space: MemorySpace) -> resolve_rs::ResolveResult<()> {
        Ok(())
    }
    fn solve(&self, b: &mut Multivector, x: &mut Multivector, space: MemorySpace) -> resolve_rs::ResolveResult<()> {
        let data = b.data(space).unwrap().to_vec();
        x.update(&data, space).unwrap();
        Ok(())
    }
}

#[divan::bench(args = [50, 200, 1000])]
fn unpreconditioned(n: usize) {
    let mut a = tridiagonal(n);
    let mut precond = IdentityPrecond;
    let cfg = FgmresConfig {
        restart: 30,
        tol: 1e-10,
        maxit: 500,
        ..FgmresConfig::default()
    };
    let fgmres = Fgmres::new(cfg, CpuBackend, NoOpLogger);
    let mut b = Multivector::vector(n);
    b.update(&vec![1.0; n], MemorySpace::Host).unwrap();
    let mut x = Multivector::vector(n);
    x.update(&vec![0.0; n], MemorySpace::Host).unwrap();
    fgmres.solve(&mut a, &mut precond, &mut b, &mut x, MemorySpace::Host).unwrap();
}

#[divan::bench(args = [50, 200, 1000])]
fn lu_preconditioned(n: usize) {
    let mut a = tridiagonal(n);
    let mut precond = SimplicialSparseLu::new();
    precond.setup(&mut a, None, MemorySpace::Host).unwrap();
    precond.analyze().unwrap();
    precond.factorize(&mut a, MemorySpace::Host).unwrap();

    let cfg = FgmresConfig {
        restart: 10,
        tol: 1e-10,
        maxit: 100,
        ..FgmresConfig::default()
    };
    let fgmres = Fgmres::new(cfg, CpuBackend, NoOpLogger);
    let mut b = Multivector::vector(n);
    b.update(&vec![1.0; n], MemorySpace::Host).unwrap();
    let mut x = Multivector::vector(n);
    x.update(&vec![0.0; n], MemorySpace::Host).unwrap();
    fgmres.solve(&mut a, &mut precond, &mut b, &mut x, MemorySpace::Host).unwrap();
}

#[divan::bench(args = [200, 1000])]
fn randomized_sketch(n: usize) {
    let mut a = tridiagonal(n);
    let mut precond = IdentityPrecond;
    let cfg = FgmresConfig {
        restart: 30,
        tol: 1e-8,
        maxit: 500,
        ..FgmresConfig::default()
    }
    .randomized(64, 11);
    let fgmres = Fgmres::new(cfg, CpuBackend, NoOpLogger);
    let mut b = Multivector::vector(n);
    b.update(&vec![1.0; n], MemorySpace::Host).unwrap();
    let mut x = Multivector::vector(n);
    x.update(&vec![0.0; n], MemorySpace::Host).unwrap();
    fgmres.solve(&mut a, &mut precond, &mut b, &mut x, MemorySpace::Host).unwrap();
}

#[divan::bench(args = [50, 500])]
fn spmv(n: usize) {
    let mut a = tridiagonal(n);
    let mut handler = MatrixHandler::new(CpuBackend);
    let mut x = Multivector::vector(n);
    x.update(&vec![1.0; n], MemorySpace::Host).unwrap();
    let mut y = Multivector::vector(n);
    y.update(&vec![0.0; n], MemorySpace::Host).unwrap();
    handler.matvec(&mut a, &mut x, &mut y, 1.0, 0.0, MemorySpace::Host).unwrap();
}
