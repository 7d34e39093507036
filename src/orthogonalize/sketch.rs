//! Randomized sketching for FGMRES (C10): FWHT and count-sketch families, plus the randomized
//! orthogonalizer that projects in the sketched space and lifts coefficients back to full space
//! per §4.7.

use std::cell::RefCell;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::backend::ExecutionBackend;
use crate::error::OrthoError;
use crate::handler::VectorHandler;
use crate::memory::MemorySpace;
use crate::vector::Multivector;

use super::{OrthoOutcome, Orthogonalizer};

const BREAKDOWN_TOL: f64 = 1e-14;

/// Which sketch family `setup(A)` constructs (§6 `sketch_kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SketchKind {
    Fwht,
    CountSketch,
}

/// A fixed linear map `R^n -> R^k` applied to every basis vector. Constructed once per FGMRES
/// `setup(A)` call and held fixed for the lifetime of that solve, per §4.7.
pub trait Sketch {
    fn k(&self) -> usize;
    fn n(&self) -> usize;
    fn apply(&self, v: &[f64]) -> Vec<f64>;
}

/// Subsampled randomized Hadamard transform: `S = sqrt(n_pad/k) * R * H * D`, `D` a random
/// sign diagonal, `H` the Walsh-Hadamard matrix (`n` padded to the next power of two), `R` a
/// fixed row-subsampling of `k` of the `n_pad` transformed coordinates.
pub struct FwhtSketch {
    n: usize,
    k: usize,
    n_pad: usize,
    signs: Vec<f64>,
    sample_idx: Vec<usize>,
}

impl FwhtSketch {
    pub fn new(n: usize, k: usize, seed: u64) -> Self {
        let n_pad = n.next_power_of_two().max(1);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let signs: Vec<f64> = (0..n_pad)
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        let mut all_idx: Vec<usize> = (0..n_pad).collect();
        for i in (1..n_pad).rev() {
            let j = rng.gen_range(0..=i);
            all_idx.swap(i, j);
        }
        all_idx.truncate(k);
        Self {
            n,
            k,
            n_pad,
            signs,
            sample_idx: all_idx,
        }
    }
}

fn fwht(a: &mut [f64]) {
    let n = a.len();
    let mut len = 1;
    while len < n {
        let mut i = 0;
        while i < n {
            for j in i..i + len {
                let x = a[j];
                let y = a[j + len];
                a[j] = x + y;
                a[j + len] = x - y;
            }
            i += len * 2;
        }
        len *= 2;
    }
}

impl Sketch for FwhtSketch {
    fn k(&self) -> usize {
        self.k
    }
    fn n(&self) -> usize {
        self.n
    }
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut padded = vec![0.0f64; self.n_pad];
        padded[..v.len().min(self.n_pad)].copy_from_slice(&v[..v.len().min(self.n_pad)]);
        for (x, &s) in padded.iter_mut().zip(self.signs.iter()) {
            *x *= s;
        }
        fwht(&mut padded);
        let scale = (self.n_pad as f64 / self.k as f64).sqrt() / (self.n_pad as f64).sqrt();
        self.sample_idx.iter().map(|&i| padded[i] * scale).collect()
    }
}

/// Count-sketch: a random hash `[n] -> [k]` plus a random sign per coordinate; applying it sums
/// signed entries into buckets.
pub struct CountSketch {
    n: usize,
    k: usize,
    hash: Vec<usize>,
    sign: Vec<f64>,
}

impl CountSketch {
    pub fn new(n: usize, k: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let hash: Vec<usize> = (0..n).map(|_| rng.gen_range(0..k.max(1))).collect();
        let sign: Vec<f64> = (0..n).map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 }).collect();
        Self { n, k, hash, sign }
    }
}

impl Sketch for CountSketch {
    fn k(&self) -> usize {
        self.k
    }
    fn n(&self) -> usize {
        self.n
    }
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0f64; self.k];
        for (i, &vi) in v.iter().enumerate() {
            out[self.hash[i]] += self.sign[i] * vi;
        }
        out
    }
}

pub fn build_sketch(kind: SketchKind, n: usize, k: usize, seed: u64) -> Box<dyn Sketch + Send + Sync> {
    match kind {
        SketchKind::Fwht => Box::new(FwhtSketch::new(n, k, seed)),
        SketchKind::CountSketch => Box::new(CountSketch::new(n, k, seed)),
    }
}

fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn vec_axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// Orthogonalizer for the randomized variant of FGMRES: maintains a sketched copy of the basis,
/// runs MGS in the sketched space (cheap, `k << n`), and replays the same coefficients against
/// the full-space basis, finishing with a full-space norm correction so `‖V[j+1]‖₂ = 1` exactly.
pub struct Randomized {
    sketch: Box<dyn Sketch + Send + Sync>,
    sketched_basis: RefCell<Vec<Vec<f64>>>,
}

impl Randomized {
    pub fn new(sketch: Box<dyn Sketch + Send + Sync>) -> Self {
        Self {
            sketch,
            sketched_basis: RefCell::new(Vec::new()),
        }
    }
}

impl<B: ExecutionBackend + Copy> Orthogonalizer<B> for Randomized {
    fn orthogonalize(
        &self,
        handler: &VectorHandler<B>,
        basis: &mut [Multivector],
        h: &mut [f64],
        j: usize,
        space: MemorySpace,
    ) -> Result<OrthoOutcome, OrthoError> {
        let mut sb = self.sketched_basis.borrow_mut();
        if sb.is_empty() {
            let v0 = basis[0].data(space).map_err(|_| OrthoError::BackendFailure)?.to_vec();
            sb.push(self.sketch.apply(&v0));
        }

        let mut sw = {
            let w = basis[j + 1].data(space).map_err(|_| OrthoError::BackendFailure)?;
            self.sketch.apply(w)
        };
        for i in 0..=j {
            let hij = vec_dot(&sb[i], &sw);
            h[i] = hij;
            vec_axpy(-hij, &sb[i], &mut sw);
        }
        for i in 0..=j {
            let (left, right) = basis.split_at_mut(j + 1);
            handler
                .axpy(-h[i], &mut left[i], &mut right[0], space)
                .map_err(|_| OrthoError::BackendFailure)?;
        }

        let w_full = basis[j + 1].data(space).map_err(|_| OrthoError::BackendFailure)?;
        let norm_full = w_full.iter().map(|v| v * v).sum::<f64>().sqrt();
        h[j + 1] = norm_full;
        if norm_full < BREAKDOWN_TOL {
            return Ok(OrthoOutcome::Breakdown);
        }
        handler
            .scal(1.0 / norm_full, &mut basis[j + 1], space)
            .map_err(|_| OrthoError::BackendFailure)?;

        let wn = basis[j + 1].data(space).map_err(|_| OrthoError::BackendFailure)?;
        sb.push(self.sketch.apply(wn));
        Ok(OrthoOutcome::Orthogonalized)
    }
}
