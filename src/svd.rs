use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::sparse::SparseVec;

/// Fixed seed for the iteration's starting block. The factorization must
/// not depend on ambient randomness: two fits of the same matrix are
/// bit-identical.
const INIT_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Below this norm an orthogonalized column is treated as collapsed
/// (rank-deficient input) and redrawn from the deterministic stream.
const ZERO_COL_TOL: f64 = 1e-12;

/// Fixed chunk size for the transpose product. Partial sums are combined
/// in chunk order, so the result does not depend on thread scheduling.
const PAR_CHUNK: usize = 1024;

/// Configuration for the truncated SVD fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Number of latent dimensions to retain (R).
    /// Must satisfy 0 < R < min(document count, vocabulary size).
    pub rank: usize,
    /// Maximum subspace iterations before giving up on convergence.
    pub max_iterations: usize,
    /// Relative change in singular value estimates below which the
    /// iteration stops early.
    pub tolerance: f64,
}

impl ProjectorConfig {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            max_iterations: 60,
            tolerance: 1e-9,
        }
    }
}

/// A fitted rank-R projection basis.
///
/// `basis` holds the top-R right singular vectors of the fitted weight
/// matrix, row-major `dim x rank`. Applying it maps a sparse weight vector
/// into the dense latent topic space; immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    dim: usize,
    rank: usize,
    basis: Vec<f64>,
    singular_values: Vec<f64>,
}

impl Projection {
    /// Latent dimension (R).
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Input dimension (vocabulary size at fit time).
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Singular value estimates, descending.
    #[inline]
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Project a sparse weight vector into the latent space (`x . V`).
    /// Linear and stateless; entries beyond the fitted dimension are
    /// ignored.
    pub fn transform(&self, x: &SparseVec) -> Vec<f64> {
        let mut out = vec![0.0; self.rank];
        for (col, val) in x.raw_iter() {
            let col = col as usize;
            if col >= self.dim {
                continue;
            }
            let base = col * self.rank;
            for r in 0..self.rank {
                out[r] += val * self.basis[base + r];
            }
        }
        out
    }

    /// Project a batch of rows in parallel, preserving order.
    pub fn transform_rows(&self, rows: &[SparseVec]) -> LatentMatrix {
        let projected: Vec<Vec<f64>> = rows.par_iter().map(|row| self.transform(row)).collect();
        let mut data = Vec::with_capacity(rows.len() * self.rank);
        for row in projected {
            data.extend_from_slice(&row);
        }
        LatentMatrix {
            data,
            rank: self.rank,
        }
    }
}

/// Dense latent representation of a corpus: one row per document, R
/// columns. Computed once at build time, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentMatrix {
    data: Vec<f64>,
    rank: usize,
}

impl LatentMatrix {
    /// Number of document rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.data.len() / self.rank
    }

    /// Latent dimension (R).
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Row `i` as a dense slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.rank..(i + 1) * self.rank]
    }
}

/// Latent semantic projector: learns a rank-R truncated SVD of a sparse
/// weight matrix and applies the fixed basis to new vectors.
///
/// The solver is deterministic subspace iteration on `A^T A` with modified
/// Gram-Schmidt re-orthonormalization; the starting block comes from a
/// fixed xorshift64* stream, so repeated fits are reproducible.
#[derive(Debug, Clone)]
pub struct LatentProjector {
    config: ProjectorConfig,
    projection: Option<Projection>,
}

impl LatentProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self {
            config,
            projection: None,
        }
    }

    /// Fit the projection basis on a row-major sparse weight matrix.
    ///
    /// # Errors
    /// - `EmptyCorpus` if `rows` is empty
    /// - `Config` unless 0 < rank < min(rows.len(), dim)
    pub fn fit(&mut self, rows: &[SparseVec], dim: usize) -> Result<()> {
        if rows.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }
        let rank = self.config.rank;
        let limit = rows.len().min(dim);
        if rank == 0 || rank >= limit {
            return Err(SearchError::Config(format!(
                "latent rank {} must satisfy 0 < rank < min(document count {}, vocabulary size {})",
                rank,
                rows.len(),
                dim
            )));
        }

        let mut rng = XorShift64::new(INIT_SEED);
        let mut basis = vec![0.0; dim * rank];
        for v in &mut basis {
            *v = rng.next_unit();
        }
        orthonormalize(&mut basis, dim, rank, &mut rng);

        let mut prev_sigma_sq = vec![0.0; rank];
        let mut iterations = 0;
        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;
            let left = times_basis(rows, &basis, rank);
            let mut next = transpose_times(rows, &left, dim, rank);

            // column norms of A^T A v_r estimate sigma_r^2
            let sigma_sq = column_norms(&next, dim, rank);
            let converged = sigma_sq
                .iter()
                .zip(&prev_sigma_sq)
                .all(|(s, p)| (s - p).abs() <= self.config.tolerance * s.max(1.0));
            prev_sigma_sq = sigma_sq;

            orthonormalize(&mut next, dim, rank, &mut rng);
            basis = next;
            if converged {
                break;
            }
        }

        // order columns by singular value, largest first
        let left = times_basis(rows, &basis, rank);
        let sigma = column_norms(&left, rows.len(), rank);
        let mut order: Vec<usize> = (0..rank).collect();
        order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]).then(a.cmp(&b)));
        let mut sorted_basis = vec![0.0; dim * rank];
        let mut singular_values = Vec::with_capacity(rank);
        for (dst, &src) in order.iter().enumerate() {
            for i in 0..dim {
                sorted_basis[i * rank + dst] = basis[i * rank + src];
            }
            singular_values.push(sigma[src]);
        }

        debug!(
            rank,
            dim,
            iterations,
            top_singular_value = singular_values.first().copied().unwrap_or(0.0),
            "fitted latent projection"
        );
        self.projection = Some(Projection {
            dim,
            rank,
            basis: sorted_basis,
            singular_values,
        });
        Ok(())
    }

    /// Project a vector with the fitted basis.
    ///
    /// # Errors
    /// `NotFitted` if called before `fit` succeeded.
    pub fn transform(&self, x: &SparseVec) -> Result<Vec<f64>> {
        Ok(self.projection()?.transform(x))
    }

    /// Borrow the fitted projection, or `NotFitted`.
    pub fn projection(&self) -> Result<&Projection> {
        self.projection.as_ref().ok_or(SearchError::NotFitted)
    }

    /// Consume the projector, yielding the fitted projection.
    pub fn into_projection(self) -> Result<Projection> {
        self.projection.ok_or(SearchError::NotFitted)
    }
}

/// A * V for sparse rows and a dense `dim x rank` basis; returns a
/// row-major `rows.len() x rank` matrix. Each output row is accumulated in
/// a single task in a fixed order, keeping the product deterministic.
fn times_basis(rows: &[SparseVec], basis: &[f64], rank: usize) -> Vec<f64> {
    let products: Vec<Vec<f64>> = rows
        .par_iter()
        .map(|row| {
            let mut acc = vec![0.0; rank];
            for (col, val) in row.raw_iter() {
                let base = col as usize * rank;
                for r in 0..rank {
                    acc[r] += val * basis[base + r];
                }
            }
            acc
        })
        .collect();
    let mut flat = Vec::with_capacity(rows.len() * rank);
    for acc in products {
        flat.extend_from_slice(&acc);
    }
    flat
}

/// A^T * B for sparse rows and a dense `rows.len() x rank` left factor;
/// returns a row-major `dim x rank` matrix. Partial sums are combined in
/// fixed chunk order.
fn transpose_times(rows: &[SparseVec], left: &[f64], dim: usize, rank: usize) -> Vec<f64> {
    let partials: Vec<Vec<f64>> = rows
        .par_chunks(PAR_CHUNK)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let mut acc = vec![0.0; dim * rank];
            for (j, row) in chunk.iter().enumerate() {
                let lbase = (chunk_idx * PAR_CHUNK + j) * rank;
                for (col, val) in row.raw_iter() {
                    let base = col as usize * rank;
                    for r in 0..rank {
                        acc[base + r] += val * left[lbase + r];
                    }
                }
            }
            acc
        })
        .collect();
    let mut out = vec![0.0; dim * rank];
    for part in partials {
        for (o, p) in out.iter_mut().zip(part) {
            *o += p;
        }
    }
    out
}

/// Euclidean norm of each column of a row-major `n x rank` matrix.
fn column_norms(matrix: &[f64], n: usize, rank: usize) -> Vec<f64> {
    let mut norms_sq = vec![0.0; rank];
    for i in 0..n {
        let base = i * rank;
        for r in 0..rank {
            norms_sq[r] += matrix[base + r] * matrix[base + r];
        }
    }
    norms_sq.into_iter().map(f64::sqrt).collect()
}

/// Modified Gram-Schmidt over the columns of a row-major `dim x rank`
/// block. A column that collapses to (numerical) zero is redrawn from the
/// deterministic stream and re-orthogonalized, which handles
/// rank-deficient input without poisoning the basis with NaNs.
fn orthonormalize(basis: &mut [f64], dim: usize, rank: usize, rng: &mut XorShift64) {
    for r in 0..rank {
        for _attempt in 0..4 {
            for p in 0..r {
                let mut proj = 0.0;
                for i in 0..dim {
                    proj += basis[i * rank + r] * basis[i * rank + p];
                }
                for i in 0..dim {
                    basis[i * rank + r] -= proj * basis[i * rank + p];
                }
            }
            let norm = (0..dim)
                .map(|i| basis[i * rank + r] * basis[i * rank + r])
                .sum::<f64>()
                .sqrt();
            if norm > ZERO_COL_TOL {
                let inv = 1.0 / norm;
                for i in 0..dim {
                    basis[i * rank + r] *= inv;
                }
                break;
            }
            for i in 0..dim {
                basis[i * rank + r] = rng.next_unit();
            }
        }
    }
}

/// Deterministic xorshift64* stream for the starting block.
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 1 } else { seed })
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in [-1, 1).
    fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: Vec<(u32, f64)>) -> SparseVec {
        SparseVec::from_pairs(pairs)
    }

    /// Three rows spanning an exact 2-dimensional subspace of R^5.
    fn rank_two_rows() -> Vec<SparseVec> {
        vec![
            row(vec![(0, 1.0), (1, 1.0)]),
            row(vec![(0, 1.0), (1, -1.0)]),
            row(vec![(0, 2.0)]),
        ]
    }

    #[test]
    fn fit_rejects_zero_rank() {
        let mut projector = LatentProjector::new(ProjectorConfig::new(0));
        let err = projector.fit(&rank_two_rows(), 5).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn fit_rejects_rank_at_or_above_min_dimension() {
        // min(3 docs, 5 dims) = 3, so rank 3 is degenerate
        let mut projector = LatentProjector::new(ProjectorConfig::new(3));
        let err = projector.fit(&rank_two_rows(), 5).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn fit_rejects_empty_matrix() {
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        let err = projector.fit(&[], 5).unwrap_err();
        assert_eq!(err, SearchError::EmptyCorpus);
    }

    #[test]
    fn transform_before_fit_is_not_fitted() {
        let projector = LatentProjector::new(ProjectorConfig::new(2));
        let err = projector.transform(&row(vec![(0, 1.0)])).unwrap_err();
        assert_eq!(err, SearchError::NotFitted);
    }

    #[test]
    fn fit_is_bit_deterministic() {
        let rows = rank_two_rows();
        let mut a = LatentProjector::new(ProjectorConfig::new(2));
        let mut b = LatentProjector::new(ProjectorConfig::new(2));
        a.fit(&rows, 5).unwrap();
        b.fit(&rows, 5).unwrap();
        assert_eq!(a.projection().unwrap(), b.projection().unwrap());
    }

    #[test]
    fn basis_columns_are_orthonormal() {
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let p = projector.projection().unwrap();
        let (dim, rank) = (p.dim(), p.rank());
        for a in 0..rank {
            for b in 0..rank {
                let dot: f64 = (0..dim)
                    .map(|i| p.basis[i * rank + a] * p.basis[i * rank + b])
                    .sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!(
                    (dot - expected).abs() < 1e-9,
                    "V^T V [{a}][{b}] = {dot}"
                );
            }
        }
    }

    #[test]
    fn projection_preserves_dot_products_of_exact_rank_input() {
        // the matrix has exact rank 2, so a rank-2 projection is lossless:
        // pairwise inner products survive the transform
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let p = projector.projection().unwrap();
        let latent: Vec<Vec<f64>> = rows.iter().map(|r| p.transform(r)).collect();
        for i in 0..rows.len() {
            for j in 0..rows.len() {
                let dense: f64 = latent[i].iter().zip(&latent[j]).map(|(a, b)| a * b).sum();
                let sparse = rows[i].dot(&rows[j]);
                assert!(
                    (dense - sparse).abs() < 1e-8,
                    "dot mismatch at ({i},{j}): {dense} vs {sparse}"
                );
            }
        }
    }

    #[test]
    fn singular_values_are_descending() {
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let sigma = projector.projection().unwrap().singular_values();
        assert_eq!(sigma.len(), 2);
        assert!(sigma[0] >= sigma[1]);
        assert!(sigma[1] > 0.0);
    }

    #[test]
    fn transform_is_linear_in_its_input() {
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let p = projector.projection().unwrap();
        let x = row(vec![(0, 0.5), (1, 1.5)]);
        let x2 = row(vec![(0, 1.0), (1, 3.0)]);
        let once = p.transform(&x);
        let twice = p.transform(&x2);
        for (a, b) in once.iter().zip(&twice) {
            assert!((2.0 * a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn duplicate_rows_do_not_break_the_fit() {
        // rank-deficient input: every row is the same direction
        let rows = vec![
            row(vec![(0, 1.0)]),
            row(vec![(0, 1.0)]),
            row(vec![(0, 1.0)]),
        ];
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 4).unwrap();
        let p = projector.projection().unwrap();
        let latent = p.transform(&rows[0]);
        assert!(latent.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn transform_ignores_columns_beyond_the_fitted_dimension() {
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let p = projector.projection().unwrap();
        let inside = p.transform(&row(vec![(0, 1.0)]));
        let outside = p.transform(&row(vec![(0, 1.0), (99, 7.0)]));
        assert_eq!(inside, outside);
    }

    #[test]
    fn latent_matrix_row_access() {
        let rows = rank_two_rows();
        let mut projector = LatentProjector::new(ProjectorConfig::new(2));
        projector.fit(&rows, 5).unwrap();
        let p = projector.projection().unwrap();
        let matrix = p.transform_rows(&rows);
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.rank(), 2);
        assert_eq!(matrix.row(1), p.transform(&rows[1]).as_slice());
    }
}
