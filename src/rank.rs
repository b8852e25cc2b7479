use rayon::prelude::*;

use crate::error::{Result, SearchError};
use crate::svd::LatentMatrix;

/// One ranked document: its position in the corpus and its cosine score.
/// Internal to the ranking step; only `SearchHit` crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
    pub index: usize,
    pub score: f64,
}

/// Rank corpus rows by cosine similarity against a query latent vector.
///
/// Returns `min(k, matrix.rows())` hits in strictly descending score
/// order; equal scores are broken by ascending document index, so the
/// output is deterministic for identical inputs. A zero query (or a zero
/// corpus row) scores 0.0 rather than NaN.
///
/// Pure function over read-only inputs; safe to call concurrently.
///
/// # Errors
/// - `InvalidRequest` if `k == 0` or the query dimension does not match
///   the matrix rank.
pub fn rank(query: &[f64], matrix: &LatentMatrix, k: usize) -> Result<Vec<RankedHit>> {
    if k == 0 {
        return Err(SearchError::InvalidRequest(
            "k must be positive".to_string(),
        ));
    }
    if query.len() != matrix.rank() {
        return Err(SearchError::InvalidRequest(format!(
            "query dimension {} does not match latent rank {}",
            query.len(),
            matrix.rank()
        )));
    }

    let query_norm = norm(query);
    let mut hits: Vec<RankedHit> = (0..matrix.rows())
        .into_par_iter()
        .map(|index| {
            let row = matrix.row(index);
            let denom = query_norm * norm(row);
            let score = if denom <= f64::EPSILON {
                0.0
            } else {
                dot(query, row) / denom
            };
            RankedHit { index, score }
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    hits.truncate(k.min(matrix.rows()));
    Ok(hits)
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
