use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Sparse weight vector in structure-of-arrays form.
///
/// Indices are column numbers sorted ascending; `vals[i]` is the weight at
/// column `inds[i]`. Zero cells are not stored, so the all-zero vector is
/// two empty arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVec {
    inds: Vec<u32>,
    vals: Vec<f64>,
}

impl SparseVec {
    /// The all-zero vector.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build from (column, weight) pairs.
    /// Pairs are sorted by column; duplicate columns are summed; zero
    /// weights are dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f64)>) -> Self {
        pairs.sort_unstable_by_key(|&(col, _)| col);
        let mut inds = Vec::with_capacity(pairs.len());
        let mut vals = Vec::with_capacity(pairs.len());
        for (col, val) in pairs {
            if val == 0.0 {
                continue;
            }
            if inds.last() == Some(&col) {
                let last = vals.len() - 1;
                vals[last] += val;
            } else {
                inds.push(col);
                vals.push(val);
            }
        }
        Self { inds, vals }
    }

    /// Number of stored (non-zero) entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.inds.len()
    }

    /// True if no entry is stored (the zero vector).
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.inds.is_empty()
    }

    /// Iterate stored entries as (column, weight), ascending by column.
    #[inline]
    pub fn raw_iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.inds.iter().copied().zip(self.vals.iter().copied())
    }

    /// Dot product with another sparse vector (two-pointer merge join).
    pub fn dot(&self, other: &Self) -> f64 {
        let mut a_it = self.raw_iter().fuse();
        let mut b_it = other.raw_iter().fuse();
        let mut a_next = a_it.next();
        let mut b_next = b_it.next();
        let mut dot = 0_f64;
        while let (Some((ia, va)), Some((ib, vb))) = (a_next, b_next) {
            match ia.cmp(&ib) {
                Ordering::Equal => {
                    dot += va * vb;
                    a_next = a_it.next();
                    b_next = b_it.next();
                }
                Ordering::Less => a_next = a_it.next(),
                Ordering::Greater => b_next = b_it.next(),
            }
        }
        dot
    }

    /// Euclidean norm.
    pub fn l2_norm(&self) -> f64 {
        self.vals.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Scale to unit L2 norm. The zero vector is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            let inv = 1.0 / norm;
            for v in &mut self.vals {
                *v *= inv;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_sorts_merges_and_drops_zeros() {
        let v = SparseVec::from_pairs(vec![(5, 1.0), (1, 2.0), (5, 3.0), (3, 0.0)]);
        let entries: Vec<(u32, f64)> = v.raw_iter().collect();
        assert_eq!(entries, vec![(1, 2.0), (5, 4.0)]);
        assert_eq!(v.nnz(), 2);
    }

    #[test]
    fn zero_vector_behaves() {
        let z = SparseVec::zero();
        assert!(z.is_zero());
        assert_eq!(z.l2_norm(), 0.0);
        let mut z2 = z.clone();
        z2.normalize();
        assert!(z2.is_zero());
        let v = SparseVec::from_pairs(vec![(0, 1.0)]);
        assert_eq!(z.dot(&v), 0.0);
    }

    #[test]
    fn dot_matches_dense_computation() {
        let a = SparseVec::from_pairs(vec![(0, 1.0), (2, 2.0), (7, 3.0)]);
        let b = SparseVec::from_pairs(vec![(2, 4.0), (3, 5.0), (7, 6.0)]);
        // dense: 2*4 + 3*6
        assert_eq!(a.dot(&b), 26.0);
        assert_eq!(b.dot(&a), 26.0);
    }

    #[test]
    fn dot_of_disjoint_supports_is_zero() {
        let a = SparseVec::from_pairs(vec![(0, 1.0), (2, 1.0)]);
        let b = SparseVec::from_pairs(vec![(1, 1.0), (3, 1.0)]);
        assert_eq!(a.dot(&b), 0.0);
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = SparseVec::from_pairs(vec![(0, 3.0), (1, 4.0)]);
        v.normalize();
        assert!((v.l2_norm() - 1.0).abs() < 1e-12);
        let entries: Vec<(u32, f64)> = v.raw_iter().collect();
        assert_eq!(entries[0].0, 0);
        assert_eq!(entries[1].0, 1);
        // scaling by 1/norm leaves rounding in the last bit, so compare
        // with a tolerance rather than exact equality
        assert!((entries[0].1 - 0.6).abs() < 1e-12);
        assert!((entries[1].1 - 0.8).abs() < 1e-12);
    }
}
