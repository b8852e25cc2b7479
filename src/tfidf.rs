use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::sparse::SparseVec;
use crate::tokenize::Tokenizer;

/// Mapping from normalized term to a stable column index.
/// Built once at fit time; immutable afterwards. Columns are assigned in
/// lexicographic order of the selected terms, so the mapping is fully
/// determined by the corpus, the stop-word set and the size cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(with = "indexmap::map::serde_seq")]
    terms: IndexMap<Box<str>, u32>,
}

impl Vocabulary {
    /// Column index of a term, or `None` if it is out of vocabulary.
    #[inline]
    pub fn col(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }

    /// Number of terms (the dimension of the weight space).
    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Iterate (term, column) in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.terms.iter().map(|(t, c)| (t.as_ref(), *c))
    }
}

/// Term-weighting model: TF-IDF with a capped vocabulary.
///
/// `fit` learns the vocabulary and per-term inverse document frequencies
/// from a corpus; `transform` converts arbitrary new text into an
/// L2-normalized sparse weight vector over that fixed vocabulary.
#[derive(Debug, Clone)]
pub struct TfidfModel {
    vocab: Vocabulary,
    /// IDF weight per column: ln(doc_count / doc_freq).
    idf: Vec<f64>,
    doc_count: usize,
    tokenizer: Tokenizer,
}

impl TfidfModel {
    /// Learn a vocabulary and IDF weights from `documents`.
    ///
    /// At most `max_vocab` terms survive, selected by total occurrence
    /// count across the corpus; ties are broken by lexicographic term
    /// order so the result is deterministic.
    ///
    /// # Errors
    /// - `Config` if `max_vocab` is zero
    /// - `EmptyCorpus` if `documents` is empty (IDF is undefined)
    pub fn fit<D>(documents: &[D], tokenizer: Tokenizer, max_vocab: usize) -> Result<Self>
    where
        D: AsRef<str> + Sync,
    {
        if max_vocab == 0 {
            return Err(SearchError::Config(
                "max vocabulary size must be positive".to_string(),
            ));
        }
        if documents.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let tokenized: Vec<Vec<String>> = documents
            .par_iter()
            .map(|doc| tokenizer.tokenize(doc.as_ref()))
            .collect();

        // total occurrences across the corpus and per-term document counts
        let mut total_counts: AHashMap<&str, u64> = AHashMap::new();
        let mut doc_freq: AHashMap<&str, u32> = AHashMap::new();
        for terms in &tokenized {
            let mut seen: AHashSet<&str> = AHashSet::with_capacity(terms.len());
            for term in terms {
                *total_counts.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        // top-N by corpus occurrence count, lexicographic tie-break
        let mut candidates: Vec<(&str, u64)> = total_counts.into_iter().collect();
        candidates.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(max_vocab);

        // columns assigned in lexicographic order of the surviving terms
        let mut selected: Vec<&str> = candidates.into_iter().map(|(term, _)| term).collect();
        selected.sort_unstable();

        let doc_count = documents.len();
        let mut terms = IndexMap::with_capacity(selected.len());
        let mut idf = Vec::with_capacity(selected.len());
        for (col, term) in selected.into_iter().enumerate() {
            terms.insert(Box::<str>::from(term), col as u32);
            // every selected term occurs in at least one document
            let df = doc_freq[term] as f64;
            idf.push((doc_count as f64 / df).ln());
        }

        Ok(Self {
            vocab: Vocabulary { terms },
            idf,
            doc_count,
            tokenizer,
        })
    }

    /// Convert text into an L2-normalized sparse TF-IDF vector.
    ///
    /// Out-of-vocabulary terms are silently dropped. Empty, whitespace-only
    /// or fully out-of-vocabulary input yields the all-zero vector, which
    /// is a valid result rather than an error.
    pub fn transform(&self, text: &str) -> SparseVec {
        let mut counts: AHashMap<u32, u64> = AHashMap::new();
        for term in self.tokenizer.tokenize(text) {
            if let Some(col) = self.vocab.col(&term) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        let pairs: Vec<(u32, f64)> = counts
            .into_iter()
            .map(|(col, count)| (col, count as f64 * self.idf[col as usize]))
            .collect();
        let mut vec = SparseVec::from_pairs(pairs);
        vec.normalize();
        vec
    }

    /// Transform a batch of texts in parallel, preserving order.
    pub fn transform_batch<D>(&self, texts: &[D]) -> Vec<SparseVec>
    where
        D: AsRef<str> + Sync,
    {
        texts
            .par_iter()
            .map(|text| self.transform(text.as_ref()))
            .collect()
    }

    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Dimension of the weight space (vocabulary size).
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Number of documents the model was fitted on.
    #[inline]
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }
}
