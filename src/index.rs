use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::rank::rank;
use crate::svd::{LatentMatrix, LatentProjector, Projection, ProjectorConfig};
use crate::tfidf::TfidfModel;
use crate::tokenize::Tokenizer;

/// Number of results returned by `search_top`.
pub const DEFAULT_TOP_K: usize = 5;

/// Build parameters for a `SearchIndex`.
/// Defaults suit a mid-sized corpus: a 1000-term vocabulary projected
/// onto 110 latent dimensions. Small corpora must lower `rank` below
/// min(document count, vocabulary size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum vocabulary size (N).
    pub max_vocab: usize,
    /// Latent rank (R).
    pub rank: usize,
    /// SVD iteration cap.
    pub max_iterations: usize,
    /// SVD convergence tolerance.
    pub tolerance: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let projector = ProjectorConfig::new(110);
        Self {
            max_vocab: 1000,
            rank: projector.rank,
            max_iterations: projector.max_iterations,
            tolerance: projector.tolerance,
        }
    }
}

impl IndexConfig {
    pub fn new(max_vocab: usize, rank: usize) -> Self {
        Self {
            max_vocab,
            rank,
            ..Self::default()
        }
    }

    fn projector(&self) -> ProjectorConfig {
        ProjectorConfig {
            rank: self.rank,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// One search result: the document text, its cosine similarity in the
/// latent space, and its stable position in the corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: String,
    #[serde(rename = "similarity")]
    pub score: f64,
    pub index: usize,
}

/// The composition root: owns the corpus, the fitted term-weighting
/// model, the fitted projection and the precomputed corpus latent matrix.
///
/// Built exactly once; every field is immutable afterwards, so `search`
/// takes `&self` and is safe to call concurrently from any number of
/// threads without locking.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    documents: Vec<String>,
    model: TfidfModel,
    projection: Projection,
    latent: LatentMatrix,
}

impl SearchIndex {
    /// Build an index over `documents`: fit the term-weighting model, fit
    /// the latent projection on the resulting weight matrix, then
    /// materialize the corpus latent matrix.
    ///
    /// Any failure aborts the whole build; a partially built index is
    /// never observable.
    pub fn build(
        documents: Vec<String>,
        tokenizer: Tokenizer,
        config: &IndexConfig,
    ) -> Result<Self> {
        let started = Instant::now();
        info!(
            documents = documents.len(),
            max_vocab = config.max_vocab,
            rank = config.rank,
            "building search index"
        );

        let model = TfidfModel::fit(&documents, tokenizer, config.max_vocab)?;
        debug!(vocab = model.vocab_size(), "fitted term-weighting model");

        let weights = model.transform_batch(&documents);
        let mut projector = LatentProjector::new(config.projector());
        projector.fit(&weights, model.vocab_size())?;
        let projection = projector.into_projection()?;
        let latent = projection.transform_rows(&weights);

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search index ready"
        );
        Ok(Self {
            documents,
            model,
            projection,
            latent,
        })
    }

    /// Return the `min(k, corpus size)` most similar documents, best
    /// first; score ties are broken by ascending corpus index.
    ///
    /// An empty, whitespace-only or fully out-of-vocabulary query is
    /// served, not rejected: it scores 0.0 against every document and the
    /// results come back in the deterministic tie-broken order.
    ///
    /// # Errors
    /// `InvalidRequest` if `k == 0`.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let weights = self.model.transform(query);
        let latent = self.projection.transform(&weights);
        let hits = rank(&latent, &self.latent, k)?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchHit {
                document: self.documents[hit.index].clone(),
                score: hit.score,
                index: hit.index,
            })
            .collect())
    }

    /// `search` with the default result count of 5.
    pub fn search_top(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search(query, DEFAULT_TOP_K)
    }

    #[inline]
    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    /// Document text at a corpus index.
    pub fn document(&self, index: usize) -> Option<&str> {
        self.documents.get(index).map(String::as_str)
    }

    #[inline]
    pub fn model(&self) -> &TfidfModel {
        &self.model
    }

    #[inline]
    pub fn latent(&self) -> &LatentMatrix {
        &self.latent
    }
}

/// A shared slot that builds its index at most once.
///
/// Collaborators that start serving before the corpus is ready hold an
/// `IndexCell`: `search` reports `NotReady` until `build_once` completes,
/// a concurrent second build attempt reports `AlreadyBuilding`, and a
/// failed build latches the cell into a permanent `BuildFailed` state
/// (callers discard the cell and rebuild).
#[derive(Debug, Default)]
pub struct IndexCell {
    slot: OnceCell<SearchIndex>,
    building: AtomicBool,
    failed: AtomicBool,
}

impl IndexCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the build if it has not happened yet. Returns the (possibly
    /// previously) built index on success.
    pub fn build_once(
        &self,
        documents: Vec<String>,
        tokenizer: Tokenizer,
        config: &IndexConfig,
    ) -> Result<&SearchIndex> {
        if self.failed.load(Ordering::Acquire) {
            return Err(SearchError::BuildFailed);
        }
        if let Some(index) = self.slot.get() {
            return Ok(index);
        }
        if self.building.swap(true, Ordering::AcqRel) {
            return Err(SearchError::AlreadyBuilding);
        }
        let outcome = match SearchIndex::build(documents, tokenizer, config) {
            Ok(index) => Ok(self.slot.get_or_init(|| index)),
            Err(err) => {
                self.failed.store(true, Ordering::Release);
                Err(err)
            }
        };
        self.building.store(false, Ordering::Release);
        outcome
    }

    /// Search the built index.
    ///
    /// # Errors
    /// `NotReady` before a successful build, `BuildFailed` after a failed
    /// one; otherwise whatever `SearchIndex::search` returns.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.failed.load(Ordering::Acquire) {
            return Err(SearchError::BuildFailed);
        }
        match self.slot.get() {
            Some(index) => index.search(query, k),
            None => Err(SearchError::NotReady),
        }
    }

    /// The built index, if the build has completed successfully.
    pub fn get(&self) -> Option<&SearchIndex> {
        self.slot.get()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }
}
