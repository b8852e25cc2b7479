/// This crate is a latent semantic document search engine.
///
/// A fixed corpus is vectorized with TF-IDF, compressed into a dense
/// latent topic space with a deterministic truncated SVD, and queries are
/// answered by cosine-ranking the corpus in that space. Documents that
/// share no exact terms with a query can still rank as similar if they
/// share latent topics.
pub mod error;
pub mod index;
pub mod rank;
pub mod sparse;
pub mod svd;
pub mod tfidf;
pub mod tokenize;

/// Search Index
/// The top-level struct of this crate: the composition root owning the
/// corpus, the fitted term-weighting model, the fitted latent projection
/// and the precomputed corpus latent matrix.
///
/// Built exactly once via `SearchIndex::build`; immutable afterwards, so
/// `search` is lock-free and safe to call concurrently.
pub use index::SearchIndex;

/// Build parameters: vocabulary cap (N), latent rank (R) and the SVD
/// iteration settings.
pub use index::IndexConfig;

/// A single search result: document text, cosine similarity score and the
/// document's stable corpus index.
pub use index::SearchHit;

/// One-time build slot for collaborators that start serving before the
/// corpus is ready. Reports `NotReady` until the build completes,
/// `AlreadyBuilding` for a concurrent second build, and `BuildFailed`
/// permanently after a failed build.
pub use index::IndexCell;

/// Term-Weighting Model
/// Learns a capped vocabulary and IDF weights from the corpus and
/// converts arbitrary text into L2-normalized sparse TF-IDF vectors.
pub use tfidf::{TfidfModel, Vocabulary};

/// Latent Semantic Projector
/// Learns a rank-R truncated SVD basis of the weight matrix and applies
/// that fixed linear map to new vectors. The solver is deterministic:
/// repeated fits of the same matrix are bit-identical.
pub use svd::{LatentProjector, Projection, ProjectorConfig};

/// Similarity Ranker
/// Pure cosine top-k ranking over the corpus latent matrix, descending by
/// score with ascending-index tie-break.
pub use rank::{rank, RankedHit};

/// Tokenizer with a configurable stop-word set; the bundled English list
/// is available via `Tokenizer::english`.
pub use tokenize::Tokenizer;

/// Error taxonomy. Every variant is a synchronous precondition violation;
/// nothing in the core retries internally.
pub use error::SearchError;
