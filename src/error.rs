use thiserror::Error;

/// Errors produced by the search engine.
/// All variants are precondition violations, synchronous and non-retryable;
/// none of them corrupt shared state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Bad build parameters (vocabulary size, latent rank).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Fitting was attempted on a corpus with zero documents.
    #[error("corpus is empty")]
    EmptyCorpus,

    /// `transform` was called on a projector that has not been fitted.
    #[error("projector has not been fitted")]
    NotFitted,

    /// `search` was called before the index finished building.
    #[error("index is not ready")]
    NotReady,

    /// A second build was attempted while one is already in progress.
    #[error("an index build is already in progress")]
    AlreadyBuilding,

    /// A previous build failed; the index is permanently unusable.
    #[error("index build failed, discard and rebuild")]
    BuildFailed,

    /// Malformed query parameters (e.g. k == 0).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
