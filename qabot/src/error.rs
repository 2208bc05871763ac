use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to embed question: {0}")]
    EmbeddingRequest(#[source] anyhow::Error),

    #[error("Chat completion request failed: {0}")]
    ChatRequest(#[source] anyhow::Error),

    #[error(
        "Embedding dimension mismatch in {collection}[{index}]: expected {expected}, found {found}"
    )]
    DimensionMismatch {
        collection: &'static str,
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("The reply stream has not been fully consumed.")]
    IncompleteReply,

    #[error("Failed to load corpus from {path}: {source}")]
    Corpus {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
