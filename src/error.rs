use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    /// A graph write transaction failed to commit. Nothing from the
    /// transaction survives; the caller may retry.
    #[error("graph transaction failed to commit: {0}")]
    StoreTransactionFailed(#[from] redb::CommitError),

    /// The source document could not be read or parsed. Per-file; never
    /// aborts a batch.
    #[error("extraction failed for {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// The store was built with a different embedding model or dimension
    /// than the active embedder. Raised before anything is mutated or scored.
    #[error(
        "embedding configuration mismatch: store has {stored_model} \
         (dim {stored_dimension}), active embedder is {active_model} \
         (dim {active_dimension})"
    )]
    EmbeddingConfigMismatch {
        stored_model: String,
        stored_dimension: usize,
        active_model: String,
        active_dimension: usize,
    },

    /// Empty or malformed query text.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
