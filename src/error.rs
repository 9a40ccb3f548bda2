use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Covers both malformed state files and failures to encode one.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid compaction policy switch period {0}, must be at least 1")]
    InvalidPeriod(u32),

    #[error("Failed to compute compaction details for store {store_id}: {reason}")]
    Compaction { store_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
