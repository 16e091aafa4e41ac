// Error taxonomy for the explorer
//
// Initialization failures and query contract violations are typed here so
// the boot sequence can tell them apart; CLI and page code wraps them in
// anyhow with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A query ran before the snapshot finished loading.
    #[error("Database not initialized")]
    NotInitialized,

    /// The snapshot file could not be copied into memory.
    #[error("failed to load snapshot {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The snapshot file does not exist.
    #[error("snapshot not found at {0:?}")]
    Missing(PathBuf),

    /// The file loaded but is not a credit-union snapshot.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("query failed: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("import failed: {0}")]
    Import(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
