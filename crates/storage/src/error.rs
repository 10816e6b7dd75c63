use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("transaction error on {store}: {reason}")]
    Transaction { store: String, reason: String },

    #[error("core error: {0}")]
    Core(#[from] graphprov_core::CoreError),
}
