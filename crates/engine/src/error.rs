use graphprov_core::CoreError;
use graphprov_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("context has no {field}: {context}")]
    IncompleteContext { context: String, field: &'static str },

    #[error("no mapping registered for class: {0}")]
    UnknownClass(String),

    #[error("change recording failed: {0}")]
    ChangeRecording(String),

    #[error("reconciliation queue is full ({capacity} requests)")]
    QueueFull { capacity: usize },

    #[error("reconciliation queue is closed")]
    QueueClosed,

    #[error("consumer thread failed: {0}")]
    Consumer(String),
}
