pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod term;
pub mod vocabulary;

pub use clock::{Timestamp, TimestampAllocator};
pub use config::{ProvenanceConfig, QueueConfig};
pub use context::{Context, ContextFactory, ContextLabel, ContextState, ContextType, FreshContext};
pub use error::CoreError;
pub use ids::*;
pub use term::{Literal, Quad, Statement, StatementPattern, Term};
