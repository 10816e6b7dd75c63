pub mod error;
pub mod metadata;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use sqlite::{SqliteConnection, SqliteGraphStore};
pub use traits::*;
