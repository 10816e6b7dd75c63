use std::path::Path;
use std::sync::Arc;

use graphprov_core::ProvenanceConfig;
use graphprov_engine::{Provenance, ProvenanceBuilder, WorkflowStores};
use graphprov_storage::{GraphStore, SqliteGraphStore, StorageError};
use tempfile::TempDir;

/// Live, change and publish-target stores in a temporary directory that
/// is removed on drop.
pub struct TestStores {
    dir: TempDir,
    pub stores: WorkflowStores,
    pub target: Arc<dyn GraphStore>,
}

impl TestStores {
    pub fn new() -> Result<Self, StorageError> {
        let dir = tempfile::tempdir().map_err(|e| StorageError::Core(e.into()))?;
        let stores = WorkflowStores::new(
            open(&dir, "live")?,
            open(&dir, "added")?,
            open(&dir, "removed")?,
        );
        let target = open(&dir, "target")?;
        Ok(Self {
            dir,
            stores,
            target,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Another store in the same directory.
    pub fn open_store(&self, name: &str) -> Result<Arc<dyn GraphStore>, StorageError> {
        open(&self.dir, name)
    }

    pub fn builder(&self, config: ProvenanceConfig) -> ProvenanceBuilder {
        Provenance::builder(config, self.stores.clone())
    }

    pub fn provenance(&self, config: ProvenanceConfig) -> Provenance {
        self.builder(config).build()
    }

    /// Statement count of a store, across all contexts.
    pub fn size_of(store: &dyn GraphStore) -> Result<u64, StorageError> {
        store.connect()?.size(None)
    }
}

fn open(dir: &TempDir, name: &str) -> Result<Arc<dyn GraphStore>, StorageError> {
    Ok(Arc::new(SqliteGraphStore::open(
        name,
        dir.path().join(format!("{name}.db")),
    )?))
}

/// Config with editorial workflow switched on.
pub fn editorial_config() -> ProvenanceConfig {
    ProvenanceConfig::default().with_editorial_workflow(true)
}
