use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use graphprov_core::{Iri, Quad, Statement, StatementPattern};
use graphprov_storage::{GraphConnection, GraphStore, StorageError};

/// Wraps a store so that commits can be made to fail on demand.
pub struct FaultyStore {
    inner: Arc<dyn GraphStore>,
    fail_commit: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn GraphStore>) -> Self {
        Self {
            inner,
            fail_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }
}

impl GraphStore for FaultyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connect(&self) -> Result<Box<dyn GraphConnection>, StorageError> {
        Ok(Box::new(FaultyConnection {
            store: self.inner.name().to_string(),
            inner: self.inner.connect()?,
            fail_commit: Arc::clone(&self.fail_commit),
        }))
    }
}

struct FaultyConnection {
    store: String,
    inner: Box<dyn GraphConnection>,
    fail_commit: Arc<AtomicBool>,
}

impl GraphConnection for FaultyConnection {
    fn add(&mut self, statements: &[Statement], context: &Iri) -> Result<usize, StorageError> {
        self.inner.add(statements, context)
    }

    fn remove(
        &mut self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<usize, StorageError> {
        self.inner.remove(pattern, context)
    }

    fn query(
        &self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<Vec<Quad>, StorageError> {
        self.inner.query(pattern, context)
    }

    fn contexts(&self) -> Result<Vec<Iri>, StorageError> {
        self.inner.contexts()
    }

    fn size(&self, context: Option<&Iri>) -> Result<u64, StorageError> {
        self.inner.size(context)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        self.inner.begin()
    }

    // The transaction stays open; dropping the connection rolls it back.
    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(StorageError::Transaction {
                store: self.store.clone(),
                reason: "injected commit failure".into(),
            });
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }
}
