use graphprov_core::{Iri, Quad, Statement, StatementPattern};

use crate::error::StorageError;

/// A named graph store that hands out independent connections.
pub trait GraphStore: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> Result<Box<dyn GraphConnection>, StorageError>;
}

/// One connection to a graph store.
///
/// Without an explicit `begin` every call commits on its own. Dropping a
/// connection closes it and rolls back an open transaction.
pub trait GraphConnection {
    /// Adds statements to `context`; returns how many were not already there.
    fn add(&mut self, statements: &[Statement], context: &Iri) -> Result<usize, StorageError>;

    /// Removes matching statements, from every context when `context` is `None`.
    fn remove(
        &mut self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<usize, StorageError>;

    fn query(
        &self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<Vec<Quad>, StorageError>;

    /// Every context holding at least one statement.
    fn contexts(&self) -> Result<Vec<Iri>, StorageError>;

    fn size(&self, context: Option<&Iri>) -> Result<u64, StorageError>;

    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    /// No-op when no transaction is open.
    fn rollback(&mut self) -> Result<(), StorageError>;

    fn in_transaction(&self) -> bool;

    fn statements(
        &self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<Vec<Statement>, StorageError> {
        Ok(self
            .query(pattern, context)?
            .into_iter()
            .map(|q| q.statement)
            .collect())
    }

    fn contains(&self, statement: &Statement, context: Option<&Iri>) -> Result<bool, StorageError> {
        Ok(!self
            .query(&StatementPattern::exact(statement), context)?
            .is_empty())
    }

    fn remove_statement(
        &mut self,
        statement: &Statement,
        context: Option<&Iri>,
    ) -> Result<usize, StorageError> {
        self.remove(&StatementPattern::exact(statement), context)
    }

    fn clear_context(&mut self, context: &Iri) -> Result<usize, StorageError> {
        self.remove(&StatementPattern::any(), Some(context))
    }

    fn is_context_empty(&self, context: &Iri) -> Result<bool, StorageError> {
        Ok(self.size(Some(context))? == 0)
    }
}
