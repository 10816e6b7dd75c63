use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::{trace, warn};

use graphprov_core::{Iri, Quad, Statement, StatementPattern, Term};

use crate::error::StorageError;
use crate::traits::{GraphConnection, GraphStore};

/// A graph store kept in one SQLite database file.
pub struct SqliteGraphStore {
    name: String,
    path: PathBuf,
}

impl SqliteGraphStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            name: name.into(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_connection(&self) -> Result<SqliteConnection, StorageError> {
        let conn = Connection::open(&self.path)?;
        crate::schema::configure_connection(&conn)?;
        Ok(SqliteConnection {
            store: self.name.clone(),
            conn,
            in_tx: false,
        })
    }
}

impl GraphStore for SqliteGraphStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<Box<dyn GraphConnection>, StorageError> {
        Ok(Box::new(self.open_connection()?))
    }
}

pub struct SqliteConnection {
    store: String,
    conn: Connection,
    in_tx: bool,
}

fn encode(term: &Term) -> Result<Vec<u8>, StorageError> {
    Ok(term.to_msgpack()?)
}

/// Builds the WHERE clause and its parameters for a pattern.
fn filter(
    pattern: &StatementPattern,
    context: Option<&Iri>,
) -> Result<(String, Vec<Value>), StorageError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(subject) = &pattern.subject {
        values.push(Value::Blob(encode(subject)?));
        clauses.push(format!("subject = ?{}", values.len()));
    }
    if let Some(predicate) = &pattern.predicate {
        values.push(Value::Text(predicate.as_str().to_string()));
        clauses.push(format!("predicate = ?{}", values.len()));
    }
    if let Some(object) = &pattern.object {
        values.push(Value::Blob(encode(object)?));
        clauses.push(format!("object = ?{}", values.len()));
    }
    if let Some(context) = context {
        values.push(Value::Text(context.as_str().to_string()));
        clauses.push(format!("context = ?{}", values.len()));
    }
    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok((sql, values))
}

fn read_quad(row: &rusqlite::Row) -> Result<Quad, StorageError> {
    let subject: Vec<u8> = row.get(0)?;
    let predicate: String = row.get(1)?;
    let object: Vec<u8> = row.get(2)?;
    let context: String = row.get(3)?;
    Ok(Quad {
        statement: Statement {
            subject: Term::from_msgpack(&subject)?,
            predicate: Iri::new(predicate),
            object: Term::from_msgpack(&object)?,
        },
        context: Iri::new(context),
    })
}

impl SqliteConnection {
    fn insert_all(
        conn: &Connection,
        statements: &[Statement],
        context: &Iri,
    ) -> Result<usize, StorageError> {
        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO quads (subject, predicate, object, context) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut inserted = 0;
        for statement in statements {
            inserted += stmt.execute(rusqlite::params![
                encode(&statement.subject)?,
                statement.predicate.as_str(),
                encode(&statement.object)?,
                context.as_str(),
            ])?;
        }
        Ok(inserted)
    }

    fn tx_error(&self, reason: &str) -> StorageError {
        StorageError::Transaction {
            store: self.store.clone(),
            reason: reason.to_string(),
        }
    }
}

impl GraphConnection for SqliteConnection {
    fn add(&mut self, statements: &[Statement], context: &Iri) -> Result<usize, StorageError> {
        if statements.is_empty() {
            return Ok(0);
        }
        let inserted = if self.in_tx {
            Self::insert_all(&self.conn, statements, context)?
        } else {
            let tx = self.conn.transaction()?;
            let inserted = Self::insert_all(&tx, statements, context)?;
            tx.commit()?;
            inserted
        };
        trace!(store = %self.store, context = %context, inserted, "add");
        Ok(inserted)
    }

    fn remove(
        &mut self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<usize, StorageError> {
        let (clause, values) = filter(pattern, context)?;
        let removed = self
            .conn
            .execute(&format!("DELETE FROM quads{clause}"), params_from_iter(values.iter()))?;
        trace!(store = %self.store, removed, "remove");
        Ok(removed)
    }

    fn query(
        &self,
        pattern: &StatementPattern,
        context: Option<&Iri>,
    ) -> Result<Vec<Quad>, StorageError> {
        let (clause, values) = filter(pattern, context)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT subject, predicate, object, context FROM quads{clause} ORDER BY rowid"
        ))?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut quads = Vec::new();
        while let Some(row) = rows.next()? {
            quads.push(read_quad(row)?);
        }
        Ok(quads)
    }

    fn contexts(&self) -> Result<Vec<Iri>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT context FROM quads ORDER BY context")?;
        let contexts = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contexts.into_iter().map(Iri::new).collect())
    }

    fn size(&self, context: Option<&Iri>) -> Result<u64, StorageError> {
        let count: i64 = match context {
            Some(ctx) => self.conn.query_row(
                "SELECT COUNT(*) FROM quads WHERE context = ?1",
                [ctx.as_str()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM quads", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.in_tx {
            return Err(self.tx_error("transaction already open"));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_tx = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.in_tx {
            return Err(self.tx_error("commit without transaction"));
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_tx = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if self.in_tx {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(store = %self.store, error = %e, "rollback on close failed");
            }
        }
    }
}
