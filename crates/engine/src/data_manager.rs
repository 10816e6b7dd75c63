use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use graphprov_core::vocabulary::ctx;
use graphprov_core::{
    Context, ContextState, Iri, ProvenanceConfig, Quad, Statement, StatementPattern, Term,
};
use graphprov_storage::{GraphConnection, GraphStore, metadata};

use crate::error::EngineError;
use crate::stores::WorkflowStores;

/// Result of removing metadata for contexts that no longer hold data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub checked: usize,
    pub deleted: usize,
}

impl fmt::Display for CleanupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deleted {}/{} contexts.", self.deleted, self.checked)
    }
}

#[derive(Debug, Clone, Copy)]
enum Constraint {
    UserData,
    EditableData,
}

enum PendingChange {
    Added {
        context: Context,
        statements: Vec<Statement>,
    },
    Removed {
        changelog: Context,
        removed: Vec<Quad>,
        owners: HashMap<Iri, Context>,
    },
}

/// Buffers live-store changes until the outermost commit, then copies them
/// into the change stores.
struct ChangeRecorder {
    positive: Arc<dyn GraphStore>,
    negative: Arc<dyn GraphStore>,
    pending: Vec<PendingChange>,
}

impl ChangeRecorder {
    fn flush(&mut self) -> Result<(), EngineError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let changes = std::mem::take(&mut self.pending);
        let mut negative = self.negative.connect()?;
        let mut positive = self.positive.connect()?;
        negative.begin()?;
        positive.begin()?;

        let result = (|| -> Result<(), EngineError> {
            for change in &changes {
                match change {
                    PendingChange::Added {
                        context,
                        statements,
                    } => {
                        metadata::persist_context(positive.as_mut(), context)?;
                        positive.add(statements, &context.id)?;
                    }
                    PendingChange::Removed {
                        changelog,
                        removed,
                        owners,
                    } => {
                        let statements: Vec<Statement> =
                            removed.iter().map(|q| q.statement.clone()).collect();
                        metadata::persist_context(negative.as_mut(), changelog)?;
                        negative.add(&statements, &changelog.id)?;

                        // Published owners are recorded too so that a reject
                        // can find where a removed statement came from.
                        for quad in removed {
                            let Some(owner) = owners.get(&quad.context) else {
                                continue;
                            };
                            if owner.state == ContextState::Published {
                                metadata::persist_context(positive.as_mut(), owner)?;
                                positive.add(std::slice::from_ref(&quad.statement), &owner.id)?;
                            }
                        }
                    }
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                negative.commit()?;
                positive.commit()?;
                Ok(())
            }
            Err(e) => {
                for (side, conn) in [("negative", &mut negative), ("positive", &mut positive)] {
                    if let Err(rollback) = conn.rollback() {
                        warn!(store = side, error = %rollback, "change record rollback failed");
                    }
                }
                Err(EngineError::ChangeRecording(e.to_string()))
            }
        }
    }
}

/// Write access to one store, with nested transaction scopes and, on the
/// live store under editorial workflow, change recording.
pub struct DataManager {
    store: String,
    conn: Box<dyn GraphConnection>,
    recorder: Option<ChangeRecorder>,
    editable_default: bool,
}

impl DataManager {
    pub fn open(store: &dyn GraphStore, config: &ProvenanceConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store: store.name().to_string(),
            conn: store.connect()?,
            recorder: None,
            editable_default: config.contexts_editable_default,
        })
    }

    /// Opens the live store. Changes are recorded when editorial workflow is on.
    pub fn open_live(
        stores: &WorkflowStores,
        config: &ProvenanceConfig,
    ) -> Result<Self, EngineError> {
        let mut dm = Self::open(stores.live.as_ref(), config)?;
        if config.editorial_workflow {
            dm.recorder = Some(ChangeRecorder {
                positive: Arc::clone(&stores.positive),
                negative: Arc::clone(&stores.negative),
                pending: Vec::new(),
            });
        }
        Ok(dm)
    }

    pub fn store_name(&self) -> &str {
        &self.store
    }

    pub fn connection(&self) -> &dyn GraphConnection {
        self.conn.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub fn begin(&mut self) -> Result<(), EngineError> {
        self.conn.begin()?;
        Ok(())
    }

    /// Commits, then writes buffered change records.
    pub fn commit(&mut self) -> Result<(), EngineError> {
        if let Err(e) = self.conn.commit() {
            self.discard_pending();
            if let Err(rollback) = self.conn.rollback() {
                warn!(store = %self.store, error = %rollback, "rollback after failed commit failed");
            }
            return Err(e.into());
        }
        if let Some(recorder) = &mut self.recorder {
            recorder.flush().inspect_err(|e| {
                error!(store = %self.store, error = %e, "recording committed changes failed");
            })?;
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), EngineError> {
        self.discard_pending();
        self.conn.rollback()?;
        Ok(())
    }

    fn discard_pending(&mut self) {
        if let Some(recorder) = &mut self.recorder {
            recorder.pending.clear();
        }
    }

    /// Runs `f` inside a transaction. Joins an already open transaction
    /// instead of starting a new one.
    pub fn transactional<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.conn.in_transaction() {
            return f(self);
        }
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.rollback() {
                    warn!(store = %self.store, error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Context metadata
    // ========================================================================

    pub fn load_context(&self, id: &Iri) -> Result<Context, EngineError> {
        Ok(metadata::load_context(self.conn.as_ref(), id)?)
    }

    pub fn persist_context(&mut self, context: &Context) -> Result<(), EngineError> {
        metadata::persist_context(self.conn.as_mut(), context)?;
        Ok(())
    }

    pub fn contexts_in_state(&self, state: ContextState) -> Result<Vec<Context>, EngineError> {
        Ok(metadata::contexts_in_state(self.conn.as_ref(), state)?)
    }

    /// Re-persists `context` with `state`. Returns `false` without writing
    /// when this store holds no data for the context.
    pub fn set_context_state(
        &mut self,
        context: &Context,
        state: ContextState,
    ) -> Result<bool, EngineError> {
        if self.conn.is_context_empty(&context.id)? {
            debug!(store = %self.store, context = %context.id, "no data for context, state unchanged");
            return Ok(false);
        }
        let mut updated = context.clone();
        updated.state = state;
        self.persist_context(&updated)?;
        Ok(true)
    }

    pub fn set_context_editable(
        &mut self,
        context: &Context,
        editable: bool,
    ) -> Result<(), EngineError> {
        let mut updated = context.clone();
        updated.editable = Some(editable);
        self.persist_context(&updated)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Adds statements to `context` and persists its metadata.
    pub fn add_to_context(
        &mut self,
        statements: &[Statement],
        context: &Context,
    ) -> Result<usize, EngineError> {
        if statements.is_empty() {
            return Ok(0);
        }
        self.transactional(|dm| {
            metadata::persist_context(dm.conn.as_mut(), context)?;
            let added = dm.conn.add(statements, &context.id)?;
            if let Some(recorder) = &mut dm.recorder {
                recorder.pending.push(PendingChange::Added {
                    context: context.clone(),
                    statements: statements.to_vec(),
                });
            }
            trace!(store = %dm.store, context = %context.id, added, "added to context");
            Ok(added)
        })
    }

    /// Adds statements without touching metadata or the change stores.
    pub fn add_to_context_without_persist(
        &mut self,
        statements: &[Statement],
        context: &Iri,
    ) -> Result<usize, EngineError> {
        Ok(self.conn.add(statements, context)?)
    }

    /// Removes statements matching `patterns` from user contexts. With a
    /// changelog context the removals are recorded under it.
    pub fn remove_in_user_contexts(
        &mut self,
        patterns: &[StatementPattern],
        changelog: Option<&Context>,
    ) -> Result<BTreeSet<Iri>, EngineError> {
        self.remove_in_constrained_contexts(patterns, Constraint::UserData, changelog)
    }

    /// Removes statements from contexts that are editable. Literal objects
    /// match on their lexical form, whatever the datatype.
    pub fn remove_in_editable_contexts(
        &mut self,
        statements: &[Statement],
        changelog: Option<&Context>,
    ) -> Result<BTreeSet<Iri>, EngineError> {
        let patterns: Vec<StatementPattern> =
            statements.iter().map(StatementPattern::exact).collect();
        self.remove_in_constrained_contexts(&patterns, Constraint::EditableData, changelog)
    }

    fn matching_quads(&self, pattern: &StatementPattern) -> Result<Vec<Quad>, EngineError> {
        let Some(Term::Literal(literal)) = &pattern.object else {
            return Ok(self.conn.query(pattern, None)?);
        };
        let loose = StatementPattern {
            object: None,
            ..pattern.clone()
        };
        Ok(self
            .conn
            .query(&loose, None)?
            .into_iter()
            .filter(|q| {
                q.statement
                    .object
                    .as_literal()
                    .is_some_and(|l| l.lexical == literal.lexical)
            })
            .collect())
    }

    fn remove_in_constrained_contexts(
        &mut self,
        patterns: &[StatementPattern],
        constraint: Constraint,
        changelog: Option<&Context>,
    ) -> Result<BTreeSet<Iri>, EngineError> {
        self.transactional(|dm| {
            let mut owners: HashMap<Iri, Context> = HashMap::new();
            let mut seen = HashSet::new();
            let mut removed = Vec::new();
            for pattern in patterns {
                for quad in dm.matching_quads(pattern)? {
                    if !owners.contains_key(&quad.context) {
                        let owner = dm.load_context(&quad.context)?;
                        owners.insert(quad.context.clone(), owner);
                    }
                    let owner = &owners[&quad.context];
                    let allowed = match constraint {
                        Constraint::UserData => owner.is_user_context(),
                        Constraint::EditableData => owner.is_editable(dm.editable_default),
                    };
                    if allowed && seen.insert(quad.clone()) {
                        removed.push(quad);
                    }
                }
            }

            for quad in &removed {
                dm.conn.remove_statement(&quad.statement, Some(&quad.context))?;
            }
            let touched: BTreeSet<Iri> = removed.iter().map(|q| q.context.clone()).collect();
            for context in &touched {
                dm.unregister_if_empty(context)?;
            }

            if let (Some(changelog), Some(recorder)) = (changelog, dm.recorder.as_mut()) {
                if !removed.is_empty() {
                    recorder.pending.push(PendingChange::Removed {
                        changelog: changelog.clone(),
                        removed,
                        owners,
                    });
                }
            }
            Ok(touched)
        })
    }

    /// Removes the given statements from every context belonging to `group`.
    ///
    /// Touched contexts are collected into `touched` when given; otherwise
    /// the ones left empty are cleaned up right away.
    pub fn remove_from_group(
        &mut self,
        statements: &[Statement],
        group: &Iri,
        touched: Option<&mut HashSet<Iri>>,
    ) -> Result<usize, EngineError> {
        if statements.is_empty() {
            return Ok(0);
        }
        self.transactional(|dm| {
            let in_group = dm.group_context_ids(group)?;
            let mut removed = 0;
            let mut contexts = HashSet::new();
            for statement in statements {
                for quad in dm.conn.query(&StatementPattern::exact(statement), None)? {
                    if in_group.contains(&quad.context) {
                        removed += dm
                            .conn
                            .remove_statement(&quad.statement, Some(&quad.context))?;
                        contexts.insert(quad.context);
                    }
                }
            }
            match touched {
                Some(touched) => touched.extend(contexts),
                None => {
                    dm.cleanup_meta_garbage(&contexts)?;
                }
            }
            Ok(removed)
        })
    }

    /// Deletes the data and metadata of a context.
    pub fn delete_context(&mut self, id: &Iri) -> Result<usize, EngineError> {
        self.transactional(|dm| {
            let removed = dm.conn.clear_context(id)?;
            metadata::delete_context_metadata(dm.conn.as_mut(), id)?;
            debug!(store = %dm.store, context = %id, removed, "deleted context");
            Ok(removed)
        })
    }

    fn unregister_if_empty(&mut self, id: &Iri) -> Result<bool, EngineError> {
        if self.conn.is_context_empty(id)? {
            metadata::delete_context_metadata(self.conn.as_mut(), id)?;
            return Ok(true);
        }
        Ok(false)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    fn group_context_ids(&self, group: &Iri) -> Result<HashSet<Iri>, EngineError> {
        Ok(
            metadata::context_ids_with(self.conn.as_ref(), ctx::CONTEXT_GROUP, Term::from(group))?
                .into_iter()
                .collect(),
        )
    }

    /// Outgoing statements of `object` stored in contexts of `group`.
    pub fn statements_for_object_in_group(
        &self,
        object: &Iri,
        group: &Iri,
    ) -> Result<Vec<Statement>, EngineError> {
        let in_group = self.group_context_ids(group)?;
        let mut seen = HashSet::new();
        Ok(self
            .conn
            .query(&StatementPattern::any().with_subject(object), None)?
            .into_iter()
            .filter(|q| in_group.contains(&q.context))
            .map(|q| q.statement)
            .filter(|s| seen.insert(s.clone()))
            .collect())
    }

    /// Subjects linking to `object` through `predicate`, in any context.
    pub fn subjects_referring_to(
        &self,
        object: &Iri,
        predicate: &Iri,
    ) -> Result<BTreeSet<Iri>, EngineError> {
        let pattern = StatementPattern::any()
            .with_predicate(predicate.clone())
            .with_object(object);
        Ok(self
            .conn
            .statements(&pattern, None)?
            .into_iter()
            .filter_map(|s| s.subject.as_iri().cloned())
            .collect())
    }

    /// The context holding `(object, predicate, *)`, if any.
    pub fn context_of(&self, object: &Iri, predicate: &Iri) -> Result<Option<Iri>, EngineError> {
        let pattern = StatementPattern::any()
            .with_subject(object)
            .with_predicate(predicate.clone());
        Ok(self
            .conn
            .query(&pattern, None)?
            .into_iter()
            .map(|q| q.context)
            .find(|c| c.as_str() != ctx::META_CONTEXT))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drops metadata of the given contexts that no longer hold statements.
    pub fn cleanup_meta_garbage<'a>(
        &mut self,
        contexts: impl IntoIterator<Item = &'a Iri>,
    ) -> Result<CleanupSummary, EngineError> {
        let mut summary = CleanupSummary::default();
        for id in contexts {
            summary.checked += 1;
            if self.conn.is_context_empty(id)? && metadata::has_metadata(self.conn.as_ref(), id)? {
                metadata::delete_context_metadata(self.conn.as_mut(), id)?;
                summary.deleted += 1;
            }
        }
        debug!(store = %self.store, "{summary}");
        Ok(summary)
    }

    /// Deletes contexts of `source` with the given input parameter, except `keep`.
    pub fn delete_expired_contexts_of_source(
        &mut self,
        source: &Iri,
        input_parameter: Option<&Iri>,
        keep: &Iri,
    ) -> Result<usize, EngineError> {
        self.transactional(|dm| {
            let stale: Vec<Iri> = metadata::contexts_for_source(dm.conn.as_ref(), source)?
                .into_iter()
                .filter(|c| &c.id != keep && c.input_parameter.as_ref() == input_parameter)
                .map(|c| c.id)
                .collect();
            for id in &stale {
                dm.delete_context(id)?;
            }
            Ok(stale.len())
        })
    }

    /// Deletes contexts of `group`, except `keep` and those whose source is
    /// in `omit_sources`.
    pub fn delete_expired_contexts_of_group(
        &mut self,
        group: &Iri,
        omit_sources: &[Iri],
        keep: &Iri,
    ) -> Result<usize, EngineError> {
        self.transactional(|dm| {
            let stale: Vec<Iri> = metadata::contexts_for_group(dm.conn.as_ref(), group)?
                .into_iter()
                .filter(|c| {
                    &c.id != keep && !c.source.as_ref().is_some_and(|s| omit_sources.contains(s))
                })
                .map(|c| c.id)
                .collect();
            for id in &stale {
                dm.delete_context(id)?;
            }
            Ok(stale.len())
        })
    }

    /// Replaces every context of `fresh.source` with the same input
    /// parameter by `fresh` holding `statements`.
    pub fn update_data_for_source(
        &mut self,
        fresh: &Context,
        statements: &[Statement],
    ) -> Result<usize, EngineError> {
        let source = fresh.source.as_ref().ok_or_else(|| EngineError::IncompleteContext {
            context: fresh.id.to_string(),
            field: "source",
        })?;
        self.transactional(|dm| {
            let expired = dm.delete_expired_contexts_of_source(
                source,
                fresh.input_parameter.as_ref(),
                &fresh.id,
            )?;
            debug!(store = %dm.store, source = %source, expired, "replacing source data");
            dm.add_to_context(statements, fresh)
        })
    }

    /// Replaces every context of `fresh.group` by `fresh` holding
    /// `statements`, sparing contexts whose source is in `omit_sources`.
    pub fn update_data_for_group(
        &mut self,
        fresh: &Context,
        omit_sources: &[Iri],
        statements: &[Statement],
    ) -> Result<usize, EngineError> {
        let group = fresh.group.as_ref().ok_or_else(|| EngineError::IncompleteContext {
            context: fresh.id.to_string(),
            field: "group",
        })?;
        self.transactional(|dm| {
            let expired = dm.delete_expired_contexts_of_group(group, omit_sources, &fresh.id)?;
            debug!(store = %dm.store, group = %group, expired, "replacing group data");
            dm.add_to_context(statements, fresh)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphprov_core::{ContextFactory, ContextLabel, ContextType, FreshContext};
    use graphprov_storage::SqliteGraphStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        stores: WorkflowStores,
        config: ProvenanceConfig,
        factory: ContextFactory,
    }

    fn fixture(editorial: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let open = |name: &str| -> Arc<dyn GraphStore> {
            Arc::new(SqliteGraphStore::open(name, dir.path().join(format!("{name}.db"))).unwrap())
        };
        let stores = WorkflowStores::new(open("live"), open("added"), open("removed"));
        let config = ProvenanceConfig::default().with_editorial_workflow(editorial);
        let factory = ContextFactory::new(&config);
        Fixture {
            _dir: dir,
            stores,
            config,
            factory,
        }
    }

    fn stmt(s: &str, p: &str, o: Term) -> Statement {
        Statement::new(Iri::new(s), Iri::new(p), o)
    }

    #[test]
    fn failed_scope_rolls_back_and_records_nothing() {
        let fx = fixture(true);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let ctx = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);

        let result: Result<(), EngineError> = dm.transactional(|dm| {
            dm.add_to_context(&[stmt("urn:s", "urn:p", Term::literal("o"))], &ctx)?;
            Err(EngineError::QueueClosed)
        });
        assert!(result.is_err());
        assert_eq!(dm.connection().size(None).unwrap(), 0);
        assert_eq!(fx.stores.positive.connect().unwrap().size(None).unwrap(), 0);
    }

    #[test]
    fn edits_are_recorded_under_editorial_workflow() {
        let fx = fixture(true);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let base = fx
            .factory
            .fresh_published_context(ContextType::Provider, Some(Iri::new("urn:src")), None);
        let old = stmt("urn:s", "urn:p", Term::literal("old"));
        dm.add_to_context(&[old.clone()], &base).unwrap();

        let edit = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        let new = stmt("urn:s", "urn:p", Term::literal("new"));
        dm.transactional(|dm| {
            dm.remove_in_editable_contexts(&[old.clone()], Some(&edit))?;
            dm.add_to_context(&[new.clone()], &edit)
        })
        .unwrap();

        let negative = fx.stores.negative.connect().unwrap();
        assert!(negative.contains(&old, Some(&edit.id)).unwrap());
        let positive = fx.stores.positive.connect().unwrap();
        assert!(positive.contains(&new, Some(&edit.id)).unwrap());
        assert!(positive.contains(&old, Some(&base.id)).unwrap());
        assert_eq!(
            metadata::load_context(positive.as_ref(), &edit.id).unwrap().state,
            ContextState::Draft
        );
        // The base context lost its only statement and its metadata.
        assert!(!metadata::has_metadata(dm.connection(), &base.id).unwrap());
    }

    #[test]
    fn nothing_recorded_without_editorial_workflow() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        assert!(!dm.is_recording());
        let ctx = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        dm.add_to_context(&[stmt("urn:s", "urn:p", Term::literal("o"))], &ctx)
            .unwrap();
        assert_eq!(fx.stores.positive.connect().unwrap().size(None).unwrap(), 0);
    }

    #[test]
    fn literal_removal_ignores_datatype() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let ctx = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        let typed = stmt(
            "urn:s",
            "urn:p",
            Term::typed_literal("5", Iri::new("http://www.w3.org/2001/XMLSchema#int")),
        );
        dm.add_to_context(&[typed], &ctx).unwrap();

        let touched = dm
            .remove_in_user_contexts(
                &[StatementPattern::exact(&stmt("urn:s", "urn:p", Term::literal("5")))],
                None,
            )
            .unwrap();
        assert!(touched.contains(&ctx.id));
        assert!(dm.connection().is_context_empty(&ctx.id).unwrap());
    }

    #[test]
    fn user_constraint_spares_provider_data() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let provider =
            fx.factory
                .fresh_published_context(ContextType::Provider, Some(Iri::new("urn:src")), None);
        let user = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        let s = stmt("urn:s", "urn:p", Term::iri("urn:o"));
        dm.add_to_context(&[s.clone()], &provider).unwrap();
        dm.add_to_context(&[s.clone()], &user).unwrap();

        dm.remove_in_user_contexts(&[StatementPattern::any().with_subject(Iri::new("urn:s"))], None)
            .unwrap();
        assert!(dm.connection().contains(&s, Some(&provider.id)).unwrap());
        assert!(!dm.connection().contains(&s, Some(&user.id)).unwrap());
    }

    #[test]
    fn group_scoped_reads_and_removals() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let group = Iri::new("urn:group:g");
        let in_group = fx
            .factory
            .sync_service_context(&Iri::new("urn:feed"), Some(&group), None);
        let outside = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        let a = stmt("urn:obj", "urn:name", Term::literal("A"));
        let b = stmt("urn:obj", "urn:note", Term::literal("B"));
        dm.add_to_context(&[a.clone()], &in_group).unwrap();
        dm.add_to_context(&[b.clone()], &outside).unwrap();

        let found = dm
            .statements_for_object_in_group(&Iri::new("urn:obj"), &group)
            .unwrap();
        assert_eq!(found, vec![a.clone()]);

        let removed = dm.remove_from_group(&[a, b.clone()], &group, None).unwrap();
        assert_eq!(removed, 1);
        assert!(!metadata::has_metadata(dm.connection(), &in_group.id).unwrap());
        assert!(dm.connection().contains(&b, None).unwrap());
    }

    #[test]
    fn cleanup_reports_counts() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let kept = fx.factory.fresh_user_context(Iri::new("urn:user:a"), None);
        let emptied = fx.factory.fresh_user_context(Iri::new("urn:user:b"), None);
        dm.add_to_context(&[stmt("urn:s", "urn:p", Term::literal("1"))], &kept)
            .unwrap();
        dm.persist_context(&emptied).unwrap();

        let summary = dm.cleanup_meta_garbage([&kept.id, &emptied.id]).unwrap();
        assert_eq!(summary, CleanupSummary { checked: 2, deleted: 1 });
        assert_eq!(summary.to_string(), "Deleted 1/2 contexts.");
    }

    #[test]
    fn update_data_for_source_replaces_previous_run() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let source = Iri::new("urn:ontology");
        let run = |label| {
            fx.factory.fresh_context(
                FreshContext::new(ContextType::SyncService)
                    .source(source.clone())
                    .label(label),
            )
        };

        let first = run(ContextLabel::OntologyImportAnnotated);
        dm.update_data_for_source(&first, &[stmt("urn:C", "urn:p", Term::literal("1"))])
            .unwrap();
        let second = run(ContextLabel::OntologyImportAnnotated);
        dm.update_data_for_source(&second, &[stmt("urn:C", "urn:p", Term::literal("2"))])
            .unwrap();

        assert!(dm.connection().is_context_empty(&first.id).unwrap());
        assert_eq!(dm.connection().size(Some(&second.id)).unwrap(), 1);
        assert!(!metadata::has_metadata(dm.connection(), &first.id).unwrap());
    }

    #[test]
    fn update_data_for_group_spares_omitted_sources() {
        let fx = fixture(false);
        let mut dm = DataManager::open_live(&fx.stores, &fx.config).unwrap();
        let group = Iri::new("urn:group:g");
        let ontology = Iri::new("urn:ontology");
        let spared = fx.factory.sync_service_context(&ontology, Some(&group), None);
        let stale = fx
            .factory
            .sync_service_context(&Iri::new("urn:feed"), Some(&group), None);
        dm.add_to_context(&[stmt("urn:a", "urn:p", Term::literal("1"))], &spared)
            .unwrap();
        dm.add_to_context(&[stmt("urn:b", "urn:p", Term::literal("2"))], &stale)
            .unwrap();

        let fresh = fx.factory.fresh_context(
            FreshContext::new(ContextType::SyncService)
                .source(group.clone())
                .group(group.clone())
                .label(ContextLabel::InstanceDataImport),
        );
        dm.update_data_for_group(&fresh, &[ontology], &[stmt("urn:c", "urn:p", Term::literal("3"))])
            .unwrap();

        assert_eq!(dm.connection().size(Some(&spared.id)).unwrap(), 1);
        assert!(dm.connection().is_context_empty(&stale.id).unwrap());
        assert_eq!(dm.connection().size(Some(&fresh.id)).unwrap(), 1);
    }
}
