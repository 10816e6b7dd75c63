//! Editorial workflow: moves user contexts through draft, approved,
//! rejected and published across the live and change stores.
//!
//! `approve` and `back_to_draft` touch each store in its own transaction.
//! There is no compensation when a later store fails; the returned
//! [`TransitionReport`] says which stores were written. Publishing holds
//! one transaction per store and rolls all of them back on failure.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::{debug, error, info, warn};

use graphprov_core::clock::physical_now;
use graphprov_core::vocabulary::{self, changeset as cs, ctx, dc, prov, xsd};
use graphprov_core::{
    Context, ContextState, Iri, ProvenanceConfig, Statement, StatementPattern, Term,
};
use graphprov_storage::{GraphConnection, GraphStore, metadata};

use crate::data_manager::DataManager;
use crate::error::EngineError;
use crate::stores::WorkflowStores;

/// What one workflow step did to one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Applied,
    /// The store holds no data for the context.
    Skipped,
    Failed(String),
    NotAttempted,
}

impl StoreOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StoreOutcome::Applied | StoreOutcome::Skipped)
    }
}

/// Per-store result of a single-context transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub context: Iri,
    pub negative: StoreOutcome,
    pub positive: StoreOutcome,
    pub live: StoreOutcome,
}

impl TransitionReport {
    fn new(context: &Iri) -> Self {
        Self {
            context: context.clone(),
            negative: StoreOutcome::NotAttempted,
            positive: StoreOutcome::NotAttempted,
            live: StoreOutcome::NotAttempted,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.negative.is_ok() && self.positive.is_ok() && self.live.is_ok()
    }
}

impl fmt::Display for TransitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: negative={:?} positive={:?} live={:?}",
            self.context, self.negative, self.positive, self.live
        )
    }
}

/// Result of a bulk transition, which stops at the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub attempted: usize,
    pub completed: usize,
    pub failed_at: Option<Iri>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_at.is_none()
    }
}

/// One statement of a changeset and the side it was recorded on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetEntry {
    pub statement: Statement,
    pub removed: bool,
}

/// Added and removed statements of one pending context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub context: Context,
    pub entries: Vec<ChangesetEntry>,
    /// A later changeset in the same state touches one of our subjects.
    pub has_forward_dependency: bool,
    /// An earlier changeset in the same state touches one of our subjects.
    pub has_backward_dependency: bool,
}

impl Changeset {
    pub fn added(&self) -> impl Iterator<Item = &Statement> {
        self.entries
            .iter()
            .filter(|e| !e.removed)
            .map(|e| &e.statement)
    }

    pub fn removed(&self) -> impl Iterator<Item = &Statement> {
        self.entries
            .iter()
            .filter(|e| e.removed)
            .map(|e| &e.statement)
    }

    pub fn subjects(&self) -> BTreeSet<Term> {
        self.entries
            .iter()
            .map(|e| e.statement.subject.clone())
            .collect()
    }
}

/// Sets the dependency flags of changesets sorted oldest first. Only
/// changesets in the same state depend on each other.
pub fn mark_dependencies(changesets: &mut [Changeset]) {
    let subjects: Vec<BTreeSet<Term>> = changesets.iter().map(Changeset::subjects).collect();
    for earlier in 0..changesets.len() {
        for later in earlier + 1..changesets.len() {
            if changesets[earlier].context.state != changesets[later].context.state {
                continue;
            }
            if !subjects[earlier].is_disjoint(&subjects[later]) {
                changesets[earlier].has_forward_dependency = true;
                changesets[later].has_backward_dependency = true;
            }
        }
    }
}

/// Where and as whom to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub target_context: Iri,
    pub publisher: Term,
    pub origin: Option<Iri>,
    pub owner: Option<Iri>,
    pub description: String,
    pub version: String,
}

impl PublishRequest {
    pub fn new(target_context: Iri, publisher: impl Into<Term>) -> Self {
        Self {
            target_context,
            publisher: publisher.into(),
            origin: None,
            owner: None,
            description: String::new(),
            version: "1".to_string(),
        }
    }

    pub fn origin(mut self, origin: Iri) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn owner(mut self, owner: Iri) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Summary of a committed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata {
    pub contexts: usize,
    /// Size of the published delta, not the rows the target changed: a
    /// statement the target already held still counts.
    pub triples_added: usize,
    pub triples_removed: usize,
    /// BLAKE3 hex digest over the applied delta, in application order.
    pub checksum: String,
}

/// The four transactions of one publish.
struct PublishTransaction {
    target: Box<dyn GraphConnection>,
    negative: DataManager,
    positive: DataManager,
    live: DataManager,
    hasher: blake3::Hasher,
    added: usize,
    removed: usize,
}

impl PublishTransaction {
    fn begin(
        stores: &WorkflowStores,
        config: &ProvenanceConfig,
        target: &dyn GraphStore,
    ) -> Result<Self, EngineError> {
        let mut tx = Self {
            target: target.connect()?,
            negative: DataManager::open(stores.negative.as_ref(), config)?,
            positive: DataManager::open(stores.positive.as_ref(), config)?,
            live: DataManager::open(stores.live.as_ref(), config)?,
            hasher: blake3::Hasher::new(),
            added: 0,
            removed: 0,
        };
        tx.target.begin()?;
        tx.negative.begin()?;
        tx.positive.begin()?;
        tx.live.begin()?;
        Ok(tx)
    }

    fn include(&mut self, context: &Context, target_context: &Iri) -> Result<(), EngineError> {
        let all = StatementPattern::any();
        let additions = self
            .positive
            .connection()
            .statements(&all, Some(&context.id))?;
        let removals = self
            .negative
            .connection()
            .statements(&all, Some(&context.id))?;

        self.target.add(&additions, target_context)?;
        for statement in &additions {
            self.hasher.update(format!("+{statement}\n").as_bytes());
        }
        for statement in &removals {
            self.target.remove_statement(statement, None)?;
            self.hasher.update(format!("-{statement}\n").as_bytes());
        }
        self.added += additions.len();
        self.removed += removals.len();

        self.negative.set_context_state(context, ContextState::Published)?;
        self.positive.set_context_state(context, ContextState::Published)?;
        self.live.set_context_state(context, ContextState::Published)?;
        debug!(
            context = %context.id,
            added = additions.len(),
            removed = removals.len(),
            "included in publish"
        );
        Ok(())
    }

    fn write_description(&mut self, request: &PublishRequest) -> Result<String, EngineError> {
        let subject = &request.target_context;
        let checksum = self.hasher.finalize().to_hex().to_string();
        let long = |n: u64| Term::typed_literal(n.to_string(), vocabulary::iri(xsd::LONG));

        let mut record = vec![
            Statement::new(
                subject,
                vocabulary::iri(dc::DESCRIPTION),
                Term::literal(request.description.as_str()),
            ),
            Statement::new(subject, vocabulary::iri(dc::CREATOR), request.publisher.clone()),
            Statement::new(
                subject,
                vocabulary::iri(dc::HAS_VERSION),
                Term::literal(request.version.as_str()),
            ),
            Statement::new(subject, vocabulary::iri(cs::TRIPLES_ADDED), long(self.added as u64)),
            Statement::new(
                subject,
                vocabulary::iri(cs::TRIPLES_REMOVED),
                long(self.removed as u64),
            ),
            Statement::new(subject, vocabulary::iri(cs::CHECKSUM), Term::literal(checksum.as_str())),
            Statement::new(subject, vocabulary::iri(dc::DATE), long(physical_now()?)),
        ];
        if let Some(origin) = &request.origin {
            record.push(Statement::new(subject, vocabulary::iri(prov::ORIGIN), origin));
        }
        if let Some(owner) = &request.owner {
            record.push(Statement::new(subject, vocabulary::iri(prov::OWNER), owner));
        }

        // One description per target context: drop the previous one.
        for predicate in [
            dc::DESCRIPTION,
            dc::CREATOR,
            dc::HAS_VERSION,
            cs::TRIPLES_ADDED,
            cs::TRIPLES_REMOVED,
            cs::CHECKSUM,
            dc::DATE,
            prov::ORIGIN,
            prov::OWNER,
        ] {
            self.target.remove(
                &StatementPattern::any()
                    .with_subject(subject)
                    .with_predicate(vocabulary::iri(predicate)),
                Some(subject),
            )?;
        }
        self.target.add(&record, subject)?;
        Ok(checksum)
    }

    /// Target first, then the internal stores.
    fn commit(mut self, contexts: usize, checksum: String) -> Result<PublishMetadata, EngineError> {
        self.target.commit()?;
        self.negative.commit()?;
        self.positive.commit()?;
        self.live.commit()?;
        Ok(PublishMetadata {
            contexts,
            triples_added: self.added,
            triples_removed: self.removed,
            checksum,
        })
    }

    fn rollback(mut self) {
        if let Err(e) = self.target.rollback() {
            warn!(error = %e, "target rollback failed");
        }
        for dm in [&mut self.negative, &mut self.positive, &mut self.live] {
            if let Err(e) = dm.rollback() {
                warn!(store = dm.store_name(), error = %e, "rollback failed");
            }
        }
    }
}

/// The editorial state machine over the live and change stores.
pub struct EditorialWorkflow {
    stores: WorkflowStores,
    config: ProvenanceConfig,
}

impl EditorialWorkflow {
    pub fn new(stores: WorkflowStores, config: ProvenanceConfig) -> Self {
        Self { stores, config }
    }

    pub fn stores(&self) -> &WorkflowStores {
        &self.stores
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    pub fn approve(&self, context: &Context) -> TransitionReport {
        self.set_state(context, ContextState::Approved)
    }

    pub fn back_to_draft(&self, context: &Context) -> TransitionReport {
        self.set_state(context, ContextState::Draft)
    }

    /// Negative store, then positive, then live; stops at the first failure.
    fn set_state(&self, context: &Context, state: ContextState) -> TransitionReport {
        let mut report = TransitionReport::new(&context.id);
        let steps = [
            (&mut report.negative, &self.stores.negative),
            (&mut report.positive, &self.stores.positive),
            (&mut report.live, &self.stores.live),
        ];
        for (slot, store) in steps {
            let result = DataManager::open(store.as_ref(), &self.config)
                .and_then(|mut dm| dm.transactional(|dm| dm.set_context_state(context, state)));
            if !record_step(slot, store.name(), &context.id, state.as_str(), result) {
                break;
            }
        }
        if report.succeeded() {
            info!(context = %context.id, state = state.as_str(), "context state changed");
        }
        report
    }

    /// Deletes the context everywhere and puts back what it removed.
    ///
    /// Each removed statement returns to the latest context that holds it
    /// in the positive store. Statements with no such owner stay removed.
    pub fn reject(&self, context: &Context) -> TransitionReport {
        let mut report = TransitionReport::new(&context.id);
        let removed = match self.removed_statements(&context.id) {
            Ok(removed) => removed,
            Err(e) => {
                record_step(
                    &mut report.negative,
                    self.stores.negative.name(),
                    &context.id,
                    "reject",
                    Err(e),
                );
                return report;
            }
        };

        let done = record_step(
            &mut report.positive,
            self.stores.positive.name(),
            &context.id,
            "reject",
            self.delete_from(self.stores.positive.as_ref(), &context.id),
        ) && record_step(
            &mut report.live,
            self.stores.live.name(),
            &context.id,
            "reject",
            self.revert_live(&context.id, &removed),
        ) && record_step(
            &mut report.negative,
            self.stores.negative.name(),
            &context.id,
            "reject",
            self.close_rejected(context),
        );
        if done {
            info!(context = %context.id, restored = removed.len(), "context rejected");
        }
        report
    }

    fn removed_statements(&self, context: &Iri) -> Result<Vec<Statement>, EngineError> {
        let negative = self.stores.negative.connect()?;
        Ok(negative.statements(&StatementPattern::any(), Some(context))?)
    }

    fn delete_from(&self, store: &dyn GraphStore, context: &Iri) -> Result<bool, EngineError> {
        let mut dm = DataManager::open(store, &self.config)?;
        Ok(dm.delete_context(context)? > 0)
    }

    fn revert_live(&self, context: &Iri, removed: &[Statement]) -> Result<bool, EngineError> {
        let positive = self.stores.positive.connect()?;
        let mut live = DataManager::open(self.stores.live.as_ref(), &self.config)?;
        live.transactional(|dm| {
            dm.delete_context(context)?;
            for statement in removed {
                match latest_owner(positive.as_ref(), statement)? {
                    Some(owner) => {
                        dm.add_to_context(std::slice::from_ref(statement), &owner)?;
                    }
                    None => {
                        warn!(context = %context, %statement, "removed statement has no earlier owner, not restored");
                    }
                }
            }
            Ok(true)
        })
    }

    /// Leaves only a `Rejected` metadata record in the negative store.
    fn close_rejected(&self, context: &Context) -> Result<bool, EngineError> {
        let mut negative = DataManager::open(self.stores.negative.as_ref(), &self.config)?;
        negative.transactional(|dm| {
            dm.delete_context(&context.id)?;
            let mut rejected = context.clone();
            rejected.state = ContextState::Rejected;
            dm.persist_context(&rejected)?;
            Ok(true)
        })
    }

    pub fn approve_all(&self) -> Result<BulkOutcome, EngineError> {
        let drafts = self.get_draft_contexts()?;
        Ok(run_bulk("approve", &drafts, |c| self.approve(c)))
    }

    pub fn back_to_draft_all(&self) -> Result<BulkOutcome, EngineError> {
        let approved = self.get_approved_contexts()?;
        Ok(run_bulk("back to draft", &approved, |c| self.back_to_draft(c)))
    }

    /// Rejects drafts newest first, so each reject restores state the
    /// next-older draft expects.
    pub fn reject_all(&self) -> Result<BulkOutcome, EngineError> {
        let mut drafts = self.get_draft_contexts()?;
        drafts.reverse();
        Ok(run_bulk("reject", &drafts, |c| self.reject(c)))
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    pub fn publish_one_context(
        &self,
        context: &Context,
        target: &dyn GraphStore,
        request: &PublishRequest,
    ) -> Result<PublishMetadata, EngineError> {
        self.publish(std::slice::from_ref(context), target, request)
    }

    /// Publishes every approved context, oldest first, in one target
    /// transaction with one description record. Nothing approved is a no-op.
    pub fn publish_all_approved(
        &self,
        target: &dyn GraphStore,
        request: &PublishRequest,
    ) -> Result<PublishMetadata, EngineError> {
        let approved = self.get_approved_contexts()?;
        if approved.is_empty() {
            info!(target = target.name(), "nothing approved to publish");
            return Ok(PublishMetadata {
                contexts: 0,
                triples_added: 0,
                triples_removed: 0,
                checksum: blake3::Hasher::new().finalize().to_hex().to_string(),
            });
        }
        self.publish(&approved, target, request)
    }

    fn publish(
        &self,
        contexts: &[Context],
        target: &dyn GraphStore,
        request: &PublishRequest,
    ) -> Result<PublishMetadata, EngineError> {
        let mut tx = PublishTransaction::begin(&self.stores, &self.config, target)?;
        let staged = (|| -> Result<String, EngineError> {
            for context in contexts {
                tx.include(context, &request.target_context)?;
            }
            tx.write_description(request)
        })();

        let result = match staged {
            Ok(checksum) => tx.commit(contexts.len(), checksum),
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        };
        match &result {
            Ok(meta) => info!(
                target = target.name(),
                target_context = %request.target_context,
                contexts = meta.contexts,
                added = meta.triples_added,
                removed = meta.triples_removed,
                "published"
            ),
            Err(e) => error!(
                target = target.name(),
                target_context = %request.target_context,
                error = %e,
                "publish failed, rolled back"
            ),
        }
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Contexts in `state` in either change store, oldest first.
    fn recorded_in_state(&self, state: ContextState) -> Result<Vec<Context>, EngineError> {
        let negative = self.stores.negative.connect()?;
        let positive = self.stores.positive.connect()?;
        let mut seen = HashSet::new();
        let mut contexts: Vec<Context> = metadata::contexts_in_state(negative.as_ref(), state)?
            .into_iter()
            .chain(metadata::contexts_in_state(positive.as_ref(), state)?)
            .filter(|c| seen.insert(c.id.clone()))
            .collect();
        contexts.sort_by(|a, b| a.cmp_by_timestamp(b));
        Ok(contexts)
    }

    pub fn get_draft_contexts(&self) -> Result<Vec<Context>, EngineError> {
        self.recorded_in_state(ContextState::Draft)
    }

    pub fn get_approved_contexts(&self) -> Result<Vec<Context>, EngineError> {
        self.recorded_in_state(ContextState::Approved)
    }

    pub fn get_rejected_contexts(&self) -> Result<Vec<Context>, EngineError> {
        let negative = self.stores.negative.connect()?;
        Ok(metadata::contexts_in_state(
            negative.as_ref(),
            ContextState::Rejected,
        )?)
    }

    /// Every published context in the change stores, including provider
    /// and sync-service contexts recorded under editorial workflow.
    pub fn get_published_contexts(&self) -> Result<Vec<Context>, EngineError> {
        self.recorded_in_state(ContextState::Published)
    }

    /// Draft and approved changesets, oldest first, with dependency flags.
    pub fn changesets(&self) -> Result<Vec<Changeset>, EngineError> {
        let mut pending = self.get_draft_contexts()?;
        pending.extend(self.get_approved_contexts()?);
        pending.sort_by(|a, b| a.cmp_by_timestamp(b));

        let negative = self.stores.negative.connect()?;
        let positive = self.stores.positive.connect()?;
        let all = StatementPattern::any();
        let mut changesets = Vec::with_capacity(pending.len());
        for context in pending {
            let mut entries: Vec<ChangesetEntry> = positive
                .statements(&all, Some(&context.id))?
                .into_iter()
                .map(|statement| ChangesetEntry {
                    statement,
                    removed: false,
                })
                .collect();
            entries.extend(
                negative
                    .statements(&all, Some(&context.id))?
                    .into_iter()
                    .map(|statement| ChangesetEntry {
                        statement,
                        removed: true,
                    }),
            );
            changesets.push(Changeset {
                context,
                entries,
                has_forward_dependency: false,
                has_backward_dependency: false,
            });
        }
        mark_dependencies(&mut changesets);
        Ok(changesets)
    }
}

/// Latest-timestamp context in `positive` holding `statement`.
fn latest_owner(
    positive: &dyn GraphConnection,
    statement: &Statement,
) -> Result<Option<Context>, EngineError> {
    let mut best: Option<Context> = None;
    for quad in positive.query(&StatementPattern::exact(statement), None)? {
        if quad.context.as_str() == ctx::META_CONTEXT {
            continue;
        }
        let candidate = metadata::load_context(positive, &quad.context)?;
        if candidate.state == ContextState::Rejected {
            continue;
        }
        best = match best {
            Some(current) if current.cmp_by_timestamp(&candidate) != Ordering::Less => {
                Some(current)
            }
            _ => Some(candidate),
        };
    }
    Ok(best)
}

/// Stores the outcome of one step; returns whether to continue.
fn record_step(
    slot: &mut StoreOutcome,
    store: &str,
    context: &Iri,
    action: &str,
    result: Result<bool, EngineError>,
) -> bool {
    match result {
        Ok(true) => {
            *slot = StoreOutcome::Applied;
            true
        }
        Ok(false) => {
            *slot = StoreOutcome::Skipped;
            true
        }
        Err(e) => {
            error!(store, context = %context, action, error = %e, "workflow step failed, stores may disagree");
            *slot = StoreOutcome::Failed(e.to_string());
            false
        }
    }
}

fn run_bulk(
    action: &str,
    contexts: &[Context],
    mut op: impl FnMut(&Context) -> TransitionReport,
) -> BulkOutcome {
    let mut outcome = BulkOutcome {
        attempted: 0,
        completed: 0,
        failed_at: None,
    };
    for context in contexts {
        outcome.attempted += 1;
        let report = op(context);
        if !report.succeeded() {
            warn!(action, %report, completed = outcome.completed, "bulk transition stopped");
            outcome.failed_at = Some(context.id.clone());
            break;
        }
        outcome.completed += 1;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use graphprov_core::ContextFactory;
    use graphprov_storage::SqliteGraphStore;

    fn stmt(s: &str, p: &str, o: &str) -> Statement {
        Statement::new(Iri::new(s), Iri::new(p), Term::literal(o))
    }

    fn changeset(state: ContextState, ts: u64, subjects: &[&str]) -> Changeset {
        let factory = ContextFactory::new(&ProvenanceConfig::default());
        let mut context = factory.fresh_user_context(Iri::new("urn:user:u"), None);
        context.state = state;
        context.timestamp = Some(ts);
        Changeset {
            context,
            entries: subjects
                .iter()
                .map(|s| ChangesetEntry {
                    statement: stmt(s, "urn:p", "v"),
                    removed: false,
                })
                .collect(),
            has_forward_dependency: false,
            has_backward_dependency: false,
        }
    }

    #[test]
    fn dependencies_only_within_same_state() {
        let mut sets = vec![
            changeset(ContextState::Draft, 1, &["urn:s1"]),
            changeset(ContextState::Approved, 2, &["urn:s1"]),
            changeset(ContextState::Draft, 3, &["urn:s1", "urn:s2"]),
            changeset(ContextState::Draft, 4, &["urn:s9"]),
        ];
        mark_dependencies(&mut sets);

        assert!(sets[0].has_forward_dependency);
        assert!(!sets[0].has_backward_dependency);
        assert!(!sets[1].has_forward_dependency && !sets[1].has_backward_dependency);
        assert!(sets[2].has_backward_dependency);
        assert!(!sets[2].has_forward_dependency);
        assert!(!sets[3].has_forward_dependency && !sets[3].has_backward_dependency);
    }

    #[test]
    fn report_succeeds_with_skips() {
        let mut report = TransitionReport::new(&Iri::new("urn:ctx"));
        assert!(!report.succeeded());
        report.negative = StoreOutcome::Skipped;
        report.positive = StoreOutcome::Applied;
        report.live = StoreOutcome::Applied;
        assert!(report.succeeded());
        report.live = StoreOutcome::Failed("disk".into());
        assert!(!report.succeeded());
    }

    #[test]
    fn bulk_stops_at_first_failure() {
        let factory = ContextFactory::new(&ProvenanceConfig::default());
        let contexts: Vec<Context> = (0..3)
            .map(|_| factory.fresh_user_context(Iri::new("urn:user:u"), None))
            .collect();
        let failing = contexts[1].id.clone();
        let outcome = run_bulk("approve", &contexts, |c| {
            let mut report = TransitionReport::new(&c.id);
            let outcome = if c.id == failing {
                StoreOutcome::Failed("boom".into())
            } else {
                StoreOutcome::Applied
            };
            report.negative = outcome.clone();
            report.positive = outcome.clone();
            report.live = outcome;
            report
        });
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.failed_at, Some(failing));
        assert!(!outcome.is_complete());
    }

    #[test]
    fn publish_all_approved_without_approved_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let open = |name: &str| -> Arc<dyn GraphStore> {
            Arc::new(SqliteGraphStore::open(name, dir.path().join(format!("{name}.db"))).unwrap())
        };
        let stores = WorkflowStores::new(open("live"), open("added"), open("removed"));
        let target = open("target");
        let workflow = EditorialWorkflow::new(
            stores,
            ProvenanceConfig::default().with_editorial_workflow(true),
        );

        let meta = workflow
            .publish_all_approved(target.as_ref(), &PublishRequest::new(Iri::new("urn:pub"), Iri::new("urn:user:admin")))
            .unwrap();
        assert_eq!(meta.contexts, 0);
        assert_eq!(target.connect().unwrap().size(None).unwrap(), 0);
    }

    #[test]
    fn approve_moves_state_in_change_stores() {
        let dir = tempfile::tempdir().unwrap();
        let open = |name: &str| -> Arc<dyn GraphStore> {
            Arc::new(SqliteGraphStore::open(name, dir.path().join(format!("{name}.db"))).unwrap())
        };
        let stores = WorkflowStores::new(open("live"), open("added"), open("removed"));
        let config = ProvenanceConfig::default().with_editorial_workflow(true);
        let factory = ContextFactory::new(&config);
        let edit = factory.fresh_user_context(Iri::new("urn:user:u"), None);
        let mut dm = DataManager::open_live(&stores, &config).unwrap();
        dm.add_to_context(&[stmt("urn:s", "urn:p", "v")], &edit).unwrap();

        let workflow = EditorialWorkflow::new(stores, config);
        assert_eq!(workflow.get_draft_contexts().unwrap(), vec![edit.clone()]);

        let report = workflow.approve(&edit);
        assert!(report.succeeded(), "{report}");
        assert_eq!(report.negative, StoreOutcome::Skipped);
        assert_eq!(report.positive, StoreOutcome::Applied);
        assert_eq!(report.live, StoreOutcome::Applied);
        assert!(workflow.get_draft_contexts().unwrap().is_empty());
        assert_eq!(workflow.get_approved_contexts().unwrap(), vec![edit]);
    }
}
