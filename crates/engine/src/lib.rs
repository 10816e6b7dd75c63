pub mod data_manager;
pub mod error;
pub mod mapping;
pub mod queue;
pub mod requests;
pub mod stores;
pub mod sync;
pub mod workflow;

pub use data_manager::{CleanupSummary, DataManager};
pub use error::EngineError;
pub use mapping::{
    ClassInfo, DeletionPolicy, MappingRegistry, NoResolver, ObjectMapping, ObjectResolver,
    ObjectSnapshot,
};
pub use queue::{
    ChangeListener, ConsumerHandle, DrainReport, NoopListener, QueueStats, ReconciliationQueue,
};
pub use requests::{RequestEffects, RequestProcessor, UpdateKind, UpdateRequest};
pub use stores::WorkflowStores;
pub use sync::{SyncService, UpdateOptions};
pub use workflow::{
    BulkOutcome, Changeset, ChangesetEntry, EditorialWorkflow, PublishMetadata, PublishRequest,
    StoreOutcome, TransitionReport,
};

use std::sync::Arc;

use tracing::debug;

use graphprov_core::{
    Context, ContextFactory, FreshContext, Iri, ProvenanceConfig, TimestampAllocator,
};
use graphprov_storage::metadata;

pub struct ProvenanceBuilder {
    config: ProvenanceConfig,
    stores: WorkflowStores,
    registry: Arc<MappingRegistry>,
    resolver: Arc<dyn ObjectResolver>,
    listener: Arc<dyn ChangeListener>,
    clock: Option<TimestampAllocator>,
}

impl ProvenanceBuilder {
    pub fn registry(mut self, registry: MappingRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ObjectResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Continues from a clock that already issued timestamps, e.g. the
    /// newest one found in the store.
    pub fn clock(mut self, clock: TimestampAllocator) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Provenance {
        let factory = Arc::new(match self.clock {
            Some(clock) => ContextFactory::with_clock(&self.config, clock),
            None => ContextFactory::new(&self.config),
        });
        let queue = ReconciliationQueue::builder(&self.config, self.stores.clone(), factory.clone())
            .registry(self.registry.clone())
            .resolver(self.resolver)
            .listener(self.listener)
            .build();
        let workflow = EditorialWorkflow::new(self.stores.clone(), self.config.clone());
        debug!(stores = ?self.stores, editorial = self.config.editorial_workflow, "provenance layer ready");
        Provenance {
            config: self.config,
            factory,
            stores: self.stores,
            registry: self.registry,
            workflow,
            queue,
        }
    }
}

/// Entry point: context allocation, the editorial workflow and the
/// reconciliation queue over one set of stores.
pub struct Provenance {
    config: ProvenanceConfig,
    factory: Arc<ContextFactory>,
    stores: WorkflowStores,
    registry: Arc<MappingRegistry>,
    workflow: EditorialWorkflow,
    queue: ReconciliationQueue,
}

impl Provenance {
    pub fn builder(config: ProvenanceConfig, stores: WorkflowStores) -> ProvenanceBuilder {
        ProvenanceBuilder {
            config,
            stores,
            registry: Arc::new(MappingRegistry::new()),
            resolver: Arc::new(NoResolver),
            listener: Arc::new(NoopListener),
            clock: None,
        }
    }

    pub fn new(config: ProvenanceConfig, stores: WorkflowStores) -> Self {
        Self::builder(config, stores).build()
    }

    pub fn config(&self) -> &ProvenanceConfig {
        &self.config
    }

    pub fn stores(&self) -> &WorkflowStores {
        &self.stores
    }

    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn fresh_context(&self, request: FreshContext) -> Context {
        self.factory.fresh_context(request)
    }

    /// Loads metadata from the live store, falling back to the change
    /// stores for contexts that only removed statements.
    pub fn load_context(&self, id: &Iri) -> Result<Context, EngineError> {
        for store in [&self.stores.live, &self.stores.positive, &self.stores.negative] {
            let conn = store.connect()?;
            if metadata::has_metadata(conn.as_ref(), id)? {
                return Ok(metadata::load_context(conn.as_ref(), id)?);
            }
        }
        let conn = self.stores.live.connect()?;
        Ok(metadata::load_context(conn.as_ref(), id)?)
    }

    /// A write layer over the live store, recording changes under
    /// editorial workflow.
    pub fn data_manager(&self) -> Result<DataManager, EngineError> {
        DataManager::open_live(&self.stores, &self.config)
    }

    pub fn workflow(&self) -> &EditorialWorkflow {
        &self.workflow
    }

    pub fn queue(&self) -> &ReconciliationQueue {
        &self.queue
    }

    pub fn submit_update(&self, request: UpdateRequest) -> Result<(), EngineError> {
        self.queue.submit(request)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn sync_service(&self, group: Iri, ontology_context: Iri) -> SyncService {
        SyncService::new(self.queue.clone(), group, ontology_context, &self.config)
    }
}
