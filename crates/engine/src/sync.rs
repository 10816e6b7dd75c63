//! Producer side for synchronization feeds: turns mapped objects into
//! queued update requests for one group.

use graphprov_core::{Iri, ProvenanceConfig, RequestId, Timestamp};

use crate::error::EngineError;
use crate::mapping::ObjectMapping;
use crate::queue::ReconciliationQueue;
use crate::requests::UpdateRequest;

const UNKNOWN_SOURCE: &str = "User/unknown";

/// Per-update options for [`SyncService::add_or_update`].
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Who produced the update: an absolute IRI or a bare name.
    pub source: Option<String>,
    pub timestamp: Option<Timestamp>,
    pub recurse: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            source: None,
            timestamp: None,
            recurse: true,
        }
    }
}

/// Queues updates for one group and its ontology context.
#[derive(Clone)]
pub struct SyncService {
    queue: ReconciliationQueue,
    group: Iri,
    ontology_context: Iri,
    namespace: Iri,
}

impl SyncService {
    pub fn new(
        queue: ReconciliationQueue,
        group: Iri,
        ontology_context: Iri,
        config: &ProvenanceConfig,
    ) -> Self {
        Self {
            queue,
            group,
            ontology_context,
            namespace: config.namespace(),
        }
    }

    pub fn group(&self) -> &Iri {
        &self.group
    }

    pub fn ontology_context(&self) -> &Iri {
        &self.ontology_context
    }

    /// `None` maps to the unknown user, bare names resolve under the
    /// default namespace, absolute IRIs are kept.
    pub fn resolve_source(&self, source: Option<&str>) -> Iri {
        match source {
            None => self.namespace.join(UNKNOWN_SOURCE),
            Some(s) => Iri::parse(s).unwrap_or_else(|_| self.namespace.join(s)),
        }
    }

    fn submit(&self, request: UpdateRequest) -> Result<RequestId, EngineError> {
        let id = request.id;
        self.queue.submit(request)?;
        Ok(id)
    }

    pub fn import_ontology(&self) -> Result<RequestId, EngineError> {
        self.submit(UpdateRequest::ontology_import(
            self.group.clone(),
            self.ontology_context.clone(),
        ))
    }

    /// Replaces the whole group with `values`.
    pub fn import_instances<T>(
        &self,
        mapping: &ObjectMapping<T>,
        values: &[T],
    ) -> Result<RequestId, EngineError> {
        let objects = values.iter().map(|v| mapping.snapshot(v)).collect();
        self.submit(UpdateRequest::instance_import(
            self.group.clone(),
            self.ontology_context.clone(),
            objects,
        ))
    }

    pub fn add_or_update<T>(
        &self,
        mapping: &ObjectMapping<T>,
        value: &T,
        options: UpdateOptions,
    ) -> Result<RequestId, EngineError> {
        let mut request = UpdateRequest::add_or_update(
            self.group.clone(),
            self.ontology_context.clone(),
            mapping.snapshot(value),
            self.resolve_source(options.source.as_deref()),
            options.recurse,
        );
        request.timestamp = options.timestamp;
        self.submit(request)
    }

    pub fn delete<T>(
        &self,
        mapping: &ObjectMapping<T>,
        value: &T,
        timestamp: Option<Timestamp>,
    ) -> Result<RequestId, EngineError> {
        self.delete_by_id(mapping.id_of(value), &mapping.class_info().name, timestamp)
    }

    pub fn delete_by_id(
        &self,
        object: Iri,
        class: &str,
        timestamp: Option<Timestamp>,
    ) -> Result<RequestId, EngineError> {
        let mut request = UpdateRequest::delete_object(
            self.group.clone(),
            self.ontology_context.clone(),
            object,
            class,
        );
        request.timestamp = timestamp;
        self.submit(request)
    }
}
