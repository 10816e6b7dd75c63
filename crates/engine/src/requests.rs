//! Update requests and how one is applied to the live store.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use tracing::{debug, trace, warn};

use graphprov_core::vocabulary::{self, rdf};
use graphprov_core::{
    ContextFactory, ContextLabel, ContextType, FreshContext, Iri, RequestId, Statement,
    StatementPattern, Term, Timestamp,
};

use crate::data_manager::DataManager;
use crate::error::EngineError;
use crate::mapping::{ClassInfo, DeletionPolicy, MappingRegistry, ObjectResolver, ObjectSnapshot};

/// A queued intent, scoped to a group and its ontology context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub id: RequestId,
    pub group: Iri,
    pub ontology_context: Iri,
    /// Logical time of the change; requests sharing one write into the
    /// same synchronization context.
    pub timestamp: Option<Timestamp>,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    OntologyImport,
    InstanceImport {
        objects: Vec<ObjectSnapshot>,
    },
    DeleteObject {
        object: Iri,
        class: String,
    },
    AddOrUpdate {
        object: ObjectSnapshot,
        /// Also refresh objects whose back-links changed.
        recurse: bool,
        source: Iri,
    },
}

impl UpdateRequest {
    fn with_kind(group: Iri, ontology_context: Iri, kind: UpdateKind) -> Self {
        Self {
            id: RequestId::new(),
            group,
            ontology_context,
            timestamp: None,
            kind,
        }
    }

    pub fn ontology_import(group: Iri, ontology_context: Iri) -> Self {
        Self::with_kind(group, ontology_context, UpdateKind::OntologyImport)
    }

    pub fn instance_import(group: Iri, ontology_context: Iri, objects: Vec<ObjectSnapshot>) -> Self {
        Self::with_kind(group, ontology_context, UpdateKind::InstanceImport { objects })
    }

    pub fn delete_object(
        group: Iri,
        ontology_context: Iri,
        object: Iri,
        class: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            group,
            ontology_context,
            UpdateKind::DeleteObject {
                object,
                class: class.into(),
            },
        )
    }

    pub fn add_or_update(
        group: Iri,
        ontology_context: Iri,
        object: ObjectSnapshot,
        source: Iri,
        recurse: bool,
    ) -> Self {
        Self::with_kind(
            group,
            ontology_context,
            UpdateKind::AddOrUpdate {
                object,
                recurse,
                source,
            },
        )
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            UpdateKind::OntologyImport => "ontology-import",
            UpdateKind::InstanceImport { .. } => "instance-import",
            UpdateKind::DeleteObject { .. } => "delete-object",
            UpdateKind::AddOrUpdate { .. } => "add-or-update",
        }
    }
}

impl fmt::Display for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            UpdateKind::DeleteObject { object, .. } => {
                write!(f, "{} {} ({})", self.kind_name(), object, self.id)
            }
            UpdateKind::AddOrUpdate { object, .. } => {
                write!(f, "{} {} ({})", self.kind_name(), object.id, self.id)
            }
            _ => write!(f, "{} {} ({})", self.kind_name(), self.group, self.id),
        }
    }
}

/// What applying requests changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestEffects {
    pub statements_added: usize,
    pub statements_removed: usize,
    pub updated: BTreeSet<Iri>,
    pub deleted: BTreeSet<Iri>,
    /// Contexts that lost statements; candidates for metadata cleanup.
    pub removed_from: HashSet<Iri>,
    pub added_to: HashSet<Iri>,
}

impl RequestEffects {
    pub fn merge(&mut self, other: RequestEffects) {
        self.statements_added += other.statements_added;
        self.statements_removed += other.statements_removed;
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
        self.removed_from.extend(other.removed_from);
        self.added_to.extend(other.added_to);
    }
}

/// Applies requests through a [`DataManager`], diffing against stored state.
pub struct RequestProcessor<'a> {
    factory: &'a ContextFactory,
    registry: &'a MappingRegistry,
    resolver: &'a dyn ObjectResolver,
}

impl<'a> RequestProcessor<'a> {
    pub fn new(
        factory: &'a ContextFactory,
        registry: &'a MappingRegistry,
        resolver: &'a dyn ObjectResolver,
    ) -> Self {
        Self {
            factory,
            registry,
            resolver,
        }
    }

    /// Applies one request in its own transaction scope.
    pub fn apply(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
    ) -> Result<RequestEffects, EngineError> {
        dm.transactional(|dm| {
            let mut effects = RequestEffects::default();
            let mut visited = HashSet::new();
            match &request.kind {
                UpdateKind::OntologyImport => self.import_ontology(dm, request, &mut effects)?,
                UpdateKind::InstanceImport { objects } => {
                    self.import_instances(dm, request, objects, &mut effects)?
                }
                UpdateKind::DeleteObject { object, class } => {
                    self.delete(dm, request, object, class, &mut visited, &mut effects)?
                }
                UpdateKind::AddOrUpdate {
                    object,
                    recurse,
                    source,
                } => self.add_or_update(
                    dm,
                    request,
                    object,
                    source,
                    *recurse,
                    &mut visited,
                    &mut effects,
                )?,
            }
            trace!(request = %request, added = effects.statements_added, removed = effects.statements_removed, "request applied");
            Ok(effects)
        })
    }

    fn class(&self, name: &str) -> Result<&'a ClassInfo, EngineError> {
        self.registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownClass(name.to_string()))
    }

    fn import_ontology(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
        effects: &mut RequestEffects,
    ) -> Result<(), EngineError> {
        let fresh = self.factory.fresh_context(
            FreshContext::new(ContextType::SyncService)
                .source(request.ontology_context.clone())
                .label(ContextLabel::OntologyImportAnnotated)
                .editable(false),
        );
        let statements = self.registry.ontology_statements();
        effects.statements_added += dm.update_data_for_source(&fresh, &statements)?;
        effects.added_to.insert(fresh.id);
        Ok(())
    }

    fn import_instances(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
        objects: &[ObjectSnapshot],
        effects: &mut RequestEffects,
    ) -> Result<(), EngineError> {
        let fresh = self.factory.fresh_context(
            FreshContext::new(ContextType::SyncService)
                .source(request.group.clone())
                .group(request.group.clone())
                .label(ContextLabel::InstanceDataImport)
                .editable(false),
        );
        let mut seen = HashSet::new();
        let statements: Vec<Statement> = objects
            .iter()
            .flat_map(ObjectSnapshot::all_statements)
            .filter(|s| seen.insert(s.clone()))
            .collect();
        effects.statements_added += dm.update_data_for_group(
            &fresh,
            std::slice::from_ref(&request.ontology_context),
            &statements,
        )?;
        effects.added_to.insert(fresh.id);
        effects.updated.extend(objects.iter().map(|o| o.id.clone()));
        Ok(())
    }

    /// The context holding the object's type statement, if it belongs to
    /// the request's group.
    fn owning_context(
        &self,
        dm: &DataManager,
        object: &Iri,
        group: &Iri,
    ) -> Result<Option<Iri>, EngineError> {
        let Some(id) = dm.context_of(object, &vocabulary::iri(rdf::TYPE))? else {
            return Ok(None);
        };
        let context = dm.load_context(&id)?;
        Ok((context.group.as_ref() == Some(group)).then_some(id))
    }

    /// Current referencers of `object`, per referencing predicate.
    fn referencers(
        &self,
        dm: &DataManager,
        object: &Iri,
        info: &ClassInfo,
    ) -> Result<BTreeMap<Iri, BTreeSet<Iri>>, EngineError> {
        info.referencing_predicates
            .iter()
            .map(|p| Ok((p.clone(), dm.subjects_referring_to(object, p)?)))
            .collect()
    }

    /// Stored statements of the object and of the objects it referred to.
    fn stored_statements(
        &self,
        dm: &DataManager,
        object: &Iri,
        group: &Iri,
        info: &ClassInfo,
    ) -> Result<Vec<Statement>, EngineError> {
        let own = dm.statements_for_object_in_group(object, group)?;
        let mut out = own.clone();
        for statement in &own {
            if !info.referred_predicates.contains(&statement.predicate) {
                continue;
            }
            if let Some(sub) = statement.object.as_iri() {
                out.extend(dm.statements_for_object_in_group(sub, group)?);
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_or_update(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
        object: &ObjectSnapshot,
        source: &Iri,
        recurse: bool,
        visited: &mut HashSet<Iri>,
        effects: &mut RequestEffects,
    ) -> Result<(), EngineError> {
        if !visited.insert(object.id.clone()) {
            debug!(object = %object.id, "already refreshed by this request");
            return Ok(());
        }
        let info = self.class(&object.class)?;
        let group = &request.group;

        if info.deletion_policy == DeletionPolicy::Context {
            if let Some(context) = self.owning_context(dm, &object.id, group)? {
                effects.statements_removed += dm.delete_context(&context)?;
            }
        }

        let old = self.stored_statements(dm, &object.id, group, info)?;
        let new = object.all_statements();
        let old_set: HashSet<&Statement> = old.iter().collect();
        let new_set: HashSet<&Statement> = new.iter().collect();
        let mut seen = HashSet::new();
        let deletions: Vec<Statement> = old
            .iter()
            .filter(|s| !new_set.contains(s) && seen.insert(*s))
            .cloned()
            .collect();
        let additions: Vec<Statement> = new
            .iter()
            .filter(|s| !old_set.contains(s) && seen.insert(*s))
            .cloned()
            .collect();

        let before = if recurse {
            self.referencers(dm, &object.id, info)?
        } else {
            BTreeMap::new()
        };

        effects.statements_removed +=
            dm.remove_from_group(&deletions, group, Some(&mut effects.removed_from))?;
        if !additions.is_empty() {
            let context = self
                .factory
                .sync_service_context(source, Some(group), request.timestamp);
            effects.statements_added += dm.add_to_context(&additions, &context)?;
            effects.added_to.insert(context.id);
        }
        if !deletions.is_empty() || !additions.is_empty() {
            effects.updated.insert(object.id.clone());
        }
        debug!(
            object = %object.id,
            removed = deletions.len(),
            added = additions.len(),
            "object reconciled"
        );

        if recurse {
            let mut affected = BTreeSet::new();
            for predicate in &info.referencing_predicates {
                let old = before.get(predicate).cloned().unwrap_or_default();
                let new = object
                    .referencing
                    .get(predicate)
                    .cloned()
                    .unwrap_or_default();
                affected.extend(old.symmetric_difference(&new).cloned());
            }
            for referencer in affected {
                self.refresh(dm, request, &referencer, source, visited, effects)?;
            }
        }
        Ok(())
    }

    fn refresh(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
        referencer: &Iri,
        source: &Iri,
        visited: &mut HashSet<Iri>,
        effects: &mut RequestEffects,
    ) -> Result<(), EngineError> {
        match self.resolver.resolve(referencer) {
            Some(snapshot) => {
                trace!(object = %referencer, "cascading to referencing object");
                self.add_or_update(dm, request, &snapshot, source, true, visited, effects)
            }
            None => {
                warn!(object = %referencer, request = %request, "referencing object could not be resolved, not refreshed");
                Ok(())
            }
        }
    }

    fn delete(
        &self,
        dm: &mut DataManager,
        request: &UpdateRequest,
        object: &Iri,
        class: &str,
        visited: &mut HashSet<Iri>,
        effects: &mut RequestEffects,
    ) -> Result<(), EngineError> {
        let info = self.class(class)?;
        let group = &request.group;
        let before = self.referencers(dm, object, info)?;
        visited.insert(object.clone());

        match info.deletion_policy {
            DeletionPolicy::Context => {
                if let Some(context) = self.owning_context(dm, object, group)? {
                    effects.statements_removed += dm.delete_context(&context)?;
                }
            }
            DeletionPolicy::ObjectAndUserStatements | DeletionPolicy::Object => {
                if info.deletion_policy == DeletionPolicy::ObjectAndUserStatements {
                    let touched = dm.remove_in_user_contexts(
                        &[
                            StatementPattern::any().with_subject(object),
                            StatementPattern::any().with_object(Term::from(object)),
                        ],
                        None,
                    )?;
                    effects.removed_from.extend(touched);
                }
                let own = dm.statements_for_object_in_group(object, group)?;
                effects.statements_removed +=
                    dm.remove_from_group(&own, group, Some(&mut effects.removed_from))?;
            }
        }
        effects.deleted.insert(object.clone());
        debug!(object = %object, policy = ?info.deletion_policy, "object deleted");

        // Cascade sources are the group for deletions.
        let affected: BTreeSet<Iri> = before.into_values().flatten().collect();
        for referencer in affected {
            self.refresh(dm, request, &referencer, group, visited, effects)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use graphprov_core::ProvenanceConfig;
    use graphprov_storage::{GraphStore, SqliteGraphStore};

    use crate::mapping::{NoResolver, ObjectMapping};

    struct Item {
        id: &'static str,
        name: &'static str,
    }

    fn mapping() -> ObjectMapping<Item> {
        ObjectMapping::new("Item", Iri::new("urn:ex:Item"), |i: &Item| Iri::new(i.id))
            .property(Iri::new("urn:ex:name"), |i| vec![Term::literal(i.name)])
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        dm: DataManager,
        factory: ContextFactory,
        registry: MappingRegistry,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let live: Arc<dyn GraphStore> =
            Arc::new(SqliteGraphStore::open("live", dir.path().join("live.db")).unwrap());
        let config = ProvenanceConfig::default();
        let dm = DataManager::open(live.as_ref(), &config).unwrap();
        let mut registry = MappingRegistry::new();
        registry.register(&mapping());
        Fixture {
            _dir: dir,
            dm,
            factory: ContextFactory::new(&config),
            registry,
        }
    }

    fn upsert(name: &'static str) -> UpdateRequest {
        UpdateRequest::add_or_update(
            Iri::new("urn:group:g"),
            Iri::new("urn:ontology"),
            mapping().snapshot(&Item { id: "urn:item:1", name }),
            Iri::new("urn:feed"),
            false,
        )
    }

    #[test]
    fn repeated_upsert_is_a_no_op() {
        let mut fx = fixture();
        let processor = RequestProcessor::new(&fx.factory, &fx.registry, &NoResolver);

        let first = processor.apply(&mut fx.dm, &upsert("one")).unwrap();
        assert_eq!(first.statements_added, 2);
        let second = processor.apply(&mut fx.dm, &upsert("one")).unwrap();
        assert_eq!(second.statements_added, 0);
        assert_eq!(second.statements_removed, 0);
        assert!(second.updated.is_empty());
    }

    #[test]
    fn upsert_writes_only_the_delta() {
        let mut fx = fixture();
        let processor = RequestProcessor::new(&fx.factory, &fx.registry, &NoResolver);
        processor.apply(&mut fx.dm, &upsert("one")).unwrap();

        let effects = processor.apply(&mut fx.dm, &upsert("two")).unwrap();
        assert_eq!(effects.statements_added, 1);
        assert_eq!(effects.statements_removed, 1);
        let names = fx
            .dm
            .connection()
            .statements(&StatementPattern::any().with_predicate(Iri::new("urn:ex:name")), None)
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].object, Term::literal("two"));
    }

    #[test]
    fn delete_removes_object_statements() {
        let mut fx = fixture();
        let processor = RequestProcessor::new(&fx.factory, &fx.registry, &NoResolver);
        processor.apply(&mut fx.dm, &upsert("one")).unwrap();

        let request = UpdateRequest::delete_object(
            Iri::new("urn:group:g"),
            Iri::new("urn:ontology"),
            Iri::new("urn:item:1"),
            "Item",
        );
        let effects = processor.apply(&mut fx.dm, &request).unwrap();
        assert_eq!(effects.statements_removed, 2);
        assert!(effects.deleted.contains(&Iri::new("urn:item:1")));
        assert!(
            fx.dm
                .connection()
                .query(&StatementPattern::any().with_subject(Iri::new("urn:item:1")), None)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn unknown_class_fails_without_writing() {
        let mut fx = fixture();
        let processor = RequestProcessor::new(&fx.factory, &fx.registry, &NoResolver);
        let request = UpdateRequest::delete_object(
            Iri::new("urn:group:g"),
            Iri::new("urn:ontology"),
            Iri::new("urn:x"),
            "Ghost",
        );
        assert!(matches!(
            processor.apply(&mut fx.dm, &request),
            Err(EngineError::UnknownClass(_))
        ));
    }

    #[test]
    fn ontology_import_replaces_previous_import() {
        let mut fx = fixture();
        let processor = RequestProcessor::new(&fx.factory, &fx.registry, &NoResolver);
        let request = UpdateRequest::ontology_import(Iri::new("urn:group:g"), Iri::new("urn:ontology"));
        processor.apply(&mut fx.dm, &request).unwrap();
        let size = fx.dm.connection().size(None).unwrap();
        processor.apply(&mut fx.dm, &request).unwrap();
        assert_eq!(fx.dm.connection().size(None).unwrap(), size);
    }
}
