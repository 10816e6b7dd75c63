//! Context metadata as statements in the reserved metadata context.

use tracing::warn;

use graphprov_core::vocabulary::{self, ctx, dc, rdf, rdfs, xsd};
use graphprov_core::{
    Context, ContextLabel, ContextState, ContextType, Iri, Statement, StatementPattern, Term,
};

use crate::error::StorageError;
use crate::traits::GraphConnection;

/// Statements describing `context`. Unset optional fields produce none.
pub fn context_statements(context: &Context) -> Vec<Statement> {
    let id = &context.id;
    let pred = vocabulary::iri;
    let mut out = vec![
        Statement::new(id, pred(rdf::TYPE), Term::iri(ctx::CONTEXT_CLASS)),
        Statement::new(id, pred(ctx::CONTEXT_TYPE), Term::literal(context.context_type.as_str())),
        Statement::new(id, pred(ctx::CONTEXT_STATE), Term::literal(context.state.as_str())),
    ];
    if let Some(source) = &context.source {
        out.push(Statement::new(id, pred(ctx::CONTEXT_SRC), source));
    }
    if let Some(timestamp) = context.timestamp {
        out.push(Statement::new(
            id,
            pred(dc::DATE),
            Term::typed_literal(timestamp.to_string(), vocabulary::iri(xsd::LONG)),
        ));
    }
    if let Some(editable) = context.editable {
        out.push(Statement::new(
            id,
            pred(ctx::IS_EDITABLE),
            Term::typed_literal(editable.to_string(), vocabulary::iri(xsd::BOOLEAN)),
        ));
    }
    if let Some(group) = &context.group {
        out.push(Statement::new(id, pred(ctx::CONTEXT_GROUP), group));
    }
    if let Some(input) = &context.input_parameter {
        out.push(Statement::new(
            id,
            pred(ctx::INPUT_PARAMETER),
            Term::literal(input.as_str()),
        ));
    }
    if let Some(label) = context.label {
        out.push(Statement::new(id, pred(rdfs::LABEL), Term::literal(label.as_str())));
    }
    out
}

/// Replaces the stored metadata of `context`. Singletons are never stored.
pub fn persist_context(
    conn: &mut dyn GraphConnection,
    context: &Context,
) -> Result<(), StorageError> {
    if context.is_singleton() {
        return Ok(());
    }
    delete_context_metadata(conn, &context.id)?;
    conn.add(&context_statements(context), &vocabulary::meta_context())?;
    Ok(())
}

pub fn delete_context_metadata(
    conn: &mut dyn GraphConnection,
    id: &Iri,
) -> Result<usize, StorageError> {
    conn.remove(
        &StatementPattern::any().with_subject(id),
        Some(&vocabulary::meta_context()),
    )
}

pub fn has_metadata(conn: &dyn GraphConnection, id: &Iri) -> Result<bool, StorageError> {
    let pattern = StatementPattern::any()
        .with_subject(id)
        .with_predicate(vocabulary::iri(rdf::TYPE));
    Ok(!conn.query(&pattern, Some(&vocabulary::meta_context()))?.is_empty())
}

/// Rebuilds a context from stored metadata.
///
/// Never fails on bad metadata: an unknown type becomes `Unknown`, an
/// unknown state `Published`, an unknown label `Unknown`. Each fallback is
/// logged.
pub fn load_context(conn: &dyn GraphConnection, id: &Iri) -> Result<Context, StorageError> {
    if let Some(singleton) = Context::singleton_for_id(id) {
        return Ok(singleton);
    }

    let statements = conn.statements(
        &StatementPattern::any().with_subject(id),
        Some(&vocabulary::meta_context()),
    )?;
    if statements.is_empty() {
        warn!(context = %id, "no metadata stored for context");
    }

    let mut context = Context {
        id: id.clone(),
        context_type: ContextType::Unknown,
        state: ContextState::Published,
        timestamp: None,
        source: None,
        group: None,
        input_parameter: None,
        label: None,
        editable: None,
    };
    let mut saw_type = false;

    for statement in statements {
        let value = statement.object.lexical();
        match statement.predicate.as_str() {
            ctx::CONTEXT_TYPE => {
                saw_type = true;
                context.context_type = ContextType::parse(value).unwrap_or_else(|| {
                    warn!(context = %id, value, "unknown context type");
                    ContextType::Unknown
                });
            }
            ctx::CONTEXT_STATE => {
                context.state = ContextState::parse(value).unwrap_or_else(|| {
                    warn!(context = %id, value, "unknown context state, assuming published");
                    ContextState::Published
                });
            }
            rdfs::LABEL => {
                context.label = Some(ContextLabel::parse(value).unwrap_or_else(|| {
                    warn!(context = %id, value, "unknown context label");
                    ContextLabel::Unknown
                }));
            }
            ctx::CONTEXT_SRC => match statement.object.as_iri() {
                Some(source) => context.source = Some(source.clone()),
                None => warn!(context = %id, value, "context source is not an IRI"),
            },
            ctx::CONTEXT_GROUP => match statement.object.as_iri() {
                Some(group) => context.group = Some(group.clone()),
                None => warn!(context = %id, value, "context group is not an IRI"),
            },
            dc::DATE => match value.parse() {
                Ok(ts) => context.timestamp = Some(ts),
                Err(_) => warn!(context = %id, value, "unparseable context timestamp"),
            },
            ctx::IS_EDITABLE => context.editable = Some(value == "true"),
            ctx::INPUT_PARAMETER => context.input_parameter = Some(Iri::new(value)),
            _ => {}
        }
    }

    if !saw_type {
        warn!(context = %id, "context metadata lacks a type");
    }
    Ok(context)
}

/// Contexts whose metadata matches `(?, predicate, value)`.
pub fn context_ids_with(
    conn: &dyn GraphConnection,
    predicate: &'static str,
    value: Term,
) -> Result<Vec<Iri>, StorageError> {
    let pattern = StatementPattern::any()
        .with_predicate(vocabulary::iri(predicate))
        .with_object(value);
    let mut ids: Vec<Iri> = conn
        .statements(&pattern, Some(&vocabulary::meta_context()))?
        .into_iter()
        .filter_map(|s| s.subject.as_iri().cloned())
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Contexts in `state`, oldest first.
pub fn contexts_in_state(
    conn: &dyn GraphConnection,
    state: ContextState,
) -> Result<Vec<Context>, StorageError> {
    let ids = context_ids_with(conn, ctx::CONTEXT_STATE, Term::literal(state.as_str()))?;
    let mut contexts = ids
        .iter()
        .map(|id| load_context(conn, id))
        .collect::<Result<Vec<_>, _>>()?;
    contexts.sort_by(|a, b| a.cmp_by_timestamp(b));
    Ok(contexts)
}

pub fn contexts_for_source(
    conn: &dyn GraphConnection,
    source: &Iri,
) -> Result<Vec<Context>, StorageError> {
    context_ids_with(conn, ctx::CONTEXT_SRC, Term::from(source))?
        .iter()
        .map(|id| load_context(conn, id))
        .collect()
}

pub fn contexts_for_group(
    conn: &dyn GraphConnection,
    group: &Iri,
) -> Result<Vec<Context>, StorageError> {
    context_ids_with(conn, ctx::CONTEXT_GROUP, Term::from(group))?
        .iter()
        .map(|id| load_context(conn, id))
        .collect()
}

/// Ids of every context with stored metadata.
pub fn known_contexts(conn: &dyn GraphConnection) -> Result<Vec<Iri>, StorageError> {
    context_ids_with(conn, rdf::TYPE, Term::iri(ctx::CONTEXT_CLASS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteGraphStore;
    use crate::traits::GraphStore;
    use graphprov_core::{ContextFactory, FreshContext, ProvenanceConfig};

    #[test]
    fn persist_then_load_roundtrips_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open("live", dir.path().join("live.db")).unwrap();
        let mut conn = store.connect().unwrap();
        let factory = ContextFactory::new(&ProvenanceConfig::default());

        let ctx = factory.fresh_context(
            FreshContext::new(ContextType::Provider)
                .source(Iri::new("http://example.org/provider"))
                .group(Iri::new("http://example.org/group"))
                .input_parameter(Iri::new("http://example.org/param"))
                .editable(false)
                .label(ContextLabel::ProviderRun),
        );
        persist_context(conn.as_mut(), &ctx).unwrap();
        let loaded = load_context(conn.as_ref(), &ctx.id).unwrap();

        assert_eq!(loaded.id, ctx.id);
        assert_eq!(loaded.context_type, ctx.context_type);
        assert_eq!(loaded.state, ctx.state);
        assert_eq!(loaded.timestamp, ctx.timestamp);
        assert_eq!(loaded.source, ctx.source);
        assert_eq!(loaded.group, ctx.group);
        assert_eq!(loaded.input_parameter, ctx.input_parameter);
        assert_eq!(loaded.label, ctx.label);
        assert_eq!(loaded.editable, ctx.editable);
    }

    #[test]
    fn persist_replaces_previous_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open("live", dir.path().join("live.db")).unwrap();
        let mut conn = store.connect().unwrap();
        let factory = ContextFactory::new(&ProvenanceConfig::default().with_editorial_workflow(true));

        let mut ctx = factory.fresh_user_context(Iri::new("urn:user:bob"), None);
        persist_context(conn.as_mut(), &ctx).unwrap();
        ctx.state = ContextState::Approved;
        persist_context(conn.as_mut(), &ctx).unwrap();

        assert!(contexts_in_state(conn.as_ref(), ContextState::Draft).unwrap().is_empty());
        let approved = contexts_in_state(conn.as_ref(), ContextState::Approved).unwrap();
        assert_eq!(approved, vec![ctx]);
    }

    #[test]
    fn malformed_metadata_uses_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open("live", dir.path().join("live.db")).unwrap();
        let mut conn = store.connect().unwrap();
        let id = Iri::new("urn:ctx:legacy");
        conn.add(
            &[
                Statement::new(&id, vocabulary::iri(ctx::CONTEXT_TYPE), Term::literal("Robot")),
                Statement::new(&id, vocabulary::iri(ctx::CONTEXT_STATE), Term::literal("Limbo")),
                Statement::new(&id, vocabulary::iri(rdfs::LABEL), Term::literal("Mystery")),
                Statement::new(&id, vocabulary::iri(dc::DATE), Term::literal("yesterday")),
            ],
            &vocabulary::meta_context(),
        )
        .unwrap();

        let loaded = load_context(conn.as_ref(), &id).unwrap();
        assert_eq!(loaded.context_type, ContextType::Unknown);
        assert_eq!(loaded.state, ContextState::Published);
        assert_eq!(loaded.label, Some(ContextLabel::Unknown));
        assert_eq!(loaded.timestamp, None);

        let missing = load_context(conn.as_ref(), &Iri::new("urn:ctx:none")).unwrap();
        assert_eq!(missing.context_type, ContextType::Unknown);
    }

    #[test]
    fn singletons_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open("live", dir.path().join("live.db")).unwrap();
        let mut conn = store.connect().unwrap();
        persist_context(conn.as_mut(), &Context::meta()).unwrap();
        assert_eq!(conn.size(None).unwrap(), 0);
        assert_eq!(
            load_context(conn.as_ref(), &Context::void().id).unwrap(),
            Context::void()
        );
    }
}
