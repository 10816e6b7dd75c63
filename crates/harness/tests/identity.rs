use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use graphprov_core::{
    Context, ContextFactory, ContextLabel, ContextState, ContextType, FreshContext, Iri,
    ProvenanceConfig, Statement, Term, TimestampAllocator,
};
use graphprov_harness::{TestStores, editorial_config, ex};

// ============================================================================
// Timestamp allocation
// ============================================================================

#[test]
fn concurrent_allocation_is_strictly_increasing() -> Result<(), Box<dyn std::error::Error>> {
    let factory = Arc::new(ContextFactory::new(&ProvenanceConfig::default()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || {
                (0..2_000)
                    .map(|_| factory.allocate_timestamp())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let issued = handle.join().map_err(|_| "allocator thread panicked")?;
        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        for ts in issued {
            assert!(all.insert(ts), "timestamp {ts} issued twice");
        }
    }
    assert_eq!(all.len(), 16_000);
    Ok(())
}

#[test]
fn allocation_continues_after_a_future_timestamp() {
    let far_future = u64::MAX / 2;
    let clock = TimestampAllocator::starting_after(far_future);
    let factory = ContextFactory::with_clock(&ProvenanceConfig::default(), clock);
    assert_eq!(factory.allocate_timestamp(), far_future + 1);
    assert_eq!(factory.allocate_timestamp(), far_future + 2);
}

#[test]
fn concurrent_fresh_contexts_never_share_an_id() -> Result<(), Box<dyn std::error::Error>> {
    let factory = Arc::new(ContextFactory::new(&ProvenanceConfig::default()));
    let source = ex("feed");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let source = source.clone();
            thread::spawn(move || {
                (0..500)
                    .map(|_| {
                        factory
                            .fresh_context(FreshContext::new(ContextType::Provider).source(source.clone()))
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().map_err(|_| "factory thread panicked")? {
            assert!(ids.insert(id));
        }
    }
    Ok(())
}

// ============================================================================
// Persist and load
// ============================================================================

#[test]
fn fresh_context_roundtrips_through_the_store() -> Result<(), Box<dyn std::error::Error>> {
    let stores = TestStores::new()?;
    let provenance = stores.provenance(ProvenanceConfig::default());
    let context = provenance.fresh_context(
        FreshContext::new(ContextType::Provider)
            .source(ex("crm"))
            .group(ex("group/customers"))
            .input_parameter(ex("param/eu"))
            .editable(false)
            .label(ContextLabel::ProviderRun),
    );

    let mut dm = provenance.data_manager()?;
    dm.add_to_context(
        &[Statement::new(ex("acme"), ex("name"), Term::literal("Acme"))],
        &context,
    )?;

    let loaded = provenance.load_context(&context.id)?;
    assert_eq!(loaded.id, context.id);
    assert_eq!(loaded.context_type, ContextType::Provider);
    assert_eq!(loaded.state, ContextState::Published);
    assert_eq!(loaded.timestamp, context.timestamp);
    assert_eq!(loaded.source, Some(ex("crm")));
    assert_eq!(loaded.group, Some(ex("group/customers")));
    assert_eq!(loaded.input_parameter, Some(ex("param/eu")));
    assert_eq!(loaded.editable, Some(false));
    assert_eq!(loaded.label, Some(ContextLabel::ProviderRun));
    assert!(loaded.id.as_str().starts_with("http://example.org/crm/"));
    assert!(loaded.id.as_str().ends_with("/Provider"));
    Ok(())
}

#[test]
fn user_contexts_start_as_drafts_under_editorial_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let stores = TestStores::new()?;
    let provenance = stores.provenance(editorial_config());
    let user = provenance
        .factory()
        .fresh_user_context(ex("users/kim"), Some(ContextLabel::DataInputForm));
    let provider =
        provenance
            .factory()
            .fresh_published_context(ContextType::Provider, Some(ex("crm")), None);
    assert_eq!(user.state, ContextState::Draft);
    assert_eq!(provider.state, ContextState::Published);
    assert!(user.describe().contains("'kim'"));
    Ok(())
}

#[test]
fn singletons_load_without_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let stores = TestStores::new()?;
    let provenance = stores.provenance(ProvenanceConfig::default());
    for singleton in [Context::empty(), Context::meta(), Context::void()] {
        let loaded = provenance.load_context(&singleton.id)?;
        assert_eq!(loaded.context_type, singleton.context_type);
        assert_eq!(loaded.timestamp, None);
        assert_eq!(loaded.editable, Some(false));
    }
    assert_eq!(
        provenance.fresh_context(FreshContext::new(ContextType::MetaContext)),
        Context::meta()
    );
    Ok(())
}

#[test]
fn unknown_context_loads_with_fallbacks() -> Result<(), Box<dyn std::error::Error>> {
    let stores = TestStores::new()?;
    let provenance = stores.provenance(ProvenanceConfig::default());
    let loaded = provenance.load_context(&Iri::new("urn:ctx:never-written"))?;
    assert_eq!(loaded.context_type, ContextType::Unknown);
    assert_eq!(loaded.state, ContextState::Published);
    Ok(())
}

#[test]
fn config_file_controls_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let stores = TestStores::new()?;
    let path = stores.path().join("graphprov.toml");
    std::fs::write(
        &path,
        "editorial_workflow = true\ndefault_namespace = \"http://example.org/ns/\"\n\n[queue]\ncapacity = 5\n",
    )?;
    let config = ProvenanceConfig::load(&path)?;
    let provenance = stores.provenance(config);

    assert_eq!(provenance.queue_capacity(), 5);
    let anonymous = provenance.fresh_context(FreshContext::new(ContextType::Cli));
    assert!(anonymous.id.as_str().starts_with("http://example.org/ns/"));
    let user = provenance.factory().fresh_user_context(ex("users/kim"), None);
    assert_eq!(user.state, ContextState::Draft);
    Ok(())
}
