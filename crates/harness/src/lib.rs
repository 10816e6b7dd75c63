pub mod faulty;
pub mod fixtures;
pub mod stores;

pub use faulty::FaultyStore;
pub use fixtures::{
    MapResolver, Person, RecordingListener, Team, ex, person_mapping, team_mapping,
};
pub use stores::{TestStores, editorial_config};

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
