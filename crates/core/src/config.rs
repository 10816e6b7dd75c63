use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::ids::Iri;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_WARN_THRESHOLD: usize = 1_000;
pub const DEFAULT_WARN_STEP: usize = 1_000;
pub const DEFAULT_CRITICAL_THRESHOLD: usize = 90_000;
pub const DEFAULT_TOUCHED_CONTEXT_LIMIT: usize = 10_000;
pub const DEFAULT_NAMESPACE: &str = "http://graphprov.local/";

/// Settings shared by every component. Every key is optional in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// User contexts start in draft and live writes are recorded in the
    /// change stores.
    pub editorial_workflow: bool,
    /// Value an unset `editable` flag resolves to.
    pub contexts_editable_default: bool,
    /// Base for generated context ids and for bare source names.
    pub default_namespace: String,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub drain_interval_ms: u64,
    pub warn_threshold: usize,
    pub warn_step: usize,
    pub critical_threshold: usize,
    pub touched_context_limit: usize,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            editorial_workflow: false,
            contexts_editable_default: true,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            queue: QueueConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            warn_step: DEFAULT_WARN_STEP,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            touched_context_limit: DEFAULT_TOUCHED_CONTEXT_LIMIT,
        }
    }
}

impl ProvenanceConfig {
    pub fn from_toml(input: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(input).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn with_editorial_workflow(mut self, enabled: bool) -> Self {
        self.editorial_workflow = enabled;
        self
    }

    pub fn namespace(&self) -> Iri {
        Iri::new(self.default_namespace.clone())
    }

    fn validate(mut self) -> Result<Self, CoreError> {
        Iri::parse(&self.default_namespace)?;
        if self.queue.capacity == 0 {
            self.queue.capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.queue.warn_step == 0 {
            return Err(CoreError::Config("queue.warn_step must be positive".into()));
        }
        if self.queue.drain_interval_ms == 0 {
            return Err(CoreError::Config(
                "queue.drain_interval_ms must be positive".into(),
            ));
        }
        Ok(self)
    }
}
