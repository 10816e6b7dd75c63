use std::sync::Arc;

use graphprov_storage::GraphStore;

/// The three stores the provenance layer coordinates.
#[derive(Clone)]
pub struct WorkflowStores {
    /// Statements as currently visible.
    pub live: Arc<dyn GraphStore>,
    /// Added statements, per context that added them.
    pub positive: Arc<dyn GraphStore>,
    /// Removed statements, per context that removed them.
    pub negative: Arc<dyn GraphStore>,
}

impl WorkflowStores {
    pub fn new(
        live: Arc<dyn GraphStore>,
        positive: Arc<dyn GraphStore>,
        negative: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            live,
            positive,
            negative,
        }
    }
}

impl std::fmt::Debug for WorkflowStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStores")
            .field("live", &self.live.name())
            .field("positive", &self.positive.name())
            .field("negative", &self.negative.name())
            .finish()
    }
}
