use mate_agent::TurnDriver;
use mate_store::TaskStore;
use std::sync::Arc;

/// Shared application state handed to every route. The store is consulted
/// directly only for read-side endpoints; all mutations flow through the
/// driver so the conversation history stays the source of record.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    pub driver: Arc<dyn TurnDriver>,
}

impl AppState {
    pub fn new(store: TaskStore, driver: Arc<dyn TurnDriver>) -> Self {
        Self { store, driver }
    }
}
