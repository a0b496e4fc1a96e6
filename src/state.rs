use std::sync::Arc;

use crate::config::Config;
use crate::engine::assignment::AssignmentEngine;
use crate::engine::lifecycle::Lifecycle;
use crate::events::router::EventRouter;
use crate::events::transport::BroadcastTransport;
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

/// Wiring for one engine instance. The router receives its transport at
/// construction; nothing in the engine reaches for a global handle.
pub struct AppState {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<BroadcastTransport>,
    pub router: Arc<EventRouter>,
    pub lifecycle: Arc<Lifecycle>,
    pub assignment: AssignmentEngine,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let metrics = Metrics::new();
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(BroadcastTransport::new(config.event_buffer_size));
        let router = Arc::new(EventRouter::new(
            store.clone(),
            transport.clone(),
            metrics.clone(),
            config.recent_updates_cache,
        ));
        let lifecycle = Arc::new(Lifecycle::new(
            store.clone(),
            router.clone(),
            metrics.clone(),
            config.recent_updates_cache,
        ));
        let assignment = AssignmentEngine::new(store.clone(), lifecycle.clone(), metrics.clone());

        Self {
            config,
            store,
            transport,
            router,
            lifecycle,
            assignment,
            metrics,
        }
    }
}
