//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use titan_blob::BlobStore;
use titan_cache::TitanCache;
use titan_core::Settings;
use titan_events::EventBus;
use titan_queue::JobQueue;
use titan_repo::{
    ConceptDescriptionRepository, DescriptorRepository, DiscoveryService, DocumentStore,
    InvocationService, ShellRepository, SubmodelRepository,
};

use crate::auth::TokenVerifier;
use crate::ws::WsHub;

/// Everything a handler needs, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn DocumentStore>,
    pub shells: ShellRepository,
    pub submodels: SubmodelRepository,
    pub concept_descriptions: ConceptDescriptionRepository,
    pub descriptors: DescriptorRepository,
    pub discovery: DiscoveryService,
    pub invocations: InvocationService,
    pub cache: Arc<dyn TitanCache>,
    pub bus: Arc<dyn EventBus>,
    pub blob_store: Arc<dyn BlobStore>,
    pub queue: Arc<JobQueue>,
    pub ws_hub: Arc<WsHub>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the full component graph from its backends.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn TitanCache>,
        bus: Arc<dyn EventBus>,
        blob_store: Arc<dyn BlobStore>,
        queue: Arc<JobQueue>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            shells: ShellRepository::new(store.clone(), bus.clone()),
            submodels: SubmodelRepository::new(store.clone(), bus.clone(), blob_store.clone()),
            concept_descriptions: ConceptDescriptionRepository::new(store.clone(), bus.clone()),
            descriptors: DescriptorRepository::new(store.clone(), bus.clone()),
            discovery: DiscoveryService::new(store.clone()),
            invocations: InvocationService::new(store.clone(), bus.clone()),
            ws_hub: Arc::new(WsHub::new()),
            settings: Arc::new(settings),
            store,
            cache,
            bus,
            blob_store,
            queue,
            verifier,
            started_at: Utc::now(),
        }
    }
}
