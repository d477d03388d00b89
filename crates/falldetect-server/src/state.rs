//! Shared application state.

use std::sync::Arc;

use falldetect_core::ServiceConfig;
use falldetect_infer::{EnsembleClassifier, ResourceGate};
use falldetect_runtime::Orchestrator;
use falldetect_store::FingerprintCache;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ServiceConfig,
    pub cache: Arc<dyn FingerprintCache>,
    pub gate: Arc<ResourceGate>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        cache: Arc<dyn FingerprintCache>,
        gate: Arc<ResourceGate>,
    ) -> Self {
        let classifier = EnsembleClassifier::from_settings(&config.vision);
        let orchestrator = Orchestrator::new(cache.clone(), gate.clone(), classifier)
            .with_max_batch(config.max_batch_size);

        Self {
            config,
            cache,
            gate,
            orchestrator,
        }
    }
}
