//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! wires the hub's components together: one `Registry` shared by the `Hub`
//! and the `Bridge`, the presence and typing sets, and the two external
//! collaborators (document store, token verifier).

use std::sync::Arc;

use crate::config::DEFAULT_CLIENT_CHANNEL_CAPACITY;
use crate::services::auth::TokenVerifier;
use crate::services::bridge::Bridge;
use crate::services::hub::Hub;
use crate::services::presence::PresenceTracker;
use crate::services::registry::Registry;
use crate::services::store::DocumentStore;
use crate::services::typing::TypingCoordinator;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub hub: Hub,
    pub presence: PresenceTracker,
    pub typing: TypingCoordinator,
    pub bridge: Bridge,
    pub store: Arc<dyn DocumentStore>,
    /// `None` if no verifier is configured; authenticated endpoints answer 503.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    /// Capacity of each connection's outbound queue.
    pub channel_capacity: usize,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        let registry = Registry::new();
        let hub = Hub::new(registry.clone());
        Self {
            bridge: Bridge::new(hub.clone()),
            hub,
            registry,
            presence: PresenceTracker::new(),
            typing: TypingCoordinator::new(),
            store,
            verifier,
            channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
