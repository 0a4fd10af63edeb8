pub mod broadcast;
pub mod presence;
pub mod registry;
pub mod signaling;

use std::sync::Arc;

use crate::exec::dispatcher::ExecutionDispatcher;
use crate::exec::judge::Judge;
use broadcast::BroadcastHub;
use presence::PresenceTracker;
use registry::RoomRegistry;
use signaling::SignalingRelay;

/// Shared state behind every connection handler.
pub struct AppState {
    pub presence: Arc<PresenceTracker>,
    pub broadcast: Arc<BroadcastHub>,
    pub registry: RoomRegistry,
    pub relay: SignalingRelay,
    pub dispatcher: Arc<ExecutionDispatcher>,
}

impl AppState {
    pub fn new(judge: Arc<dyn Judge>) -> Arc<Self> {
        let presence = Arc::new(PresenceTracker::new());
        let broadcast = Arc::new(BroadcastHub::new());
        Arc::new(Self {
            registry: RoomRegistry::new(presence.clone(), broadcast.clone()),
            relay: SignalingRelay::new(presence.clone(), broadcast.clone()),
            dispatcher: Arc::new(ExecutionDispatcher::new(judge)),
            presence,
            broadcast,
        })
    }
}
