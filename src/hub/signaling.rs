use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::hub::broadcast::BroadcastHub;
use crate::hub::presence::PresenceTracker;
use crate::models::{ServerMessage, SignalRelayMessage};

/// The three peer-negotiation event kinds the hub forwards. Payloads are
/// opaque; only the recipient is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Forwards peer-connection negotiation messages between two connections in
/// the same room. A target outside the sender's room is silently dropped:
/// the remote peer may simply have left already.
pub struct SignalingRelay {
    presence: Arc<PresenceTracker>,
    broadcast: Arc<BroadcastHub>,
}

impl SignalingRelay {
    pub fn new(presence: Arc<PresenceTracker>, broadcast: Arc<BroadcastHub>) -> Self {
        Self { presence, broadcast }
    }

    pub fn relay(&self, kind: SignalKind, from: &str, to: &str, payload: Value) {
        let (Some(sender_room), Some(target_room)) =
            (self.presence.lookup(from), self.presence.lookup(to))
        else {
            debug!(from, to, "Signal dropped, endpoint not present");
            return;
        };
        if sender_room != target_room {
            debug!(from, to, "Signal dropped, endpoints in different rooms");
            return;
        }

        let relayed = SignalRelayMessage {
            from: from.to_string(),
            payload,
        };
        let message = match kind {
            SignalKind::Offer => ServerMessage::WebrtcOffer(relayed),
            SignalKind::Answer => ServerMessage::WebrtcAnswer(relayed),
            SignalKind::IceCandidate => ServerMessage::WebrtcIceCandidate(relayed),
        };
        if !self.broadcast.send_to(to, message) {
            debug!(to, "Signal dropped, target connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use serde_json::json;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn setup() -> (Arc<PresenceTracker>, Arc<BroadcastHub>, SignalingRelay) {
        let presence = Arc::new(PresenceTracker::new());
        let broadcast = Arc::new(BroadcastHub::new());
        let relay = SignalingRelay::new(presence.clone(), broadcast.clone());
        (presence, broadcast, relay)
    }

    fn attach(broadcast: &BroadcastHub, id: &str) -> UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        broadcast.attach(id, tx);
        rx
    }

    fn join(presence: &PresenceTracker, id: &str, room: &str) {
        presence.register(id, Participant::new(id, id, None), room);
    }

    #[tokio::test]
    async fn relays_within_the_same_room_annotated_with_from() {
        let (presence, broadcast, relay) = setup();
        join(&presence, "a", "r1");
        join(&presence, "b", "r1");
        let mut rx_b = attach(&broadcast, "b");

        relay.relay(SignalKind::Offer, "a", "b", json!({"sdp": "v=0"}));

        match rx_b.recv().await.unwrap() {
            ServerMessage::WebrtcOffer(m) => {
                assert_eq!(m.from, "a");
                assert_eq!(m.payload["sdp"], "v=0");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn drops_when_target_is_in_another_room() {
        let (presence, broadcast, relay) = setup();
        join(&presence, "a", "r1");
        join(&presence, "b", "r2");
        let mut rx_b = attach(&broadcast, "b");

        relay.relay(SignalKind::Answer, "a", "b", json!({}));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn drops_when_target_already_left() {
        let (presence, broadcast, relay) = setup();
        join(&presence, "a", "r1");
        let mut rx_a = attach(&broadcast, "a");

        relay.relay(SignalKind::IceCandidate, "a", "gone", json!({"candidate": "c"}));
        assert!(rx_a.try_recv().is_err());
    }
}
