use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::ServerMessage;

/// Sender half of a connection's outbound queue. The writer task drains it
/// into the WebSocket; a closed receiver means the connection is gone and the
/// message is dropped, never an error.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Default)]
struct Subscriptions {
    /// Every attached connection, joined to a room or not. Execution results
    /// are unicast through this map so they outlive a room switch.
    connections: HashMap<String, ConnectionSender>,
    /// Room id to the set of connections subscribed to its broadcasts.
    rooms: HashMap<String, HashSet<String>>,
}

/// Fans state-changing events out to every connection subscribed to a room.
/// `publish` calls made under a room's lock reach each member's queue in that
/// order; there is no cross-room ordering guarantee.
#[derive(Default)]
pub struct BroadcastHub {
    inner: Mutex<Subscriptions>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound queue. Called once per WebSocket.
    pub fn attach(&self, connection_id: &str, sender: ConnectionSender) {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.insert(connection_id.to_string(), sender);
    }

    /// Detach a connection entirely (transport closed).
    pub fn detach(&self, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.connections.remove(connection_id);
        inner.rooms.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Subscribe an attached connection to a room's broadcasts.
    pub fn subscribe(&self, room_id: &str, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Cancel a room subscription; future broadcasts no longer reach the
    /// connection. Its outbound queue stays attached for unicast delivery.
    pub fn unsubscribe(&self, room_id: &str, connection_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(members) = inner.rooms.get_mut(room_id) {
            members.remove(connection_id);
            if members.is_empty() {
                inner.rooms.remove(room_id);
            }
        }
    }

    /// Deliver `message` to every subscriber of `room_id`, except `exclude`
    /// (used so an edit's originator is not told about its own edit).
    pub fn publish(&self, room_id: &str, message: ServerMessage, exclude: Option<&str>) {
        let inner = self.inner.lock().unwrap();
        let Some(members) = inner.rooms.get(room_id) else {
            return;
        };
        for connection_id in members {
            if exclude == Some(connection_id.as_str()) {
                continue;
            }
            if let Some(sender) = inner.connections.get(connection_id) {
                if sender.send(message.clone()).is_err() {
                    debug!(connection_id, room_id, "Dropping broadcast to closed connection");
                }
            }
        }
    }

    /// Unicast to one connection. Returns false when the connection is gone;
    /// callers treat that as a silent drop.
    pub fn send_to(&self, connection_id: &str, message: ServerMessage) -> bool {
        let inner = self.inner.lock().unwrap();
        match inner.connections.get(connection_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Number of attached connections (diagnostics).
    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileAddMessage, PasteNotificationMessage};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn attach(hub: &BroadcastHub, id: &str) -> UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.attach(id, tx);
        rx
    }

    fn file_add(path: &str) -> ServerMessage {
        ServerMessage::FileAdd(FileAddMessage { path: path.to_string() })
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers_in_order() {
        let hub = BroadcastHub::new();
        let mut rx_a = attach(&hub, "a");
        let mut rx_b = attach(&hub, "b");
        hub.subscribe("r1", "a");
        hub.subscribe("r1", "b");

        hub.publish("r1", file_add("one.py"), None);
        hub.publish("r1", file_add("two.py"), None);

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                ServerMessage::FileAdd(m) => assert_eq!(m.path, "one.py"),
                other => panic!("unexpected message: {other:?}"),
            }
            match rx.recv().await.unwrap() {
                ServerMessage::FileAdd(m) => assert_eq!(m.path, "two.py"),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn excluded_originator_is_skipped() {
        let hub = BroadcastHub::new();
        let mut rx_a = attach(&hub, "a");
        let mut rx_b = attach(&hub, "b");
        hub.subscribe("r1", "a");
        hub.subscribe("r1", "b");

        hub.publish("r1", file_add("x.py"), Some("a"));
        assert!(rx_b.recv().await.is_some());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_broadcasts_but_keeps_unicast() {
        let hub = BroadcastHub::new();
        let mut rx = attach(&hub, "a");
        hub.subscribe("r1", "a");
        hub.unsubscribe("r1", "a");

        hub.publish("r1", file_add("x.py"), None);
        assert!(rx.try_recv().is_err());

        let delivered = hub.send_to(
            "a",
            ServerMessage::PasteNotification(PasteNotificationMessage {
                username: "ada".to_string(),
            }),
        );
        assert!(delivered);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_to_unknown_connection_reports_drop() {
        let hub = BroadcastHub::new();
        assert!(!hub.send_to("ghost", file_add("x.py")));
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = BroadcastHub::new();
        let mut rx_a = attach(&hub, "a");
        let mut rx_b = attach(&hub, "b");
        hub.subscribe("r1", "a");
        hub.subscribe("r2", "b");

        hub.publish("r1", file_add("x.py"), None);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }
}
