use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::db::store;
use crate::hub::broadcast::BroadcastHub;
use crate::hub::presence::PresenceTracker;
use crate::models::{
    ChatMessage, CodeChangeMessage, FileAddMessage, FileDeleteMessage, FileRenameMessage,
    Participant, Room, RoomSnapshot, ServerMessage, UserJoinedMessage, UserLeftMessage,
};

/// Owns the set of live rooms. Every mutation of a room's state runs under
/// that room's own lock, so rooms serialize their events independently and
/// cross-room traffic never contends. The outer map lock is only held to
/// resolve or insert handles, never across a load or a broadcast.
///
/// Lock order is always map, then room. A connection switching rooms leaves
/// the old room before the new room's lock is taken, so no two room locks are
/// ever held at once.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    presence: Arc<PresenceTracker>,
    broadcast: Arc<BroadcastHub>,
}

impl RoomRegistry {
    pub fn new(presence: Arc<PresenceTracker>, broadcast: Arc<BroadcastHub>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            presence,
            broadcast,
        }
    }

    /// Join a room, creating or loading it on first use. Rejoining from
    /// another room performs the implicit leave there first. Returns the
    /// initial-state snapshot for the new participant; existing members are
    /// notified separately (the joiner is excluded from that broadcast).
    pub async fn join(
        &self,
        room_id: &str,
        connection_id: &str,
        display_name: &str,
        user_id: Option<String>,
    ) -> RoomSnapshot {
        // Implicit leave from any prior room, with its user-left notification
        if let Some(prior) = self.presence.lookup(connection_id) {
            self.leave(&prior, connection_id).await;
        }

        // A cloned handle can lose a race with the last leaver's eviction:
        // by the time this lock is taken the entry may already be gone from
        // the map. Evicted rooms are flagged under their lock, so re-resolve
        // until the locked room is live.
        let mut room = loop {
            let handle = {
                let mut rooms = self.rooms.write().await;
                rooms
                    .entry(room_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(Room::default())))
                    .clone()
            };
            let guard = handle.lock_owned().await;
            if !guard.evicted {
                break guard;
            }
        };
        if !room.loaded {
            self.load_or_seed(room_id, &mut room).await;
        }

        let participant = Participant::new(connection_id, display_name, user_id);
        room.participants
            .insert(connection_id.to_string(), participant.clone());
        self.presence
            .register(connection_id, participant.clone(), room_id);
        self.broadcast.subscribe(room_id, connection_id);

        info!(room_id, connection_id, username = display_name, "Participant joined");
        self.broadcast.publish(
            room_id,
            ServerMessage::UserJoined(UserJoinedMessage {
                participant: participant.clone(),
            }),
            Some(connection_id),
        );

        RoomSnapshot {
            files: room.files.clone(),
            participants: room.participants.values().cloned().collect(),
            chat_history: room.chat_history(),
            current_user: participant,
        }
    }

    /// Remove a participant; the room's in-memory state is dropped the moment
    /// its participant map empties. Durable copies in the store are untouched.
    pub async fn leave(&self, room_id: &str, connection_id: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            // Room already evicted; make sure presence agrees.
            self.presence.unregister(connection_id);
            return;
        };

        let now_empty = {
            let mut room = handle.lock().await;
            if room.participants.remove(connection_id).is_none() {
                return;
            }
            self.presence.unregister(connection_id);
            self.broadcast.unsubscribe(room_id, connection_id);
            self.broadcast.publish(
                room_id,
                ServerMessage::UserLeft(UserLeftMessage {
                    connection_id: connection_id.to_string(),
                }),
                None,
            );
            room.participants.is_empty()
        };

        if now_empty {
            let mut rooms = self.rooms.write().await;
            if let Some(handle) = rooms.get(room_id).cloned() {
                let mut room = handle.lock().await;
                if room.participants.is_empty() {
                    // Flag the room before unmapping it so a join that
                    // already cloned this handle knows to re-resolve.
                    room.evicted = true;
                    info!(room_id, "Room is empty, dropping in-memory state");
                    rooms.remove(room_id);
                }
            }
        }
    }

    /// Create an empty file. A duplicate path is a silent no-op: first writer
    /// wins and the caller is not informed of the rejection.
    pub async fn add_file(&self, room_id: &str, path: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            debug!(room_id, "file-add for unknown room ignored");
            return;
        };
        let mut room = handle.lock().await;
        if room.files.contains_key(path) {
            debug!(room_id, path, "file-add for existing path ignored");
            return;
        }
        room.files.insert(path.to_string(), String::new());
        self.broadcast.publish(
            room_id,
            ServerMessage::FileAdd(FileAddMessage {
                path: path.to_string(),
            }),
            None,
        );
        persist_file(room_id, path, "");
    }

    /// Atomic rename: content moves and the old path is invalidated. No-op
    /// unless the old path exists and the new one does not.
    pub async fn rename_file(&self, room_id: &str, old_path: &str, new_path: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        if !room.files.contains_key(old_path) || room.files.contains_key(new_path) {
            debug!(room_id, old_path, new_path, "file-rename precondition failed, ignored");
            return;
        }
        let content = room.files.remove(old_path).unwrap_or_default();
        room.files.insert(new_path.to_string(), content);
        self.broadcast.publish(
            room_id,
            ServerMessage::FileRename(FileRenameMessage {
                old_path: old_path.to_string(),
                new_path: new_path.to_string(),
            }),
            None,
        );
        persist_rename(room_id, old_path, new_path);
    }

    /// Delete a file; no-op unless the path exists.
    pub async fn delete_file(&self, room_id: &str, path: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        if room.files.remove(path).is_none() {
            debug!(room_id, path, "file-delete for unknown path ignored");
            return;
        }
        self.broadcast.publish(
            room_id,
            ServerMessage::FileDelete(FileDeleteMessage {
                path: path.to_string(),
            }),
            None,
        );
        persist_delete(room_id, path);
    }

    /// Last-write-wins content replacement: the most recently serialized
    /// write determines the content, concurrent edits are never merged.
    /// No-op unless the path exists. The originator is excluded from the
    /// resulting broadcast.
    pub async fn set_file_content(&self, room_id: &str, path: &str, content: &str, origin: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        let Some(existing) = room.files.get_mut(path) else {
            debug!(room_id, path, "code-change for unknown path ignored");
            return;
        };
        *existing = content.to_string();
        self.broadcast.publish(
            room_id,
            ServerMessage::CodeChange(CodeChangeMessage {
                path: path.to_string(),
                content: content.to_string(),
            }),
            Some(origin),
        );
        persist_file(room_id, path, content);
    }

    /// Append a chat message from a member. The sender's username is
    /// snapshotted into the message; the whole room (sender included)
    /// receives the broadcast.
    pub async fn append_chat(&self, room_id: &str, connection_id: &str, text: &str) {
        let Some(handle) = self.room_handle(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        let Some(sender) = room.participants.get(connection_id) else {
            debug!(room_id, connection_id, "chat from non-member ignored");
            return;
        };
        let message = ChatMessage {
            sender: sender.username.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        room.push_chat(message.clone());
        self.broadcast
            .publish(room_id, ServerMessage::ReceiveChatMessage(message.clone()), None);
        persist_chat(room_id, message);
    }

    /// Rooms and participants currently held in memory (diagnostics).
    pub async fn stats(&self) -> (usize, usize) {
        let rooms = self.rooms.read().await;
        let mut participants = 0;
        for handle in rooms.values() {
            participants += handle.lock().await.participants.len();
        }
        (rooms.len(), participants)
    }

    async fn room_handle(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// Populate a freshly created room: prior state from the store when the
    /// room is known there, otherwise the seed file. Store failures degrade
    /// to an in-memory session, never to a join failure.
    async fn load_or_seed(&self, room_id: &str, room: &mut Room) {
        let Some(store) = store::get_db() else {
            room.seed();
            return;
        };
        match store.load_room(room_id).await {
            Ok(Some(stored)) => {
                for file in stored.files {
                    room.files.insert(file.path, file.content);
                }
                // Store returns the most recent messages oldest first
                for msg in stored.messages {
                    room.push_chat(ChatMessage {
                        sender: msg.username,
                        text: msg.content,
                        timestamp: msg.created_at,
                    });
                }
                if room.files.is_empty() {
                    room.seed();
                } else {
                    room.loaded = true;
                }
                info!(room_id, files = room.files.len(), "Room state loaded from store");
            }
            Ok(None) => {
                room.seed();
                let rid = room_id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = store.create_room(&rid).await {
                        error!(room_id = %rid, "Failed to persist new room: {}", e);
                    }
                });
                persist_file(
                    room_id,
                    crate::models::SEED_FILE_PATH,
                    crate::models::SEED_FILE_CONTENT,
                );
            }
            Err(e) => {
                error!(room_id, "Store unavailable, continuing in memory: {}", e);
                room.seed();
            }
        }
    }
}

// Write-behind persistence. All of these are best-effort: a store failure is
// logged and the in-memory session continues unaffected.

fn persist_file(room_id: &str, path: &str, content: &str) {
    let Some(store) = store::get_db() else {
        return;
    };
    let (room_id, path, content) = (room_id.to_string(), path.to_string(), content.to_string());
    tokio::spawn(async move {
        if let Err(e) = store.save_file(&room_id, &path, &content).await {
            error!(room_id, path, "Failed to persist file: {}", e);
        }
    });
}

fn persist_rename(room_id: &str, old_path: &str, new_path: &str) {
    let Some(store) = store::get_db() else {
        return;
    };
    let (room_id, old_path, new_path) =
        (room_id.to_string(), old_path.to_string(), new_path.to_string());
    tokio::spawn(async move {
        if let Err(e) = store.rename_file(&room_id, &old_path, &new_path).await {
            error!(room_id, old_path, new_path, "Failed to persist rename: {}", e);
        }
    });
}

fn persist_delete(room_id: &str, path: &str) {
    let Some(store) = store::get_db() else {
        return;
    };
    let (room_id, path) = (room_id.to_string(), path.to_string());
    tokio::spawn(async move {
        if let Err(e) = store.delete_file(&room_id, &path).await {
            error!(room_id, path, "Failed to persist delete: {}", e);
        }
    });
}

fn persist_chat(room_id: &str, message: ChatMessage) {
    let Some(store) = store::get_db() else {
        return;
    };
    let room_id = room_id.to_string();
    tokio::spawn(async move {
        if let Err(e) = store
            .append_message(&room_id, &message.sender, &message.text, message.timestamp)
            .await
        {
            error!(room_id, "Failed to persist chat message: {}", e);
        }
    });
}
