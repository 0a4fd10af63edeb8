use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::models::Participant;

/// Chat messages kept in memory per room; also the cap on the history slice
/// handed to a joining participant.
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// A freshly created room starts with this single file.
pub const SEED_FILE_PATH: &str = "main.py";
pub const SEED_FILE_CONTENT: &str = "print(\"Hello, collaborative world!\")";

/// A chat line. The sender is a username snapshot, not a user reference, so
/// history stays intact if the sender later renames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory state of a live room. Exists only while it has participants
/// (or is mid-load); all mutation goes through the registry under the
/// room's lock.
#[derive(Debug, Default)]
pub struct Room {
    pub files: HashMap<String, String>,
    pub participants: HashMap<String, Participant>,
    pub chat: VecDeque<ChatMessage>,
    /// Set once prior state was fetched from the store or the room was seeded.
    pub loaded: bool,
    /// Set under the room lock when the empty room is removed from the
    /// registry map. A join holding a stale handle must re-resolve.
    pub evicted: bool,
}

impl Room {
    /// Seed a brand-new room with the default file.
    pub fn seed(&mut self) {
        self.files
            .insert(SEED_FILE_PATH.to_string(), SEED_FILE_CONTENT.to_string());
        self.loaded = true;
    }

    /// Append a chat message, evicting the oldest once the buffer is full.
    pub fn push_chat(&mut self, message: ChatMessage) {
        if self.chat.len() == CHAT_HISTORY_LIMIT {
            self.chat.pop_front();
        }
        self.chat.push_back(message);
    }

    /// Recent chat, oldest first.
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.chat.iter().cloned().collect()
    }
}

/// Initial state handed to a participant right after joining.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub files: HashMap<String, String>,
    pub participants: Vec<Participant>,
    pub chat_history: Vec<ChatMessage>,
    pub current_user: Participant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: usize) -> ChatMessage {
        ChatMessage {
            sender: "ada".to_string(),
            text: format!("line {n}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn seed_creates_exactly_one_file() {
        let mut room = Room::default();
        room.seed();
        assert!(room.loaded);
        assert_eq!(room.files.len(), 1);
        assert_eq!(
            room.files.get(SEED_FILE_PATH).map(String::as_str),
            Some(SEED_FILE_CONTENT)
        );
    }

    #[test]
    fn chat_buffer_is_bounded_and_ordered() {
        let mut room = Room::default();
        for n in 0..CHAT_HISTORY_LIMIT + 10 {
            room.push_chat(msg(n));
        }
        let history = room.chat_history();
        assert_eq!(history.len(), CHAT_HISTORY_LIMIT);
        // Oldest first, with the first ten evicted
        assert_eq!(history.first().unwrap().text, "line 10");
        assert_eq!(history.last().unwrap().text, format!("line {}", CHAT_HISTORY_LIMIT + 9));
    }
}
