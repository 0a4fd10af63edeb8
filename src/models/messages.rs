use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, Participant, RoomSnapshot};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    pub room_id: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileAddMessage {
    pub path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileRenameMessage {
    pub old_path: String,
    pub new_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileDeleteMessage {
    pub path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangeMessage {
    pub path: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RunCodeMessage {
    pub language: String,
    pub code: String,
    pub current_file: String,
    #[serde(default)]
    pub stdin: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessage {
    pub text: String,
}

/// Peer-connection negotiation payload addressed to one connection.
/// The hub never interprets `payload`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    pub to: String,
    pub payload: Value,
}

/// A relayed negotiation payload, annotated with the sender's connection id.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignalRelayMessage {
    pub from: String,
    pub payload: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedMessage {
    pub participant: Participant,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftMessage {
    pub connection_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNotificationMessage {
    pub username: String,
    pub file: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeOutputMessage {
    pub stdout: String,
    pub stderr: Option<String>,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PasteNotificationMessage {
    pub username: String,
}

/// Events a connection sends to the hub.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join-room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "file-add")]
    FileAdd(FileAddMessage),
    #[serde(rename = "file-rename")]
    FileRename(FileRenameMessage),
    #[serde(rename = "file-delete")]
    FileDelete(FileDeleteMessage),
    #[serde(rename = "code-change")]
    CodeChange(CodeChangeMessage),
    #[serde(rename = "run-code")]
    RunCode(RunCodeMessage),
    #[serde(rename = "send-chat-message")]
    SendChat(SendChatMessage),
    #[serde(rename = "large-paste-notice")]
    LargePasteNotice,
    #[serde(rename = "webrtc-offer")]
    WebrtcOffer(SignalMessage),
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer(SignalMessage),
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate(SignalMessage),
}

/// Events the hub delivers to one or all connections in a room.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "initial-sync")]
    InitialSync(RoomSnapshot),
    #[serde(rename = "user-joined")]
    UserJoined(UserJoinedMessage),
    #[serde(rename = "user-left")]
    UserLeft(UserLeftMessage),
    #[serde(rename = "file-add")]
    FileAdd(FileAddMessage),
    #[serde(rename = "file-rename")]
    FileRename(FileRenameMessage),
    #[serde(rename = "file-delete")]
    FileDelete(FileDeleteMessage),
    #[serde(rename = "code-change")]
    CodeChange(CodeChangeMessage),
    #[serde(rename = "receive-chat-message")]
    ReceiveChatMessage(ChatMessage),
    #[serde(rename = "execution-notification")]
    ExecutionNotification(ExecutionNotificationMessage),
    #[serde(rename = "code-output")]
    CodeOutput(CodeOutputMessage),
    #[serde(rename = "paste-notification")]
    PasteNotification(PasteNotificationMessage),
    #[serde(rename = "webrtc-offer")]
    WebrtcOffer(SignalRelayMessage),
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer(SignalRelayMessage),
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate(SignalRelayMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_wire_format() {
        let raw = r#"{"type":"join-room","roomId":"r1","displayName":"ada"}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();
        match parsed {
            ClientMessage::JoinRoom(m) => {
                assert_eq!(m.room_id, "r1");
                assert_eq!(m.display_name, "ada");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn large_paste_notice_is_tag_only() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"large-paste-notice"}"#).unwrap();
        assert!(matches!(parsed, ClientMessage::LargePasteNotice));
    }

    #[test]
    fn code_output_wire_format() {
        let msg = ServerMessage::CodeOutput(CodeOutputMessage {
            stdout: "hi\n".to_string(),
            stderr: None,
            status: "Accepted".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "code-output");
        assert_eq!(json["stdout"], "hi\n");
        assert_eq!(json["status"], "Accepted");
    }

    #[test]
    fn signal_payload_is_opaque() {
        let raw = r#"{"type":"webrtc-offer","to":"c2","payload":{"sdp":"v=0","nested":[1,2]}}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();
        match parsed {
            ClientMessage::WebrtcOffer(m) => {
                assert_eq!(m.to, "c2");
                assert_eq!(m.payload["sdp"], "v=0");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
