use serde::{Deserialize, Serialize};

/// Events sent FROM client TO server over the WebSocket.
///
/// Internally tagged on `type`, camelCase field names on the wire
/// (`{"type":"join_room","roomId":"r1"}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Join an existing room. Silent to peers.
    JoinRoom { room_id: String },

    /// Leave a room; the server acks with `{status}` and deletes the room
    /// when the last member leaves.
    LeaveRoom { room_id: String },

    /// Post a chat line or drawing element. `id` is caller-supplied and
    /// unique within the room.
    Chat {
        room_id: String,
        id: String,
        message: String,
    },

    /// Erase the element with the given id.
    Eraser { room_id: String, id: String },

    /// Replace the content of an existing element.
    Update {
        room_id: String,
        id: String,
        message: String,
    },

    /// Clear every peer's live view. Persisted messages are untouched.
    Clean { room_id: String },
}

impl ClientEvent {
    /// The room this event targets.
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Chat { room_id, .. }
            | Self::Eraser { room_id, .. }
            | Self::Update { room_id, .. }
            | Self::Clean { room_id } => room_id,
        }
    }
}

/// Events fanned out FROM server TO room peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Chat {
        id: String,
        message: String,
        room_id: String,
    },
    Eraser {
        id: String,
        room_id: String,
    },
    Update {
        id: String,
        message: String,
        room_id: String,
    },
    Clean {
        room_id: String,
    },
}

/// Status carried by the `leave_room` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

/// Acknowledgement for `leave_room`. A bare `{"status":"OK"}` object on
/// the wire, no `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveAck {
    pub status: AckStatus,
}

/// Anything the server pushes down a connection's outbound channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Event(ServerEvent),
    Ack(LeaveAck),
}
