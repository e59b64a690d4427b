//! WebSocket frame shapes (Section 6, "WebSocket frame format"; Section 4.8).

use serde::{Deserialize, Serialize};

use crate::message::{Envelope, MessageKind, MessageStatus, MessageType, Reaction};
use crate::{Hex, Timestamp};

/// The `kind` discriminant of an inbound or outbound frame. Inbound frames
/// use every variant except `System`/`Error`; outbound frames use every
/// variant except `Forward` (forward handling always replies with `Error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    New,
    Reply,
    Status,
    Reaction,
    Update,
    Remove,
    Forward,
    System,
    Error,
}

/// A frame as received over the wire: `{"kind": ..., "message": ...}`. The
/// dispatcher first reads `kind`, then asks the validator to decode
/// `message` into the payload shape that `kind` implies.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub message: serde_json::Value,
}

/// A frame as sent over the wire. `message` is pre-serialized to
/// `serde_json::Value` so one outbound-frame type covers every handler.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub kind: FrameKind,
    pub message: serde_json::Value,
}

impl OutboundFrame {
    pub fn new(kind: FrameKind, message: serde_json::Value) -> Self {
        OutboundFrame { kind, message }
    }

    pub fn error(message: serde_json::Value) -> Self {
        OutboundFrame { kind: FrameKind::Error, message }
    }

    pub fn system(text: impl Into<String>, created_at: Timestamp) -> Self {
        OutboundFrame {
            kind: FrameKind::System,
            message: serde_json::json!({ "message": text.into(), "createdAt": created_at }),
        }
    }
}

/// Payload of a `new` or `reply` frame, decoded by the validator against the
/// schemas named in Section 4.3.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub conversation: Hex,
    pub kind: MessageKind,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub user: Hex,
    pub recipient_content: Envelope,
    pub sender_content: Envelope,
    pub status: MessageStatus,
    #[serde(default)]
    pub attachments: Vec<crate::message::Attachment>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub reactions: Option<crate::message::Reactions>,
    /// Required and must resolve when `kind = reply`.
    #[serde(default)]
    pub parent: Option<Hex>,
}

/// Payload of a `status` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub id: Hex,
    pub status: MessageStatus,
}

/// Payload of a `reaction` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionPayload {
    pub id: Hex,
    pub user: Hex,
    pub reaction: Option<Reaction>,
}

/// Payload of an `update` frame (content edit schema, Section 4.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub id: Hex,
    pub sender_content: Envelope,
    pub recipient_content: Envelope,
}

/// Payload of a `remove` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RemovePayload {
    pub id: Hex,
    pub user: Hex,
}
