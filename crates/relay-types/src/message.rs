//! Message records (Section 3, "Message").

use serde::{Deserialize, Serialize};

use crate::{Hex, Timestamp};

/// An opaque `{encrypted, nonce}` pair the server stores without ever
/// decrypting (Section 3, "Envelope" in the glossary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub encrypted: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    Reply,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    All,
    Audio,
}

/// Delivery status. Values only ever advance in the order declared here
/// (Section 3 invariant, Section 8 property 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// The fixed reaction enum (Section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

/// At most two reaction slots: the message author's own reaction (`from`)
/// and the counterpart's (`to`). A handler assigns the slot by comparing the
/// reacting user against `message.user` (Section 4.8, "reaction").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reactions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Reaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Reaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub link: String,
}

/// The addressed preview of a parent message, computed once at reply time
/// (Section 4.8, "reply"; Section 8, scenario S6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub recipient_content: Envelope,
    pub sender_content: Envelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Hex,
    pub conversation: Hex,
    pub kind: MessageKind,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub parent: Option<Hex>,
    pub user: Hex,
    pub recipient_content: Envelope,
    pub sender_content: Envelope,
    pub status: MessageStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reply: Option<ReplyPreview>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Message {
    /// `true` if `next` is a legal forward transition from the current
    /// status (Section 3 invariant: status only advances).
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        next > self.status
    }
}
