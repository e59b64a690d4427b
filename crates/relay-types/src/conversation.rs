//! Conversation records (Section 3, "Conversation").
//!
//! Open Question 1 of the design notes is resolved here: `trust` and `scope`
//! are modeled as two orthogonal fields rather than one overloaded `kind`.
//! `trust` carries the one-way request→trusted transition; `scope` names the
//! participant shape and is always `User` in this version (group
//! conversations are an explicit non-goal), which is what makes the
//! "exactly two participants" invariant checkable without reading `kind` as
//! two different axes at once.

use serde::{Deserialize, Serialize};

use crate::{Hex, Timestamp};

/// One-way trust transition: a conversation starts as a `Request` and may
/// advance to `Trusted` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    Request,
    Trusted,
}

/// Participant-shape axis. Always `User` in this version; `Group` is
/// reserved by the data model but never produced (group membership
/// negotiation is a non-goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Admin,
    Moderator,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    Inactive,
    Suspended,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user: Hex,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub online: bool,
    pub joined_at: Timestamp,
}

/// A per-user pin on a conversation (Section 3, "pins").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub user: Hex,
    pub pinned_at: Timestamp,
}

/// A per-user tombstone marker (Section 3, "deleted"). Messages remain;
/// only this user's visibility of the conversation is affected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub user: Hex,
    pub deleted_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub hex: Hex,
    pub participants: Vec<Participant>,
    pub trust: Trust,
    pub scope: Scope,
    /// The user who initiated the conversation.
    pub from: Hex,
    /// Id of the most recent message, or `None` if empty.
    pub last: Option<Hex>,
    pub unread: i64,
    pub total: i64,
    pub pins: Vec<Pin>,
    pub deleted: Vec<Deleted>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Conversation {
    /// The unordered pair of participant hexes, used to enforce the
    /// at-most-one-conversation-per-pair invariant (Section 8, property 2).
    pub fn participant_pair(&self) -> Option<(Hex, Hex)> {
        if self.participants.len() != 2 {
            return None;
        }
        let mut hexes: Vec<Hex> = self.participants.iter().map(|p| p.user.clone()).collect();
        hexes.sort();
        Some((hexes[0].clone(), hexes[1].clone()))
    }

    pub fn is_participant(&self, user: &str) -> bool {
        self.participants.iter().any(|p| p.user == user)
    }
}

/// A listing filter for `GET /conversations/{all,requested,trusted,unread,pins}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationFilter {
    All,
    Requested,
    Trusted,
    TrustedUnread,
    PinnedBy,
}

/// `GET /conversations/stats` response shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCounts {
    pub total: i64,
    pub unread: i64,
    pub requested: i64,
}
