//! Shared test harness for the end-to-end scenarios (Section 8).
//!
//! Exercises `relay-db`, `relay-hub`, `relay-queue`, `relay-validate`, and
//! `relay-crypto` directly, the way a single daemon process wires them
//! together, without going through HTTP or a WebSocket transport. Each test
//! plays the role `relay-daemon`'s dispatcher would: validate, persist,
//! publish to the topic, enqueue for cross-instance delivery.

use std::sync::Arc;

use relay_hub::{ChannelHub, ConnectionRegistry};
use relay_queue::{Job, JobData, JobQueue, MemoryQueue};
use relay_types::{now_ms, Conversation, FrameKind, Hex, Message, MessageKind, OutboundFrame, User, UserStatus};
use rusqlite::Connection;

/// One simulated daemon instance's transport state, backed by a shared
/// database connection (tests model a single-process deployment unless a
/// scenario explicitly needs two instances, e.g. S4).
pub struct Instance {
    pub registry: ConnectionRegistry,
    pub channels: ChannelHub,
}

impl Instance {
    pub fn new() -> Self {
        Instance { registry: ConnectionRegistry::new(), channels: ChannelHub::new() }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

pub fn open_db() -> Connection {
    relay_db::open_memory().expect("open in-memory db")
}

/// Creates a user with throwaway key material; only `hex` matters to these
/// scenarios.
pub fn create_user(conn: &Connection, name: &str) -> User {
    let now = now_ms();
    let user = User {
        hex: relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES),
        name: name.to_string(),
        avatar: None,
        verified: false,
        status: UserStatus::Active,
        keys: relay_types::user::KeyEnvelope {
            public_key: "cHVi".to_string(),
            encrypted_private_key: "ZW5j".to_string(),
            private_key_nonce: "bm9u".to_string(),
            passcode_salt: "c2FsdA==".to_string(),
        },
        created_at: now,
        updated_at: now,
    };
    relay_db::queries::users::create(conn, &user).expect("create user");
    user
}

pub fn create_conversation(conn: &Connection, a: &Hex, b: &Hex) -> Conversation {
    let hex = relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES);
    relay_db::queries::conversations::create(conn, &hex, &[a.clone(), b.clone()], a, now_ms()).expect("create conversation")
}

/// Builds and validates a `new`/`reply` frame payload the way a client
/// would send it over `/chat/:hex`.
pub fn new_message_frame(conversation: &Hex, sender: &Hex, parent: Option<&Hex>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "conversation": conversation,
        "kind": if parent.is_some() { "reply" } else { "message" },
        "type": "all",
        "user": sender,
        "recipientContent": { "encrypted": "E1", "nonce": "N1" },
        "senderContent": { "encrypted": "E2", "nonce": "N2" },
        "status": "sent",
    });
    if let Some(parent) = parent {
        body["parent"] = serde_json::json!(parent);
    }
    body
}

/// Replays the `new`/`reply` half of the dispatcher (Section 4.8) against a
/// shared connection, returning the persisted message.
pub fn dispatch_new_message(conn: &Connection, payload: serde_json::Value) -> Result<Message, relay_validate::ValidationError> {
    let is_reply = payload.get("kind").and_then(|v| v.as_str()) == Some("reply");
    let payload =
        if is_reply { relay_validate::validate_reply(payload)? } else { relay_validate::validate_new_message(payload)? };

    let reply = if is_reply {
        let parent_id = payload.parent.clone().expect("reply schema requires parent");
        let parent = relay_db::queries::messages::find_by_id(conn, &parent_id).expect("parent exists");
        Some(relay_types::message::ReplyPreview {
            recipient_content: parent.sender_content,
            sender_content: parent.recipient_content,
        })
    } else {
        None
    };

    let now = now_ms();
    let msg = Message {
        id: relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES),
        conversation: payload.conversation,
        kind: if is_reply { MessageKind::Reply } else { MessageKind::Message },
        message_type: payload.message_type,
        parent: payload.parent,
        user: payload.user,
        recipient_content: payload.recipient_content,
        sender_content: payload.sender_content,
        status: payload.status,
        attachments: payload.attachments,
        images: payload.images,
        videos: payload.videos,
        audio: payload.audio,
        reactions: payload.reactions.unwrap_or_default(),
        reply,
        created_at: now,
        updated_at: now,
    };
    relay_db::queries::messages::insert(conn, &msg).expect("insert message");
    Ok(msg)
}

/// Publishes `msg` to the conversation topic and enqueues it for the named
/// recipients, mirroring `publish_and_enqueue` in the daemon's dispatcher.
pub async fn publish_and_enqueue(instance: &Instance, queue: &dyn JobQueue, msg: &Message, to: Vec<Hex>) {
    let kind = if msg.kind == MessageKind::Reply { FrameKind::Reply } else { FrameKind::New };
    let body = serde_json::to_value(msg).expect("serialize message");
    instance.channels.publish(&msg.conversation, OutboundFrame::new(kind, body.clone()));
    queue
        .enqueue(Job::new(to, msg.conversation.clone(), JobData { kind, message: body }))
        .await
        .expect("enqueue job");
}

pub fn memory_queue() -> Arc<MemoryQueue> {
    Arc::new(MemoryQueue::new())
}
