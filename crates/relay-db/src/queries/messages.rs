//! Message queries (Section 4.4, "Message").

use rusqlite::{params, Connection, Row};

use relay_types::message::{
    Attachment, Envelope, Message, MessageKind, MessageStatus, MessageType, Reaction, ReplyPreview,
};
use relay_types::{Hex, Timestamp};

use crate::queries::conversations::recompute_last_and_total;
use crate::{DbError, Result};

fn kind_to_str(k: MessageKind) -> &'static str {
    match k {
        MessageKind::Message => "message",
        MessageKind::Reply => "reply",
        MessageKind::Forward => "forward",
    }
}

fn kind_from_str(s: &str) -> Result<MessageKind> {
    match s {
        "message" => Ok(MessageKind::Message),
        "reply" => Ok(MessageKind::Reply),
        "forward" => Ok(MessageKind::Forward),
        other => Err(DbError::Serialization(format!("unknown message kind `{other}`"))),
    }
}

fn type_to_str(t: MessageType) -> &'static str {
    match t {
        MessageType::All => "all",
        MessageType::Audio => "audio",
    }
}

fn type_from_str(s: &str) -> Result<MessageType> {
    match s {
        "all" => Ok(MessageType::All),
        "audio" => Ok(MessageType::Audio),
        other => Err(DbError::Serialization(format!("unknown message type `{other}`"))),
    }
}

fn status_to_str(s: MessageStatus) -> &'static str {
    match s {
        MessageStatus::Sent => "sent",
        MessageStatus::Delivered => "delivered",
        MessageStatus::Read => "read",
    }
}

fn status_from_str(s: &str) -> Result<MessageStatus> {
    match s {
        "sent" => Ok(MessageStatus::Sent),
        "delivered" => Ok(MessageStatus::Delivered),
        "read" => Ok(MessageStatus::Read),
        other => Err(DbError::Serialization(format!("unknown message status `{other}`"))),
    }
}

fn reaction_to_str(r: Reaction) -> &'static str {
    match r {
        Reaction::Like => "like",
        Reaction::Love => "love",
        Reaction::Laugh => "laugh",
        Reaction::Wow => "wow",
        Reaction::Sad => "sad",
        Reaction::Angry => "angry",
    }
}

fn reaction_from_str(s: &str) -> Result<Reaction> {
    match s {
        "like" => Ok(Reaction::Like),
        "love" => Ok(Reaction::Love),
        "laugh" => Ok(Reaction::Laugh),
        "wow" => Ok(Reaction::Wow),
        "sad" => Ok(Reaction::Sad),
        "angry" => Ok(Reaction::Angry),
        other => Err(DbError::Serialization(format!("unknown reaction `{other}`"))),
    }
}

/// Which reaction slot a reaction belongs in (Section 4.8, "reaction"):
/// `From` is the message author's own reaction, `To` is the counterpart's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionSlot {
    From,
    To,
}

fn slot_to_str(s: ReactionSlot) -> &'static str {
    match s {
        ReactionSlot::From => "from",
        ReactionSlot::To => "to",
    }
}

fn row_to_message(row: &Row) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: row.get("id")?,
        conversation: row.get("conversation")?,
        kind: row.get("kind")?,
        message_type: row.get("type")?,
        parent: row.get("parent")?,
        user: row.get("user")?,
        recipient_encrypted: row.get("recipient_encrypted")?,
        recipient_nonce: row.get("recipient_nonce")?,
        sender_encrypted: row.get("sender_encrypted")?,
        sender_nonce: row.get("sender_nonce")?,
        status: row.get("status")?,
        attachments_json: row.get("attachments_json")?,
        images_json: row.get("images_json")?,
        videos_json: row.get("videos_json")?,
        audio: row.get("audio")?,
        reply_json: row.get("reply_json")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

struct RawMessage {
    id: String,
    conversation: String,
    kind: String,
    message_type: String,
    parent: Option<String>,
    user: String,
    recipient_encrypted: String,
    recipient_nonce: String,
    sender_encrypted: String,
    sender_nonce: String,
    status: String,
    attachments_json: String,
    images_json: String,
    videos_json: String,
    audio: Option<String>,
    reply_json: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

fn load_reactions(conn: &Connection, id: &str) -> Result<relay_types::message::Reactions> {
    let mut stmt = conn.prepare("SELECT slot, reaction FROM message_reactions WHERE message_id = ?1")?;
    let rows = stmt
        .query_map([id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut reactions = relay_types::message::Reactions::default();
    for (slot, reaction) in rows {
        let reaction = reaction_from_str(&reaction)?;
        match slot.as_str() {
            "from" => reactions.from = Some(reaction),
            "to" => reactions.to = Some(reaction),
            other => return Err(DbError::Serialization(format!("unknown reaction slot `{other}`"))),
        }
    }
    Ok(reactions)
}

fn finish(conn: &Connection, raw: RawMessage) -> Result<Message> {
    let attachments: Vec<Attachment> = serde_json::from_str(&raw.attachments_json)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let images: Vec<String> =
        serde_json::from_str(&raw.images_json).map_err(|e| DbError::Serialization(e.to_string()))?;
    let videos: Vec<String> =
        serde_json::from_str(&raw.videos_json).map_err(|e| DbError::Serialization(e.to_string()))?;
    let reply: Option<ReplyPreview> = raw
        .reply_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;

    Ok(Message {
        id: raw.id.clone(),
        conversation: raw.conversation,
        kind: kind_from_str(&raw.kind)?,
        message_type: type_from_str(&raw.message_type)?,
        parent: raw.parent,
        user: raw.user,
        recipient_content: Envelope { encrypted: raw.recipient_encrypted, nonce: raw.recipient_nonce },
        sender_content: Envelope { encrypted: raw.sender_encrypted, nonce: raw.sender_nonce },
        status: status_from_str(&raw.status)?,
        attachments,
        images,
        videos,
        audio: raw.audio,
        reactions: load_reactions(conn, &raw.id)?,
        reply,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

/// Inserts a new message and recomputes the conversation's `last`/`total`.
pub fn insert(conn: &Connection, msg: &Message) -> Result<()> {
    let attachments_json =
        serde_json::to_string(&msg.attachments).map_err(|e| DbError::Serialization(e.to_string()))?;
    let images_json = serde_json::to_string(&msg.images).map_err(|e| DbError::Serialization(e.to_string()))?;
    let videos_json = serde_json::to_string(&msg.videos).map_err(|e| DbError::Serialization(e.to_string()))?;
    let reply_json = msg
        .reply
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO messages (
            id, conversation, kind, type, parent, user,
            recipient_encrypted, recipient_nonce, sender_encrypted, sender_nonce,
            status, attachments_json, images_json, videos_json, audio, reply_json,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            msg.id,
            msg.conversation,
            kind_to_str(msg.kind),
            type_to_str(msg.message_type),
            msg.parent,
            msg.user,
            msg.recipient_content.encrypted,
            msg.recipient_content.nonce,
            msg.sender_content.encrypted,
            msg.sender_content.nonce,
            status_to_str(msg.status),
            attachments_json,
            images_json,
            videos_json,
            msg.audio,
            reply_json,
            msg.created_at,
            msg.updated_at,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            DbError::Constraint(format!("message `{}` already exists", msg.id))
        }
        other => DbError::Sqlite(other),
    })?;

    for (slot, reaction) in [(ReactionSlot::From, msg.reactions.from), (ReactionSlot::To, msg.reactions.to)] {
        if let Some(reaction) = reaction {
            conn.execute(
                "INSERT INTO message_reactions (message_id, slot, reaction) VALUES (?1, ?2, ?3)",
                params![msg.id, slot_to_str(slot), reaction_to_str(reaction)],
            )?;
        }
    }

    recompute_last_and_total(conn, &msg.conversation, msg.updated_at)?;
    Ok(())
}

/// Finds a message by its id.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Message> {
    let raw = conn
        .query_row(
            "SELECT id, conversation, kind, type, parent, user,
                    recipient_encrypted, recipient_nonce, sender_encrypted, sender_nonce,
                    status, attachments_json, images_json, videos_json, audio, reply_json,
                    created_at, updated_at
             FROM messages WHERE id = ?1",
            [id],
            row_to_message,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("message `{id}`")),
            other => DbError::Sqlite(other),
        })?;
    finish(conn, raw)
}

/// Advances a message's delivery status. Refuses downgrades (Section 8,
/// scenario S5).
pub fn update_status(conn: &Connection, id: &Hex, status: MessageStatus, now: Timestamp) -> Result<Message> {
    let current = find_by_id(conn, id)?;
    if !current.can_transition_to(status) {
        return Err(DbError::Constraint(format!(
            "cannot move status from {:?} back to {:?}",
            current.status, status
        )));
    }

    conn.execute(
        "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status_to_str(status), now, id],
    )?;
    recompute_last_and_total(conn, &current.conversation, now)?;
    find_by_id(conn, id)
}

/// Sets or clears a reaction slot (Section 4.8, "reaction"). `reaction =
/// None` clears the slot.
pub fn update_reactions(conn: &Connection, id: &Hex, slot: ReactionSlot, reaction: Option<Reaction>, now: Timestamp) -> Result<Message> {
    find_by_id(conn, id)?;

    match reaction {
        Some(reaction) => {
            conn.execute(
                "INSERT INTO message_reactions (message_id, slot, reaction) VALUES (?1, ?2, ?3)
                 ON CONFLICT(message_id, slot) DO UPDATE SET reaction = excluded.reaction",
                params![id, slot_to_str(slot), reaction_to_str(reaction)],
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND slot = ?2",
                params![id, slot_to_str(slot)],
            )?;
        }
    }

    conn.execute("UPDATE messages SET updated_at = ?1 WHERE id = ?2", params![now, id])?;
    find_by_id(conn, id)
}

/// Replaces both content envelopes (an edit).
pub fn update_contents(conn: &Connection, id: &Hex, sender_content: &Envelope, recipient_content: &Envelope, now: Timestamp) -> Result<Message> {
    let rows = conn.execute(
        "UPDATE messages SET sender_encrypted = ?1, sender_nonce = ?2,
                              recipient_encrypted = ?3, recipient_nonce = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            sender_content.encrypted,
            sender_content.nonce,
            recipient_content.encrypted,
            recipient_content.nonce,
            now,
            id
        ],
    )?;
    if rows == 0 {
        return Err(DbError::NotFound(format!("message `{id}`")));
    }
    find_by_id(conn, id)
}

/// Deletes a message. Enforces authorship and recomputes the owning
/// conversation's `last`/`total` (Section 8, invariant 6).
pub fn delete(conn: &Connection, id: &Hex, actor: &Hex, now: Timestamp) -> Result<()> {
    let msg = find_by_id(conn, id)?;
    if &msg.user != actor {
        return Err(DbError::Constraint("unauthorized to delete message".to_string()));
    }

    conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
    recompute_last_and_total(conn, &msg.conversation, now)?;
    Ok(())
}

/// Newest-first page of a conversation's messages.
pub fn page(conn: &Connection, conversation_hex: &str, page: u32, page_size: u32) -> Result<Vec<Message>> {
    let offset = page.saturating_sub(1) as i64 * page_size as i64;
    let mut stmt = conn.prepare(
        "SELECT id, conversation, kind, type, parent, user,
                recipient_encrypted, recipient_nonce, sender_encrypted, sender_nonce,
                status, attachments_json, images_json, videos_json, audio, reply_json,
                created_at, updated_at
         FROM messages WHERE conversation = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let raws = stmt
        .query_map(params![conversation_hex, page_size, offset], row_to_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raws.into_iter().map(|raw| finish(conn, raw)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use relay_types::message::Reactions;

    fn sample(id: &str, conversation: &str, user: &str, created_at: Timestamp) -> Message {
        Message {
            id: id.to_string(),
            conversation: conversation.to_string(),
            kind: MessageKind::Message,
            message_type: MessageType::All,
            parent: None,
            user: user.to_string(),
            recipient_content: Envelope { encrypted: "E1".to_string(), nonce: "N1".to_string() },
            sender_content: Envelope { encrypted: "E2".to_string(), nonce: "N2".to_string() },
            status: MessageStatus::Sent,
            attachments: vec![],
            images: vec![],
            videos: vec![],
            audio: None,
            reactions: Reactions::default(),
            reply: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn setup_conversation(conn: &Connection, hex: &str) {
        conversations::create(conn, &hex.to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 500)
            .expect("create conversation");
    }

    #[test]
    fn insert_updates_conversation_last_and_total() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert");

        let conv = conversations::find_by_hex(&conn, "h1").expect("find");
        assert_eq!(conv.last.as_deref(), Some("m1"));
        assert_eq!(conv.total, 1);
    }

    #[test]
    fn status_cannot_downgrade() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert");
        update_status(&conn, &"m1".to_string(), MessageStatus::Read, 1100).expect("advance to read");

        let err = update_status(&conn, &"m1".to_string(), MessageStatus::Delivered, 1200).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn delete_enforces_authorship() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert");

        let err = delete(&conn, &"m1".to_string(), &"u2".to_string(), 2000).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert!(find_by_id(&conn, "m1").is_ok());
    }

    #[test]
    fn delete_recomputes_last_to_next_newest() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert m1");
        insert(&conn, &sample("m2", "h1", "u1", 2000)).expect("insert m2");

        delete(&conn, &"m2".to_string(), &"u1".to_string(), 3000).expect("delete m2");

        let conv = conversations::find_by_hex(&conn, "h1").expect("find");
        assert_eq!(conv.last.as_deref(), Some("m1"));
        assert_eq!(conv.total, 1);
        assert!(matches!(find_by_id(&conn, "m2"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn reaction_slot_routes_by_author() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert");

        update_reactions(&conn, &"m1".to_string(), ReactionSlot::From, Some(Reaction::Like), 1100).expect("react");
        update_reactions(&conn, &"m1".to_string(), ReactionSlot::To, Some(Reaction::Love), 1200).expect("react");

        let msg = find_by_id(&conn, "m1").expect("find");
        assert_eq!(msg.reactions.from, Some(Reaction::Like));
        assert_eq!(msg.reactions.to, Some(Reaction::Love));

        update_reactions(&conn, &"m1".to_string(), ReactionSlot::From, None, 1300).expect("clear");
        let msg = find_by_id(&conn, "m1").expect("find");
        assert_eq!(msg.reactions.from, None);
    }

    #[test]
    fn page_returns_newest_first() {
        let conn = crate::open_memory().expect("open");
        setup_conversation(&conn, "h1");
        insert(&conn, &sample("m1", "h1", "u1", 1000)).expect("insert");
        insert(&conn, &sample("m2", "h1", "u1", 2000)).expect("insert");

        let page = page(&conn, "h1", 1, 20).expect("page");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "m2");
        assert_eq!(page[1].id, "m1");
    }
}
