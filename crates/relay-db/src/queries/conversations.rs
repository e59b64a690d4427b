//! Conversation queries (Section 4.4, "Conversation").
//!
//! The pin cap is enforced per user across all of that user's conversations
//! (Section 8, scenario S2: "five existing pins on distinct conversations"),
//! not per conversation — property 3's `|c.pins| ≤ maxPins` reading is
//! trivially satisfied once `scope = user` caps every conversation at two
//! participants, so the user-scoped cap is the one that actually binds.

use rusqlite::{params, Connection, OptionalExtension, Row};

use relay_types::conversation::{
    Conversation, ConversationCounts, ConversationFilter, Deleted, Participant, ParticipantRole,
    ParticipantStatus, Pin, Scope, Trust,
};
use relay_types::{Hex, Timestamp};

use crate::{DbError, Result};

fn trust_to_str(t: Trust) -> &'static str {
    match t {
        Trust::Request => "request",
        Trust::Trusted => "trusted",
    }
}

fn trust_from_str(s: &str) -> Result<Trust> {
    match s {
        "request" => Ok(Trust::Request),
        "trusted" => Ok(Trust::Trusted),
        other => Err(DbError::Serialization(format!("unknown trust `{other}`"))),
    }
}

fn scope_from_str(s: &str) -> Result<Scope> {
    match s {
        "user" => Ok(Scope::User),
        "group" => Ok(Scope::Group),
        other => Err(DbError::Serialization(format!("unknown scope `{other}`"))),
    }
}

fn role_from_str(s: &str) -> Result<ParticipantRole> {
    match s {
        "admin" => Ok(ParticipantRole::Admin),
        "moderator" => Ok(ParticipantRole::Moderator),
        "member" => Ok(ParticipantRole::Member),
        other => Err(DbError::Serialization(format!("unknown participant role `{other}`"))),
    }
}

fn role_to_str(r: ParticipantRole) -> &'static str {
    match r {
        ParticipantRole::Admin => "admin",
        ParticipantRole::Moderator => "moderator",
        ParticipantRole::Member => "member",
    }
}

fn participant_status_from_str(s: &str) -> Result<ParticipantStatus> {
    match s {
        "active" => Ok(ParticipantStatus::Active),
        "inactive" => Ok(ParticipantStatus::Inactive),
        "suspended" => Ok(ParticipantStatus::Suspended),
        "blocked" => Ok(ParticipantStatus::Blocked),
        other => Err(DbError::Serialization(format!("unknown participant status `{other}`"))),
    }
}

fn load_participants(conn: &Connection, conv_hex: &str) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT user_hex, role, status, online, joined_at
         FROM conversation_participants WHERE conversation_hex = ?1 ORDER BY joined_at",
    )?;
    let rows = stmt.query_map([conv_hex], |row: &Row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, Timestamp>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (user, role, status, online, joined_at) = row?;
        out.push(Participant {
            user,
            role: role_from_str(&role)?,
            status: participant_status_from_str(&status)?,
            online,
            joined_at,
        });
    }
    Ok(out)
}

fn load_pins(conn: &Connection, conv_hex: &str) -> Result<Vec<Pin>> {
    let mut stmt = conn
        .prepare("SELECT user_hex, pinned_at FROM conversation_pins WHERE conversation_hex = ?1")?;
    let rows = stmt
        .query_map([conv_hex], |row| Ok(Pin { user: row.get(0)?, pinned_at: row.get(1)? }))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_deleted(conn: &Connection, conv_hex: &str) -> Result<Vec<Deleted>> {
    let mut stmt = conn
        .prepare("SELECT user_hex, deleted_at FROM conversation_deleted WHERE conversation_hex = ?1")?;
    let rows = stmt
        .query_map([conv_hex], |row| Ok(Deleted { user: row.get(0)?, deleted_at: row.get(1)? }))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_conversation_row(conn: &Connection, hex: &str) -> Result<Conversation> {
    let (trust, scope, from, last, unread, total, created_at, updated_at): (
        String,
        String,
        String,
        Option<String>,
        i64,
        i64,
        Timestamp,
        Timestamp,
    ) = conn
        .query_row(
            "SELECT trust, scope, from_user, last_message_id, unread, total, created_at, updated_at
             FROM conversations WHERE hex = ?1",
            [hex],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("conversation `{hex}`")),
            other => DbError::Sqlite(other),
        })?;

    Ok(Conversation {
        hex: hex.to_string(),
        participants: load_participants(conn, hex)?,
        trust: trust_from_str(&trust)?,
        scope: scope_from_str(&scope)?,
        from,
        last,
        unread,
        total,
        pins: load_pins(conn, hex)?,
        deleted: load_deleted(conn, hex)?,
        created_at,
        updated_at,
    })
}

fn find_conversation_for_pair(conn: &Connection, a: &str, b: &str) -> Result<Option<Hex>> {
    conn.query_row(
        "SELECT cp1.conversation_hex FROM conversation_participants cp1
         JOIN conversation_participants cp2 ON cp1.conversation_hex = cp2.conversation_hex
         WHERE cp1.user_hex = ?1 AND cp2.user_hex = ?2
         GROUP BY cp1.conversation_hex
         HAVING (SELECT COUNT(*) FROM conversation_participants cp3
                 WHERE cp3.conversation_hex = cp1.conversation_hex) = 2",
        params![a, b],
        |row| row.get(0),
    )
    .optional()
    .map_err(DbError::Sqlite)
}

/// Creates a new two-party conversation. Rejects when a conversation already
/// exists for this unordered participant pair.
pub fn create(
    conn: &Connection,
    hex: &Hex,
    participants: &[Hex; 2],
    from: &Hex,
    now: Timestamp,
) -> Result<Conversation> {
    if find_conversation_for_pair(conn, &participants[0], &participants[1])?.is_some() {
        return Err(DbError::Constraint(
            "a conversation already exists for this participant pair".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO conversations (hex, trust, scope, from_user, last_message_id, unread, total, created_at, updated_at)
         VALUES (?1, 'request', 'user', ?2, NULL, 0, 0, ?3, ?3)",
        params![hex, from, now],
    )?;

    for user in participants {
        conn.execute(
            "INSERT INTO conversation_participants (conversation_hex, user_hex, role, status, online, joined_at)
             VALUES (?1, ?2, 'member', 'active', 0, ?3)",
            params![hex, user, now],
        )?;
    }

    load_conversation_row(conn, hex)
}

/// Finds a conversation by its hex id.
pub fn find_by_hex(conn: &Connection, hex: &str) -> Result<Conversation> {
    load_conversation_row(conn, hex)
}

/// `true` if a conversation already exists for this unordered participant pair.
pub fn exists(conn: &Connection, participants: &[Hex; 2]) -> Result<bool> {
    Ok(find_conversation_for_pair(conn, &participants[0], &participants[1])?.is_some())
}

/// Finds the single conversation between two users, if one exists
/// (`POST /conversation/one`).
pub fn find_for_pair(conn: &Connection, a: &str, b: &str) -> Result<Conversation> {
    let hex = find_conversation_for_pair(conn, a, b)?
        .ok_or_else(|| DbError::NotFound(format!("conversation between `{a}` and `{b}`")))?;
    load_conversation_row(conn, &hex)
}

/// Paginated listing of a user's conversations under `filter`, newest-updated
/// first.
pub fn list_for_user(
    conn: &Connection,
    user_hex: &str,
    filter: ConversationFilter,
    page: u32,
    page_size: u32,
) -> Result<Vec<Conversation>> {
    let offset = page.saturating_sub(1) as i64 * page_size as i64;

    let hexes: Vec<String> = match filter {
        ConversationFilter::All => {
            let mut stmt = conn.prepare(
                "SELECT c.hex FROM conversations c
                 JOIN conversation_participants p ON p.conversation_hex = c.hex
                 WHERE p.user_hex = ?1
                 ORDER BY c.updated_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(params![user_hex, page_size, offset], |r| r.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        ConversationFilter::Requested => {
            let mut stmt = conn.prepare(
                "SELECT c.hex FROM conversations c
                 JOIN conversation_participants p ON p.conversation_hex = c.hex
                 WHERE p.user_hex = ?1 AND c.trust = 'request'
                 ORDER BY c.updated_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(params![user_hex, page_size, offset], |r| r.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        ConversationFilter::Trusted => {
            let mut stmt = conn.prepare(
                "SELECT c.hex FROM conversations c
                 JOIN conversation_participants p ON p.conversation_hex = c.hex
                 WHERE p.user_hex = ?1 AND c.trust = 'trusted'
                 ORDER BY c.updated_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(params![user_hex, page_size, offset], |r| r.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        ConversationFilter::TrustedUnread => {
            let mut stmt = conn.prepare(
                "SELECT c.hex FROM conversations c
                 JOIN conversation_participants p ON p.conversation_hex = c.hex
                 WHERE p.user_hex = ?1 AND c.trust = 'trusted' AND c.unread > 0
                 ORDER BY c.updated_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(params![user_hex, page_size, offset], |r| r.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        ConversationFilter::PinnedBy => {
            let mut stmt = conn.prepare(
                "SELECT c.hex FROM conversations c
                 JOIN conversation_pins pin ON pin.conversation_hex = c.hex
                 WHERE pin.user_hex = ?1
                 ORDER BY c.updated_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(params![user_hex, page_size, offset], |r| r.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    hexes.iter().map(|hex| load_conversation_row(conn, hex)).collect()
}

/// Pins a conversation for a user. Rejects when already pinned by that user
/// or when that user already has `max_pins` pinned conversations.
pub fn pin(conn: &Connection, conv_hex: &str, user_hex: &str, max_pins: usize, now: Timestamp) -> Result<()> {
    let already: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM conversation_pins WHERE conversation_hex = ?1 AND user_hex = ?2",
            params![conv_hex, user_hex],
            |r| r.get(0),
        )
        .optional()?;
    if already.is_some() {
        return Err(DbError::Constraint("conversation is already pinned".to_string()));
    }

    let pin_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM conversation_pins WHERE user_hex = ?1", [user_hex], |r| r.get(0))?;
    if pin_count as usize >= max_pins {
        return Err(DbError::Constraint(format!("cannot pin more than {max_pins} conversations")));
    }

    conn.execute(
        "INSERT INTO conversation_pins (conversation_hex, user_hex, pinned_at) VALUES (?1, ?2, ?3)",
        params![conv_hex, user_hex, now],
    )?;
    Ok(())
}

/// Unpins a conversation for a user.
pub fn unpin(conn: &Connection, conv_hex: &str, user_hex: &str) -> Result<()> {
    let rows = conn.execute(
        "DELETE FROM conversation_pins WHERE conversation_hex = ?1 AND user_hex = ?2",
        params![conv_hex, user_hex],
    )?;
    if rows == 0 {
        return Err(DbError::NotFound("pin".to_string()));
    }
    Ok(())
}

/// Accepts a request conversation. Requires `user_hex` to be a participant
/// and the conversation to currently be in `trust = request`.
pub fn accept(conn: &Connection, conv_hex: &str, user_hex: &str, now: Timestamp) -> Result<()> {
    let conv = load_conversation_row(conn, conv_hex)?;
    if !conv.is_participant(user_hex) {
        return Err(DbError::Constraint("not a participant".to_string()));
    }
    if conv.trust != Trust::Request {
        return Err(DbError::Constraint("conversation is not a pending request".to_string()));
    }

    conn.execute(
        "UPDATE conversations SET trust = 'trusted', updated_at = ?1 WHERE hex = ?2",
        params![now, conv_hex],
    )?;
    Ok(())
}

/// Summary counts used by `GET /conversations/stats`.
pub fn counts(conn: &Connection, user_hex: &str) -> Result<ConversationCounts> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversation_participants WHERE user_hex = ?1",
        [user_hex],
        |r| r.get(0),
    )?;
    let unread: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations c
         JOIN conversation_participants p ON p.conversation_hex = c.hex
         WHERE p.user_hex = ?1 AND c.trust = 'trusted' AND c.unread > 0",
        [user_hex],
        |r| r.get(0),
    )?;
    let requested: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations c
         JOIN conversation_participants p ON p.conversation_hex = c.hex
         WHERE p.user_hex = ?1 AND c.trust = 'request' AND c.from_user != ?1",
        [user_hex],
        |r| r.get(0),
    )?;

    Ok(ConversationCounts { total, unread, requested })
}

/// Sets the participant row's `role` (used by administrative endpoints, if any
/// are ever added beyond Section 6's routes; currently unused by the
/// dispatcher but kept as the symmetric counterpart to `update_field` on
/// users).
#[allow(dead_code)]
pub fn set_participant_role(conn: &Connection, conv_hex: &str, user_hex: &str, role: ParticipantRole) -> Result<()> {
    let rows = conn.execute(
        "UPDATE conversation_participants SET role = ?1 WHERE conversation_hex = ?2 AND user_hex = ?3",
        params![role_to_str(role), conv_hex, user_hex],
    )?;
    if rows == 0 {
        return Err(DbError::NotFound("participant".to_string()));
    }
    Ok(())
}

/// Recomputes `last_message_id` and `total` from the messages table.
/// Called transactionally by the message repository after insert/delete
/// (Section 8, invariant 1 and 6).
/// Recomputes `last`, `total`, and `unread` (Open Question 2: `unread` is a
/// live count of messages not yet marked `read`, not a counter a caller
/// increments and resets by hand — it falls out of the same message table
/// `total` already does, so there's no separate reset path to get wrong).
pub(crate) fn recompute_last_and_total(conn: &Connection, conv_hex: &str, now: Timestamp) -> Result<()> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages WHERE conversation = ?1", [conv_hex], |r| r.get(0))?;
    let unread: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation = ?1 AND status != 'read'",
        [conv_hex],
        |r| r.get(0),
    )?;
    let last: Option<String> = conn
        .query_row(
            "SELECT id FROM messages WHERE conversation = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            [conv_hex],
            |r| r.get(0),
        )
        .optional()?;

    conn.execute(
        "UPDATE conversations SET last_message_id = ?1, total = ?2, unread = ?3, updated_at = ?4 WHERE hex = ?5",
        params![last, total, unread, now, conv_hex],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_pair() {
        let conn = crate::open_memory().expect("open");
        let a = "u1".to_string();
        let b = "u2".to_string();
        create(&conn, &"h1".to_string(), &[a.clone(), b.clone()], &a, 1000).expect("create");

        let err = create(&conn, &"h2".to_string(), &[b, a], &"u2".to_string(), 2000).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn new_conversation_starts_as_request() {
        let conn = crate::open_memory().expect("open");
        let conv = create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000)
            .expect("create");
        assert_eq!(conv.trust, Trust::Request);
        assert_eq!(conv.participants.len(), 2);
    }

    #[test]
    fn accept_flips_trust() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000).expect("create");
        accept(&conn, "h1", "u2", 2000).expect("accept");

        let conv = find_by_hex(&conn, "h1").expect("find");
        assert_eq!(conv.trust, Trust::Trusted);
    }

    #[test]
    fn accept_rejects_non_participant() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000).expect("create");
        let err = accept(&conn, "h1", "stranger", 2000).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn pin_cap_is_enforced_per_user() {
        let conn = crate::open_memory().expect("open");
        for i in 0..5 {
            let hex = format!("h{i}");
            create(&conn, &hex, &["u1".to_string(), format!("peer{i}")], &"u1".to_string(), 1000).expect("create");
            pin(&conn, &hex, "u1", 5, 1000).expect("pin");
        }

        create(&conn, &"h6".to_string(), &["u1".to_string(), "peer6".to_string()], &"u1".to_string(), 1000)
            .expect("create");
        let err = pin(&conn, "h6", "u1", 5, 1000).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn pin_rejects_double_pin() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000).expect("create");
        pin(&conn, "h1", "u1", 5, 1000).expect("pin");
        let err = pin(&conn, "h1", "u1", 5, 1000).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn find_for_pair_is_order_independent() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000).expect("create");

        let found = find_for_pair(&conn, "u2", "u1").expect("find");
        assert_eq!(found.hex, "h1");
    }

    #[test]
    fn find_for_pair_missing_is_not_found() {
        let conn = crate::open_memory().expect("open");
        let err = find_for_pair(&conn, "u1", "u2").unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn counts_classifies_requested_by_initiator() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &"h1".to_string(), &["u1".to_string(), "u2".to_string()], &"u1".to_string(), 1000).expect("create");

        let initiator_counts = counts(&conn, "u1").expect("counts");
        assert_eq!(initiator_counts.requested, 0);

        let recipient_counts = counts(&conn, "u2").expect("counts");
        assert_eq!(recipient_counts.requested, 1);
    }
}
