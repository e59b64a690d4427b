//! SQL schema definitions (Section 6, "Persistent state layout").

/// Complete schema for the messaging backend's repository, v1.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Users
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    hex TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    avatar TEXT,
    verified INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    public_key TEXT NOT NULL,
    encrypted_private_key TEXT NOT NULL,
    private_key_nonce TEXT NOT NULL,
    passcode_salt TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ============================================================
-- Conversations
-- ============================================================

CREATE TABLE IF NOT EXISTS conversations (
    hex TEXT PRIMARY KEY,
    trust TEXT NOT NULL DEFAULT 'request',
    scope TEXT NOT NULL DEFAULT 'user',
    from_user TEXT NOT NULL,
    last_message_id TEXT,
    unread INTEGER NOT NULL DEFAULT 0,
    total INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_participants (
    conversation_hex TEXT NOT NULL REFERENCES conversations(hex) ON DELETE CASCADE,
    user_hex TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'member',
    status TEXT NOT NULL DEFAULT 'active',
    online INTEGER NOT NULL DEFAULT 0,
    joined_at INTEGER NOT NULL,
    PRIMARY KEY (conversation_hex, user_hex)
);

CREATE INDEX IF NOT EXISTS idx_participants_user ON conversation_participants(user_hex);

CREATE TABLE IF NOT EXISTS conversation_pins (
    conversation_hex TEXT NOT NULL REFERENCES conversations(hex) ON DELETE CASCADE,
    user_hex TEXT NOT NULL,
    pinned_at INTEGER NOT NULL,
    PRIMARY KEY (conversation_hex, user_hex)
);

CREATE INDEX IF NOT EXISTS idx_pins_user ON conversation_pins(user_hex);

CREATE TABLE IF NOT EXISTS conversation_deleted (
    conversation_hex TEXT NOT NULL REFERENCES conversations(hex) ON DELETE CASCADE,
    user_hex TEXT NOT NULL,
    deleted_at INTEGER NOT NULL,
    PRIMARY KEY (conversation_hex, user_hex)
);

-- ============================================================
-- Messages
-- ============================================================

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation TEXT NOT NULL REFERENCES conversations(hex) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    type TEXT NOT NULL,
    parent TEXT,
    user TEXT NOT NULL,
    recipient_encrypted TEXT NOT NULL,
    recipient_nonce TEXT NOT NULL,
    sender_encrypted TEXT NOT NULL,
    sender_nonce TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'sent',
    attachments_json TEXT NOT NULL DEFAULT '[]',
    images_json TEXT NOT NULL DEFAULT '[]',
    videos_json TEXT NOT NULL DEFAULT '[]',
    audio TEXT,
    reply_json TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_parent ON messages(parent);

CREATE TABLE IF NOT EXISTS message_reactions (
    message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    slot TEXT NOT NULL CHECK (slot IN ('from', 'to')),
    reaction TEXT NOT NULL,
    PRIMARY KEY (message_id, slot)
);
"#;
