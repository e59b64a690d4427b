//! # relay-types
//!
//! Shared domain types used across the messaging backend workspace.
//! Structures correspond 1:1 with Section 3 (Data Model) of the core
//! specification.

pub mod clock;
pub mod conversation;
pub mod error;
pub mod frame;
pub mod message;
pub mod user;

pub use clock::now_ms;
pub use conversation::{Conversation, Participant, ParticipantRole, ParticipantStatus, Trust};
pub use error::CoreError;
pub use frame::{Frame, FrameKind, OutboundFrame};
pub use message::{Attachment, Envelope, Message, MessageKind, MessageStatus, MessageType, Reaction, Reactions};
pub use user::{Principal, User, UserStatus};

/// Stable lowercase-hex identifier used for users, conversations, and messages.
pub type Hex = String;

/// Unix epoch milliseconds, as produced by the repository on write.
pub type Timestamp = i64;

/// Default byte length passed to the identifier generator for conversation
/// and message ids; yields 20 hex characters (Section 4.2).
pub const DEFAULT_ID_BYTES: usize = 10;

/// Default maximum number of pinned conversations per user.
pub const DEFAULT_MAX_PINS: usize = 5;

/// Default conversation-listing page size.
pub const DEFAULT_CONVERSATION_PAGE_SIZE: u32 = 10;

/// Default message-history page size.
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 20;
