//! User identity records (Section 3, "User").

use serde::{Deserialize, Serialize};

use crate::{Hex, Timestamp};

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

/// The opaque cryptographic envelope the server stores without inspecting,
/// beyond presence and length-class checks performed by the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEnvelope {
    /// Base64-encoded public key.
    pub public_key: String,
    /// Base64-encoded, client-encrypted private key.
    pub encrypted_private_key: String,
    /// Base64-encoded nonce for `encrypted_private_key`.
    pub private_key_nonce: String,
    /// Base64-encoded passcode salt.
    pub passcode_salt: String,
}

/// A user record (Section 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub hex: Hex,
    pub name: String,
    pub avatar: Option<String>,
    pub verified: bool,
    pub status: UserStatus,
    pub keys: KeyEnvelope,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The subset of a `User` embedded in a signed token's claims (Section 4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub hex: Hex,
    pub name: String,
    pub avatar: Option<String>,
    pub verified: bool,
    pub status: UserStatus,
    pub public_key: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal {
            hex: user.hex.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            verified: user.verified,
            status: user.status,
            public_key: user.keys.public_key.clone(),
        }
    }
}
