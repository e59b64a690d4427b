//! User queries (Section 4.4, "User").

use rusqlite::{params, Connection, OptionalExtension, Row};

use relay_types::user::{KeyEnvelope, User, UserStatus};
use relay_types::{Hex, Timestamp};

use crate::{DbError, Result};

fn status_to_str(s: UserStatus) -> &'static str {
    match s {
        UserStatus::Active => "active",
        UserStatus::Inactive => "inactive",
        UserStatus::Suspended => "suspended",
    }
}

fn status_from_str(s: &str) -> Result<UserStatus> {
    match s {
        "active" => Ok(UserStatus::Active),
        "inactive" => Ok(UserStatus::Inactive),
        "suspended" => Ok(UserStatus::Suspended),
        other => Err(DbError::Serialization(format!("unknown user status `{other}`"))),
    }
}

fn row_to_user(row: &Row) -> rusqlite::Result<(User, String)> {
    let status: String = row.get("status")?;
    Ok((
        User {
            hex: row.get("hex")?,
            name: row.get("name")?,
            avatar: row.get("avatar")?,
            verified: row.get("verified")?,
            status: UserStatus::Active, // overwritten below once we can return DbError
            keys: KeyEnvelope {
                public_key: row.get("public_key")?,
                encrypted_private_key: row.get("encrypted_private_key")?,
                private_key_nonce: row.get("private_key_nonce")?,
                passcode_salt: row.get("passcode_salt")?,
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        },
        status,
    ))
}

fn finish(pair: rusqlite::Result<(User, String)>) -> Result<User> {
    let (mut user, status) = pair?;
    user.status = status_from_str(&status)?;
    Ok(user)
}

/// Creates a new user record.
pub fn create(conn: &Connection, user: &User) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE hex = ?1", [&user.hex], |r| r.get(0))
        .optional()?;
    if existing.is_some() {
        return Err(DbError::Constraint(format!("user `{}` already exists", user.hex)));
    }

    conn.execute(
        "INSERT INTO users (
            hex, name, avatar, verified, status,
            public_key, encrypted_private_key, private_key_nonce, passcode_salt,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.hex,
            user.name,
            user.avatar,
            user.verified,
            status_to_str(user.status),
            user.keys.public_key,
            user.keys.encrypted_private_key,
            user.keys.private_key_nonce,
            user.keys.passcode_salt,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

/// Finds a user by its hex id.
pub fn find_by_hex(conn: &Connection, hex: &str) -> Result<User> {
    let pair = conn
        .query_row(
            "SELECT hex, name, avatar, verified, status, public_key,
                    encrypted_private_key, private_key_nonce, passcode_salt,
                    created_at, updated_at
             FROM users WHERE hex = ?1",
            [hex],
            row_to_user,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("user `{hex}`")),
            other => DbError::Sqlite(other),
        });
    finish(pair)
}

/// Rotates a user's key envelope.
pub fn update_public_keys(
    conn: &Connection,
    hex: &str,
    public_key: &str,
    encrypted_private_key: &str,
    nonce: &str,
    salt: &str,
    now: Timestamp,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE users SET public_key = ?1, encrypted_private_key = ?2,
                           private_key_nonce = ?3, passcode_salt = ?4, updated_at = ?5
         WHERE hex = ?6",
        params![public_key, encrypted_private_key, nonce, salt, now, hex],
    )?;
    if rows == 0 {
        return Err(DbError::NotFound(format!("user `{hex}`")));
    }
    Ok(())
}

/// One of the mutable scalar fields of a user record.
#[derive(Debug, Clone)]
pub enum UserField {
    Name(String),
    Avatar(Option<String>),
    Status(UserStatus),
    Verified(bool),
}

/// Updates a single scalar field on a user record.
pub fn update_field(conn: &Connection, hex: &Hex, field: UserField, now: Timestamp) -> Result<()> {
    let rows = match field {
        UserField::Name(name) => conn.execute(
            "UPDATE users SET name = ?1, updated_at = ?2 WHERE hex = ?3",
            params![name, now, hex],
        )?,
        UserField::Avatar(avatar) => conn.execute(
            "UPDATE users SET avatar = ?1, updated_at = ?2 WHERE hex = ?3",
            params![avatar, now, hex],
        )?,
        UserField::Status(status) => conn.execute(
            "UPDATE users SET status = ?1, updated_at = ?2 WHERE hex = ?3",
            params![status_to_str(status), now, hex],
        )?,
        UserField::Verified(verified) => conn.execute(
            "UPDATE users SET verified = ?1, updated_at = ?2 WHERE hex = ?3",
            params![verified, now, hex],
        )?,
    };
    if rows == 0 {
        return Err(DbError::NotFound(format!("user `{hex}`")));
    }
    Ok(())
}

/// Deletes a user record.
pub fn delete(conn: &Connection, hex: &str) -> Result<()> {
    let rows = conn.execute("DELETE FROM users WHERE hex = ?1", [hex])?;
    if rows == 0 {
        return Err(DbError::NotFound(format!("user `{hex}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hex: &str) -> User {
        User {
            hex: hex.to_string(),
            name: "Alice".to_string(),
            avatar: None,
            verified: false,
            status: UserStatus::Active,
            keys: KeyEnvelope {
                public_key: "pub".to_string(),
                encrypted_private_key: "enc".to_string(),
                private_key_nonce: "nonce".to_string(),
                passcode_salt: "salt".to_string(),
            },
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn create_and_find_round_trip() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &sample("u1")).expect("create");

        let user = find_by_hex(&conn, "u1").expect("find");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn create_rejects_duplicate_hex() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &sample("u1")).expect("create");
        let err = create(&conn, &sample("u1")).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn find_missing_user_returns_not_found() {
        let conn = crate::open_memory().expect("open");
        let err = find_by_hex(&conn, "ghost").unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn update_field_changes_name() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &sample("u1")).expect("create");
        update_field(&conn, &"u1".to_string(), UserField::Name("Ada".to_string()), 2000).expect("update");

        let user = find_by_hex(&conn, "u1").expect("find");
        assert_eq!(user.name, "Ada");
        assert_eq!(user.updated_at, 2000);
    }

    #[test]
    fn delete_removes_user() {
        let conn = crate::open_memory().expect("open");
        create(&conn, &sample("u1")).expect("create");
        delete(&conn, "u1").expect("delete");
        assert!(matches!(find_by_hex(&conn, "u1"), Err(DbError::NotFound(_))));
    }
}
