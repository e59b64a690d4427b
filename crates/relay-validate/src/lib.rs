//! # relay-validate
//!
//! Schema-driven structural validation and sanitisation of incoming frames
//! (Section 4.3). Schemas are declared as data — a `const` slice of
//! [`Field`] — so the dispatcher has one `validate` entrypoint for every
//! frame shape instead of one hand-written check per handler.
//!
//! On the first violation, validation fails with a message naming the field
//! and the constraint that broke. On success every string value has been
//! HTML-escaped in place.

use relay_types::frame::{NewMessagePayload, ReactionPayload, RemovePayload, StatusPayload, UpdatePayload};
use serde_json::Value;

/// The kind of a schema field, per Section 4.3.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Boolean,
    Enum(&'static [&'static str]),
    Array,
    /// `{encrypted: non-empty string, nonce: non-empty string}`.
    Content,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    pub max_length: Option<usize>,
    pub min_length: Option<usize>,
}

impl Field {
    const fn new(name: &'static str, required: bool, kind: FieldKind) -> Self {
        Field { name, required, kind, max_length: None, min_length: None }
    }

    const fn with_max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }
}

/// A named collection of fields the validator checks a JSON object against.
pub type Schema = &'static [Field];

/// Schema for the `new` (and, with `parent` added, `reply`) dispatcher frame.
pub const NEW_MESSAGE_SCHEMA: Schema = &[
    Field::new("conversation", true, FieldKind::String).with_max_length(64),
    Field::new("kind", true, FieldKind::Enum(&["message", "reply", "forward"])),
    Field::new("type", true, FieldKind::Enum(&["all", "audio"])),
    Field::new("user", true, FieldKind::String).with_max_length(64),
    Field::new("recipientContent", true, FieldKind::Content),
    Field::new("senderContent", true, FieldKind::Content),
    Field::new("status", true, FieldKind::Enum(&["sent", "delivered", "read"])),
    Field::new("attachments", false, FieldKind::Array),
    Field::new("images", false, FieldKind::Array),
    Field::new("videos", false, FieldKind::Array),
    Field::new("reactions", false, FieldKind::Array),
    Field::new("audio", false, FieldKind::String),
];

/// `new` schema plus a required `parent` (Section 4.3).
pub const REPLY_SCHEMA: Schema = &[
    Field::new("conversation", true, FieldKind::String).with_max_length(64),
    Field::new("kind", true, FieldKind::Enum(&["message", "reply", "forward"])),
    Field::new("type", true, FieldKind::Enum(&["all", "audio"])),
    Field::new("user", true, FieldKind::String).with_max_length(64),
    Field::new("recipientContent", true, FieldKind::Content),
    Field::new("senderContent", true, FieldKind::Content),
    Field::new("status", true, FieldKind::Enum(&["sent", "delivered", "read"])),
    Field::new("parent", true, FieldKind::String).with_max_length(64),
    Field::new("attachments", false, FieldKind::Array),
    Field::new("images", false, FieldKind::Array),
    Field::new("videos", false, FieldKind::Array),
    Field::new("reactions", false, FieldKind::Array),
    Field::new("audio", false, FieldKind::String),
];

/// Content-edit schema (Section 4.3).
pub const CONTENT_EDIT_SCHEMA: Schema = &[
    Field::new("senderContent", true, FieldKind::Content),
    Field::new("recipientContent", true, FieldKind::Content),
];

#[derive(Debug, thiserror::Error)]
#[error("field `{field}`: {constraint}")]
pub struct ValidationError {
    pub field: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: &str, constraint: impl Into<String>) -> Self {
        ValidationError { field: field.to_string(), constraint: constraint.into() }
    }
}

/// HTML-escapes `& < > " '` in `s`.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn validate_content(field: &str, value: &Value) -> Result<(), ValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::new(field, "must be an object"))?;
    for key in ["encrypted", "nonce"] {
        let s = obj
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::new(field, format!("`{key}` must be a non-empty string")))?;
        if s.is_empty() {
            return Err(ValidationError::new(field, format!("`{key}` must be non-empty")));
        }
    }
    Ok(())
}

/// Validates and sanitises `value` (a JSON object) in place against
/// `schema`. Fails on the first violation.
pub fn validate(schema: Schema, value: &mut Value) -> Result<(), ValidationError> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| ValidationError::new("<root>", "must be an object"))?;

    for field in schema {
        let entry = obj.get_mut(field.name);
        let present = entry.as_ref().map(|v| !v.is_null()).unwrap_or(false);

        if field.required && !present {
            return Err(ValidationError::new(field.name, "is required"));
        }
        let Some(v) = entry else { continue };
        if v.is_null() {
            continue;
        }

        match field.kind {
            FieldKind::String => {
                let s = v
                    .as_str()
                    .ok_or_else(|| ValidationError::new(field.name, "must be a string"))?;
                if let Some(max) = field.max_length {
                    if s.len() > max {
                        return Err(ValidationError::new(field.name, format!("exceeds maxLength {max}")));
                    }
                }
                if let Some(min) = field.min_length {
                    if s.len() < min {
                        return Err(ValidationError::new(field.name, format!("below minLength {min}")));
                    }
                }
                *v = Value::String(html_escape(s));
            }
            FieldKind::Boolean => {
                if !v.is_boolean() {
                    return Err(ValidationError::new(field.name, "must be a boolean"));
                }
            }
            FieldKind::Enum(allowed) => {
                let s = v
                    .as_str()
                    .ok_or_else(|| ValidationError::new(field.name, "must be a string"))?;
                if !allowed.contains(&s) {
                    return Err(ValidationError::new(field.name, format!("must be one of {allowed:?}")));
                }
            }
            FieldKind::Array => {
                if !v.is_array() {
                    return Err(ValidationError::new(field.name, "must be an array"));
                }
                if let Some(max) = field.max_length {
                    if v.as_array().map(|a| a.len()).unwrap_or(0) > max {
                        return Err(ValidationError::new(field.name, format!("exceeds maxLength {max}")));
                    }
                }
            }
            FieldKind::Content => validate_content(field.name, v)?,
        }
    }

    Ok(())
}

/// Validates a `new` frame payload and returns the concrete, sanitised
/// variant (Section 9, "duck-typed frame shapes" → "a tagged variant").
pub fn validate_new_message(mut value: Value) -> Result<NewMessagePayload, ValidationError> {
    validate(NEW_MESSAGE_SCHEMA, &mut value)?;
    serde_json::from_value(value).map_err(|e| ValidationError::new("<root>", e.to_string()))
}

/// Validates a `reply` frame payload.
pub fn validate_reply(mut value: Value) -> Result<NewMessagePayload, ValidationError> {
    validate(REPLY_SCHEMA, &mut value)?;
    serde_json::from_value(value).map_err(|e| ValidationError::new("<root>", e.to_string()))
}

/// Validates a content-edit (`update`) frame payload.
pub fn validate_content_edit(mut value: Value) -> Result<UpdatePayload, ValidationError> {
    validate(CONTENT_EDIT_SCHEMA, &mut value)?;
    serde_json::from_value(value).map_err(|e| ValidationError::new("<root>", e.to_string()))
}

/// `status` and `reaction` frames are small enough not to need the
/// declarative schema machinery; they're decoded directly and the
/// dispatcher relies on the repository's own invariants (monotonic status,
/// reaction enum) to reject what JSON typing can't catch.
pub fn decode_status(value: Value) -> Result<StatusPayload, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::new("status", e.to_string()))
}

pub fn decode_reaction(value: Value) -> Result<ReactionPayload, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::new("reaction", e.to_string()))
}

pub fn decode_remove(value: Value) -> Result<RemovePayload, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::new("remove", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_well_formed_new_message() {
        let mut v = json!({
            "conversation": "h1",
            "kind": "message",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "E1", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        validate(NEW_MESSAGE_SCHEMA, &mut v).expect("valid");
    }

    #[test]
    fn rejects_missing_required_field() {
        let mut v = json!({
            "kind": "message",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "E1", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        let err = validate(NEW_MESSAGE_SCHEMA, &mut v).unwrap_err();
        assert_eq!(err.field, "conversation");
    }

    #[test]
    fn rejects_bad_enum_value() {
        let mut v = json!({
            "conversation": "h1",
            "kind": "bogus",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "E1", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        let err = validate(NEW_MESSAGE_SCHEMA, &mut v).unwrap_err();
        assert_eq!(err.field, "kind");
    }

    #[test]
    fn rejects_empty_content_envelope() {
        let mut v = json!({
            "conversation": "h1",
            "kind": "message",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        let err = validate(NEW_MESSAGE_SCHEMA, &mut v).unwrap_err();
        assert_eq!(err.field, "recipientContent");
    }

    #[test]
    fn escapes_html_in_strings() {
        let mut v = json!({
            "conversation": "<script>h1</script>",
            "kind": "message",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "E1", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        validate(NEW_MESSAGE_SCHEMA, &mut v).expect("valid");
        assert_eq!(v["conversation"], "&lt;script&gt;h1&lt;/script&gt;");
    }

    #[test]
    fn requires_parent_for_reply_schema() {
        let mut v = json!({
            "conversation": "h1",
            "kind": "reply",
            "type": "all",
            "user": "u1",
            "recipientContent": {"encrypted": "E1", "nonce": "N1"},
            "senderContent": {"encrypted": "E2", "nonce": "N2"},
            "status": "sent",
        });
        let err = validate(REPLY_SCHEMA, &mut v).unwrap_err();
        assert_eq!(err.field, "parent");
    }

    #[test]
    fn decode_remove_reads_id_and_user() {
        let v = json!({"id": "m1", "user": "u1"});
        let payload = decode_remove(v).expect("decode");
        assert_eq!(payload.id, "m1");
        assert_eq!(payload.user, "u1");
    }
}
