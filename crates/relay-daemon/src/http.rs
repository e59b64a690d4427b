//! The `/api/v1` HTTP surface (Section 6, "HTTP surface").
//!
//! Every handler returns `Result<impl IntoResponse, AppError>`; `AppError`'s
//! `IntoResponse` impl takes care of the `{success: false, error}` envelope
//! and status-code mapping on failure, so handlers only build the success
//! envelope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use relay_db::queries::users::UserField;
use serde::Deserialize;
use serde_json::json;

use relay_types::conversation::ConversationFilter;
use relay_types::user::{KeyEnvelope, User, UserStatus};
use relay_types::{now_ms, Hex, Principal};

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/user/add", put(add_user))
        .route("/api/v1/user/retrieve", get(retrieve_user))
        .route("/api/v1/user/edit/:field", patch(edit_user))
        .route("/api/v1/user/remove", delete(remove_user))
        .route("/api/v1/conversation/add", put(add_conversation))
        .route("/api/v1/conversations/all", get(list_all))
        .route("/api/v1/conversations/requested", get(list_requested))
        .route("/api/v1/conversations/trusted", get(list_trusted))
        .route("/api/v1/conversations/unread", get(list_unread))
        .route("/api/v1/conversations/pins", get(list_pins))
        .route("/api/v1/conversations/stats", get(stats))
        .route("/api/v1/conversation/one", post(one_conversation))
        .route("/api/v1/conversation/:hex/pin", patch(pin_conversation))
        .route("/api/v1/conversation/:hex/unpin", patch(unpin_conversation))
        .route("/api/v1/conversation/:hex/accept", patch(accept_conversation))
        .route("/api/v1/conversation/:hex/messages", get(conversation_messages))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    let conn = state.db.lock().await;
    conn.query_row("SELECT 1", [], |_| Ok(())).map_err(relay_db::DbError::from)?;
    Ok(Json(json!({ "success": true })))
}

fn authenticate(state: &AppState, jar: &CookieJar) -> Result<Principal, AppError> {
    let header = jar
        .get(state.tokens.cookie_name())
        .map(|c| format!("{}={}", c.name(), c.value()));
    state
        .tokens
        .authenticate(header.as_deref())
        .map_err(|_| AppError::from(relay_types::CoreError::Unauthenticated))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

// ---- user ----

#[derive(Debug, Deserialize)]
struct AddUserBody {
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "encryptedPrivateKey")]
    encrypted_private_key: String,
    #[serde(rename = "privateKeyNonce")]
    private_key_nonce: String,
    #[serde(rename = "passcodeSalt")]
    passcode_salt: String,
}

async fn add_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<AddUserBody>,
) -> Result<impl IntoResponse, AppError> {
    let now = now_ms();
    let user = User {
        hex: relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES),
        name: String::new(),
        avatar: None,
        verified: false,
        status: UserStatus::Active,
        keys: KeyEnvelope {
            public_key: body.public_key,
            encrypted_private_key: body.encrypted_private_key,
            private_key_nonce: body.private_key_nonce,
            passcode_salt: body.passcode_salt,
        },
        created_at: now,
        updated_at: now,
    };

    {
        let conn = state.db.lock().await;
        relay_db::queries::users::create(&conn, &user)?;
    }

    let principal = Principal::from(&user);
    let ttl = state.config.jwt_expires_in_secs().map_err(|e| AppError::from(relay_types::CoreError::Backend(e.to_string())))?;
    let token = state
        .tokens
        .issue(&principal, ttl, now / 1000)
        .map_err(|_| AppError::from(relay_types::CoreError::Backend("failed to sign session token".to_string())))?;

    let mut cookie = Cookie::new(state.tokens.cookie_name().to_string(), token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");

    Ok((StatusCode::CREATED, jar.add(cookie), Json(json!({ "success": true, "user": user.hex }))))
}

async fn retrieve_user(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let user = {
        let conn = state.db.lock().await;
        relay_db::queries::users::find_by_hex(&conn, &principal.hex)?
    };
    Ok(Json(json!({ "success": true, "keys": user.keys })))
}

fn body_field(body: &serde_json::Value, field: &str) -> Result<serde_json::Value, AppError> {
    body.get(field)
        .cloned()
        .ok_or_else(|| AppError::from(relay_validate::ValidationError::new(field, "is required")))
}

fn parse_field<T: serde::de::DeserializeOwned>(body: &serde_json::Value, field: &str) -> Result<T, AppError> {
    serde_json::from_value(body_field(body, field)?).map_err(|e| AppError::from(relay_validate::ValidationError::new(field, e.to_string())))
}

async fn edit_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(field): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let now = now_ms();
    let conn = state.db.lock().await;

    match field.as_str() {
        "keys" => {
            let public_key: String = parse_field(&body, "publicKey")?;
            let encrypted_private_key: String = parse_field(&body, "encryptedPrivateKey")?;
            let private_key_nonce: String = parse_field(&body, "privateKeyNonce")?;
            let passcode_salt: String = parse_field(&body, "passcodeSalt")?;
            relay_db::queries::users::update_public_keys(
                &conn,
                &principal.hex,
                &public_key,
                &encrypted_private_key,
                &private_key_nonce,
                &passcode_salt,
                now,
            )?;
        }
        "status" => {
            let status: UserStatus = parse_field(&body, "status")?;
            relay_db::queries::users::update_field(&conn, &principal.hex, UserField::Status(status), now)?;
        }
        "avatar" => {
            let avatar: Option<String> = parse_field(&body, "avatar")?;
            relay_db::queries::users::update_field(&conn, &principal.hex, UserField::Avatar(avatar), now)?;
        }
        "verification" => {
            let verified: bool = parse_field(&body, "verified")?;
            relay_db::queries::users::update_field(&conn, &principal.hex, UserField::Verified(verified), now)?;
        }
        "name" => {
            let name: String = parse_field(&body, "name")?;
            relay_db::queries::users::update_field(&conn, &principal.hex, UserField::Name(name), now)?;
        }
        other => {
            return Err(AppError::from(relay_types::CoreError::Validation(format!("unknown field `{other}`"))));
        }
    }

    Ok(Json(json!({ "success": true })))
}

async fn remove_user(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let conn = state.db.lock().await;
    relay_db::queries::users::delete(&conn, &principal.hex)?;
    Ok(Json(json!({ "success": true })))
}

// ---- conversations ----

#[derive(Debug, Deserialize)]
struct ConversationParticipant {
    hex: Hex,
}

#[derive(Debug, Deserialize)]
struct AddConversationBody {
    participants: Vec<ConversationParticipant>,
}

async fn add_conversation(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<AddConversationBody>,
) -> Result<impl IntoResponse, AppError> {
    let principal = authenticate(&state, &jar)?;
    if body.participants.len() != 2 {
        return Err(AppError::from(relay_types::CoreError::Validation(
            "participants must name exactly two users".to_string(),
        )));
    }
    let pair = [body.participants[0].hex.clone(), body.participants[1].hex.clone()];

    let now = now_ms();
    let hex = relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES);
    let conn = state.db.lock().await;
    let conv = relay_db::queries::conversations::create(&conn, &hex, &pair, &principal.hex, now).map_err(|e| match e {
        relay_db::DbError::Constraint(_) => AppError::from(relay_types::CoreError::Conflict(
            "a conversation already exists for this participant pair".to_string(),
        )),
        other => AppError::from(other),
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "conversation": conv }))))
}

async fn list_all(state: State<Arc<AppState>>, jar: CookieJar, q: Query<PageQuery>) -> Result<Json<serde_json::Value>, AppError> {
    list(state, jar, q, ConversationFilter::All).await
}

async fn list_requested(state: State<Arc<AppState>>, jar: CookieJar, q: Query<PageQuery>) -> Result<Json<serde_json::Value>, AppError> {
    list(state, jar, q, ConversationFilter::Requested).await
}

async fn list_trusted(state: State<Arc<AppState>>, jar: CookieJar, q: Query<PageQuery>) -> Result<Json<serde_json::Value>, AppError> {
    list(state, jar, q, ConversationFilter::Trusted).await
}

async fn list_unread(state: State<Arc<AppState>>, jar: CookieJar, q: Query<PageQuery>) -> Result<Json<serde_json::Value>, AppError> {
    list(state, jar, q, ConversationFilter::TrustedUnread).await
}

async fn list_pins(state: State<Arc<AppState>>, jar: CookieJar, q: Query<PageQuery>) -> Result<Json<serde_json::Value>, AppError> {
    list(state, jar, q, ConversationFilter::PinnedBy).await
}

async fn list(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(q): Query<PageQuery>,
    filter: ConversationFilter,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let page = q.page.unwrap_or(1);
    let conn = state.db.lock().await;
    let conversations =
        relay_db::queries::conversations::list_for_user(&conn, &principal.hex, filter, page, state.config.chat_per_page)?;
    Ok(Json(json!({ "success": true, "conversations": conversations, "page": page })))
}

async fn stats(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let conn = state.db.lock().await;
    let counts = relay_db::queries::conversations::counts(&conn, &principal.hex)?;
    Ok(Json(json!({ "success": true, "total": counts.total, "unread": counts.unread, "requested": counts.requested })))
}

#[derive(Debug, Deserialize)]
struct OneConversationBody {
    other: Hex,
}

async fn one_conversation(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<OneConversationBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let conn = state.db.lock().await;
    let conv = relay_db::queries::conversations::find_for_pair(&conn, &principal.hex, &body.other)?;
    Ok(Json(json!({ "success": true, "conversation": conv })))
}

async fn pin_conversation(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(hex): Path<Hex>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let now = now_ms();
    let conn = state.db.lock().await;
    relay_db::queries::conversations::pin(&conn, &hex, &principal.hex, state.config.chat_max_pins, now).map_err(|e| match e {
        relay_db::DbError::Constraint(msg) => AppError::from(relay_types::CoreError::Invariant(msg)),
        other => AppError::from(other),
    })?;
    Ok(Json(json!({ "success": true })))
}

async fn unpin_conversation(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(hex): Path<Hex>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let conn = state.db.lock().await;
    relay_db::queries::conversations::unpin(&conn, &hex, &principal.hex)?;
    Ok(Json(json!({ "success": true })))
}

async fn accept_conversation(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(hex): Path<Hex>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let now = now_ms();
    let conn = state.db.lock().await;
    relay_db::queries::conversations::accept(&conn, &hex, &principal.hex, now).map_err(|e| match e {
        relay_db::DbError::Constraint(msg) => AppError::from(relay_types::CoreError::Invariant(msg)),
        other => AppError::from(other),
    })?;
    Ok(Json(json!({ "success": true })))
}

async fn conversation_messages(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(hex): Path<Hex>,
    Query(q): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let principal = authenticate(&state, &jar)?;
    let conn = state.db.lock().await;
    let conv = relay_db::queries::conversations::find_by_hex(&conn, &hex)?;
    if !conv.is_participant(&principal.hex) {
        return Err(AppError::from(relay_types::CoreError::Forbidden("not a participant of this conversation".to_string())));
    }

    let page = q.page.unwrap_or(1);
    let messages = relay_db::queries::messages::page(&conn, &hex, page, state.config.chat_history)?;
    Ok(Json(json!({ "success": true, "messages": messages, "page": page })))
}
