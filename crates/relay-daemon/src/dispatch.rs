//! Message dispatcher (Section 4.8, C8).
//!
//! One `async fn` handler per inbound frame kind, each taking the shared
//! state, the sending principal, and the already-decoded payload, and
//! returning `Result<(), AppError>` — the outer `dispatch` match turns
//! `Err` into the single-recipient `error` frame (Section 4.8, closing
//! paragraph) and `Ok` into no reply at all, since success is communicated
//! by publish + enqueue, not by a response frame.

use std::sync::Arc;

use async_trait::async_trait;
use relay_types::message::{Message, MessageKind, ReplyPreview};
use relay_types::{now_ms, Frame, FrameKind, Hex, OutboundFrame, Principal};

use crate::error::AppError;
use crate::state::AppState;

pub struct MessageDispatcher {
    state: Arc<AppState>,
}

impl MessageDispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        MessageDispatcher { state }
    }
}

#[async_trait]
impl relay_hub::Dispatcher for MessageDispatcher {
    async fn dispatch(&self, sender: &Principal, conversation: &Hex, frame: Frame) -> Option<OutboundFrame> {
        tracing::debug!(conversation = %conversation, user = %sender.hex, kind = ?frame.kind, "dispatching frame");

        let frame_kind = frame.kind;
        let frame_id = frame.message.get("id").and_then(|v| v.as_str()).map(ToOwned::to_owned);

        let result = match frame.kind {
            FrameKind::New => handle_new(&self.state, conversation, frame.message, MessageKind::Message).await,
            FrameKind::Reply => handle_new(&self.state, conversation, frame.message, MessageKind::Reply).await,
            FrameKind::Status => handle_status(&self.state, conversation, frame.message).await,
            FrameKind::Reaction => handle_reaction(&self.state, conversation, frame.message).await,
            FrameKind::Update => handle_update(&self.state, conversation, frame.message).await,
            FrameKind::Remove => handle_remove(&self.state, conversation, frame.message).await,
            FrameKind::Forward => Err(AppError::from(relay_types::CoreError::Invariant("forward is not implemented".to_string()))),
            FrameKind::System | FrameKind::Error => {
                tracing::warn!(kind = ?frame.kind, "dropping inbound frame with an outbound-only kind");
                Ok(())
            }
        };

        match result {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e.core(), conversation = %conversation, user = %sender.hex, "dispatch failed");
                Some(e.to_outbound_frame(frame_kind, frame_id))
            }
        }
    }
}

async fn participants_of(state: &AppState, conversation: &Hex) -> Result<Vec<Hex>, AppError> {
    let conn = state.db.lock().await;
    let conv = relay_db::queries::conversations::find_by_hex(&conn, conversation)?;
    Ok(conv.participants.into_iter().map(|p| p.user).collect())
}

async fn publish_and_enqueue(
    state: &AppState,
    conversation: &Hex,
    kind: FrameKind,
    message: serde_json::Value,
) -> Result<(), AppError> {
    state.channels.publish(conversation, OutboundFrame::new(kind, message.clone()));

    let to = participants_of(state, conversation).await?;
    let job = relay_queue::Job::new(to, conversation.clone(), relay_queue::JobData { kind, message });
    state.queue.enqueue(job).await?;
    Ok(())
}

async fn handle_new(
    state: &AppState,
    conversation: &Hex,
    payload: serde_json::Value,
    kind: MessageKind,
) -> Result<(), AppError> {
    let payload = match kind {
        MessageKind::Reply => relay_validate::validate_reply(payload)?,
        _ => relay_validate::validate_new_message(payload)?,
    };

    let reply = if kind == MessageKind::Reply {
        let parent_id = payload
            .parent
            .as_ref()
            .ok_or_else(|| AppError::from(relay_types::CoreError::Validation("parent is required for a reply".to_string())))?;
        let conn = state.db.lock().await;
        let parent = relay_db::queries::messages::find_by_id(&conn, parent_id).map_err(|e| match e {
            relay_db::DbError::NotFound(_) => AppError::from(relay_types::CoreError::NotFound("parent message not found".to_string())),
            other => AppError::from(other),
        })?;
        Some(ReplyPreview { recipient_content: parent.sender_content, sender_content: parent.recipient_content })
    } else {
        None
    };

    let now = now_ms();
    let msg = Message {
        id: relay_crypto::generate_hex(relay_types::DEFAULT_ID_BYTES),
        conversation: conversation.clone(),
        kind,
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

    {
        let conn = state.db.lock().await;
        relay_db::queries::messages::insert(&conn, &msg)?;
    }

    let frame_kind = match kind {
        MessageKind::Reply => FrameKind::Reply,
        _ => FrameKind::New,
    };
    let body = serde_json::to_value(&msg).map_err(|e| AppError::from(relay_types::CoreError::Backend(e.to_string())))?;
    publish_and_enqueue(state, conversation, frame_kind, body).await
}

async fn handle_status(state: &AppState, conversation: &Hex, payload: serde_json::Value) -> Result<(), AppError> {
    let payload = relay_validate::decode_status(payload)?;
    let now = now_ms();
    let msg = {
        let conn = state.db.lock().await;
        relay_db::queries::messages::update_status(&conn, &payload.id, payload.status, now).map_err(|e| match e {
            relay_db::DbError::Constraint(msg) => AppError::from(relay_types::CoreError::Invariant(msg)),
            other => AppError::from(other),
        })?
    };

    let body = serde_json::json!({ "_id": msg.id, "conversation": msg.conversation, "status": msg.status });
    publish_and_enqueue(state, conversation, FrameKind::Status, body).await
}

async fn handle_reaction(state: &AppState, conversation: &Hex, payload: serde_json::Value) -> Result<(), AppError> {
    let payload = relay_validate::decode_reaction(payload)?;
    let now = now_ms();

    let msg = {
        let conn = state.db.lock().await;
        let current = relay_db::queries::messages::find_by_id(&conn, &payload.id)?;
        let slot = if payload.user == current.user {
            relay_db::queries::messages::ReactionSlot::From
        } else {
            relay_db::queries::messages::ReactionSlot::To
        };
        relay_db::queries::messages::update_reactions(&conn, &payload.id, slot, payload.reaction, now)?
    };

    let body = serde_json::json!({ "_id": msg.id, "conversation": msg.conversation, "reactions": msg.reactions });
    publish_and_enqueue(state, conversation, FrameKind::Reaction, body).await
}

async fn handle_update(state: &AppState, conversation: &Hex, payload: serde_json::Value) -> Result<(), AppError> {
    let payload = relay_validate::validate_content_edit(payload)?;
    let now = now_ms();
    let msg = {
        let conn = state.db.lock().await;
        relay_db::queries::messages::update_contents(&conn, &payload.id, &payload.sender_content, &payload.recipient_content, now)?
    };

    let body = serde_json::to_value(&msg).map_err(|e| AppError::from(relay_types::CoreError::Backend(e.to_string())))?;
    publish_and_enqueue(state, conversation, FrameKind::Update, body).await
}

async fn handle_remove(state: &AppState, conversation: &Hex, payload: serde_json::Value) -> Result<(), AppError> {
    let payload = relay_validate::decode_remove(payload)?;
    let now = now_ms();
    {
        let conn = state.db.lock().await;
        relay_db::queries::messages::delete(&conn, &payload.id, &payload.user, now).map_err(|e| match e {
            relay_db::DbError::Constraint(msg) => AppError::from(relay_types::CoreError::Invariant(msg)),
            other => AppError::from(other),
        })?;
    }

    let body = serde_json::json!({ "_id": payload.id, "conversation": conversation });
    publish_and_enqueue(state, conversation, FrameKind::Remove, body).await
}
