//! Assistant chat route

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use supportdesk_shared::TicketPriority;
use uuid::Uuid;

use super::tickets::{announce_ticket, insert_ticket, NewTicket, MAX_TICKET_MESSAGE_LENGTH};
use crate::{
    assistant::{conversation::user_messages, ConversationTurn, MAX_SUBJECT_CHARS},
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Most turns of a conversation sent to the model
pub const MAX_CONVERSATION_TURNS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "history")]
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub needs_ticket: bool,
    pub subject: Option<String>,
    /// Set when a ticket was opened for the caller
    pub ticket_id: Option<Uuid>,
}

/// Ticket body: the customer's side of the conversation
pub fn ticket_body(history: &[ConversationTurn]) -> String {
    let body = user_messages(history).collect::<Vec<_>>().join("\n\n");
    body.chars().take(MAX_TICKET_MESSAGE_LENGTH).collect()
}

/// Answer a conversation, escalating it to a ticket when needed
///
/// Anonymous callers get the same reply, but a ticket is only opened for an
/// authenticated caller.
pub async fn chat(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if user_messages(&req.messages).next().is_none() {
        return Err(ApiError::BadRequest(
            "At least one user message is required".into(),
        ));
    }

    let start = req.messages.len().saturating_sub(MAX_CONVERSATION_TURNS);
    let history = &req.messages[start..];

    let reply = state.responder.respond(history).await;

    let mut ticket_id = None;
    if reply.needs_ticket {
        match auth_user {
            Some(Extension(user)) => {
                let subject = reply
                    .subject
                    .clone()
                    .unwrap_or_else(|| crate::assistant::fallback::fallback_subject(history));
                let ticket = NewTicket {
                    user_id: user.user_id,
                    subject: subject.chars().take(MAX_SUBJECT_CHARS).collect(),
                    message: ticket_body(history),
                    bot_response: Some(reply.response.clone()),
                    priority: TicketPriority::Medium,
                };

                // The reply still goes out if the ticket can't be stored
                match insert_ticket(&state.pool, &ticket).await {
                    Ok(created) => {
                        announce_ticket(&state.relay, &created).await;
                        ticket_id = Some(created.id);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, user_id = %user.user_id, "Failed to create escalated ticket");
                    }
                }
            }
            None => {
                tracing::debug!("Escalation suggested for anonymous chat, no ticket created");
            }
        }
    }

    Ok(Json(ChatResponse {
        response: reply.response,
        needs_ticket: reply.needs_ticket,
        subject: reply.subject,
        ticket_id,
    }))
}
