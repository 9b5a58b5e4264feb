//! Support ticket routes
//!
//! Tickets are opened by customers directly or escalated from an assistant
//! conversation, and triaged by admins.

use std::str::FromStr;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use supportdesk_shared::{SupportTicket, TicketPriority, TicketStatus};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    relay::{events::ServerEvent, RelayState},
    state::AppState,
};

/// Longest subject a customer may supply
pub const MAX_SUBJECT_LENGTH: usize = 200;
/// Longest ticket body
pub const MAX_TICKET_MESSAGE_LENGTH: usize = 20_000;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    #[serde(alias = "description")]
    pub message: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Serialize)]
pub struct TicketsListResponse {
    pub tickets: Vec<SupportTicket>,
}

/// Ticket about to be inserted
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: Uuid,
    pub subject: String,
    pub message: String,
    pub bot_response: Option<String>,
    pub priority: TicketPriority,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Trim and length-check a customer supplied subject and body
pub fn validate_ticket_input(subject: &str, message: &str) -> ApiResult<(String, String)> {
    let subject = subject.trim();
    let message = message.trim();

    if subject.is_empty() {
        return Err(ApiError::BadRequest("Subject cannot be empty".into()));
    }
    if subject.chars().count() > MAX_SUBJECT_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Subject too long (max {} characters)",
            MAX_SUBJECT_LENGTH
        )));
    }
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if message.chars().count() > MAX_TICKET_MESSAGE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {} characters)",
            MAX_TICKET_MESSAGE_LENGTH
        )));
    }

    Ok((subject.to_string(), message.to_string()))
}

/// Parse the optional `status` query filter
fn parse_status_filter(status: Option<&str>) -> ApiResult<Option<TicketStatus>> {
    status
        .filter(|s| !s.trim().is_empty())
        .map(|s| TicketStatus::from_str(s.trim()).map_err(ApiError::BadRequest))
        .transpose()
}

fn list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Insert a ticket with status `open`
pub async fn insert_ticket(pool: &PgPool, ticket: &NewTicket) -> Result<SupportTicket, sqlx::Error> {
    let created: SupportTicket = sqlx::query_as(
        r#"
        INSERT INTO support_tickets (id, user_id, subject, message, bot_response, status, priority)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, subject, message, bot_response, status, priority,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ticket.user_id)
    .bind(&ticket.subject)
    .bind(&ticket.message)
    .bind(&ticket.bot_response)
    .bind(TicketStatus::Open.as_str())
    .bind(ticket.priority.as_str())
    .fetch_one(pool)
    .await?;

    tracing::info!(
        ticket_id = %created.id,
        user_id = %ticket.user_id,
        priority = %created.priority,
        escalated = ticket.bot_response.is_some(),
        "Support ticket created"
    );

    Ok(created)
}

/// Tell admin dashboards watching the relay about a new ticket
pub async fn announce_ticket(relay: &RelayState, ticket: &SupportTicket) {
    let recipients = relay
        .broadcast_to_admins(ServerEvent::TicketCreated {
            ticket_id: ticket.id,
            subject: ticket.subject.clone(),
            priority: ticket.priority.clone(),
        })
        .await;

    tracing::debug!(ticket_id = %ticket.id, recipients, "Announced ticket on relay");
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a support ticket for the caller
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<SupportTicket>)> {
    let (subject, message) = validate_ticket_input(&req.subject, &req.message)?;

    let ticket = insert_ticket(
        &state.pool,
        &NewTicket {
            user_id: auth_user.user_id,
            subject,
            message,
            bot_response: None,
            priority: req.priority,
        },
    )
    .await?;

    announce_ticket(&state.relay, &ticket).await;

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// List the caller's own tickets, newest first
pub async fn list_my_tickets(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<TicketsListResponse>> {
    let status = parse_status_filter(query.status.as_deref())?;

    let tickets: Vec<SupportTicket> = sqlx::query_as(
        r#"
        SELECT id, user_id, subject, message, bot_response, status, priority,
               created_at, updated_at
        FROM support_tickets
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(auth_user.user_id)
    .bind(status.map(|s| s.as_str()))
    .bind(list_limit(query.limit))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(TicketsListResponse { tickets }))
}

/// List every ticket (admin only)
pub async fn admin_list_tickets(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Json<TicketsListResponse>> {
    auth_user.require_admin()?;
    let status = parse_status_filter(query.status.as_deref())?;

    let tickets: Vec<SupportTicket> = sqlx::query_as(
        r#"
        SELECT id, user_id, subject, message, bot_response, status, priority,
               created_at, updated_at
        FROM support_tickets
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(list_limit(query.limit))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(TicketsListResponse { tickets }))
}

/// Change a ticket's status and/or priority (admin only)
pub async fn admin_update_ticket(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> ApiResult<Json<SupportTicket>> {
    auth_user.require_admin()?;

    if req.status.is_none() && req.priority.is_none() {
        return Err(ApiError::BadRequest(
            "Provide a status or priority to update".into(),
        ));
    }

    let ticket: SupportTicket = sqlx::query_as(
        r#"
        UPDATE support_tickets
        SET status = COALESCE($2, status),
            priority = COALESCE($3, priority),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, user_id, subject, message, bot_response, status, priority,
                  created_at, updated_at
        "#,
    )
    .bind(ticket_id)
    .bind(req.status.map(|s| s.as_str()))
    .bind(req.priority.map(|p| p.as_str()))
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound)?;

    tracing::info!(
        ticket_id = %ticket_id,
        admin_id = %auth_user.user_id,
        status = %ticket.status,
        priority = %ticket.priority,
        "Support ticket updated"
    );

    Ok(Json(ticket))
}
