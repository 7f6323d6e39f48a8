//! Ticket chat messages.
//!
//! Messages are append-only: there is no update or delete operation. Clients
//! approximate real-time delivery by polling the listing endpoint (see the
//! `feed` module for the client side of that contract).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{User, UserResponse};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::schema::{ticket_messages, tickets, users};
use crate::core::shared::state::AppState;
use crate::response::{self, ApiError};
use crate::validation::{self, ValidationErrors};

use super::{access, Ticket};

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = ticket_messages)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub message: TicketMessage,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub message: Option<String>,
}

fn load_ticket(conn: &mut PgConnection, id: Uuid) -> Result<Ticket, ApiError> {
    tickets::table
        .find(id)
        .first(conn)
        .optional()
        .map_err(|e| response::server_error("Failed to load ticket", e))?
        .ok_or_else(|| response::not_found("Ticket"))
}

/// GET /api/tickets/:id/messages - full list, oldest first.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let ticket = load_ticket(&mut conn, ticket_id)?;
    if !access::can_access_ticket_messages(&user.caller(), &ticket) {
        return Err(response::forbidden());
    }

    let rows: Vec<(TicketMessage, User)> = ticket_messages::table
        .inner_join(users::table)
        .filter(ticket_messages::ticket_id.eq(ticket_id))
        .order(ticket_messages::created_at.asc())
        .load(&mut conn)
        .map_err(|e| response::server_error("Failed to list messages", e))?;

    let body = rows
        .into_iter()
        .map(|(message, sender)| MessageResponse {
            message,
            user: sender.into(),
        })
        .collect();

    Ok(Json(body))
}

/// POST /api/tickets/:id/messages - append to the chat.
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut errors = ValidationErrors::new();
    let body = validation::required_string(&mut errors, "message", req.message.as_deref());
    let Some(body) = body else {
        return Err(errors.into_response());
    };
    errors.into_result()?;

    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let ticket = load_ticket(&mut conn, ticket_id)?;
    if !access::can_access_ticket_messages(&user.caller(), &ticket) {
        return Err(response::forbidden());
    }

    let message = TicketMessage {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        user_id: user.user_id,
        message: body,
        created_at: Utc::now(),
    };

    diesel::insert_into(ticket_messages::table)
        .values(&message)
        .execute(&mut conn)
        .map_err(|e| response::server_error("Failed to insert message", e))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message,
            user: UserResponse::from(&user),
        }),
    ))
}

pub fn configure_messages_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/tickets/:id/messages",
        get(list_messages).post(create_message),
    )
}
