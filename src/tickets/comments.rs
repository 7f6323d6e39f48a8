//! Ticket comments: the formal annotation thread shown inline with a ticket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::UserResponse;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::schema::{ticket_comments, tickets};
use crate::core::shared::state::AppState;
use crate::response::{self, ApiError};
use crate::validation::{self, ValidationErrors};

use super::{access, Ticket};

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = ticket_comments)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment as the API returns it; the author rides along when the endpoint
/// loaded it.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: TicketComment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

impl CommentResponse {
    pub fn bare(comment: TicketComment) -> Self {
        Self {
            comment,
            user: None,
        }
    }

    pub fn with_user(comment: TicketComment, user: UserResponse) -> Self {
        Self {
            comment,
            user: Some(user),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub ticket_id: Option<Uuid>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub comment: Option<String>,
}

fn load_comment(conn: &mut PgConnection, id: Uuid) -> Result<TicketComment, ApiError> {
    ticket_comments::table
        .find(id)
        .first(conn)
        .optional()
        .map_err(|e| response::server_error("Failed to load comment", e))?
        .ok_or_else(|| response::not_found("Comment"))
}

/// POST /api/comments - comment on a ticket the caller can view.
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let mut errors = ValidationErrors::new();
    let body = validation::required_string(&mut errors, "comment", req.comment.as_deref());

    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let ticket: Option<Ticket> = match req.ticket_id {
        Some(ticket_id) => {
            let found = tickets::table
                .find(ticket_id)
                .first(&mut conn)
                .optional()
                .map_err(|e| response::server_error("Failed to load ticket", e))?;
            if found.is_none() {
                errors.add("ticket_id", "The selected ticket id is invalid.");
            }
            found
        }
        None => {
            errors.add("ticket_id", "The ticket id field is required.");
            None
        }
    };

    match (ticket, body) {
        (Some(ticket), Some(body)) if errors.is_empty() => {
            if !access::can_view_ticket(&user.caller(), &ticket) {
                return Err(response::forbidden());
            }

            let now = Utc::now();
            let comment = TicketComment {
                id: Uuid::new_v4(),
                ticket_id: ticket.id,
                user_id: user.user_id,
                comment: body,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(ticket_comments::table)
                .values(&comment)
                .execute(&mut conn)
                .map_err(|e| response::server_error("Failed to insert comment", e))?;

            Ok((
                StatusCode::CREATED,
                Json(CommentResponse::with_user(comment, UserResponse::from(&user))),
            ))
        }
        _ => Err(errors.into_response()),
    }
}

/// PUT /api/comments/:id - author-only; the author id never changes.
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let comment = load_comment(&mut conn, id)?;
    if !access::can_mutate_comment(&user.caller(), &comment) {
        return Err(response::forbidden());
    }

    let mut errors = ValidationErrors::new();
    let body = validation::required_string(&mut errors, "comment", req.comment.as_deref());
    let Some(body) = body else {
        return Err(errors.into_response());
    };
    errors.into_result()?;

    let now = Utc::now();
    diesel::update(ticket_comments::table.find(id))
        .set((
            ticket_comments::comment.eq(&body),
            ticket_comments::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|e| response::server_error("Failed to update comment", e))?;

    let comment = load_comment(&mut conn, id)?;

    Ok(Json(CommentResponse::with_user(
        comment,
        UserResponse::from(&user),
    )))
}

/// DELETE /api/comments/:id - author-only.
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let comment = load_comment(&mut conn, id)?;
    if !access::can_mutate_comment(&user.caller(), &comment) {
        return Err(response::forbidden());
    }

    diesel::delete(ticket_comments::table.find(id))
        .execute(&mut conn)
        .map_err(|e| response::server_error("Failed to delete comment", e))?;

    Ok(response::deleted("Comment"))
}

pub fn configure_comments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/comments", post(create_comment))
        .route(
            "/api/comments/:id",
            put(update_comment).delete(delete_comment),
        )
}
