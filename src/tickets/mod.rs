//! Support tickets: models, CRUD handlers and routes.

pub mod access;
pub mod comments;
pub mod lifecycle;
pub mod messages;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{User, UserResponse};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{TicketPriority, TicketStatus};
use crate::core::shared::schema::{ticket_comments, ticket_messages, tickets, users};
use crate::core::shared::state::AppState;
use crate::response::{self, ApiError};
use crate::validation::{self, ValidationErrors};

use self::comments::{CommentResponse, TicketComment};
use self::lifecycle::TicketUpdate;

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// A ticket as the API returns it: the row itself plus its owner, and the
/// comment thread when the endpoint ships one.
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentResponse>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = tickets)]
struct TicketChangeset {
    subject: Option<String>,
    description: Option<String>,
    category: Option<String>,
    priority: Option<TicketPriority>,
    status: Option<TicketStatus>,
    updated_at: DateTime<Utc>,
}

impl TicketChangeset {
    fn from_update(update: TicketUpdate, now: DateTime<Utc>) -> Self {
        Self {
            subject: update.subject,
            description: update.description,
            category: update.category,
            priority: update.priority,
            status: update.status,
            updated_at: now,
        }
    }
}

fn load_ticket(conn: &mut PgConnection, id: Uuid) -> Result<Ticket, ApiError> {
    tickets::table
        .find(id)
        .first(conn)
        .optional()
        .map_err(|e| response::server_error("Failed to load ticket", e))?
        .ok_or_else(|| response::not_found("Ticket"))
}

fn load_owner(conn: &mut PgConnection, ticket: &Ticket) -> Result<User, ApiError> {
    users::table
        .find(ticket.user_id)
        .first(conn)
        .map_err(|e| response::server_error("Failed to load ticket owner", e))
}

/// GET /api/tickets - customers get their own tickets, admins get all,
/// newest first, each with its owner and comment thread.
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<TicketResponse>>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let caller = user.caller();
    let mut query = tickets::table.inner_join(users::table).into_boxed();
    if !caller.is_admin() {
        query = query.filter(tickets::user_id.eq(caller.id));
    }

    let rows: Vec<(Ticket, User)> = query
        .order(tickets::created_at.desc())
        .load(&mut conn)
        .map_err(|e| response::server_error("Failed to list tickets", e))?;

    let ids: Vec<Uuid> = rows.iter().map(|(ticket, _)| ticket.id).collect();
    let comment_rows: Vec<TicketComment> = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq_any(&ids))
        .order(ticket_comments::created_at.asc())
        .load(&mut conn)
        .map_err(|e| response::server_error("Failed to load comments", e))?;

    let mut threads: HashMap<Uuid, Vec<CommentResponse>> = HashMap::new();
    for comment in comment_rows {
        threads
            .entry(comment.ticket_id)
            .or_default()
            .push(CommentResponse::bare(comment));
    }

    let body = rows
        .into_iter()
        .map(|(ticket, owner)| TicketResponse {
            comments: Some(threads.remove(&ticket.id).unwrap_or_default()),
            user: owner.into(),
            ticket,
        })
        .collect();

    Ok(Json(body))
}

/// POST /api/tickets - any authenticated user; the caller becomes the owner
/// and the status is forced to open regardless of input.
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let mut errors = ValidationErrors::new();

    let subject = validation::required_string(&mut errors, "subject", req.subject.as_deref());
    if let Some(subject) = &subject {
        validation::max_length(&mut errors, "subject", subject, 255);
    }
    let description =
        validation::required_string(&mut errors, "description", req.description.as_deref());
    let category = validation::required_string(&mut errors, "category", req.category.as_deref());
    if let Some(category) = &category {
        validation::max_length(&mut errors, "category", category, 255);
    }
    let priority = match validation::required_string(&mut errors, "priority", req.priority.as_deref())
    {
        Some(value) => validation::parse_choice::<TicketPriority>(&mut errors, "priority", &value),
        None => None,
    };

    match (subject, description, category, priority) {
        (Some(subject), Some(description), Some(category), Some(priority))
            if errors.is_empty() =>
        {
            let mut conn = state
                .conn
                .get()
                .map_err(|e| response::server_error("Failed to get database connection", e))?;

            let now = Utc::now();
            let ticket = Ticket {
                id: Uuid::new_v4(),
                user_id: user.user_id,
                subject,
                description,
                category,
                priority,
                status: lifecycle::INITIAL_STATUS,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(tickets::table)
                .values(&ticket)
                .execute(&mut conn)
                .map_err(|e| response::server_error("Failed to insert ticket", e))?;

            log::info!("User {} opened ticket {}", user.user_id, ticket.id);

            Ok((
                StatusCode::CREATED,
                Json(TicketResponse {
                    user: UserResponse::from(&user),
                    comments: None,
                    ticket,
                }),
            ))
        }
        _ => Err(errors.into_response()),
    }
}

/// GET /api/tickets/:id - full payload with owner and the comment thread,
/// each comment carrying its author.
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let ticket = load_ticket(&mut conn, id)?;
    if !access::can_view_ticket(&user.caller(), &ticket) {
        return Err(response::forbidden());
    }

    let owner = load_owner(&mut conn, &ticket)?;
    let comment_rows: Vec<(TicketComment, User)> = ticket_comments::table
        .inner_join(users::table)
        .filter(ticket_comments::ticket_id.eq(id))
        .order(ticket_comments::created_at.asc())
        .load(&mut conn)
        .map_err(|e| response::server_error("Failed to load comments", e))?;

    let comments = comment_rows
        .into_iter()
        .map(|(comment, author)| CommentResponse::with_user(comment, author.into()))
        .collect();

    Ok(Json(TicketResponse {
        user: owner.into(),
        comments: Some(comments),
        ticket,
    }))
}

/// PUT /api/tickets/:id - partial update. Every provided field is validated;
/// a status from a non-admin is stripped after validation, not rejected.
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let caller = user.caller();
    let ticket = load_ticket(&mut conn, id)?;
    if !access::can_update_ticket_fields(&caller, &ticket) {
        return Err(response::forbidden());
    }

    let mut errors = ValidationErrors::new();
    let mut update = TicketUpdate::default();

    if req.subject.is_some() {
        if let Some(subject) = validation::required_string(&mut errors, "subject", req.subject.as_deref())
        {
            validation::max_length(&mut errors, "subject", &subject, 255);
            update.subject = Some(subject);
        }
    }
    if req.description.is_some() {
        update.description =
            validation::required_string(&mut errors, "description", req.description.as_deref());
    }
    if req.category.is_some() {
        if let Some(category) =
            validation::required_string(&mut errors, "category", req.category.as_deref())
        {
            validation::max_length(&mut errors, "category", &category, 255);
            update.category = Some(category);
        }
    }
    if let Some(priority) = req.priority.as_deref() {
        update.priority = validation::parse_choice::<TicketPriority>(&mut errors, "priority", priority.trim());
    }
    if let Some(status) = req.status.as_deref() {
        update.status = validation::parse_choice::<TicketStatus>(&mut errors, "status", status.trim());
    }
    errors.into_result()?;

    let update = lifecycle::sanitize_update(&caller, update);
    let changeset = TicketChangeset::from_update(update, Utc::now());

    diesel::update(tickets::table.find(id))
        .set(&changeset)
        .execute(&mut conn)
        .map_err(|e| response::server_error("Failed to update ticket", e))?;

    let ticket = load_ticket(&mut conn, id)?;
    let owner = load_owner(&mut conn, &ticket)?;

    Ok(Json(TicketResponse {
        user: owner.into(),
        comments: None,
        ticket,
    }))
}

/// DELETE /api/tickets/:id - removes the ticket with its comments and
/// messages in one transaction.
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let ticket = load_ticket(&mut conn, id)?;
    if !access::can_delete_ticket(&user.caller(), &ticket) {
        return Err(response::forbidden());
    }

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(ticket_messages::table.filter(ticket_messages::ticket_id.eq(id)))
            .execute(conn)?;
        diesel::delete(ticket_comments::table.filter(ticket_comments::ticket_id.eq(id)))
            .execute(conn)?;
        diesel::delete(tickets::table.find(id)).execute(conn)?;
        Ok(())
    })
    .map_err(|e| response::server_error("Failed to delete ticket", e))?;

    log::info!("User {} deleted ticket {}", user.user_id, id);

    Ok(response::deleted("Ticket"))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/tickets/:id",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
}
