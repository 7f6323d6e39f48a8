//! Account registration, login and session introspection.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::UserRole;
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::response::{self, ApiError};
use crate::security::{jwt, password};
use crate::validation::{self, ValidationErrors};

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user row; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<&AuthenticatedUser> for UserResponse {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            id: user.user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut errors = ValidationErrors::new();

    let name = validation::required_string(&mut errors, "name", req.name.as_deref());
    if let Some(name) = &name {
        validation::max_length(&mut errors, "name", name, 255);
    }

    let email = validation::required_string(&mut errors, "email", req.email.as_deref());
    if let Some(email) = &email {
        if !email.contains('@') {
            errors.add("email", "The email must be a valid email address.");
        }
    }

    let plain_password = validation::required_string(&mut errors, "password", req.password.as_deref());
    if let Some(p) = &plain_password {
        if p.chars().count() < 8 {
            errors.add("password", "The password must be at least 8 characters.");
        }
    }

    // Role comes from the registration form; absent means customer.
    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") => Some(UserRole::Customer),
        Some(value) => validation::parse_choice::<UserRole>(&mut errors, "role", value),
    };

    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    if let Some(email) = &email {
        let taken: bool = diesel::select(diesel::dsl::exists(
            users::table.filter(users::email.eq(email)),
        ))
        .get_result(&mut conn)
        .map_err(|e| response::server_error("Failed to check email uniqueness", e))?;
        if taken {
            errors.add("email", "The email has already been taken.");
        }
    }

    match (name, email, plain_password, role) {
        (Some(name), Some(email), Some(plain_password), Some(role)) if errors.is_empty() => {
            let password_hash = password::hash_password(&plain_password)
                .map_err(|e| response::server_error("Failed to hash password", e))?;

            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                name,
                email,
                password_hash,
                role,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(users::table)
                .values(&user)
                .execute(&mut conn)
                .map_err(|e| response::server_error("Failed to insert user", e))?;

            let token = jwt::issue_token(user.id, user.role, &state.config.jwt_secret)
                .map_err(|e| response::server_error("Failed to issue token", e))?;

            log::info!("Registered {} account for user {}", user.role, user.id);

            Ok((
                StatusCode::CREATED,
                Json(AuthResponse {
                    user: user.into(),
                    token,
                }),
            ))
        }
        _ => Err(errors.into_response()),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut errors = ValidationErrors::new();
    let email = validation::required_string(&mut errors, "email", req.email.as_deref());
    let plain_password = validation::required_string(&mut errors, "password", req.password.as_deref());
    let (Some(email), Some(plain_password)) = (email, plain_password) else {
        return Err(errors.into_response());
    };
    errors.into_result()?;

    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let user: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()
        .map_err(|e| response::server_error("Failed to load user", e))?;

    let user = match user {
        Some(user) if password::verify_password(&plain_password, &user.password_hash) => user,
        _ => {
            let mut errors = ValidationErrors::new();
            errors.add("email", "The provided credentials are incorrect.");
            return Err(errors.into_response());
        }
    };

    let token = jwt::issue_token(user.id, user.role, &state.config.jwt_secret)
        .map_err(|e| response::server_error("Failed to issue token", e))?;

    Ok(Json(AuthResponse {
        user: user.into(),
        token,
    }))
}

/// Tokens are stateless; logout exists for wire parity and the client
/// discards its copy.
pub async fn logout(user: AuthenticatedUser) -> Json<serde_json::Value> {
    log::info!("User {} logged out", user.user_id);
    Json(json!({ "message": "Logged out successfully" }))
}

pub async fn current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// Routes that must stay reachable without a token.
pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
}

/// Token-guarded session routes.
pub fn configure_session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/logout", post(logout))
        .route("/api/user", get(current_user))
}
