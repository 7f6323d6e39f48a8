//! Request authentication.
//!
//! A middleware layer validates the `Authorization: Bearer` token, loads the
//! caller's account row and stores an [`AuthenticatedUser`] in the request
//! extensions; handlers pick it up through the extractor below. Loading the
//! row on every request means tokens for deleted accounts stop working
//! immediately and role checks always see the stored role, not the one baked
//! into the token.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::core::shared::enums::UserRole;
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::response::{self, ApiError};
use crate::security::jwt;
use crate::tickets::access::Caller;

/// Authenticated caller context for the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = extract_and_validate_user(&request, &state)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn extract_and_validate_user(
    request: &Request<Body>,
    state: &AppState,
) -> Result<AuthenticatedUser, ApiError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(response::unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(response::unauthenticated)?;

    let claims = jwt::validate_token(token, &state.config.jwt_secret)
        .map_err(|_| response::unauthenticated())?;

    let user_id =
        Uuid::parse_str(&claims.sub).map_err(|_| response::unauthenticated())?;

    let mut conn = state
        .conn
        .get()
        .map_err(|e| response::server_error("Failed to get database connection", e))?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()
        .map_err(|e| response::server_error("Failed to load user", e))?
        .ok_or_else(response::unauthenticated)?;

    Ok(user.into())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(response::unauthenticated)
    }
}
