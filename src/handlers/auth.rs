use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AuthToken, User};
use crate::state::AppState;

/// Resolves the request's bearer token to a user. Missing, unknown and
/// expired tokens all come back as Unauthorized.
pub fn authenticate(
    conn: &Connection,
    now: NaiveDateTime,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    queries::get_user_by_token(conn, token, now)?.ok_or(AppError::Unauthorized)
}

#[derive(Serialize)]
pub struct UserResponse {
    id: String,
    name: String,
    email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: UserResponse,
}

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::InvalidArgument("name must not be empty".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidArgument(format!("invalid email: {email}")));
    }
    if req.password.len() < 8 {
        return Err(AppError::InvalidArgument(
            "password must be at least 8 characters".to_string(),
        ));
    }

    // hash outside the connection lock; bcrypt is deliberately slow
    let password_hash =
        bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).context("failed to hash password")?;

    let now = state.clock.now_utc().naive_utc();
    let token = uuid::Uuid::new_v4().to_string();

    let user = {
        let db = state.db.lock().unwrap();

        if queries::get_user_by_email(&db, &email)?.is_some() {
            return Err(AppError::Conflict(format!("email {email} is already registered")));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            created_at: now,
        };
        queries::create_user(&db, &user)?;
        queries::create_auth_token(
            &db,
            &AuthToken {
                token: token.clone(),
                user_id: user.id.clone(),
                created_at: now,
                expires_at: now + Duration::days(state.config.token_ttl_days),
            },
        )?;
        user
    };

    tracing::info!(user_id = %user.id, "user registered");

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    let user = {
        let db = state.db.lock().unwrap();
        queries::get_user_by_email(&db, &email)?
    };
    // same error for unknown email and wrong password
    let user = user.ok_or(AppError::Unauthorized)?;

    let valid =
        bcrypt::verify(&req.password, &user.password_hash).context("failed to verify password")?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let now = state.clock.now_utc().naive_utc();
    let token = uuid::Uuid::new_v4().to_string();
    {
        let db = state.db.lock().unwrap();
        queries::create_auth_token(
            &db,
            &AuthToken {
                token: token.clone(),
                user_id: user.id.clone(),
                created_at: now,
                expires_at: now + Duration::days(state.config.token_ttl_days),
            },
        )?;
    }

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AppError> {
    let now = state.clock.now_utc().naive_utc();
    let user = {
        let db = state.db.lock().unwrap();
        authenticate(&db, now, &headers)?
    };
    Ok(Json(user.into()))
}
