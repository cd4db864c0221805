use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::AppJson;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, Role, User};
use crate::validation::{LoginForm, SignupForm};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    email: String,
    role: Role,
    token: String,
}

fn auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        token: state.tokens.issue(user)?,
    })
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(form): AppJson<SignupForm>,
) -> AppResult<impl IntoResponse> {
    form.validate()?;

    if state.store.find_user_by_email(&form.email).await?.is_some() {
        return Err(AppError::Duplicate("User already exists".to_string()));
    }

    let password_hash = state.passwords.hash(&form.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name: form.name,
            email: form.email,
            password_hash,
            role: form.role.unwrap_or(Role::Attendee),
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, "User registered");
    Ok((StatusCode::CREATED, Json(auth_response(&state, &user)?)))
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(form): AppJson<LoginForm>,
) -> AppResult<impl IntoResponse> {
    form.validate()?;

    let invalid = || AppError::auth("Invalid credentials");
    let user = state
        .store
        .find_user_by_email(&form.email)
        .await?
        .ok_or_else(invalid)?;

    if !state.passwords.verify(&form.password, &user.password_hash).await? {
        return Err(invalid());
    }

    Ok(Json(auth_response(&state, &user)?))
}
