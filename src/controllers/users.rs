use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{parse_id_or, AppJson};
use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, Capability};
use crate::models::{Role, User, UserProfile};
use crate::services::otp::OtpDelivery;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/profile", get(profile))
        .route("/users/roles/counts", get(role_counts))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/resend-otp", post(resend_otp))
        .route("/users/verify-otp", post(verify_otp))
        .route("/users/update-password", post(update_password))
        .route("/users/{user_id}", delete(delete_user))
}

fn user_not_found() -> AppError {
    AppError::not_found("User not found")
}

async fn user_by_email(state: &AppState, email: &str) -> AppResult<User> {
    state
        .store
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(user_not_found)
}

// GET /api/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ManageUsers)?;
    let users: Vec<UserProfile> = state
        .store
        .list_users_except(Role::Admin)
        .await?
        .iter()
        .map(UserProfile::from)
        .collect();
    Ok(Json(users))
}

// DELETE /api/users/:userId
async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ManageUsers)?;
    let user_id = parse_id_or(&user_id, "Invalid userId")?;

    if !state.store.delete_user(user_id).await? {
        return Err(user_not_found());
    }

    info!(%user_id, deleted_by = %user.id, "User deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

// GET /api/users/profile
async fn profile(user: AuthUser) -> impl IntoResponse {
    Json(user.profile())
}

#[derive(Debug, Serialize)]
struct RoleCount {
    name: Role,
    value: i64,
}

// GET /api/users/roles/counts
async fn role_counts(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let counts: Vec<RoleCount> = state
        .store
        .count_users_by_role()
        .await?
        .into_iter()
        .filter(|(role, count)| *role != Role::Admin && *count > 0)
        .map(|(name, value)| RoleCount { name, value })
        .collect();

    if counts.is_empty() {
        let zeros = vec![
            RoleCount { name: Role::Attendee, value: 0 },
            RoleCount { name: Role::Organizer, value: 0 },
        ];
        return Ok((StatusCode::NOT_FOUND, Json(zeros)));
    }

    Ok((StatusCode::OK, Json(counts)))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    #[serde(default)]
    email: String,
}

// POST /api/users/forgot-password
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EmailRequest>,
) -> AppResult<impl IntoResponse> {
    let user = user_by_email(&state, &req.email).await?;
    state.password_reset.send_code(&user, OtpDelivery::First).await?;
    Ok(Json(json!({ "message": "OTP sent successfully" })))
}

// POST /api/users/resend-otp
async fn resend_otp(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EmailRequest>,
) -> AppResult<impl IntoResponse> {
    let user = user_by_email(&state, &req.email).await?;
    state.password_reset.send_code(&user, OtpDelivery::Resend).await?;
    Ok(Json(json!({ "message": "New OTP sent successfully" })))
}

#[derive(Debug, Deserialize)]
struct VerifyOtpRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

// POST /api/users/verify-otp
async fn verify_otp(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<VerifyOtpRequest>,
) -> AppResult<impl IntoResponse> {
    // Неизвестный email неотличим от неверного кода
    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(|| AppError::validation("Invalid OTP"))?;

    state.password_reset.verify(&user, &req.otp).await?;
    Ok(Json(json!({ "message": "OTP verified successfully" })))
}

#[derive(Debug, Deserialize)]
struct UpdatePasswordRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

// POST /api/users/update-password
async fn update_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpdatePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    if req.password.is_empty() {
        return Err(AppError::validation("Password is required."));
    }
    let user = user_by_email(&state, &req.email).await?;

    state.password_reset.ensure_verified(&user).await?;
    let password_hash = state.passwords.hash(&req.password).await?;
    if !state.store.update_password(user.id, &password_hash).await? {
        return Err(user_not_found());
    }
    state.password_reset.complete(&user).await?;

    info!(user_id = %user.id, "Password updated");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}
