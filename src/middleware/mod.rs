use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Role, User, UserProfile};

pub mod access;

pub use access::Capability;

/// Аутентифицированный пользователь (без пароля).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Проверка по матрице прав.
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        access::require(self.role, capability)
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

// Bearer JWT extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::auth("Not authorized, no token"))?;

        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "JWT verification failed");
            AppError::auth("Not authorized, token failed")
        })?;

        let user = state
            .store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::auth("User not found"))?;

        Ok(user.into())
    }
}
