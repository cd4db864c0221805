//! Единая таксономия ошибок API.
//!
//! Контроллеры возвращают `Result<_, AppError>`; преобразование в HTTP-ответ
//! происходит в одном месте, там же ошибка логируется.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::services::payment::PaymentError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Ошибки по полям формы (`email` -> "Invalid email format").
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        fields: Option<FieldErrors>,
    },

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("{0}")]
    Unexpected(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: None,
        }
    }

    pub fn invalid_fields(fields: FieldErrors) -> Self {
        let message = fields
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());
        AppError::Validation {
            message,
            fields: Some(fields),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        AppError::Auth(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } | AppError::Duplicate(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Duplicate(_) => "DUPLICATE",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Unexpected(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(_) | AppError::Unexpected(_) | AppError::Upstream(_) => {
                tracing::error!(code = self.code(), error = %self, "request failed");
            }
            _ => {
                tracing::debug!(code = self.code(), error = %self, "request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        // Детали ошибок БД наружу не отдаем
        let message = match &self {
            AppError::Database(_) => "Server error".to_string(),
            other => other.to_string(),
        };
        let fields = match &self {
            AppError::Validation { fields, .. } => fields.as_ref(),
            _ => None,
        };

        let body = ErrorBody {
            message: &message,
            code: self.code(),
            errors: fields,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => AppError::Duplicate(message),
            StoreError::Database(e) => AppError::Database(e.to_string()),
            StoreError::Corrupt(message) => AppError::Unexpected(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

// Подробности ошибки шлюза остаются в логах, клиенту уходит общее сообщение
impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        tracing::warn!(error = %err, "payment gateway call failed");
        AppError::Upstream("Error creating payment intent".to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            if let Some(first) = errs.first() {
                let message = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                fields.insert(field.to_string(), message);
            }
        }
        AppError::invalid_fields(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Duplicate("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::auth("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Unexpected("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_conflict_becomes_duplicate() {
        let err: AppError = StoreError::Conflict("User already exists".into()).into();
        assert!(matches!(err, AppError::Duplicate(ref m) if m == "User already exists"));
    }

    #[tokio::test]
    async fn database_details_are_hidden() {
        let response = AppError::Database("relation \"users\" does not exist".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Server error");
        assert_eq!(body["code"], "DATABASE_ERROR");
    }
}
