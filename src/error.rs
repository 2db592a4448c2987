//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup errors: the entity configuration is inconsistent and no routes are built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("unknown field '{field}' in {role} role of {entity}")]
    UnknownField {
        entity: String,
        role: &'static str,
        field: String,
    },
    #[error("invalid child relation '{relationship}' on {entity}: {reason}")]
    InvalidChild {
        entity: String,
        relationship: String,
        reason: String,
    },
    #[error("child relations form a cycle through {0}")]
    CyclicChildren(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures reported by the store collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Uniqueness, foreign-key, not-null or check violation.
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("store backend: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;
        if let sqlx::Error::Database(db) = &e {
            if matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) {
                return StoreError::Constraint(db.message().to_string());
            }
        }
        StoreError::Backend(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(StoreError::Constraint(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) | AppError::Store(StoreError::Constraint(_)) => "conflict",
            AppError::Validation(_) => "validation_error",
            AppError::Store(StoreError::Backend(_)) => "store_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            detail: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
