use actix_web::{http::StatusCode, ResponseError};
use log::error;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFoundOrForbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PolicyViolation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Upstream(String),
    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn need_login() -> Self {
        Self::Unauthenticated("User not logged in".to_string())
    }

    pub fn login_expired() -> Self {
        Self::Unauthenticated("Failed to verify user, please login again".to_string())
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthenticated("Invalid Credentials".to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_owned(msg: impl Into<String>) -> Self {
        Self::NotFoundOrForbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn profanity() -> Self {
        Self::PolicyViolation("Profanity is not allowed".to_string())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn system_exception() -> Self {
        Self::Internal
    }

    /// Maps a write failure, turning a unique violation into `conflict_msg`.
    pub fn from_insert(err: DbErr, conflict_msg: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::conflict(conflict_msg),
            _ => err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::PolicyViolation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotFoundOrForbidden(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn msg(&self) -> String {
        self.to_string()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                return Self::conflict("Resource already exists")
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                return Self::param_error("Invalid reference")
            }
            _ => {}
        }
        match err {
            DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => {
                Self::not_found("Resource not found")
            }
            DbErr::ConnectionAcquire(e) => {
                error!("db pool unavailable: {}", e);
                Self::upstream("Storage unavailable")
            }
            DbErr::Conn(e) => {
                error!("db connection failed: {}", e);
                Self::upstream("Storage unavailable")
            }
            other => {
                error!("unmapped db error: {}", other);
                Self::system_exception()
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}
