use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Message shown when a write lost a race against another actor.
pub const STALE_RECORD_MESSAGE: &str =
    "This record was just updated by someone else, please refresh and try again";

/// Errors produced by the attendance edit workflow and its stores.
///
/// Every error is terminal for the operation that raised it. Nothing is
/// retried internally and nothing is partially applied.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum AttendanceError {
    #[display(fmt = "Attendance record not found")]
    NotFound,

    #[display(fmt = "Unauthorized: {}", _0)]
    Unauthorized(String),

    #[display(fmt = "Invalid state: {}", _0)]
    InvalidState(String),

    #[display(fmt = "Conflicting update")]
    Conflict,

    #[display(fmt = "Store unavailable: {}", _0)]
    Unavailable(String),

    #[display(fmt = "Invalid input: {}", _0)]
    InvalidInput(String),

    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl std::error::Error for AttendanceError {}

pub type AttendanceResult<T> = Result<T, AttendanceError>;

impl AttendanceError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AttendanceError::Unauthorized(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AttendanceError::InvalidState(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AttendanceError::InvalidInput(msg.into())
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::NotFound => "not_found",
            AttendanceError::Unauthorized(_) => "unauthorized",
            AttendanceError::InvalidState(_) => "invalid_state",
            AttendanceError::Conflict => "conflict",
            AttendanceError::Unavailable(_) => "unavailable",
            AttendanceError::InvalidInput(_) => "invalid_input",
            AttendanceError::Internal(_) => "internal",
        }
    }

    /// Text safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AttendanceError::InvalidState(_) | AttendanceError::Conflict => {
                STALE_RECORD_MESSAGE.to_string()
            }
            AttendanceError::Unavailable(_) => {
                "Attendance storage is unavailable, please retry shortly".to_string()
            }
            AttendanceError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AttendanceError::NotFound,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => AttendanceError::Unavailable(e.to_string()),
            other => AttendanceError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AttendanceError {
    fn from(e: serde_json::Error) -> Self {
        AttendanceError::Internal(format!("serialization failed: {e}"))
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::NotFound => StatusCode::NOT_FOUND,
            AttendanceError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AttendanceError::InvalidState(_) | AttendanceError::Conflict => StatusCode::CONFLICT,
            AttendanceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, AttendanceError::Internal(_) | AttendanceError::Unavailable(_)) {
            tracing::error!(error = %self, "Attendance request failed");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": self.user_message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn races_surface_actionable_message() {
        let conflict = AttendanceError::Conflict;
        let resolved = AttendanceError::invalid_state("record is not pending");

        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(resolved.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.user_message(), STALE_RECORD_MESSAGE);
        assert_eq!(resolved.user_message(), STALE_RECORD_MESSAGE);
    }

    #[test]
    fn sqlx_errors_are_classified() {
        assert_eq!(
            AttendanceError::from(sqlx::Error::RowNotFound),
            AttendanceError::NotFound
        );
        assert!(matches!(
            AttendanceError::from(sqlx::Error::PoolTimedOut),
            AttendanceError::Unavailable(_)
        ));
        assert!(matches!(
            AttendanceError::from(sqlx::Error::ColumnNotFound("x".into())),
            AttendanceError::Internal(_)
        ));
    }
}
