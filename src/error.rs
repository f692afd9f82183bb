use actix_web::{HttpResponse, http::StatusCode};
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde_json::json;

/// Typed failures returned by the attendance services. Business-rule
/// violations are values, never panics; only the persistence layer maps
/// into `OperationFailed`.
#[derive(Debug, Clone, Display, Error)]
pub enum AttendanceError {
    #[display(fmt = "validation failed: {}", message)]
    Validation { message: String },

    #[display(fmt = "entity not eligible: {}", message)]
    InvalidMember { message: String },

    #[display(fmt = "attendance tracking is not enabled for this entity")]
    AttendanceNotEnabled,

    #[display(fmt = "duplicate check-in, next allowed at {}", next_allowed_at)]
    DuplicateCheckIn {
        last_check_in_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    },

    #[display(fmt = "no active session for check-in '{}'", check_in_id)]
    NoActiveSession { check_in_id: String },

    #[display(fmt = "check-in '{}' is already checked out", check_in_id)]
    AlreadyCheckedOut { check_in_id: String },

    #[display(fmt = "entity type '{}' is not registered for attendance", entity_type)]
    TargetModelNotAllowed { entity_type: String },

    #[display(fmt = "operation failed: {}", message)]
    OperationFailed { message: String },
}

impl AttendanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn invalid_member(message: impl Into<String>) -> Self {
        Self::InvalidMember { message: message.into() }
    }

    pub fn operation(message: impl Into<String>) -> Self {
        Self::OperationFailed { message: message.into() }
    }

    /// Stable machine-readable code used in API responses and event logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InvalidMember { .. } => "invalid_member",
            Self::AttendanceNotEnabled => "attendance_not_enabled",
            Self::DuplicateCheckIn { .. } => "duplicate_check_in",
            Self::NoActiveSession { .. } => "no_active_session",
            Self::AlreadyCheckedOut { .. } => "already_checked_out",
            Self::TargetModelNotAllowed { .. } => "target_model_not_allowed",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        Self::OperationFailed { message: e.to_string() }
    }
}

impl actix_web::ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::NoActiveSession { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidMember { .. } => StatusCode::NOT_FOUND,
            Self::AttendanceNotEnabled | Self::TargetModelNotAllowed { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::DuplicateCheckIn { .. } | Self::AlreadyCheckedOut { .. } => StatusCode::CONFLICT,
            Self::OperationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        // Clients use these to schedule the retry.
        if let Self::DuplicateCheckIn { last_check_in_at, next_allowed_at } = self {
            body["last_check_in_at"] = json!(last_check_in_at);
            body["next_allowed_at"] = json!(next_allowed_at);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_check_in_keeps_retry_timestamps() {
        let err = AttendanceError::DuplicateCheckIn {
            last_check_in_at: Utc::now(),
            next_allowed_at: Utc::now(),
        };
        assert_eq!(err.code(), "duplicate_check_in");
        assert!(err.to_string().contains("next allowed"));
    }

    #[test]
    fn status_codes_map_by_category() {
        use actix_web::ResponseError;
        assert_eq!(
            AttendanceError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AttendanceError::AttendanceNotEnabled.status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
