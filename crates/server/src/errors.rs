use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_access::CoreAccessError;
use medreturn::DomainError;
use serde_json::json;
use tracing::{error, warn};

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors originating from the `medreturn` domain layer.
    Domain(DomainError),
    /// Errors from account management in `core-access`.
    Access(CoreAccessError),
    /// Missing, invalid or expired credentials.
    Unauthorized(String),
    /// Authenticated but not allowed.
    Forbidden(String),
    /// Malformed request that never reached the domain layer.
    BadRequest(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Access(inner) => AppError::Access(inner),
            other => AppError::Domain(other),
        }
    }
}

impl From<CoreAccessError> for AppError {
    fn from(err: CoreAccessError) -> Self {
        AppError::Access(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

fn access_status(err: &CoreAccessError) -> StatusCode {
    match err {
        CoreAccessError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        CoreAccessError::DuplicateIdentity(_)
        | CoreAccessError::WeakPassword(_)
        | CoreAccessError::MissingIdentity => StatusCode::BAD_REQUEST,
        CoreAccessError::UserNotFound(_) => StatusCode::NOT_FOUND,
        CoreAccessError::Database(_)
        | CoreAccessError::PasswordHash(_)
        | CoreAccessError::DataIntegrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::InvalidInput(_)
        | DomainError::Expired
        | DomainError::Depleted
        | DomainError::InsufficientPoints { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::NoOneAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Access(inner) => access_status(inner),
        DomainError::Database(_)
        | DomainError::StorageUnavailable(_)
        | DomainError::DataIntegrity(_)
        | DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Domain(err) => {
                let status = domain_status(&err);
                if status.is_server_error() {
                    // Storage detail stays in the log.
                    error!("DomainError: {:?}", err);
                    (status, "Lỗi hệ thống, vui lòng thử lại sau.".to_string())
                } else {
                    warn!(%status, "Request rejected: {}", err);
                    (status, err.to_string())
                }
            }
            AppError::Access(err) => {
                let status = access_status(&err);
                if status.is_server_error() {
                    error!("CoreAccessError: {:?}", err);
                    (status, "Lỗi hệ thống, vui lòng thử lại sau.".to_string())
                } else {
                    warn!(%status, "Request rejected: {}", err);
                    (status, err.to_string())
                }
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
