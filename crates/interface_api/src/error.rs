//! API error handling

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Logged in full, reported to the client generically
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code clients can match on
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Internal(_) => "BS-000000",
            ApiError::NotFound(_) => "BS-000001",
            ApiError::BadRequest(_) => "BS-000002",
            ApiError::InsufficientFunds(_) => "BS-000003",
            ApiError::Conflict(_) => "BS-000004",
            ApiError::Timeout(_) => "BS-000005",
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::InsufficientFunds(_) => "insufficient_funds",
            ApiError::Conflict(_) => "conflict",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed with internal error");
                "internal server error".to_string()
            }
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::InsufficientFunds(msg)
            | ApiError::Conflict(msg)
            | ApiError::Timeout(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            error: self.error_type().to_string(),
            code: self.code().to_string(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::BadRequest(msg) => ApiError::BadRequest(msg),
            LedgerError::NotFound(msg) => ApiError::NotFound(msg),
            LedgerError::InsufficientFunds(msg) => ApiError::InsufficientFunds(msg),
            LedgerError::Conflict(msg) => ApiError::Conflict(msg),
            LedgerError::Timeout(msg) => ApiError::Timeout(msg),
            LedgerError::Internal(_) | LedgerError::Inconsistent { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<core_kernel::MoneyError> for ApiError {
    fn from(err: core_kernel::MoneyError) -> Self {
        LedgerError::from(err).into()
    }
}

impl From<core_kernel::IdentifierError> for ApiError {
    fn from(err: core_kernel::IdentifierError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<core_kernel::TemporalError> for ApiError {
    fn from(err: core_kernel::TemporalError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_status_and_code() {
        let cases = [
            (LedgerError::not_found("user 1"), StatusCode::NOT_FOUND, "BS-000001"),
            (LedgerError::bad_request("amount"), StatusCode::BAD_REQUEST, "BS-000002"),
            (
                LedgerError::InsufficientFunds("main".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "BS-000003",
            ),
            (LedgerError::Conflict("key".into()), StatusCode::CONFLICT, "BS-000004"),
            (LedgerError::Timeout("locks".into()), StatusCode::GATEWAY_TIMEOUT, "BS-000005"),
            (LedgerError::internal("db"), StatusCode::INTERNAL_SERVER_ERROR, "BS-000000"),
        ];

        for (ledger, status, code) in cases {
            let api = ApiError::from(ledger);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn test_inconsistent_is_internal() {
        let api = ApiError::from(LedgerError::Inconsistent {
            operation: "accept_revenue".into(),
            context: "user 1".into(),
        });
        assert_eq!(api.code(), "BS-000000");
    }
}
