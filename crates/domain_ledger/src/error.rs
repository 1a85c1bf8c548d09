//! Ledger domain errors

use core_kernel::{CoreError, IdentifierError, MoneyError, PortError, TemporalError};
use thiserror::Error;

/// Classification of a [`LedgerError`] for callers that map errors to
/// protocol status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    InsufficientFunds,
    Conflict,
    Timeout,
    Internal,
}

/// Errors that can occur in the ledger domain
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Input rejected before anything was touched
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown user, account, reservation or report
    #[error("Not found: {0}")]
    NotFound(String),

    /// A balance would have gone negative
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// An open reservation already exists for the key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Locks or a transaction could not be acquired before the deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Storage or transport failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// A failed operation could not be rolled back or compensated.
    /// Requires manual reconciliation.
    #[error("Inconsistent ledger state after {operation}: {context}")]
    Inconsistent {
        operation: String,
        context: String,
    },
}

impl LedgerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        LedgerError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        LedgerError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        LedgerError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::BadRequest(_) => ErrorKind::BadRequest,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::Timeout(_) => ErrorKind::Timeout,
            LedgerError::Internal(_) | LedgerError::Inconsistent { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                LedgerError::NotFound(format!("{} {}", entity_type, id))
            }
            PortError::Validation { message, .. } => LedgerError::BadRequest(message),
            PortError::InsufficientFunds { message } => LedgerError::InsufficientFunds(message),
            PortError::Conflict { message } => LedgerError::Conflict(message),
            PortError::Timeout { .. } => LedgerError::Timeout(err.to_string()),
            PortError::Connection { .. } | PortError::Internal { .. } => {
                LedgerError::Internal(err.to_string())
            }
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::InsufficientFunds { .. } => LedgerError::InsufficientFunds(err.to_string()),
            MoneyError::InvalidAmount(message) => LedgerError::BadRequest(message),
            MoneyError::Overflow => LedgerError::BadRequest(err.to_string()),
        }
    }
}

impl From<IdentifierError> for LedgerError {
    fn from(err: IdentifierError) -> Self {
        LedgerError::BadRequest(err.to_string())
    }
}

impl From<TemporalError> for LedgerError {
    fn from(err: TemporalError) -> Self {
        LedgerError::BadRequest(err.to_string())
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Money(e) => e.into(),
            CoreError::Temporal(e) => e.into(),
            CoreError::Identifier(e) => e.into(),
            CoreError::NotFound(message) => LedgerError::NotFound(message),
            CoreError::Validation(message) | CoreError::InvalidStateTransition(message) => {
                LedgerError::BadRequest(message)
            }
            CoreError::Configuration(message) => LedgerError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_port_errors_are_classified() {
        let cases = [
            (PortError::not_found("account", 1), ErrorKind::NotFound),
            (PortError::validation("bad"), ErrorKind::BadRequest),
            (PortError::insufficient_funds("main"), ErrorKind::InsufficientFunds),
            (PortError::conflict("dup"), ErrorKind::Conflict),
            (PortError::timeout("begin", std::time::Duration::from_millis(5)), ErrorKind::Timeout),
            (PortError::connection("refused"), ErrorKind::Internal),
            (PortError::internal("boom"), ErrorKind::Internal),
        ];

        for (port, kind) in cases {
            assert_eq!(LedgerError::from(port).kind(), kind);
        }
    }

    #[test]
    fn test_money_errors_are_classified() {
        let insufficient = MoneyError::InsufficientFunds {
            balance: dec!(1),
            requested: dec!(2),
        };
        assert_eq!(LedgerError::from(insufficient).kind(), ErrorKind::InsufficientFunds);
        assert_eq!(
            LedgerError::from(MoneyError::InvalidAmount("x".into())).kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn test_inconsistent_is_internal() {
        let err = LedgerError::Inconsistent {
            operation: "accept_revenue".into(),
            context: "user 1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("accept_revenue"));
    }
}
