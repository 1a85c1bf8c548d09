//! Request handlers

pub mod health;
pub mod reports;
pub mod reservations;
pub mod users;

use axum::Extension;
use core_kernel::OperationMetadata;

use crate::middleware::RequestId;

/// Operation metadata correlated with the inbound request
pub(crate) fn metadata(request_id: Option<Extension<RequestId>>) -> OperationMetadata {
    match request_id {
        Some(Extension(RequestId(id))) => OperationMetadata::with_correlation_id(id),
        None => OperationMetadata::default(),
    }
}
