//! Reservation handlers

use axum::{extract::State, http::StatusCode, Extension};

use super::metadata;
use crate::dto::users::ReservationRequest;
use crate::extract::AppJson;
use crate::middleware::RequestId;
use crate::{error::ApiError, AppState};

/// Moves funds from main to reserved for an order
pub async fn reserve(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<ReservationRequest>,
) -> Result<StatusCode, ApiError> {
    let (key, amount) = request.parse()?;
    state.engine.reserve(key, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Settles a reservation as revenue
pub async fn accept(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<ReservationRequest>,
) -> Result<StatusCode, ApiError> {
    let (key, amount) = request.parse()?;
    state.engine.accept_revenue(key, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns reserved funds to main
pub async fn release(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<ReservationRequest>,
) -> Result<StatusCode, ApiError> {
    let (key, amount) = request.parse()?;
    state.engine.release(key, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
