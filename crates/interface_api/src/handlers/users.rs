//! User and balance handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::UserId;
use validator::Validate;

use super::metadata;
use crate::dto::users::*;
use crate::extract::{AppJson, AppQuery};
use crate::middleware::RequestId;
use crate::{error::ApiError, AppState};

/// Registers a user; repeating the call is harmless
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterUserRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;
    let user_id = UserId::new(request.id)?;
    state.engine.register_user(user_id).await?;
    Ok(StatusCode::CREATED)
}

/// Credits a user's main balance
pub async fn accrual(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<UserAmountRequest>,
) -> Result<StatusCode, ApiError> {
    let (user_id, amount) = request.parse()?;
    state.engine.top_up(user_id, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn withdraw(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<UserAmountRequest>,
) -> Result<StatusCode, ApiError> {
    let (user_id, amount) = request.parse()?;
    state.engine.withdraw(user_id, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transfer(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    AppJson(request): AppJson<TransferRequest>,
) -> Result<StatusCode, ApiError> {
    let (from, to, amount) = request.parse()?;
    state.engine.transfer(from, to, amount, &metadata(request_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id: UserId = id.parse()?;
    let account = state.engine.balance(user_id).await?;
    Ok(Json(account.into()))
}

/// Returns a user's transaction history
pub async fn get_user_report(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<UserReportParams>,
) -> Result<Json<Vec<AuditEntryResponse>>, ApiError> {
    let query = params.to_query()?;
    let entries = state.engine.audit_entries(&query).await?;
    Ok(Json(entries.into_iter().map(AuditEntryResponse::from).collect()))
}
