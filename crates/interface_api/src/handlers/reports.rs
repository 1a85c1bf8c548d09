//! Bookkeeping report handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use core_kernel::ReportPeriod;

use crate::dto::reports::{CreateReportParams, ReportLinkResponse};
use crate::extract::AppQuery;
use crate::{error::ApiError, AppState};

/// Generates the revenue report for a month and returns its link
pub async fn create_report(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<CreateReportParams>,
) -> Result<(StatusCode, Json<ReportLinkResponse>), ApiError> {
    let period = params
        .period
        .ok_or_else(|| ApiError::BadRequest("period is required".to_string()))?;
    let period = ReportPeriod::parse(&period)?;

    let artifact = state.reports.generate_for_period(period).await?;
    let link = state.config.report_link(artifact.hash.as_str());

    Ok((StatusCode::CREATED, Json(ReportLinkResponse { link })))
}

/// Streams a stored report as a CSV attachment
pub async fn get_report(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, bytes) = state.reports.fetch(&hash).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=report.csv"),
        ],
        bytes,
    ))
}
