//! Bookkeeping report DTOs

use serde::{Deserialize, Serialize};

/// Query string of `POST /api/report/create/`
#[derive(Debug, Deserialize)]
pub struct CreateReportParams {
    /// Month as `YYYY-MM`
    #[serde(alias = "startTime")]
    pub period: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportLinkResponse {
    pub link: String,
}
