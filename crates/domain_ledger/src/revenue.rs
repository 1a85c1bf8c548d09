//! Recognized revenue (bookkeeping)

use chrono::{DateTime, Utc};
use core_kernel::{Amount, OrderId, ServiceId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Written once per settled reservation, never on release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueEntry {
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub order_id: OrderId,
    pub amount: Amount,
    pub recognized_at: DateTime<Utc>,
}

/// Revenue summed for one service over a report window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRevenue {
    pub service_id: ServiceId,
    pub total: Decimal,
}
