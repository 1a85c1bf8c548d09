//! Pre-built Test Fixtures
//!
//! Small, predictable values for unit and integration tests.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{Amount, OrderId, ReportPeriod, ReportWindow, ServiceId, Timezone, UserId};
use domain_ledger::ReservationKey;
use rust_decimal::Decimal;

/// Identifier shortcuts; panics on zero, which tests never pass
pub fn user(id: u32) -> UserId {
    UserId::new(id).expect("test user id must be positive")
}

pub fn service(id: u32) -> ServiceId {
    ServiceId::new(id).expect("test service id must be positive")
}

pub fn order(id: u32) -> OrderId {
    OrderId::new(id).expect("test order id must be positive")
}

/// Reservation key for `(user, service, order)`
pub fn key(user_id: u32, service_id: u32, order_id: u32) -> ReservationKey {
    ReservationKey::new(user(user_id), service(service_id), order(order_id))
}

/// A valid amount; panics on values the ledger would reject
pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).expect("test amount must be positive with at most two decimals")
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Instant most scenarios start from (2024-03-15 10:00 UTC)
    pub fn mid_march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    pub fn march() -> ReportPeriod {
        ReportPeriod::parse("2024-03").unwrap()
    }

    pub fn april() -> ReportPeriod {
        ReportPeriod::parse("2024-04").unwrap()
    }

    /// `[2024-03-01, 2024-04-01)` in UTC
    pub fn march_window() -> ReportWindow {
        Self::march().window(&Timezone::default()).unwrap()
    }
}
