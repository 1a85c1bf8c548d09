//! Ledger configuration passed explicitly to the engine and generator

use std::time::Duration;

use core_kernel::Timezone;

use crate::report::ReportRetention;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Upper bound on waiting for account locks and a storage transaction
    pub lock_timeout: Duration,
    /// Row cap for history queries without paging
    pub default_page_limit: u64,
    pub report_retention: ReportRetention,
    /// Zone in which report months are interpreted
    pub report_timezone: Timezone,
    /// Open reservations older than this are released by the reaper
    pub reservation_ttl: Option<Duration>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            default_page_limit: 1000,
            report_retention: ReportRetention::KeepHistory,
            report_timezone: Timezone::default(),
            reservation_ttl: None,
        }
    }
}
