//! Bookkeeping reports
//!
//! A report sums recognized revenue per service over a half-open window,
//! renders it as header-less CSV (`service_id,total_amount`, ordered by
//! service id, two decimals), and stores the bytes under their SHA-256
//! hash. Identical revenue data always yields identical bytes and hash.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_kernel::{Clock, ReportPeriod, ReportWindow, SystemClock, Timezone, MONEY_SCALE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ports::{ArtifactStore, LedgerStore, ReportRegistry};
use crate::revenue::ServiceRevenue;

/// How many generated reports the registry keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRetention {
    /// Every report stays retrievable by its hash
    #[default]
    KeepHistory,
    /// Only the most recent report is kept
    SingleSlot,
}

impl FromStr for ReportRetention {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_history" => Ok(ReportRetention::KeepHistory),
            "single_slot" => Ok(ReportRetention::SingleSlot),
            other => Err(LedgerError::bad_request(format!(
                "unknown report retention '{}'",
                other
            ))),
        }
    }
}

/// Lowercase hex SHA-256 of a report's bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub const LEN: usize = 64;

    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Validates a hash received from a caller
    pub fn parse(input: &str) -> Result<Self, LedgerError> {
        let valid = input.len() == Self::LEN
            && input.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(LedgerError::bad_request(format!(
                "report hash must be {} lowercase hex characters",
                Self::LEN
            )));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character prefix used to fan out storage directories
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl TryFrom<String> for ContentHash {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub hash: ContentHash,
    pub location: String,
    pub window: ReportWindow,
    pub created_at: DateTime<Utc>,
}

/// Renders revenue rows as header-less CSV
///
/// Rows with a zero total are dropped and the rest are ordered by service id.
pub fn render_csv(rows: &[ServiceRevenue]) -> Result<Vec<u8>, LedgerError> {
    let mut rows: Vec<ServiceRevenue> = rows.iter().copied().filter(|r| !r.total.is_zero()).collect();
    rows.sort_by_key(|r| r.service_id);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for row in rows {
        let mut total = row.total;
        total.rescale(MONEY_SCALE);
        writer
            .write_record([row.service_id.to_string(), total.to_string()])
            .map_err(|e| LedgerError::internal(format!("failed to render report: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| LedgerError::internal(format!("failed to render report: {}", e)))
}

pub struct ReportGenerator {
    store: Arc<dyn LedgerStore>,
    artifacts: Arc<dyn ArtifactStore>,
    registry: Arc<dyn ReportRegistry>,
    clock: Arc<dyn Clock>,
    retention: ReportRetention,
    timezone: Timezone,
}

impl ReportGenerator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        artifacts: Arc<dyn ArtifactStore>,
        registry: Arc<dyn ReportRegistry>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            registry,
            clock: Arc::new(SystemClock),
            retention: config.report_retention,
            timezone: config.report_timezone,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn retention(&self) -> ReportRetention {
        self.retention
    }

    /// Generates the report for a calendar month in the configured timezone
    pub async fn generate_for_period(&self, period: ReportPeriod) -> Result<ReportArtifact, LedgerError> {
        let window = period.window(&self.timezone)?;
        self.generate(window).await
    }

    /// Aggregates, renders, stores and registers a report for `[start, end)`
    #[instrument(skip_all, fields(window = %window))]
    pub async fn generate(&self, window: ReportWindow) -> Result<ReportArtifact, LedgerError> {
        let totals = self.store.revenue_totals(&window).await?;
        let bytes = render_csv(&totals)?;
        let hash = ContentHash::of(&bytes);

        let location = self.artifacts.put(&hash, &bytes).await?;
        let artifact = ReportArtifact {
            hash: hash.clone(),
            location: location.clone(),
            window,
            created_at: self.clock.now(),
        };

        let evicted = self.registry.record(&artifact, self.retention).await?;
        for old in evicted {
            if old.hash == hash || old.location == location {
                continue;
            }
            if let Err(e) = self.artifacts.remove(&old.location).await {
                warn!(hash = %old.hash, error = %e, "Failed to remove evicted report");
            }
        }

        info!(hash = %hash, services = totals.len(), size = bytes.len(), "Report generated");
        Ok(artifact)
    }

    /// Looks up a report by hash
    pub async fn retrieve(&self, hash: &str) -> Result<ReportArtifact, LedgerError> {
        let hash = ContentHash::parse(hash)?;
        self.registry
            .lookup(&hash)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("report {}", hash)))
    }

    /// Looks up a report and reads its bytes, verifying them against the hash
    pub async fn fetch(&self, hash: &str) -> Result<(ReportArtifact, Vec<u8>), LedgerError> {
        let artifact = self.retrieve(hash).await?;
        let bytes = self.artifacts.get(&artifact.location).await?;

        if ContentHash::of(&bytes) != artifact.hash {
            return Err(LedgerError::internal(format!(
                "report {} failed its integrity check",
                artifact.hash
            )));
        }
        Ok((artifact, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::ServiceId;
    use rust_decimal_macros::dec;

    fn row(service: u32, total: rust_decimal::Decimal) -> ServiceRevenue {
        ServiceRevenue {
            service_id: ServiceId::new(service).unwrap(),
            total,
        }
    }

    #[test]
    fn test_csv_is_sorted_without_header() {
        let bytes = render_csv(&[row(10, dec!(5)), row(2, dec!(12.5))]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "2,12.50\n10,5.00\n");
    }

    #[test]
    fn test_zero_totals_dropped() {
        let bytes = render_csv(&[row(1, dec!(0)), row(3, dec!(1))]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "3,1.00\n");
    }

    #[test]
    fn test_empty_report() {
        assert!(render_csv(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_hash_of_known_input() {
        let hash = ContentHash::of(b"");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash.shard(), "e3");
    }

    #[test]
    fn test_hash_parse_rejects_bad_input() {
        assert!(ContentHash::parse("abc").is_err());
        assert!(ContentHash::parse(&"G".repeat(64)).is_err());
        assert!(ContentHash::parse(&"A".repeat(64)).is_err());
        assert!(ContentHash::parse(&"a".repeat(64)).is_ok());
        assert!(ContentHash::parse("../../etc/passwd").is_err());
    }

    #[test]
    fn test_retention_parse() {
        assert_eq!("single_slot".parse::<ReportRetention>().unwrap(), ReportRetention::SingleSlot);
        assert_eq!(ReportRetention::default(), ReportRetention::KeepHistory);
        assert!("forever".parse::<ReportRetention>().is_err());
    }
}
