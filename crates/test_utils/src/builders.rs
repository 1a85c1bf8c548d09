//! Test Harness Builders
//!
//! `LedgerHarnessBuilder` wires a `LedgerEngine` to an `InMemoryLedgerStore`
//! and a `ManualClock`, seeds users and balances, and hands back everything
//! a test needs to drive and inspect the ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use core_kernel::{ManualClock, OperationMetadata, UserId};
use domain_ledger::adapters::{FilesystemArtifactStore, InMemoryLedgerStore, InMemoryReportRegistry};
use domain_ledger::{
    LedgerConfig, LedgerEngine, LedgerError, LedgerStore, ReportGenerator, ReportRetention,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

use crate::fixtures::{amount, user, TemporalFixtures};

/// Builder for a ledger wired to in-memory storage
pub struct LedgerHarnessBuilder {
    users: Vec<u32>,
    balances: Vec<(u32, Decimal)>,
    config: LedgerConfig,
    start: DateTime<Utc>,
}

impl Default for LedgerHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerHarnessBuilder {
    pub fn new() -> Self {
        Self {
            users: Vec::new(),
            balances: Vec::new(),
            config: LedgerConfig::default(),
            start: TemporalFixtures::mid_march(),
        }
    }

    /// Registers users without creating accounts
    pub fn with_users(mut self, ids: &[u32]) -> Self {
        self.users.extend_from_slice(ids);
        self
    }

    /// Registers the user and tops the account up to `main`
    pub fn with_balance(mut self, id: u32, main: Decimal) -> Self {
        self.users.push(id);
        self.balances.push((id, main));
        self
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retention(mut self, retention: ReportRetention) -> Self {
        self.config.report_retention = retention;
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub async fn build(self) -> LedgerHarness {
        let store = Arc::new(InMemoryLedgerStore::new());
        let clock = Arc::new(ManualClock::new(self.start));
        let engine = Arc::new(
            LedgerEngine::new(store.clone(), self.config.clone()).with_clock(clock.clone()),
        );
        let meta = OperationMetadata::with_correlation_id("test");

        for id in &self.users {
            engine.register_user(user(*id)).await.expect("register test user");
        }
        for (id, main) in &self.balances {
            engine
                .top_up(user(*id), amount(*main), &meta)
                .await
                .expect("seed test balance");
        }

        LedgerHarness {
            store,
            engine,
            clock,
            config: self.config,
            meta,
        }
    }
}

/// A ledger ready for a test
pub struct LedgerHarness {
    pub store: Arc<InMemoryLedgerStore>,
    pub engine: Arc<LedgerEngine>,
    pub clock: Arc<ManualClock>,
    pub config: LedgerConfig,
    pub meta: OperationMetadata,
}

impl LedgerHarness {
    pub fn builder() -> LedgerHarnessBuilder {
        LedgerHarnessBuilder::new()
    }

    /// `(main, reserved)` of a user, or None without an account row
    pub async fn balances(&self, user_id: UserId) -> Option<(Decimal, Decimal)> {
        self.store
            .account(user_id)
            .await
            .expect("in-memory reads do not fail")
            .map(|a| (a.main.value(), a.reserved.value()))
    }

    /// Amounts of the user's history in commit order
    pub async fn audit_amounts(&self, user_id: UserId) -> Result<Vec<Decimal>, LedgerError> {
        let query = domain_ledger::AuditQuery::for_user(user_id);
        Ok(self
            .engine
            .audit_entries(&query)
            .await?
            .into_iter()
            .map(|e| e.amount.value())
            .collect())
    }

    /// Sum of `main + reserved` over every account
    pub async fn total_held(&self) -> Decimal {
        self.store.accounts().await.iter().map(|a| a.total()).sum()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// A report generator over this ledger, storing files in a fresh temp dir
    pub async fn report_generator(&self) -> (ReportGenerator, Arc<InMemoryReportRegistry>, TempDir) {
        let dir = TempDir::new().expect("create report dir");
        let artifacts = FilesystemArtifactStore::new(dir.path())
            .await
            .expect("create artifact store");
        let registry = Arc::new(InMemoryReportRegistry::new());
        let generator = ReportGenerator::new(
            self.store.clone(),
            Arc::new(artifacts),
            registry.clone(),
            &self.config,
        )
        .with_clock(self.clock.clone());
        (generator, registry, dir)
    }
}
