//! Port definitions for the ledger domain
//!
//! The engine talks to storage only through these traits. A store opens
//! [`LedgerUnit`]s: all-or-nothing units of work spanning several balance,
//! reservation, audit and revenue writes. Read-only queries run outside units.
//!
//! # Adapters
//!
//! - `InMemoryLedgerStore` (this crate): tests and the `memory` storage mode
//! - `PostgresLedgerStore` (infra_db): production

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::{DomainPort, PortError, ReportWindow, UserId};
use rust_decimal::Decimal;

use crate::account::AccountBalance;
use crate::audit::{AuditEntry, AuditQuery, NewAuditEntry};
use crate::report::{ContentHash, ReportArtifact, ReportRetention};
use crate::reservation::{Reservation, ReservationKey};
use crate::revenue::{RevenueEntry, ServiceRevenue};

/// Durable ledger storage
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Opens a unit of work. Statements run through the unit must not wait
    /// past `deadline`; an adapter that cannot honor it reports a timeout.
    async fn begin(&self, deadline: Instant) -> Result<Box<dyn LedgerUnit>, PortError>;

    /// Registers a user. Returns false when the user already existed.
    async fn register_user(&self, user_id: UserId) -> Result<bool, PortError>;

    async fn user_exists(&self, user_id: UserId) -> Result<bool, PortError>;

    /// Current balances, or None when the user has no account row
    async fn account(&self, user_id: UserId) -> Result<Option<AccountBalance>, PortError>;

    /// History for the query's user, sorted and paged by the query
    async fn audit_entries(
        &self,
        query: &AuditQuery,
        default_limit: u64,
    ) -> Result<Vec<AuditEntry>, PortError>;

    /// Recognized revenue per service within the window, ordered by service id
    async fn revenue_totals(&self, window: &ReportWindow) -> Result<Vec<ServiceRevenue>, PortError>;

    /// Open reservations created strictly before the cutoff
    async fn reservations_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, PortError>;
}

/// A single atomic unit of work
///
/// Nothing written through a unit is visible to other readers until
/// [`LedgerUnit::commit`] succeeds. A unit dropped without commit is rolled
/// back.
#[async_trait]
pub trait LedgerUnit: Send {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool, PortError>;

    /// Locks the account row for the rest of the unit and returns it
    async fn lock_account(&mut self, user_id: UserId) -> Result<Option<AccountBalance>, PortError>;

    async fn create_account_if_absent(&mut self, user_id: UserId) -> Result<(), PortError>;

    /// Adds `delta` to `main`
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` if the result would be negative, `NotFound` if the
    /// account row does not exist.
    async fn adjust_main(&mut self, user_id: UserId, delta: Decimal)
        -> Result<AccountBalance, PortError>;

    /// Adds `delta` to `reserved`, with the same failure modes as `adjust_main`
    async fn adjust_reserved(
        &mut self,
        user_id: UserId,
        delta: Decimal,
    ) -> Result<AccountBalance, PortError>;

    /// Fails with `Conflict` when a reservation is already open for the key
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), PortError>;

    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<Reservation>, PortError>;

    /// Fails with `NotFound` when no reservation is open for the key
    async fn delete_reservation(&mut self, key: &ReservationKey) -> Result<(), PortError>;

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), PortError>;

    async fn append_revenue(&mut self, entry: &RevenueEntry) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// Content-addressed storage for rendered reports
#[async_trait]
pub trait ArtifactStore: DomainPort {
    /// Stores the bytes under their hash and returns the storage location.
    /// Storing identical content twice is a no-op returning the same location.
    async fn put(&self, hash: &ContentHash, bytes: &[u8]) -> Result<String, PortError>;

    async fn get(&self, location: &str) -> Result<Vec<u8>, PortError>;

    async fn remove(&self, location: &str) -> Result<(), PortError>;
}

/// Index of generated reports keyed by content hash
#[async_trait]
pub trait ReportRegistry: DomainPort {
    /// Records an artifact. Under `SingleSlot` retention every other artifact
    /// is evicted and returned. Recording a hash already present keeps the
    /// existing row.
    async fn record(
        &self,
        artifact: &ReportArtifact,
        retention: ReportRetention,
    ) -> Result<Vec<ReportArtifact>, PortError>;

    async fn lookup(&self, hash: &ContentHash) -> Result<Option<ReportArtifact>, PortError>;
}
