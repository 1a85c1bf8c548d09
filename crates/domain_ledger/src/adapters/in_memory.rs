//! In-memory ledger store and report registry
//!
//! Units of work hold the store's state mutex for their whole lifetime and
//! keep a snapshot taken at `begin`. Rollback (explicit or on drop) restores
//! the snapshot, so a failed unit leaves no trace.
//!
//! A [`FaultPlan`] can make any unit step fail, which lets tests prove that
//! multi-step operations are all-or-nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::{
    Balance, DomainPort, HealthCheckResult, HealthCheckable, PortError, ReportWindow, ServiceId,
    UserId,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::account::AccountBalance;
use crate::audit::{AuditEntry, AuditQuery, NewAuditEntry};
use crate::ports::{LedgerStore, LedgerUnit, ReportRegistry};
use crate::report::{ContentHash, ReportArtifact, ReportRetention};
use crate::reservation::{Reservation, ReservationKey};
use crate::revenue::{RevenueEntry, ServiceRevenue};

/// A unit step at which a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    AdjustMain,
    AdjustReserved,
    InsertReservation,
    DeleteReservation,
    AppendAudit,
    AppendRevenue,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Copy)]
enum FaultRule {
    /// Fail only the nth call (1-based)
    Once(usize),
    /// Fail the nth call and every later one
    From(usize),
}

/// Failures to inject, counted per fault point across all units
#[derive(Debug, Default)]
pub struct FaultPlan {
    rules: Mutex<HashMap<FaultPoint, Vec<FaultRule>>>,
    calls: Mutex<HashMap<FaultPoint, usize>>,
}

impl FaultPlan {
    /// Fails the `nth` call at `point`, counting from 1
    pub fn fail_at(&self, point: FaultPoint, nth: usize) {
        self.add(point, FaultRule::Once(nth.max(1)));
    }

    /// Fails every call at `point` from now on
    pub fn fail_always(&self, point: FaultPoint) {
        let next = self.calls_at(point) + 1;
        self.add(point, FaultRule::From(next));
    }

    /// Removes all rules and resets the call counters
    pub fn clear(&self) {
        lock(&self.rules).clear();
        lock(&self.calls).clear();
    }

    /// How many times `point` has been reached
    pub fn calls_at(&self, point: FaultPoint) -> usize {
        lock(&self.calls).get(&point).copied().unwrap_or(0)
    }

    fn add(&self, point: FaultPoint, rule: FaultRule) {
        lock(&self.rules).entry(point).or_default().push(rule);
    }

    fn check(&self, point: FaultPoint) -> Result<(), PortError> {
        let call = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(point).or_insert(0);
            *count += 1;
            *count
        };

        let rules = lock(&self.rules);
        let triggered = rules.get(&point).is_some_and(|rules| {
            rules.iter().any(|rule| match *rule {
                FaultRule::Once(n) => call == n,
                FaultRule::From(n) => call >= n,
            })
        });

        if triggered {
            Err(PortError::internal(format!("injected fault at {:?} (call {})", point, call)))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    users: BTreeSet<UserId>,
    accounts: BTreeMap<UserId, AccountBalance>,
    reservations: BTreeMap<ReservationKey, Reservation>,
    audit: Vec<AuditEntry>,
    revenue: Vec<RevenueEntry>,
    next_sequence: i64,
}

/// Thread-safe in-memory ledger store
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<AsyncMutex<LedgerState>>,
    faults: Arc<FaultPlan>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault plan consulted by every unit this store opens
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Every account row, ordered by user id
    pub async fn accounts(&self) -> Vec<AccountBalance> {
        self.state.lock().await.accounts.values().copied().collect()
    }

    /// Every open reservation
    pub async fn open_reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.values().cloned().collect()
    }

    /// Every revenue entry in commit order
    pub async fn revenue_entries(&self) -> Vec<RevenueEntry> {
        self.state.lock().await.revenue.clone()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    /// Units serialize on one mutex; the engine bounds the wait for it
    async fn begin(&self, _deadline: Instant) -> Result<Box<dyn LedgerUnit>, PortError> {
        self.faults.check(FaultPoint::Begin)?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = (*guard).clone();
        Ok(Box::new(InMemoryLedgerUnit {
            state: guard,
            snapshot: Some(snapshot),
            faults: Arc::clone(&self.faults),
        }))
    }

    async fn register_user(&self, user_id: UserId) -> Result<bool, PortError> {
        Ok(self.state.lock().await.users.insert(user_id))
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, PortError> {
        Ok(self.state.lock().await.users.contains(&user_id))
    }

    async fn account(&self, user_id: UserId) -> Result<Option<AccountBalance>, PortError> {
        Ok(self.state.lock().await.accounts.get(&user_id).copied())
    }

    async fn audit_entries(
        &self,
        query: &AuditQuery,
        default_limit: u64,
    ) -> Result<Vec<AuditEntry>, PortError> {
        let state = self.state.lock().await;
        Ok(query.apply(&state.audit, default_limit))
    }

    async fn revenue_totals(&self, window: &ReportWindow) -> Result<Vec<ServiceRevenue>, PortError> {
        let state = self.state.lock().await;
        let mut totals: BTreeMap<ServiceId, Decimal> = BTreeMap::new();
        for entry in state.revenue.iter().filter(|e| window.contains(e.recognized_at)) {
            *totals.entry(entry.service_id).or_default() += entry.amount.value();
        }
        Ok(totals
            .into_iter()
            .map(|(service_id, total)| ServiceRevenue { service_id, total })
            .collect())
    }

    async fn reservations_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.is_expired(cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in_memory_ledger", 0)
    }
}

struct InMemoryLedgerUnit {
    state: OwnedMutexGuard<LedgerState>,
    /// Present until the unit is committed or rolled back
    snapshot: Option<LedgerState>,
    faults: Arc<FaultPlan>,
}

impl InMemoryLedgerUnit {
    fn account_mut(&mut self, user_id: UserId) -> Result<&mut AccountBalance, PortError> {
        self.state
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| PortError::not_found("account", user_id))
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

impl Drop for InMemoryLedgerUnit {
    fn drop(&mut self) {
        self.restore();
    }
}

fn apply_delta(balance: Balance, delta: Decimal, what: &str, user_id: UserId) -> Result<Balance, PortError> {
    balance.apply(delta).map_err(|e| match e {
        core_kernel::MoneyError::InsufficientFunds { balance, requested } => PortError::insufficient_funds(
            format!("{} balance {} of user {} is below {}", what, balance, user_id, requested),
        ),
        other => PortError::validation(other.to_string()),
    })
}

#[async_trait]
impl LedgerUnit for InMemoryLedgerUnit {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool, PortError> {
        Ok(self.state.users.contains(&user_id))
    }

    async fn lock_account(&mut self, user_id: UserId) -> Result<Option<AccountBalance>, PortError> {
        Ok(self.state.accounts.get(&user_id).copied())
    }

    async fn create_account_if_absent(&mut self, user_id: UserId) -> Result<(), PortError> {
        self.state
            .accounts
            .entry(user_id)
            .or_insert_with(|| AccountBalance::empty(user_id));
        Ok(())
    }

    async fn adjust_main(&mut self, user_id: UserId, delta: Decimal) -> Result<AccountBalance, PortError> {
        self.faults.check(FaultPoint::AdjustMain)?;
        let account = self.account_mut(user_id)?;
        account.main = apply_delta(account.main, delta, "main", user_id)?;
        Ok(*account)
    }

    async fn adjust_reserved(
        &mut self,
        user_id: UserId,
        delta: Decimal,
    ) -> Result<AccountBalance, PortError> {
        self.faults.check(FaultPoint::AdjustReserved)?;
        let account = self.account_mut(user_id)?;
        account.reserved = apply_delta(account.reserved, delta, "reserved", user_id)?;
        Ok(*account)
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), PortError> {
        self.faults.check(FaultPoint::InsertReservation)?;
        if self.state.reservations.contains_key(&reservation.key) {
            return Err(PortError::conflict(format!(
                "reservation already open for {}",
                reservation.key
            )));
        }
        self.state
            .reservations
            .insert(reservation.key, reservation.clone());
        Ok(())
    }

    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<Reservation>, PortError> {
        Ok(self.state.reservations.get(key).cloned())
    }

    async fn delete_reservation(&mut self, key: &ReservationKey) -> Result<(), PortError> {
        self.faults.check(FaultPoint::DeleteReservation)?;
        self.state
            .reservations
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PortError::not_found("reservation", key))
    }

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), PortError> {
        self.faults.check(FaultPoint::AppendAudit)?;
        self.state.next_sequence += 1;
        let sequence = self.state.next_sequence;
        self.state.audit.push(AuditEntry::from_new(sequence, entry.clone()));
        Ok(())
    }

    async fn append_revenue(&mut self, entry: &RevenueEntry) -> Result<(), PortError> {
        self.faults.check(FaultPoint::AppendRevenue)?;
        self.state.revenue.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let mut unit = self;
        unit.faults.check(FaultPoint::Commit)?;
        unit.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        let mut unit = self;
        unit.restore();
        unit.faults.check(FaultPoint::Rollback)
    }
}

/// In-memory report registry
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportRegistry {
    artifacts: Arc<RwLock<BTreeMap<ContentHash, ReportArtifact>>>,
}

impl InMemoryReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

impl DomainPort for InMemoryReportRegistry {}

#[async_trait]
impl ReportRegistry for InMemoryReportRegistry {
    async fn record(
        &self,
        artifact: &ReportArtifact,
        retention: ReportRetention,
    ) -> Result<Vec<ReportArtifact>, PortError> {
        let mut artifacts = self.artifacts.write().await;

        let evicted = match retention {
            ReportRetention::KeepHistory => Vec::new(),
            ReportRetention::SingleSlot => {
                let others: Vec<ContentHash> = artifacts
                    .keys()
                    .filter(|hash| **hash != artifact.hash)
                    .cloned()
                    .collect();
                others
                    .iter()
                    .filter_map(|hash| artifacts.remove(hash))
                    .collect()
            }
        };

        artifacts
            .entry(artifact.hash.clone())
            .or_insert_with(|| artifact.clone());
        Ok(evicted)
    }

    async fn lookup(&self, hash: &ContentHash) -> Result<Option<ReportArtifact>, PortError> {
        Ok(self.artifacts.read().await.get(hash).cloned())
    }
}
