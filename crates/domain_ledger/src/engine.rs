//! The ledger engine
//!
//! Every money movement runs as one all-or-nothing unit against the
//! [`LedgerStore`]:
//!
//! 1. lock the touched accounts in ascending user id order
//! 2. open a unit of work (bounded by the same deadline)
//! 3. validate, mutate balances and reservations, append audit rows
//! 4. commit, or roll back on any failure
//!
//! Settlement adds a compensation step: if anything fails after the
//! reservation was found, the reservation is released in a second unit so
//! funds never stay stuck in `reserved`. A failed compensation is reported
//! as [`LedgerError::Inconsistent`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use core_kernel::{Amount, Clock, OperationMetadata, SystemClock, UserId};
use tracing::{debug, error, info, instrument, warn};

use crate::account::AccountBalance;
use crate::audit::{descriptions, AuditEntry, AuditQuery, NewAuditEntry};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::locks::{AccountGuard, AccountLocks};
use crate::ports::{LedgerStore, LedgerUnit};
use crate::reservation::{Reservation, ReservationKey, Settlement};
use crate::revenue::RevenueEntry;

/// Balances of both parties after a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: AccountBalance,
    pub to: AccountBalance,
}

/// Result of a successful settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub account: AccountBalance,
    pub revenue: RevenueEntry,
}

pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    locks: AccountLocks,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            locks: AccountLocks::new(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the time source used for audit and revenue timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Users and reads
    // ------------------------------------------------------------------

    /// Registers a user. Idempotent; returns false if already registered.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn register_user(&self, user_id: UserId) -> Result<bool, LedgerError> {
        let created = self.store.register_user(user_id).await?;
        if created {
            info!("User registered");
        }
        Ok(created)
    }

    /// Current balances of a user
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown users and for users without an account row.
    pub async fn balance(&self, user_id: UserId) -> Result<AccountBalance, LedgerError> {
        match self.store.account(user_id).await? {
            Some(account) => Ok(account),
            None if self.store.user_exists(user_id).await? => Err(LedgerError::not_found(
                format!("account of user {}", user_id),
            )),
            None => Err(LedgerError::not_found(format!("user {}", user_id))),
        }
    }

    /// Transaction history; unknown users yield an empty list
    pub async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, LedgerError> {
        Ok(self
            .store
            .audit_entries(query, self.config.default_page_limit)
            .await?)
    }

    // ------------------------------------------------------------------
    // Money movements
    // ------------------------------------------------------------------

    /// Credits `main`, creating the account on first use
    #[instrument(skip_all, fields(user_id = %user_id, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn top_up(
        &self,
        user_id: UserId,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<AccountBalance, LedgerError> {
        let (_guard, mut unit) = self.open(&[user_id], meta).await?;
        let now = self.clock.now();

        let outcome = async {
            require_user(unit.as_mut(), user_id).await?;
            unit.create_account_if_absent(user_id).await?;
            let account = unit.adjust_main(user_id, amount.value()).await?;
            unit.append_audit(&NewAuditEntry::new(user_id, amount, descriptions::REPLENISHED, now))
                .await?;
            Ok::<_, LedgerError>(account)
        }
        .await;

        let account = self
            .finish(unit, outcome, "top_up", || format!("user {} amount {}", user_id, amount))
            .await?;
        info!(main = %account.main, "Account replenished");
        Ok(account)
    }

    /// Debits `main`
    #[instrument(skip_all, fields(user_id = %user_id, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<AccountBalance, LedgerError> {
        let (_guard, mut unit) = self.open(&[user_id], meta).await?;
        let now = self.clock.now();

        let outcome = async {
            require_user(unit.as_mut(), user_id).await?;
            require_account(unit.as_mut(), user_id).await?;
            let account = unit.adjust_main(user_id, amount.negated()).await?;
            unit.append_audit(&NewAuditEntry::new(user_id, amount, descriptions::DEBITED, now))
                .await?;
            Ok::<_, LedgerError>(account)
        }
        .await;

        let account = self
            .finish(unit, outcome, "withdraw", || format!("user {} amount {}", user_id, amount))
            .await?;
        info!(main = %account.main, "Money withdrawn");
        Ok(account)
    }

    /// Moves `amount` from one user's `main` to another's
    ///
    /// Both balance changes and both audit rows commit together or not at all.
    #[instrument(skip_all, fields(from = %from, to = %to, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<TransferReceipt, LedgerError> {
        if from == to {
            return Err(LedgerError::bad_request("cannot transfer money to the same user"));
        }

        let (_guard, mut unit) = self.open(&[from, to], meta).await?;
        let now = self.clock.now();

        let outcome = async {
            require_user(unit.as_mut(), from).await?;
            require_user(unit.as_mut(), to).await?;

            let (low, high) = if from < to { (from, to) } else { (to, from) };
            require_account(unit.as_mut(), low).await?;
            require_account(unit.as_mut(), high).await?;

            let debited = unit.adjust_main(from, amount.negated()).await?;
            let credited = unit.adjust_main(to, amount.value()).await?;

            unit.append_audit(&NewAuditEntry::new(from, amount, descriptions::transfer_out(to), now))
                .await?;
            unit.append_audit(&NewAuditEntry::new(to, amount, descriptions::transfer_in(from), now))
                .await?;

            Ok::<_, LedgerError>(TransferReceipt {
                from: debited,
                to: credited,
            })
        }
        .await;

        let receipt = self
            .finish(unit, outcome, "transfer", || {
                format!("from user {} to user {} amount {}", from, to, amount)
            })
            .await?;
        info!("Money transferred");
        Ok(receipt)
    }

    /// Moves `amount` from `main` to `reserved` and opens a reservation
    #[instrument(skip_all, fields(key = %key, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn reserve(
        &self,
        key: ReservationKey,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<AccountBalance, LedgerError> {
        let user_id = key.user_id;
        let (_guard, mut unit) = self.open(&[user_id], meta).await?;
        let reservation = Reservation::open(key, amount, self.clock.now());

        let outcome = async {
            require_user(unit.as_mut(), user_id).await?;
            require_account(unit.as_mut(), user_id).await?;
            if unit.find_reservation(&key).await?.is_some() {
                return Err(LedgerError::Conflict(format!(
                    "reservation already open for {}",
                    key
                )));
            }

            unit.adjust_main(user_id, amount.negated()).await?;
            let account = unit.adjust_reserved(user_id, amount.value()).await?;
            unit.insert_reservation(&reservation).await?;
            unit.append_audit(&reservation.opening_audit()).await?;
            Ok::<_, LedgerError>(account)
        }
        .await;

        let account = self
            .finish(unit, outcome, "reserve", || format!("{} amount {}", key, amount))
            .await?;
        info!(reserved = %account.reserved, "Money reserved");
        Ok(account)
    }

    /// Settles an open reservation, recognizing its amount as revenue
    ///
    /// # Errors
    ///
    /// - `NotFound` if no reservation is open for the key with exactly this amount
    /// - `InsufficientFunds` if `reserved` is below the amount
    /// - the original failure if a later step failed and the reservation was
    ///   released instead
    /// - `Inconsistent` if that release failed as well
    #[instrument(skip_all, fields(key = %key, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn accept_revenue(
        &self,
        key: ReservationKey,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<SettlementReceipt, LedgerError> {
        let context = || format!("{} amount {}", key, amount);
        let (_guard, mut unit) = self.open(&[key.user_id], meta).await?;

        let reservation = match find_settleable(unit.as_mut(), &key, amount).await {
            Ok(reservation) => reservation,
            Err(err) => return self.finish(unit, Err(err), "accept_revenue", context).await,
        };

        let settlement = reservation.settle(self.clock.now());
        let failure = match apply_settlement(unit.as_mut(), &settlement).await {
            Ok(account) => match unit.commit().await {
                Ok(()) => {
                    info!(reserved = %account.reserved, "Revenue accepted");
                    return Ok(SettlementReceipt {
                        account,
                        revenue: settlement.revenue,
                    });
                }
                Err(err) => LedgerError::from(err),
            },
            Err(err) => {
                if let Err(rollback) = unit.rollback().await {
                    return Err(self.inconsistent(
                        "accept_revenue",
                        format!("{}; settlement failed: {}; rollback failed: {}", context(), err, rollback),
                    ));
                }
                err
            }
        };

        warn!(error = %failure, "Settlement failed, releasing reservation");
        match self.compensate(key, amount).await {
            Ok(account) => {
                warn!(main = %account.main, "Reservation released after failed settlement");
                Err(failure)
            }
            Err(compensation) => Err(self.inconsistent(
                "accept_revenue",
                format!(
                    "{}; settlement failed: {}; compensating release failed: {}",
                    context(),
                    failure,
                    compensation
                ),
            )),
        }
    }

    /// Returns reserved funds to `main` without recognizing revenue
    #[instrument(skip_all, fields(key = %key, amount = %amount, correlation_id = ?meta.correlation_id))]
    pub async fn release(
        &self,
        key: ReservationKey,
        amount: Amount,
        meta: &OperationMetadata,
    ) -> Result<AccountBalance, LedgerError> {
        let (_guard, mut unit) = self.open(&[key.user_id], meta).await?;
        let now = self.clock.now();

        let outcome = async {
            require_user(unit.as_mut(), key.user_id).await?;
            release_in_unit(unit.as_mut(), &key, amount, now).await
        }
        .await;

        let account = self
            .finish(unit, outcome, "release", || format!("{} amount {}", key, amount))
            .await?;
        info!(main = %account.main, "Reservation released");
        Ok(account)
    }

    /// Releases every reservation opened more than `ttl` ago
    ///
    /// Reservations resolved concurrently are skipped. Returns how many were
    /// released.
    #[instrument(skip_all, fields(ttl_secs = ttl.as_secs()))]
    pub async fn release_expired(
        &self,
        ttl: Duration,
        meta: &OperationMetadata,
    ) -> Result<usize, LedgerError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| LedgerError::bad_request(format!("invalid reservation ttl: {}", e)))?;
        let cutoff = self.clock.now() - ttl;
        let expired = self.store.reservations_created_before(cutoff).await?;

        let mut released = 0;
        for reservation in expired {
            match self.release(reservation.key, reservation.amount, meta).await {
                Ok(_) => released += 1,
                Err(err) if err.is_not_found() => {
                    debug!(key = %reservation.key, "Reservation already resolved");
                }
                Err(err @ LedgerError::Inconsistent { .. }) => return Err(err),
                Err(err) => {
                    warn!(key = %reservation.key, error = %err, "Failed to release expired reservation");
                }
            }
        }

        if released > 0 {
            info!(released, "Expired reservations released");
        }
        Ok(released)
    }

    // ------------------------------------------------------------------
    // Unit handling
    // ------------------------------------------------------------------

    /// Locks the accounts and opens a unit, both bounded by one deadline
    async fn open(
        &self,
        users: &[UserId],
        meta: &OperationMetadata,
    ) -> Result<(AccountGuard, Box<dyn LedgerUnit>), LedgerError> {
        let deadline = meta.effective_deadline(self.config.lock_timeout);
        let guard = self.locks.acquire(users, deadline).await?;
        let unit = self.begin(deadline).await?;
        Ok((guard, unit))
    }

    async fn begin(&self, deadline: Instant) -> Result<Box<dyn LedgerUnit>, LedgerError> {
        let bound = tokio::time::Instant::from_std(deadline);
        match tokio::time::timeout_at(bound, self.store.begin(deadline)).await {
            Ok(unit) => Ok(unit?),
            Err(_) => Err(LedgerError::Timeout(
                "could not open a storage transaction in time".to_string(),
            )),
        }
    }

    /// Commits on success, rolls back on failure
    async fn finish<T>(
        &self,
        unit: Box<dyn LedgerUnit>,
        outcome: Result<T, LedgerError>,
        operation: &'static str,
        context: impl FnOnce() -> String,
    ) -> Result<T, LedgerError> {
        match outcome {
            Ok(value) => {
                unit.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = unit.rollback().await {
                    return Err(self.inconsistent(
                        operation,
                        format!("{}; failed with: {}; rollback failed: {}", context(), err, rollback),
                    ));
                }
                debug!(operation, error = %err, "Operation rolled back");
                Err(err)
            }
        }
    }

    /// Releases the reservation in a fresh unit. The caller already holds
    /// the account lock.
    async fn compensate(&self, key: ReservationKey, amount: Amount) -> Result<AccountBalance, LedgerError> {
        let mut unit = self.begin(Instant::now() + self.config.lock_timeout).await?;
        let outcome = release_in_unit(unit.as_mut(), &key, amount, self.clock.now()).await;
        self.finish(unit, outcome, "release", || format!("{} amount {}", key, amount))
            .await
    }

    fn inconsistent(&self, operation: &str, context: String) -> LedgerError {
        error!(operation, %context, "Ledger left in an inconsistent state");
        LedgerError::Inconsistent {
            operation: operation.to_string(),
            context,
        }
    }
}

async fn require_user(unit: &mut dyn LedgerUnit, user_id: UserId) -> Result<(), LedgerError> {
    if unit.user_exists(user_id).await? {
        Ok(())
    } else {
        Err(LedgerError::not_found(format!("user {}", user_id)))
    }
}

async fn require_account(
    unit: &mut dyn LedgerUnit,
    user_id: UserId,
) -> Result<AccountBalance, LedgerError> {
    unit.lock_account(user_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("account of user {}", user_id)))
}

async fn find_open(
    unit: &mut dyn LedgerUnit,
    key: &ReservationKey,
    amount: Amount,
) -> Result<Reservation, LedgerError> {
    match unit.find_reservation(key).await? {
        Some(reservation) if reservation.matches(amount) => Ok(reservation),
        _ => Err(LedgerError::not_found(format!(
            "no open reservation for {} with amount {}",
            key, amount
        ))),
    }
}

/// Lookup half of settlement; nothing is mutated here
async fn find_settleable(
    unit: &mut dyn LedgerUnit,
    key: &ReservationKey,
    amount: Amount,
) -> Result<Reservation, LedgerError> {
    require_user(unit, key.user_id).await?;
    let reservation = find_open(unit, key, amount).await?;
    let account = require_account(unit, key.user_id).await?;
    if account.reserved.value() < amount.value() {
        return Err(LedgerError::InsufficientFunds(format!(
            "reserved balance {} of user {} is below {}",
            account.reserved, key.user_id, amount
        )));
    }
    Ok(reservation)
}

async fn apply_settlement(
    unit: &mut dyn LedgerUnit,
    settlement: &Settlement,
) -> Result<AccountBalance, LedgerError> {
    let account = unit
        .adjust_reserved(settlement.key.user_id, settlement.amount.negated())
        .await?;
    unit.delete_reservation(&settlement.key).await?;
    unit.append_revenue(&settlement.revenue).await?;
    unit.append_audit(&settlement.audit).await?;
    Ok(account)
}

/// The Open → Released transition
async fn release_in_unit(
    unit: &mut dyn LedgerUnit,
    key: &ReservationKey,
    amount: Amount,
    now: DateTime<Utc>,
) -> Result<AccountBalance, LedgerError> {
    let reservation = find_open(unit, key, amount).await?;
    require_account(unit, key.user_id).await?;

    let release = reservation.release(now);
    unit.adjust_reserved(key.user_id, amount.negated()).await?;
    let account = unit.adjust_main(key.user_id, amount.value()).await?;
    unit.delete_reservation(key).await?;
    unit.append_audit(&release.audit).await?;
    Ok(account)
}
