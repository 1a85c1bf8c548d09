//! PostgreSQL Ledger Store
//!
//! Implements [`LedgerStore`] on top of a SQLx pool. Each [`LedgerUnit`] wraps
//! one database transaction:
//!
//! - `lock_account` and `find_reservation` take `SELECT ... FOR UPDATE` row
//!   locks, acquired in the order the engine asks for them
//! - balance changes are conditional updates (`... WHERE main + $2 >= 0`), so
//!   a balance can never go negative even if the in-process locks were
//!   bypassed; the `CHECK` constraints back this up
//! - reservation uniqueness is the primary key on `(user_id, service_id, order_id)`
//! - `lock_timeout` and `statement_timeout` are set per transaction from the
//!   caller's remaining deadline
//! - a unit dropped without commit is rolled back by SQLx

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    DomainPort, HealthCheckResult, HealthCheckable, PortError, ReportWindow, UserId,
};
use domain_ledger::{
    AccountBalance, AuditEntry, AuditQuery, LedgerStore, LedgerUnit, NewAuditEntry, Reservation,
    ReservationKey, RevenueEntry, ServiceRevenue, SortDirection, SortKey,
};
use rust_decimal::Decimal;

use super::rows::{convert_all, AccountRow, AuditRow, ReservationRow, RevenueTotalRow};
use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = "user_id, main, reserved";
const RESERVATION_COLUMNS: &str = "user_id, service_id, order_id, amount, created_at";

/// PostgreSQL-backed ledger storage
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => HealthCheckResult::healthy("postgres-ledger-store", latency_ms),
            Err(e) => HealthCheckResult::unhealthy(
                "postgres-ledger-store",
                latency_ms,
                format!("Database error: {}", e),
            ),
        }
    }
}

/// `ORDER BY` clause matching `AuditQuery::compare`
fn audit_order(query: &AuditQuery) -> &'static str {
    match query.sort() {
        None => "sequence ASC",
        Some((SortKey::Timestamp, SortDirection::Asc)) => "created_at ASC, sequence ASC",
        Some((SortKey::Timestamp, SortDirection::Desc)) => "created_at DESC, sequence DESC",
        Some((SortKey::Amount, SortDirection::Asc)) => "amount ASC, sequence ASC",
        Some((SortKey::Amount, SortDirection::Desc)) => "amount DESC, sequence ASC",
    }
}

/// Transaction-scoped timeouts so that row locks and statements inside a unit
/// give up once the remaining budget is spent. Postgres reads 0 as "no limit",
/// so the budget is clamped to at least one millisecond.
fn timeout_settings(remaining: Duration) -> [String; 2] {
    let ms = remaining.as_millis().clamp(1, i32::MAX as u128);
    [
        format!("SET LOCAL lock_timeout = {}", ms),
        format!("SET LOCAL statement_timeout = {}", ms),
    ]
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self, deadline: Instant) -> Result<Box<dyn LedgerUnit>, PortError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::transaction("begin", e))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(PortError::timeout("begin", Duration::ZERO));
        }
        for statement in timeout_settings(remaining) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from)?;
        }

        Ok(Box::new(PostgresLedgerUnit { tx, budget: remaining }))
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn register_user(&self, user_id: UserId) -> Result<bool, PortError> {
        let result = sqlx::query("INSERT INTO service_user (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, PortError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM service_user WHERE id = $1)")
            .bind(user_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(exists)
    }

    async fn account(&self, user_id: UserId) -> Result<Option<AccountBalance>, PortError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM account WHERE user_id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(AccountBalance::try_from).transpose()?)
    }

    #[instrument(skip_all, fields(user_id = %query.user_id))]
    async fn audit_entries(
        &self,
        query: &AuditQuery,
        default_limit: u64,
    ) -> Result<Vec<AuditEntry>, PortError> {
        let (offset, limit) = query.bounds(default_limit);
        let sql = format!(
            "SELECT sequence, user_id, amount, description, created_at
             FROM audit_entry
             WHERE user_id = $1
             ORDER BY {}
             LIMIT $2 OFFSET $3",
            audit_order(query)
        );

        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(query.user_id.as_i64())
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        debug!(count = rows.len(), "Fetched audit entries");
        Ok(convert_all(rows)?)
    }

    #[instrument(skip_all, fields(window = %window))]
    async fn revenue_totals(&self, window: &ReportWindow) -> Result<Vec<ServiceRevenue>, PortError> {
        let rows = sqlx::query_as::<_, RevenueTotalRow>(
            "SELECT service_id, SUM(amount) AS total
             FROM revenue_entry
             WHERE recognized_at >= $1 AND recognized_at < $2
             GROUP BY service_id
             ORDER BY service_id",
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(convert_all(rows)?)
    }

    async fn reservations_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, PortError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservation WHERE created_at < $1 ORDER BY created_at",
            RESERVATION_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(convert_all(rows)?)
    }
}

/// One database transaction
struct PostgresLedgerUnit {
    tx: Transaction<'static, Postgres>,
    /// What the server-side timeouts were set to
    budget: Duration,
}

impl PostgresLedgerUnit {
    fn fail(&self, error: sqlx::Error) -> PortError {
        match DatabaseError::from(error) {
            DatabaseError::StatementTimeout(message) => PortError::timeout(message, self.budget),
            other => other.into(),
        }
    }

    /// Conditional update of one balance column
    async fn adjust(
        &mut self,
        column: &'static str,
        user_id: UserId,
        delta: Decimal,
    ) -> Result<AccountBalance, PortError> {
        let sql = format!(
            "UPDATE account SET {col} = {col} + $2
             WHERE user_id = $1 AND {col} + $2 >= 0
             RETURNING {cols}",
            col = column,
            cols = ACCOUNT_COLUMNS
        );

        let updated = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_i64())
            .bind(delta)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| self.fail(e))?;

        if let Some(row) = updated {
            return Ok(AccountBalance::try_from(row)?);
        }

        let current = sqlx::query_scalar::<_, Decimal>(&format!(
            "SELECT {} FROM account WHERE user_id = $1",
            column
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;

        match current {
            None => Err(PortError::not_found("account", user_id)),
            Some(balance) => Err(PortError::insufficient_funds(format!(
                "{} balance {} of user {} is below {}",
                column,
                balance,
                user_id,
                -delta
            ))),
        }
    }
}

#[async_trait]
impl LedgerUnit for PostgresLedgerUnit {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool, PortError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM service_user WHERE id = $1)")
            .bind(user_id.as_i64())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(exists)
    }

    async fn lock_account(&mut self, user_id: UserId) -> Result<Option<AccountBalance>, PortError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM account WHERE user_id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;

        Ok(row.map(AccountBalance::try_from).transpose()?)
    }

    async fn create_account_if_absent(&mut self, user_id: UserId) -> Result<(), PortError> {
        sqlx::query("INSERT INTO account (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(())
    }

    async fn adjust_main(&mut self, user_id: UserId, delta: Decimal) -> Result<AccountBalance, PortError> {
        self.adjust("main", user_id, delta).await
    }

    async fn adjust_reserved(
        &mut self,
        user_id: UserId,
        delta: Decimal,
    ) -> Result<AccountBalance, PortError> {
        self.adjust("reserved", user_id, delta).await
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<(), PortError> {
        let key = reservation.key;
        let result = sqlx::query(
            "INSERT INTO reservation (user_id, service_id, order_id, amount, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, service_id, order_id) DO NOTHING",
        )
        .bind(key.user_id.as_i64())
        .bind(key.service_id.as_i64())
        .bind(key.order_id.as_i64())
        .bind(reservation.amount.value())
        .bind(reservation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;

        if result.rows_affected() == 0 {
            return Err(PortError::conflict(format!("reservation already open for {}", key)));
        }
        Ok(())
    }

    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<Reservation>, PortError> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservation
             WHERE user_id = $1 AND service_id = $2 AND order_id = $3
             FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(key.user_id.as_i64())
        .bind(key.service_id.as_i64())
        .bind(key.order_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;

        Ok(row.map(Reservation::try_from).transpose()?)
    }

    async fn delete_reservation(&mut self, key: &ReservationKey) -> Result<(), PortError> {
        let result = sqlx::query(
            "DELETE FROM reservation WHERE user_id = $1 AND service_id = $2 AND order_id = $3",
        )
        .bind(key.user_id.as_i64())
        .bind(key.service_id.as_i64())
        .bind(key.order_id.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("reservation", key));
        }
        Ok(())
    }

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO audit_entry (user_id, amount, description, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(entry.user_id.as_i64())
        .bind(entry.amount.value())
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;
        Ok(())
    }

    async fn append_revenue(&mut self, entry: &RevenueEntry) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO revenue_entry (user_id, service_id, order_id, amount, recognized_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.user_id.as_i64())
        .bind(entry.service_id.as_i64())
        .bind(entry.order_id.as_i64())
        .bind(entry.amount.value())
        .bind(entry.recognized_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| self.fail(e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let unit = *self;
        unit.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::transaction("commit", e))?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        let unit = *self;
        unit.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::transaction("rollback", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_order_matches_query_sort() {
        let user = UserId::new(1).unwrap();
        assert_eq!(audit_order(&AuditQuery::for_user(user)), "sequence ASC");
        assert_eq!(
            audit_order(&AuditQuery::for_user(user).sorted_by(SortKey::Timestamp, SortDirection::Asc)),
            "created_at ASC, sequence ASC"
        );
        assert_eq!(
            audit_order(&AuditQuery::for_user(user).sorted_by(SortKey::Amount, SortDirection::Desc)),
            "amount DESC, sequence ASC"
        );
        assert_eq!(
            audit_order(&AuditQuery::for_user(user).sorted_by(SortKey::Timestamp, SortDirection::Desc)),
            "created_at DESC, sequence DESC"
        );
    }

    #[test]
    fn test_timeout_settings_use_remaining_budget() {
        assert_eq!(
            timeout_settings(Duration::from_millis(250)),
            [
                "SET LOCAL lock_timeout = 250".to_string(),
                "SET LOCAL statement_timeout = 250".to_string(),
            ]
        );
    }

    #[test]
    fn test_timeout_settings_never_disable_the_limit() {
        let [lock, statement] = timeout_settings(Duration::from_micros(300));
        assert_eq!(lock, "SET LOCAL lock_timeout = 1");
        assert_eq!(statement, "SET LOCAL statement_timeout = 1");
    }

    #[test]
    fn test_to_i64_saturates() {
        assert_eq!(to_i64(u64::MAX), i64::MAX);
        assert_eq!(to_i64(1000), 1000);
    }
}
