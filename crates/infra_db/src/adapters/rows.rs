//! Row types and their conversion into domain values
//!
//! Ids are stored as `BIGINT` and money as `NUMERIC(20, 2)`; every conversion
//! re-validates the value so a corrupt row surfaces as an error instead of
//! an impossible balance.

use std::fmt;

use chrono::{DateTime, Utc};
use core_kernel::{Amount, Balance, OrderId, ReportWindow, ServiceId, UserId};
use domain_ledger::{
    AccountBalance, AuditEntry, ContentHash, ReportArtifact, Reservation, ReservationKey,
    ServiceRevenue,
};
use rust_decimal::Decimal;

use crate::error::DatabaseError;

fn corrupt(what: &str, err: impl fmt::Display) -> DatabaseError {
    DatabaseError::CorruptRow(format!("{}: {}", what, err))
}

fn user_id(raw: i64) -> Result<UserId, DatabaseError> {
    UserId::try_from(raw).map_err(|e| corrupt("user_id", e))
}

fn service_id(raw: i64) -> Result<ServiceId, DatabaseError> {
    ServiceId::try_from(raw).map_err(|e| corrupt("service_id", e))
}

fn order_id(raw: i64) -> Result<OrderId, DatabaseError> {
    OrderId::try_from(raw).map_err(|e| corrupt("order_id", e))
}

fn amount(raw: Decimal) -> Result<Amount, DatabaseError> {
    Amount::new(raw).map_err(|e| corrupt("amount", e))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub user_id: i64,
    pub main: Decimal,
    pub reserved: Decimal,
}

impl TryFrom<AccountRow> for AccountBalance {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(AccountBalance {
            user_id: user_id(row.user_id)?,
            main: Balance::new(row.main).map_err(|e| corrupt("main", e))?,
            reserved: Balance::new(row.reserved).map_err(|e| corrupt("reserved", e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReservationRow {
    pub user_id: i64,
    pub service_id: i64,
    pub order_id: i64,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = DatabaseError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let key = ReservationKey::new(
            user_id(row.user_id)?,
            service_id(row.service_id)?,
            order_id(row.order_id)?,
        );
        Ok(Reservation::open(key, amount(row.amount)?, row.created_at))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AuditRow {
    pub sequence: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DatabaseError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            sequence: row.sequence,
            user_id: user_id(row.user_id)?,
            amount: amount(row.amount)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RevenueTotalRow {
    pub service_id: i64,
    pub total: Decimal,
}

impl TryFrom<RevenueTotalRow> for ServiceRevenue {
    type Error = DatabaseError;

    fn try_from(row: RevenueTotalRow) -> Result<Self, Self::Error> {
        Ok(ServiceRevenue {
            service_id: service_id(row.service_id)?,
            total: row.total,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArtifactRow {
    pub hash: String,
    pub location: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ArtifactRow> for ReportArtifact {
    type Error = DatabaseError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(ReportArtifact {
            hash: ContentHash::parse(row.hash.trim()).map_err(|e| corrupt("hash", e))?,
            location: row.location,
            window: ReportWindow::new(row.window_start, row.window_end)
                .map_err(|e| corrupt("window", e))?,
            created_at: row.created_at,
        })
    }
}

/// Converts each row, failing on the first corrupt one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_row_conversion() {
        let account = AccountBalance::try_from(AccountRow {
            user_id: 3,
            main: dec!(10.50),
            reserved: dec!(0),
        })
        .unwrap();
        assert_eq!(account.user_id.get(), 3);
        assert_eq!(account.main.value(), dec!(10.50));
    }

    #[test]
    fn test_negative_balance_row_is_corrupt() {
        let result = AccountBalance::try_from(AccountRow {
            user_id: 3,
            main: dec!(-1),
            reserved: dec!(0),
        });
        assert!(matches!(result, Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_zero_id_is_corrupt() {
        let result = Reservation::try_from(ReservationRow {
            user_id: 1,
            service_id: 0,
            order_id: 1,
            amount: dec!(5),
            created_at: Utc::now(),
        });
        assert!(matches!(result, Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_artifact_row_conversion() {
        let hash = ContentHash::of(b"1,20.00\n");
        let artifact = ReportArtifact::try_from(ArtifactRow {
            hash: hash.to_string(),
            location: "/reports/ab/x.csv".to_string(),
            window_start: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(artifact.hash, hash);
    }
}
