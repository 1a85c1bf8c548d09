//! User, balance and reservation DTOs
//!
//! Amounts are accepted as JSON numbers or strings and are validated into
//! [`Amount`] by the handlers, so that non-positive values surface as
//! `BS-000002` rather than as a deserialization failure.

use chrono::{DateTime, Utc};
use core_kernel::{Amount, OrderId, ServiceId, UserId};
use domain_ledger::{AccountBalance, AuditEntry, AuditQuery, ReservationKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(range(min = 1))]
    pub id: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserAmountRequest {
    #[validate(range(min = 1))]
    pub id: u32,
    pub amount: Decimal,
}

impl UserAmountRequest {
    pub fn parse(&self) -> Result<(UserId, Amount), ApiError> {
        self.validate()?;
        Ok((UserId::new(self.id)?, Amount::new(self.amount)?))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    pub from_id: u32,
    #[validate(range(min = 1))]
    pub to_id: u32,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn parse(&self) -> Result<(UserId, UserId, Amount), ApiError> {
        self.validate()?;
        Ok((
            UserId::new(self.from_id)?,
            UserId::new(self.to_id)?,
            Amount::new(self.amount)?,
        ))
    }
}

/// Body shared by reserve, accept and release
#[derive(Debug, Deserialize, Validate)]
pub struct ReservationRequest {
    #[validate(range(min = 1))]
    pub id: u32,
    #[validate(range(min = 1))]
    pub service_id: u32,
    #[validate(range(min = 1))]
    pub order_id: u32,
    pub amount: Decimal,
}

impl ReservationRequest {
    pub fn parse(&self) -> Result<(ReservationKey, Amount), ApiError> {
        self.validate()?;
        let key = ReservationKey::new(
            UserId::new(self.id)?,
            ServiceId::new(self.service_id)?,
            OrderId::new(self.order_id)?,
        );
        Ok((key, Amount::new(self.amount)?))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub reserved: Decimal,
}

impl From<AccountBalance> for BalanceResponse {
    fn from(account: AccountBalance) -> Self {
        Self {
            amount: account.main.value(),
            reserved: account.reserved.value(),
        }
    }
}

/// Query string of `GET /api/users/report/`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReportParams {
    pub id: Option<u32>,
    pub page_num: Option<u64>,
    pub page_size: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
}

impl UserReportParams {
    pub fn to_query(&self) -> Result<AuditQuery, ApiError> {
        let id = self
            .id
            .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
        Ok(AuditQuery::new(
            UserId::new(id)?,
            self.page_num,
            self.page_size,
            self.sort_by.as_deref(),
            self.sort_direction.as_deref(),
        )?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub date_time: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            amount: entry.amount.value(),
            description: entry.description,
            date_time: entry.created_at,
        }
    }
}
