//! Reservation state machine
//!
//! ```text
//!            reserve
//!   (none) ──────────► Open ──settle──► Settled   (revenue written, row removed)
//!                        │
//!                        └──release──► Released  (funds back to main, row removed)
//! ```
//!
//! `Settled` and `Released` are terminal: both transitions consume the
//! [`Reservation`], so an open reservation can be resolved at most once.
//! After resolution the key may be reused by a new reservation.

use std::fmt;

use chrono::{DateTime, Utc};
use core_kernel::{Amount, OrderId, ServiceId, UserId};
use serde::{Deserialize, Serialize};

use crate::audit::{descriptions, NewAuditEntry};
use crate::revenue::RevenueEntry;

/// At most one open reservation exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReservationKey {
    pub service_id: ServiceId,
    pub order_id: OrderId,
    pub user_id: UserId,
}

impl ReservationKey {
    pub fn new(user_id: UserId, service_id: ServiceId, order_id: OrderId) -> Self {
        Self {
            service_id,
            order_id,
            user_id,
        }
    }
}

impl fmt::Display for ReservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service {} / order {} / user {}",
            self.service_id, self.order_id, self.user_id
        )
    }
}

/// An open hold of funds moved from `main` to `reserved`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub key: ReservationKey,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Side effects of settling a reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub key: ReservationKey,
    pub amount: Amount,
    pub revenue: RevenueEntry,
    pub audit: NewAuditEntry,
}

/// Side effects of releasing a reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub key: ReservationKey,
    pub amount: Amount,
    pub audit: NewAuditEntry,
}

impl Reservation {
    pub fn open(key: ReservationKey, amount: Amount, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            amount,
            created_at,
        }
    }

    /// Audit entry recording the hold
    pub fn opening_audit(&self) -> NewAuditEntry {
        NewAuditEntry::new(
            self.key.user_id,
            self.amount,
            descriptions::reserved(self.amount, self.key.order_id, self.key.service_id),
            self.created_at,
        )
    }

    /// Settlement and release both require the exact held amount
    pub fn matches(&self, amount: Amount) -> bool {
        self.amount == amount
    }

    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }

    /// Open → Settled
    pub fn settle(self, at: DateTime<Utc>) -> Settlement {
        let key = self.key;
        Settlement {
            key,
            amount: self.amount,
            revenue: RevenueEntry {
                user_id: key.user_id,
                service_id: key.service_id,
                order_id: key.order_id,
                amount: self.amount,
                recognized_at: at,
            },
            audit: NewAuditEntry::new(
                key.user_id,
                self.amount,
                descriptions::accepted(self.amount, key.order_id, key.service_id),
                at,
            ),
        }
    }

    /// Open → Released
    pub fn release(self, at: DateTime<Utc>) -> Release {
        let key = self.key;
        Release {
            key,
            amount: self.amount,
            audit: NewAuditEntry::new(
                key.user_id,
                self.amount,
                descriptions::unreserved(self.amount, key.order_id, key.service_id),
                at,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn key() -> ReservationKey {
        ReservationKey::new(
            UserId::new(1).unwrap(),
            ServiceId::new(2).unwrap(),
            OrderId::new(3).unwrap(),
        )
    }

    fn opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_settle_writes_revenue_for_the_key() {
        let reservation = Reservation::open(key(), Amount::new(dec!(20)).unwrap(), opened_at());
        let at = opened_at() + Duration::minutes(5);
        let settlement = reservation.settle(at);

        assert_eq!(settlement.revenue.service_id, key().service_id);
        assert_eq!(settlement.revenue.amount.value(), dec!(20.00));
        assert_eq!(settlement.revenue.recognized_at, at);
        assert_eq!(
            settlement.audit.description,
            "The money 20.00 was accepted for the order 3 and the service 2"
        );
    }

    #[test]
    fn test_release_describes_unreserve() {
        let reservation = Reservation::open(key(), Amount::new(dec!(7.5)).unwrap(), opened_at());
        let release = reservation.release(opened_at());
        assert_eq!(
            release.audit.description,
            "The money 7.50 was unreserved for the order 3 and the service 2"
        );
    }

    #[test]
    fn test_amount_must_match_exactly() {
        let reservation = Reservation::open(key(), Amount::new(dec!(20)).unwrap(), opened_at());
        assert!(reservation.matches(Amount::new(dec!(20.00)).unwrap()));
        assert!(!reservation.matches(Amount::new(dec!(19.99)).unwrap()));
    }

    #[test]
    fn test_expiry_is_strict() {
        let reservation = Reservation::open(key(), Amount::new(dec!(1)).unwrap(), opened_at());
        assert!(!reservation.is_expired(opened_at()));
        assert!(reservation.is_expired(opened_at() + Duration::seconds(1)));
    }
}
