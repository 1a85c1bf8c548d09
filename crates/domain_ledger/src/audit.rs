//! Append-only per-user transaction history
//!
//! Every successful ledger operation appends one entry per affected user in
//! the same atomic unit as the balance change it documents. Entries are
//! never updated or deleted.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use core_kernel::{Amount, OrderId, ServiceId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Audit descriptions written by the engine
pub mod descriptions {
    use super::*;

    pub const REPLENISHED: &str = "Account replenished";
    pub const DEBITED: &str = "Debiting money from an account";

    pub fn transfer_out(to: UserId) -> String {
        format!("Transferring money to a user {}", to)
    }

    pub fn transfer_in(from: UserId) -> String {
        format!("Receiving money from the user {}", from)
    }

    pub fn reserved(amount: Amount, order: OrderId, service: ServiceId) -> String {
        format!(
            "The money {} was reserved for the order {} and the service {}",
            amount, order, service
        )
    }

    pub fn accepted(amount: Amount, order: OrderId, service: ServiceId) -> String {
        format!(
            "The money {} was accepted for the order {} and the service {}",
            amount, order, service
        )
    }

    pub fn unreserved(amount: Amount, order: OrderId, service: ServiceId) -> String {
        format!(
            "The money {} was unreserved for the order {} and the service {}",
            amount, order, service
        )
    }
}

/// An entry to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub user_id: UserId,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn new(
        user_id: UserId,
        amount: Amount,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            created_at,
        }
    }
}

/// A stored audit entry
///
/// `sequence` is assigned by the store in commit order and breaks ties
/// between entries with equal timestamps or amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: i64,
    pub user_id: UserId,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_new(sequence: i64, entry: NewAuditEntry) -> Self {
        Self {
            sequence,
            user_id: entry.user_id,
            amount: entry.amount,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Timestamp,
    Amount,
}

impl FromStr for SortKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dateTime" | "datetime" | "date" | "timestamp" => Ok(SortKey::Timestamp),
            "amount" => Ok(SortKey::Amount),
            other => Err(LedgerError::bad_request(format!(
                "unknown sort key '{}', expected dateTime or amount",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(LedgerError::bad_request(format!(
                "unknown sort direction '{}', expected asc or desc",
                s
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// A validated history query for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub user_id: UserId,
    page: Option<(u64, u64)>,
    sort: Option<(SortKey, SortDirection)>,
}

impl AuditQuery {
    /// Full history in commit order
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            page: None,
            sort: None,
        }
    }

    /// Builds a query from optional request parameters
    ///
    /// # Errors
    ///
    /// `BadRequest` when only one of `page_num`/`page_size` or only one of
    /// `sort_by`/`sort_direction` is given, when a page value is zero, or
    /// when a sort value is not recognised.
    pub fn new(
        user_id: UserId,
        page_num: Option<u64>,
        page_size: Option<u64>,
        sort_by: Option<&str>,
        sort_direction: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let page = match (page_num, page_size) {
            (None, None) => None,
            (Some(num), Some(size)) => {
                if num == 0 || size == 0 {
                    return Err(LedgerError::bad_request(
                        "pageNum and pageSize must be at least 1",
                    ));
                }
                Some((num, size))
            }
            _ => {
                return Err(LedgerError::bad_request(
                    "pageNum and pageSize must be supplied together",
                ))
            }
        };

        let sort = match (sort_by, sort_direction) {
            (None, None) => None,
            (Some(key), Some(direction)) => Some((key.parse()?, direction.parse()?)),
            _ => {
                return Err(LedgerError::bad_request(
                    "sortBy and sortDirection must be supplied together",
                ))
            }
        };

        Ok(Self { user_id, page, sort })
    }

    pub fn with_page(mut self, page_num: u64, page_size: u64) -> Result<Self, LedgerError> {
        if page_num == 0 || page_size == 0 {
            return Err(LedgerError::bad_request("pageNum and pageSize must be at least 1"));
        }
        self.page = Some((page_num, page_size));
        Ok(self)
    }

    pub fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some((key, direction));
        self
    }

    pub fn sort(&self) -> Option<(SortKey, SortDirection)> {
        self.sort
    }

    /// Returns `(offset, limit)`; unpaged queries are capped at `default_limit`
    pub fn bounds(&self, default_limit: u64) -> (u64, u64) {
        match self.page {
            Some((num, size)) => ((num - 1).saturating_mul(size), size),
            None => (0, default_limit),
        }
    }

    /// Total order used for this query's results
    pub fn compare(&self, a: &AuditEntry, b: &AuditEntry) -> Ordering {
        match self.sort {
            None => a.sequence.cmp(&b.sequence),
            Some((SortKey::Timestamp, SortDirection::Asc)) => a
                .created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence)),
            Some((SortKey::Timestamp, SortDirection::Desc)) => b
                .created_at
                .cmp(&a.created_at)
                .then(b.sequence.cmp(&a.sequence)),
            Some((SortKey::Amount, SortDirection::Asc)) => {
                a.amount.cmp(&b.amount).then(a.sequence.cmp(&b.sequence))
            }
            Some((SortKey::Amount, SortDirection::Desc)) => {
                b.amount.cmp(&a.amount).then(a.sequence.cmp(&b.sequence))
            }
        }
    }

    /// Filters, sorts and pages entries held in memory
    pub fn apply<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a AuditEntry>,
        default_limit: u64,
    ) -> Vec<AuditEntry> {
        let mut selected: Vec<AuditEntry> = entries
            .into_iter()
            .filter(|e| e.user_id == self.user_id)
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));

        let (offset, limit) = self.bounds(default_limit);
        selected
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn user(id: u32) -> UserId {
        UserId::new(id).unwrap()
    }

    fn entry(sequence: i64, user_id: u32, amount: rust_decimal::Decimal, minute: u32) -> AuditEntry {
        AuditEntry {
            sequence,
            user_id: user(user_id),
            amount: Amount::new(amount).unwrap(),
            description: format!("entry {}", sequence),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_paging_parameters_must_be_paired() {
        let err = AuditQuery::new(user(1), Some(1), None, None, None).unwrap_err();
        assert!(matches!(err, LedgerError::BadRequest(_)));
        assert!(AuditQuery::new(user(1), None, Some(5), None, None).is_err());
    }

    #[test]
    fn test_sort_parameters_must_be_paired_and_known() {
        assert!(AuditQuery::new(user(1), None, None, Some("amount"), None).is_err());
        assert!(AuditQuery::new(user(1), None, None, Some("name"), Some("asc")).is_err());
        assert!(AuditQuery::new(user(1), None, None, Some("amount"), Some("up")).is_err());
        assert!(AuditQuery::new(user(1), None, None, Some("dateTime"), Some("DESC")).is_ok());
    }

    #[test]
    fn test_zero_page_rejected() {
        assert!(AuditQuery::new(user(1), Some(0), Some(10), None, None).is_err());
    }

    #[test]
    fn test_bounds() {
        let q = AuditQuery::new(user(1), Some(3), Some(10), None, None).unwrap();
        assert_eq!(q.bounds(1000), (20, 10));
        assert_eq!(AuditQuery::for_user(user(1)).bounds(1000), (0, 1000));
    }

    #[test]
    fn test_apply_filters_by_user_and_keeps_commit_order() {
        let entries = vec![
            entry(1, 1, dec!(5), 0),
            entry(2, 2, dec!(6), 0),
            entry(3, 1, dec!(7), 0),
        ];
        let result = AuditQuery::for_user(user(1)).apply(&entries, 1000);
        let seqs: Vec<i64> = result.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn test_default_order_ignores_timestamps() {
        let entries = vec![entry(1, 1, dec!(100), 30), entry(2, 1, dec!(10), 0)];

        let seqs: Vec<i64> = AuditQuery::for_user(user(1))
            .apply(&entries, 1000)
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(seqs, vec![1, 2]);

        let by_time = AuditQuery::for_user(user(1)).sorted_by(SortKey::Timestamp, SortDirection::Asc);
        let seqs: Vec<i64> = by_time.apply(&entries, 1000).iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![2, 1]);
    }

    #[test]
    fn test_amount_desc_breaks_ties_by_sequence() {
        let entries = vec![
            entry(1, 1, dec!(10), 0),
            entry(2, 1, dec!(30), 1),
            entry(3, 1, dec!(10), 2),
        ];
        let q = AuditQuery::for_user(user(1)).sorted_by(SortKey::Amount, SortDirection::Desc);
        let seqs: Vec<i64> = q.apply(&entries, 1000).iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![2, 1, 3]);
    }

    #[test]
    fn test_second_page() {
        let entries: Vec<AuditEntry> = (1..=5).map(|i| entry(i, 1, dec!(1), i as u32)).collect();
        let q = AuditQuery::for_user(user(1)).with_page(2, 2).unwrap();
        let seqs: Vec<i64> = q.apply(&entries, 1000).iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn test_descriptions() {
        let amount = Amount::new(dec!(20)).unwrap();
        let text = descriptions::reserved(amount, OrderId::new(4).unwrap(), ServiceId::new(9).unwrap());
        assert_eq!(text, "The money 20.00 was reserved for the order 4 and the service 9");
        assert_eq!(descriptions::transfer_out(user(2)), "Transferring money to a user 2");
    }
}
