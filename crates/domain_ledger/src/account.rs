//! Per-user account balances

use core_kernel::{Balance, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The two balances held for a user
///
/// `main` is spendable. `reserved` is earmarked for open reservations and is
/// neither spendable nor yet recognized as revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub user_id: UserId,
    pub main: Balance,
    pub reserved: Balance,
}

impl AccountBalance {
    /// A freshly created account with nothing in it
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            main: Balance::ZERO,
            reserved: Balance::ZERO,
        }
    }

    /// Money attributable to the user, spendable or not
    pub fn total(&self) -> Decimal {
        self.main.value() + self.reserved.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_includes_reserved() {
        let account = AccountBalance {
            user_id: UserId::new(1).unwrap(),
            main: Balance::new(dec!(30)).unwrap(),
            reserved: Balance::new(dec!(20)).unwrap(),
        };
        assert_eq!(account.total(), dec!(50.00));
    }

    #[test]
    fn test_empty_account() {
        let account = AccountBalance::empty(UserId::new(3).unwrap());
        assert!(account.main.is_zero());
        assert!(account.reserved.is_zero());
    }
}
