//! Custom Test Assertions
//!
//! Ledger-specific assertions with messages that show the offending values.

use domain_ledger::adapters::InMemoryLedgerStore;
use domain_ledger::{ErrorKind, LedgerError};
use rust_decimal::Decimal;

/// Asserts that `Σ (main + reserved)` over all accounts equals `expected`
pub async fn assert_conservation(store: &InMemoryLedgerStore, expected: Decimal) {
    let accounts = store.accounts().await;
    let held: Decimal = accounts.iter().map(|a| a.total()).sum();
    assert_eq!(
        held, expected,
        "Money not conserved: accounts hold {}, expected {} ({:?})",
        held, expected, accounts
    );
}

/// Asserts that no `main` or `reserved` balance is negative
pub async fn assert_non_negative(store: &InMemoryLedgerStore) {
    for account in store.accounts().await {
        assert!(
            account.main.value() >= Decimal::ZERO && account.reserved.value() >= Decimal::ZERO,
            "Negative balance for user {}: main={}, reserved={}",
            account.user_id,
            account.main,
            account.reserved
        );
    }
}

/// Asserts that `Σ reserved` equals the sum of open reservation amounts
pub async fn assert_reservations_backed(store: &InMemoryLedgerStore) {
    let reserved: Decimal = store
        .accounts()
        .await
        .iter()
        .map(|a| a.reserved.value())
        .sum();
    let open: Decimal = store
        .open_reservations()
        .await
        .iter()
        .map(|r| r.amount.value())
        .sum();
    assert_eq!(
        reserved, open,
        "Reserved balances ({}) do not match open reservations ({})",
        reserved, open
    );
}

/// Asserts the `(main, reserved)` pair of one account
pub fn assert_balance(actual: Option<(Decimal, Decimal)>, main: Decimal, reserved: Decimal) {
    match actual {
        Some((actual_main, actual_reserved)) => assert!(
            actual_main == main && actual_reserved == reserved,
            "Balance mismatch: got main={}, reserved={}; expected main={}, reserved={}",
            actual_main,
            actual_reserved,
            main,
            reserved
        ),
        None => panic!("Expected an account with main={}, reserved={}, found none", main, reserved),
    }
}

/// Asserts that a result failed with the given error kind
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, LedgerError>, kind: ErrorKind) -> LedgerError {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        Err(err) => {
            assert_eq!(err.kind(), kind, "Expected {:?} error, got {:?}", kind, err);
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_balance_passes() {
        assert_balance(Some((dec!(10.00), dec!(0.00))), dec!(10), dec!(0));
    }

    #[test]
    #[should_panic(expected = "Balance mismatch")]
    fn test_assert_balance_fails() {
        assert_balance(Some((dec!(10), dec!(0))), dec!(11), dec!(0));
    }

    #[test]
    #[should_panic(expected = "found none")]
    fn test_assert_balance_missing_account() {
        assert_balance(None, dec!(0), dec!(0));
    }

    #[test]
    fn test_assert_error_kind_returns_error() {
        let result: Result<(), LedgerError> = Err(LedgerError::not_found("user 1"));
        let err = assert_error_kind(result, ErrorKind::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    #[should_panic(expected = "Expected Conflict error")]
    fn test_assert_error_kind_on_ok() {
        assert_error_kind(Ok::<_, LedgerError>(1), ErrorKind::Conflict);
    }
}
