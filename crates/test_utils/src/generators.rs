//! Property-Based Test Generators
//!
//! Proptest strategies producing sequences of ledger operations over a small
//! set of users, services and orders so that collisions (same reservation
//! key, same account) happen often.

use core_kernel::{Amount, OperationMetadata};
use domain_ledger::{LedgerEngine, LedgerError};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::{key, user};

/// Users the generated operations touch
pub const USERS: std::ops::RangeInclusive<u32> = 1..=3;

/// One ledger operation
#[derive(Debug, Clone)]
pub enum LedgerOp {
    TopUp { user: u32, minor: i64 },
    Withdraw { user: u32, minor: i64 },
    Transfer { from: u32, to: u32, minor: i64 },
    Reserve { user: u32, service: u32, order: u32, minor: i64 },
    Accept { user: u32, service: u32, order: u32, minor: i64 },
    Release { user: u32, service: u32, order: u32, minor: i64 },
}

impl LedgerOp {
    /// Runs the operation and returns how much money entered (+) or left (-)
    /// the ledger as a whole. Failed operations must move nothing.
    pub async fn apply(&self, engine: &LedgerEngine, meta: &OperationMetadata) -> Result<Decimal, LedgerError> {
        match *self {
            LedgerOp::TopUp { user: u, minor } => {
                let amount = Amount::from_minor(minor)?;
                engine.top_up(user(u), amount, meta).await?;
                Ok(amount.value())
            }
            LedgerOp::Withdraw { user: u, minor } => {
                let amount = Amount::from_minor(minor)?;
                engine.withdraw(user(u), amount, meta).await?;
                Ok(-amount.value())
            }
            LedgerOp::Transfer { from, to, minor } => {
                engine
                    .transfer(user(from), user(to), Amount::from_minor(minor)?, meta)
                    .await?;
                Ok(Decimal::ZERO)
            }
            LedgerOp::Reserve { user: u, service, order, minor } => {
                engine
                    .reserve(key(u, service, order), Amount::from_minor(minor)?, meta)
                    .await?;
                Ok(Decimal::ZERO)
            }
            LedgerOp::Accept { user: u, service, order, minor } => {
                let amount = Amount::from_minor(minor)?;
                engine.accept_revenue(key(u, service, order), amount, meta).await?;
                Ok(-amount.value())
            }
            LedgerOp::Release { user: u, service, order, minor } => {
                engine
                    .release(key(u, service, order), Amount::from_minor(minor)?, meta)
                    .await?;
                Ok(Decimal::ZERO)
            }
        }
    }
}

/// Strategy for amounts in minor units (0.01 to 50.00)
pub fn minor_amount_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(500i64),
        Just(1000i64),
        1i64..=5000i64,
    ]
}

fn user_strategy() -> impl Strategy<Value = u32> {
    USERS
}

fn small_id_strategy() -> impl Strategy<Value = u32> {
    1u32..=2u32
}

/// Strategy for a single ledger operation
pub fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => (user_strategy(), minor_amount_strategy())
            .prop_map(|(user, minor)| LedgerOp::TopUp { user, minor }),
        1 => (user_strategy(), minor_amount_strategy())
            .prop_map(|(user, minor)| LedgerOp::Withdraw { user, minor }),
        2 => (user_strategy(), user_strategy(), minor_amount_strategy())
            .prop_map(|(from, to, minor)| LedgerOp::Transfer { from, to, minor }),
        2 => (user_strategy(), small_id_strategy(), small_id_strategy(), minor_amount_strategy())
            .prop_map(|(user, service, order, minor)| LedgerOp::Reserve { user, service, order, minor }),
        1 => (user_strategy(), small_id_strategy(), small_id_strategy(), minor_amount_strategy())
            .prop_map(|(user, service, order, minor)| LedgerOp::Accept { user, service, order, minor }),
        1 => (user_strategy(), small_id_strategy(), small_id_strategy(), minor_amount_strategy())
            .prop_map(|(user, service, order, minor)| LedgerOp::Release { user, service, order, minor }),
    ]
}

/// Strategy for a sequence of operations
pub fn ledger_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    prop::collection::vec(ledger_op_strategy(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_generated_users_are_in_range() {
        let mut runner = TestRunner::default();
        for _ in 0..100 {
            let op = ledger_op_strategy().new_tree(&mut runner).unwrap().current();
            let users = match op {
                LedgerOp::Transfer { from, to, .. } => vec![from, to],
                LedgerOp::TopUp { user, .. }
                | LedgerOp::Withdraw { user, .. }
                | LedgerOp::Reserve { user, .. }
                | LedgerOp::Accept { user, .. }
                | LedgerOp::Release { user, .. } => vec![user],
            };
            assert!(users.iter().all(|u| USERS.contains(u)));
        }
    }

    proptest! {
        #[test]
        fn test_minor_amounts_are_valid(minor in minor_amount_strategy()) {
            prop_assert!(Amount::from_minor(minor).is_ok());
        }
    }
}
