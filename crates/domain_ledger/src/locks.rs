//! In-process per-account lock table
//!
//! Operations touching several accounts lock them in ascending `UserId`
//! order, so two transfers between the same pair of users in opposite
//! directions cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use core_kernel::UserId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::LedgerError;

const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

/// Holds account locks until dropped
#[derive(Debug)]
pub struct AccountGuard {
    users: Vec<UserId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountGuard {
    /// Locked users in acquisition order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|p| p.into_inner());
        if table.len() > PRUNE_THRESHOLD {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(table.entry(user_id).or_default())
    }

    /// Locks every listed account, lowest id first
    ///
    /// # Errors
    ///
    /// `Timeout` if all locks cannot be taken before `deadline`. Locks taken
    /// so far are released.
    pub async fn acquire(
        &self,
        users: &[UserId],
        deadline: Instant,
    ) -> Result<AccountGuard, LedgerError> {
        let mut ordered = users.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let deadline = tokio::time::Instant::from_std(deadline);
        let mut guards = Vec::with_capacity(ordered.len());
        for user_id in &ordered {
            let lock = self.entry(*user_id);
            match tokio::time::timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    return Err(LedgerError::Timeout(format!(
                        "could not lock account of user {} in time",
                        user_id
                    )))
                }
            }
        }

        Ok(AccountGuard {
            users: ordered,
            _guards: guards,
        })
    }

    /// Number of accounts with a lock entry
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn user(id: u32) -> UserId {
        UserId::new(id).unwrap()
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[tokio::test]
    async fn test_acquire_sorts_and_dedups() {
        let locks = AccountLocks::new();
        let guard = locks.acquire(&[user(5), user(2), user(5)], soon()).await.unwrap();
        assert_eq!(guard.users(), &[user(2), user(5)]);
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let locks = AccountLocks::new();
        let _held = locks.acquire(&[user(1)], soon()).await.unwrap();

        let deadline = Instant::now() + Duration::from_millis(20);
        let err = locks.acquire(&[user(1), user(2)], deadline).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let locks = AccountLocks::new();
        drop(locks.acquire(&[user(1)], soon()).await.unwrap());
        assert!(locks.acquire(&[user(1)], soon()).await.is_ok());
    }
}
