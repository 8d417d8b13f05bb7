//! Per-SUPI serialization
//!
//! Vector generation reads the SQN, computes a vector and writes the next
//! SQN back. Two requests for the same SUPI must not interleave between
//! the read and the write, so each SUPI gets its own async mutex. Entries
//! are created on demand and removed when the last holder or waiter is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Entry {
    mutex: Arc<AsyncMutex<()>>,
    /// Holder plus queued waiters
    users: usize,
}

/// Table of per-SUPI locks
#[derive(Debug, Default)]
pub struct SupiLockTable {
    locks: Mutex<HashMap<String, Entry>>,
}

/// Exclusive access to one SUPI until dropped
#[derive(Debug)]
pub struct SupiGuard<'a> {
    table: &'a SupiLockTable,
    supi: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SupiLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `supi`.
    ///
    /// Dropping the returned future while it is still queued releases the
    /// caller's claim on the entry.
    pub async fn lock(&self, supi: &str) -> SupiGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            let entry = locks.entry(supi.to_string()).or_default();
            entry.users += 1;
            entry.mutex.clone()
        };

        let mut guard = SupiGuard {
            table: self,
            supi: supi.to_string(),
            guard: None,
        };
        guard.guard = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of SUPIs currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SupiGuard<'_> {
    pub fn supi(&self) -> &str {
        &self.supi
    }
}

impl Drop for SupiGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.table.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(self.guard.take());

        let unused = match locks.get_mut(&self.supi) {
            Some(entry) => {
                entry.users = entry.users.saturating_sub(1);
                entry.users == 0
            }
            None => false,
        };
        if unused {
            locks.remove(&self.supi);
        }
    }
}
