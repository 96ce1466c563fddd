//! Per-client exclusive locks.
//!
//! The lock manager replaces database-level select-for-update: every
//! admission acquires the locks of both involved clients before its
//! critical section. Pair acquisition always happens in ascending-id
//! order, so two admissions referencing the same clients in swapped
//! supplier/consumer roles cannot deadlock. Admissions touching disjoint
//! client pairs never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct ClientLockManager {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ClientLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Exclusive lock on a single client.
    pub async fn lock(&self, id: Uuid) -> ClientGuard {
        ClientGuard {
            _guard: self.handle(id).lock_owned().await,
        }
    }

    /// Exclusive locks on both clients, acquired in ascending-id order.
    pub async fn lock_pair(&self, a: Uuid, b: Uuid) -> PairGuard {
        debug_assert_ne!(a, b, "pair lock requires distinct clients");
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.handle(first).lock_owned().await;
        let second_guard = self.handle(second).lock_owned().await;
        PairGuard {
            _first: first_guard,
            _second: second_guard,
        }
    }
}

/// Released on drop, on every exit path.
#[must_use]
pub struct ClientGuard {
    _guard: OwnedMutexGuard<()>,
}

#[must_use]
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: OwnedMutexGuard<()>,
}
