//! Per-user write guards.

use std::sync::{Mutex, MutexGuard, PoisonError};

use credit_ledger_core::UserId;

const STRIPES: usize = 64;

/// Striped mutexes keyed by user.
///
/// Two users may share a stripe, which only costs parallelism. A user always
/// maps to the same stripe, which is what serializes their writes.
pub(crate) struct UserLocks {
    stripes: Vec<Mutex<()>>,
}

impl UserLocks {
    pub(crate) fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquire the guard for `user_id`.
    pub(crate) fn lock(&self, user_id: &UserId) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned stripe is still usable.
        self.stripes[Self::stripe(user_id)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn stripe(user_id: &UserId) -> usize {
        let bytes = user_id.as_bytes();
        let folded = bytes.iter().fold(0usize, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(usize::from(*b))
        });
        folded % STRIPES
    }
}
