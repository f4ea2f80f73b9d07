//! The client registry (section 5 / section 9): a bounded-wait,
//! mutex-guarded set of connection identities. Explicitly **not** part of
//! the protocol core — the reference host's process-wide registry becomes
//! an explicit value the consumer constructs and passes to whichever
//! worker needs it, rather than global mutable state.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Reference wait bound from section 5: "guarded by a mutex with a bounded
/// wait (3s reference value)".
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(3);

/// How long to sleep between `try_lock` polls while waiting on the bound.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A set of connection identities, guarded by a lock with a bounded wait.
/// Lock-acquisition failure is non-fatal per section 5: callers get back
/// `false`/`None` and are expected to proceed without the registry update.
pub struct Registry {
    ids: Mutex<HashSet<Uuid>>,
    lock_wait: Duration,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Registry {
            ids: Mutex::new(HashSet::new()),
            lock_wait,
        }
    }

    /// Issues a fresh identity for a new connection. Does not touch the
    /// lock; this is a pure local allocation.
    pub fn new_identity() -> Uuid {
        Uuid::new_v4()
    }

    /// Adds `id` to the registry. Returns `false` (non-fatal) if the lock
    /// could not be acquired within the bounded wait.
    pub fn add(&self, id: Uuid) -> bool {
        match self.lock_within_bound() {
            Some(mut guard) => {
                guard.insert(id);
                true
            }
            None => false,
        }
    }

    /// Removes `id` from the registry by its identity, the common case.
    /// `remove_by_identity` and `remove_by_id` are the same operation here
    /// (the reference host distinguishes a raw connection pointer from a
    /// generated id; this registry only ever stores the generated id).
    pub fn remove_by_identity(&self, id: Uuid) -> bool {
        self.remove_by_id(id)
    }

    pub fn remove_by_id(&self, id: Uuid) -> bool {
        match self.lock_within_bound() {
            Some(mut guard) => guard.remove(&id),
            None => false,
        }
    }

    /// Current registry size, or `None` if the lock could not be acquired
    /// within the bounded wait.
    pub fn count(&self) -> Option<usize> {
        self.lock_within_bound().map(|guard| guard.len())
    }

    /// Polls `try_lock` until it succeeds or `lock_wait` elapses. Plain
    /// `Mutex` has no timed-lock primitive, so the bound is enforced here
    /// rather than inside the lock itself.
    fn lock_within_bound(&self) -> Option<MutexGuard<'_, HashSet<Uuid>>> {
        let deadline = Instant::now() + self.lock_wait;
        loop {
            match self.ids.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(_)) => return None,
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
