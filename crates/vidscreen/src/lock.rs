//! Single-holder lock gating every call into the AI backend.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct LockState {
    holder: Option<String>,
    stopped: bool,
}

/// Mutual exclusion keyed by an owner tag, with cancellation-aware waiting.
///
/// Only the current holder can release the lock. After [`stop`](Self::stop)
/// every pending and future `acquire` returns `false`.
#[derive(Debug, Default)]
pub struct ExclusiveLock {
    state: Mutex<LockState>,
    changed: Notify,
}

impl ExclusiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until the lock is free and takes it for `owner`.
    ///
    /// Returns `false` without taking the lock when `cancel` fires while
    /// waiting or when the lock has been stopped.
    pub async fn acquire(&self, cancel: &CancellationToken, owner: &str) -> bool {
        loop {
            // Register for wake-ups before looking at the state so a release
            // between the check and the wait is not missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.stopped || cancel.is_cancelled() {
                    return false;
                }
                if state.holder.is_none() {
                    state.holder = Some(owner.to_string());
                    log::debug!("AI lock acquired by {}", owner);
                    return true;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }

    /// Like [`acquire`](Self::acquire), returning a guard that releases the
    /// lock when dropped.
    pub async fn lock(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        owner: &str,
    ) -> Option<ExclusiveLockGuard> {
        if self.acquire(cancel, owner).await {
            Some(ExclusiveLockGuard {
                lock: Arc::clone(self),
                owner: owner.to_string(),
            })
        } else {
            None
        }
    }

    /// Releases the lock if `owner` holds it and wakes all waiters.
    /// Returns whether the lock was released.
    pub fn release(&self, owner: &str) -> bool {
        let released = {
            let mut state = self.state();
            if state.holder.as_deref() == Some(owner) {
                state.holder = None;
                true
            } else {
                false
            }
        };
        if released {
            log::debug!("AI lock released by {}", owner);
            self.changed.notify_waiters();
        } else {
            log::warn!("Ignoring AI lock release by non-holder {}", owner);
        }
        released
    }

    /// Permanently disables the lock and fails every waiter.
    pub fn stop(&self) {
        self.state().stopped = true;
        self.changed.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }

    pub fn holder(&self) -> Option<String> {
        self.state().holder.clone()
    }

    pub fn is_held_by(&self, owner: &str) -> bool {
        self.state().holder.as_deref() == Some(owner)
    }
}

/// Holds an [`ExclusiveLock`] until dropped.
#[derive(Debug)]
pub struct ExclusiveLockGuard {
    lock: Arc<ExclusiveLock>,
    owner: String,
}

impl ExclusiveLockGuard {
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Drop for ExclusiveLockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.owner);
    }
}
