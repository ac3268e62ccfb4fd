//! Serializes protocol exchanges with one projector

use std::{
    sync::{Mutex, MutexGuard, TryLockError},
    time::{Duration, Instant},
};

use log::{debug, warn};

/// How often a waiting caller retries.
const RETRY_DELAY: Duration = Duration::from_millis(10);

/// A mutex that can only be entered with a bounded wait.
///
/// Whoever holds the returned guard owns the projector connection and its
/// state. Dropping the guard leaves the region, whichever way the holder exits.
#[derive(Debug)]
pub(crate) struct ConcurrencyGuard<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> ConcurrencyGuard<T> {
    pub(crate) fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    /// Enter, waiting at most `wait`. `None` means someone else is inside.
    pub(crate) fn enter(&self, wait: Duration) -> Option<MutexGuard<'_, T>> {
        let deadline = Instant::now() + wait;
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    // The state is only ever written field by field, keep going.
                    warn!("{}: previous holder panicked", self.name);
                    return Some(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) => (),
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("{}: busy for {wait:?}, giving up", self.name);
                return None;
            }
            std::thread::sleep(RETRY_DELAY.min(deadline - now));
        }
    }
}
