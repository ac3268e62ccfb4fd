//! Online/offline bookkeeping and rate limited warnings

use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};

use crate::{errors::PjlinkError, state::DeviceState};

/// Connection health as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Health {
    pub online: bool,
    /// Empty if the last cycle succeeded.
    pub last_error: String,
    pub error_counter: u32,
    pub last_ok: Option<SystemTime>,
}

/// A full poll cycle went through.
pub(crate) fn record_success(state: &mut DeviceState, now: SystemTime) {
    let health = &mut state.health;
    if !health.online {
        info!("Projector online");
        health.online = true;
    }
    health.error_counter = 0;
    if !health.last_error.is_empty() {
        health.last_error.clear();
    }
    health.last_ok = Some(now);
}

/// A poll cycle failed somewhere.
pub(crate) fn record_failure(state: &mut DeviceState, err: &PjlinkError) {
    // An unreachable projector is not meaningfully busy.
    state.busy = false;
    let health = &mut state.health;
    let was_online = health.online;
    health.online = false;
    health.error_counter = health.error_counter.saturating_add(1);

    let msg = err.to_string();
    if health.last_error != msg {
        warn!("Projector offline: {msg}");
        health.last_error = msg;
    } else if was_online {
        warn!("Projector offline again: {msg}");
    } else {
        debug!("Still offline ({} errors): {msg}", health.error_counter);
    }
}

/// Suppresses repeats of the same warning within a cooldown window.
#[derive(Debug)]
pub(crate) struct WarnLimiter {
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl WarnLimiter {
    pub(crate) fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Should `msg` be emitted now? Records the emission if so.
    pub(crate) fn check(&mut self, msg: &str, now: Instant) -> bool {
        if let Some((last_msg, at)) = &self.last {
            if last_msg == msg && now.saturating_duration_since(*at) < self.cooldown {
                return false;
            }
        }
        self.last = Some((msg.to_owned(), now));
        true
    }

    pub(crate) fn warn(&mut self, msg: &str, now: Instant) {
        if self.check(msg, now) {
            warn!("{msg}");
        } else {
            debug!("(suppressed) {msg}");
        }
    }
}
