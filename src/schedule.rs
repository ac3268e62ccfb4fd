//! Adaptive poll interval

use std::time::{Duration, Instant};

use crate::{flags::Settings, state::DeviceState};

/// Shortest interval we ever poll at.
pub(crate) const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Interval until the next poll given the current state.
pub(crate) fn poll_interval(state: &DeviceState, settings: &Settings, now: Instant) -> Duration {
    let recent_change = state
        .last_change
        .is_some_and(|at| now.saturating_duration_since(at) < settings.fast_after_change);
    let fast = !state.health.online || state.busy || state.poll_fast || recent_change;
    let interval = if fast {
        settings.fast_poll
    } else {
        settings.slow_poll
    };
    interval.max(MIN_INTERVAL)
}

/// A recurring timer: fires every `interval` after it was last armed.
#[derive(Debug)]
pub(crate) struct Scheduler {
    interval: Duration,
    armed_at: Instant,
}

impl Scheduler {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            armed_at: now,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the interval. Setting the current interval again is a no-op.
    pub(crate) fn reschedule(&mut self, interval: Duration, now: Instant) -> bool {
        let interval = interval.max(MIN_INTERVAL);
        if interval == self.interval {
            return false;
        }
        self.interval = interval;
        self.armed_at = now;
        true
    }

    /// The timer went off at `now`; the next period starts here.
    pub(crate) fn fired(&mut self, now: Instant) {
        self.armed_at = now;
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.armed_at + self.interval
    }

    /// Time left until the deadline.
    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PowerState, Reading};

    fn online_state() -> DeviceState {
        let mut state = DeviceState::new(Duration::from_secs(300));
        state.health.online = true;
        state
    }

    #[test]
    fn stable_polls_slow() {
        let settings = Settings::default();
        let state = online_state();
        assert_eq!(
            poll_interval(&state, &settings, Instant::now()),
            settings.slow_poll
        );
    }

    #[test]
    fn offline_or_busy_polls_fast() {
        let settings = Settings::default();
        let now = Instant::now();

        let state = DeviceState::new(Duration::from_secs(300));
        assert_eq!(poll_interval(&state, &settings, now), settings.fast_poll);

        let mut state = online_state();
        state.busy = true;
        assert_eq!(poll_interval(&state, &settings, now), settings.fast_poll);

        let mut state = online_state();
        state.poll_fast = true;
        assert_eq!(poll_interval(&state, &settings, now), settings.fast_poll);
    }

    #[test]
    fn fast_for_a_while_after_change() {
        let settings = Settings::default();
        let base = Instant::now();
        let mut state = online_state();
        let on = Reading {
            power: PowerState::On,
            input: Some(31),
        };
        state.observe(Reading { power: PowerState::Off, input: None }, base);
        state.observe(on, base);

        let fast_until = base + settings.fast_after_change;
        assert_eq!(
            poll_interval(&state, &settings, fast_until - Duration::from_secs(1)),
            settings.fast_poll
        );
        assert_eq!(
            poll_interval(&state, &settings, fast_until),
            settings.slow_poll
        );
    }

    #[test]
    fn interval_is_clamped() {
        let settings = Settings {
            fast_poll: Duration::ZERO,
            ..Settings::default()
        };
        let state = DeviceState::new(Duration::from_secs(300));
        assert_eq!(
            poll_interval(&state, &settings, Instant::now()),
            MIN_INTERVAL
        );
        let scheduler = Scheduler::new(Duration::ZERO, Instant::now());
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
    }

    #[test]
    fn reschedule_is_idempotent() {
        let base = Instant::now();
        let mut scheduler = Scheduler::new(Duration::from_secs(60), base);
        let later = base + Duration::from_secs(10);

        assert!(!scheduler.reschedule(Duration::from_secs(60), later));
        assert_eq!(scheduler.deadline(), base + Duration::from_secs(60));

        assert!(scheduler.reschedule(Duration::from_secs(5), later));
        assert_eq!(scheduler.deadline(), later + Duration::from_secs(5));
        assert!(!scheduler.reschedule(Duration::from_secs(5), later + Duration::from_secs(1)));
        assert_eq!(scheduler.deadline(), later + Duration::from_secs(5));

        scheduler.fired(later + Duration::from_secs(5));
        assert_eq!(
            scheduler.remaining(later + Duration::from_secs(6)),
            Duration::from_secs(4)
        );
    }
}
