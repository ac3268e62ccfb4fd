//! This module decides what to send to the projector.
//!
//! Everything here is a function of the desired state, the observed state and
//! the clock. No I/O happens in this module.

use std::time::{Duration, Instant};

use log::info;

use crate::{
    errors::PjlinkError,
    flags::Settings,
    state::{Desired, DeviceState, PowerState, Reading},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    SetPower(bool),
    SetInput(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PolicyAction {
    /// Send this command, then re-poll soon.
    Send(Command),
    /// Nothing to send yet, but re-poll soon.
    Wait,
    /// Nothing to do.
    Idle,
}

/// Fold a fresh reading into `state` and pick the next action.
pub(crate) fn reconcile(
    state: &mut DeviceState,
    desired: &mut Desired,
    reading: Reading,
    settings: &Settings,
    now: Instant,
) -> PolicyAction {
    let previous = state.observe(reading, now);

    if previous == Some(PowerState::On) && reading.power == PowerState::Off && desired.want_power()
    {
        // Switched off by remote or at the unit. Don't fight it.
        info!("Projector switched off externally, dropping requested power/input");
        desired.clear();
    }

    if let Some(current) = reading.input {
        sync_displayed_input(state, desired, current, settings, now);
    }

    state.busy =
        reading.power.is_transitional() || (desired.input_pending() && desired.want_power());

    let action = decide(state, desired, settings, now);
    state.poll_fast = action != PolicyAction::Idle;
    action
}

/// Update the displayed input from what the projector reports.
fn sync_displayed_input(
    state: &mut DeviceState,
    desired: &mut Desired,
    current: u16,
    settings: &Settings,
    now: Instant,
) {
    let Some(want) = desired.want_input() else {
        adopt_input(state, current, settings, now);
        return;
    };

    if current == want {
        let logical = desired
            .want_input_logical()
            .unwrap_or_else(|| settings.to_logical(want));
        info!("Input {want} reached");
        desired.clear_input();
        if logical != 0 {
            state.show_input(logical, now);
        }
        return;
    }

    match desired.prev_input() {
        None => desired.set_baseline(current),
        Some(prev) if prev != current => {
            info!("Input changed to {current} at the projector, abandoning switch to {want}");
            desired.clear_input();
            adopt_input(state, current, settings, now);
            return;
        }
        Some(_) => (),
    }

    // Still converging: keep showing the target.
    if state.displayed_input.is_none() {
        if let Some(logical) = desired.want_input_logical() {
            state.show_input(logical, now);
        }
    }
}

/// Show `code` if it maps to a known slot.
fn adopt_input(state: &mut DeviceState, code: u16, settings: &Settings, now: Instant) {
    match settings.to_logical(code) {
        0 => (),
        logical => state.show_input(logical, now),
    }
}

/// Pick at most one command from the current state.
pub(crate) fn decide(
    state: &DeviceState,
    desired: &Desired,
    settings: &Settings,
    now: Instant,
) -> PolicyAction {
    match (state.power(), desired.want_power()) {
        // Cool-down refuses everything.
        (PowerState::Cooldown, _) => PolicyAction::Wait,
        (PowerState::Off, false) => PolicyAction::Idle,
        (_, false) => PolicyAction::Send(Command::SetPower(false)),
        (PowerState::Off, true) => PolicyAction::Send(Command::SetPower(true)),
        (PowerState::Warmup, true) => PolicyAction::Wait,
        (PowerState::On, true) => decide_input(state, desired, settings, now),
    }
}

fn decide_input(
    state: &DeviceState,
    desired: &Desired,
    settings: &Settings,
    now: Instant,
) -> PolicyAction {
    let (Some(want), Some(current)) = (desired.want_input(), state.input()) else {
        return PolicyAction::Idle;
    };
    if current == want {
        return PolicyAction::Idle;
    }
    // No power-on seen by us: the delay is long over.
    let elapsed = state
        .power_on_at
        .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
    if elapsed < settings.input_delay {
        PolicyAction::Wait
    } else {
        PolicyAction::Send(Command::SetInput(want))
    }
}

/// The projector refused the requested input code. Give up on it.
pub(crate) fn input_rejected(
    state: &mut DeviceState,
    desired: &mut Desired,
    settings: &Settings,
    err: &PjlinkError,
    now: Instant,
) {
    desired.clear_input();
    if let Some(current) = state.input() {
        adopt_input(state, current, settings, now);
    }
    state.busy = state.power().is_transitional();
    state.warnings.warn(&format!("{err}, dropping input request"), now);
}
