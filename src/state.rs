//! Desired, observed and derived projector state

use std::{
    fmt::Display,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use log::info;

use crate::{
    diagnostics::{Health, WarnLimiter},
    pjlink::InputList,
};

/// Power state as reported by `POWR ?`.
///
/// Transitions happen on the projector only:
///
/// | from     | to              | local effect                    |
/// |----------|-----------------|---------------------------------|
/// | Off      | Warmup / On     | input delay starts              |
/// | Warmup   | On              | none                            |
/// | On       | Cooldown / Off  | none (Off may be a self-off)    |
/// | Cooldown | Off             | none                            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum PowerState {
    #[default]
    Off,
    On,
    Cooldown,
    Warmup,
}

impl PowerState {
    /// Parse the digit of a `%1POWR=` reply.
    pub(crate) fn from_wire(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Self::Off),
            "1" => Some(Self::On),
            "2" => Some(Self::Cooldown),
            "3" => Some(Self::Warmup),
            _ => None,
        }
    }

    pub(crate) fn is_transitional(self) -> bool {
        matches!(self, Self::Cooldown | Self::Warmup)
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PowerState::Off => "off",
            PowerState::On => "on",
            PowerState::Cooldown => "cool-down",
            PowerState::Warmup => "warm-up",
        };
        f.write_str(s)
    }
}

/// What one successful poll read from the projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reading {
    pub power: PowerState,
    /// `None` when the projector reports the input as unavailable.
    pub input: Option<u16>,
}

/// What the user asked for.
///
/// A pending input always implies wanting power, which is why the fields are
/// only writable through the methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Desired {
    want_power: bool,
    want_input: Option<u16>,
    want_input_logical: Option<u8>,
    /// Input code observed when the input was requested.
    prev_input: Option<u16>,
}

impl Desired {
    pub(crate) fn want_power(&self) -> bool {
        self.want_power
    }

    pub(crate) fn want_input(&self) -> Option<u16> {
        self.want_input
    }

    pub(crate) fn want_input_logical(&self) -> Option<u8> {
        self.want_input_logical
    }

    pub(crate) fn prev_input(&self) -> Option<u16> {
        self.prev_input
    }

    pub(crate) fn input_pending(&self) -> bool {
        self.want_input.is_some()
    }

    pub(crate) fn request_power(&mut self, on: bool) {
        self.want_power = on;
        if !on {
            self.clear_input();
        }
    }

    /// Request input `code` (slot `logical`), `current` being what the
    /// projector shows right now.
    pub(crate) fn request_input(&mut self, code: u16, logical: u8, current: Option<u16>) {
        self.want_power = true;
        self.want_input = Some(code);
        self.want_input_logical = Some(logical);
        self.prev_input = current;
    }

    /// Record the first input seen after a request made while none was known.
    pub(crate) fn set_baseline(&mut self, code: u16) {
        if self.want_input.is_some() && self.prev_input.is_none() {
            self.prev_input = Some(code);
        }
    }

    pub(crate) fn clear_input(&mut self) {
        self.want_input = None;
        self.want_input_logical = None;
        self.prev_input = None;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Everything known about one projector.
#[derive(Debug)]
pub(crate) struct DeviceState {
    power: PowerState,
    input: Option<u16>,
    /// Power state of the previous successful poll, `None` before the first.
    last_power: Option<PowerState>,
    /// Most recent Off -> non-Off transition.
    pub power_on_at: Option<Instant>,
    /// Most recent change of power state or displayed input.
    pub last_change: Option<Instant>,
    /// Logical input shown to the user. Lags the projector while an input
    /// change is pending.
    pub displayed_input: Option<u8>,
    pub busy: bool,
    /// The last decision wants a quick re-poll.
    pub poll_fast: bool,
    pub available_inputs: Option<InputList>,
    pub health: Health,
    pub warnings: WarnLimiter,
}

impl DeviceState {
    pub(crate) fn new(warn_cooldown: Duration) -> Self {
        Self {
            power: PowerState::Off,
            input: None,
            last_power: None,
            power_on_at: None,
            last_change: None,
            displayed_input: None,
            busy: false,
            poll_fast: false,
            available_inputs: None,
            health: Health::default(),
            warnings: WarnLimiter::new(warn_cooldown),
        }
    }

    pub(crate) fn power(&self) -> PowerState {
        self.power
    }

    pub(crate) fn input(&self) -> Option<u16> {
        self.input
    }

    /// Take in a fresh reading. Returns the power state of the previous poll.
    ///
    /// This is the only place the power state is written.
    pub(crate) fn observe(&mut self, reading: Reading, now: Instant) -> Option<PowerState> {
        let previous = self.last_power;
        match previous {
            Some(previous) if previous != reading.power => {
                info!("Projector power: {previous} -> {}", reading.power);
                self.last_change = Some(now);
                if previous == PowerState::Off {
                    self.power_on_at = Some(now);
                }
            }
            Some(_) => (),
            // Found warming up: it was switched on moments ago.
            None if reading.power == PowerState::Warmup => {
                info!("Projector found warming up");
                self.power_on_at = Some(now);
            }
            None => (),
        }
        if reading.power == PowerState::Off {
            self.available_inputs = None;
        }
        self.power = reading.power;
        self.input = reading.input;
        self.last_power = Some(reading.power);
        previous
    }

    /// Show logical input `logical`, stamping a change if it differs.
    pub(crate) fn show_input(&mut self, logical: u8, now: Instant) {
        if self.displayed_input != Some(logical) {
            info!("Displayed input: {logical}");
            self.displayed_input = Some(logical);
            self.last_change = Some(now);
        }
    }

    pub(crate) fn status(&self, desired: &Desired) -> Status {
        Status {
            power: desired.want_power(),
            power_state: self.power,
            // A requested input is shown right away.
            input: desired.want_input_logical().or(self.displayed_input),
            busy: self.busy,
            online: self.health.online,
            last_error: self.health.last_error.clone(),
            last_ok: self.health.last_ok,
            error_counter: self.health.error_counter,
            available_inputs: self.available_inputs.clone(),
        }
    }
}

/// The fields exposed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Status {
    pub power: bool,
    pub power_state: PowerState,
    pub input: Option<u8>,
    pub busy: bool,
    pub online: bool,
    pub last_error: String,
    pub last_ok: Option<SystemTime>,
    pub error_counter: u32,
    pub available_inputs: Option<InputList>,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        write!(
            f,
            "power={} state={} input={} busy={} online={} errors={}",
            if self.power { "on" } else { "off" },
            self.power_state,
            self.input.map_or_else(|| "-".to_owned(), |i| i.to_string()),
            yes_no(self.busy),
            yes_no(self.online),
            self.error_counter,
        )?;
        if let Some(secs) = self
            .last_ok
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
        {
            write!(f, " last_ok={secs}")?;
        }
        if let Some(inputs) = &self.available_inputs {
            let list: Vec<String> = inputs.iter().map(u16::to_string).collect();
            write!(f, " available=[{}]", list.join(" "))?;
        }
        if !self.last_error.is_empty() {
            write!(f, " last_error=\"{}\"", self.last_error)?;
        }
        Ok(())
    }
}
