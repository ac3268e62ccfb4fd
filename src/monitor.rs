//! Poll loop and the entry points for user actions

use std::{
    sync::{
        mpsc::{Receiver, RecvTimeoutError, Sender},
        Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant, SystemTime},
};

use log::{debug, info, warn};

use crate::{
    diagnostics,
    errors::PjlinkError,
    flags::Settings,
    guard::ConcurrencyGuard,
    pjlink::Projector,
    policy::{self, Command, PolicyAction},
    schedule::{self, Scheduler},
    state::{Desired, DeviceState, PowerState, Reading, Status},
};

/// How long a scheduled poll waits for an exchange in flight.
pub(crate) const POLL_LOCK_WAIT: Duration = Duration::from_secs(3);
/// How long an action's immediate send waits before giving up.
pub(crate) const SEND_NOW_LOCK_WAIT: Duration = Duration::from_millis(100);

/// What actions write and read without entering the exchange region.
#[derive(Debug, Default)]
struct Requests {
    desired: Desired,
    /// Bumped on every user write, so a poll doesn't overwrite newer requests.
    revision: u64,
    /// Last observed power state and input.
    power: Option<PowerState>,
    input: Option<u16>,
}

/// One projector: its connection, what we know and what the user wants.
#[derive(Debug)]
pub(crate) struct Controller<P> {
    projector: P,
    settings: Settings,
    requests: Mutex<Requests>,
    device: ConcurrencyGuard<DeviceState>,
    wake: Sender<()>,
}

impl<P: Projector> Controller<P> {
    pub(crate) fn new(projector: P, settings: Settings, wake: Sender<()>) -> Self {
        let device = DeviceState::new(settings.warn_cooldown);
        Self {
            projector,
            settings,
            requests: Mutex::new(Requests::default()),
            device: ConcurrencyGuard::new("projector", device),
            wake,
        }
    }

    fn requests(&self) -> MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// User wants the projector on or off. Returns false if refused.
    pub(crate) fn request_power(&self, on: bool) -> bool {
        {
            let mut requests = self.requests();
            if requests.power == Some(PowerState::Cooldown) {
                warn!("Power change ignored during cool-down");
                return false;
            }
            requests.desired.request_power(on);
            requests.revision += 1;
        }
        info!("Requested power {}", if on { "on" } else { "off" });
        self.send_now(Instant::now());
        self.wake();
        true
    }

    /// User wants logical input `logical`. Implies power on.
    pub(crate) fn request_input(&self, logical: u8) -> bool {
        let code = self.settings.to_device(logical);
        if code == 0 {
            warn!("Input {logical} maps to code 0, check the input codes");
            return false;
        }
        {
            let mut requests = self.requests();
            let current = requests.input;
            requests.desired.request_input(code, logical, current);
            requests.revision += 1;
        }
        info!("Requested input {logical} (code {code})");
        self.send_now(Instant::now());
        self.wake();
        true
    }

    /// Make the poll loop run a cycle now.
    pub(crate) fn wake(&self) {
        if self.wake.send(()).is_err() {
            debug!("Poll loop gone, not waking it");
        }
    }

    /// Try to send the next command right away, based on the last poll.
    ///
    /// Best effort only: the next poll corrects whatever this doesn't do.
    pub(crate) fn send_now(&self, now: Instant) -> bool {
        let Some(mut device) = self.device.enter(SEND_NOW_LOCK_WAIT) else {
            debug!("Exchange in flight, leaving the request to the next poll");
            return false;
        };
        if !device.health.online {
            return false;
        }
        let desired = self.requests().desired.clone();
        let PolicyAction::Send(command) = policy::decide(&device, &desired, &self.settings, now)
        else {
            return false;
        };
        if let Err(err) = self.execute(&mut device, command, now) {
            device
                .warnings
                .warn(&format!("Immediate command failed: {err}"), now);
        }
        true
    }

    /// Run one poll cycle. `None` if another exchange held the projector.
    pub(crate) fn poll(&self, now: Instant, wall: SystemTime) -> Option<Duration> {
        let Some(mut device) = self.device.enter(POLL_LOCK_WAIT) else {
            debug!("Exchange in flight, skipping this poll");
            return None;
        };
        match self.cycle(&mut device, now) {
            Ok(()) => diagnostics::record_success(&mut device, wall),
            Err(err) => diagnostics::record_failure(&mut device, &err),
        }
        let interval = schedule::poll_interval(&device, &self.settings, now);
        debug!("Status: {}", device.status(&self.requests().desired));
        Some(interval)
    }

    fn cycle(&self, device: &mut DeviceState, now: Instant) -> Result<(), PjlinkError> {
        let power = self.projector.power()?;
        let input = match power {
            PowerState::Off => None,
            _ => self.projector.input()?,
        };
        let reading = Reading { power, input };

        let (mut desired, revision) = {
            let requests = self.requests();
            (requests.desired.clone(), requests.revision)
        };
        let action = policy::reconcile(device, &mut desired, reading, &self.settings, now);
        debug!("Reading: {reading:?}, action: {action:?}");
        self.publish(device, desired, revision);

        match action {
            PolicyAction::Send(command) => self.execute(device, command, now)?,
            PolicyAction::Wait | PolicyAction::Idle => {
                if power == PowerState::On && device.available_inputs.is_none() {
                    // Informational only, so a refusal doesn't fail the cycle.
                    match self.projector.available_inputs() {
                        Ok(inputs) => {
                            info!("Available inputs: {inputs:?}");
                            device.available_inputs = Some(inputs);
                        }
                        Err(err) => device
                            .warnings
                            .warn(&format!("Failed to list inputs: {err}"), now),
                    }
                }
            }
        }
        Ok(())
    }

    /// Store the engine's view of the request unless the user changed it meanwhile.
    fn publish(&self, device: &DeviceState, desired: Desired, revision: u64) {
        let mut requests = self.requests();
        if requests.revision == revision {
            requests.desired = desired;
        } else {
            debug!("Request changed during poll, keeping the new one");
        }
        requests.power = Some(device.power());
        requests.input = device.input();
    }

    fn execute(
        &self,
        device: &mut DeviceState,
        command: Command,
        now: Instant,
    ) -> Result<(), PjlinkError> {
        match command {
            Command::SetPower(on) => {
                info!("Switching projector {}", if on { "on" } else { "off" });
                self.projector.set_power(on)
            }
            Command::SetInput(code) => {
                info!("Switching input to {code}");
                match self.projector.set_input(code) {
                    Err(err) if err.is_invalid_parameter() => {
                        let mut requests = self.requests();
                        if requests.desired.want_input() == Some(code) {
                            policy::input_rejected(
                                device,
                                &mut requests.desired,
                                &self.settings,
                                &err,
                                now,
                            );
                            requests.revision += 1;
                        }
                        Ok(())
                    }
                    other => other,
                }
            }
        }
    }

    /// Snapshot for the user. `None` if the projector stayed busy.
    pub(crate) fn status(&self) -> Option<Status> {
        let device = self.device.enter(POLL_LOCK_WAIT)?;
        let requests = self.requests();
        Some(device.status(&requests.desired))
    }
}

/// Main loop: poll, then sleep until the timer fires or an action wakes us.
pub(crate) fn run<P: Projector>(ctl: &Controller<P>, wake: &Receiver<()>) -> anyhow::Result<()> {
    // Startup requests are covered by the first poll.
    while wake.try_recv().is_ok() {}
    let mut scheduler = Scheduler::new(ctl.settings.slow_poll, Instant::now());
    loop {
        let now = Instant::now();
        scheduler.fired(now);
        if let Some(interval) = ctl.poll(now, SystemTime::now()) {
            if scheduler.reschedule(interval, now) {
                debug!("Poll interval now {:?}", scheduler.interval());
            }
        }
        match wake.recv_timeout(scheduler.remaining(Instant::now())) {
            Ok(()) => {
                debug!("Woken by action");
                while wake.try_recv().is_ok() {}
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Wake channel closed");
            }
        }
    }
}
