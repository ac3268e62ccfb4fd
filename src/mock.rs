//! Scripted projector for tests.

use std::{collections::VecDeque, sync::Mutex};

use crate::{
    errors::PjlinkError,
    pjlink::{InputList, Projector},
    policy::Command,
    state::PowerState,
};

#[derive(Debug, Default)]
struct Inner {
    power: PowerState,
    input: Option<u16>,
    inputs: InputList,
    /// Returned (one each) by the next calls, before anything else.
    failures: VecDeque<PjlinkError>,
    /// Returned by the next `set_power`/`set_input` calls only.
    command_failures: VecDeque<PjlinkError>,
    /// Returned by the next `INST ?` queries only.
    inputs_failures: VecDeque<PjlinkError>,
    reject_input: bool,
    commands: Vec<Command>,
    queries: usize,
}

/// A projector that reports whatever it is told to and records commands.
///
/// Commands do not change the reported state; tests move it explicitly.
#[derive(Debug, Default)]
pub(crate) struct MockProjector {
    inner: Mutex<Inner>,
}

impl MockProjector {
    pub(crate) fn new(power: PowerState, input: Option<u16>) -> Self {
        let mock = Self::default();
        mock.set(power, input);
        mock
    }

    pub(crate) fn set(&self, power: PowerState, input: Option<u16>) {
        let mut inner = self.inner.lock().unwrap();
        inner.power = power;
        inner.input = input;
    }

    pub(crate) fn set_inputs(&self, inputs: &[u16]) {
        self.inner.lock().unwrap().inputs = inputs.iter().copied().collect();
    }

    pub(crate) fn fail_next(&self, err: PjlinkError) {
        self.inner.lock().unwrap().failures.push_back(err);
    }

    /// Fail the next command, after recording it.
    pub(crate) fn fail_command(&self, err: PjlinkError) {
        self.inner.lock().unwrap().command_failures.push_back(err);
    }

    pub(crate) fn fail_inputs_query(&self, err: PjlinkError) {
        self.inner.lock().unwrap().inputs_failures.push_back(err);
    }

    pub(crate) fn reject_input(&self, reject: bool) {
        self.inner.lock().unwrap().reject_input = reject;
    }

    /// Commands sent so far.
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.inner.lock().unwrap().commands.clone()
    }

    /// Number of `INST ?` queries so far.
    pub(crate) fn inputs_queries(&self) -> usize {
        self.inner.lock().unwrap().queries
    }

    fn call<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T, PjlinkError>) -> Result<T, PjlinkError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.failures.pop_front() {
            Some(err) => Err(err),
            None => f(&mut inner),
        }
    }
}

impl Projector for MockProjector {
    fn power(&self) -> Result<PowerState, PjlinkError> {
        self.call(|inner| Ok(inner.power))
    }

    fn set_power(&self, on: bool) -> Result<(), PjlinkError> {
        self.call(|inner| {
            inner.commands.push(Command::SetPower(on));
            inner.command_failures.pop_front().map_or(Ok(()), Err)
        })
    }

    fn input(&self) -> Result<Option<u16>, PjlinkError> {
        self.call(|inner| Ok(inner.input))
    }

    fn set_input(&self, code: u16) -> Result<(), PjlinkError> {
        self.call(|inner| {
            inner.commands.push(Command::SetInput(code));
            if let Some(err) = inner.command_failures.pop_front() {
                Err(err)
            } else if inner.reject_input {
                Err(PjlinkError::InvalidParameter { code })
            } else {
                Ok(())
            }
        })
    }

    fn available_inputs(&self) -> Result<InputList, PjlinkError> {
        self.call(|inner| {
            inner.queries += 1;
            match inner.inputs_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(inner.inputs.clone()),
            }
        })
    }
}
