//! Line based control commands on stdin

use std::{
    io::BufRead,
    str::FromStr,
    sync::Arc,
    thread::{self, JoinHandle},
};

use anyhow::Context;
use log::{debug, warn};

use crate::{monitor::Controller, pjlink::Projector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    Power(bool),
    Input(u8),
    Poll,
    Status,
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim().to_ascii_lowercase();
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("power"), Some("on" | "1")) => Self::Power(true),
            (Some("power"), Some("off" | "0")) => Self::Power(false),
            (Some("input"), Some(slot)) => {
                let slot: u8 = slot.parse().context("Input must be 1, 2 or 3")?;
                anyhow::ensure!((1..=3).contains(&slot), "Input must be 1, 2 or 3");
                Self::Input(slot)
            }
            (Some("poll"), None) => Self::Poll,
            (Some("status"), None) => Self::Status,
            _ => anyhow::bail!("Unknown command: '{line}'"),
        };
        anyhow::ensure!(words.next().is_none(), "Trailing garbage in '{line}'");
        Ok(command)
    }
}

/// Carry out one command.
pub(crate) fn dispatch<P: Projector>(ctl: &Controller<P>, command: ControlCommand) {
    match command {
        ControlCommand::Power(on) => {
            ctl.request_power(on);
        }
        ControlCommand::Input(slot) => {
            ctl.request_input(slot);
        }
        ControlCommand::Poll => ctl.wake(),
        ControlCommand::Status => match ctl.status() {
            Some(status) => println!("{status}"),
            None => println!("busy, try again"),
        },
    }
}

/// Read commands from stdin until it closes. Polling goes on regardless.
pub(crate) fn spawn<P: Projector + 'static>(ctl: Arc<Controller<P>>) -> anyhow::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("Failed to read control input: {err}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse() {
                    Ok(command) => dispatch(&ctl, command),
                    Err(err) => warn!("{err:#}"),
                }
            }
            debug!("Control input closed");
        })
        .context("Failed to start control thread")
}
