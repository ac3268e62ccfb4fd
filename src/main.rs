//! PJLink projector daemon. Keeps power and input of one Sony or Epson
//! projector where you want them, polling it over the network.
//!
//! There is no public code API for you to use! However, the command line
//! interface should be stable.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use flags::OnOff;
use monitor::Controller;
use pjlink::PjlinkClient;

mod control;
mod diagnostics;
mod errors;
mod flags;
mod guard;
mod inputs;
#[cfg(test)]
mod mock;
mod monitor;
mod pjlink;
mod policy;
mod schedule;
mod state;

fn main() -> anyhow::Result<()> {
    let cli = flags::Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    setup_daemon(&cli)?;
    Ok(())
}

/// Set up and run the daemon
fn setup_daemon(config: &flags::Cli) -> anyhow::Result<()> {
    let settings = flags::Settings::from(config);
    log::info!(
        "Controlling {} projector at {}:{}",
        settings.vendor,
        config.host,
        config.port
    );

    let client = PjlinkClient::new(
        &config.host,
        config.port,
        &config.password,
        Duration::from_secs(config.timeout),
    );
    let (wake_tx, wake_rx) = mpsc::channel();
    let ctl = Arc::new(Controller::new(client, settings, wake_tx));

    match (config.power, config.input) {
        (Some(OnOff::Off), Some(_)) => {
            anyhow::bail!("--input needs the projector on, conflicts with --power off")
        }
        (_, Some(input)) => {
            ctl.request_input(input);
        }
        (Some(power), None) => {
            ctl.request_power(power == OnOff::On);
        }
        (None, None) => (),
    }

    control::spawn(ctl.clone()).context("Failed to set up control input")?;
    monitor::run(&ctl, &wake_rx)
}
