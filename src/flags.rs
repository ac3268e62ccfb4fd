//! Command line flags and the settings derived from them
use std::time::Duration;

use crate::inputs::{self, Vendor};

/// PJLink default TCP port.
pub(crate) const DEFAULT_PORT: u16 = 4352;

#[derive(Debug, clap::Parser)]
#[command(version, about, long_about = None)]
/// PJLink projector daemon. Keeps power and input of one projector where you
/// want them.
///
/// Reads control commands from stdin: `power on|off`, `input <1-3>`, `poll`
/// and `status`.
pub struct Cli {
    /// Projector host name or IP address.
    #[clap(short = 'H', long)]
    pub host: String,
    /// PJLink TCP port.
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// PJLink password. Leave empty if authentication is disabled.
    #[clap(long, env = "PJLINK_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Projector vendor. Selects the default input codes.
    #[clap(long, value_enum, default_value_t = Vendor::Sony)]
    pub vendor: Vendor,
    /// Input code for HDMI 1 (input 1). 0 uses the vendor default.
    #[clap(long, default_value_t = 0)]
    pub code_hdmi1: u16,
    /// Input code for HDMI 2 (input 2). 0 uses the vendor default.
    #[clap(long, default_value_t = 0)]
    pub code_hdmi2: u16,
    /// Input code for HDBaseT (input 3). 0 uses the vendor default.
    #[clap(long, default_value_t = 0)]
    pub code_hdbt: u16,
    /// Seconds to wait after power-on before switching input.
    #[clap(long, default_value_t = 10)]
    pub input_delay: u64,
    /// Poll interval in seconds while busy, offline or just after a change.
    #[clap(long, default_value_t = 5)]
    pub poll_fast: u64,
    /// Poll interval in seconds while the projector is stable.
    #[clap(long, default_value_t = 60)]
    pub poll_slow: u64,
    /// Keep polling fast for this many seconds after a change.
    #[clap(long, default_value_t = 30)]
    pub fast_after_change: u64,
    /// Minimum number of seconds between two identical warnings.
    #[clap(long, default_value_t = 300)]
    pub warn_cooldown: u64,
    /// Timeout in seconds for connecting, reading and writing.
    #[clap(short, long, default_value_t = 2)]
    pub timeout: u64,
    /// Power state to request at startup.
    #[clap(long, value_enum)]
    pub power: Option<OnOff>,
    /// Input (1-3) to request at startup. Implies --power on.
    #[clap(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub input: Option<u8>,
    /// Enable extra verbosity!
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

/// Immutable per-instance behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub vendor: Vendor,
    /// Input code overrides for slots 1..=3, 0 = vendor default.
    pub overrides: [u16; 3],
    pub input_delay: Duration,
    pub fast_poll: Duration,
    pub slow_poll: Duration,
    pub fast_after_change: Duration,
    pub warn_cooldown: Duration,
}

impl Settings {
    pub(crate) fn to_device(&self, logical: u8) -> u16 {
        inputs::logical_to_device(logical, self.vendor, &self.overrides)
    }

    pub(crate) fn to_logical(&self, code: u16) -> u8 {
        inputs::device_to_logical(code, self.vendor, &self.overrides)
    }
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        Self {
            vendor: cli.vendor,
            overrides: [cli.code_hdmi1, cli.code_hdmi2, cli.code_hdbt],
            input_delay: Duration::from_secs(cli.input_delay),
            fast_poll: Duration::from_secs(cli.poll_fast),
            slow_poll: Duration::from_secs(cli.poll_slow),
            fast_after_change: Duration::from_secs(cli.fast_after_change),
            warn_cooldown: Duration::from_secs(cli.warn_cooldown),
        }
    }
}

#[cfg(test)]
impl Default for Settings {
    fn default() -> Self {
        Self {
            vendor: Vendor::Sony,
            overrides: [0; 3],
            input_delay: Duration::from_secs(10),
            fast_poll: Duration::from_secs(5),
            slow_poll: Duration::from_secs(60),
            fast_after_change: Duration::from_secs(30),
            warn_cooldown: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_settings_default() {
        let cli = Cli::try_parse_from(["pjlinkd", "--host", "10.0.0.5"]).unwrap();
        assert_eq!(cli.port, DEFAULT_PORT);
        assert_eq!(Settings::from(&cli), Settings::default());
    }

    #[test]
    fn overrides_and_startup_requests() {
        let cli = Cli::try_parse_from([
            "pjlinkd",
            "-H",
            "beamer",
            "--vendor",
            "epson",
            "--code-hdbt",
            "51",
            "--power",
            "on",
            "--input",
            "3",
        ])
        .unwrap();
        let settings = Settings::from(&cli);
        assert_eq!(cli.power, Some(OnOff::On));
        assert_eq!(cli.input, Some(3));
        assert_eq!(settings.to_device(1), 32);
        assert_eq!(settings.to_device(3), 51);
        assert_eq!(settings.to_logical(51), 3);
    }

    #[test]
    fn input_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["pjlinkd", "-H", "beamer", "--input", "4"]).is_err());
    }
}
