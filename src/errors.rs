//! Error types

use snafu::{prelude::*, Backtrace};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum PjlinkError {
    #[snafu(display("Host is empty"))]
    EmptyHost,
    #[snafu(display("PJLink connection to {addr} failed: {source}"))]
    Connection {
        addr: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected IO error talking to {addr}: {source}"))]
    Io {
        addr: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid PJLink handshake: '{line}'"))]
    Handshake { line: String },
    #[snafu(display("PJLink authentication failed (check password)"))]
    Auth,
    #[snafu(display("Unexpected reply to {command}: '{response}'"))]
    UnexpectedResponse {
        command: &'static str,
        response: String,
    },
    #[snafu(display("Input code {code} rejected by projector (ERR2)"))]
    InvalidParameter { code: u16 },
    #[snafu(display("Input select not available (ERR3), projector not ready yet"))]
    NotReady,
    #[snafu(display("{command} not available (ERR3)"))]
    Unavailable { command: &'static str },
}

impl PjlinkError {
    /// The projector refused a parameter. Retrying the same command is pointless.
    pub(crate) fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }
}
