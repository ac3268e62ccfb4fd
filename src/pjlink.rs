//! PJLink class 1 client, limited to POWR, INPT and INST
//!
//! Every exchange opens its own TCP connection: read the greeting, send one
//! (possibly authenticated) command, read one reply, close.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::trace;
use md5::{Digest, Md5};
use smallvec::SmallVec;
use snafu::{ensure, ResultExt};

use crate::{
    errors::{
        AuthSnafu, ConnectionSnafu, EmptyHostSnafu, HandshakeSnafu, InvalidParameterSnafu,
        IoSnafu, NotReadySnafu, PjlinkError, UnavailableSnafu, UnexpectedResponseSnafu,
    },
    state::PowerState,
};

/// Input codes reported by `INST ?`.
pub(crate) type InputList = SmallVec<[u16; 8]>;

const GREETING: &str = "PJLINK ";
const GREETING_AUTH: &str = "PJLINK 1 ";
const AUTH_FAILED: &str = "PJLINK ERRA";
/// Longest line we are willing to read.
const MAX_LINE: u64 = 512;

const POWR: &str = "POWR";
const INPT: &str = "INPT";
const INST: &str = "INST";

/// Operations the reconciliation needs from a projector.
pub(crate) trait Projector: Send + Sync {
    fn power(&self) -> Result<PowerState, PjlinkError>;
    fn set_power(&self, on: bool) -> Result<(), PjlinkError>;
    /// Current input, `None` if the projector says it is not available.
    fn input(&self) -> Result<Option<u16>, PjlinkError>;
    fn set_input(&self, code: u16) -> Result<(), PjlinkError>;
    fn available_inputs(&self) -> Result<InputList, PjlinkError>;
}

/// Connection parameters for one projector. Holds no connection.
#[derive(Debug, Clone)]
pub(crate) struct PjlinkClient {
    host: String,
    port: u16,
    password: String,
    timeout: Duration,
}

impl PjlinkClient {
    pub(crate) fn new(host: &str, port: u16, password: &str, timeout: Duration) -> Self {
        Self {
            host: host.trim().to_owned(),
            port,
            password: password.to_owned(),
            timeout,
        }
    }

    fn connect(&self, addr: &str) -> Result<TcpStream, PjlinkError> {
        let mut last_err = None;
        for sock_addr in (self.host.as_str(), self.port)
            .to_socket_addrs()
            .context(ConnectionSnafu { addr })?
        {
            match TcpStream::connect_timeout(&sock_addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        let err = last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        });
        Err(err).context(ConnectionSnafu { addr })
    }

    /// Perform one exchange and return the trimmed reply line.
    pub(crate) fn send(&self, command: &str) -> Result<String, PjlinkError> {
        ensure!(!self.host.is_empty(), EmptyHostSnafu);
        let addr = format!("{}:{}", self.host, self.port);
        let stream = self.connect(&addr)?;
        stream
            .set_read_timeout(Some(self.timeout))
            .context(IoSnafu { addr: &addr })?;
        stream
            .set_write_timeout(Some(self.timeout))
            .context(IoSnafu { addr: &addr })?;
        let mut reader = BufReader::new(&stream);

        let greeting = read_line(&mut reader).context(IoSnafu { addr: &addr })?;
        ensure!(
            greeting.starts_with(GREETING),
            HandshakeSnafu { line: greeting }
        );
        let prefix = auth_prefix(&greeting, &self.password).unwrap_or_default();

        trace!("{addr} <- {command}");
        (&stream)
            .write_all(format!("{prefix}{command}\r").as_bytes())
            .context(IoSnafu { addr: &addr })?;
        let response = read_line(&mut reader).context(IoSnafu { addr: &addr })?;
        trace!("{addr} -> {response}");

        ensure!(response != AUTH_FAILED, AuthSnafu);
        Ok(response)
    }
}

impl Projector for PjlinkClient {
    fn power(&self) -> Result<PowerState, PjlinkError> {
        parse_power(&self.send("%1POWR ?")?)
    }

    fn set_power(&self, on: bool) -> Result<(), PjlinkError> {
        let response = self.send(&format!("%1POWR {}", u8::from(on)))?;
        parse_ack(POWR, &response)
    }

    fn input(&self) -> Result<Option<u16>, PjlinkError> {
        parse_input(&self.send("%1INPT ?")?)
    }

    fn set_input(&self, code: u16) -> Result<(), PjlinkError> {
        parse_set_input(code, &self.send(&format!("%1INPT {code}"))?)
    }

    fn available_inputs(&self) -> Result<InputList, PjlinkError> {
        parse_inputs(&self.send("%1INST ?")?)
    }
}

/// Read up to a CR (PJLink's terminator) or LF, whichever comes first.
fn read_line<R: BufRead>(reader: &mut R) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_LINE);
    loop {
        let available = limited.fill_buf()?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&b| b == b'\r' || b == b'\n') {
            // Skip a leading LF left over from a previous CRLF.
            Some(0) if buf.is_empty() && available[0] == b'\n' => limited.consume(1),
            Some(pos) => {
                buf.extend_from_slice(&available[..pos]);
                limited.consume(pos + 1);
                break;
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                limited.consume(len);
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).trim().to_owned())
}

/// Digest to prefix commands with if the greeting carries a challenge.
fn auth_prefix(greeting: &str, password: &str) -> Option<String> {
    let token = greeting.strip_prefix(GREETING_AUTH)?;
    if token.len() < 8 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digest = Md5::digest(format!("{token}{password}").as_bytes());
    Some(format!("{digest:x}"))
}

/// Value part of `%1<CMD>=<value>`.
fn reply_value<'a>(command: &str, response: &'a str) -> Option<&'a str> {
    response
        .strip_prefix("%1")?
        .strip_prefix(command)?
        .strip_prefix('=')
}

fn unexpected(command: &'static str, response: &str) -> PjlinkError {
    UnexpectedResponseSnafu {
        command,
        response: response.to_owned(),
    }
    .build()
}

fn parse_power(response: &str) -> Result<PowerState, PjlinkError> {
    reply_value(POWR, response)
        .and_then(PowerState::from_wire)
        .ok_or_else(|| unexpected(POWR, response))
}

fn parse_ack(command: &'static str, response: &str) -> Result<(), PjlinkError> {
    match reply_value(command, response) {
        Some("OK") => Ok(()),
        _ => Err(unexpected(command, response)),
    }
}

fn parse_input(response: &str) -> Result<Option<u16>, PjlinkError> {
    match reply_value(INPT, response) {
        Some("ERR3") => Ok(None),
        Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => value
            .parse()
            .map(Some)
            .map_err(|_| unexpected(INPT, response)),
        _ => Err(unexpected(INPT, response)),
    }
}

fn parse_set_input(code: u16, response: &str) -> Result<(), PjlinkError> {
    match reply_value(INPT, response) {
        Some("OK") => Ok(()),
        Some("ERR2") => InvalidParameterSnafu { code }.fail(),
        Some("ERR3") => NotReadySnafu.fail(),
        _ => Err(unexpected(INPT, response)),
    }
}

fn parse_inputs(response: &str) -> Result<InputList, PjlinkError> {
    match reply_value(INST, response).map(str::trim) {
        Some("ERR3") => UnavailableSnafu { command: INST }.fail(),
        Some(list) => list
            .split_whitespace()
            .map(|code| code.parse::<u16>())
            .collect::<Result<InputList, _>>()
            .map_err(|_| unexpected(INST, response)),
        None => Err(unexpected(INST, response)),
    }
}
