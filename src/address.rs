//! Where to connect, and the defaults used when a caller leaves them out.

use std::{fmt, str::FromStr, time::Duration};

use crate::errors::Error;

/// Standard Minecraft game port, answered by the status protocol.
pub const DEFAULT_STATUS_PORT: u16 = 25565;

/// Port `server.properties` ships with for RCON.
pub const DEFAULT_RCON_PORT: u16 = 25575;

/// Timeout used for connecting and for each response when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A host name or IP literal plus a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Construct an address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[v6]:port`, using `default_port` when
    /// no port is written.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAddress`] when the host is empty or the port
    /// is not a number.
    pub fn parse_with_default(input: &str, default_port: u16) -> Result<Self, Error> {
        let input = input.trim();

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid_input(input, "unclosed '['"))?;
            match after.strip_prefix(':') {
                Some(port) => (host, parse_port(input, port)?),
                None if after.is_empty() => (host, default_port),
                None => return Err(invalid_input(input, "garbage after ']'")),
            }
        } else {
            match input.rsplit_once(':') {
                // a bare IPv6 literal has more than one colon
                Some((host, _)) if host.contains(':') => (input, default_port),
                Some((host, port)) => (host, parse_port(input, port)?),
                None => (input, default_port),
            }
        };

        if host.is_empty() {
            return Err(invalid_input(input, "empty host"));
        }

        Ok(Self::new(host, port))
    }

    /// The host name or IP literal, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    /// Parses with [`DEFAULT_STATUS_PORT`] as the fallback port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, DEFAULT_STATUS_PORT)
    }
}

fn parse_port(input: &str, port: &str) -> Result<u16, Error> {
    port.parse()
        .map_err(|_| invalid_input(input, "port is not a number between 0 and 65535"))
}

fn invalid_input(input: &str, reason: &str) -> Error {
    Error::InvalidAddress(format!("{input:?}: {reason}"))
}
