//! All the errors defined by this crate.

use std::io::{self, ErrorKind};
use thiserror::Error;

/// Shorthand for results returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a status query or RCON exchange can fail.
///
/// [`query_status`](crate::query_status) never surfaces these; it collapses
/// them into an offline result. [`execute_command`](crate::execute_command)
/// returns them as-is so callers can tell an unreachable server from a bad
/// password or a garbled reply.
#[derive(Error, Debug)]
pub enum Error {
    /// A server address string could not be parsed.
    #[error("invalid server address {0}")]
    InvalidAddress(String),

    /// The TCP connection was not established within the connect timeout.
    #[error("timed out connecting to server")]
    ConnectTimeout,

    /// Nothing is listening on the target address.
    #[error("connection refused")]
    ConnectionRefused,

    /// Any other network failure while connecting, reading or writing.
    #[error("connection error")]
    Connection(#[source] io::Error),

    /// A full frame did not arrive within the read timeout.
    #[error("timed out waiting for response")]
    ReadTimeout,

    /// The server closed the connection before a frame started.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The byte source ran out before a VarInt terminating byte was seen.
    #[error("truncated varint")]
    TruncatedVarInt,

    /// More than 5 bytes were consumed without a VarInt terminating byte.
    #[error("varint longer than 5 bytes")]
    VarIntTooLong,

    /// A frame or packet did not match the wire format.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The RCON server rejected the password (it echoed request id -1).
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The RCON server answered with a request id we did not send.
    ///
    /// Note: a request id of -1 during login is reported as
    /// [`Error::AuthenticationFailed`] instead.
    #[error("request id mismatch: expected {expected}, received {received}")]
    RequestIdMismatch {
        /// The id the session sent.
        expected: i32,
        /// The id the server echoed.
        received: i32,
    },

    /// Invalid or unexpected RCON packet type recieved from the server.
    #[error("unexpected packet type {0}")]
    UnexpectedPacketType(i32),

    /// An outgoing RCON payload exceeds what the server accepts.
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLong {
        /// Length of the rejected payload in bytes.
        len: usize,
        /// Largest payload the protocol allows in this direction.
        max: usize,
    },

    /// The status response body was not the expected JSON document.
    #[error("invalid status response")]
    InvalidStatusJson(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::MalformedResponse`] from anything printable.
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse(reason.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::ConnectionClosed,
            ErrorKind::TimedOut => Self::ReadTimeout,
            _ => Self::Connection(err),
        }
    }
}
