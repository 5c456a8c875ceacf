//! Enables remote command execution for minecraft servers.
//! See the documentation for [`execute_command`] for more information.

mod client;
mod packet;

pub use client::execute_command;

/// Longest payload the server sends in one packet. Longer output is split.
const MAX_LEN_CLIENTBOUND: usize = 4096;

/// Longest payload the server accepts.
const MAX_LEN_SERVERBOUND: usize = 1446;
