//! Clients for the [Server List Ping](https://wiki.vg/Server_List_Ping) status
//! query and for [RCON](https://wiki.vg/RCON), the two protocols used to watch
//! and administer a Minecraft server from outside the game.
//!
//! Each call opens its own connection, runs one exchange and closes it:
//! * [`query_status`] always returns a [`StatusResult`], reporting the server
//!   offline when anything goes wrong.
//! * [`execute_command`] runs one command and returns its output, or an
//!   [`Error`] saying what failed.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::module_name_repetitions)]

mod address;
mod connection;
pub mod errors;
pub mod rcon;
pub mod status;
mod varint;

pub use address::{ServerAddress, DEFAULT_RCON_PORT, DEFAULT_STATUS_PORT, DEFAULT_TIMEOUT};
pub use errors::{Error, Result};
pub use rcon::execute_command;
pub use status::{data::StatusResult, query_status};
