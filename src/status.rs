//! Get the status of a server using the [Server List Ping](https://wiki.vg/Server_List_Ping) protocol.
//! See documentation for [`query_status`] for more information.

pub mod data;
mod packet;

use self::data::{StatusResponse, StatusResult};
use crate::{
    address::ServerAddress,
    connection::{FramedConnection, LengthPrefix},
    errors::{Error, Result},
    varint,
};
use bytes::{Buf, Bytes};
use std::time::Duration;
use tracing::debug;

/// Largest packet the protocol can describe with a 3-byte length.
const MAX_FRAME_LEN: usize = 2_097_151;

/// Ping the server for information following the [Server List Ping](https://wiki.vg/Server_List_Ping) protocol.
///
/// This never fails. Refused connections, timeouts and garbled replies all
/// produce [`StatusResult::offline`], so a status display can call it without
/// handling errors.
///
/// # Arguments
/// * `address` - The server to query.
/// * `timeout` - Bound on connecting, and separately on receiving the response.
///
/// # Examples
/// ```no_run
/// use mc_probe::{query_status, ServerAddress, DEFAULT_TIMEOUT};
///
/// #[tokio::main]
/// async fn main() {
///     let address: ServerAddress = "mc.hypixel.net".parse().unwrap();
///     let status = query_status(&address, DEFAULT_TIMEOUT).await;
///     println!("{status:#?}");
/// }
/// ```
pub async fn query_status(address: &ServerAddress, timeout: Duration) -> StatusResult {
    match try_query_status(address, timeout).await {
        Ok(response) => response.into(),
        Err(err) => {
            debug!(%address, %err, "status query failed, reporting offline");
            StatusResult::offline()
        }
    }
}

/// The status exchange with its failures intact.
pub(crate) async fn try_query_status(
    address: &ServerAddress,
    timeout: Duration,
) -> Result<StatusResponse> {
    let connection =
        FramedConnection::connect(address, LengthPrefix::VarInt, MAX_FRAME_LEN, timeout).await?;

    exchange(connection, address, timeout).await
}

/// Run the handshake on an open connection, then close it whatever happened.
async fn exchange<S>(
    mut connection: FramedConnection<S>,
    address: &ServerAddress,
    timeout: Duration,
) -> Result<StatusResponse>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let result = request_status(&mut connection, address, timeout).await;
    connection.close().await;
    result
}

async fn request_status<S>(
    connection: &mut FramedConnection<S>,
    address: &ServerAddress,
    timeout: Duration,
) -> Result<StatusResponse>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    // https://wiki.vg/Server_List_Ping#Handshake
    connection
        .send_frame(&packet::handshake(address.host(), address.port()))
        .await?;

    // https://wiki.vg/Server_List_Ping#Status_Request
    connection.send_frame(&packet::status_request()).await?;

    // https://wiki.vg/Server_List_Ping#Status_Response
    let frame = connection.receive_frame(timeout).await?;
    let json = parse_status_frame(frame)?;

    Ok(serde_json::from_slice::<StatusResponse>(&json)?)
}

/// Split a status response frame into its JSON bytes.
fn parse_status_frame(mut frame: Bytes) -> Result<Bytes> {
    let (id, read) = varint::decode(&frame)?;
    frame.advance(read);

    if id != u32::from(packet::PacketId::StatusResponse) {
        return Err(Error::malformed(format!("status response has packet id {id}")));
    }

    let (len, read) = varint::decode(&frame)?;
    frame.advance(read);

    let len = len as usize;
    if frame.len() < len {
        return Err(Error::malformed(format!(
            "status JSON declared {len} bytes but the frame holds {}",
            frame.len()
        )));
    }

    Ok(frame.split_to(len))
}
