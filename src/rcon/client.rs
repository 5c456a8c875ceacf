//! Implementation of the [RCON](https://wiki.vg/RCON) protocol.

use super::{
    packet::{RconPacket, RconPacketType, MIN_BODY_LEN},
    MAX_LEN_CLIENTBOUND, MAX_LEN_SERVERBOUND,
};
use crate::{
    address::ServerAddress,
    connection::{FramedConnection, LengthPrefix},
    errors::{Error, Result},
};
use rand::random;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::{debug, trace};

/// Largest frame body the server may send. The server splits output every
/// 4096 characters, and a character takes up to 3 bytes in UTF-8.
const MAX_FRAME_LEN: usize = MAX_LEN_CLIENTBOUND * 3 + MIN_BODY_LEN;

/// Request id the server echoes when the password is wrong.
const AUTH_FAILED_ID: i32 = -1;

/// Log in to the server's RCON port, run one command and return its output.
///
/// Opens a fresh connection for the call and closes it before returning,
/// whether or not the command succeeded. Nothing is retried.
///
/// # Arguments
/// * `address` - The server's RCON address (not its game port).
/// * `password` - The `rcon.password` from `server.properties`.
/// * `command` - The command to run, without a leading slash.
/// * `timeout` - Bound on connecting, and separately on each response.
///
/// # Errors
/// Returns [`Error::AuthenticationFailed`] for a wrong password,
/// [`Error::ConnectTimeout`], [`Error::ConnectionRefused`] or
/// [`Error::Connection`] when the server can't be reached,
/// [`Error::ReadTimeout`] when a response is late, and
/// [`Error::MalformedResponse`] or another protocol error when the reply does
/// not follow the protocol. [`Error::PayloadTooLong`] is returned before
/// connecting when the password or command is over 1446 bytes.
///
/// # Examples
///
/// ```no_run
/// use mc_probe::{execute_command, Result, ServerAddress, DEFAULT_RCON_PORT, DEFAULT_TIMEOUT};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let address = ServerAddress::new("localhost", DEFAULT_RCON_PORT);
///     let output = execute_command(&address, "password", "time set day", DEFAULT_TIMEOUT).await?;
///     println!("{output}");
///
///     Ok(())
/// }
/// ```
pub async fn execute_command(
    address: &ServerAddress,
    password: &str,
    command: &str,
    timeout: Duration,
) -> Result<String> {
    check_payload_len(password)?;
    check_payload_len(command)?;

    let connection =
        FramedConnection::connect(address, LengthPrefix::I32Le, MAX_FRAME_LEN, timeout).await?;

    let session = RconSession::new(connection, random_request_id(), timeout);
    session.execute(password, command).await
}

/// A non-negative id, so it can never be confused with [`AUTH_FAILED_ID`].
fn random_request_id() -> i32 {
    random::<i32>() & i32::MAX
}

fn check_payload_len(payload: &str) -> Result<()> {
    if payload.len() > MAX_LEN_SERVERBOUND {
        return Err(Error::PayloadTooLong {
            len: payload.len(),
            max: MAX_LEN_SERVERBOUND,
        });
    }

    Ok(())
}

/// Where a session is in its single login-then-command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connected,
    Authenticating,
    Authenticated,
    CommandSent,
    Done,
}

/// One connection's worth of RCON: log in, run a command, close.
///
/// Every packet carries the same `request_id`. That is only unambiguous
/// because a session never has more than one request awaiting its response.
#[derive(Debug)]
pub(crate) struct RconSession<S = TcpStream> {
    connection: FramedConnection<S>,
    request_id: i32,
    timeout: Duration,
    state: SessionState,
}

impl<S> RconSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(connection: FramedConnection<S>, request_id: i32, timeout: Duration) -> Self {
        debug_assert!(request_id >= 0, "request id {request_id} must be non-negative");

        Self {
            connection,
            request_id,
            timeout,
            state: SessionState::Connected,
        }
    }

    /// Authenticate, run `command`, and close the connection on every path.
    pub(crate) async fn execute(mut self, password: &str, command: &str) -> Result<String> {
        let result = self.authenticate_and_run(password, command).await;

        if let Err(err) = &result {
            debug!(%err, state = ?self.state, "rcon session failed");
        }

        self.connection.close().await;
        result
    }

    async fn authenticate_and_run(&mut self, password: &str, command: &str) -> Result<String> {
        self.authenticate(password).await?;
        self.run_command(command).await
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        debug_assert_eq!(self.state, SessionState::Connected);

        self.write_packet(RconPacketType::Login, password).await?;
        self.transition(SessionState::Authenticating);

        // Source servers send an empty response value ahead of the auth
        // response; Minecraft doesn't. Skip at most one.
        let mut skipped_empty = false;

        loop {
            let packet = self.read_packet().await?;

            if packet.request_id == AUTH_FAILED_ID {
                return Err(Error::AuthenticationFailed);
            }
            self.check_request_id(&packet)?;

            match packet.packet_type {
                RconPacketType::RunCommand => break,
                RconPacketType::Response if !skipped_empty && packet.payload.is_empty() => {
                    trace!("skipping empty response ahead of auth response");
                    skipped_empty = true;
                }
                other => return Err(Error::UnexpectedPacketType(other.into())),
            }
        }

        self.transition(SessionState::Authenticated);
        Ok(())
    }

    async fn run_command(&mut self, command: &str) -> Result<String> {
        debug_assert_eq!(self.state, SessionState::Authenticated);

        self.write_packet(RconPacketType::RunCommand, command).await?;
        self.transition(SessionState::CommandSent);

        let mut full_payload = self.read_response().await?;
        let mut fragment_len = full_payload.chars().count();

        // a fragment that fills the packet may be followed by more; there is
        // no end marker, so the next fragment not arriving in time ends it
        while fragment_len >= MAX_LEN_CLIENTBOUND {
            match self.read_response().await {
                Ok(fragment) => {
                    fragment_len = fragment.chars().count();
                    trace!(len = fragment_len, "recieved response fragment");
                    full_payload.push_str(&fragment);
                }
                Err(Error::ReadTimeout | Error::ConnectionClosed) => break,
                Err(err) => return Err(err),
            }
        }

        self.transition(SessionState::Done);
        Ok(full_payload)
    }

    /// Read one command response packet and return its payload.
    async fn read_response(&mut self) -> Result<String> {
        let packet = self.read_packet().await?;

        if packet.request_id == AUTH_FAILED_ID {
            return Err(Error::AuthenticationFailed);
        }
        self.check_request_id(&packet)?;

        if packet.packet_type != RconPacketType::Response {
            return Err(Error::UnexpectedPacketType(packet.packet_type.into()));
        }

        Ok(packet.payload)
    }

    fn check_request_id(&self, packet: &RconPacket) -> Result<()> {
        if packet.request_id != self.request_id {
            return Err(Error::RequestIdMismatch {
                expected: self.request_id,
                received: packet.request_id,
            });
        }

        Ok(())
    }

    async fn read_packet(&mut self) -> Result<RconPacket> {
        let frame = self.connection.receive_frame(self.timeout).await?;
        RconPacket::decode(frame)
    }

    async fn write_packet(&mut self, packet_type: RconPacketType, payload: &str) -> Result<()> {
        let packet = RconPacket::new(self.request_id, packet_type, payload);
        self.connection.send_frame(&packet.encode()).await
    }

    fn transition(&mut self, to: SessionState) {
        trace!(from = ?self.state, ?to, "rcon session state");
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::{execute_command, RconSession, MAX_FRAME_LEN};
    use crate::{
        address::ServerAddress,
        connection::{FramedConnection, LengthPrefix},
        errors::Error,
    };
    use std::time::Duration;
    use tokio::{
        io::{duplex, AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    const TIMEOUT: Duration = Duration::from_secs(2);
    const PASSWORD: &str = "hunter2";

    /// A packet as the mock server saw it.
    #[derive(Debug, PartialEq)]
    struct Captured {
        request_id: i32,
        packet_type: i32,
        payload: String,
    }

    fn frame(request_id: i32, packet_type: i32, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&((payload.len() + 10) as i32).to_le_bytes());
        frame.extend_from_slice(&request_id.to_le_bytes());
        frame.extend_from_slice(&packet_type.to_le_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(b"\x00\x00");
        frame
    }

    /// Read one packet, or `None` once the client has closed the connection.
    async fn read_packet(stream: &mut TcpStream) -> Option<Captured> {
        let len = stream.read_i32_le().await.ok()?;
        let mut body = vec![0u8; len as usize];
        stream.read_exact(&mut body).await.ok()?;

        Some(Captured {
            request_id: i32::from_le_bytes(body[0..4].try_into().unwrap()),
            packet_type: i32::from_le_bytes(body[4..8].try_into().unwrap()),
            payload: String::from_utf8(body[8..body.len() - 2].to_vec()).unwrap(),
        })
    }

    async fn listen() -> (TcpListener, ServerAddress) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = ServerAddress::new("127.0.0.1", listener.local_addr().unwrap().port());
        (listener, address)
    }

    /// A server that accepts `PASSWORD`, answers the command with each of
    /// `fragments`, and records every packet until the client hangs up.
    async fn serve(fragments: Vec<Vec<u8>>) -> (ServerAddress, JoinHandle<Vec<Captured>>) {
        let (listener, address) = listen().await;

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut captured = Vec::new();

            let login = read_packet(&mut stream).await.unwrap();
            let id = if login.payload == PASSWORD {
                login.request_id
            } else {
                -1
            };
            stream.write_all(&frame(id, 2, b"")).await.unwrap();
            captured.push(login);

            if id != -1 {
                let command = read_packet(&mut stream).await.unwrap();
                for fragment in &fragments {
                    let reply = frame(command.request_id, 0, fragment);
                    // split each reply to exercise reassembly
                    let (head, tail) = reply.split_at(reply.len() / 2);
                    stream.write_all(head).await.unwrap();
                    stream.flush().await.unwrap();
                    tokio::task::yield_now().await;
                    stream.write_all(tail).await.unwrap();
                }
                captured.push(command);
            }

            while let Some(extra) = read_packet(&mut stream).await {
                captured.push(extra);
            }

            captured
        });

        (address, handle)
    }

    #[tokio::test]
    async fn test_rcon_command() {
        let (address, server) = serve(vec![b"Set the time to 1000".to_vec()]).await;

        let output = execute_command(&address, PASSWORD, "time set day", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output, "Set the time to 1000");

        let captured = server.await.unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].packet_type, 3);
        assert_eq!(captured[0].payload, PASSWORD);
        assert_eq!(captured[1].packet_type, 2);
        assert_eq!(captured[1].payload, "time set day");
        assert_eq!(captured[0].request_id, captured[1].request_id);
        assert!(captured[0].request_id >= 0);
    }

    #[tokio::test]
    async fn test_rcon_incorrect_password() {
        let (address, server) = serve(vec![]).await;

        let result = execute_command(&address, "incorrect", "stop", TIMEOUT).await;
        assert!(matches!(result, Err(Error::AuthenticationFailed)));

        // only the login packet, then the client hung up
        let captured = server.await.unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].packet_type, 3);
    }

    #[tokio::test]
    async fn test_rcon_split_response() {
        let first = vec![b'a'; 4096];
        let (address, _server) = serve(vec![first.clone(), b"tail".to_vec()]).await;

        let output = execute_command(&address, PASSWORD, "help", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.len(), 4100);
        assert!(output.ends_with("atail"));
    }

    #[tokio::test]
    async fn test_rcon_multibyte_fragments() {
        // 4096 characters, 8192 bytes
        let first = "\u{a7}".repeat(4096).into_bytes();
        let (address, _server) = serve(vec![first, "\u{a7}aok".as_bytes().to_vec()]).await;

        let output = execute_command(&address, PASSWORD, "list", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.chars().count(), 4099);
        assert!(output.ends_with("\u{a7}aok"));
    }

    #[tokio::test]
    async fn test_rcon_multibyte_final_fragment() {
        // over 4096 bytes but under 4096 characters, so nothing follows
        let only = "\u{a7}".repeat(3000).into_bytes();
        let (address, _server) = serve(vec![only]).await;

        let output = execute_command(&address, PASSWORD, "list", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.chars().count(), 3000);
    }

    #[tokio::test]
    async fn test_rcon_full_fragment_without_followup() {
        let (address, _server) = serve(vec![vec![b'b'; 4096]]).await;

        let output = execute_command(&address, PASSWORD, "help", Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(output.len(), 4096);
    }

    #[tokio::test]
    async fn test_rcon_short_response_frame() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let login = read_packet(&mut stream).await.unwrap();
            stream
                .write_all(&frame(login.request_id, 2, b""))
                .await
                .unwrap();
            read_packet(&mut stream).await.unwrap();
            // 4 byte body: not even a full header
            stream.write_all(b"\x04\x00\x00\x00\x00\x00\x00\x00").await.unwrap();
            let _ = read_packet(&mut stream).await;
        });

        let result = execute_command(&address, PASSWORD, "list", TIMEOUT).await;
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_rcon_truncated_frame() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let login = read_packet(&mut stream).await.unwrap();
            // declares 20 bytes, sends 10, hangs up
            let mut reply = frame(login.request_id, 2, b"");
            reply[0] = 20;
            stream.write_all(&reply).await.unwrap();
        });

        let result = execute_command(&address, PASSWORD, "list", TIMEOUT).await;
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_rcon_request_id_mismatch() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let login = read_packet(&mut stream).await.unwrap();
            let wrong = login.request_id.wrapping_add(1);
            stream.write_all(&frame(wrong, 2, b"")).await.unwrap();
            let _ = read_packet(&mut stream).await;
        });

        let result = execute_command(&address, PASSWORD, "list", TIMEOUT).await;
        assert!(matches!(result, Err(Error::RequestIdMismatch { .. })));
    }

    #[tokio::test]
    async fn test_rcon_unexpected_packet_type() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let login = read_packet(&mut stream).await.unwrap();
            stream
                .write_all(&frame(login.request_id, 2, b""))
                .await
                .unwrap();
            let command = read_packet(&mut stream).await.unwrap();
            stream
                .write_all(&frame(command.request_id, 3, b"?"))
                .await
                .unwrap();
            let _ = read_packet(&mut stream).await;
        });

        let result = execute_command(&address, PASSWORD, "list", TIMEOUT).await;
        assert!(matches!(result, Err(Error::UnexpectedPacketType(3))));
    }

    #[tokio::test]
    async fn test_rcon_skips_empty_response_before_auth() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let login = read_packet(&mut stream).await.unwrap();
            stream
                .write_all(&frame(login.request_id, 0, b""))
                .await
                .unwrap();
            stream
                .write_all(&frame(login.request_id, 2, b""))
                .await
                .unwrap();
            let command = read_packet(&mut stream).await.unwrap();
            stream
                .write_all(&frame(command.request_id, 0, b"There are 0 of a max of 20 players online"))
                .await
                .unwrap();
            let _ = read_packet(&mut stream).await;
        });

        let output = execute_command(&address, PASSWORD, "list", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output, "There are 0 of a max of 20 players online");
    }

    #[tokio::test]
    async fn test_rcon_read_timeout() {
        let (listener, address) = listen().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // swallow everything, answer nothing
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink).await;
        });

        let result = execute_command(&address, PASSWORD, "list", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(Error::ReadTimeout)));
    }

    #[tokio::test]
    async fn test_rcon_connection_refused() {
        let (listener, address) = listen().await;
        drop(listener);

        let result = execute_command(&address, PASSWORD, "list", TIMEOUT).await;
        assert!(matches!(result, Err(Error::ConnectionRefused)));
    }

    #[tokio::test]
    async fn test_rcon_payload_too_long() {
        // rejected before any connection is attempted
        let address = ServerAddress::new("127.0.0.1", 1);
        let command = "a".repeat(1447);

        let result = execute_command(&address, PASSWORD, &command, TIMEOUT).await;
        assert!(matches!(
            result,
            Err(Error::PayloadTooLong { len: 1447, max: 1446 })
        ));
    }

    #[tokio::test]
    async fn test_session_wire_bytes() {
        let (client, mut server) = duplex(256);
        let connection = FramedConnection::new(client, LengthPrefix::I32Le, MAX_FRAME_LEN);
        let session = RconSession::new(connection, 0, TIMEOUT);

        let server = tokio::spawn(async move {
            let mut login = [0; 4 + 8 + 2 + 2];
            server.read_exact(&mut login).await.unwrap();
            assert_eq!(
                &login,
                b"\x0c\x00\x00\x00\x00\x00\x00\x00\x03\x00\x00\x00pw\x00\x00"
            );
            server
                .write_all(b"\x0a\x00\x00\x00\x00\x00\x00\x00\x02\x00\x00\x00\x00\x00")
                .await
                .unwrap();

            let mut command = [0; 4 + 8 + 4 + 2];
            server.read_exact(&mut command).await.unwrap();
            assert_eq!(
                &command,
                b"\x0e\x00\x00\x00\x00\x00\x00\x00\x02\x00\x00\x00list\x00\x00"
            );
            server
                .write_all(b"\x0c\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00ok\x00\x00")
                .await
                .unwrap();
            server
        });

        let output = session.execute("pw", "list").await.unwrap();
        assert_eq!(output, "ok");
        drop(server.await.unwrap());
    }
}
