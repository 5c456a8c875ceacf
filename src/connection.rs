//! Length-prefixed frames over a TCP stream.
//!
//! Both protocols send a length followed by that many body bytes; they only
//! disagree on how the length is written. [`FramedConnection`] owns the read
//! buffer so protocol code only ever sees whole frames.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, trace};

use crate::{
    address::ServerAddress,
    errors::{Error, Result},
    varint,
};

/// How a frame announces the length of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthPrefix {
    /// A VarInt, as used by the handshake and status packets.
    VarInt,
    /// A little-endian `i32`, as used by RCON.
    I32Le,
}

impl LengthPrefix {
    fn encode(self, len: usize, buffer: &mut BytesMut) -> Result<()> {
        match self {
            Self::VarInt => {
                let len = u32::try_from(len)
                    .map_err(|_| Error::malformed(format!("frame of {len} bytes is too long")))?;
                varint::encode_into(len, buffer);
            }
            Self::I32Le => {
                let len = i32::try_from(len)
                    .map_err(|_| Error::malformed(format!("frame of {len} bytes is too long")))?;
                buffer.put_i32_le(len);
            }
        }

        Ok(())
    }

    /// Try to read a length off the front of `buffered`.
    ///
    /// `Ok(None)` means more bytes are needed.
    fn decode(self, buffered: &[u8]) -> Result<Option<(usize, usize)>> {
        match self {
            Self::VarInt => match varint::decode(buffered) {
                Ok((len, read)) => Ok(Some((len as usize, read))),
                Err(Error::TruncatedVarInt) => Ok(None),
                Err(err) => Err(err),
            },
            Self::I32Le => {
                if buffered.len() < 4 {
                    return Ok(None);
                }

                let len = i32::from_le_bytes([buffered[0], buffered[1], buffered[2], buffered[3]]);
                let len = usize::try_from(len)
                    .map_err(|_| Error::malformed(format!("negative frame length {len}")))?;

                Ok(Some((len, 4)))
            }
        }
    }

    /// Bytes a complete length field occupies at most.
    fn max_len(self) -> usize {
        match self {
            Self::VarInt => varint::MAX_LEN,
            Self::I32Le => 4,
        }
    }
}

/// A stream that reads and writes whole frames.
///
/// Generic over the stream so tests can drive it through an in-memory pipe.
#[derive(Debug)]
pub(crate) struct FramedConnection<S = TcpStream> {
    stream: S,
    prefix: LengthPrefix,
    max_frame_len: usize,
    buffer: BytesMut,
}

impl FramedConnection<TcpStream> {
    /// Open a TCP connection to `address`.
    ///
    /// # Errors
    /// [`Error::ConnectTimeout`] when `connect_timeout` passes first,
    /// [`Error::ConnectionRefused`] when nothing listens there, and
    /// [`Error::Connection`] for anything else (including DNS failures).
    pub(crate) async fn connect(
        address: &ServerAddress,
        prefix: LengthPrefix,
        max_frame_len: usize,
        connect_timeout: Duration,
    ) -> Result<Self> {
        debug!(%address, "connecting");

        let stream = timeout(
            connect_timeout,
            TcpStream::connect((address.host(), address.port())),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)?
        .map_err(|err| match Error::from(err) {
            // a reset during connect is still a failure to connect
            Error::ConnectionClosed => Error::ConnectionRefused,
            Error::ReadTimeout => Error::ConnectTimeout,
            other => other,
        })?;

        stream.set_nodelay(true).map_err(Error::Connection)?;
        trace!(%address, "connected");

        Ok(Self::new(stream, prefix, max_frame_len))
    }
}

impl<S> FramedConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(stream: S, prefix: LengthPrefix, max_frame_len: usize) -> Self {
        Self {
            stream,
            prefix,
            max_frame_len,
            buffer: BytesMut::with_capacity(512),
        }
    }

    /// Write the length prefix and `body` as a single write.
    pub(crate) async fn send_frame(&mut self, body: &[u8]) -> Result<()> {
        let mut frame = BytesMut::with_capacity(self.prefix.max_len() + body.len());
        self.prefix.encode(body.len(), &mut frame)?;
        frame.extend_from_slice(body);

        trace!(len = body.len(), "sending frame");
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Read one whole frame body.
    ///
    /// The whole frame, prefix included, must arrive within `read_timeout`.
    ///
    /// # Errors
    /// [`Error::ReadTimeout`] when the timeout passes, [`Error::ConnectionClosed`]
    /// when the stream ends before the frame starts, a varint error for a bad
    /// length prefix, and [`Error::MalformedResponse`] when the declared length is
    /// out of range or the stream ends part-way through the body.
    pub(crate) async fn receive_frame(&mut self, read_timeout: Duration) -> Result<Bytes> {
        timeout(read_timeout, self.read_frame())
            .await
            .map_err(|_| Error::ReadTimeout)?
    }

    async fn read_frame(&mut self) -> Result<Bytes> {
        let (len, prefix_len) = loop {
            if let Some(decoded) = self.prefix.decode(&self.buffer)? {
                break decoded;
            }

            if self.fill().await? == 0 {
                return Err(if self.buffer.is_empty() {
                    Error::ConnectionClosed
                } else if self.prefix == LengthPrefix::VarInt {
                    Error::TruncatedVarInt
                } else {
                    Error::malformed("stream ended inside the length prefix")
                });
            }
        };

        if len > self.max_frame_len {
            return Err(Error::malformed(format!(
                "declared frame length {len} exceeds the {} byte maximum",
                self.max_frame_len
            )));
        }

        self.buffer.advance(prefix_len);

        while self.buffer.len() < len {
            if self.fill().await? == 0 {
                return Err(Error::malformed(format!(
                    "declared {len} bytes but the stream ended after {}",
                    self.buffer.len()
                )));
            }
        }

        trace!(len, "received frame");
        Ok(self.buffer.split_to(len).freeze())
    }

    /// Read whatever the stream has into the buffer. Returns 0 at end of stream.
    async fn fill(&mut self) -> Result<usize> {
        self.buffer.reserve(512);
        Ok(self.stream.read_buf(&mut self.buffer).await?)
    }

    /// Shut the stream down. Errors are logged, not returned, since the
    /// exchange is already over by the time this runs.
    pub(crate) async fn close(mut self) {
        if let Err(err) = self.stream.shutdown().await {
            debug!(%err, "error while closing connection");
        }
    }
}
