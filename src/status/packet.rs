use crate::varint;
use bytes::{BufMut, Bytes, BytesMut};

/// Protocol version sent in the handshake. A status query does not negotiate
/// a version, so any value is accepted by the server.
pub(super) const HANDSHAKE_PROTOCOL_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PacketId {
    /// Serverbound handshake.
    Handshake,
    /// Serverbound status request, in the status state.
    StatusRequest,
    /// Clientbound status response, in the status state.
    StatusResponse,
}

impl From<PacketId> for u32 {
    fn from(id: PacketId) -> Self {
        match id {
            PacketId::Handshake | PacketId::StatusRequest | PacketId::StatusResponse => 0,
        }
    }
}

/// The state the handshake asks the server to move to.
#[derive(Debug, Clone, Copy)]
pub(super) enum NextState {
    Status = 1,
}

impl From<NextState> for u32 {
    fn from(state: NextState) -> Self {
        state as u32
    }
}

/// Builds the body of a status-protocol frame: the packet id followed by its
/// fields. The length prefix is added by the connection.
#[derive(Debug)]
pub(super) struct PacketBuilder {
    bytes: BytesMut,
}

impl PacketBuilder {
    pub fn new(id: PacketId) -> Self {
        let mut bytes = BytesMut::new();
        varint::encode_into(id.into(), &mut bytes);

        Self { bytes }
    }

    pub fn add_varint(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&varint::encode(value));
        self
    }

    pub fn add_string(self, string: &str) -> Self {
        let mut inst = self.add_varint(string.len() as u32);
        inst.bytes.put(string.as_bytes());
        inst
    }

    pub fn add_u16(mut self, short: u16) -> Self {
        self.bytes.put_u16(short);
        self
    }

    pub fn build(self) -> Bytes {
        self.bytes.freeze()
    }
}

/// Handshake announcing a status query for `host:port`.
pub(super) fn handshake(host: &str, port: u16) -> Bytes {
    PacketBuilder::new(PacketId::Handshake)
        .add_varint(HANDSHAKE_PROTOCOL_VERSION)
        .add_string(host)
        .add_u16(port)
        .add_varint(NextState::Status.into())
        .build()
}

/// The status request carries nothing but its id.
pub(super) fn status_request() -> Bytes {
    PacketBuilder::new(PacketId::StatusRequest).build()
}
