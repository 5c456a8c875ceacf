use crate::errors::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

/// Request id plus packet type.
const HEADER_LEN: usize = size_of::<i32>() * 2;

/// The null terminating the payload, and the empty string after it.
const TRAILER: &[u8] = b"\x00\x00";

/// Smallest valid packet body: a header around an empty payload.
pub(super) const MIN_BODY_LEN: usize = HEADER_LEN + TRAILER.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RconPacketType {
    /// `SERVERDATA_RESPONSE_VALUE`, the reply to a command.
    Response,
    /// `SERVERDATA_EXECCOMMAND` when sent, `SERVERDATA_AUTH_RESPONSE` when
    /// recieved. The protocol uses 2 for both.
    RunCommand,
    /// `SERVERDATA_AUTH`
    Login,
}

impl From<RconPacketType> for i32 {
    fn from(packet_type: RconPacketType) -> Self {
        match packet_type {
            RconPacketType::Response => 0,
            RconPacketType::RunCommand => 2,
            RconPacketType::Login => 3,
        }
    }
}

impl TryFrom<i32> for RconPacketType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(RconPacketType::Response),
            2 => Ok(RconPacketType::RunCommand),
            3 => Ok(RconPacketType::Login),
            _ => Err(Error::UnexpectedPacketType(value)),
        }
    }
}

/// One RCON packet, minus the length field the connection adds.
///
/// Wire layout: `i32le request_id | i32le packet_type | payload | 0x00 | 0x00`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RconPacket {
    pub request_id: i32,
    pub packet_type: RconPacketType,
    pub payload: String,
}

impl RconPacket {
    pub fn new(request_id: i32, packet_type: RconPacketType, payload: &str) -> Self {
        Self {
            request_id,
            packet_type,
            payload: payload.to_string(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(MIN_BODY_LEN + self.payload.len());

        bytes.put_i32_le(self.request_id);
        bytes.put_i32_le(self.packet_type.into());
        bytes.put(self.payload.as_bytes());
        bytes.put(TRAILER);

        bytes.freeze()
    }

    /// Parse a frame body recieved from the server.
    pub fn decode(mut body: Bytes) -> Result<Self> {
        if body.len() < HEADER_LEN {
            return Err(Error::malformed(format!(
                "packet of {} bytes is shorter than the {HEADER_LEN} byte header",
                body.len()
            )));
        }

        if body.len() < MIN_BODY_LEN || !body.ends_with(TRAILER) {
            return Err(Error::malformed("packet is missing its null terminators"));
        }

        let request_id = body.get_i32_le();
        let packet_type: RconPacketType = body.get_i32_le().try_into()?;

        let payload = body.split_to(body.len() - TRAILER.len());
        let payload = String::from_utf8(payload.to_vec())
            .map_err(|_| Error::malformed("payload is not valid UTF-8"))?;

        Ok(Self {
            request_id,
            packet_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RconPacket, RconPacketType};
    use crate::errors::Error;
    use bytes::Bytes;

    #[test]
    fn test_encode_layout() {
        let packet = RconPacket::new(7, RconPacketType::Login, "pw");
        assert_eq!(
            packet.encode().as_ref(),
            b"\x07\x00\x00\x00\x03\x00\x00\x00pw\x00\x00"
        );

        let packet = RconPacket::new(0, RconPacketType::RunCommand, "");
        assert_eq!(
            packet.encode().as_ref(),
            b"\x00\x00\x00\x00\x02\x00\x00\x00\x00\x00"
        );
    }

    #[test]
    fn test_decode_strips_header_and_trailer() {
        let body = Bytes::from_static(b"\x2a\x00\x00\x00\x00\x00\x00\x00Set the time to 1000\x00\x00");
        let packet = RconPacket::decode(body).unwrap();

        assert_eq!(packet.request_id, 42);
        assert_eq!(packet.packet_type, RconPacketType::Response);
        assert_eq!(packet.payload, "Set the time to 1000");
    }

    #[test]
    fn test_decode_section_sign() {
        let body = Bytes::from("\x01\x00\x00\x00\x00\x00\x00\x00\u{a7}aok\x00\x00");
        assert_eq!(RconPacket::decode(body).unwrap().payload, "\u{a7}aok");
    }

    #[test]
    fn test_decode_auth_failure_id() {
        let body = Bytes::from_static(b"\xff\xff\xff\xff\x02\x00\x00\x00\x00\x00");
        let packet = RconPacket::decode(body).unwrap();

        assert_eq!(packet.request_id, -1);
        assert_eq!(packet.packet_type, RconPacketType::RunCommand);
    }

    #[test]
    fn test_decode_short_header() {
        for len in 0..8 {
            let body = Bytes::from(vec![0u8; len]);
            assert!(matches!(
                RconPacket::decode(body),
                Err(Error::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_decode_missing_terminators() {
        let body = Bytes::from_static(b"\x01\x00\x00\x00\x00\x00\x00\x00");
        assert!(matches!(
            RconPacket::decode(body),
            Err(Error::MalformedResponse(_))
        ));

        let body = Bytes::from_static(b"\x01\x00\x00\x00\x00\x00\x00\x00ab");
        assert!(matches!(
            RconPacket::decode(body),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let body = Bytes::from_static(b"\x01\x00\x00\x00\x09\x00\x00\x00\x00\x00");
        assert!(matches!(
            RconPacket::decode(body),
            Err(Error::UnexpectedPacketType(9))
        ));
    }
}
