//! The [VarInt](https://wiki.vg/Protocol#VarInt_and_VarLong) encoding shared
//! by the handshake and status framing.

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::{Error, Result};

pub(crate) const SEGMENT_BITS: u8 = 0x7f; // 0111 1111
pub(crate) const CONTINUE_BIT: u8 = 0x80; // 1000 0000

/// Longest encoding of a 32-bit value.
pub(crate) const MAX_LEN: usize = 5;

/// Bits of the last byte that still fit in 32 bits.
const LAST_BYTE_BITS: u8 = 0x0f;

/// Append the VarInt encoding of `value` to `buffer`.
pub(crate) fn encode_into(value: u32, buffer: &mut BytesMut) {
    let mut value = value;

    loop {
        let segment = (value & SEGMENT_BITS as u32) as u8;
        value >>= 7;

        if value == 0 {
            buffer.put_u8(segment);
            break;
        }

        buffer.put_u8(segment | CONTINUE_BIT);
    }
}

/// Encode `value` on its own.
pub(crate) fn encode(value: u32) -> Bytes {
    let mut buffer = BytesMut::with_capacity(MAX_LEN);
    encode_into(value, &mut buffer);
    buffer.freeze()
}

/// Decode a VarInt from the front of `source`.
///
/// Returns the value and how many bytes of `source` it occupied. Bytes after
/// the terminating byte are left alone.
pub(crate) fn decode(source: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;

    for (index, &byte) in source.iter().take(MAX_LEN).enumerate() {
        // the 5th byte only has room for 4 more bits
        if index == MAX_LEN - 1 && byte & !LAST_BYTE_BITS != 0 {
            return Err(Error::VarIntTooLong);
        }

        value |= ((byte & SEGMENT_BITS) as u32) << (7 * index as u32);

        if byte & CONTINUE_BIT == 0 {
            return Ok((value, index + 1));
        }
    }

    if source.len() >= MAX_LEN {
        Err(Error::VarIntTooLong)
    } else {
        Err(Error::TruncatedVarInt)
    }
}
