//! Frame Codec
//!
//! Single-frame encode/decode: no continuation frames, 7/16/64-bit length
//! encoding, 4-byte client masking. Decode errors are fatal and map to a
//! close frame with code 1002.

/// Largest accepted payload. Session messages and snapshots are far below
/// this; anything bigger is a protocol violation.
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 20;

/// Close code sent on any decode error.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// Frame opcode. Unknown opcodes decode to [`Opcode::Other`] and are ignored
/// by the connection layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// UTF-8 text payload.
    Text,
    /// Binary payload.
    Binary,
    /// Connection close.
    Close,
    /// Ping, answered with a pong echoing the payload.
    Ping,
    /// Pong.
    Pong,
    /// Any other opcode.
    Other(u8),
}

impl Opcode {
    fn from_bits(bits: u8) -> Opcode {
        match bits {
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Other(other),
        }
    }

    fn bits(self) -> u8 {
        match self {
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Other(bits) => bits & 0x0F,
        }
    }
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame opcode.
    pub opcode: Opcode,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

/// Fatal decode failure.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// FIN bit clear; continuation is not supported.
    #[error("fragmented frames not supported")]
    Fragmented,
    /// Declared payload length exceeds the accepted maximum.
    #[error("frame too large: {0} bytes")]
    TooLarge(u64),
}

/// Try to decode one frame from the front of `buf`. Returns the frame and the
/// number of bytes consumed, or `None` when more bytes are needed.
pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let first = buf[0];
    let second = buf[1];
    if first & 0x80 == 0 {
        return Err(FrameError::Fragmented);
    }
    let opcode = Opcode::from_bits(first & 0x0F);
    let masked = second & 0x80 != 0;
    let mut len = u64::from(second & 0x7F);
    let mut offset = 2usize;

    if len == 126 {
        if buf.len() < offset + 2 {
            return Ok(None);
        }
        len = u64::from(u16::from_be_bytes([buf[offset], buf[offset + 1]]));
        offset += 2;
    } else if len == 127 {
        if buf.len() < offset + 8 {
            return Ok(None);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[offset..offset + 8]);
        len = u64::from_be_bytes(bytes);
        offset += 8;
    }
    if len > MAX_PAYLOAD_BYTES {
        return Err(FrameError::TooLarge(len));
    }
    let len = len as usize;

    let mask = if masked {
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < offset + len {
        return Ok(None);
    }
    let mut payload = buf[offset..offset + len].to_vec();
    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Some((Frame { opcode, payload }, offset + len)))
}

/// Encode an unmasked (server-to-client) frame.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let first = 0x80 | opcode.bits();
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 10);
    out.push(first);
    if len < 126 {
        out.push(len as u8);
    } else if len < 65536 {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Encode a close frame: big-endian code followed by a UTF-8 reason.
pub fn encode_close(code: u16, reason: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    encode(Opcode::Close, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_payload(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
        payload
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % 4])
            .collect()
    }

    fn client_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
        let key = [0x12, 0x34, 0x56, 0x78];
        let mut out = vec![0x80 | opcode];
        let len = payload.len();
        if len < 126 {
            out.push(0x80 | len as u8);
        } else if len < 65536 {
            out.push(0x80 | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(0x80 | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
        out.extend_from_slice(&key);
        out.extend_from_slice(&mask_payload(payload, key));
        out
    }

    #[test]
    fn test_decode_masked_text() {
        let buf = client_frame(0x1, b"hello");
        let (frame, consumed) = decode(&buf).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, b"hello");
    }

    #[test]
    fn test_decode_needs_more_bytes() {
        let buf = client_frame(0x2, &[0u8; 300]);
        assert!(decode(&buf[..1]).unwrap().is_none());
        assert!(decode(&buf[..3]).unwrap().is_none());
        assert!(decode(&buf[..buf.len() - 1]).unwrap().is_none());
        assert!(decode(&buf).unwrap().is_some());
    }

    #[test]
    fn test_decode_extended_16bit_length() {
        let payload = vec![0xAB; 600];
        let buf = client_frame(0x2, &payload);
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Binary);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn test_decode_extended_64bit_length() {
        let payload = vec![0xCD; 70_000];
        let buf = client_frame(0x2, &payload);
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 70_000);
    }

    #[test]
    fn test_decode_rejects_fragmented() {
        // FIN bit clear.
        let buf = [0x01u8, 0x00];
        assert!(matches!(decode(&buf), Err(FrameError::Fragmented)));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let mut buf = vec![0x82u8, 127];
        buf.extend_from_slice(&(MAX_PAYLOAD_BYTES + 1).to_be_bytes());
        assert!(matches!(decode(&buf), Err(FrameError::TooLarge(_))));
    }

    #[test]
    fn test_decode_unmasked_passthrough() {
        // Server frames are unmasked; decode must handle both.
        let buf = encode(Opcode::Text, b"ok");
        let (frame, consumed) = decode(&buf).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(frame.payload, b"ok");
    }

    #[test]
    fn test_decode_two_frames_back_to_back() {
        let mut buf = client_frame(0x1, b"a");
        buf.extend(client_frame(0x1, b"b"));
        let (first, consumed) = decode(&buf).unwrap().unwrap();
        assert_eq!(first.payload, b"a");
        let (second, _) = decode(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(second.payload, b"b");
    }

    #[test]
    fn test_encode_small_header() {
        let buf = encode(Opcode::Text, b"hi");
        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 2);
        assert_eq!(&buf[2..], b"hi");
    }

    #[test]
    fn test_encode_close_payload() {
        let buf = encode_close(1000, "bye");
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Close);
        assert_eq!(&frame.payload[..2], &1000u16.to_be_bytes());
        assert_eq!(&frame.payload[2..], b"bye");
    }

    #[test]
    fn test_unknown_opcode_decodes_as_other() {
        let buf = client_frame(0x3, b"");
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Other(0x3));
    }
}
