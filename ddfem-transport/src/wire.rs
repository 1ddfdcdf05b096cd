//! Wire format for frames over a byte stream.
//!
//! Packet format: `[length:4][checksum:4][payload:N]`
//!
//! - **length**: Total packet size including header (little-endian u32)
//! - **checksum**: CRC32C of the payload
//! - **payload**: One codec-encoded [`Frame`](ddfem_core::Frame)
//!
//! There is no addressing field: a stream carries exactly one Shadow/Actor
//! pair.

/// Header size: 4 (length) + 4 (checksum) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size (64MB).
///
/// A dense tangent of a large boundary is `num_dof²` floats, so the limit is
/// far above a typical RPC packet.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// Not enough data to parse the packet.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum from the header.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// Payload exceeds the configured limit.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid packet length: {length}")]
    InvalidLength {
        /// The length value from the header.
        length: u32,
    },
}

impl From<WireError> for ddfem_core::ChannelError {
    fn from(err: WireError) -> Self {
        ddfem_core::ChannelError::Wire(err.to_string())
    }
}

/// Packet header for wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Total packet size including header.
    pub length: u32,
    /// CRC32C checksum of the payload.
    pub checksum: u32,
}

impl PacketHeader {
    /// Header bytes.
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse a header from the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` if `buf` is shorter than HEADER_SIZE.
    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        let (Some(length), Some(checksum)) = (read_u32(buf, 0), read_u32(buf, 4)) else {
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        };
        Ok(Self { length, checksum })
    }
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Frame a payload.
///
/// # Errors
///
/// Returns `PacketTooLarge` if the payload exceeds `max_payload`.
pub fn serialize_packet(payload: &[u8], max_payload: usize) -> Result<Vec<u8>, WireError> {
    if payload.len() > max_payload {
        return Err(WireError::PacketTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }
    let length = u32::try_from(HEADER_SIZE + payload.len()).map_err(|_| {
        WireError::PacketTooLarge {
            size: payload.len(),
            max: max_payload,
        }
    })?;

    let header = PacketHeader {
        length,
        checksum: crc32c::crc32c(payload),
    };

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
    data.extend_from_slice(&header.to_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// Try to extract one packet from a buffer that may hold partial data.
///
/// # Returns
///
/// - `Ok(Some((payload, consumed)))` if a complete packet was parsed
/// - `Ok(None)` if more data is needed
/// - `Err` if the data is malformed
///
/// # Examples
///
/// ```
/// use ddfem_transport::wire::{serialize_packet, try_deserialize_packet, MAX_PAYLOAD_SIZE};
///
/// let packet = serialize_packet(b"frame", MAX_PAYLOAD_SIZE).expect("serialize");
/// assert!(try_deserialize_packet(&packet[..3], MAX_PAYLOAD_SIZE).expect("partial").is_none());
///
/// let (payload, consumed) = try_deserialize_packet(&packet, MAX_PAYLOAD_SIZE)
///     .expect("complete")
///     .expect("one packet");
/// assert_eq!(payload, b"frame");
/// assert_eq!(consumed, packet.len());
/// ```
pub fn try_deserialize_packet(
    data: &[u8],
    max_payload: usize,
) -> Result<Option<(Vec<u8>, usize)>, WireError> {
    if data.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header = PacketHeader::parse(data)?;
    let expected_len = header.length as usize;
    if expected_len < HEADER_SIZE {
        return Err(WireError::InvalidLength {
            length: header.length,
        });
    }
    if expected_len - HEADER_SIZE > max_payload {
        return Err(WireError::PacketTooLarge {
            size: expected_len - HEADER_SIZE,
            max: max_payload,
        });
    }

    let Some(payload) = data.get(HEADER_SIZE..expected_len) else {
        return Ok(None);
    };

    let computed = crc32c::crc32c(payload);
    if computed != header.checksum {
        return Err(WireError::ChecksumMismatch {
            expected: header.checksum,
            actual: computed,
        });
    }

    Ok(Some((payload.to_vec(), expected_len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_validation() {
        let mut packet = serialize_packet(b"tangent", MAX_PAYLOAD_SIZE).expect("serialize");
        packet[HEADER_SIZE] ^= 0xFF;

        let result = try_deserialize_packet(&packet, MAX_PAYLOAD_SIZE);
        assert!(matches!(result, Err(WireError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_partial_header_and_payload() {
        let packet = serialize_packet(b"residual vector", MAX_PAYLOAD_SIZE).expect("serialize");

        assert!(matches!(
            try_deserialize_packet(&packet[..5], MAX_PAYLOAD_SIZE),
            Ok(None)
        ));
        assert!(matches!(
            try_deserialize_packet(&packet[..HEADER_SIZE + 2], MAX_PAYLOAD_SIZE),
            Ok(None)
        ));
    }

    #[test]
    fn test_back_to_back_packets() {
        let mut stream = serialize_packet(b"first", MAX_PAYLOAD_SIZE).expect("serialize");
        let second = serialize_packet(b"second", MAX_PAYLOAD_SIZE).expect("serialize");
        stream.extend_from_slice(&second);

        let (payload, consumed) = try_deserialize_packet(&stream, MAX_PAYLOAD_SIZE)
            .expect("parse")
            .expect("complete");
        assert_eq!(payload, b"first");

        let (payload, rest) = try_deserialize_packet(&stream[consumed..], MAX_PAYLOAD_SIZE)
            .expect("parse")
            .expect("complete");
        assert_eq!(payload, b"second");
        assert_eq!(consumed + rest, stream.len());
    }

    #[test]
    fn test_empty_payload() {
        let packet = serialize_packet(&[], MAX_PAYLOAD_SIZE).expect("serialize");
        assert_eq!(packet.len(), HEADER_SIZE);

        let (payload, _) = try_deserialize_packet(&packet, MAX_PAYLOAD_SIZE)
            .expect("parse")
            .expect("complete");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_packet_too_large() {
        let result = serialize_packet(&[0u8; 17], 16);
        assert!(matches!(
            result,
            Err(WireError::PacketTooLarge { size: 17, max: 16 })
        ));

        // A peer announcing an oversized packet is rejected before buffering it.
        let header = PacketHeader {
            length: (HEADER_SIZE + 1024) as u32,
            checksum: 0,
        };
        let result = try_deserialize_packet(&header.to_bytes(), 16);
        assert!(matches!(result, Err(WireError::PacketTooLarge { .. })));
    }

    #[test]
    fn test_invalid_length_too_small() {
        let header = PacketHeader {
            length: 3,
            checksum: 0,
        };
        let result = try_deserialize_packet(&header.to_bytes(), MAX_PAYLOAD_SIZE);
        assert!(matches!(result, Err(WireError::InvalidLength { length: 3 })));
    }

    #[test]
    fn test_header_bytes() {
        let header = PacketHeader {
            length: 100,
            checksum: 0xDEADBEEF,
        };
        let parsed = PacketHeader::parse(&header.to_bytes()).expect("parse");
        assert_eq!(header, parsed);
        assert!(matches!(
            PacketHeader::parse(&[0u8; 4]),
            Err(WireError::InsufficientData { needed: 8, have: 4 })
        ));
    }
}
