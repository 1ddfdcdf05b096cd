//! Pluggable serialization for object payloads and wire frames.
//!
//! [`MessageCodec`] turns serde values into bytes and back. Object payloads
//! ([`MovableObject`](crate::MovableObject)) and the TCP transport's frame
//! encoding both go through it, so swapping the codec changes every
//! serialized byte at once. [`JsonCodec`] is the default: human readable and
//! slow, fine for debugging a partition over a socket.
//!
//! ```rust
//! use ddfem_core::{Frame, JsonCodec, MessageCodec};
//!
//! let codec = JsonCodec;
//! let bytes = codec.encode(&Frame::Ints(vec![0, 3])).unwrap();
//! let frame: Frame = codec.decode(&bytes).unwrap();
//! assert_eq!(frame, Frame::Ints(vec![0, 3]));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value to bytes.
    #[error("encode error: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a value.
    #[error("decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable serialization format.
///
/// `Clone + 'static` so a codec can be stored inside channels and Actors.
pub trait MessageCodec: Clone + 'static {
    /// Encode a serializable value to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if deserialization fails.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, Header, Matrix, Opcode, Vector};

    #[test]
    fn test_header_frame_roundtrip() {
        let codec = JsonCodec;
        let frame = Frame::Header(Header::object(Opcode::AddElement, 42, 0, 0));

        let bytes = codec.encode(&frame).expect("encode should succeed");
        let decoded: Frame = codec.decode(&bytes).expect("decode should succeed");

        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_dense_frames_keep_shape() {
        let codec = JsonCodec;
        let matrix = Matrix::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .expect("shape matches data");

        let bytes = codec.encode(&Frame::Matrix(matrix.clone())).expect("encode");
        let Frame::Matrix(decoded) = codec.decode::<Frame>(&bytes).expect("decode") else {
            panic!("expected a matrix frame");
        };
        assert_eq!(decoded.dim(), (2, 3));
        assert_eq!(decoded, matrix);

        let vector = Vector::from(vec![0.5, -0.5]);
        let bytes = codec.encode(&Frame::Vector(vector.clone())).expect("encode");
        assert_eq!(
            codec.decode::<Frame>(&bytes).expect("decode"),
            Frame::Vector(vector)
        );
    }

    #[test]
    fn test_decode_error() {
        let codec = JsonCodec;
        let result: Result<Frame, CodecError> = codec.decode(b"not a frame {");

        let err = result.expect_err("garbage must not decode");
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn test_type_mismatch() {
        let codec = JsonCodec;
        let bytes = codec.encode(&Frame::Float(1.0)).expect("encode");

        let result: Result<Vec<i32>, CodecError> = codec.decode(&bytes);
        assert!(result.is_err());
    }
}
