//! Serialization contract for polymorphic objects crossing the wire.
//!
//! The receiving side never knows the concrete type in advance. It reads the
//! class tag from the object frame, asks an object broker for a blank
//! instance of that class, then lets the instance restore itself from the
//! payload bytes with [`MovableObject::recv_self`].

use crate::{ClassTag, CodecError, DbTag};

/// An object that can be sent to a peer and rebuilt there.
///
/// Implementations pick their own encoding; serde types usually delegate to
/// [`JsonCodec`](crate::JsonCodec):
///
/// ```rust
/// use ddfem_core::{ClassTag, CodecError, JsonCodec, MessageCodec, MovableObject};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Spring { tag: i32, k: f64 }
///
/// impl MovableObject for Spring {
///     fn class_tag(&self) -> ClassTag { 10 }
///     fn send_self(&self) -> Result<Vec<u8>, CodecError> { JsonCodec.encode(self) }
///     fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
///         *self = JsonCodec.decode(bytes)?;
///         Ok(())
///     }
/// }
/// ```
pub trait MovableObject {
    /// Class tag the peer's broker uses to instantiate a blank copy.
    fn class_tag(&self) -> ClassTag;

    /// Database tag. Zero when the object was never persisted.
    fn db_tag(&self) -> DbTag {
        0
    }

    /// Record the database tag received in a header.
    fn set_db_tag(&mut self, _db_tag: DbTag) {}

    /// Serialize the object's state.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if the state cannot be serialized.
    fn send_self(&self) -> Result<Vec<u8>, CodecError>;

    /// Restore the object's state from bytes produced by `send_self`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if the bytes do not describe this class.
    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError>;
}

impl<T: MovableObject + ?Sized> MovableObject for Box<T> {
    fn class_tag(&self) -> ClassTag {
        (**self).class_tag()
    }

    fn db_tag(&self) -> DbTag {
        (**self).db_tag()
    }

    fn set_db_tag(&mut self, db_tag: DbTag) {
        (**self).set_db_tag(db_tag);
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        (**self).send_self()
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        (**self).recv_self(bytes)
    }
}
