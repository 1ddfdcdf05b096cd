//! # ddfem-core
//!
//! Shared protocol contract between a coordinator-side `Shadow` and its
//! worker-side `Actor`.
//!
//! Both ends of a subdomain pair link this crate and nothing else decides
//! what goes over the wire:
//!
//! - **Opcode table**: [`Opcode`] with a fixed numeric code and a fixed
//!   [`ReplyShape`] per operation
//! - **Header and frames**: [`Header`] (fixed-length integer header) and
//!   [`Frame`], the unit a transport moves
//! - **Channel trait**: [`Channel`] plus the typed `send_x`/`recv_x` helpers
//!   of [`ChannelExt`]
//! - **Object serialization**: [`MovableObject`] over a pluggable
//!   [`MessageCodec`] (default [`JsonCodec`])
//! - **Core types**: tags and the dense [`Vector`]/[`Matrix`] aliases
//!
//! There is no version negotiation. A coordinator and a worker built from
//! different revisions of this crate must never be paired.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod channel;
mod codec;
mod frame;
mod object;
mod opcode;
mod types;

// Channel exports
pub use channel::{Channel, ChannelError, ChannelExt, ChannelResult};

// Codec exports
pub use codec::{CodecError, JsonCodec, MessageCodec};

// Frame exports
pub use frame::{Frame, FrameKind, Header, HEADER_LEN};

// Object exports
pub use object::MovableObject;

// Opcode exports
pub use opcode::{Opcode, ReplyShape, UnknownOpcode, STATUS_FAILURE, STATUS_SUCCESS};

// Core type exports
pub use types::{ClassTag, DbTag, ElementTag, Matrix, NodeTag, PartitionTag, Tag, Vector};
