//! Channel abstraction between one Shadow and one Actor.
//!
//! A channel is an ordered, reliable, point-to-point pipe of [`Frame`]s.
//! Sending is a synchronous enqueue: the frame is handed to the transport
//! and the caller continues. Receiving is the only suspension point. This
//! mirrors a synchronous API in front of a background writer, so a Shadow
//! can still send `Terminate` from `Drop`.
//!
//! Single-core design: no `Send` bounds, channels live inside a `LocalSet`.

use async_trait::async_trait;

use crate::{CodecError, Frame, FrameKind, Header, Matrix, MovableObject, Vector};
use crate::{ClassTag, DbTag};

/// Errors raised by a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The peer hung up; no more frames will arrive or be delivered.
    #[error("channel closed")]
    Closed,

    /// A frame of another kind arrived where the protocol expected this one.
    #[error("unexpected frame: expected {expected}, got {got}")]
    UnexpectedFrame {
        /// Kind the receiver asked for.
        expected: FrameKind,
        /// Kind that actually arrived.
        got: FrameKind,
    },

    /// An integer reply had the wrong number of fields.
    #[error("malformed reply: expected {expected} ints, got {got}")]
    MalformedReply {
        /// Number of integers expected.
        expected: usize,
        /// Number of integers received.
        got: usize,
    },

    /// Object or frame (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The byte stream violated the wire format.
    #[error("wire error: {0}")]
    Wire(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io(err.to_string())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Ordered frame pipe to one peer.
#[async_trait(?Send)]
pub trait Channel {
    /// Enqueue a frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Closed` if the peer is gone.
    fn send_frame(&self, frame: Frame) -> ChannelResult<()>;

    /// Wait for the next frame.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Closed` once the peer hung up and every
    /// buffered frame was consumed.
    async fn recv_frame(&mut self) -> ChannelResult<Frame>;
}

fn unexpected(expected: FrameKind, got: &Frame) -> ChannelError {
    ChannelError::UnexpectedFrame {
        expected,
        got: got.kind(),
    }
}

/// Typed send/receive helpers available on every [`Channel`].
#[async_trait(?Send)]
pub trait ChannelExt: Channel {
    /// Send a request header.
    fn send_header(&self, header: Header) -> ChannelResult<()> {
        self.send_frame(Frame::Header(header))
    }

    /// Send an integer array.
    fn send_ints(&self, ints: Vec<i32>) -> ChannelResult<()> {
        self.send_frame(Frame::Ints(ints))
    }

    /// Send a single status integer.
    fn send_status(&self, status: i32) -> ChannelResult<()> {
        self.send_ints(vec![status])
    }

    /// Send a single float.
    fn send_float(&self, value: f64) -> ChannelResult<()> {
        self.send_frame(Frame::Float(value))
    }

    /// Send a dense vector.
    fn send_vector(&self, vector: Vector) -> ChannelResult<()> {
        self.send_frame(Frame::Vector(vector))
    }

    /// Send a dense matrix.
    fn send_matrix(&self, matrix: Matrix) -> ChannelResult<()> {
        self.send_frame(Frame::Matrix(matrix))
    }

    /// Serialize and send an object keyed by its class tag.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Codec` if the object fails to serialize.
    fn send_object<T: MovableObject + ?Sized>(&self, object: &T) -> ChannelResult<()> {
        let bytes = object.send_self()?;
        self.send_frame(Frame::Object {
            class_tag: object.class_tag(),
            db_tag: object.db_tag(),
            bytes,
        })
    }

    /// Receive a request header.
    async fn recv_header(&mut self) -> ChannelResult<Header> {
        match self.recv_frame().await? {
            Frame::Header(header) => Ok(header),
            other => Err(unexpected(FrameKind::Header, &other)),
        }
    }

    /// Receive an integer array.
    async fn recv_ints(&mut self) -> ChannelResult<Vec<i32>> {
        match self.recv_frame().await? {
            Frame::Ints(ints) => Ok(ints),
            other => Err(unexpected(FrameKind::Ints, &other)),
        }
    }

    /// Receive a single status integer.
    async fn recv_status(&mut self) -> ChannelResult<i32> {
        let ints = self.recv_ints().await?;
        match ints.as_slice() {
            [status] => Ok(*status),
            _ => Err(ChannelError::MalformedReply {
                expected: 1,
                got: ints.len(),
            }),
        }
    }

    /// Receive a single float.
    async fn recv_float(&mut self) -> ChannelResult<f64> {
        match self.recv_frame().await? {
            Frame::Float(value) => Ok(value),
            other => Err(unexpected(FrameKind::Float, &other)),
        }
    }

    /// Receive a dense vector.
    async fn recv_vector(&mut self) -> ChannelResult<Vector> {
        match self.recv_frame().await? {
            Frame::Vector(vector) => Ok(vector),
            other => Err(unexpected(FrameKind::Vector, &other)),
        }
    }

    /// Receive a dense matrix.
    async fn recv_matrix(&mut self) -> ChannelResult<Matrix> {
        match self.recv_frame().await? {
            Frame::Matrix(matrix) => Ok(matrix),
            other => Err(unexpected(FrameKind::Matrix, &other)),
        }
    }

    /// Receive a raw object frame: `(class_tag, db_tag, bytes)`.
    async fn recv_object(&mut self) -> ChannelResult<(ClassTag, DbTag, Vec<u8>)> {
        match self.recv_frame().await? {
            Frame::Object {
                class_tag,
                db_tag,
                bytes,
            } => Ok((class_tag, db_tag, bytes)),
            other => Err(unexpected(FrameKind::Object, &other)),
        }
    }
}

impl<C: Channel> ChannelExt for C {}
