//! Frames: the unit of exchange between a Shadow and its Actor.
//!
//! A request is one [`Frame::Header`] followed by the payload frames the
//! opcode table prescribes, in that fixed order. Replies use the same frame
//! kinds. Transports move whole frames and never look inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ClassTag, DbTag, Matrix, Opcode, UnknownOpcode, Vector};

/// Number of integers in a request header.
pub const HEADER_LEN: usize = 4;

/// Fixed-length integer request header.
///
/// `fields[0]` is always the opcode; the remaining slots are opcode-specific
/// (class tag, db tag, target tag, pattern tag). Unused slots are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Header {
    /// Raw header fields.
    pub fields: [i32; HEADER_LEN],
}

impl Header {
    /// Header carrying only an opcode.
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            fields: [opcode.code(), 0, 0, 0],
        }
    }

    /// Header with opcode and up to three argument fields.
    pub const fn with_args(opcode: Opcode, a: i32, b: i32, c: i32) -> Self {
        Self {
            fields: [opcode.code(), a, b, c],
        }
    }

    /// Header for an object-carrying opcode: `[opcode, class_tag, db_tag, extra]`.
    pub const fn object(opcode: Opcode, class_tag: ClassTag, db_tag: DbTag, extra: i32) -> Self {
        Self::with_args(opcode, class_tag, db_tag, extra)
    }

    /// Raw opcode field.
    pub const fn raw_opcode(&self) -> i32 {
        self.fields[0]
    }

    /// Decoded opcode.
    pub fn opcode(&self) -> Result<Opcode, UnknownOpcode> {
        Opcode::try_from(self.fields[0])
    }

    /// First argument field.
    pub const fn arg1(&self) -> i32 {
        self.fields[1]
    }

    /// Second argument field.
    pub const fn arg2(&self) -> i32 {
        self.fields[2]
    }

    /// Third argument field.
    pub const fn arg3(&self) -> i32 {
        self.fields[3]
    }
}

/// One message on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Request header.
    Header(Header),
    /// Integer array (statuses, counts, tag lists).
    Ints(Vec<i32>),
    /// Single float (times, step sizes).
    Float(f64),
    /// Dense vector.
    Vector(Vector),
    /// Dense matrix.
    Matrix(Matrix),
    /// Serialized polymorphic object keyed by its class tag.
    Object {
        /// Class tag used by the receiver's object broker.
        class_tag: ClassTag,
        /// Database tag of the object.
        db_tag: DbTag,
        /// Codec-encoded object state.
        bytes: Vec<u8>,
    },
}

/// Discriminant of a [`Frame`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// [`Frame::Header`].
    Header,
    /// [`Frame::Ints`].
    Ints,
    /// [`Frame::Float`].
    Float,
    /// [`Frame::Vector`].
    Vector,
    /// [`Frame::Matrix`].
    Matrix,
    /// [`Frame::Object`].
    Object,
}

impl Frame {
    /// Kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Header(_) => FrameKind::Header,
            Frame::Ints(_) => FrameKind::Ints,
            Frame::Float(_) => FrameKind::Float,
            Frame::Vector(_) => FrameKind::Vector,
            Frame::Matrix(_) => FrameKind::Matrix,
            Frame::Object { .. } => FrameKind::Object,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Header => "header",
            FrameKind::Ints => "ints",
            FrameKind::Float => "float",
            FrameKind::Vector => "vector",
            FrameKind::Matrix => "matrix",
            FrameKind::Object => "object",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = Header::object(Opcode::AddNodalLoad, 12, 3, 7);
        assert_eq!(header.fields, [Opcode::AddNodalLoad.code(), 12, 3, 7]);
        assert_eq!(header.opcode(), Ok(Opcode::AddNodalLoad));
        assert_eq!(header.arg1(), 12);
        assert_eq!(header.arg2(), 3);
        assert_eq!(header.arg3(), 7);
    }

    #[test]
    fn test_header_unknown_opcode() {
        let header = Header {
            fields: [999, 0, 0, 0],
        };
        assert_eq!(header.raw_opcode(), 999);
        assert_eq!(header.opcode(), Err(UnknownOpcode(999)));
    }

    #[test]
    fn test_frame_kind() {
        assert_eq!(Frame::Header(Header::new(Opcode::Commit)).kind(), FrameKind::Header);
        assert_eq!(Frame::Ints(vec![0]).kind(), FrameKind::Ints);
        assert_eq!(Frame::Float(1.5).kind(), FrameKind::Float);
        assert_eq!(Frame::Vector(Vector::zeros(2)).kind(), FrameKind::Vector);
        assert_eq!(Frame::Matrix(Matrix::zeros((2, 2))).kind(), FrameKind::Matrix);
        assert_eq!(FrameKind::Object.to_string(), "object");
    }
}
