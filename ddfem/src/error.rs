//! Error types for partitions, Shadows and Actors.

use ddfem_core::{ChannelError, ClassTag, CodecError, Opcode, UnknownOpcode};
use thiserror::Error;

use crate::analysis::{AnalysisError, ComponentKind};
use crate::model::ModelError;

/// Errors surfaced by a [`SubdomainHandle`](crate::SubdomainHandle).
///
/// On the wire every failure is the single status `-1`. This type is the
/// richer view the Rust API offers on top of it.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Transport failure: the peer is gone or the stream is corrupt.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Object (de)serialization failed locally.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The operation needs an analysis engine and none is attached.
    #[error("no analysis engine attached")]
    NoAnalysis,

    /// The analysis engine failed.
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// A component or the partition failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The header carried an opcode this build does not know.
    #[error(transparent)]
    UnknownOpcode(#[from] UnknownOpcode),

    /// The remote side answered `-1`.
    #[error("{opcode} rejected by partition")]
    Rejected {
        /// Opcode of the rejected request.
        opcode: Opcode,
    },

    /// A reply payload did not have the shape the request implies.
    #[error("unexpected reply to {opcode}: {detail}")]
    UnexpectedShape {
        /// Opcode of the request.
        opcode: Opcode,
        /// What was wrong.
        detail: String,
    },

    /// The object broker has no constructor for a class tag.
    #[error("no constructor registered for class tag {class_tag}")]
    NoInstance {
        /// Unregistered class tag.
        class_tag: ClassTag,
    },

    /// An analysis component was handed to the wrong slot.
    #[error("expected a {expected} component, got {got}")]
    WrongComponent {
        /// Slot being set.
        expected: ComponentKind,
        /// Kind of the supplied component.
        got: ComponentKind,
    },

    /// The caller broke a sequencing rule.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Result type for subdomain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether this error means the Shadow/Actor pair is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DomainError::Channel(ChannelError::Closed | ChannelError::Io(_) | ChannelError::Wire(_))
        )
    }
}
