//! Components a partition is made of.
//!
//! Every component is a [`MovableObject`](ddfem_core::MovableObject) so a
//! Shadow can ship it to its Actor. Built-in components use the class tags
//! in [`class_tags`]; user formulations (elements, recorders, builders)
//! pick their own tags and register constructors with a
//! [`Registry`](crate::Registry).

mod builder;
mod constraint;
mod element;
mod load;
mod node;
mod recorder;

pub use builder::PartitionBuilder;
pub use constraint::{MpConstraint, SpConstraint};
pub use element::Element;
pub use load::{ElementalLoad, ElementalLoadKind, LoadPattern, NodalLoad, TimeSeries};
pub use node::Node;
pub use recorder::Recorder;

use std::collections::BTreeMap;

use ddfem_core::{ElementTag, NodeTag, Tag, Vector};
use serde::{Deserialize, Serialize};

/// Class tags of the built-in components.
///
/// User classes should stay clear of this range.
pub mod class_tags {
    use ddfem_core::ClassTag;

    /// [`Node`](super::Node).
    pub const NODE: ClassTag = 1;
    /// [`SpConstraint`](super::SpConstraint).
    pub const SP_CONSTRAINT: ClassTag = 2;
    /// [`MpConstraint`](super::MpConstraint).
    pub const MP_CONSTRAINT: ClassTag = 3;
    /// [`NodalLoad`](super::NodalLoad).
    pub const NODAL_LOAD: ClassTag = 4;
    /// [`ElementalLoad`](super::ElementalLoad).
    pub const ELEMENTAL_LOAD: ClassTag = 5;
    /// [`LoadPattern`](super::LoadPattern).
    pub const LOAD_PATTERN: ClassTag = 6;
}

/// Nodes of a partition keyed by tag.
pub type NodeMap = BTreeMap<NodeTag, Node>;

/// Rayleigh damping factors `C = αM·M + βK·K + βK0·K0 + βKc·Kc`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RayleighFactors {
    /// Mass-proportional factor.
    pub alpha_m: f64,
    /// Current-stiffness factor.
    pub beta_k: f64,
    /// Initial-stiffness factor.
    pub beta_k0: f64,
    /// Committed-stiffness factor.
    pub beta_kc: f64,
}

impl RayleighFactors {
    /// Factors in wire order `[αM, βK, βK0, βKc]`.
    pub fn to_vector(&self) -> Vector {
        Vector::from(vec![self.alpha_m, self.beta_k, self.beta_k0, self.beta_kc])
    }

    /// Parse factors from wire order. `None` unless exactly four entries.
    pub fn from_vector(v: &Vector) -> Option<Self> {
        match v.as_slice()? {
            [alpha_m, beta_k, beta_k0, beta_kc] => Some(Self {
                alpha_m: *alpha_m,
                beta_k: *beta_k,
                beta_k0: *beta_k0,
                beta_kc: *beta_kc,
            }),
            _ => None,
        }
    }
}

/// Errors raised by components and the partition they live in.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Tag already used in the collection (or shared namespace).
    #[error("tag {0} already in use")]
    DuplicateTag(Tag),

    /// Referenced node does not exist.
    #[error("unknown node {0}")]
    UnknownNode(NodeTag),

    /// Referenced element does not exist.
    #[error("unknown element {0}")]
    UnknownElement(ElementTag),

    /// Referenced load pattern does not exist.
    #[error("unknown load pattern {0}")]
    UnknownPattern(Tag),

    /// Element cannot carry a load of this kind.
    #[error("element {element} does not support {kind} loads")]
    UnsupportedLoad {
        /// Element tag.
        element: ElementTag,
        /// Rejected load kind.
        kind: ElementalLoadKind,
    },

    /// Vector or matrix of the wrong size.
    #[error("size mismatch: expected {expected}, got {got}")]
    SizeMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// Component-specific failure.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rayleigh_wire_order() {
        let factors = RayleighFactors {
            alpha_m: 0.1,
            beta_k: 0.2,
            beta_k0: 0.0,
            beta_kc: 0.4,
        };
        let v = factors.to_vector();
        assert_eq!(v, Vector::from(vec![0.1, 0.2, 0.0, 0.4]));
        assert_eq!(RayleighFactors::from_vector(&v), Some(factors));
        assert_eq!(RayleighFactors::from_vector(&Vector::zeros(3)), None);
    }
}
