//! Single- and multi-freedom constraints.

use ddfem_core::{ClassTag, CodecError, JsonCodec, Matrix, MessageCodec, MovableObject};
use ddfem_core::{NodeTag, Tag};
use serde::{Deserialize, Serialize};

use super::class_tags;

/// Prescribed value on one DOF of one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpConstraint {
    tag: Tag,
    node_tag: NodeTag,
    dof: usize,
    value: f64,
    load_factor: f64,
}

impl SpConstraint {
    /// Homogeneous or prescribed constraint on `node_tag`'s `dof`.
    pub fn new(tag: Tag, node_tag: NodeTag, dof: usize, value: f64) -> Self {
        Self {
            tag,
            node_tag,
            dof,
            value,
            load_factor: 1.0,
        }
    }

    /// Constraint tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Constrained node.
    pub fn node_tag(&self) -> NodeTag {
        self.node_tag
    }

    /// Constrained DOF (zero based).
    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Reference value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value scaled by the owning pattern's current factor.
    pub fn current_value(&self) -> f64 {
        self.value * self.load_factor
    }

    /// Whether the prescribed value is zero.
    pub fn is_homogeneous(&self) -> bool {
        self.value == 0.0
    }

    /// Set the pattern factor applied to the reference value.
    pub fn apply_factor(&mut self, factor: f64) {
        self.load_factor = factor;
    }
}

impl MovableObject for SpConstraint {
    fn class_tag(&self) -> ClassTag {
        class_tags::SP_CONSTRAINT
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

/// Linear relation `u_constrained = C · u_retained` between two nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MpConstraint {
    tag: Tag,
    retained_node: NodeTag,
    constrained_node: NodeTag,
    constraint: Matrix,
    retained_dofs: Vec<usize>,
    constrained_dofs: Vec<usize>,
}

impl MpConstraint {
    /// Create a multi-point constraint.
    ///
    /// `constraint` must be `constrained_dofs.len() × retained_dofs.len()`;
    /// [`is_consistent`](Self::is_consistent) reports whether it is.
    pub fn new(
        tag: Tag,
        retained_node: NodeTag,
        constrained_node: NodeTag,
        constraint: Matrix,
        retained_dofs: Vec<usize>,
        constrained_dofs: Vec<usize>,
    ) -> Self {
        Self {
            tag,
            retained_node,
            constrained_node,
            constraint,
            retained_dofs,
            constrained_dofs,
        }
    }

    /// Equal-DOF constraint: identity over the listed DOFs.
    pub fn equal_dof(
        tag: Tag,
        retained_node: NodeTag,
        constrained_node: NodeTag,
        dofs: Vec<usize>,
    ) -> Self {
        let n = dofs.len();
        Self::new(tag, retained_node, constrained_node, Matrix::eye(n), dofs.clone(), dofs)
    }

    /// Constraint tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Retained node.
    pub fn retained_node(&self) -> NodeTag {
        self.retained_node
    }

    /// Constrained node.
    pub fn constrained_node(&self) -> NodeTag {
        self.constrained_node
    }

    /// Constraint matrix.
    pub fn constraint(&self) -> &Matrix {
        &self.constraint
    }

    /// Retained DOFs.
    pub fn retained_dofs(&self) -> &[usize] {
        &self.retained_dofs
    }

    /// Constrained DOFs.
    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained_dofs
    }

    /// Whether the matrix shape matches the DOF lists.
    pub fn is_consistent(&self) -> bool {
        self.constraint.dim() == (self.constrained_dofs.len(), self.retained_dofs.len())
    }
}

impl MovableObject for MpConstraint {
    fn class_tag(&self) -> ClassTag {
        class_tags::MP_CONSTRAINT
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sp_factor() {
        let mut sp = SpConstraint::new(1, 4, 0, 0.02);
        assert!(!sp.is_homogeneous());
        sp.apply_factor(0.5);
        assert_eq!(sp.current_value(), 0.01);
        assert_eq!(sp.value(), 0.02);
    }

    #[test]
    fn test_equal_dof_is_consistent() {
        let mp = MpConstraint::equal_dof(3, 1, 2, vec![0, 1]);
        assert!(mp.is_consistent());
        assert_eq!(mp.constraint(), &Matrix::eye(2));

        let bad = MpConstraint::new(4, 1, 2, Matrix::eye(3), vec![0], vec![0]);
        assert!(!bad.is_consistent());
    }
}
