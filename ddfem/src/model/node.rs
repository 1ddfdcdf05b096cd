//! Nodes and their response state.

use ddfem_core::{ClassTag, CodecError, DbTag, JsonCodec, Matrix, MessageCodec, MovableObject};
use ddfem_core::{NodeTag, Vector};
use serde::{Deserialize, Serialize};

use super::class_tags;

/// A node: geometry, DOF count and response state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    tag: NodeTag,
    coords: Vec<f64>,
    ndof: usize,
    committed_disp: Vector,
    trial_disp: Vector,
    unbalanced_load: Vector,
    mass: Option<Matrix>,
    #[serde(skip)]
    db_tag: DbTag,
}

impl Node {
    /// Create a node at rest.
    pub fn new(tag: NodeTag, ndof: usize, coords: Vec<f64>) -> Self {
        Self {
            tag,
            coords,
            ndof,
            committed_disp: Vector::zeros(ndof),
            trial_disp: Vector::zeros(ndof),
            unbalanced_load: Vector::zeros(ndof),
            mass: None,
            db_tag: 0,
        }
    }

    /// Geometry-only copy used for external (boundary) nodes.
    ///
    /// The copy has the same tag, coordinates and DOF count but none of the
    /// response state; the owning partition keeps that.
    pub fn ghost(&self) -> Self {
        Self::new(self.tag, self.ndof, self.coords.clone())
    }

    /// Node tag.
    pub fn tag(&self) -> NodeTag {
        self.tag
    }

    /// Number of degrees of freedom.
    pub fn ndof(&self) -> usize {
        self.ndof
    }

    /// Nodal coordinates.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Committed displacement.
    pub fn committed_disp(&self) -> &Vector {
        &self.committed_disp
    }

    /// Trial displacement.
    pub fn trial_disp(&self) -> &Vector {
        &self.trial_disp
    }

    /// Replace the trial displacement. Ignored if the length is wrong.
    pub fn set_trial_disp(&mut self, disp: &Vector) -> bool {
        if disp.len() != self.ndof {
            tracing::warn!(
                node = self.tag,
                len = disp.len(),
                ndof = self.ndof,
                "displacement size mismatch"
            );
            return false;
        }
        self.trial_disp.assign(disp);
        true
    }

    /// Add an increment to the trial displacement.
    pub fn incr_trial_disp(&mut self, incr: &Vector) -> bool {
        if incr.len() != self.ndof {
            return false;
        }
        self.trial_disp += incr;
        true
    }

    /// Unbalanced load accumulated by the load patterns.
    pub fn unbalanced_load(&self) -> &Vector {
        &self.unbalanced_load
    }

    /// Add `factor * load` to the unbalanced load.
    pub fn add_unbalanced_load(&mut self, load: &Vector, factor: f64) -> bool {
        if load.len() != self.ndof {
            tracing::warn!(
                node = self.tag,
                len = load.len(),
                ndof = self.ndof,
                "load size mismatch"
            );
            return false;
        }
        self.unbalanced_load.scaled_add(factor, load);
        true
    }

    /// Clear the unbalanced load.
    pub fn zero_unbalanced_load(&mut self) {
        self.unbalanced_load.fill(0.0);
    }

    /// Mass matrix, if one was assigned.
    pub fn mass(&self) -> Option<&Matrix> {
        self.mass.as_ref()
    }

    /// Assign a mass matrix. Must be `ndof × ndof`.
    pub fn set_mass(&mut self, mass: Matrix) -> bool {
        if mass.dim() != (self.ndof, self.ndof) {
            tracing::warn!(
                node = self.tag,
                dim = ?mass.dim(),
                ndof = self.ndof,
                "mass matrix size mismatch"
            );
            return false;
        }
        self.mass = Some(mass);
        true
    }

    /// Make the trial displacement the committed one.
    pub fn commit_state(&mut self) {
        self.committed_disp.assign(&self.trial_disp);
    }

    /// Discard the trial displacement.
    pub fn revert_to_last_commit(&mut self) {
        self.trial_disp.assign(&self.committed_disp);
    }

    /// Return to the unloaded, undeformed state.
    pub fn revert_to_start(&mut self) {
        self.committed_disp.fill(0.0);
        self.trial_disp.fill(0.0);
        self.unbalanced_load.fill(0.0);
    }
}

impl MovableObject for Node {
    fn class_tag(&self) -> ClassTag {
        class_tags::NODE
    }

    fn db_tag(&self) -> DbTag {
        self.db_tag
    }

    fn set_db_tag(&mut self, db_tag: DbTag) {
        self.db_tag = db_tag;
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let db_tag = self.db_tag;
        *self = JsonCodec.decode(bytes)?;
        self.db_tag = db_tag;
        Ok(())
    }
}
