//! Element contract.
//!
//! Formulations (stiffness, mass, material behaviour) live outside this
//! crate. A partition only needs to store elements, move them across the
//! wire, and drive their state machine.

use std::fmt;

use ddfem_core::{ElementTag, MovableObject, NodeTag};

use super::{ElementalLoad, ModelError, NodeMap, RayleighFactors};

/// An element as seen by a partition.
pub trait Element: MovableObject + fmt::Debug {
    /// Element tag.
    fn tag(&self) -> ElementTag;

    /// Tags of the nodes this element connects.
    fn node_tags(&self) -> Vec<NodeTag>;

    /// Copy of this element behind a fresh box.
    fn clone_box(&self) -> Box<dyn Element>;

    /// Update trial state from the trial response of the connected nodes.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the element cannot reach a consistent state.
    fn update(&mut self, _nodes: &NodeMap) -> Result<(), ModelError> {
        Ok(())
    }

    /// Make the trial state the committed state.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the element rejects the commit.
    fn commit_state(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Discard the trial state.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the element cannot revert.
    fn revert_to_last_commit(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Return to the initial state.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the element cannot revert.
    fn revert_to_start(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Apply `factor` times an elemental load.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the element does not support the load kind.
    fn add_load(&mut self, load: &ElementalLoad, _factor: f64) -> Result<(), ModelError> {
        Err(ModelError::UnsupportedLoad {
            element: self.tag(),
            kind: load.kind(),
        })
    }

    /// Remove every applied elemental load.
    fn zero_load(&mut self) {}

    /// Receive new Rayleigh damping factors.
    fn set_rayleigh_factors(&mut self, _factors: &RayleighFactors) {}
}

impl Clone for Box<dyn Element> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Display for dyn Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element {} (class {}) nodes {:?}",
            self.tag(),
            self.class_tag(),
            self.node_tags()
        )
    }
}
