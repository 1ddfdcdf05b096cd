//! Boundary to the per-partition analysis engine.
//!
//! The engine numbers the partition's equations with all purely internal
//! equations first, condenses them out, and exposes a tangent and residual
//! over the remaining external equations. Equation `e` of a boundary node
//! lands at position `e - num_internal_eqn()` of those condensed quantities.

use std::fmt;

use ddfem_core::{Matrix, MovableObject, NodeTag, Vector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Partition;

/// Errors raised by an analysis engine.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Forming the tangent or residual failed.
    #[error("formation failed: {0}")]
    FormFailed(String),

    /// The condensed system is singular.
    #[error("singular system")]
    Singular,

    /// The engine does not accept this kind of component.
    #[error("{0} components are not supported")]
    UnsupportedComponent(ComponentKind),

    /// Input of the wrong size.
    #[error("size mismatch: expected {expected}, got {got}")]
    SizeMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// Engine-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Slot an [`AnalysisComponent`] plugs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Solution algorithm.
    Algorithm,
    /// Time integrator.
    Integrator,
    /// Linear system solver.
    LinearSolver,
    /// Convergence test.
    ConvergenceTest,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Algorithm => "algorithm",
            ComponentKind::Integrator => "integrator",
            ComponentKind::LinearSolver => "linear solver",
            ComponentKind::ConvergenceTest => "convergence test",
        };
        f.write_str(name)
    }
}

/// Algorithm, integrator, solver or test handed to an engine.
pub trait AnalysisComponent: MovableObject + fmt::Debug {
    /// Slot this component fills.
    fn kind(&self) -> ComponentKind;
}

/// Per-partition analysis engine.
pub trait AnalysisEngine: MovableObject + fmt::Debug {
    /// Renumber after the partition's structure changed.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if the partition cannot be numbered.
    fn domain_changed(&mut self, partition: &mut Partition) -> Result<(), AnalysisError>;

    /// Form and condense the tangent.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if formation or condensation fails.
    fn form_tangent(&mut self, partition: &mut Partition) -> Result<(), AnalysisError>;

    /// Form and condense the residual.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if formation or condensation fails.
    fn form_residual(&mut self, partition: &mut Partition) -> Result<(), AnalysisError>;

    /// Condensed tangent, `num_external_eqn() × num_external_eqn()`.
    fn tangent(&self) -> &Matrix;

    /// Condensed residual, `num_external_eqn()` long.
    fn residual(&self) -> &Vector;

    /// Number of external equations.
    fn num_external_eqn(&self) -> usize;

    /// Number of purely internal equations.
    fn num_internal_eqn(&self) -> usize;

    /// Equation number of each DOF of `node`; negative when constrained.
    fn equation_numbers(&self, node: NodeTag) -> Option<&[i32]>;

    /// Recover the internal response from the external one and push it to
    /// the nodes.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if `external` has the wrong size or the
    /// back-substitution fails.
    fn compute_internal_response(
        &mut self,
        partition: &mut Partition,
        external: &Vector,
    ) -> Result<(), AnalysisError>;

    /// Start a new time step of size `dt`.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if the integrator rejects the step.
    fn new_step(&mut self, _dt: f64) -> Result<(), AnalysisError> {
        Ok(())
    }

    /// Install an algorithm, integrator, solver or test.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::UnsupportedComponent` unless overridden.
    fn set_component(
        &mut self,
        component: Box<dyn AnalysisComponent>,
    ) -> Result<(), AnalysisError> {
        Err(AnalysisError::UnsupportedComponent(component.kind()))
    }

    /// Drop derived state (numbering, factorizations), keep components.
    fn clear(&mut self) {}
}
