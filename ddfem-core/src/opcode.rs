//! Opcode table for the actor/shadow protocol.
//!
//! Every remote operation has one fixed numeric code and one fixed reply
//! shape. The table is append-only: codes are never renumbered or reused,
//! new operations take the next free code.
//!
//! Both ends decode `header[0]` through [`Opcode::try_from`]. An integer that
//! does not name a variant produces [`UnknownOpcode`]; the Actor answers it on
//! the unsupported-opcode path (status [`STATUS_FAILURE`]) instead of
//! guessing.

use std::fmt;

/// Status value for a successful operation.
pub const STATUS_SUCCESS: i32 = 0;

/// Status value for any failed operation.
///
/// Protocol-local failures (no instance for a class tag, undecodable payload)
/// and semantic rejections (tag collision, missing target) share this value.
pub const STATUS_FAILURE: i32 = -1;

/// How the Actor answers an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyShape {
    /// Nothing is sent back.
    None,
    /// A single status integer.
    Status,
    /// Payload frames only, no status.
    Payload,
    /// A status integer, then payload frames only if the status is success.
    StatusThenPayload,
}

/// Operation codes understood by the Actor dispatch loop.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    /// Assign the partition tag. First message of every pair.
    SetTag = 1,
    /// Run a partition builder against the subdomain.
    BuildPartition = 2,
    /// Fetch `(num_external_nodes, num_dof)` and the external node tags.
    GetRemoteData = 3,
    /// Add an element.
    AddElement = 4,
    /// Add an internal node.
    AddNode = 5,
    /// Add an external (boundary) node.
    AddExternalNode = 6,
    /// Add a single-point constraint.
    AddSpConstraint = 7,
    /// Add a multi-point constraint.
    AddMpConstraint = 8,
    /// Add a load pattern.
    AddLoadPattern = 9,
    /// Add a nodal load to a load pattern.
    AddNodalLoad = 10,
    /// Add an elemental load to a load pattern.
    AddElementalLoad = 11,
    /// Add a single-point constraint to a load pattern.
    AddSpConstraintToPattern = 12,
    /// Remove an element.
    RemoveElement = 13,
    /// Remove a node (internal or external).
    RemoveNode = 14,
    /// Remove a single-point constraint.
    RemoveSpConstraint = 15,
    /// Remove a multi-point constraint.
    RemoveMpConstraint = 16,
    /// Remove a load pattern.
    RemoveLoadPattern = 17,
    /// Remove a nodal load from a load pattern.
    RemoveNodalLoad = 18,
    /// Remove an elemental load from a load pattern.
    RemoveElementalLoad = 19,
    /// Remove a single-point constraint from a load pattern.
    RemoveSpConstraintFromPattern = 20,
    /// Query node membership.
    HasNode = 21,
    /// Query element membership.
    HasElement = 22,
    /// Fetch a copy of an element.
    GetElement = 23,
    /// Fetch a copy of a node.
    GetNode = 24,
    /// Fetch a node's trial displacement.
    GetNodeDisp = 25,
    /// Apply every load pattern at a pseudo time.
    ApplyLoad = 26,
    /// Set the committed time.
    SetCommittedTime = 27,
    /// Read the current time.
    GetCurrentTime = 28,
    /// Freeze every load pattern at its current factor.
    SetLoadConstant = 29,
    /// Update element state from trial nodal response.
    Update = 30,
    /// Commit the trial state.
    Commit = 31,
    /// Revert to the last committed state.
    RevertToLastCommit = 32,
    /// Revert to the initial state.
    RevertToStart = 33,
    /// Set a node's mass matrix.
    SetMass = 34,
    /// Set Rayleigh damping factors.
    SetRayleighFactors = 35,
    /// Form the condensed tangent.
    ComputeTang = 36,
    /// Form the condensed residual.
    ComputeResidual = 37,
    /// Fetch the boundary-ordered tangent.
    GetTang = 38,
    /// Fetch the boundary-ordered resisting force.
    GetResistingForce = 39,
    /// Push a boundary response and recover the internal response.
    ComputeNodalResponse = 40,
    /// Print a partition summary on the worker.
    Print = 41,
    /// Add a recorder.
    AddRecorder = 42,
    /// Remove one recorder.
    RemoveRecorder = 43,
    /// Remove every recorder.
    RemoveRecorders = 44,
    /// Attach the per-partition analysis engine.
    SetAnalysis = 45,
    /// Hand a solution algorithm to the analysis engine.
    SetAlgorithm = 46,
    /// Hand an integrator to the analysis engine.
    SetIntegrator = 47,
    /// Hand an equation solver to the analysis engine.
    SetLinearSolver = 48,
    /// Hand a convergence test to the analysis engine.
    SetConvergenceTest = 49,
    /// Notify the partition that its structure changed.
    DomainChanged = 50,
    /// Clear the analysis engine's state.
    ClearAnalysis = 51,
    /// Drop the analysis engine.
    WipeAnalysis = 52,
    /// Start a new time step.
    NewStep = 53,
    /// Exchange one status value with the Actor.
    BarrierCheck = 54,
    /// Stop the Actor loop.
    Terminate = 55,
}

impl Opcode {
    /// Every opcode in code order.
    pub const ALL: [Opcode; 55] = [
        Opcode::SetTag,
        Opcode::BuildPartition,
        Opcode::GetRemoteData,
        Opcode::AddElement,
        Opcode::AddNode,
        Opcode::AddExternalNode,
        Opcode::AddSpConstraint,
        Opcode::AddMpConstraint,
        Opcode::AddLoadPattern,
        Opcode::AddNodalLoad,
        Opcode::AddElementalLoad,
        Opcode::AddSpConstraintToPattern,
        Opcode::RemoveElement,
        Opcode::RemoveNode,
        Opcode::RemoveSpConstraint,
        Opcode::RemoveMpConstraint,
        Opcode::RemoveLoadPattern,
        Opcode::RemoveNodalLoad,
        Opcode::RemoveElementalLoad,
        Opcode::RemoveSpConstraintFromPattern,
        Opcode::HasNode,
        Opcode::HasElement,
        Opcode::GetElement,
        Opcode::GetNode,
        Opcode::GetNodeDisp,
        Opcode::ApplyLoad,
        Opcode::SetCommittedTime,
        Opcode::GetCurrentTime,
        Opcode::SetLoadConstant,
        Opcode::Update,
        Opcode::Commit,
        Opcode::RevertToLastCommit,
        Opcode::RevertToStart,
        Opcode::SetMass,
        Opcode::SetRayleighFactors,
        Opcode::ComputeTang,
        Opcode::ComputeResidual,
        Opcode::GetTang,
        Opcode::GetResistingForce,
        Opcode::ComputeNodalResponse,
        Opcode::Print,
        Opcode::AddRecorder,
        Opcode::RemoveRecorder,
        Opcode::RemoveRecorders,
        Opcode::SetAnalysis,
        Opcode::SetAlgorithm,
        Opcode::SetIntegrator,
        Opcode::SetLinearSolver,
        Opcode::SetConvergenceTest,
        Opcode::DomainChanged,
        Opcode::ClearAnalysis,
        Opcode::WipeAnalysis,
        Opcode::NewStep,
        Opcode::BarrierCheck,
        Opcode::Terminate,
    ];

    /// Numeric code placed in `header[0]`.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Reply the Actor sends for this opcode.
    pub const fn reply_shape(self) -> ReplyShape {
        match self {
            Opcode::BuildPartition | Opcode::Print => ReplyShape::None,
            Opcode::GetRemoteData
            | Opcode::GetCurrentTime
            | Opcode::GetTang
            | Opcode::GetResistingForce => ReplyShape::Payload,
            Opcode::GetElement | Opcode::GetNode | Opcode::GetNodeDisp => {
                ReplyShape::StatusThenPayload
            }
            _ => ReplyShape::Status,
        }
    }

    /// Whether the opcode attaches a serialized object after the header.
    pub const fn carries_object(self) -> bool {
        matches!(
            self,
            Opcode::BuildPartition
                | Opcode::AddElement
                | Opcode::AddNode
                | Opcode::AddExternalNode
                | Opcode::AddSpConstraint
                | Opcode::AddMpConstraint
                | Opcode::AddLoadPattern
                | Opcode::AddNodalLoad
                | Opcode::AddElementalLoad
                | Opcode::AddSpConstraintToPattern
                | Opcode::AddRecorder
                | Opcode::SetAnalysis
                | Opcode::SetAlgorithm
                | Opcode::SetIntegrator
                | Opcode::SetLinearSolver
                | Opcode::SetConvergenceTest
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Error for an integer that names no opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown opcode: {0}")]
pub struct UnknownOpcode(pub i32);

impl TryFrom<i32> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        // Codes are dense and start at 1.
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|idx| Opcode::ALL.get(idx).copied())
            .ok_or(UnknownOpcode(code))
    }
}

impl From<Opcode> for i32 {
    fn from(op: Opcode) -> Self {
        op.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_dense_and_ordered() {
        for (idx, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.code() as usize, idx + 1, "{op} out of place");
        }
    }

    #[test]
    fn test_try_from_every_code() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.code()), Ok(op));
        }
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(Opcode::try_from(0), Err(UnknownOpcode(0)));
        assert_eq!(Opcode::try_from(-1), Err(UnknownOpcode(-1)));
        assert_eq!(Opcode::try_from(56), Err(UnknownOpcode(56)));
        assert_eq!(Opcode::try_from(i32::MAX), Err(UnknownOpcode(i32::MAX)));
    }

    #[test]
    fn test_fixed_codes() {
        // Published codes never move.
        assert_eq!(Opcode::SetTag.code(), 1);
        assert_eq!(Opcode::GetRemoteData.code(), 3);
        assert_eq!(Opcode::ComputeTang.code(), 36);
        assert_eq!(Opcode::Terminate.code(), 55);
    }

    #[test]
    fn test_reply_shapes() {
        assert_eq!(Opcode::BuildPartition.reply_shape(), ReplyShape::None);
        assert_eq!(Opcode::Print.reply_shape(), ReplyShape::None);
        assert_eq!(Opcode::AddElement.reply_shape(), ReplyShape::Status);
        assert_eq!(Opcode::GetTang.reply_shape(), ReplyShape::Payload);
        assert_eq!(
            Opcode::GetNodeDisp.reply_shape(),
            ReplyShape::StatusThenPayload
        );
        assert_eq!(Opcode::Terminate.reply_shape(), ReplyShape::Status);
    }

    #[test]
    fn test_object_carriers_are_acknowledged() {
        for op in Opcode::ALL.iter().filter(|op| op.carries_object()) {
            if *op != Opcode::BuildPartition {
                assert_eq!(op.reply_shape(), ReplyShape::Status, "{op}");
            }
        }
    }
}
