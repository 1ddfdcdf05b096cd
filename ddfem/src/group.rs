//! Coordinator-owned collection of Shadows.
//!
//! Assembly loops ask every partition for its tangent (or residual) one
//! index at a time. The first call of a round broadcasts the opcode to every
//! Actor so all partitions compute concurrently; the remaining calls of the
//! round only hand back the status already collected for their partition.
//! Each Actor therefore receives exactly one opcode per round.

use tracing::{debug, warn};

use ddfem_core::{Channel, Opcode, STATUS_SUCCESS};

use crate::barrier::combine_statuses;
use crate::error::{DomainError, DomainResult};
use crate::shadow::Shadow;

/// One open fan-out round.
#[derive(Debug, Default)]
struct Round {
    statuses: Vec<i32>,
    served: Vec<bool>,
}

impl Round {
    fn open(statuses: Vec<i32>) -> Self {
        let served = vec![false; statuses.len()];
        Self { statuses, served }
    }

    fn is_open(&self) -> bool {
        !self.served.is_empty()
    }

    fn served_count(&self) -> usize {
        self.served.iter().filter(|served| **served).count()
    }
}

/// Ordered set of Shadows plus the state of the current fan-out rounds.
pub struct ShadowGroup<C: Channel> {
    shadows: Vec<Shadow<C>>,
    tang: Round,
    residual: Round,
}

impl<C: Channel> Default for ShadowGroup<C> {
    fn default() -> Self {
        Self {
            shadows: Vec::new(),
            tang: Round::default(),
            residual: Round::default(),
        }
    }
}

impl<C: Channel> ShadowGroup<C> {
    /// Empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Shadows.
    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    /// Whether the group holds no Shadow.
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }

    /// Shadow at `index`.
    pub fn get(&self, index: usize) -> Option<&Shadow<C>> {
        self.shadows.get(index)
    }

    /// Mutable Shadow at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Shadow<C>> {
        self.shadows.get_mut(index)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Shadow<C>> {
        self.shadows.iter()
    }

    /// Calls served so far across the open tangent and residual rounds,
    /// in `[0, 2N - 1]`.
    pub fn round_position(&self) -> usize {
        self.tang.served_count() + self.residual.served_count()
    }

    fn check_idle(&self, what: &str) -> DomainResult<()> {
        if self.tang.is_open() || self.residual.is_open() {
            return Err(DomainError::Protocol(format!("cannot {what} during a fan-out round")));
        }
        Ok(())
    }

    /// Append a Shadow and return its index.
    ///
    /// # Errors
    ///
    /// `DomainError::Protocol` while a round is open.
    pub fn push(&mut self, shadow: Shadow<C>) -> DomainResult<usize> {
        self.check_idle("add a shadow")?;
        self.shadows.push(shadow);
        Ok(self.shadows.len() - 1)
    }

    /// Take the Shadow at `index` out of the group.
    ///
    /// # Errors
    ///
    /// `DomainError::Protocol` while a round is open or if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> DomainResult<Shadow<C>> {
        self.check_idle("remove a shadow")?;
        if index >= self.shadows.len() {
            return Err(DomainError::Protocol(format!("no shadow at index {index}")));
        }
        Ok(self.shadows.remove(index))
    }

    /// Tangent computation for the partition at `index`, fanned out per round.
    ///
    /// # Errors
    ///
    /// `DomainError::Rejected` if that partition failed, `DomainError::Protocol`
    /// on a repeated index within a round, `DomainError::Channel` on
    /// transport failure (the round is abandoned).
    pub async fn compute_tang(&mut self, index: usize) -> DomainResult<()> {
        self.fan_out(Opcode::ComputeTang, index).await
    }

    /// Residual computation for the partition at `index`, fanned out per round.
    ///
    /// # Errors
    ///
    /// Same as [`compute_tang`](Self::compute_tang).
    pub async fn compute_residual(&mut self, index: usize) -> DomainResult<()> {
        self.fan_out(Opcode::ComputeResidual, index).await
    }

    /// A whole tangent round. Every partition is served before the first
    /// rejection is returned.
    ///
    /// # Errors
    ///
    /// The first partition error, or a transport error immediately.
    pub async fn compute_tang_all(&mut self) -> DomainResult<()> {
        self.round_all(Opcode::ComputeTang).await
    }

    /// A whole residual round.
    ///
    /// # Errors
    ///
    /// Same as [`compute_tang_all`](Self::compute_tang_all).
    pub async fn compute_residual_all(&mut self) -> DomainResult<()> {
        self.round_all(Opcode::ComputeResidual).await
    }

    /// Barrier across every partition; returns the combined result of the
    /// coordinator and all Actors.
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` if any Actor is unreachable.
    pub async fn barrier_check(&mut self, my_result: i32) -> DomainResult<i32> {
        for shadow in &self.shadows {
            shadow.barrier_check_out(my_result)?;
        }
        let mut statuses = vec![my_result];
        for shadow in &mut self.shadows {
            statuses.push(shadow.barrier_check_in().await?);
        }
        Ok(combine_statuses(statuses))
    }

    /// Terminate every Shadow, waiting for each acknowledgement.
    ///
    /// # Errors
    ///
    /// The first transport error; the remaining Shadows are still dropped,
    /// which sends them `Terminate`.
    pub async fn terminate(self) -> DomainResult<()> {
        for shadow in self.shadows {
            shadow.terminate().await?;
        }
        Ok(())
    }

    fn round_mut(&mut self, opcode: Opcode) -> &mut Round {
        match opcode {
            Opcode::ComputeResidual => &mut self.residual,
            _ => &mut self.tang,
        }
    }

    async fn round_all(&mut self, opcode: Opcode) -> DomainResult<()> {
        let mut first_error = None;
        for index in 0..self.shadows.len() {
            match self.fan_out(opcode, index).await {
                Ok(()) => {}
                Err(err) if err.is_transport() => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn fan_out(&mut self, opcode: Opcode, index: usize) -> DomainResult<()> {
        if index >= self.shadows.len() {
            return Err(DomainError::Protocol(format!("no shadow at index {index}")));
        }

        if !self.round_mut(opcode).is_open() {
            match self.broadcast(opcode, index).await {
                Ok(statuses) => *self.round_mut(opcode) = Round::open(statuses),
                Err(err) => {
                    warn!(opcode = ?opcode, error = %err, "fan-out round abandoned");
                    *self.round_mut(opcode) = Round::default();
                    return Err(err);
                }
            }
        }

        let round = self.round_mut(opcode);
        if round.served[index] {
            return Err(DomainError::Protocol(format!(
                "shadow {index} called twice in one {opcode:?} round"
            )));
        }
        round.served[index] = true;
        let status = round.statuses[index];
        if round.served.iter().all(|served| *served) {
            *round = Round::default();
        }

        if status == STATUS_SUCCESS {
            Ok(())
        } else {
            Err(DomainError::Rejected { opcode })
        }
    }

    /// Send `opcode` to every other Shadow, then the leader's, then collect.
    async fn broadcast(&mut self, opcode: Opcode, leader: usize) -> DomainResult<Vec<i32>> {
        for (index, shadow) in self.shadows.iter().enumerate() {
            if index != leader {
                shadow.send_opcode(opcode)?;
            }
        }
        self.shadows[leader].send_opcode(opcode)?;

        let mut statuses = Vec::with_capacity(self.shadows.len());
        for shadow in &mut self.shadows {
            statuses.push(shadow.recv_peer_status().await?);
        }
        debug!(opcode = ?opcode, leader, partitions = statuses.len(), "fan-out round opened");
        Ok(statuses)
    }
}

impl<C: Channel> std::fmt::Debug for ShadowGroup<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowGroup")
            .field("shadows", &self.shadows)
            .field("round_position", &self.round_position())
            .finish()
    }
}
