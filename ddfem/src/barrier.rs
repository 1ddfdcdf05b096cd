//! Coordinator/worker barrier.
//!
//! The coordinator reports its own result with `BarrierCheck` and the Actor
//! answers with the status of the last operation it executed. Splitting the
//! exchange into an out half and an in half lets a coordinator send to every
//! partition before it waits on any of them.

use ddfem_core::{Channel, Header, Opcode, STATUS_FAILURE, STATUS_SUCCESS};

use crate::error::DomainResult;
use crate::shadow::Shadow;

impl<C: Channel> Shadow<C> {
    /// Send `BarrierCheck` carrying the coordinator's `local` result.
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` if the Actor is gone.
    pub fn barrier_check_out(&self, local: i32) -> DomainResult<()> {
        self.send_header(Header::with_args(Opcode::BarrierCheck, local, 0, 0))
    }

    /// Receive the Actor's answer to a previous [`barrier_check_out`](Self::barrier_check_out).
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` if the Actor is gone or sent something else.
    pub async fn barrier_check_in(&mut self) -> DomainResult<i32> {
        self.recv_peer_status().await
    }

    /// Both halves; returns the Actor's last result.
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` on transport failure.
    pub async fn barrier_check(&mut self, my_result: i32) -> DomainResult<i32> {
        self.barrier_check_out(my_result)?;
        self.barrier_check_in().await
    }
}

/// Fold partition results into one: success only if every one succeeded.
pub fn combine_statuses<I: IntoIterator<Item = i32>>(statuses: I) -> i32 {
    if statuses.into_iter().all(|status| status == STATUS_SUCCESS) {
        STATUS_SUCCESS
    } else {
        STATUS_FAILURE
    }
}
