//! Partition builders.
//!
//! A builder is shipped to an Actor and run there so a partition can be
//! populated without streaming every component through the Shadow.

use std::fmt;

use ddfem_core::MovableObject;

use super::ModelError;
use crate::Partition;

/// Populates one partition of a decomposed model.
pub trait PartitionBuilder: MovableObject + fmt::Debug {
    /// Add this partition's components to `partition`, one of
    /// `num_partitions`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the model description is inconsistent.
    fn build_partition(
        &mut self,
        partition: &mut Partition,
        num_partitions: i32,
    ) -> Result<(), ModelError>;
}
