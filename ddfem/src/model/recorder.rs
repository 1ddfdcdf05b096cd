//! Recorders invoked on every commit.

use std::fmt;

use ddfem_core::{MovableObject, Tag};

use super::ModelError;
use crate::Partition;

/// Observer of committed partition state.
pub trait Recorder: MovableObject + fmt::Debug {
    /// Recorder tag.
    fn tag(&self) -> Tag;

    /// Record the state just committed as `commit_tag` at `time`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the recorder cannot read what it records.
    fn record(
        &mut self,
        partition: &Partition,
        commit_tag: i32,
        time: f64,
    ) -> Result<(), ModelError>;

    /// Restart from the initial state.
    fn restart(&mut self) {}
}
