//! In-process channel pair.
//!
//! Each side owns the sending half towards its peer and the receiving half
//! from it. Used when Actors run as local tasks of the coordinator's runtime,
//! and throughout the test suites.

use std::cell::Cell;

use async_trait::async_trait;
use ddfem_core::{Channel, ChannelError, ChannelResult, Frame};
use tokio::sync::mpsc;

use crate::ChannelMetrics;

/// One end of an in-memory frame pipe.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
    frames_sent: Cell<u64>,
    frames_received: u64,
}

impl MemoryChannel {
    /// Create two connected ends.
    ///
    /// Frames sent on one end arrive, in order, on the other.
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::from_parts(a_tx, a_rx), Self::from_parts(b_tx, b_rx))
    }

    fn from_parts(tx: mpsc::UnboundedSender<Frame>, rx: mpsc::UnboundedReceiver<Frame>) -> Self {
        Self {
            tx,
            rx,
            frames_sent: Cell::new(0),
            frames_received: 0,
        }
    }

    /// Whether the peer end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Traffic counters for this end.
    pub fn metrics(&self) -> ChannelMetrics {
        ChannelMetrics {
            frames_sent: self.frames_sent.get(),
            frames_received: self.frames_received,
        }
    }
}

#[async_trait(?Send)]
impl Channel for MemoryChannel {
    fn send_frame(&self, frame: Frame) -> ChannelResult<()> {
        self.tx.send(frame).map_err(|_| ChannelError::Closed)?;
        self.frames_sent.set(self.frames_sent.get() + 1);
        Ok(())
    }

    async fn recv_frame(&mut self) -> ChannelResult<Frame> {
        let frame = self.rx.recv().await.ok_or(ChannelError::Closed)?;
        self.frames_received += 1;
        Ok(frame)
    }
}
