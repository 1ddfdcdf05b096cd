//! # ddfem Transport Layer
//!
//! Concrete [`Channel`](ddfem_core::Channel) implementations for the
//! actor/shadow protocol.
//!
//! This crate provides:
//! - **MemoryChannel**: in-process, ordered frame pipe (tokio mpsc)
//! - **TcpChannel**: one socket per pair, with a background writer task
//! - **Wire format**: length-prefixed packets with CRC32C checksums

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Configuration for stream-backed channels.
pub mod config;

/// In-process channel pairs.
pub mod memory;

/// TCP channels and listener.
pub mod tcp;

/// Length-prefixed, checksummed packet format.
pub mod wire;

pub use config::TransportConfig;
pub use memory::MemoryChannel;
pub use tcp::{TcpChannel, TcpChannelListener};
pub use wire::{PacketHeader, WireError, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Frame counters for one channel end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMetrics {
    /// Frames successfully handed to the transport.
    pub frames_sent: u64,
    /// Frames delivered to the receiver.
    pub frames_received: u64,
}
