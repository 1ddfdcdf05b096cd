//! Configuration structures for channel behavior.

use crate::wire::MAX_PAYLOAD_SIZE;

/// Configuration for stream-backed channels.
///
/// The protocol itself has no timeouts, retries or liveness probes, so
/// nothing here concerns recovery: a hung peer blocks its partner forever.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Largest frame payload accepted or produced, in bytes.
    pub max_payload_size: usize,

    /// Disable Nagle's algorithm on TCP streams.
    ///
    /// Every Shadow call is a blocking round trip of small headers, so
    /// coalescing only adds latency.
    pub nodelay: bool,

    /// Size of each read from the socket into the reassembly buffer.
    pub read_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            nodelay: true,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl TransportConfig {
    /// Create a configuration with explicit limits.
    pub fn new(max_payload_size: usize, nodelay: bool, read_buffer_size: usize) -> Self {
        Self {
            max_payload_size,
            nodelay,
            read_buffer_size,
        }
    }

    /// Configuration for actors on the same host (loopback).
    pub fn local_network() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            nodelay: true,
            read_buffer_size: 256 * 1024,
        }
    }

    /// Configuration for small models where large frames indicate a bug.
    pub fn small_models() -> Self {
        Self {
            max_payload_size: 1024 * 1024,
            nodelay: true,
            read_buffer_size: 16 * 1024,
        }
    }

    /// Override the payload limit.
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }
}
