//! TCP channel: one socket per Shadow/Actor pair.
//!
//! Synchronous send API with a background writer: `send_frame` encodes and
//! frames the packet, then hands it to a writer task over an unbounded
//! queue. `recv_frame` reassembles packets from the read half.
//!
//! Both the writer task and the channel are `!Send`; create them inside a
//! `tokio::task::LocalSet`.

use async_trait::async_trait;
use ddfem_core::{Channel, ChannelError, ChannelResult, Frame, JsonCodec, MessageCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::wire::{serialize_packet, try_deserialize_packet};
use crate::{ChannelMetrics, TransportConfig};

/// Frame channel over a TCP stream.
pub struct TcpChannel<C: MessageCodec = JsonCodec> {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: OwnedReadHalf,
    buffer: Vec<u8>,
    codec: C,
    config: TransportConfig,
    peer: String,
    frames_sent: std::cell::Cell<u64>,
    frames_received: u64,
    #[allow(dead_code)]
    writer_handle: JoinHandle<()>,
}

impl TcpChannel<JsonCodec> {
    /// Connect to a listening peer with the default codec.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Io` if the connection cannot be established.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        config: TransportConfig,
    ) -> ChannelResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream, config, JsonCodec)
    }
}

impl<C: MessageCodec> TcpChannel<C> {
    /// Wrap an already-connected stream.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Io` if socket options cannot be applied.
    pub fn from_stream(
        stream: TcpStream,
        config: TransportConfig,
        codec: C,
    ) -> ChannelResult<Self> {
        stream.set_nodelay(config.nodelay)?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();
        let (outbound, queue) = mpsc::unbounded_channel();

        let writer_handle = tokio::task::spawn_local(writer_task(writer, queue, peer.clone()));
        tracing::debug!(peer = %peer, "tcp channel established");

        Ok(Self {
            outbound,
            reader,
            buffer: Vec::with_capacity(config.read_buffer_size),
            codec,
            config,
            peer,
            frames_sent: std::cell::Cell::new(0),
            frames_received: 0,
            writer_handle,
        })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    /// Traffic counters for this end.
    pub fn metrics(&self) -> ChannelMetrics {
        ChannelMetrics {
            frames_sent: self.frames_sent.get(),
            frames_received: self.frames_received,
        }
    }

    fn take_packet(&mut self) -> ChannelResult<Option<Frame>> {
        let Some((payload, consumed)) =
            try_deserialize_packet(&self.buffer, self.config.max_payload_size)?
        else {
            return Ok(None);
        };
        self.buffer.drain(..consumed);
        let frame = self.codec.decode(&payload)?;
        Ok(Some(frame))
    }
}

/// Background writer: drains framed packets into the socket until every
/// sender is gone, then shuts the write half down.
async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    peer: String,
) {
    while let Some(packet) = queue.recv().await {
        if let Err(e) = writer.write_all(&packet).await {
            tracing::warn!(peer = %peer, error = %e, "tcp write failed, dropping channel");
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(peer = %peer, error = %e, "tcp shutdown failed");
    }
}

#[async_trait(?Send)]
impl<C: MessageCodec> Channel for TcpChannel<C> {
    fn send_frame(&self, frame: Frame) -> ChannelResult<()> {
        let payload = self.codec.encode(&frame)?;
        let packet = serialize_packet(&payload, self.config.max_payload_size)?;
        self.outbound
            .send(packet)
            .map_err(|_| ChannelError::Closed)?;
        self.frames_sent.set(self.frames_sent.get() + 1);
        Ok(())
    }

    async fn recv_frame(&mut self) -> ChannelResult<Frame> {
        let mut chunk = vec![0u8; self.config.read_buffer_size.max(1)];
        loop {
            if let Some(frame) = self.take_packet()? {
                self.frames_received += 1;
                return Ok(frame);
            }
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::warn!(
                        peer = %self.peer,
                        pending = self.buffer.len(),
                        "peer closed mid-packet"
                    );
                }
                return Err(ChannelError::Closed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Listener handing out one [`TcpChannel`] per accepted Shadow.
pub struct TcpChannelListener {
    inner: TcpListener,
    config: TransportConfig,
}

impl TcpChannelListener {
    /// Bind a listener.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Io` if the address cannot be bound.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: TransportConfig) -> ChannelResult<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner, config })
    }

    /// Local address this listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Io` if the socket has no local address.
    pub fn local_addr(&self) -> ChannelResult<std::net::SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept a single connection.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Io` if accepting fails.
    pub async fn accept(&self) -> ChannelResult<TcpChannel<JsonCodec>> {
        let (stream, addr) = self.inner.accept().await?;
        tracing::debug!(peer = %addr, "accepted shadow connection");
        TcpChannel::from_stream(stream, self.config.clone(), JsonCodec)
    }
}
