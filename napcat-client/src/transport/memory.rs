//! In-process transport pair
//!
//! [`pair`] returns a transport for a connection plus the [`MemoryPeer`]
//! standing in for the remote side. The peer can read what the connection
//! wrote, push inbound frames, inject a read error, hang up, or make the
//! transport's close hang forever.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use napcat_protocol::{decode_frame, Frame};
use napcat_utils::{NapcatError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{FrameSink, FrameStream, Transport};

#[derive(Default)]
struct Shared {
    sink_closed: AtomicBool,
    hang_on_close: AtomicBool,
    writes: AtomicUsize,
}

/// Connection side of an in-process pair
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Result<String>>,
    outbound: mpsc::UnboundedSender<String>,
    hangup: CancellationToken,
    shared: Arc<Shared>,
}

/// Remote side of an in-process pair
pub struct MemoryPeer {
    inbound: mpsc::UnboundedSender<Result<String>>,
    outbound: mpsc::UnboundedReceiver<String>,
    hangup: CancellationToken,
    shared: Arc<Shared>,
}

/// Create a connected transport/peer pair
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let hangup = CancellationToken::new();
    let shared = Arc::new(Shared::default());

    let transport = MemoryTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
        hangup: hangup.clone(),
        shared: Arc::clone(&shared),
    };
    let peer = MemoryPeer {
        inbound: inbound_tx,
        outbound: outbound_rx,
        hangup,
        shared,
    };
    (transport, peer)
}

impl Transport for MemoryTransport {
    fn split(self) -> (Box<dyn FrameSink>, FrameStream) {
        let hangup = self.hangup.clone();
        let stream = stream::unfold(self.inbound, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
        .take_until(async move { hangup.cancelled().await })
        .boxed();

        let sink = MemorySink {
            outbound: self.outbound,
            hangup: self.hangup,
            shared: self.shared,
        };
        (Box::new(sink), stream)
    }
}

struct MemorySink {
    outbound: mpsc::UnboundedSender<String>,
    hangup: CancellationToken,
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.hangup.is_cancelled() {
            return Err(NapcatError::transport("memory transport closed"));
        }
        self.outbound
            .send(text)
            .map_err(|_| NapcatError::transport("memory peer dropped"))?;
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.shared.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.shared.sink_closed.store(true, Ordering::SeqCst);
        self.hangup.cancel();
        Ok(())
    }
}

impl MemoryPeer {
    /// Next text frame written by the connection
    pub async fn recv_text(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Next frame written by the connection, decoded
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        let text = self.recv_text().await?;
        decode_frame(&text).ok()
    }

    pub fn try_recv_text(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Deliver a raw text frame to the connection
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.inbound.send(Ok(text.into())).is_ok()
    }

    pub fn send_json(&self, value: serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.send_text(frame.to_value().to_string())
    }

    /// Make the connection's next read fail
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.inbound
            .send(Err(NapcatError::transport(message.into())))
            .is_ok()
    }

    /// Hang up: ends the inbound stream and fails further writes
    pub fn disconnect(&self) {
        self.hangup.cancel();
    }

    /// Make the transport's `close()` never complete
    pub fn hang_on_close(&self) {
        self.shared.hang_on_close.store(true, Ordering::SeqCst);
    }

    /// Whether the connection closed its side gracefully
    pub fn is_closed(&self) -> bool {
        self.shared.sink_closed.load(Ordering::SeqCst)
    }

    /// Number of frames the connection has written so far
    pub fn writes(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }
}
