//! Duplex text-frame transports
//!
//! A transport is split once into an outbound [`FrameSink`] and an inbound
//! [`FrameStream`]. The stream yields text frames in arrival order and ends
//! when the peer goes away; an `Err` item is fatal for the connection.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;
use futures::stream::BoxStream;
use napcat_utils::Result;

pub use websocket::WsTransport;

/// Inbound half of a transport
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Outbound half of a transport
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the transport
    ///
    /// Must be idempotent and must eventually end the inbound stream.
    async fn close(&mut self) -> Result<()>;
}

/// An established duplex channel
pub trait Transport: Send + 'static {
    fn split(self) -> (Box<dyn FrameSink>, FrameStream);
}
