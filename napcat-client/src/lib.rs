//! napcat-client: connection multiplexer for OneBot-style WebSocket peers
//!
//! A [`ConnectionCore`] owns one transport. It correlates requests with
//! their responses through the `echo` field and fans every other inbound
//! frame out to independent subscribers. [`NapCatClient`] and
//! [`ReverseServer`] put the action/event dialect and the two connection
//! directions on top.

pub mod client;
pub mod config;
pub mod connection;
pub mod server;
pub mod transport;

pub use client::{EventStream, NapCatClient};
pub use config::{ClientConfig, Config, ConnectionConfig, ConnectionOptions, ServerConfig};
pub use connection::{
    ConnectionCore, ConnectionState, ConnectionStats, StatsSnapshot, Subscription, TryRecvError,
};
pub use server::ReverseServer;
pub use transport::{FrameSink, FrameStream, Transport, WsTransport};
