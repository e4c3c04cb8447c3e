//! Connection multiplexer
//!
//! One [`ConnectionCore`] owns one transport and provides correlated
//! request/response on top of it, plus fan-out of unsolicited frames to any
//! number of [`Subscription`]s.

mod multiplexer;
mod pending;
mod stats;
mod subscriber;

pub use multiplexer::{ConnectionCore, ConnectionState};
pub use stats::{ConnectionStats, StatsSnapshot};
pub use subscriber::{Subscription, TryRecvError};
