//! napcat-protocol: frame, action and event definitions
//!
//! This crate defines the payload types exchanged with a OneBot-style peer
//! over a text-frame transport. The connection core only relies on
//! [`Frame`] and its correlation id; the action and event models are typed
//! conveniences layered on top.

pub mod action;
pub mod codec;
pub mod event;
pub mod frame;

// Re-export main types at crate root
pub use action::{ActionRequest, ActionResponse, ResponseStatus};
pub use codec::{decode_frame, encode_frame, CodecError, MAX_FRAME_SIZE};
pub use event::{Event, EventError, Id, UnknownEvent};
pub use frame::{CorrelationId, Frame, JsonMap, ECHO_KEY};
