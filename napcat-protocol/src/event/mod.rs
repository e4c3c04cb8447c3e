//! Typed views of inbound event frames
//!
//! Events are classified by their `post_type` discriminator through a static
//! dispatch table. Anything the table does not know, or a known kind whose
//! payload does not fit its typed shape, becomes [`Event::Unknown`] carrying
//! the raw frame, so no event is ever lost to a parse failure.

mod message;
mod meta;
mod notice;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use message::{MessageEvent, MessagePostType, MessageSegment, MessageSender, MessageType};
pub use meta::{HeartbeatStatus, LifecycleSubType, MetaEvent, MetaKind};
pub use notice::{NoticeEvent, RequestEvent, RequestType};

/// Event parse error (only surfaced through the fallback path)
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown {field}: {value}")]
    UnknownKind { field: &'static str, value: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Numeric or textual identifier (peers send both for user and group ids)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    Text(String),
}

impl Id {
    /// Numeric value, parsing textual ids when possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Meta(MetaEvent),
    Message(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
    Unknown(UnknownEvent),
}

/// Fallback for unrecognized or malformed events
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEvent {
    pub time: i64,
    pub self_id: i64,
    pub post_type: String,
    pub raw: Frame,
}

type Constructor = fn(&Frame) -> Result<Event, EventError>;

/// `post_type` discriminator to constructor
const DISPATCH_TABLE: &[(&str, Constructor)] = &[
    ("meta_event", build_meta),
    ("message", build_message),
    ("message_sent", build_message),
    ("notice", build_notice),
    ("request", build_request),
];

fn build_meta(frame: &Frame) -> Result<Event, EventError> {
    MetaEvent::from_frame(frame).map(Event::Meta)
}

fn build_message(frame: &Frame) -> Result<Event, EventError> {
    MessageEvent::from_frame(frame).map(Event::Message)
}

fn build_notice(frame: &Frame) -> Result<Event, EventError> {
    NoticeEvent::from_frame(frame).map(Event::Notice)
}

fn build_request(frame: &Frame) -> Result<Event, EventError> {
    RequestEvent::from_frame(frame).map(Event::Request)
}

impl Event {
    /// Classify a frame; never fails
    pub fn from_frame(frame: &Frame) -> Self {
        let post_type = frame.get_str("post_type");

        let constructor = post_type.and_then(|pt| {
            DISPATCH_TABLE
                .iter()
                .find(|(name, _)| *name == pt)
                .map(|(_, build)| *build)
        });

        if let Some(build) = constructor {
            if let Ok(event) = build(frame) {
                return event;
            }
        }

        Event::Unknown(UnknownEvent {
            time: frame.get_i64("time").unwrap_or(0),
            self_id: frame.get_i64("self_id").unwrap_or(0),
            post_type: post_type.unwrap_or("unknown").to_string(),
            raw: frame.clone(),
        })
    }

    /// Strict classification, reporting why a frame did not fit
    pub fn try_from_frame(frame: &Frame) -> Result<Self, EventError> {
        let post_type = frame
            .get_str("post_type")
            .ok_or(EventError::MissingField("post_type"))?;

        let (_, build) = DISPATCH_TABLE
            .iter()
            .find(|(name, _)| *name == post_type)
            .ok_or_else(|| EventError::UnknownKind {
                field: "post_type",
                value: post_type.to_string(),
            })?;

        build(frame)
    }

    pub fn post_type(&self) -> &str {
        match self {
            Self::Meta(_) => "meta_event",
            Self::Message(m) => m.post_type.as_str(),
            Self::Notice(_) => "notice",
            Self::Request(_) => "request",
            Self::Unknown(u) => &u.post_type,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Self::Meta(e) => e.time,
            Self::Message(e) => e.time,
            Self::Notice(e) => e.time,
            Self::Request(e) => e.time,
            Self::Unknown(e) => e.time,
        }
    }

    pub fn self_id(&self) -> i64 {
        match self {
            Self::Meta(e) => e.self_id,
            Self::Message(e) => e.self_id,
            Self::Notice(e) => e.self_id,
            Self::Request(e) => e.self_id,
            Self::Unknown(e) => e.self_id,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

/// Deserialize a typed event from the frame's JSON object
pub(crate) fn parse<T: serde::de::DeserializeOwned>(frame: &Frame) -> Result<T, EventError> {
    Ok(serde_json::from_value(frame.to_value())?)
}
