use serde::{Deserialize, Serialize};

use super::{parse, EventError};
use crate::frame::Frame;

/// Connection lifecycle and heartbeat events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    pub time: i64,
    pub self_id: i64,
    #[serde(flatten)]
    pub kind: MetaKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "meta_event_type", rename_all = "snake_case")]
pub enum MetaKind {
    Lifecycle {
        sub_type: LifecycleSubType,
    },
    Heartbeat {
        status: HeartbeatStatus,
        /// Milliseconds until the next heartbeat
        interval: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSubType {
    Enable,
    Disable,
    Connect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    #[serde(default)]
    pub online: Option<bool>,
    pub good: bool,
}

impl MetaEvent {
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        parse(frame)
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.kind, MetaKind::Heartbeat { .. })
    }
}
