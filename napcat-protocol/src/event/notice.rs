use serde::{Deserialize, Serialize};

use super::{parse, EventError, Id};
use crate::frame::Frame;

/// Group/friend notices (recalls, member changes, pokes, ...)
///
/// Notice payloads vary widely by `notice_type`, so only the common fields
/// are typed; the full payload stays available in `raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeEvent {
    pub time: i64,
    pub self_id: i64,
    pub notice_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub group_id: Option<Id>,
    #[serde(default)]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub operator_id: Option<Id>,
    #[serde(skip)]
    pub raw: Frame,
}

impl NoticeEvent {
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        let mut event: Self = parse(frame)?;
        event.raw = frame.clone();
        Ok(event)
    }

    /// `notify` notices are further discriminated by `sub_type` (poke, ...)
    pub fn is_notify(&self) -> bool {
        self.notice_type == "notify"
    }
}

/// Friend or group join requests awaiting approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub time: i64,
    pub self_id: i64,
    pub request_type: RequestType,
    #[serde(default)]
    pub sub_type: Option<String>,
    pub user_id: Id,
    #[serde(default)]
    pub group_id: Option<Id>,
    #[serde(default)]
    pub comment: String,
    /// Token to pass back when approving or rejecting
    #[serde(default)]
    pub flag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Friend,
    Group,
}

impl RequestEvent {
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        parse(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notice_keeps_raw_payload() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "notice",
            "notice_type": "group_recall",
            "group_id": 30003,
            "user_id": 20002,
            "operator_id": 20002,
            "message_id": 77
        }))
        .unwrap();

        let notice = NoticeEvent::from_frame(&frame).unwrap();
        assert_eq!(notice.notice_type, "group_recall");
        assert_eq!(notice.operator_id, Some(Id::Number(20002)));
        assert_eq!(notice.raw.get_i64("message_id"), Some(77));
        assert!(!notice.is_notify());
    }

    #[test]
    fn test_poke_notify() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "notice",
            "notice_type": "notify",
            "sub_type": "poke",
            "user_id": 20002
        }))
        .unwrap();

        let notice = NoticeEvent::from_frame(&frame).unwrap();
        assert!(notice.is_notify());
        assert_eq!(notice.sub_type.as_deref(), Some("poke"));
    }

    #[test]
    fn test_friend_request() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "request",
            "request_type": "friend",
            "user_id": 20002,
            "comment": "let me in",
            "flag": "abc"
        }))
        .unwrap();

        let req = RequestEvent::from_frame(&frame).unwrap();
        assert_eq!(req.request_type, RequestType::Friend);
        assert_eq!(req.flag, "abc");
        assert!(req.group_id.is_none());
    }

    #[test]
    fn test_unknown_request_type_is_error() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "request_type": "channel",
            "user_id": 20002
        }))
        .unwrap();
        assert!(RequestEvent::from_frame(&frame).is_err());
    }
}
