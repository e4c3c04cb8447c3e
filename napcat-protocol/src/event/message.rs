use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{parse, EventError, Id};
use crate::frame::{Frame, JsonMap};

/// Private or group chat message (received or sent by the bot itself)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub time: i64,
    pub self_id: i64,
    pub post_type: MessagePostType,
    pub message_type: MessageType,
    #[serde(default)]
    pub sub_type: Option<String>,
    pub message_id: i64,
    pub user_id: Id,
    #[serde(default)]
    pub group_id: Option<Id>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub sender: MessageSender,
    #[serde(default)]
    pub raw_message: String,
    /// Segments; a non-array `message` (string format) yields no segments
    #[serde(default, deserialize_with = "lenient_segments")]
    pub message: Vec<MessageSegment>,
    #[serde(default)]
    pub font: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePostType {
    Message,
    MessageSent,
}

impl MessagePostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageSent => "message_sent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Private,
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSender {
    #[serde(default)]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// One message segment (`{"type": "text", "data": {"text": "..."}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: JsonMap,
}

impl MessageSegment {
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = JsonMap::new();
        data.insert("text".into(), Value::String(text.into()));
        Self {
            kind: "text".into(),
            data,
        }
    }

    /// Text content for `text` segments
    pub fn as_text(&self) -> Option<&str> {
        if self.kind == "text" {
            self.data.get("text").and_then(Value::as_str)
        } else {
            None
        }
    }
}

fn lenient_segments<'de, D>(deserializer: D) -> Result<Vec<MessageSegment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

impl MessageEvent {
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        let event: Self = parse(frame)?;
        if event.message_type == MessageType::Group && event.group_id.is_none() {
            return Err(EventError::MissingField("group_id"));
        }
        Ok(event)
    }

    pub fn is_group(&self) -> bool {
        self.message_type == MessageType::Group
    }

    /// Concatenated text of all text segments
    pub fn plain_text(&self) -> String {
        self.message.iter().filter_map(MessageSegment::as_text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn private_message(message: Value) -> Frame {
        Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "message_id": 9,
            "user_id": 20002,
            "raw_message": "hi there",
            "message": message,
            "sender": {"user_id": 20002, "nickname": "bob"}
        }))
        .unwrap()
    }

    #[test]
    fn test_private_message_segments() {
        let frame = private_message(json!([
            {"type": "reply", "data": {"id": "8"}},
            {"type": "text", "data": {"text": "hi "}},
            {"type": "at", "data": {"qq": "10001"}},
            {"type": "text", "data": {"text": "there"}}
        ]));

        let event = MessageEvent::from_frame(&frame).unwrap();
        assert!(!event.is_group());
        assert_eq!(event.message.len(), 4);
        assert_eq!(event.plain_text(), "hi there");
        assert_eq!(event.user_id, Id::Number(20002));
    }

    #[test]
    fn test_string_message_yields_no_segments() {
        let frame = private_message(json!("hi there"));
        let event = MessageEvent::from_frame(&frame).unwrap();
        assert!(event.message.is_empty());
        assert_eq!(event.raw_message, "hi there");
    }

    #[test]
    fn test_group_message_requires_group_id() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "message",
            "message_type": "group",
            "message_id": 9,
            "user_id": 20002
        }))
        .unwrap();

        let err = MessageEvent::from_frame(&frame).unwrap_err();
        assert!(matches!(err, EventError::MissingField("group_id")));
    }

    #[test]
    fn test_unknown_message_type_is_error() {
        let frame = Frame::from_value(json!({
            "time": 1,
            "self_id": 10001,
            "post_type": "message",
            "message_type": "channel",
            "message_id": 9,
            "user_id": 20002
        }))
        .unwrap();
        assert!(MessageEvent::from_frame(&frame).is_err());
    }

    #[test]
    fn test_text_segment_builder() {
        let seg = MessageSegment::text("hello");
        assert_eq!(seg.as_text(), Some("hello"));
        assert_eq!(
            serde_json::to_value(&seg).unwrap(),
            json!({"type": "text", "data": {"text": "hello"}})
        );
    }
}
