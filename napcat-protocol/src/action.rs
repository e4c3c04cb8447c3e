//! Action requests and their responses

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::frame::{Frame, JsonMap};

/// Outbound action call
///
/// # Example
/// ```rust
/// use napcat_protocol::ActionRequest;
/// use serde_json::json;
///
/// let req = ActionRequest::new("send_private_msg")
///     .with_param("user_id", json!(10001))
///     .with_param("message", json!("hello"));
/// let frame = req.into_frame();
/// assert_eq!(frame.get_str("action"), Some("send_private_msg"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub params: JsonMap,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: JsonMap::new(),
        }
    }

    /// Build a request from a params value; anything but an object yields empty params
    pub fn with_params(action: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }

    /// Set a parameter (builder pattern)
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Frame to hand to the connection (without a correlation id)
    pub fn into_frame(self) -> Frame {
        let mut map = JsonMap::new();
        map.insert("action".into(), Value::String(self.action));
        map.insert("params".into(), Value::Object(self.params));
        Frame::new(map)
    }
}

/// Response status reported by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    /// Accepted for asynchronous processing
    Async,
    Failed,
}

/// Parsed response to an action call
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub status: ResponseStatus,
    pub retcode: i64,
    pub data: Value,
    pub message: String,
    pub wording: String,
    pub echo: Option<String>,
}

impl ActionResponse {
    /// Parse a response frame leniently
    ///
    /// Missing or malformed fields fall back to a failed status, retcode -1
    /// and empty text, so a garbled response never masquerades as success.
    pub fn from_frame(frame: &Frame) -> Self {
        let status = match frame.get_str("status") {
            Some("ok") => ResponseStatus::Ok,
            Some("async") => ResponseStatus::Async,
            _ => ResponseStatus::Failed,
        };

        Self {
            status,
            retcode: frame.get_i64("retcode").unwrap_or(-1),
            data: frame.get("data").cloned().unwrap_or_else(|| json!({})),
            message: frame.get_str("message").unwrap_or_default().to_string(),
            wording: frame.get_str("wording").unwrap_or_default().to_string(),
            echo: frame.echo().map(|id| id.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok && self.retcode == 0
    }

    /// Best human-readable error text
    pub fn error_message(&self) -> &str {
        if !self.wording.is_empty() {
            &self.wording
        } else {
            &self.message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_shape() {
        let frame = ActionRequest::new("get_login_info").into_frame();
        assert_eq!(frame.to_value(), json!({"action": "get_login_info", "params": {}}));
        assert!(!frame.has_echo());
    }

    #[test]
    fn test_request_with_params_value() {
        let req = ActionRequest::with_params("send_group_msg", json!({"group_id": 1, "message": "hi"}));
        assert_eq!(req.params.get("group_id"), Some(&json!(1)));

        let req = ActionRequest::with_params("get_status", json!(null));
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_response_ok() {
        let frame = Frame::from_value(json!({
            "status": "ok",
            "retcode": 0,
            "data": {"user_id": 10001, "nickname": "bot"},
            "message": "",
            "wording": "",
            "echo": "seq-0"
        }))
        .unwrap();
        let resp = ActionResponse::from_frame(&frame);
        assert!(resp.is_ok());
        assert_eq!(resp.data["nickname"], "bot");
        assert_eq!(resp.echo.as_deref(), Some("seq-0"));
    }

    #[test]
    fn test_response_failed() {
        let frame = Frame::from_value(json!({
            "status": "failed",
            "retcode": 1404,
            "message": "not found",
            "wording": "no such group"
        }))
        .unwrap();
        let resp = ActionResponse::from_frame(&frame);
        assert!(!resp.is_ok());
        assert_eq!(resp.retcode, 1404);
        assert_eq!(resp.error_message(), "no such group");
    }

    #[test]
    fn test_response_defaults() {
        let frame = Frame::from_value(json!({"echo": "seq-9"})).unwrap();
        let resp = ActionResponse::from_frame(&frame);
        assert_eq!(resp.status, ResponseStatus::Failed);
        assert_eq!(resp.retcode, -1);
        assert_eq!(resp.data, json!({}));
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_ok_status_with_nonzero_retcode_is_not_ok() {
        let frame = Frame::from_value(json!({"status": "ok", "retcode": 100})).unwrap();
        assert!(!ActionResponse::from_frame(&frame).is_ok());
    }
}
