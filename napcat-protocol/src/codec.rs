//! Text frame codec
//!
//! Every transport message is one JSON object encoded as UTF-8 text.

use serde_json::Value;

use crate::frame::Frame;

/// Maximum frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object (got {kind})")]
    NotAnObject { kind: &'static str },

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Decode one inbound text frame
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let value: Value = serde_json::from_str(text)?;
    let kind = value_kind(&value);
    Frame::from_value(value).ok_or(CodecError::NotAnObject { kind })
}

/// Encode one outbound frame as text
pub fn encode_frame(frame: &Frame) -> Result<String, CodecError> {
    let text = serde_json::to_string(frame)?;

    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(text)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
