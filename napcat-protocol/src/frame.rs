//! Generic structured payload exchanged over the transport

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object type carried by every frame
pub type JsonMap = Map<String, Value>;

/// Key holding the correlation id on requests and their responses
pub const ECHO_KEY: &str = "echo";

/// Correlation identifier attached to outbound requests
///
/// Generated per connection as `seq-<n>` from a monotonic counter and
/// echoed back verbatim by the peer in the matching response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Build the id for the given sequence number
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("seq-{}", seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Immutable JSON object frame
///
/// Cloning is cheap: the underlying map is shared, so a single inbound
/// event can be handed to every subscriber without copying it.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(Arc<JsonMap>);

impl Frame {
    pub fn new(map: JsonMap) -> Self {
        Self(Arc::new(map))
    }

    /// Build a frame from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map)),
            _ => None,
        }
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether this frame carries a correlation id (and is therefore a response)
    pub fn has_echo(&self) -> bool {
        self.contains_key(ECHO_KEY)
    }

    /// Correlation id carried by this frame, if any
    ///
    /// Peers normally echo the string back untouched. Any other JSON value is
    /// rendered to text so it can still be looked up (and will not match).
    pub fn echo(&self) -> Option<CorrelationId> {
        match self.get(ECHO_KEY)? {
            Value::String(s) => Some(CorrelationId(s.clone())),
            other => Some(CorrelationId(other.to_string())),
        }
    }

    /// Copy of this frame with `echo` set to `id`, replacing any existing value
    pub fn with_echo(&self, id: &CorrelationId) -> Self {
        let mut map = (*self.0).clone();
        map.insert(ECHO_KEY.to_string(), Value::String(id.0.clone()));
        Self::new(map)
    }

    pub fn as_map(&self) -> &JsonMap {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Owned JSON value of this frame
    pub fn to_value(&self) -> Value {
        Value::Object((*self.0).clone())
    }

    pub fn into_value(self) -> Value {
        match Arc::try_unwrap(self.0) {
            Ok(map) => Value::Object(map),
            Err(shared) => Value::Object((*shared).clone()),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", Value::Object((*self.0).clone()))
    }
}

impl From<JsonMap> for Frame {
    fn from(map: JsonMap) -> Self {
        Self::new(map)
    }
}
