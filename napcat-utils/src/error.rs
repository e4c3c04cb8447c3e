//! Error types for napcat
//!
//! Provides a unified error type used across all napcat crates.

use std::path::PathBuf;
use std::time::Duration;

/// Main error type for napcat operations
#[derive(Debug, thiserror::Error)]
pub enum NapcatError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection is not running")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection already started")]
    AlreadyStarted,

    #[error("Connection cannot be restarted")]
    CannotRestart,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request {echo} timed out after {}ms", .timeout.as_millis())]
    Timeout { echo: String, timeout: Duration },

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Action {action} failed with retcode {retcode}: {message}")]
    ActionFailed {
        action: String,
        retcode: i64,
        message: String,
    },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NapcatError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }
}

/// Result type alias using NapcatError
pub type Result<T> = std::result::Result<T, NapcatError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = NapcatError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = NapcatError::FileRead {
            path: PathBuf::from("/etc/napcat/config.toml"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/napcat/config.toml"));
    }

    #[test]
    fn test_error_display_connection() {
        let err = NapcatError::Connection("refused".into());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_error_display_lifecycle() {
        assert_eq!(NapcatError::NotConnected.to_string(), "Connection is not running");
        assert_eq!(NapcatError::ConnectionClosed.to_string(), "Connection closed");
        assert_eq!(NapcatError::AlreadyStarted.to_string(), "Connection already started");
        assert_eq!(
            NapcatError::CannotRestart.to_string(),
            "Connection cannot be restarted"
        );
    }

    #[test]
    fn test_error_display_timeout() {
        let err = NapcatError::Timeout {
            echo: "seq-3".into(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Request seq-3 timed out after 1500ms");
    }

    #[test]
    fn test_error_display_action_failed() {
        let err = NapcatError::ActionFailed {
            action: "send_group_msg".into(),
            retcode: 1404,
            message: "group not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Action send_group_msg failed with retcode 1404: group not found"
        );
    }

    #[test]
    fn test_error_display_config_invalid() {
        let err = NapcatError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/napcat/config.toml"),
            message: "syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("syntax error"));
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_retryable() {
        assert!(NapcatError::Timeout {
            echo: "seq-0".into(),
            timeout: Duration::from_secs(1),
        }
        .is_retryable());
        assert!(NapcatError::Connection("refused".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable_errors() {
        let non_retryable = [
            NapcatError::NotConnected,
            NapcatError::ConnectionClosed,
            NapcatError::AlreadyStarted,
            NapcatError::CannotRestart,
            NapcatError::Transport("reset".into()),
            NapcatError::Protocol("error".into()),
            NapcatError::Config("bad".into()),
            NapcatError::Internal("error".into()),
        ];

        for err in non_retryable {
            assert!(!err.is_retryable(), "Expected {:?} to NOT be retryable", err);
        }
    }

    // ==================== From Trait Tests ====================

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: NapcatError = io_err.into();
        if let NapcatError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        } else {
            panic!("Expected Io variant");
        }
    }

    // ==================== Helper Function Tests ====================

    #[test]
    fn test_helpers() {
        assert!(matches!(NapcatError::connection("x"), NapcatError::Connection(_)));
        assert!(matches!(NapcatError::transport("x"), NapcatError::Transport(_)));
        assert!(matches!(NapcatError::protocol("x"), NapcatError::Protocol(_)));
        assert!(matches!(NapcatError::config("x"), NapcatError::Config(_)));
        assert!(matches!(NapcatError::internal("x"), NapcatError::Internal(_)));
    }
}
