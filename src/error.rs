//! Error taxonomy for the gate engine.
//!
//! Only conditions that abort an event's evaluation are errors. A missing
//! rule file and a reviewed commit that has vanished from history are
//! handled where they occur and never reach this type.

use thiserror::Error;

/// Errors that abort the evaluation of one webhook event.
#[derive(Debug, Error)]
pub enum GateError {
    /// The rule file exists but could not be parsed or validated.
    #[error("invalid rule file: {0:#}")]
    ConfigInvalid(#[source] anyhow::Error),

    /// A remote call failed or timed out.
    #[error("{operation} failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream {
        operation: &'static str,
        message: String,
        status: Option<u16>,
    },

    /// The webhook payload is missing a field the engine needs.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl GateError {
    /// Build an upstream error without an HTTP status (transport failure,
    /// timeout, undecodable body).
    pub fn upstream(operation: &'static str, message: impl Into<String>) -> Self {
        GateError::Upstream {
            operation,
            message: message.into(),
            status: None,
        }
    }

    /// Build an upstream error for a non-success HTTP response.
    pub fn upstream_status(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        GateError::Upstream {
            operation,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, GateError::Upstream { .. })
    }

    pub fn is_config_invalid(&self) -> bool {
        matches!(self, GateError::ConfigInvalid(_))
    }
}

pub type Result<T, E = GateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display() {
        let err = GateError::upstream_status("list_reviews", 502, "Bad Gateway");
        assert_eq!(err.to_string(), "list_reviews failed (HTTP 502): Bad Gateway");

        let err = GateError::upstream("get_commit", "timed out");
        assert_eq!(err.to_string(), "get_commit failed: timed out");
        assert!(err.is_upstream());
    }

    #[test]
    fn test_config_invalid_display_includes_context() {
        let inner = anyhow::anyhow!("count must be at least 1").context("rule 2 (QA)");
        let err = GateError::ConfigInvalid(inner);
        assert_eq!(
            err.to_string(),
            "invalid rule file: rule 2 (QA): count must be at least 1"
        );
        assert!(err.is_config_invalid());
    }
}
