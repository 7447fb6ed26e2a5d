//! Which deliveries reach the engine.

use crate::error::GateError;
use crate::review::PullRequest;
use crate::webhook::payload::EventPayload;
use thiserror::Error;

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const REVIEW_EVENT: &str = "pull_request_review";

/// `pull_request` actions that can change files, base or approvals.
pub const PULL_REQUEST_ACTIONS: &[&str] = &["opened", "reopened", "synchronize", "edited", "ready_for_review"];

/// `pull_request_review` actions that can change approvals.
pub const REVIEW_ACTIONS: &[&str] = &["submitted", "edited", "dismissed"];

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(serde_json::Error),

    #[error(transparent)]
    InvalidPayload(#[from] GateError),
}

/// Whether an event type and action pair triggers an evaluation.
pub fn should_evaluate(event_type: &str, action: &str) -> bool {
    match event_type {
        PULL_REQUEST_EVENT => PULL_REQUEST_ACTIONS.contains(&action),
        REVIEW_EVENT => REVIEW_ACTIONS.contains(&action),
        _ => false,
    }
}

/// Turn a verified delivery into the pull request to evaluate.
/// `Ok(None)` means the delivery is ignored.
pub fn route(event_type: &str, body: &[u8]) -> Result<Option<PullRequest>, DispatchError> {
    if event_type != PULL_REQUEST_EVENT && event_type != REVIEW_EVENT {
        return Ok(None);
    }

    let payload: EventPayload = serde_json::from_slice(body).map_err(|e| {
        if e.is_data() {
            DispatchError::InvalidPayload(GateError::InvalidPayload(e.to_string()))
        } else {
            DispatchError::InvalidJson(e)
        }
    })?;

    if !should_evaluate(event_type, &payload.action) {
        tracing::debug!(event = event_type, action = %payload.action, "ignoring action");
        return Ok(None);
    }
    Ok(Some(payload.into_pull_request()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(action: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "action": action,
            "pull_request": {
                "number": 3,
                "head": { "sha": "abc" },
                "base": { "ref": "main" }
            },
            "repository": { "full_name": "nypd/precinct" }
        }))
        .unwrap()
    }

    #[test]
    fn test_action_filter() {
        assert!(should_evaluate("pull_request", "synchronize"));
        assert!(should_evaluate("pull_request", "ready_for_review"));
        assert!(!should_evaluate("pull_request", "closed"));
        assert!(!should_evaluate("pull_request", "labeled"));
        assert!(should_evaluate("pull_request_review", "dismissed"));
        assert!(!should_evaluate("pull_request_review_comment", "created"));
        assert!(!should_evaluate("push", "synchronize"));
    }

    #[test]
    fn test_route_accepts_pull_request() {
        let pr = route("pull_request", &body("opened")).unwrap().unwrap();
        assert_eq!(pr.repo, "nypd/precinct");
        assert_eq!(pr.org, "nypd");
    }

    #[test]
    fn test_route_ignores_other_events_without_parsing() {
        assert!(route("push", b"not json").unwrap().is_none());
        assert!(route("pull_request", &body("closed")).unwrap().is_none());
    }

    #[test]
    fn test_route_errors() {
        assert!(matches!(
            route("pull_request", b"{not json"),
            Err(DispatchError::InvalidJson(_))
        ));
        assert!(matches!(
            route("pull_request_review", br#"{"action":"submitted"}"#),
            Err(DispatchError::InvalidPayload(_))
        ));
    }
}
