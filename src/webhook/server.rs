//! HTTP surface.
//!
//! - `POST /hooks/github`: verify, filter, then evaluate in the background
//! - `GET /health`: liveness
//!
//! Deliveries are acknowledged with 202 as soon as they are accepted; the
//! evaluation runs on its own task and reports through logs only.

use crate::review::{Evaluator, ExecutionOutcome, PullRequest};
use crate::webhook::dispatch::{self, DispatchError};
use crate::webhook::signature::verify_signature;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const HEADER_EVENT: &str = "x-github-event";
const HEADER_DELIVERY: &str = "x-github-delivery";
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

pub const WEBHOOK_PATH: &str = "/hooks/github";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::MissingHeader(_) | WebhookError::Dispatch(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    evaluator: Evaluator,
    webhook_secret: Vec<u8>,
}

impl AppState {
    pub fn new(evaluator: Evaluator, webhook_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                evaluator,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.inner.evaluator
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let signature = get_header(&headers, HEADER_SIGNATURE).map_err(|_| WebhookError::InvalidSignature)?;
    let delivery = get_header(&headers, HEADER_DELIVERY).unwrap_or_else(|_| "-".to_string());

    if !verify_signature(&body, &signature, state.webhook_secret()) {
        warn!(delivery = %delivery, "invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event_type = get_header(&headers, HEADER_EVENT)?;
    let Some(pr) = dispatch::route(&event_type, &body)? else {
        debug!(delivery = %delivery, event = %event_type, "delivery ignored");
        return Ok((StatusCode::NO_CONTENT, ""));
    };

    info!(
        delivery = %delivery,
        event = %event_type,
        repo = %pr.repo,
        pr = pr.number,
        action = %pr.action,
        "delivery accepted"
    );
    tokio::spawn(process(state, delivery, pr));
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Evaluate one accepted delivery and log the result.
pub async fn process(state: AppState, delivery: String, pr: PullRequest) {
    let repo = pr.repo.clone();
    let number = pr.number;
    match state.evaluator().run(pr).await {
        Ok(ExecutionOutcome::SkippedBaseMerge) => {
            info!(delivery = %delivery, repo = %repo, pr = number, "base merge update, nothing to do")
        }
        Ok(ExecutionOutcome::NoRuleFile) => {
            debug!(delivery = %delivery, repo = %repo, pr = number, "repository has no rule file")
        }
        Ok(ExecutionOutcome::Evaluated { dismissed, reports }) => info!(
            delivery = %delivery,
            repo = %repo,
            pr = number,
            dismissed,
            statuses = reports.len(),
            "evaluation finished"
        ),
        Err(e) => error!(delivery = %delivery, repo = %repo, pr = number, error = %e, "evaluation aborted"),
    }
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::InMemoryPlatform;

    #[tokio::test]
    async fn test_health() {
        let (status, body) = health_handler().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_error_statuses() {
        let unauthorized = WebhookError::InvalidSignature.into_response();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
        let missing = WebhookError::MissingHeader(HEADER_EVENT).into_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_get_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, "pull_request".parse().unwrap());
        assert_eq!(get_header(&headers, HEADER_EVENT).unwrap(), "pull_request");
        assert!(matches!(
            get_header(&headers, HEADER_SIGNATURE),
            Err(WebhookError::MissingHeader(_))
        ));
    }

    #[test]
    fn test_app_state_accessors() {
        let evaluator = Evaluator::new(Arc::new(InMemoryPlatform::new())).with_rules_path("rules.yml");
        let state = AppState::new(evaluator, b"s3cret".to_vec());
        assert_eq!(state.webhook_secret(), b"s3cret");
        assert_eq!(state.evaluator().rules_path(), "rules.yml");
    }
}
