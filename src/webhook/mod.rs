//! GitHub webhook intake: signature check, payload parsing, event filtering
//! and the axum server that ties them to the evaluator.

pub mod dispatch;
pub mod payload;
pub mod server;
pub mod signature;

pub use server::{build_router, AppState, WebhookError, WEBHOOK_PATH};
pub use signature::{compute_signature, format_signature_header, verify_signature};
