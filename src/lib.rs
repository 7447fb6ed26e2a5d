//! gatectl: approval gates for pull requests.
//!
//! Rule files describe which people must approve which paths. On every pull
//! request event the engine revokes approvals made stale by new commits and
//! posts one commit status per control. The binary entrypoint is `main.rs`.

pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod review;
pub mod rules;
pub mod utils;
pub mod webhook;

pub use error::{GateError, Result};
