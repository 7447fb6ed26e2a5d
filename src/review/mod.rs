//! The approval gate engine.
//!
//! `history` and `classifier` are the pure-ish building blocks, `context`
//! memoizes remote data for one event, `control` applies one rule, and
//! `evaluator` drives a whole rule file.

pub mod classifier;
pub mod context;
pub mod control;
pub mod evaluator;
pub mod history;

pub use context::{Organization, PullRequest, PullRequestContext, Team};
pub use control::Control;
pub use evaluator::{ControlSet, Evaluator, ExecutionOutcome};
