//! Platform data types as the gate engine sees them.
//!
//! Only the fields the engine reads. The REST client maps wire payloads
//! into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A commit on the pull request branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,

    /// Committer timestamp, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Parent SHAs in order. Two or more means a merge commit.
    pub parents: Vec<String>,

    /// Touched file names. `None` until fetched with `get_commit`:
    /// listing a pull request's commits does not include them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl Commit {
    pub fn new(sha: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            sha: sha.into(),
            timestamp: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            files: None,
        }
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files = Some(files.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// The state a review leaves its author in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    /// A draft review that has not been submitted yet.
    Pending,
}

impl ReviewState {
    /// Loose parse of the platform's state string.
    pub fn from_str_loose(s: &str) -> Option<ReviewState> {
        match s.trim().to_uppercase().as_str() {
            "APPROVED" => Some(ReviewState::Approved),
            "CHANGES_REQUESTED" => Some(ReviewState::ChangesRequested),
            "COMMENTED" => Some(ReviewState::Commented),
            "DISMISSED" => Some(ReviewState::Dismissed),
            "PENDING" => Some(ReviewState::Pending),
            _ => None,
        }
    }

    /// Whether this event changes the reviewer's effective state.
    /// Comments and unsubmitted drafts do not.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, ReviewState::Commented | ReviewState::Pending)
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewState::Approved => write!(f, "APPROVED"),
            ReviewState::ChangesRequested => write!(f, "CHANGES_REQUESTED"),
            ReviewState::Commented => write!(f, "COMMENTED"),
            ReviewState::Dismissed => write!(f, "DISMISSED"),
            ReviewState::Pending => write!(f, "PENDING"),
        }
    }
}

/// One review event, in the order the platform delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Stable identifier, used for dismissal calls.
    pub id: u64,
    pub login: String,
    pub state: ReviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// The head commit the review was submitted against.
    pub commit_id: String,
}

impl Review {
    pub fn new(id: u64, login: impl Into<String>, state: ReviewState, commit_id: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            state,
            submitted_at: None,
            commit_id: commit_id.into(),
        }
    }
}

/// A team as listed for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: u64,
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

/// How a head ref relates to a base ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStatus {
    /// Head has commits base does not.
    Ahead,
    /// Head is an ancestor of base.
    Behind,
    Identical,
    Diverged,
}

impl CompareStatus {
    /// True when head brings nothing that base does not already have.
    pub fn is_contained_in_base(&self) -> bool {
        matches!(self, CompareStatus::Behind | CompareStatus::Identical)
    }
}

/// Commit status states gatectl reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Success,
    Pending,
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusState::Success => write!(f, "success"),
            StatusState::Pending => write!(f, "pending"),
        }
    }
}

/// One commit status, ready to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: StatusState,
    /// `<prefix>/<control-slug>`
    pub context: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_state_parse() {
        assert_eq!(ReviewState::from_str_loose("APPROVED"), Some(ReviewState::Approved));
        assert_eq!(
            ReviewState::from_str_loose("changes_requested"),
            Some(ReviewState::ChangesRequested)
        );
        assert_eq!(ReviewState::from_str_loose("LGTM"), None);
    }

    #[test]
    fn test_review_state_serde() {
        let json = serde_json::to_string(&ReviewState::ChangesRequested).unwrap();
        assert_eq!(json, "\"CHANGES_REQUESTED\"");
        let parsed: ReviewState = serde_json::from_str("\"DISMISSED\"").unwrap();
        assert_eq!(parsed, ReviewState::Dismissed);
    }

    #[test]
    fn test_verdicts() {
        assert!(ReviewState::Approved.is_verdict());
        assert!(ReviewState::Dismissed.is_verdict());
        assert!(!ReviewState::Commented.is_verdict());
        assert!(!ReviewState::Pending.is_verdict());
    }

    #[test]
    fn test_compare_status() {
        let parsed: CompareStatus = serde_json::from_str("\"behind\"").unwrap();
        assert!(parsed.is_contained_in_base());
        assert!(CompareStatus::Identical.is_contained_in_base());
        assert!(!CompareStatus::Ahead.is_contained_in_base());
        assert!(!CompareStatus::Diverged.is_contained_in_base());
    }

    #[test]
    fn test_commit_is_merge() {
        assert!(!Commit::new("a", &["p"]).is_merge());
        assert!(Commit::new("m", &["p1", "p2"]).is_merge());
    }
}
