pub mod client;
pub mod memory;
pub mod types;

use crate::error::Result;
use async_trait::async_trait;

pub use client::{GitHubClient, GitHubClientConfig};
pub use memory::InMemoryPlatform;
pub use types::*;

/// The remote platform the gate engine reads from and reports to.
///
/// Every method may fail with [`crate::error::GateError::Upstream`].
/// Implementations do not retry; the engine aborts the event on the first
/// failure.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Raw file contents at a ref, or `None` if the file does not exist there.
    async fn fetch_file_at_ref(&self, repo: &str, path: &str, git_ref: &str) -> Result<Option<Vec<u8>>>;

    /// Commits of a pull request, oldest first. Files are not populated.
    async fn list_commits(&self, repo: &str, pr_number: u64) -> Result<Vec<Commit>>;

    /// One commit (by SHA or ref name) including its touched files.
    async fn get_commit(&self, repo: &str, sha: &str) -> Result<Commit>;

    /// How `head` relates to `base`.
    async fn compare_refs(&self, repo: &str, base: &str, head: &str) -> Result<CompareStatus>;

    /// Review events of a pull request in submission order.
    async fn list_reviews(&self, repo: &str, pr_number: u64) -> Result<Vec<Review>>;

    /// File names changed by the pull request as a whole.
    async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>>;

    async fn list_org_teams(&self, org: &str) -> Result<Vec<TeamInfo>>;

    /// Logins of a team's members.
    async fn list_team_members(&self, team_id: u64) -> Result<Vec<String>>;

    async fn post_status(&self, repo: &str, sha: &str, status: &StatusReport) -> Result<()>;

    async fn dismiss_review(&self, repo: &str, pr_number: u64, review_id: u64, reason: &str) -> Result<()>;
}
