//! In-memory [`Platform`] for tests and local dry runs.
//!
//! Holds canned repository data, records every call by operation name, and
//! records posted statuses and dismissals so callers can assert on the side
//! effects of an evaluation. Individual operations can be made to fail.

use crate::error::{GateError, Result};
use crate::github::types::*;
use crate::github::Platform;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A status that was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedStatus {
    pub repo: String,
    pub sha: String,
    pub report: StatusReport,
}

/// A review dismissal that was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dismissal {
    pub repo: String,
    pub pr_number: u64,
    pub review_id: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<(String, String, String), Vec<u8>>,
    pr_commits: HashMap<(String, u64), Vec<Commit>>,
    commits: HashMap<(String, String), Commit>,
    refs: HashMap<(String, String), String>,
    compares: HashMap<(String, String, String), CompareStatus>,
    reviews: HashMap<(String, u64), Vec<Review>>,
    changed_files: HashMap<(String, u64), Vec<String>>,
    org_teams: HashMap<String, Vec<TeamInfo>>,
    team_members: HashMap<u64, Vec<String>>,
    failing: HashSet<&'static str>,

    calls: Vec<&'static str>,
    statuses: Vec<PostedStatus>,
    dismissals: Vec<Dismissal>,
}

/// Canned-data platform. Configure with the `with_*` builders, then share
/// it as `Arc<dyn Platform>`.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(operation);
        if state.failing.contains(operation) {
            return Err(GateError::upstream_status(operation, 502, "injected failure"));
        }
        Ok(())
    }

    pub fn with_file(self, repo: &str, path: &str, git_ref: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.state().files.insert(
            (repo.to_string(), path.to_string(), git_ref.to_string()),
            contents.into(),
        );
        self
    }

    /// The pull request's commit list. Commits that carry files are also
    /// registered for `get_commit`.
    pub fn with_pr_commits(self, repo: &str, pr_number: u64, commits: Vec<Commit>) -> Self {
        {
            let mut state = self.state();
            for commit in &commits {
                state
                    .commits
                    .entry((repo.to_string(), commit.sha.clone()))
                    .or_insert_with(|| commit.clone());
            }
            state.pr_commits.insert((repo.to_string(), pr_number), commits);
        }
        self
    }

    /// A commit served by `get_commit`, replacing any earlier registration.
    pub fn with_commit(self, repo: &str, commit: Commit) -> Self {
        self.state()
            .commits
            .insert((repo.to_string(), commit.sha.clone()), commit);
        self
    }

    /// Point a ref name (such as a branch) at a commit.
    pub fn with_ref(self, repo: &str, name: &str, sha: &str) -> Self {
        self.state()
            .refs
            .insert((repo.to_string(), name.to_string()), sha.to_string());
        self
    }

    pub fn with_compare(self, repo: &str, base: &str, head: &str, status: CompareStatus) -> Self {
        self.state().compares.insert(
            (repo.to_string(), base.to_string(), head.to_string()),
            status,
        );
        self
    }

    pub fn with_reviews(self, repo: &str, pr_number: u64, reviews: Vec<Review>) -> Self {
        self.state().reviews.insert((repo.to_string(), pr_number), reviews);
        self
    }

    pub fn with_changed_files(self, repo: &str, pr_number: u64, files: &[&str]) -> Self {
        self.state().changed_files.insert(
            (repo.to_string(), pr_number),
            files.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn with_team(self, org: &str, team: TeamInfo, members: &[&str]) -> Self {
        {
            let mut state = self.state();
            state
                .team_members
                .insert(team.id, members.iter().map(|m| m.to_string()).collect());
            state.org_teams.entry(org.to_string()).or_default().push(team);
        }
        self
    }

    /// Make every call to `operation` fail with an upstream error.
    pub fn failing(self, operation: &'static str) -> Self {
        self.state().failing.insert(operation);
        self
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == operation).count()
    }

    pub fn statuses(&self) -> Vec<PostedStatus> {
        self.state().statuses.clone()
    }

    pub fn dismissals(&self) -> Vec<Dismissal> {
        self.state().dismissals.clone()
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn fetch_file_at_ref(&self, repo: &str, path: &str, git_ref: &str) -> Result<Option<Vec<u8>>> {
        self.record("fetch_file_at_ref")?;
        Ok(self
            .state()
            .files
            .get(&(repo.to_string(), path.to_string(), git_ref.to_string()))
            .cloned())
    }

    async fn list_commits(&self, repo: &str, pr_number: u64) -> Result<Vec<Commit>> {
        self.record("list_commits")?;
        Ok(self
            .state()
            .pr_commits
            .get(&(repo.to_string(), pr_number))
            .map(|commits| {
                commits
                    .iter()
                    .cloned()
                    .map(|c| Commit { files: None, ..c })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_commit(&self, repo: &str, sha: &str) -> Result<Commit> {
        self.record("get_commit")?;
        let state = self.state();
        let resolved = state
            .refs
            .get(&(repo.to_string(), sha.to_string()))
            .cloned()
            .unwrap_or_else(|| sha.to_string());
        state
            .commits
            .get(&(repo.to_string(), resolved))
            .cloned()
            .map(|mut c| {
                c.files.get_or_insert_with(Vec::new);
                c
            })
            .ok_or_else(|| GateError::upstream_status("get_commit", 404, format!("No commit found for SHA: {}", sha)))
    }

    async fn compare_refs(&self, repo: &str, base: &str, head: &str) -> Result<CompareStatus> {
        self.record("compare_refs")?;
        self.state()
            .compares
            .get(&(repo.to_string(), base.to_string(), head.to_string()))
            .copied()
            .ok_or_else(|| GateError::upstream_status("compare_refs", 404, format!("No comparison for {}...{}", base, head)))
    }

    async fn list_reviews(&self, repo: &str, pr_number: u64) -> Result<Vec<Review>> {
        self.record("list_reviews")?;
        Ok(self
            .state()
            .reviews
            .get(&(repo.to_string(), pr_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        self.record("list_changed_files")?;
        Ok(self
            .state()
            .changed_files
            .get(&(repo.to_string(), pr_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_org_teams(&self, org: &str) -> Result<Vec<TeamInfo>> {
        self.record("list_org_teams")?;
        Ok(self.state().org_teams.get(org).cloned().unwrap_or_default())
    }

    async fn list_team_members(&self, team_id: u64) -> Result<Vec<String>> {
        self.record("list_team_members")?;
        Ok(self
            .state()
            .team_members
            .get(&team_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_status(&self, repo: &str, sha: &str, status: &StatusReport) -> Result<()> {
        self.record("post_status")?;
        self.state().statuses.push(PostedStatus {
            repo: repo.to_string(),
            sha: sha.to_string(),
            report: status.clone(),
        });
        Ok(())
    }

    /// Records the dismissal and flips the stored review to DISMISSED, so a
    /// later `list_reviews` sees it the way the real platform would.
    async fn dismiss_review(&self, repo: &str, pr_number: u64, review_id: u64, reason: &str) -> Result<()> {
        self.record("dismiss_review")?;
        let mut state = self.state();
        if let Some(reviews) = state.reviews.get_mut(&(repo.to_string(), pr_number)) {
            for review in reviews.iter_mut().filter(|r| r.id == review_id) {
                review.state = ReviewState::Dismissed;
            }
        }
        state.dismissals.push(Dismissal {
            repo: repo.to_string(),
            pr_number,
            review_id,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "nypd/precinct";

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let platform = InMemoryPlatform::new().with_file(REPO, ".gatectl.yml", "main", "[]");
        assert!(platform
            .fetch_file_at_ref(REPO, ".gatectl.yml", "develop")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            platform
                .fetch_file_at_ref(REPO, ".gatectl.yml", "main")
                .await
                .unwrap(),
            Some(b"[]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_list_commits_strips_files() {
        let platform = InMemoryPlatform::new().with_pr_commits(
            REPO,
            1,
            vec![Commit::new("a1", &["base"]).with_files(&["lib/x.rb"])],
        );
        let listed = platform.list_commits(REPO, 1).await.unwrap();
        assert!(listed[0].files.is_none());

        let fetched = platform.get_commit(REPO, "a1").await.unwrap();
        assert_eq!(fetched.files, Some(vec!["lib/x.rb".to_string()]));
    }

    #[tokio::test]
    async fn test_ref_resolution() {
        let platform = InMemoryPlatform::new()
            .with_commit(REPO, Commit::new("tip", &["older"]))
            .with_ref(REPO, "main", "tip");
        assert_eq!(platform.get_commit(REPO, "main").await.unwrap().sha, "tip");
        assert!(platform.get_commit(REPO, "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_dismissal_updates_reviews() {
        let platform = InMemoryPlatform::new().with_reviews(
            REPO,
            7,
            vec![Review::new(11, "jperalta", ReviewState::Approved, "a1")],
        );
        platform.dismiss_review(REPO, 7, 11, "stale").await.unwrap();

        let reviews = platform.list_reviews(REPO, 7).await.unwrap();
        assert_eq!(reviews[0].state, ReviewState::Dismissed);
        assert_eq!(platform.dismissals().len(), 1);
        assert_eq!(platform.dismissals()[0].reason, "stale");
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let platform = InMemoryPlatform::new().failing("list_reviews");
        let err = platform.list_reviews(REPO, 1).await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(platform.calls(), vec!["list_reviews"]);
    }
}
