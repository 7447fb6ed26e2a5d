//! Commit classification: which new commits are real changes, and which
//! pushes only merged the base branch in.

use crate::error::Result;
use crate::github::{Commit, Platform};
use crate::review::context::PullRequest;
use crate::utils::paths::normalize_path;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashSet};

/// Upper bound on concurrent `get_commit` calls for one pull request.
pub const MAX_CONCURRENT_COMMIT_FETCHES: usize = 8;

/// Drop merge commits that only brought the base branch in.
///
/// A merge is administrative when one of its parents is already contained
/// in the base branch. Single-parent commits are always kept.
pub async fn substantive_commits(
    platform: &dyn Platform,
    repo: &str,
    base_branch: &str,
    commits: &[Commit],
) -> Result<Vec<Commit>> {
    let mut kept = Vec::with_capacity(commits.len());
    for commit in commits {
        if commit.is_merge() && merges_base(platform, repo, base_branch, commit).await? {
            tracing::debug!(sha = %commit.sha, "skipping base-branch merge commit");
            continue;
        }
        kept.push(commit.clone());
    }
    Ok(kept)
}

async fn merges_base(platform: &dyn Platform, repo: &str, base_branch: &str, commit: &Commit) -> Result<bool> {
    for parent in &commit.parents {
        let status = platform.compare_refs(repo, base_branch, parent).await?;
        if status.is_contained_in_base() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Files touched by `commits`, with a leading `/`. Commits listed without
/// their files are fetched individually.
pub async fn changed_files(platform: &dyn Platform, repo: &str, commits: &[Commit]) -> Result<BTreeSet<String>> {
    let fetches: Vec<_> = commits
        .iter()
        .map(|commit| async move {
            match &commit.files {
                Some(files) => Ok(files.clone()),
                None => platform
                    .get_commit(repo, &commit.sha)
                    .await
                    .map(|c| c.files.unwrap_or_default()),
            }
        })
        .collect();
    let fetched: Vec<Vec<String>> = stream::iter(fetches)
        .buffer_unordered(MAX_CONCURRENT_COMMIT_FETCHES)
        .try_collect()
        .await?;

    Ok(fetched
        .into_iter()
        .flatten()
        .map(|f| normalize_path(&f))
        .collect())
}

/// True when a `synchronize` push made the head a merge of the current base
/// tip, i.e. the author only updated the branch from base.
pub async fn is_base_merge_update(platform: &dyn Platform, pr: &PullRequest) -> Result<bool> {
    if pr.action != "synchronize" {
        return Ok(false);
    }

    let head = platform.get_commit(&pr.repo, &pr.head_sha).await?;
    let parents: HashSet<&str> = head.parents.iter().map(String::as_str).collect();
    if head.parents.len() != 2 || parents.len() != 2 {
        return Ok(false);
    }

    let base_tip = platform.get_commit(&pr.repo, &pr.base_branch).await?;
    Ok(parents.contains(base_tip.sha.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{CompareStatus, InMemoryPlatform, Review, StatusReport, TeamInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPO: &str = "nypd/precinct";

    fn pr(action: &str, head: &str) -> PullRequest {
        PullRequest {
            repo: REPO.to_string(),
            org: "nypd".to_string(),
            number: 99,
            base_branch: "main".to_string(),
            head_sha: head.to_string(),
            action: action.to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_parent_commits_always_kept() {
        let platform = InMemoryPlatform::new();
        let commits = vec![Commit::new("c1", &["root"]), Commit::new("c2", &["c1"])];
        let kept = substantive_commits(&platform, REPO, "main", &commits).await.unwrap();
        assert_eq!(kept, commits);
        assert_eq!(platform.call_count("compare_refs"), 0);
    }

    #[tokio::test]
    async fn test_base_merge_excluded() {
        let platform = InMemoryPlatform::new()
            .with_compare(REPO, "main", "c1", CompareStatus::Ahead)
            .with_compare(REPO, "main", "base1", CompareStatus::Identical);
        let commits = vec![Commit::new("c1", &["root"]), Commit::new("m1", &["c1", "base1"])];
        let kept = substantive_commits(&platform, REPO, "main", &commits).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].sha, "c1");
    }

    #[tokio::test]
    async fn test_feature_merge_kept() {
        let platform = InMemoryPlatform::new()
            .with_compare(REPO, "main", "c1", CompareStatus::Ahead)
            .with_compare(REPO, "main", "topic", CompareStatus::Diverged);
        let commits = vec![Commit::new("m1", &["c1", "topic"])];
        let kept = substantive_commits(&platform, REPO, "main", &commits).await.unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_files_fetches_and_normalizes() {
        let platform = InMemoryPlatform::new()
            .with_commit(REPO, Commit::new("c1", &["root"]).with_files(&["lib/x.rb", "README.md"]))
            .with_commit(REPO, Commit::new("c2", &["c1"]).with_files(&["lib/x.rb"]));
        let commits = vec![Commit::new("c1", &["root"]), Commit::new("c2", &["c1"])];
        let files = changed_files(&platform, REPO, &commits).await.unwrap();
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec!["/README.md", "/lib/x.rb"]
        );
        assert_eq!(platform.call_count("get_commit"), 2);
    }

    /// Tracks how many `get_commit` calls are in flight at once.
    struct Throttled {
        inner: InMemoryPlatform,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Platform for Throttled {
        async fn fetch_file_at_ref(&self, repo: &str, path: &str, git_ref: &str) -> Result<Option<Vec<u8>>> {
            self.inner.fetch_file_at_ref(repo, path, git_ref).await
        }
        async fn list_commits(&self, repo: &str, pr_number: u64) -> Result<Vec<Commit>> {
            self.inner.list_commits(repo, pr_number).await
        }
        async fn get_commit(&self, repo: &str, sha: &str) -> Result<Commit> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_commit(repo, sha).await
        }
        async fn compare_refs(&self, repo: &str, base: &str, head: &str) -> Result<CompareStatus> {
            self.inner.compare_refs(repo, base, head).await
        }
        async fn list_reviews(&self, repo: &str, pr_number: u64) -> Result<Vec<Review>> {
            self.inner.list_reviews(repo, pr_number).await
        }
        async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
            self.inner.list_changed_files(repo, pr_number).await
        }
        async fn list_org_teams(&self, org: &str) -> Result<Vec<TeamInfo>> {
            self.inner.list_org_teams(org).await
        }
        async fn list_team_members(&self, team_id: u64) -> Result<Vec<String>> {
            self.inner.list_team_members(team_id).await
        }
        async fn post_status(&self, repo: &str, sha: &str, status: &StatusReport) -> Result<()> {
            self.inner.post_status(repo, sha, status).await
        }
        async fn dismiss_review(&self, repo: &str, pr_number: u64, review_id: u64, reason: &str) -> Result<()> {
            self.inner.dismiss_review(repo, pr_number, review_id, reason).await
        }
    }

    #[tokio::test]
    async fn test_changed_files_bounds_concurrent_fetches() {
        let mut inner = InMemoryPlatform::new();
        let mut commits = Vec::new();
        for i in 0..40 {
            let sha = format!("c{}", i);
            let file = format!("lib/f{}.rb", i);
            inner = inner.with_commit(REPO, Commit::new(&sha, &["root"]).with_files(&[file.as_str()]));
            commits.push(Commit::new(&sha, &["root"]));
        }
        let platform = Throttled {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };

        let files = changed_files(&platform, REPO, &commits).await.unwrap();

        assert_eq!(files.len(), 40);
        assert!(files.contains("/lib/f39.rb"));
        let peak = platform.peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= MAX_CONCURRENT_COMMIT_FETCHES, "peak {}", peak);
    }

    #[tokio::test]
    async fn test_base_merge_update_detected() {
        let platform = InMemoryPlatform::new()
            .with_commit(REPO, Commit::new("merge", &["c1", "tip"]))
            .with_commit(REPO, Commit::new("tip", &["older"]))
            .with_ref(REPO, "main", "tip");
        assert!(is_base_merge_update(&platform, &pr("synchronize", "merge")).await.unwrap());
    }

    #[tokio::test]
    async fn test_base_merge_update_requires_synchronize() {
        let platform = InMemoryPlatform::new();
        assert!(!is_base_merge_update(&platform, &pr("opened", "merge")).await.unwrap());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_merge_of_stale_base_is_not_update() {
        let platform = InMemoryPlatform::new()
            .with_commit(REPO, Commit::new("merge", &["c1", "old-tip"]))
            .with_commit(REPO, Commit::new("tip", &["old-tip"]))
            .with_ref(REPO, "main", "tip");
        assert!(!is_base_merge_update(&platform, &pr("synchronize", "merge")).await.unwrap());
    }

    #[tokio::test]
    async fn test_single_parent_head_is_not_update() {
        let platform = InMemoryPlatform::new().with_commit(REPO, Commit::new("c2", &["c1"]));
        assert!(!is_base_merge_update(&platform, &pr("synchronize", "c2")).await.unwrap());
        assert_eq!(platform.call_count("get_commit"), 1);
    }
}
