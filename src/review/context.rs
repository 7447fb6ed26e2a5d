//! Per-event view of one pull request.
//!
//! Everything the controls need is fetched lazily and at most once per
//! context, even when several controls ask at the same time. A context is
//! built for a single webhook event and dropped when the event is done.

use crate::error::{GateError, Result};
use crate::github::{Commit, Platform, Review, TeamInfo};
use crate::review::{classifier, history};
use crate::utils::paths::normalize_path;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Identity of the pull request an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// `owner/name`
    pub repo: String,
    /// Organization login used to resolve teams.
    pub org: String,
    pub number: u64,
    pub base_branch: String,
    pub head_sha: String,
    /// The webhook action, e.g. `synchronize`.
    pub action: String,
}

/// Memoized pull request data for one evaluation.
pub struct PullRequestContext {
    pub pr: PullRequest,
    platform: Arc<dyn Platform>,
    organization: Arc<Organization>,

    commits: OnceCell<Vec<Commit>>,
    reviews: OnceCell<Vec<Review>>,
    approved_reviewers: OnceCell<BTreeSet<String>>,
    new_commits: OnceCell<Vec<Commit>>,
    files: OnceCell<Vec<String>>,
    changed_files: OnceCell<BTreeSet<String>>,

    /// Review ids already dismissed during this event.
    dismissed: Mutex<HashSet<u64>>,
}

impl PullRequestContext {
    pub fn new(pr: PullRequest, platform: Arc<dyn Platform>) -> Self {
        let organization = Arc::new(Organization::new(pr.org.clone(), platform.clone()));
        Self::with_organization(pr, platform, organization)
    }

    fn with_organization(pr: PullRequest, platform: Arc<dyn Platform>, organization: Arc<Organization>) -> Self {
        Self {
            pr,
            platform,
            organization,
            commits: OnceCell::new(),
            reviews: OnceCell::new(),
            approved_reviewers: OnceCell::new(),
            new_commits: OnceCell::new(),
            files: OnceCell::new(),
            changed_files: OnceCell::new(),
            dismissed: Mutex::new(HashSet::new()),
        }
    }

    /// A fresh context for the same pull request. Review and commit data are
    /// fetched again; the organization's team cache is kept.
    pub fn reload(&self) -> Self {
        Self::with_organization(self.pr.clone(), self.platform.clone(), self.organization.clone())
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    /// Commits on the branch, oldest first.
    pub async fn commits(&self) -> Result<&[Commit]> {
        self.commits
            .get_or_try_init(|| self.platform.list_commits(&self.pr.repo, self.pr.number))
            .await
            .map(Vec::as_slice)
    }

    /// Review events in submission order.
    pub async fn reviews(&self) -> Result<&[Review]> {
        self.reviews
            .get_or_try_init(|| self.platform.list_reviews(&self.pr.repo, self.pr.number))
            .await
            .map(Vec::as_slice)
    }

    /// Logins currently approving the pull request.
    pub async fn approved_reviewers(&self) -> Result<&BTreeSet<String>> {
        self.approved_reviewers
            .get_or_try_init(|| async {
                let reviews = self.reviews().await?;
                Ok::<_, GateError>(history::approved_reviewers(reviews))
            })
            .await
    }

    /// The reviews behind the current approvals.
    pub async fn approved_reviews(&self) -> Result<Vec<Review>> {
        Ok(history::approved_reviews(self.reviews().await?))
    }

    /// Commits pushed since the most recent review.
    pub async fn new_commits(&self) -> Result<&[Commit]> {
        self.new_commits
            .get_or_try_init(|| async {
                let commits = self.commits().await?;
                let reviews = self.reviews().await?;
                Ok::<_, GateError>(history::new_commits(commits, reviews))
            })
            .await
            .map(Vec::as_slice)
    }

    /// Every file the pull request changes, with a leading `/`.
    pub async fn files(&self) -> Result<&[String]> {
        self.files
            .get_or_try_init(|| async {
                let files = self
                    .platform
                    .list_changed_files(&self.pr.repo, self.pr.number)
                    .await?;
                Ok::<_, GateError>(files.iter().map(|f| normalize_path(f)).collect())
            })
            .await
            .map(Vec::as_slice)
    }

    /// Files touched by substantive commits since the last review.
    pub async fn changed_files(&self) -> Result<&BTreeSet<String>> {
        self.changed_files
            .get_or_try_init(|| async {
                let new_commits = self.new_commits().await?;
                let substantive = classifier::substantive_commits(
                    self.platform(),
                    &self.pr.repo,
                    &self.pr.base_branch,
                    new_commits,
                )
                .await?;
                classifier::changed_files(self.platform(), &self.pr.repo, &substantive).await
            })
            .await
    }

    /// Claim a review for dismissal. Returns false if another control
    /// already dismissed it during this event.
    pub fn claim_dismissal(&self, review_id: u64) -> bool {
        self.dismissed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(review_id)
    }
}

/// An organization and its teams, shared by every control of one event.
pub struct Organization {
    pub login: String,
    platform: Arc<dyn Platform>,
    teams: OnceCell<Vec<Arc<Team>>>,
}

impl Organization {
    pub fn new(login: impl Into<String>, platform: Arc<dyn Platform>) -> Self {
        Self {
            login: login.into(),
            platform,
            teams: OnceCell::new(),
        }
    }

    pub async fn teams(&self) -> Result<&[Arc<Team>]> {
        self.teams
            .get_or_try_init(|| async {
                let teams = self.platform.list_org_teams(&self.login).await?;
                Ok::<_, GateError>(teams
                    .into_iter()
                    .map(|info| Arc::new(Team::new(info, self.platform.clone())))
                    .collect())
            })
            .await
            .map(Vec::as_slice)
    }

    /// Look a team up by slug (case-insensitive).
    pub async fn team(&self, slug: &str) -> Result<Option<Arc<Team>>> {
        Ok(self
            .teams()
            .await?
            .iter()
            .find(|t| t.info.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }
}

/// A team whose member list is fetched on first use.
pub struct Team {
    pub info: TeamInfo,
    platform: Arc<dyn Platform>,
    members: OnceCell<BTreeSet<String>>,
}

impl Team {
    pub fn new(info: TeamInfo, platform: Arc<dyn Platform>) -> Self {
        Self {
            info,
            platform,
            members: OnceCell::new(),
        }
    }

    pub async fn members(&self) -> Result<&BTreeSet<String>> {
        self.members
            .get_or_try_init(|| async {
                let logins = self.platform.list_team_members(self.info.id).await?;
                Ok::<_, GateError>(logins.into_iter().collect())
            })
            .await
    }
}
