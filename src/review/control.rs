//! A control bound to one pull request.
//!
//! Each control decides, for the current event:
//! - whether it applies at all (activation paths),
//! - whether new commits revoke existing approvals (dismissal paths),
//! - whether enough authorized people have approved.
//!
//! Path selectors are compiled once when the control is built.

use crate::error::{GateError, Result};
use crate::github::{StatusReport, StatusState};
use crate::review::context::PullRequestContext;
use crate::rules::ControlSpec;
use crate::utils::paths::PathMatcher;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// GitHub rejects status descriptions longer than this.
pub const MAX_DESCRIPTION_LEN: usize = 140;

pub const NOT_REQUIRED: &str = "Not Required";

pub struct Control {
    spec: ControlSpec,
    context: Arc<PullRequestContext>,
    status_prefix: String,
    activation: PathMatcher,
    dismissal: PathMatcher,
    authorized: OnceCell<BTreeSet<String>>,
}

impl Control {
    pub fn new(spec: ControlSpec, context: Arc<PullRequestContext>, status_prefix: &str) -> Result<Self> {
        let activation = compile(&spec, &spec.paths)?;
        let dismissal = compile(&spec, &spec.dismissal_paths)?;
        Ok(Self {
            spec,
            context,
            status_prefix: status_prefix.to_string(),
            activation,
            dismissal,
            authorized: OnceCell::new(),
        })
    }

    /// The same control bound to another context, keeping compiled selectors.
    pub fn rebind(&self, context: Arc<PullRequestContext>) -> Self {
        Self {
            spec: self.spec.clone(),
            context,
            status_prefix: self.status_prefix.clone(),
            activation: self.activation.clone(),
            dismissal: self.dismissal.clone(),
            authorized: OnceCell::new(),
        }
    }

    pub fn spec(&self) -> &ControlSpec {
        &self.spec
    }

    pub fn status_context(&self) -> String {
        self.spec.status_context(&self.status_prefix)
    }

    /// Listed users plus members of listed teams, as lowercase logins. Teams
    /// are only resolved when the control names some.
    pub async fn authorized_users(&self) -> Result<&BTreeSet<String>> {
        self.authorized
            .get_or_try_init(|| async {
                let mut users: BTreeSet<String> = self.spec.users.iter().map(|u| login_key(u)).collect();
                if self.spec.teams.is_empty() {
                    return Ok::<_, GateError>(users);
                }

                let org = self.context.organization();
                for slug in &self.spec.teams {
                    match org.team(slug).await? {
                        Some(team) => users.extend(team.members().await?.iter().map(|m| login_key(m))),
                        None => tracing::warn!(
                            control = %self.spec.name,
                            org = %org.login,
                            team = %slug,
                            "team not found, it authorizes nobody"
                        ),
                    }
                }
                Ok(users)
            })
            .await
    }

    /// True when any file of the pull request is selected by `paths`.
    pub async fn is_active(&self) -> Result<bool> {
        let files = self.context.files().await?;
        Ok(self.activation.matches_any(files))
    }

    /// True when dismissal is enabled and a substantive new commit touched a
    /// file selected by `dismissal_paths`.
    pub async fn is_dismissable(&self) -> Result<bool> {
        if !self.spec.dismiss {
            return Ok(false);
        }
        let changed = self.context.changed_files().await?;
        Ok(self.dismissal.matches_any(changed))
    }

    /// Revoke every current approval from an authorized user when new
    /// changes touch this control's dismissal paths. Returns the number of
    /// reviews dismissed.
    pub async fn dismiss_reviews(&self) -> Result<usize> {
        if !self.spec.dismiss {
            return Ok(0);
        }

        // Classifying commits costs a request each, so it runs last
        let authorized = self.authorized_users().await?;
        let stale: Vec<_> = self
            .context
            .approved_reviews()
            .await?
            .into_iter()
            .filter(|r| authorized.contains(&login_key(&r.login)))
            .collect();
        if stale.is_empty() || !self.is_dismissable().await? {
            return Ok(0);
        }

        let pr = &self.context.pr;
        let reason = format!(
            "New changes require another review for {} ({})",
            self.spec.name,
            self.status_context()
        );
        let mut dismissed = 0;
        for review in stale {
            if !self.context.claim_dismissal(review.id) {
                continue;
            }
            tracing::info!(
                repo = %pr.repo,
                pr = pr.number,
                control = %self.spec.name,
                reviewer = %review.login,
                review_id = review.id,
                "dismissing stale approval"
            );
            self.context
                .platform()
                .dismiss_review(&pr.repo, pr.number, review.id, &reason)
                .await?;
            dismissed += 1;
        }
        Ok(dismissed)
    }

    /// Compute this control's commit status.
    pub async fn evaluate(&self) -> Result<StatusReport> {
        if !self.is_active().await? {
            return Ok(self.report(StatusState::Success, NOT_REQUIRED.to_string()));
        }

        let authorized = self.authorized_users().await?;
        let approvers: Vec<&str> = self
            .context
            .approved_reviewers()
            .await?
            .iter()
            .filter(|login| authorized.contains(&login_key(login)))
            .map(String::as_str)
            .collect();

        let state = if approvers.len() >= self.spec.count {
            StatusState::Success
        } else {
            StatusState::Pending
        };
        Ok(self.report(state, describe(self.spec.count, &approvers)))
    }

    fn report(&self, state: StatusState, description: String) -> StatusReport {
        StatusReport {
            state,
            context: self.status_context(),
            description,
        }
    }
}

/// GitHub logins are case-insensitive.
fn login_key(login: &str) -> String {
    login.to_ascii_lowercase()
}

fn compile(spec: &ControlSpec, patterns: &[String]) -> Result<PathMatcher> {
    PathMatcher::new(patterns).map_err(|e| {
        GateError::ConfigInvalid(anyhow::Error::new(e).context(format!("control {:?}", spec.name)))
    })
}

/// `Required: 2 | Approved by: amy, rosa`, cut to GitHub's limit.
pub fn describe(count: usize, approvers: &[&str]) -> String {
    let mut description = format!("Required: {}", count);
    if !approvers.is_empty() {
        description.push_str(" | Approved by: ");
        description.push_str(&approvers.join(", "));
    }
    truncate(description, MAX_DESCRIPTION_LEN)
}

fn truncate(s: String, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s;
    }
    let mut cut: String = s.chars().take(max_chars - 1).collect();
    cut.push('…');
    cut
}
