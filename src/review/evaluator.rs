//! Runs a repository's controls against one pull request event.
//!
//! Order per event:
//! 1. skip pushes that only merged the base branch in,
//! 2. load the rule file from the base branch (absent means nothing to do),
//! 3. dismiss stale approvals for every control,
//! 4. evaluate every control against the post-dismissal approvals,
//! 5. post one status per control.
//!
//! Any error aborts the event before a status is posted.

use crate::error::{GateError, Result};
use crate::github::{Platform, StatusReport};
use crate::review::classifier;
use crate::review::context::{PullRequest, PullRequestContext};
use crate::review::control::Control;
use crate::rules::{parse_rules_str, RuleSet};
use futures_util::future::try_join_all;
use std::sync::Arc;

pub const DEFAULT_RULES_PATH: &str = ".gatectl.yml";
pub const DEFAULT_STATUS_PREFIX: &str = "gatectl";

/// What happened to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The push only merged the base branch in; nothing was touched.
    SkippedBaseMerge,
    /// The base branch has no rule file.
    NoRuleFile,
    Evaluated {
        dismissed: usize,
        reports: Vec<StatusReport>,
    },
}

/// The controls of one rule file, bound to one context.
pub struct ControlSet {
    controls: Vec<Control>,
}

impl ControlSet {
    pub fn new(rules: &RuleSet, context: Arc<PullRequestContext>, status_prefix: &str) -> Result<Self> {
        let controls = rules
            .controls
            .iter()
            .map(|spec| Control::new(spec.clone(), context.clone(), status_prefix))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { controls })
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Dismissal pass over every control, concurrently.
    pub async fn dismiss_all(&self) -> Result<usize> {
        let counts = try_join_all(self.controls.iter().map(Control::dismiss_reviews)).await?;
        Ok(counts.into_iter().sum())
    }

    /// Evaluation pass over every control, concurrently. Reports come back
    /// in rule-file order.
    pub async fn evaluate_all(&self) -> Result<Vec<StatusReport>> {
        try_join_all(self.controls.iter().map(Control::evaluate)).await
    }

    pub fn rebind(&self, context: Arc<PullRequestContext>) -> Self {
        Self {
            controls: self.controls.iter().map(|c| c.rebind(context.clone())).collect(),
        }
    }
}

/// Loads rules and runs controls for incoming events.
pub struct Evaluator {
    platform: Arc<dyn Platform>,
    rules_path: String,
    status_prefix: String,
}

impl Evaluator {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            rules_path: DEFAULT_RULES_PATH.to_string(),
            status_prefix: DEFAULT_STATUS_PREFIX.to_string(),
        }
    }

    pub fn with_rules_path(mut self, path: impl Into<String>) -> Self {
        self.rules_path = path.into();
        self
    }

    pub fn with_status_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.status_prefix = prefix.into();
        self
    }

    pub fn rules_path(&self) -> &str {
        &self.rules_path
    }

    /// Build a fresh context for `pr` and run it.
    pub async fn run(&self, pr: PullRequest) -> Result<ExecutionOutcome> {
        let context = Arc::new(PullRequestContext::new(pr, self.platform.clone()));
        self.execute(context).await
    }

    /// Fetch and parse the rule file at the base branch.
    /// `Ok(None)` when the file does not exist there.
    pub async fn load_rules(&self, pr: &PullRequest) -> Result<Option<RuleSet>> {
        let Some(bytes) = self
            .platform
            .fetch_file_at_ref(&pr.repo, &self.rules_path, &pr.base_branch)
            .await?
        else {
            return Ok(None);
        };

        let yaml = String::from_utf8(bytes).map_err(|e| {
            GateError::ConfigInvalid(anyhow::Error::new(e).context(format!("{} is not UTF-8", self.rules_path)))
        })?;
        parse_rules_str(&yaml)
            .map(Some)
            .map_err(|e| GateError::ConfigInvalid(e.context(format!("{}@{}", self.rules_path, pr.base_branch))))
    }

    pub async fn execute(&self, context: Arc<PullRequestContext>) -> Result<ExecutionOutcome> {
        let pr = context.pr.clone();

        if classifier::is_base_merge_update(context.platform(), &pr).await? {
            tracing::info!(repo = %pr.repo, pr = pr.number, sha = %pr.head_sha, "base branch merged in, skipping");
            return Ok(ExecutionOutcome::SkippedBaseMerge);
        }

        let Some(rules) = self.load_rules(&pr).await? else {
            tracing::debug!(repo = %pr.repo, path = %self.rules_path, git_ref = %pr.base_branch, "no rule file");
            return Ok(ExecutionOutcome::NoRuleFile);
        };

        let controls = ControlSet::new(&rules, context.clone(), &self.status_prefix)?;
        tracing::info!(
            repo = %pr.repo,
            pr = pr.number,
            action = %pr.action,
            controls = controls.len(),
            "executing controls"
        );

        let dismissed = controls.dismiss_all().await?;
        let controls = if dismissed > 0 {
            controls.rebind(Arc::new(context.reload()))
        } else {
            controls
        };

        let reports = controls.evaluate_all().await?;
        for report in &reports {
            tracing::debug!(
                context = %report.context,
                state = %report.state,
                description = %report.description,
                "posting status"
            );
            self.platform.post_status(&pr.repo, &pr.head_sha, report).await?;
        }

        Ok(ExecutionOutcome::Evaluated { dismissed, reports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::InMemoryPlatform;

    const REPO: &str = "nypd/precinct";

    fn pr() -> PullRequest {
        PullRequest {
            repo: REPO.to_string(),
            org: "nypd".to_string(),
            number: 1,
            base_branch: "main".to_string(),
            head_sha: "c1".to_string(),
            action: "opened".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_rule_file_is_silent() {
        let platform = Arc::new(InMemoryPlatform::new());
        let evaluator = Evaluator::new(platform.clone());
        assert_eq!(evaluator.run(pr()).await.unwrap(), ExecutionOutcome::NoRuleFile);
        assert!(platform.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_rule_file_aborts() {
        let platform = Arc::new(InMemoryPlatform::new().with_file(
            REPO,
            ".gatectl.yml",
            "main",
            "- review:\n    name: Review\n    count: 0\n",
        ));
        let evaluator = Evaluator::new(platform.clone());
        let err = evaluator.run(pr()).await.unwrap_err();
        assert!(err.is_config_invalid());
        assert!(platform.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_custom_rules_path_and_prefix() {
        let platform = Arc::new(
            InMemoryPlatform::new()
                .with_file(REPO, ".github/approvals.yml", "main", "- review:\n    name: Review\n")
                .with_changed_files(REPO, 1, &["x.rb"]),
        );
        let evaluator = Evaluator::new(platform.clone())
            .with_rules_path(".github/approvals.yml")
            .with_status_prefix("approvals");
        evaluator.run(pr()).await.unwrap();
        assert_eq!(platform.statuses()[0].report.context, "approvals/review");
    }

    #[tokio::test]
    async fn test_empty_rule_file_posts_nothing() {
        let platform = Arc::new(InMemoryPlatform::new().with_file(REPO, ".gatectl.yml", "main", ""));
        let outcome = Evaluator::new(platform.clone()).run(pr()).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Evaluated { dismissed: 0, reports: vec![] }
        );
    }
}
