//! Inbound webhook payloads.
//!
//! `pull_request` and `pull_request_review` deliveries share the fields the
//! engine needs: the action, the pull request, the repository and, for
//! organization-owned repositories, the organization.

use crate::error::GateError;
use crate::review::PullRequest;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub action: String,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
    #[serde(default)]
    pub organization: Option<AccountPayload>,
    /// Present on `pull_request_review` deliveries.
    #[serde(default)]
    pub review: Option<ReviewPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub head: HeadPayload,
    pub base: BasePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadPayload {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasePayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<AccountPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountPayload {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPayload {
    pub id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub user: Option<AccountPayload>,
}

impl EventPayload {
    /// Organization used for team lookups: the delivery's organization,
    /// else the repository owner, else the `owner` part of `full_name`.
    pub fn org_login(&self) -> Option<String> {
        self.organization
            .as_ref()
            .or(self.repository.owner.as_ref())
            .map(|a| a.login.clone())
            .or_else(|| {
                self.repository
                    .full_name
                    .split_once('/')
                    .map(|(owner, _)| owner.to_string())
            })
    }

    pub fn into_pull_request(self) -> Result<PullRequest, GateError> {
        let org = self
            .org_login()
            .ok_or_else(|| GateError::InvalidPayload(format!("cannot tell owner of {:?}", self.repository.full_name)))?;
        if self.pull_request.head.sha.is_empty() {
            return Err(GateError::InvalidPayload("pull_request.head.sha is empty".to_string()));
        }
        Ok(PullRequest {
            repo: self.repository.full_name,
            org,
            number: self.pull_request.number,
            base_branch: self.pull_request.base.git_ref,
            head_sha: self.pull_request.head.sha,
            action: self.action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> serde_json::Value {
        json!({
            "action": "synchronize",
            "number": 12,
            "pull_request": {
                "number": 12,
                "title": "Fix the vending machine",
                "head": { "sha": "abc123", "ref": "feature" },
                "base": { "sha": "def456", "ref": "main" }
            },
            "repository": {
                "full_name": "nypd/precinct",
                "owner": { "login": "nypd" }
            },
            "organization": { "login": "nypd-org" },
            "sender": { "login": "jperalta" }
        })
    }

    #[test]
    fn test_parse_pull_request_event() {
        let payload: EventPayload = serde_json::from_value(body()).unwrap();
        let pr = payload.into_pull_request().unwrap();
        assert_eq!(pr.repo, "nypd/precinct");
        assert_eq!(pr.org, "nypd-org");
        assert_eq!(pr.number, 12);
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.head_sha, "abc123");
        assert_eq!(pr.action, "synchronize");
    }

    #[test]
    fn test_org_falls_back_to_owner() {
        let mut value = body();
        value.as_object_mut().unwrap().remove("organization");
        let payload: EventPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.org_login().as_deref(), Some("nypd"));

        let mut value = body();
        value.as_object_mut().unwrap().remove("organization");
        value["repository"].as_object_mut().unwrap().remove("owner");
        let payload: EventPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.org_login().as_deref(), Some("nypd"));
    }

    #[test]
    fn test_review_fields() {
        let mut value = body();
        value["action"] = json!("submitted");
        value["review"] = json!({ "id": 77, "state": "approved", "user": { "login": "holt" } });
        let payload: EventPayload = serde_json::from_value(value).unwrap();
        let review = payload.review.unwrap();
        assert_eq!(review.id, 77);
        assert_eq!(review.user.unwrap().login, "holt");
    }

    #[test]
    fn test_missing_pull_request_rejected() {
        let mut value = body();
        value.as_object_mut().unwrap().remove("pull_request");
        assert!(serde_json::from_value::<EventPayload>(value).is_err());
    }
}
