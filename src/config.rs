//! Runtime settings for `gatectl serve`.
//!
//! Every setting can come from a flag or a `GATECTL_*` environment variable.

use crate::github::GitHubClientConfig;
use crate::review::evaluator::{DEFAULT_RULES_PATH, DEFAULT_STATUS_PREFIX};
use anyhow::{bail, Result};
use clap::Args;
use std::net::SocketAddr;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Token used for the GitHub API
    #[arg(long, env = "GATECTL_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Secret shared with the GitHub webhook
    #[arg(long, env = "GATECTL_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Address to listen on
    #[arg(long, env = "GATECTL_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// GitHub API root (GitHub Enterprise: https://<host>/api/v3)
    #[arg(long, env = "GATECTL_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Rule file location inside each repository
    #[arg(long, env = "GATECTL_RULES_PATH", default_value = DEFAULT_RULES_PATH)]
    pub rules_path: String,

    /// Prefix of every posted status context
    #[arg(long, env = "GATECTL_STATUS_PREFIX", default_value = DEFAULT_STATUS_PREFIX)]
    pub status_prefix: String,

    /// Timeout for each GitHub API call, in seconds
    #[arg(long, env = "GATECTL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl Settings {
    /// Reject values that would only fail later, per request.
    pub fn validate(&self) -> Result<()> {
        if self.github_token.trim().is_empty() {
            bail!("GATECTL_GITHUB_TOKEN is empty");
        }
        if self.webhook_secret.is_empty() {
            bail!("GATECTL_WEBHOOK_SECRET is empty; deliveries could not be verified");
        }
        if self.timeout_secs == 0 {
            bail!("timeout must be at least 1 second");
        }
        if self.status_prefix.trim().is_empty() {
            bail!("status prefix is empty");
        }
        Ok(())
    }

    pub fn client_config(&self) -> GitHubClientConfig {
        GitHubClientConfig {
            base_url: self.api_url.clone(),
            token: self.github_token.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["gatectl"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().settings
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&["--github-token", "t", "--webhook-secret", "s"]);
        assert_eq!(settings.bind, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.rules_path, ".gatectl.yml");
        assert_eq!(settings.status_prefix, "gatectl");
        assert_eq!(settings.timeout_secs, 10);
        assert!(settings.validate().is_ok());

        let client = settings.client_config();
        assert_eq!(client.base_url, "https://api.github.com");
        assert_eq!(client.token, "t");
    }

    #[test]
    fn test_validation() {
        let settings = parse(&["--github-token", "t", "--webhook-secret", "", "--timeout-secs", "3"]);
        assert!(settings.validate().is_err());

        let settings = parse(&["--github-token", "t", "--webhook-secret", "s", "--timeout-secs", "0"]);
        assert!(settings.validate().is_err());
    }
}
