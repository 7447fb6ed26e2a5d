//! Core types for gatectl rule files.
//!
//! A rule file is a list of controls. Each control names who may approve,
//! how many approvals are needed, and which paths make the control apply.

use serde::{Deserialize, Serialize};

/// The default selector: every file in the pull request.
pub const SELECT_ALL: &str = "*";

/// One approval policy as written in the rule file, with defaults resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSpec {
    /// The mapping key the control was declared under (e.g. `code_review`).
    pub key: String,

    /// Human-readable name; also the source of the status context slug.
    pub name: String,

    /// Logins allowed to approve.
    pub users: Vec<String>,

    /// Team slugs whose members are allowed to approve.
    pub teams: Vec<String>,

    /// Selector deciding whether the control applies to the pull request.
    pub paths: Vec<String>,

    /// Number of authorized approvals required.
    pub count: usize,

    /// Selector deciding whether new commits revoke approvals.
    pub dismissal_paths: Vec<String>,

    /// Whether stale approvals are dismissed at all.
    pub dismiss: bool,
}

impl ControlSpec {
    /// A control with every optional field at its default.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: slugify(&name).replace('-', "_"),
            name,
            users: Vec::new(),
            teams: Vec::new(),
            paths: vec![SELECT_ALL.to_string()],
            count: 1,
            dismissal_paths: vec![SELECT_ALL.to_string()],
            dismiss: true,
        }
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_teams<I, S>(mut self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teams = teams.into_iter().map(Into::into).collect();
        self
    }

    /// Set the activation selector. The dismissal selector follows it,
    /// as it does when `dismissal_paths` is omitted from the file.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self.dismissal_paths = self.paths.clone();
        self
    }

    pub fn with_dismissal_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dismissal_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_dismiss(mut self, dismiss: bool) -> Self {
        self.dismiss = dismiss;
        self
    }

    /// The slug used in the status context, e.g. `code-review`.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// The full status context, e.g. `gatectl/code-review`.
    pub fn status_context(&self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.slug())
    }

    /// Short description for logs and `gatectl check` output.
    pub fn describe(&self) -> String {
        let mut desc = format!("{} (requires {})", self.name, self.count);
        if !self.users.is_empty() {
            desc.push_str(&format!(" users:{}", self.users.join(",")));
        }
        if !self.teams.is_empty() {
            desc.push_str(&format!(" teams:{}", self.teams.join(",")));
        }
        desc.push_str(&format!(" paths:{}", self.paths.join(",")));
        if self.dismissal_paths != self.paths {
            desc.push_str(&format!(" dismissal_paths:{}", self.dismissal_paths.join(",")));
        }
        if !self.dismiss {
            desc.push_str(" dismiss:off");
        }
        desc
    }
}

/// A parsed rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub controls: Vec<ControlSpec>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

/// Turn a control name into a status-context slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
