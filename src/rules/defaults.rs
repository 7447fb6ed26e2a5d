//! Starter rule files that ship with gatectl.
//!
//! - `basic`: one code-review control over the whole repository
//! - `strict`: two reviewers for code, plus a team-owned control for migrations

/// A single code-review control. The usual starting point.
pub const BASIC_YAML: &str = r#"# gatectl rules: basic
# One approval from any listed reviewer is required for every pull request.
# Approvals are dismissed when new commits change anything but the README.

- code_review:
    name: Code Review
    users: []          # logins allowed to approve
    teams: []          # team slugs whose members may approve
    count: 1
    paths: "*"
    dismissal_paths: ["*", "!README.md"]
"#;

/// Two reviewers for code, and a separate database-owner sign-off whenever
/// migrations change.
pub const STRICT_YAML: &str = r#"# gatectl rules: strict
# Two approvals for any code change; documentation-only pull requests
# are not gated. Migrations additionally need a sign-off from the dba team.

- code_review:
    name: Code Review
    teams: [engineering]
    count: 2
    paths: ["*", "!docs/", "!*.md"]

- migrations:
    name: DB Migrations
    teams: [dba]
    count: 1
    paths: ["db/migrate/", "*.sql"]
    dismiss: true
"#;

/// Get the YAML content for a named template.
pub fn get_template(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "basic" | "default" => Some(BASIC_YAML),
        "strict" => Some(STRICT_YAML),
        _ => None,
    }
}

/// List all available template names.
pub fn available_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        ("basic", "One approval from a listed reviewer for every pull request"),
        (
            "strict",
            "Two approvals for code, plus a dba sign-off for migrations",
        ),
    ]
}
