//! Rule-file linter. Flags controls that can never do what their author
//! probably intended.
//!
//! `gatectl check` runs this after a successful parse. Nothing here is a hard
//! error: the engine will happily evaluate every control, but a control that
//! can never be satisfied blocks every pull request it applies to.

use crate::rules::types::*;
use crate::utils::paths::PathMatcher;
use colored::Colorize;

/// A lint warning: something the user should know about their rule file.
#[derive(Debug)]
pub struct LintWarning {
    pub severity: Severity,
    pub control: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Severity {
    /// The control can never pass or never apply
    Warning,
    /// Worth knowing, but possibly intended
    Info,
}

impl LintWarning {
    fn warn_with_fix(control: &ControlSpec, msg: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            control: control.name.clone(),
            message: msg.into(),
            suggestion: Some(fix.into()),
        }
    }

    fn info(control: &ControlSpec, msg: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            control: control.name.clone(),
            message: msg.into(),
            suggestion: None,
        }
    }

    /// Format for terminal output.
    pub fn display(&self) -> String {
        let icon = match self.severity {
            Severity::Warning => "⚠".yellow().to_string(),
            Severity::Info => "ℹ".blue().to_string(),
        };
        let mut out = format!("  {} {}: {}", icon, self.control.bold(), self.message);
        if let Some(ref suggestion) = self.suggestion {
            out.push_str(&format!("\n    {}: {}", "Fix".green(), suggestion));
        }
        out
    }
}

/// Lint every control in a rule set.
pub fn lint_rules(rules: &RuleSet) -> Vec<LintWarning> {
    let mut warnings = Vec::new();

    for control in &rules.controls {
        check_has_approvers(control, &mut warnings);
        check_count_reachable(control, &mut warnings);
        check_paths_select_something(control, &mut warnings);
        check_dismissal(control, &mut warnings);
    }

    warnings
}

/// Check: does anyone at all count as an approver?
fn check_has_approvers(control: &ControlSpec, warnings: &mut Vec<LintWarning>) {
    if control.users.is_empty() && control.teams.is_empty() {
        warnings.push(LintWarning::warn_with_fix(
            control,
            "No users or teams can approve, so this control stays pending forever once active",
            "Add `users: [...]` or `teams: [...]`",
        ));
    }
}

/// Check: with users only, can `count` ever be reached?
fn check_count_reachable(control: &ControlSpec, warnings: &mut Vec<LintWarning>) {
    if !control.teams.is_empty() || control.users.is_empty() {
        return;
    }
    let mut distinct = control.users.clone();
    distinct.sort();
    distinct.dedup();
    if control.count > distinct.len() {
        warnings.push(LintWarning::warn_with_fix(
            control,
            format!(
                "Requires {} approvals but only {} user(s) are authorized",
                control.count,
                distinct.len()
            ),
            format!("Lower `count` to {} or add more users", distinct.len()),
        ));
    }
}

/// Check: a selector made only of negations never selects anything.
fn check_paths_select_something(control: &ControlSpec, warnings: &mut Vec<LintWarning>) {
    let never_active = PathMatcher::new(&control.paths)
        .map(|m| m.is_negation_only())
        .unwrap_or(false);
    if never_active {
        warnings.push(LintWarning::warn_with_fix(
            control,
            "`paths` only contains negations, so the control never applies",
            format!("Start the list with \"{}\" before the exclusions", SELECT_ALL),
        ));
    }

    let never_dismisses = PathMatcher::new(&control.dismissal_paths)
        .map(|m| m.is_negation_only())
        .unwrap_or(false);
    if control.dismiss && never_dismisses {
        warnings.push(LintWarning::warn_with_fix(
            control,
            "`dismissal_paths` only contains negations, so approvals are never dismissed",
            format!("Start the list with \"{}\" before the exclusions", SELECT_ALL),
        ));
    }
}

/// Check: approvals that are never revoked survive any later push.
fn check_dismissal(control: &ControlSpec, warnings: &mut Vec<LintWarning>) {
    if !control.dismiss {
        warnings.push(LintWarning::info(
            control,
            "`dismiss: false`: approvals stay valid after new commits",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lint_one(spec: ControlSpec) -> Vec<LintWarning> {
        lint_rules(&RuleSet {
            controls: vec![spec],
        })
    }

    #[test]
    fn test_clean_control() {
        let spec = ControlSpec::new("Code Review").with_users(["a", "b"]);
        assert!(lint_one(spec).is_empty());
    }

    #[test]
    fn test_no_approvers() {
        let warnings = lint_one(ControlSpec::new("Code Review"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert!(warnings[0].message.contains("No users or teams"));
    }

    #[test]
    fn test_unreachable_count() {
        let spec = ControlSpec::new("Code Review")
            .with_users(["a", "a"])
            .with_count(2);
        let warnings = lint_one(spec);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("only 1 user"));
    }

    #[test]
    fn test_count_not_checked_with_teams() {
        let spec = ControlSpec::new("Code Review")
            .with_users(["a"])
            .with_teams(["core"])
            .with_count(3);
        assert!(lint_one(spec).is_empty());
    }

    #[test]
    fn test_negation_only_paths() {
        let spec = ControlSpec::new("Code Review")
            .with_users(["a"])
            .with_paths(["!README.md"]);
        let warnings = lint_one(spec);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_dismiss_disabled_is_info() {
        let spec = ControlSpec::new("Code Review")
            .with_users(["a"])
            .with_dismiss(false);
        let warnings = lint_one(spec);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Info);
    }
}
