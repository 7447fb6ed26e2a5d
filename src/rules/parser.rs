//! YAML rule-file parser for gatectl.
//!
//! The rule file is a list of single-key mappings. The key is an identifier
//! for the control; the value holds its settings:
//!
//! ```yaml
//! - code_review:
//!     name: Code Review
//!     users: [cboyle, jperalta]
//!     teams: [nine-nine]
//!     count: 2
//! - migrations:
//!     name: DB Migrations
//!     teams: [dba]
//!     paths: ["db/", "*.sql"]
//!     dismissal_paths: ["db/", "!db/seeds.rb"]
//!     dismiss: true
//! ```
//!
//! Every field except `name` is optional. `paths` defaults to `"*"`,
//! `dismissal_paths` defaults to `paths`, `count` to 1 and `dismiss` to true.
//! Unknown fields are rejected rather than ignored.

use crate::rules::types::*;
use crate::utils::paths::PathMatcher;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::Path;

/// A control as it appears in the YAML file, before defaults are applied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawControl {
    name: String,
    #[serde(default)]
    users: Option<Vec<String>>,
    #[serde(default)]
    teams: Option<Vec<String>>,
    #[serde(default)]
    paths: Option<StringOrVec>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    dismissal_paths: Option<StringOrVec>,
    #[serde(default)]
    dismiss: Option<bool>,
}

/// Allows selector fields to be either a single pattern or a list:
/// ```yaml
/// paths: "*"                     # single pattern
/// paths: ["*", "!README.md"]     # list
/// ```
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::Single(s) => vec![s],
            StringOrVec::Multiple(v) => v,
        }
    }
}

/// Parse a rule file from disk.
pub fn parse_rules_file(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file: {}", path.display()))?;
    parse_rules_str(&content)
        .with_context(|| format!("Failed to parse rule file: {}", path.display()))
}

/// Parse rule-file YAML into a [`RuleSet`]. An empty document has no controls.
pub fn parse_rules_str(yaml: &str) -> Result<RuleSet> {
    let document: Value = serde_yaml::from_str(yaml).context("Invalid YAML syntax in rule file")?;

    let entries = match document {
        Value::Null => return Ok(RuleSet::default()),
        Value::Sequence(entries) => entries,
        _ => bail!("Rule file must be a list of controls"),
    };

    let mut controls = Vec::with_capacity(entries.len());
    let mut seen_slugs = HashSet::new();
    for (i, entry) in entries.into_iter().enumerate() {
        let spec = convert_entry(entry)
            .with_context(|| format!("Invalid control at position {} (0-indexed)", i))?;
        if !seen_slugs.insert(spec.slug()) {
            bail!(
                "Control '{}' at position {} reuses the status context '{}' of an earlier control",
                spec.name,
                i,
                spec.slug()
            );
        }
        controls.push(spec);
    }

    Ok(RuleSet { controls })
}

/// Convert one `- key: {...}` entry into a typed control.
fn convert_entry(entry: Value) -> Result<ControlSpec> {
    let mapping = match entry {
        Value::Mapping(mapping) => mapping,
        _ => bail!("Each control must be a mapping of the form `- key: {{ name: ... }}`"),
    };
    if mapping.len() != 1 {
        bail!(
            "Each control must have exactly one key, found {}",
            mapping.len()
        );
    }
    let (key, body) = mapping
        .into_iter()
        .next()
        .context("Control mapping is empty")?;
    let key = match key {
        Value::String(s) => s,
        other => bail!("Control key must be a string, found {:?}", other),
    };

    let raw: RawControl = serde_yaml::from_value(body)
        .with_context(|| format!("Control '{}' has invalid settings", key))?;
    convert_control(key, raw)
}

fn convert_control(key: String, raw: RawControl) -> Result<ControlSpec> {
    if raw.name.trim().is_empty() {
        bail!("Control '{}' must have a non-empty 'name'", key);
    }

    let count = raw.count.unwrap_or(1);
    if count == 0 {
        bail!("Control '{}': 'count' must be at least 1", key);
    }

    let paths = raw
        .paths
        .map(StringOrVec::into_vec)
        .unwrap_or_else(|| vec![SELECT_ALL.to_string()]);
    let dismissal_paths = raw
        .dismissal_paths
        .map(StringOrVec::into_vec)
        .unwrap_or_else(|| paths.clone());

    // Compile once here so a bad pattern fails the whole file up front
    for (field, patterns) in [("paths", &paths), ("dismissal_paths", &dismissal_paths)] {
        let matcher = PathMatcher::new(patterns)
            .with_context(|| format!("Control '{}': invalid pattern in '{}'", key, field))?;
        // Blank lines and comments alone would otherwise select every file
        if !patterns.is_empty() && matcher.is_empty() {
            bail!("Control '{}': '{}' has no patterns, only blanks or comments", key, field);
        }
    }

    Ok(ControlSpec {
        key,
        name: raw.name,
        users: raw.users.unwrap_or_default(),
        teams: raw.teams.unwrap_or_default(),
        paths,
        count,
        dismissal_paths,
        dismiss: raw.dismiss.unwrap_or(true),
    })
}
