//! Path selectors for control rules.
//!
//! A selector is an ordered list of gitignore-style patterns. A leading `!`
//! negates a pattern, and the last pattern that matches a path decides
//! whether the path is selected. Patterns are compiled once when a rule file
//! is loaded, then reused for every file of the pull request.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// A compiled, ordered list of gitignore-style patterns.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    rules: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    negated: bool,
    globs: GlobSet,
}

impl PathMatcher {
    /// Compile a pattern list. Blank lines and `#` comments are skipped.
    /// Returns an error if any pattern is not a valid glob.
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut rules = Vec::with_capacity(patterns.len());
        for raw in patterns {
            if let Some(rule) = compile_pattern(raw)? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// Returns true if the last pattern matching `path` is a positive one.
    /// An empty pattern list selects every path.
    pub fn matches(&self, path: &str) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let relative = path.trim_start_matches('/');
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.globs.is_match(relative))
            .is_some_and(|rule| !rule.negated)
    }

    /// Returns true if at least one of `paths` is selected.
    pub fn matches_any<'a, I>(&self, paths: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        paths.into_iter().any(|p| self.matches(p))
    }

    /// The raw patterns this matcher was built from (comments excluded).
    pub fn pattern_strings(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.source.as_str()).collect()
    }

    /// Number of effective patterns, not counting blanks and comments.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when every pattern is a negation, so nothing can ever be selected.
    pub fn is_negation_only(&self) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|r| r.negated)
    }
}

/// One-shot form of [`PathMatcher::matches`].
pub fn matches(patterns: &[String], path: &str) -> Result<bool, globset::Error> {
    Ok(PathMatcher::new(patterns)?.matches(path))
}

/// Translate one gitignore line into the globs that implement it.
///
/// `README.md` has no inner slash, so it matches at any depth.
/// `/lib/*.rb` and `lib/*.rb` are anchored at the repository root.
/// `specs/` only matches directories, i.e. everything below `specs`.
/// A pattern naming a directory also selects the files inside it.
fn compile_pattern(raw: &str) -> Result<Option<CompiledPattern>, globset::Error> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (negated, body) = match line.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let body = body
        .strip_prefix("\\!")
        .map(|rest| format!("!{}", rest))
        .or_else(|| body.strip_prefix("\\#").map(|rest| format!("#{}", rest)))
        .unwrap_or_else(|| body.to_string());

    let dir_only = body.ends_with('/');
    let trimmed = body.trim_end_matches('/');
    let anchored = trimmed.starts_with('/') || trimmed.contains('/');
    let trimmed = trimmed.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }

    let base = if anchored {
        trimmed.to_string()
    } else {
        format!("**/{}", trimmed)
    };

    let mut builder = GlobSetBuilder::new();
    if !dir_only {
        builder.add(build_glob(&base)?);
    }
    builder.add(build_glob(&format!("{}/**", base))?);

    Ok(Some(CompiledPattern {
        source: line.to_string(),
        negated,
        globs: builder.build()?,
    }))
}

fn build_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Normalize a repository-relative file name into the leading-slash form
/// selectors are evaluated against: `lib/x.rb` becomes `/lib/x.rb`.
pub fn normalize_path(path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    let path = path.replace("//", "/");
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}
