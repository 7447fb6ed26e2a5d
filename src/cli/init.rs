//! `gatectl init`: write a starter rule file.
//!
//! Creates `.gatectl.yml` in the current directory from one of the bundled
//! templates. The file is meant to be edited, then committed to the default
//! branch, which is where gatectl reads it from.

use crate::rules::{defaults, parse_rules_str};
use crate::review::evaluator::DEFAULT_RULES_PATH;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Run the `gatectl init` command. Returns the path written.
pub fn run_init(template: &str, output_path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let output_file = match output_path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()
            .context("Failed to get current directory")?
            .join(DEFAULT_RULES_PATH),
    };

    if output_file.exists() && !force {
        bail!(
            "A rule file already exists at {}. Use --force to overwrite it.",
            output_file.display()
        );
    }

    let yaml_content = defaults::get_template(template).ok_or_else(|| {
        let available: Vec<String> = defaults::available_templates()
            .iter()
            .map(|(name, desc)| format!("  {}: {}", name.bold(), desc))
            .collect();
        anyhow::anyhow!(
            "Unknown template '{}'. Available templates:\n{}",
            template,
            available.join("\n")
        )
    })?;
    let rules = parse_rules_str(yaml_content).context("Bundled template does not parse")?;

    std::fs::write(&output_file, yaml_content)
        .with_context(|| format!("Failed to write rule file: {}", output_file.display()))?;

    println!();
    println!(
        "  {} Created {}",
        "✓".green().bold(),
        output_file.display().to_string().bold()
    );
    println!("  Template: {}", template.cyan());
    println!();
    println!("  {} Controls:", "ℹ".blue());
    for control in &rules.controls {
        println!("    • {}", control.describe());
    }
    println!();
    println!("  {} Next steps:", "→".blue());
    println!("    1. Fill in who may approve (users and teams)");
    println!(
        "    2. Validate it: {}",
        format!("gatectl check {}", output_file.display()).dimmed()
    );
    println!("    3. Commit it to the default branch");
    println!();

    Ok(output_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writes_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        let written = run_init("strict", Some(&path), false).unwrap();
        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), defaults::STRICT_YAML);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(run_init("basic", Some(&path), false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        run_init("basic", Some(&path), true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), defaults::BASIC_YAML);
    }

    #[test]
    fn test_unknown_template() {
        let dir = tempdir().unwrap();
        let err = run_init("lenient", Some(&dir.path().join("x.yml")), false).unwrap_err();
        assert!(err.to_string().contains("Unknown template"));
    }
}
