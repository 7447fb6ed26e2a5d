//! `gatectl check`: validate a rule file and point out controls that can
//! never pass or never apply.

use crate::rules::{linter, parse_rules_file};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn run_check(rules_path: &Path) -> Result<()> {
    let rules = parse_rules_file(rules_path)?;

    println!();
    println!("  {} Rule file is valid!", "✓".green().bold());
    println!("  File:     {}", rules_path.display().to_string().cyan());
    println!("  Controls: {}", rules.len());
    println!();
    for (i, control) in rules.controls.iter().enumerate() {
        println!("  {}. {}", i + 1, control.describe());
        println!("     status: {}", control.status_context("<prefix>").dimmed());
    }

    let warnings = linter::lint_rules(&rules);
    if warnings.is_empty() {
        println!();
        println!("  {} No issues found.", "✓".green());
    } else {
        println!();
        println!(
            "  {} {} {}:",
            "─".repeat(20).dimmed(),
            warnings.len(),
            if warnings.len() == 1 { "suggestion" } else { "suggestions" }
        );
        println!();
        for warning in &warnings {
            println!("{}", warning.display());
        }
    }

    println!();
    Ok(())
}
