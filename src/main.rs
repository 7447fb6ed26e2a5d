//! gatectl: approval gates for pull requests.
//!
//!   gatectl serve          # receive GitHub webhooks and post statuses
//!   gatectl check          # validate .gatectl.yml
//!   gatectl init           # write a starter .gatectl.yml

use clap::{Parser, Subcommand};
use colored::Colorize;
use gatectl::cli;
use gatectl::config::Settings;
use std::path::PathBuf;

/// gatectl: per-path approval policies for pull requests.
#[derive(Parser)]
#[command(
    name = "gatectl",
    version,
    about = "Approval gates for pull requests",
    long_about = "gatectl reads approval rules from .gatectl.yml on the base branch,\n\
                  dismisses approvals made stale by new commits, and reports one\n\
                  commit status per rule.\n\n\
                  Quick start:\n  \
                  gatectl init            # write a starter rule file\n  \
                  gatectl check           # validate it\n  \
                  gatectl serve           # run the webhook server"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        #[command(flatten)]
        settings: Settings,
    },

    /// Validate a rule file
    Check {
        /// Path to the rule file
        #[arg(default_value = ".gatectl.yml")]
        rules: PathBuf,
    },

    /// Create a rule file from a template
    Init {
        #[arg(short, long, default_value = "basic", help = "Template: basic, strict")]
        template: String,
        #[arg(short, long, help = "Where to write (default: ./.gatectl.yml)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gatectl=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { settings } => cli::serve::run_serve(settings).await,
        Commands::Check { rules } => cli::check::run_check(&rules),
        Commands::Init {
            template,
            output,
            force,
        } => cli::init::run_init(&template, output.as_deref(), force).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("  {} {}", "✗".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        eprintln!();
        std::process::exit(1);
    }
}
