//! CLI for the Jira to GitLab issue migrator.
//!
//! Copies every issue of a Jira project (with comments, attachments and
//! authors) into a GitLab project of the same name.

use clap::Parser;
use issue_migrator::{MigrationSettings, RunSummary, Runner, RunnerError};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Settings file used when `--config` is not given and it exists.
const DEFAULT_CONFIG: &str = "issue-migrator.toml";

/// Issue Migrator - Copy a Jira project's issues into GitLab.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Jira project key, also used as the GitLab project name.
    project: String,

    /// Path to the settings file.
    #[arg(long, env = "ISSUE_MIGRATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Jira base URL. Overrides JIRA_URL and the settings file.
    #[arg(long)]
    jira_url: Option<String>,

    /// Jira username. Overrides JIRA_USERNAME and the settings file.
    #[arg(long)]
    jira_username: Option<String>,

    /// Jira password. Overrides JIRA_PASSWORD and the settings file.
    #[arg(long)]
    jira_password: Option<String>,

    /// GitLab base URL. Overrides GITLAB_URL and the settings file.
    #[arg(long)]
    gitlab_url: Option<String>,

    /// GitLab administrator token. Overrides GITLAB_TOKEN and the settings file.
    #[arg(long)]
    gitlab_token: Option<String>,

    /// Existing GitLab project id; skips the search by name.
    #[arg(long)]
    project_id: Option<u64>,

    /// Directory attachments are downloaded into.
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Directory issues that cannot be created are written to.
    #[arg(long)]
    quarantine_dir: Option<PathBuf>,

    /// Migrate at most this many issues.
    #[arg(long)]
    limit: Option<usize>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write JSON logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the run summary with every issue outcome as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(&args.log_level, args.log_file.as_deref()) {
        eprintln!("Failed to open log file: {e}");
        return ExitCode::from(2);
    }

    let report = args.report.clone();
    match run(args).await {
        Ok(summary) => {
            print_summary(&summary);
            if let Some(path) = report {
                write_report(&summary, &path);
            }

            if summary.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::from(0)
            }
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Installs a compact console layer and, if requested, a JSON file layer.
///
/// `RUST_LOG` takes precedence over `level`.
fn init_tracing(level: &str, log_file: Option<&Path>) -> std::io::Result<()> {
    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(File::create(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
    Ok(())
}

/// Merges the settings file, environment and flags, then runs the migration.
async fn run(args: Args) -> Result<RunSummary, RunnerError> {
    let config_path = args.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    });
    if let Some(path) = &config_path {
        info!(path = %path.display(), "Using settings file");
    }

    let mut settings = MigrationSettings::load_or_default(config_path.as_deref())?;
    settings.apply_env();
    let project = args.project.clone();
    apply_flags(&mut settings, args);

    Runner::connect(project, &settings)?.run().await
}

/// Applies explicit command line overrides.
fn apply_flags(settings: &mut MigrationSettings, args: Args) {
    let strings = [
        (args.jira_url, &mut settings.source.url),
        (args.jira_username, &mut settings.source.username),
        (args.jira_password, &mut settings.source.password),
        (args.gitlab_url, &mut settings.destination.url),
        (args.gitlab_token, &mut settings.destination.token),
    ];
    for (value, target) in strings {
        if let Some(value) = value {
            *target = value;
        }
    }

    if args.project_id.is_some() {
        settings.destination.project_id = args.project_id;
    }
    if let Some(dir) = args.staging_dir {
        settings.migration.staging_dir = dir;
    }
    if let Some(dir) = args.quarantine_dir {
        settings.migration.quarantine_dir = dir;
    }
    if let Some(limit) = args.limit {
        settings.migration.limit = limit;
    }
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    println!("  Project: {} (id {})", summary.project, summary.project_id);
    println!("  Issues discovered: {}", summary.issues_discovered);

    println!("  Snapshot errors: {}", summary.snapshot_errors);
    println!("  Users provisioned: {}", summary.users_provisioned);
    if !summary.unresolved_users.is_empty() {
        println!(
            "  Unresolved users: {}",
            summary.unresolved_users.join(", ")
        );
    }

    println!("  Issues created: {}", summary.issues_created);
    println!("  Issues partially created: {}", summary.issues_partial);
    println!("  Issues skipped: {}", summary.issues_skipped);
    println!("  Issues quarantined: {}", summary.issues_quarantined);
    if summary.has_failures() {
        println!("  Quarantined ids: {}", summary.quarantined_ids().join(", "));
    }
}

/// Writes the summary as pretty JSON, logging instead of failing the run.
fn write_report(summary: &RunSummary, path: &Path) {
    let result = serde_json::to_vec_pretty(summary)
        .map_err(std::io::Error::other)
        .and_then(|json| std::fs::write(path, json));

    match result {
        Ok(()) => info!(path = %path.display(), "Report written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write report"),
    }
}
