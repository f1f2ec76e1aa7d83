//! railpost CLI - Publish test outcomes to TestRail.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use railpost::config::{self, Config};
use railpost::gateway::HttpGateway;
use railpost::outcome::{self, OutcomeFormat};
use railpost::publish::{self, PublishReport, Publisher};
use railpost::report::ConsoleReporter;

#[derive(Parser)]
#[command(name = "railpost")]
#[command(about = "Publish automated test outcomes to TestRail", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "railpost.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a results file
    Publish {
        /// Outcome file (JSON or JUnit XML)
        results: PathBuf,

        /// Input format
        #[arg(short, long, value_enum, default_value_t = OutcomeFormat::Auto)]
        format: OutcomeFormat,

        /// Agent label for the run name (repeatable)
        #[arg(short, long = "agent")]
        agents: Vec<String>,

        /// Print the submissions without contacting the service
        #[arg(long)]
        dry_run: bool,
    },

    /// Check connectivity and resolve the configured target
    Check,

    /// Validate configuration file
    Validate,

    /// Initialize a new configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = expand_path(&cli.config);

    match cli.command {
        Commands::Publish {
            results,
            format,
            agents,
            dry_run,
        } => {
            publish_results(
                &config_path,
                &expand_path(&results),
                format,
                agents,
                dry_run,
                cli.verbose,
            )
            .await
        }
        Commands::Check => check_target(&config_path, cli.verbose).await,
        Commands::Validate => validate_config(&config_path),
        Commands::Init => init_config(&config_path),
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Prints a fatal error in red and exits with `code`.
fn fail(message: impl Display, code: i32) -> ! {
    eprintln!("{} {}", console::style("Error:").red().bold(), message);
    std::process::exit(code);
}

/// Loads the configuration, applies environment overrides and validates it.
fn load_settings(config_path: &Path) -> Config {
    let loaded = config::load_config(config_path).and_then(|mut config| {
        config.apply_env();
        config.validate()?;
        Ok(config)
    });

    match loaded {
        Ok(config) => {
            info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => fail(format!("Configuration error: {:#}", e), 1),
    }
}

fn connect(config: &Config) -> HttpGateway {
    HttpGateway::from_config(&config.testrail)
        .unwrap_or_else(|e| fail(format!("Configuration error: {}", e), 1))
}

async fn publish_results(
    config_path: &Path,
    results_path: &Path,
    format: OutcomeFormat,
    agents: Vec<String>,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let mut set = outcome::load_outcomes(results_path, format)
        .unwrap_or_else(|e| fail(format!("{:#}", e), 1));
    set.agents.extend(agents);

    let reporter = ConsoleReporter::new(verbose);

    if dry_run {
        let submissions = publish::build_submissions(&set.outcomes, &reporter);
        println!("Would publish {} results:", submissions.len());
        for submission in &submissions.results {
            let summary = submission.comment.lines().next().unwrap_or_default();
            println!(
                "  C{} status {}: {}",
                submission.case_id, submission.status_id, summary
            );
        }
        return Ok(());
    }

    let config = load_settings(config_path);
    let gateway = connect(&config);
    let publisher = Publisher::new(&gateway, &reporter, &config);

    match publisher.run(&set.outcomes, &set.agents).await {
        Ok(PublishReport::Published(_)) | Ok(PublishReport::NothingToPublish) => Ok(()),
        Err(e) => fail(&e, e.exit_code()),
    }
}

async fn check_target(config_path: &Path, verbose: bool) -> Result<()> {
    let config = load_settings(config_path);
    let gateway = connect(&config);
    let reporter = ConsoleReporter::new(verbose);
    let publisher = Publisher::new(&gateway, &reporter, &config);

    let checked = match publisher.check_connection().await {
        Ok(_) => publisher.resolve_targets().await,
        Err(e) => Err(e),
    };

    match checked {
        Ok(targets) => {
            println!();
            println!("Target:");
            println!("  Project: P{}", targets.project_id);
            if let Some(plan_id) = targets.plan_id {
                println!("  Plan:    R{}", plan_id);
            }
            if let Some(suite_id) = targets.suite_id {
                println!("  Suite:   S{}", suite_id);
            }
            Ok(())
        }
        Err(e) => fail(&e, e.exit_code()),
    }
}

fn validate_config(config_path: &Path) -> Result<()> {
    let config = load_settings(config_path);

    println!("Configuration is valid!");
    println!();
    println!("Settings:");
    println!("  Host: {}", config.testrail.host);
    println!("  User: {}", config.testrail.user);

    let target = &config.target;
    println!("  Project: {}", describe(target.project.as_deref(), target.project_id.as_deref()));
    if target.plan_selector().is_requested() {
        println!("  Plan: {}", describe(target.plan.as_deref(), target.plan_id.as_deref()));
    }
    if target.suite_selector().is_requested() {
        println!("  Suite: {}", describe(target.suite.as_deref(), target.suite_id.as_deref()));
    }

    match config.run.close_after_days {
        Some(days) => println!("  Close stale runs after: {} days", days),
        None => println!("  Close stale runs: disabled"),
    }
    println!("  Attachments: {}", config.attachments.enabled);

    Ok(())
}

fn describe(name: Option<&str>, id: Option<&str>) -> String {
    match (id, name) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => format!("'{}'", name),
        (None, None) => "-".to_string(),
    }
}

fn init_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit manually.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let config = r#"# railpost configuration file

[testrail]
host = "https://example.testrail.io"
user = "ci@example.com"
# Prefer the RAILPOST_PASSWORD environment variable over storing this here.
# password = "api-key"

[target]
# Select by name or by id ("P12"). The id wins when both are set.
project = "My Project"
# project_id = "P12"
# plan = "Release 1.0"
# plan_id = "R7"
# suite = "Smoke"
# suite_id = "S3"

[run]
# %DATE% and %AGENTS% are replaced when the run is created.
# name = "%DATE% nightly (%AGENTS%)"
# description = "Automated run"
# Close open runs older than this many days before creating a new one.
# close_after_days = 5
close_wait_secs = 30

[attachments]
enabled = false
"#;

    std::fs::write(config_path, config)?;
    println!("Created {}", config_path.display());
    println!();
    println!("Edit the configuration as needed, then run:");
    println!("  railpost publish results.json");

    Ok(())
}
