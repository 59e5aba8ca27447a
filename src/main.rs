//! Forum-Sieve main entry point
//!
//! This is the command-line interface for the Forum-Sieve crawler.

use anyhow::{bail, Context};
use clap::Parser;
use forum_sieve::config::{load_config_with_hash, Config, Credentials};
use forum_sieve::crawler::{crawl, Coordinator};
use forum_sieve::output::{
    find_latest_posts_file, group_by_section, load_posts, print_run_summary, print_validation_report,
    validate_posts, write_run_output,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Forum-Sieve: a credentialed forum crawler and post classifier
///
/// Forum-Sieve logs into a discussion forum, walks the configured sections
/// page by page, classifies and anonymizes every post, and writes JSON and
/// markdown summaries.
#[derive(Parser, Debug)]
#[command(name = "forum-sieve")]
#[command(version)]
#[command(about = "A credentialed forum crawler and post classifier", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Sections to crawl (default: every configured section)
    #[arg(short, long, num_args = 1.., value_name = "SECTION")]
    sections: Vec<String>,

    /// Override the page limit per section
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Override the output directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Validate config and show what would be crawled without logging in
    #[arg(long, conflicts_with = "validate")]
    dry_run: bool,

    /// Check the quality of an exported posts file (or the latest one in a
    /// directory) and exit
    #[arg(long, value_name = "FILE")]
    validate: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // A missing .env file is fine; the variables may come from the shell
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    if let Some(path) = &cli.validate {
        return handle_validate(path);
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(max_pages) = cli.max_pages {
        if max_pages == 0 {
            bail!("--max-pages must be at least 1");
        }
        config.crawler.max_pages = max_pages;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.display().to_string();
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.sections)
    } else {
        handle_crawl(config, &cli.sections, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_sieve=info,warn"),
            1 => EnvFilter::new("forum_sieve=debug,info"),
            2 => EnvFilter::new("forum_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &Config, sections: &[String]) -> anyhow::Result<()> {
    let sections = if sections.is_empty() {
        config.all_sections()
    } else {
        config.resolve_sections(sections)?
    };

    println!("=== Forum-Sieve Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Login path: {}", config.site.login_path);

    println!("\nCrawler Configuration:");
    println!("  Max pages per section: {}", config.crawler.max_pages);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!(
        "  Request spacing: {}ms + up to {}ms jitter",
        config.rate_limit.interval_ms, config.rate_limit.jitter_ms
    );
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!("  Parallel sections: {}", config.crawler.parallel_sections);
    println!("  User agents in pool: {}", config.user_agents.pool.len());

    println!("\nSections ({}):", sections.len());
    for section in sections {
        let controller = crawl(config, section.clone(), config.crawler.max_pages)?;
        let first = controller.page_url(1)?;
        println!("  - {}: {}", section, first);
    }

    println!("\nOutput directory: {}", config.output.directory);

    let credentials = match Credentials::from_env() {
        Ok(_) => "present",
        Err(_) => "missing",
    };
    println!("Credentials in environment: {}", credentials);

    println!("\nConfiguration is valid");
    Ok(())
}

/// Handles the --validate mode: checks an exported posts file
fn handle_validate(path: &Path) -> anyhow::Result<()> {
    let file = if path.is_dir() {
        find_latest_posts_file(path)?
            .with_context(|| format!("No posts_*.json files in {}", path.display()))?
    } else {
        path.to_path_buf()
    };

    tracing::info!("Validating data file: {}", file.display());
    let data = load_posts(&file)
        .with_context(|| format!("Failed to read posts from {}", file.display()))?;

    let report = validate_posts(&data);
    print_validation_report(&report);

    if !report.valid {
        bail!("Data validation failed for {}", file.display());
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, sections: &[String], config_hash: &str) -> anyhow::Result<()> {
    let credentials = Credentials::from_env()?;
    let output_dir = PathBuf::from(&config.output.directory);

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            ctrl_c.cancel();
        }
    });

    let coordinator = Coordinator::new(config).with_cancellation(token);
    let report = coordinator.execute(&credentials, sections).await?;

    let files = write_run_output(&report, &output_dir, Some(config_hash))?;
    print_run_summary(&report);
    println!("\nPosts: {}", files.posts.display());
    println!("Summary: {}", files.summary.display());
    println!("Report: {}", files.markdown.display());

    let validation = validate_posts(&group_by_section(&report.posts));
    if validation.valid {
        tracing::info!(
            "Data validation passed ({} of {} posts with content)",
            validation.posts_with_content,
            validation.total_posts
        );
    } else {
        tracing::warn!(
            "Data validation failed: {} issue(s), content rate {:.0}%",
            validation.issues.len(),
            validation.content_ratio() * 100.0
        );
    }

    if report.aborted {
        bail!(
            "Run aborted: {}",
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}
