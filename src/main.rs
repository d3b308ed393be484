//! Pepe-Scout main entry point
//!
//! This is the command-line interface for the Pepe-Scout image board crawler.

use clap::Parser;
use pepe_scout::config::{load_config_with_hash, Config};
use pepe_scout::crawler::run_crawl;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Pepe-Scout: an image board crawler feeding an image classifier
///
/// Pepe-Scout walks an image board from a seed page, downloads the images
/// attached to posts and files each one into a category using the score of
/// an external classification service.
#[derive(Parser, Debug)]
#[command(name = "pepe-scout")]
#[command(version = "1.0.0")]
#[command(about = "An image board crawler feeding an image classifier", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and print the effective settings without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "reset_pages"])]
    dry_run: bool,

    /// Show page and image statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "reset_pages"])]
    stats: bool,

    /// Write the markdown category summary and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "reset_pages"])]
    export_summary: bool,

    /// Delete stored pages and their files, keeping images, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    reset_pages: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load, override from the environment and validate
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config, &config_hash)?;
    } else if cli.reset_pages {
        handle_reset_pages(&config).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pepe_scout=info,warn"),
            1 => EnvFilter::new("pepe_scout=debug,info"),
            2 => EnvFilter::new("pepe_scout=trace,debug"),
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

fn describe_limit(limit: u32) -> String {
    match limit {
        0 => "uncapped".to_string(),
        n => n.to_string(),
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Pepe-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!(
        "  Allowed hosts: {}",
        config.crawler.allowed_host_substrings.join(", ")
    );
    println!(
        "  Required substrings: {}",
        config.crawler.required_url_substrings.join(", ")
    );
    println!(
        "  Image extensions: {}",
        config.crawler.allowed_image_extensions.join(", ")
    );
    println!("  HTML limit: {}", describe_limit(config.crawler.html_limit));
    println!("  Image limit: {}", describe_limit(config.crawler.image_limit));
    println!(
        "  Classify limit: {}",
        describe_limit(config.crawler.classify_limit)
    );
    println!("  Channel capacity: {}", config.crawler.channel_capacity);
    println!("  Link selector: {}", config.crawler.link_selector);
    println!("  Image selector: {}", config.crawler.image_selector);

    println!("\nClassifier:");
    println!("  Endpoint: {}", config.classifier.endpoint);

    println!("\nRequests:");
    println!("  User agent: {}", config.request.user_agent);
    println!("  Max attempts: {}", config.request.max_attempts);
    println!("  Backoff base: {}ms", config.request.backoff_base_ms);
    println!("  Timeout: {}s", config.request.timeout_secs);
    println!("  Keep-alive: {}", config.request.keep_alive);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Data directory: {}", config.storage.data_dir);
    println!("  Summary: {}", config.storage.summary_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use pepe_scout::output::{load_statistics, print_statistics};
    use pepe_scout::storage::open_storage;

    println!("Database: {}\n", config.storage.database_path);

    let db = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&db)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates the markdown summary
fn handle_export_summary(
    config: &Config,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use pepe_scout::output::{build_summary, generate_markdown_summary};
    use pepe_scout::storage::open_storage;

    println!("=== Exporting Category Summary ===\n");
    println!("Database: {}", config.storage.database_path);
    println!("Output: {}", config.storage.summary_path);
    println!();

    let db = open_storage(Path::new(&config.storage.database_path))?;

    tracing::info!("Loading images from database...");
    let summary = build_summary(&db, config_hash)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.storage.summary_path))?;

    println!("✓ Summary exported to: {}", config.storage.summary_path);

    Ok(())
}

/// Handles the --reset-pages mode: runs only the page cleanup step
async fn handle_reset_pages(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use pepe_scout::crawler::clear_pages;
    use pepe_scout::storage::open_storage;

    let db = open_storage(Path::new(&config.storage.database_path))?;
    let cleared = clear_pages(&db).await?;

    println!("✓ Removed {} stored pages", cleared);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Seed: {}, HTML limit: {}, image limit: {}, classify limit: {}",
        config.crawler.seed_url,
        describe_limit(config.crawler.html_limit),
        describe_limit(config.crawler.image_limit),
        describe_limit(config.crawler.classify_limit)
    );

    match run_crawl(config).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed successfully: {} images classified",
                report.classified()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
