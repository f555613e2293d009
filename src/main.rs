use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reddit_link_archiver::classifier::LinkClassifier;
use reddit_link_archiver::cli::Cli;
use reddit_link_archiver::config::Config;
use reddit_link_archiver::external::{self, ExternalTools};
use reddit_link_archiver::pipeline::Pipeline;
use reddit_link_archiver::source::RedditListingSource;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        state_dir = %config.state_dir.display(),
        archive_dir = %config.archive_dir.display(),
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create state directory: {}",
                config.state_dir.display()
            )
        })?;

    let users = cli.users(&config).context("No users to archive")?;
    let options = cli.options();

    if config.reddit_access_token.is_none() {
        warn!("REDDIT_ACCESS_TOKEN not set - private listings will be refused");
    }
    if options.classifies() && !external::is_available(&config.wget_path).await {
        warn!(wget = %config.wget_path, "Downloader not found - the hand-off step will fail");
    }

    let source = RedditListingSource::new(&config)?;
    let classifier = LinkClassifier::from_config(&config)?;
    let tools = ExternalTools::from_config(&config);

    let mut pipeline = Pipeline::new(
        &config,
        Box::new(source),
        classifier,
        Box::new(tools),
        options,
    );
    let report = pipeline.run(&users).await?;
    report.log_summary();

    if !report.is_success() {
        anyhow::bail!(
            "run incomplete: {} failed categories, hand-off {:?}",
            report.failures.len(),
            report.handoff
        );
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reddit_link_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
