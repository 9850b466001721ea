//! # Comment Harvest
//!
//! Collects New York Times articles and their reader comments, nested replies
//! included, into two flat tables and optionally writes them as CSV.
//!
//! ## Usage
//!
//! ```sh
//! comment_harvest comments https://www.nytimes.com/2020/01/01/a.html
//! comment_harvest --save articles --begin-date 20180101 --end-date 20180131
//! comment_harvest --save --suffix _Jan2018 dataset --begin-date 20180101 --end-date 20180131
//! ```
//!
//! Ctrl-C stops the run after the request in flight; whatever was collected
//! up to that point is still reported and saved.

use clap::Parser;
use comment_harvest::outputs::csv::write_datasets;
use comment_harvest::utils::ensure_writable_dir;
use comment_harvest::{Caps, Dataset, HarvestConfig, Harvester, Interrupt, NytClient, SearchOptions};
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("comment_harvest starting up");
    debug!(command = ?args.command, save = args.save, output_dir = %args.output_dir, "Parsed CLI arguments");

    let config = HarvestConfig::load(args.config.as_deref()).await?;

    // Early check: a long run should not end in an unwritable directory
    if args.save {
        if let Err(e) = ensure_writable_dir(&args.output_dir).await {
            error!(
                path = %args.output_dir,
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let client = NytClient::throttled(&config)?;
    let interrupt = Interrupt::new();
    interrupt.listen_for_ctrl_c();
    let harvester = Harvester::new(&client, &config, &interrupt);

    let dataset = match args.command {
        Command::Comments { urls, max_comments } => {
            harvester.get_comments(&urls, max_comments).await
        }
        Command::Articles {
            search,
            max_articles,
        } => {
            let api_key = require_api_key(args.api_key.as_deref())?;
            harvester
                .get_articles(api_key, &SearchOptions::from(search), max_articles)
                .await
        }
        Command::Dataset {
            search,
            max_comments,
            max_articles,
        } => {
            let api_key = require_api_key(args.api_key.as_deref())?;
            let caps = Caps {
                max_comments,
                max_articles,
            };
            harvester.get_dataset(api_key, &SearchOptions::from(search), caps).await
        }
    };

    report(&dataset);

    if args.save {
        if let Err(e) = write_datasets(Path::new(&args.output_dir), &args.suffix, &dataset).await {
            error!(error = %e, "Failed to write CSV output");
            return Err(e);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

fn require_api_key(key: Option<&str>) -> Result<&str, Box<dyn Error>> {
    match key {
        Some(k) if !k.trim().is_empty() => Ok(k),
        _ => {
            error!("An API key is required for article search (--api-key or NYT_API_KEY)");
            Err("missing API key".into())
        }
    }
}

fn report(dataset: &Dataset) {
    if dataset.stop.is_error() {
        warn!(
            articles = dataset.articles.len(),
            comments = dataset.comments.len(),
            stop = %dataset.stop,
            "Harvest ended early"
        );
    } else {
        info!(
            articles = dataset.articles.len(),
            comments = dataset.comments.len(),
            stop = %dataset.stop,
            "Harvest finished"
        );
    }
}
