//! posse - syndicate new blog posts to Bluesky and Mastodon

use std::path::PathBuf;

use clap::Parser;
use libposse::error::{PosseError, Result};
use libposse::platforms::{create_publishers, Publishers};
use libposse::reachability::HttpReachability;
use libposse::syndicate::{RunOptions, Summary, Syndicator};
use libposse::{logging, scan, Config};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "posse")]
#[command(version, about = "Syndicate new blog posts to Bluesky and Mastodon")]
#[command(long_about = r#"Publish on your Own Site, Syndicate Elsewhere.

Walks a content directory for Markdown posts whose front matter lists
`syndicate_to` targets and a `microblog_content` summary, checks that each
post is live on the site, announces it on every requested network, and then
writes `syndicated = true` back into the post so it is never announced twice.

EXAMPLES:
    # See what would happen, without credentials or network access
    posse content --dry-run

    # Syndicate for real
    posse content

    # Skip the live URL check (e.g. the site deploy is still propagating)
    posse content --force

    # Machine-readable summary
    posse content --format json | jq '.posts[] | select(.marking.status != "marked")'

CONFIGURATION:
    Credentials come from the config file (--config, POSSE_CONFIG or
    ~/.config/posse/config.toml) and are overridden by the environment
    (a .env file in the working directory is loaded first):
      BASE_URL, BSKY_HANDLE, BSKY_PASSWORD,
      MASTODON_API_BASE, MASTODON_ACCESS_TOKEN

EXIT CODES:
    0 - Run completed (per-post failures are listed in the summary)
    1 - Setup error (content directory missing, config unreadable)
    2 - No credentials, or a platform login failed
    3 - Invalid input
"#)]
struct Cli {
    /// Directory containing the site's Markdown content
    #[arg(value_name = "CONTENT_DIR")]
    content_dir: PathBuf,

    /// Show what would be syndicated without publishing or writing files
    #[arg(long)]
    dry_run: bool,

    /// Skip the live URL reachability check
    #[arg(long)]
    force: bool,

    /// Path to a config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Site base URL used to build post links (overrides config and BASE_URL)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Output format for the summary
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    logging::init_default(cli.verbose);

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.site.base_url = Some(base_url);
    }
    if let Some(base_url) = &config.site.base_url {
        validate_base_url(base_url)?;
    }

    let mut documents = scan(&cli.content_dir)?;

    let publishers = if cli.dry_run {
        debug!("Dry run: not creating platform clients");
        Publishers::new()
    } else {
        let publishers = create_publishers(&config).await?;
        let names: Vec<&str> = publishers.targets().iter().map(|t| t.as_str()).collect();
        info!("Publishing to: {}", names.join(", "));
        publishers
    };

    let syndicator = Syndicator::new(
        publishers,
        Box::new(HttpReachability::new()?),
        config.site.base_url.clone(),
    )
    .with_timeout(config.site.reachability_timeout());

    let options = RunOptions {
        dry_run: cli.dry_run,
        force: cli.force,
    };

    let mut summary = syndicator.run(documents.by_ref(), options).await;
    summary.skipped_files = documents.skipped().to_vec();

    info!(
        "Done: {} syndicated, {} failed, {} unreachable ({} posts published, {} publish errors)",
        summary.syndicated(),
        summary.failed(),
        summary.unreachable(),
        summary.publish_successes(),
        summary.publish_failures()
    );

    print_summary(&summary, &cli.format)
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let trimmed = base_url.trim();
    let has_host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .is_some_and(|rest| !rest.trim_matches('/').is_empty());

    if has_host {
        Ok(())
    } else {
        Err(PosseError::InvalidInput(format!(
            "base URL must be an http(s) URL, got '{}'",
            base_url
        )))
    }
}

fn print_summary(summary: &Summary, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(summary).map_err(|e| {
                PosseError::InvalidInput(format!("Failed to serialize summary: {}", e))
            })?;
            println!("{}", json);
        }
        _ => println!("{}", summary),
    }
    Ok(())
}
