use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use feedsync::feedbin::EntryPage;
use feedsync::sync::{CompoundOperation, Operation, OperationQueue};
use feedsync::{AccountMetadata, Config, Credentials, FeedbinClient};

/// Diagnostic CLI for the sync layer.
///
/// Credentials come from FEEDSYNC_USERNAME / FEEDSYNC_PASSWORD so they never
/// appear in shell history or process listings.
#[derive(Parser)]
#[command(name = "feedsync", version, about = "Feedbin account sync diagnostics")]
struct Cli {
    /// Path to config.toml (default: ~/.config/feedsync/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the stored credentials against the service
    Verify,
    /// List the account's subscriptions
    Subscriptions,
    /// Run one full sync cycle (tags, taggings, subscriptions, unread,
    /// starred, entries) as a compound operation and print a summary
    Sync,
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedsync")
        .join("config.toml"))
}

fn credentials_from_env() -> Result<Credentials> {
    let username =
        std::env::var("FEEDSYNC_USERNAME").context("FEEDSYNC_USERNAME not set")?;
    let password =
        std::env::var("FEEDSYNC_PASSWORD").context("FEEDSYNC_PASSWORD not set")?;
    Ok(Credentials::new(username, password))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("feedsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&config_path(&cli)?).context("Failed to load configuration")?;
    let credentials = credentials_from_env()?;
    let metadata = Arc::new(Mutex::new(AccountMetadata::default()));
    let client = FeedbinClient::new(&config, credentials, metadata)
        .context("Failed to build API client")?;

    match cli.command {
        Command::Verify => verify(&client).await,
        Command::Subscriptions => subscriptions(&client).await,
        Command::Sync => sync(&client).await,
    }
}

async fn verify(client: &FeedbinClient) -> Result<()> {
    if client.verify_credentials().await? {
        println!("Credentials OK");
        Ok(())
    } else {
        bail!("Credentials rejected by the service");
    }
}

async fn subscriptions(client: &FeedbinClient) -> Result<()> {
    let subs = client
        .subscriptions()
        .await?
        .unwrap_or_default();
    for sub in &subs {
        println!(
            "{:>8}  {}  {}",
            sub.feed_id,
            sub.title.as_deref().unwrap_or("(untitled)"),
            sub.feed_url
        );
    }
    println!("{} subscriptions", subs.len());
    Ok(())
}

/// Demonstrates the operation mechanism: independent list fetches run as
/// siblings under one compound, and the entry fetch walks its pagination
/// cursor only after the subscription list has landed.
async fn sync(client: &FeedbinClient) -> Result<()> {
    let counts: Arc<Mutex<Vec<(String, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let record = |label: &str, count: usize, counts: &Arc<Mutex<Vec<(String, usize)>>>| {
        counts.lock().unwrap().push((label.to_string(), count));
    };

    let tags_op = Operation::new("tags", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let tags = client.tags().await?.unwrap_or_default();
            record("tags", tags.len(), &counts);
            Ok(())
        }
    });

    let taggings_op = Operation::new("taggings", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let taggings = client.taggings().await?.unwrap_or_default();
            record("taggings", taggings.len(), &counts);
            Ok(())
        }
    });

    let unread_op = Operation::new("unread", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let ids = client.unread_entry_ids().await?.unwrap_or_default();
            record("unread", ids.len(), &counts);
            Ok(())
        }
    });

    let starred_op = Operation::new("starred", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let ids = client.starred_entry_ids().await?.unwrap_or_default();
            record("starred", ids.len(), &counts);
            Ok(())
        }
    });

    let subscriptions_op = Operation::new("subscriptions", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let subs = client.subscriptions().await?.unwrap_or_default();
            record("subscriptions", subs.len(), &counts);
            Ok(())
        }
    });
    let subscriptions_handle = subscriptions_op.handle();

    let entries_op = Operation::new("entries", {
        let client = client.clone();
        let counts = counts.clone();
        async move {
            let mut total = 0usize;
            let EntryPage {
                entries,
                mut next_page,
                last_page_number,
            } = client.entries_since().await?;
            total += entries.len();
            if let Some(pages) = last_page_number {
                tracing::info!(pages = pages, "Walking entry pages");
            }
            while let Some(url) = next_page {
                let page = client.entries_page(&url).await?;
                total += page.entries.len();
                next_page = page.next_page;
            }
            record("entries", total, &counts);
            Ok(())
        }
    })
    .with_dependencies([subscriptions_handle]);

    let compound = CompoundOperation::new(
        "sync-cycle",
        vec![
            tags_op,
            taggings_op,
            unread_op,
            starred_op,
            subscriptions_op,
            entries_op,
        ],
    )
    .into_operation();
    let handle = compound.handle();

    let queue = OperationQueue::default();
    queue.add(compound);

    let state = handle.wait().await;
    if let Some(failure) = state.failure() {
        bail!("Sync failed: {failure}");
    }

    for (label, count) in counts.lock().unwrap().iter() {
        println!("{label:>14}: {count}");
    }
    Ok(())
}
