mod cli;

use crate::cli::{Command, LogFormat, CLI};
use anyhow::Context;
use burrow_core::{Repository, ShortId};
use burrow_generator::RandomGenerator;
use burrow_shortener::deletion::DEFAULT_QUEUE_CAPACITY;
use burrow_shortener::{BatchItem, DeletionQueue, Resolution, ShortenerService};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let storage = config.storage.to_config()?;
    info!(
        storage_backend = %config.storage.storage,
        id_length = config.id_length,
        "starting burrow"
    );

    let repository = burrow_storage::open(storage)
        .await
        .context("failed to open storage backend")?;
    let generator = RandomGenerator::builder().length(config.id_length).build();
    let service = ShortenerService::new(Arc::clone(&repository), generator);

    run(config.command, &service, repository, &config.base_url).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(
    command: Command,
    service: &ShortenerService<dyn Repository, RandomGenerator>,
    repository: Arc<dyn Repository>,
    base_url: &str,
) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => {
            let outcome = service.shorten(&url, &owner).await?;
            print_json(json!({
                "short_id": outcome.short_id().as_str(),
                "short_url": outcome.short_id().to_url(base_url),
                "existing": outcome.is_conflict(),
            }));
        }
        Command::Batch { urls, owner } => {
            let items: Vec<BatchItem> = urls
                .into_iter()
                .enumerate()
                .map(|(i, original_url)| BatchItem {
                    correlation_id: i.to_string(),
                    original_url,
                })
                .collect();
            for result in service.shorten_batch(&items, &owner).await? {
                print_json(json!({
                    "correlation_id": result.correlation_id,
                    "short_id": result.short_id.as_str(),
                    "short_url": result.short_id.to_url(base_url),
                }));
            }
        }
        Command::Resolve { id } => {
            let id = ShortId::new(id)?;
            let value = match service.resolve(&id).await? {
                Resolution::Found(url) => json!({ "short_id": id.as_str(), "original_url": url }),
                Resolution::Gone => json!({ "short_id": id.as_str(), "deleted": true }),
                Resolution::NotFound => json!({ "short_id": id.as_str(), "found": false }),
            };
            print_json(value);
        }
        Command::List { owner } => {
            for record in service.list(&owner).await? {
                print_json(json!({
                    "short_id": record.short_id.as_str(),
                    "short_url": record.short_id.to_url(base_url),
                    "original_url": record.original_url,
                }));
            }
        }
        Command::Delete { owner, ids } => {
            let ids = ids
                .into_iter()
                .map(ShortId::new)
                .collect::<Result<Vec<_>, _>>()?;
            let queue = DeletionQueue::spawn(repository, DEFAULT_QUEUE_CAPACITY);
            queue.enqueue(owner, ids).await?;
            // The process is about to exit; drain the queue first.
            queue.shutdown().await;
        }
        Command::Stats => {
            let stats = service.stats().await?;
            print_json(json!({ "urls": stats.urls, "users": stats.users }));
        }
        Command::Clear => {
            repository.clear().await?;
            info!("storage cleared");
        }
    }

    Ok(())
}

fn print_json(value: serde_json::Value) {
    println!("{value}");
}
