mod cli;

use crate::cli::{Command, LogFormat, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use snip_core::{Owner, ShortCode, Store};
use snip_service::{BatchRequest, ShortenerService};
use snip_storage::{FileStore, InMemoryStore, PostgresStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let backend = config.backend();
    info!(storage_backend = %backend, base_url = %config.base_url, "starting snip");

    match backend {
        StorageBackendArg::InMemory => run(InMemoryStore::new(), &config).await,
        StorageBackendArg::File => {
            let path = config
                .file_storage_path
                .clone()
                .context("file storage path is required when storage backend is file")?;
            run(FileStore::open(path).await?, &config).await
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .as_deref()
                .context("database dsn is required when storage backend is postgres")?;
            run(PostgresStore::connect(dsn).await?, &config).await
        }
    }
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

async fn run<S: Store>(store: S, config: &CLI) -> anyhow::Result<()> {
    let service = ShortenerService::new(store, config.base_url.clone());
    let outcome = execute(&service, &config.command).await;
    service.close().await?;
    outcome
}

async fn execute<S: Store>(service: &ShortenerService<S>, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { urls, owner } => {
            let owner = owner.clone().map(Owner::new);
            if let [url] = urls.as_slice() {
                let record = service.shorten(url, owner).await?;
                println!("{}", service.short_url(&record.id));
                return Ok(());
            }

            let requests = urls
                .iter()
                .enumerate()
                .map(|(i, url)| BatchRequest {
                    correlation_id: i.to_string(),
                    original_url: url.clone(),
                })
                .collect();
            for (response, url) in service.shorten_many(requests, owner).await?.iter().zip(urls) {
                match &response.result {
                    Ok(short_url) => println!("{short_url}\t{url}"),
                    Err(err) => println!("error\t{url}\t{err}"),
                }
            }
        }
        Command::Resolve { code } => {
            println!("{}", service.resolve(&ShortCode::new(code.as_str())).await?);
        }
        Command::List { owner } => {
            for url in service.list_for_owner(&Owner::new(owner.as_str())).await? {
                println!("{}\t{}", url.short_url, url.original_url);
            }
        }
        Command::Delete { owner, codes } => {
            // The process exits right after, so skip the queue.
            let codes: Vec<ShortCode> = codes.iter().map(|c| ShortCode::new(c.as_str())).collect();
            service
                .delete_many_now(&codes, &Owner::new(owner.as_str()))
                .await?;
            println!("deleted {} code(s) owned by {owner}", codes.len());
        }
        Command::Stats => {
            let stats = service.stats().await?;
            println!("urls\t{}\nusers\t{}", stats.urls, stats.users);
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }

    Ok(())
}
