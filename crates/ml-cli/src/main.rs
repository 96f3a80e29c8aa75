//! Medialib CLI binary.
//!
//! Stores, replaces, deletes and lists media of an owner record against the
//! configured local disks and the PostgreSQL media table.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ml_core::config::AppConfig;
use ml_db::{Database, DatabaseConfig, PgMediaStore};
use ml_media::{
    Disks, ImageThumbnailer, MediaConfig, MediaFilter, MediaOptions, MediaService, UploadedFile,
};

mod commands;

use commands::{Cli, Commands};

type Service = MediaService<PgMediaStore, ImageThumbnailer>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("invalid configuration")?;

    let db = Database::connect(&DatabaseConfig::from(&config.database))
        .await
        .context("failed to connect to database")?;

    let result = run(cli.command, &config, &db).await;
    db.close().await;
    result
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "debug,sqlx=info"
    } else {
        "info,ml_media=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(command: Commands, config: &AppConfig, db: &Database) -> anyhow::Result<()> {
    if let Commands::Migrate = command {
        db.migrate().await.context("failed to run migrations")?;
        return Ok(());
    }

    let disks = Disks::local(&config.media);
    info!(disks = ?disks.names(), "Using local disks");

    let service: Service = MediaService::new(
        Arc::new(PgMediaStore::new(db.pool().clone())),
        disks,
        Arc::new(ImageThumbnailer::new()),
        MediaConfig::from(config),
    );
    let default_box = (config.media.thumbnail_width, config.media.thumbnail_height);

    match command {
        Commands::Migrate => {}

        Commands::Store {
            owner,
            file,
            disk,
            collection,
            name,
            thumbnail,
        } => {
            let upload = read_upload(&file).await?;
            let mut options = MediaOptions::new();
            if let Some(disk) = disk {
                options = options.to_disk(disk);
            }
            if let Some(collection) = collection {
                options = options.to_collection(collection);
            }
            if let Some(name) = name {
                options = options.with_name(name);
            }
            let options = thumbnail.apply(options, default_box);

            let owner = owner.owner();
            let record = service.for_owner(&owner).store(&upload, options).await?;
            print_json(&service.urls().describe(&record))?;
        }

        Commands::Update {
            owner,
            id,
            file,
            name,
            thumbnail,
        } => {
            let upload = read_upload(&file).await?;
            let params = thumbnail.update_params(name, default_box);

            let owner = owner.owner();
            match service.for_owner(&owner).update_media(&upload, id, params).await? {
                Some(record) => print_json(&service.urls().describe(&record))?,
                None => println!("No media {} for {}", id, owner),
            }
        }

        Commands::Delete { owner, id } => {
            let owner = owner.owner();
            let deleted = service.for_owner(&owner).delete_media(id).await?;
            println!("Deleted {} media record(s)", deleted);
        }

        Commands::DeleteCollection { owner, collection } => {
            let owner = owner.owner();
            let deleted = service.for_owner(&owner).delete_collection(&collection).await?;
            println!("Deleted {} media record(s)", deleted);
        }

        Commands::List {
            owner,
            collection,
            disk,
            media_type,
        } => {
            let filter = match (collection, disk, media_type) {
                (Some(c), _, _) => MediaFilter::Collection(c),
                (_, Some(d), _) => MediaFilter::Disk(d),
                (_, _, Some(t)) => MediaFilter::Type(t),
                _ => MediaFilter::All,
            };

            let owner = owner.owner();
            let records = service.for_owner(&owner).records(&filter).await?;
            print_json(&service.urls().transform(&records))?;
        }
    }

    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(filename, bytes))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
