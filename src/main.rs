use clap::Parser;
use fare_lifecycle::application::lifecycle::FareLifecycleEngine;
use fare_lifecycle::application::scheduler::FareTransitionScheduler;
use fare_lifecycle::config::ServiceConfig;
use fare_lifecycle::domain::ports::{DirectoryRef, FareStoreRef};
use fare_lifecycle::infrastructure::in_memory::{InMemoryFareStore, InMemoryOrganizationDirectory};
use fare_lifecycle::infrastructure::retrying_directory::RetryingDirectory;
#[cfg(feature = "storage-rocksdb")]
use fare_lifecycle::infrastructure::rocksdb::RocksDBFareStore;
use fare_lifecycle::interfaces::csv::fare_reader::FareRequestReader;
use fare_lifecycle::interfaces::csv::fare_writer::FareWriter;
use fare_lifecycle::logger::init_logger;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// CSV file of fares to create on startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Run the transition scheduler once, print all fares and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path).into_diagnostic()?,
        None => ServiceConfig::default(),
    };
    if cli.db_path.is_some() {
        config.storage.db_path = cli.db_path.clone();
    }
    config.logging.verbose |= cli.verbose;

    init_logger(config.logging.verbose, config.logging.json);

    let store = build_store(config.storage.db_path.as_deref())?;
    let directory: DirectoryRef = Arc::new(RetryingDirectory::new(
        Arc::new(InMemoryOrganizationDirectory::with_organizations(
            config.organizations.clone(),
        )),
        config.retry_policy(),
    ));

    let engine = FareLifecycleEngine::new(Arc::clone(&store), directory);
    let scheduler = FareTransitionScheduler::new(store);

    if let Some(seed) = &cli.seed {
        let file = File::open(seed).into_diagnostic()?;
        let reader = FareRequestReader::new(file);
        for request in reader.requests() {
            match request {
                Ok(request) => {
                    if let Err(e) = engine.create_fare(request).await {
                        eprintln!("Error creating fare: {}", e);
                    }
                }
                Err(e) => {
                    eprintln!("Error reading fare: {}", e);
                }
            }
        }
    }

    if cli.once {
        scheduler.run_logged().await;

        let fares = engine.list_fares().await.into_diagnostic()?;
        let stdout = io::stdout();
        let mut writer = FareWriter::new(stdout.lock());
        writer.write_fares(fares).into_diagnostic()?;
        return Ok(());
    }

    let handle = scheduler.start(config.scheduler_period(), config.scheduler.run_on_start);
    tokio::signal::ctrl_c().await.into_diagnostic()?;
    tracing::info!("Shutdown requested");
    handle.stop().await;

    Ok(())
}

fn build_store(db_path: Option<&Path>) -> Result<FareStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBFareStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryFareStore::new()))
        }
        None => Ok(Arc::new(InMemoryFareStore::new())),
    }
}
