//! # Migration Dispatcher
//!
//! Long-running process that drives imports stored in PostgreSQL.
//!
//! On startup it applies migrations, re-enqueues the dispatch and entity work
//! of every active import, then runs the job runner and the timeout watchdog until
//! interrupted. Pipelines and exporters are dry-run implementations; embedders
//! link real ones through [`SystemComponents`].

use anyhow::Context;
use bulk_import_core::config::ConfigManager;
use bulk_import_core::logging::init_structured_logging;
use bulk_import_core::orchestration::{MigrationSystem, SystemComponents};
use bulk_import_core::store::{MigrationStore, PgMigrationStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("loading configuration")?;
    let config = manager.config().clone();

    let store = PgMigrationStore::connect(&config.database)
        .await
        .context("connecting to database")?;
    store.migrate().await.context("running migrations")?;
    let store: Arc<dyn MigrationStore> = Arc::new(store);

    let (system, receiver) =
        MigrationSystem::build(&config, store, SystemComponents::dry_run())
            .context("building migration system")?;

    let resumed = system
        .resume()
        .await
        .context("resuming active imports")?;
    info!(
        environment = %manager.environment(),
        active_imports = resumed.imports,
        started_entities = resumed.entities,
        "Migration dispatcher started"
    );

    let runner = system.runner.clone().spawn(receiver);

    let watchdog = system.watchdog.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = watchdog.sweep(chrono::Utc::now()).await {
                error!(error = %e, "Watchdog sweep failed");
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    sweeper.abort();
    runner.abort();
    Ok(())
}
