use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use feedkeeper::retention::RetentionEngine;
use feedkeeper::{
    spawn_task_queue, BackgroundScheduler, Config, Database, HttpFeedFetcher, SchedulerOptions,
    SchedulerSettings,
};

#[tokio::main]
async fn main() {
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = feedkeeper::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedkeeper::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("feedkeeper stopped with an error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedkeeper::Result<()> {
    config.validate()?;
    info!("feedkeeper starting");

    let db = Database::open(&config.database.path).await?;
    let settings = SchedulerSettings::load(db.pool()).await?;

    let cancel = CancellationToken::new();
    let fetcher = Arc::new(HttpFeedFetcher::new(db.clone(), &config.fetcher)?);
    let queue = spawn_task_queue(
        fetcher,
        settings.max_concurrent_refreshes,
        config.scheduler.queue_channel_capacity,
        cancel.child_token(),
    );

    let retention = RetentionEngine::new(Arc::new(db.clone()))
        .with_batch_size(config.scheduler.cleanup_batch_size);
    let scheduler = BackgroundScheduler::new(
        db.clone(),
        queue.clone(),
        SchedulerOptions::from(&config.scheduler),
        cancel.clone(),
    )
    .with_retention(retention);

    let ctrl_c = {
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            info!("Shutdown requested");
            cancel.cancel();
        }
    };
    tokio::spawn(ctrl_c);

    scheduler.run().await;

    match queue.progress(config.scheduler.queued_snapshot_limit).await {
        Ok(progress) => {
            info!(
                "Waiting for {} running refresh(es); dropping {} queued",
                progress.pool_task_count, progress.queue_task_count
            );
            if let Ok(json) = serde_json::to_string(&progress) {
                debug!("Final queue state: {}", json);
            }
        }
        Err(e) => error!("Could not read queue progress: {}", e),
    }
    queue.shutdown().await?;
    db.pool().close().await;

    info!("feedkeeper stopped");
    Ok(())
}
