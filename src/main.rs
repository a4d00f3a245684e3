use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use jobsync::cli::{Cli, Command};
use jobsync::config::{ConfigLoader, Settings};
use jobsync::queue::TaskHandler;
use jobsync::scheduler::ImportScheduler;
use jobsync::services::ALL_FEEDS_LABEL;
use jobsync::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_file(path);
    }
    let settings = loader.load()?;

    init_tracing(&settings.logger.level)?;

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Import { feed } => import_once(settings, feed).await,
    }
}

/// Long-running service: worker pool, reconciler sweep, cron scheduler.
async fn serve(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::new(settings.clone());

    state
        .dispatcher
        .start(Arc::clone(&state.runner) as Arc<dyn TaskHandler>);

    let cancel = tokio_util::sync::CancellationToken::new();
    let sweep = state.reconciler.spawn(
        Duration::from_secs(settings.reconciler.sweep_interval_secs),
        cancel.clone(),
    );

    let mut scheduler = if settings.scheduler.enabled {
        Some(
            ImportScheduler::start(
                &settings.scheduler,
                Arc::clone(&state.runs),
                Arc::clone(&state.dispatcher),
            )
            .await?,
        )
    } else {
        None
    };

    tracing::info!(
        feeds = settings.feeds.urls.len(),
        concurrency = settings.queue.concurrency,
        "jobsync service started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }
    cancel.cancel();
    state.dispatcher.shutdown().await;
    let _ = sweep.await;

    Ok(())
}

/// One-shot import without the queue; prints the run result as JSON.
async fn import_once(settings: Settings, feed: Option<String>) -> anyhow::Result<()> {
    let state = AppState::new(settings);

    let label = feed.as_deref().unwrap_or(ALL_FEEDS_LABEL);
    let run = state.runs.create(label).await?;
    let result = state.runner.run_import(run.id, feed.as_deref()).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
