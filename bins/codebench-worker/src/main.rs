mod runner;

use codebench_common::config::Settings;
use codebench_common::redis;
use codebench_common::redis::RedisHistoryStore;
use codebench_engine::{CodeBench, CodeBenchBuilder};
use ::redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

/// BLPOP timeout, so the loop notices shutdown
const POP_TIMEOUT_SECS: f64 = 5.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("codebench worker booting...");

    let settings = Settings::from_env();

    // Connect to Redis
    let client = ::redis::Client::open(settings.redis_url.as_str())?;
    let redis_conn = ConnectionManager::new(client).await?;
    info!("Connected to Redis: {}", settings.redis_url);

    let bench = CodeBenchBuilder::from_settings(&settings)?
        .history(Arc::new(RedisHistoryStore::spawn(redis_conn.clone())))
        .build()?;
    let installed: Vec<String> = bench
        .registry()
        .configs()
        .filter(|c| c.is_installed())
        .map(|c| c.language.to_string())
        .collect();
    info!(
        installed = ?installed,
        remote = bench.has_remote(),
        max_concurrency = settings.max_concurrency,
        "Engine ready"
    );

    let bench = Arc::new(bench);
    let limiter = Arc::new(Semaphore::new(settings.max_concurrency));

    // Setup graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, draining in-flight jobs...");
    };

    tokio::select! {
        result = worker_loop(redis_conn, bench, limiter.clone()) => result?,
        _ = shutdown => {},
    }

    // Every permit back means every spawned job has finished
    let _drained = limiter.acquire_many(settings.max_concurrency as u32).await?;
    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip_all)]
async fn worker_loop(
    mut redis_conn: ConnectionManager,
    bench: Arc<CodeBench>,
    limiter: Arc<Semaphore>,
) -> anyhow::Result<()> {
    loop {
        // Only pop what we have capacity to run
        let permit = limiter.clone().acquire_owned().await?;

        match redis::pop_job(&mut redis_conn, POP_TIMEOUT_SECS).await {
            Ok(Some(job)) => {
                info!(
                    job_id = %job.id,
                    language = %job.request.language,
                    mode = %job.request.mode,
                    analyze = job.analyze,
                    source_size = job.request.source.len(),
                    "Received job"
                );
                let bench = bench.clone();
                let mut conn = redis_conn.clone();
                tokio::spawn(async move {
                    runner::handle_job(&mut conn, &bench, job).await;
                    drop(permit);
                });
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
