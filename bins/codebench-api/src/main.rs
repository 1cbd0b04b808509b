mod handlers;
mod metrics;
mod routes;

use axum::Router;
use chrono::{DateTime, Utc};
use codebench_common::config::Settings;
use codebench_common::history::{ExecutionHistoryStore, HistoryFanout, InMemoryHistory};
use codebench_common::redis::RedisHistoryStore;
use codebench_engine::{CodeBench, CodeBenchBuilder};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct AppState {
    pub bench: Arc<CodeBench>,
    /// `None` when Redis is unreachable; job endpoints answer 503
    pub redis: Option<ConnectionManager>,
    pub limiter: Arc<Semaphore>,
    pub started_at: DateTime<Utc>,
}

async fn connect_redis(url: &str) -> Option<ConnectionManager> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            warn!("Invalid Redis URL {}: {}", url, e);
            return None;
        }
    };
    match ConnectionManager::new(client).await {
        Ok(conn) => {
            info!("Connected to Redis: {}", url);
            Some(conn)
        }
        Err(e) => {
            warn!("Redis unavailable, job queue disabled: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("codebench API booting...");

    let settings = Settings::from_env();
    let redis_conn = connect_redis(&settings.redis_url).await;

    let local_history: Arc<dyn ExecutionHistoryStore> = Arc::new(InMemoryHistory::new());
    let history: Arc<dyn ExecutionHistoryStore> = match &redis_conn {
        Some(conn) => Arc::new(HistoryFanout::new(vec![
            local_history,
            Arc::new(RedisHistoryStore::spawn(conn.clone())),
        ])),
        None => local_history,
    };

    let bench = CodeBenchBuilder::from_settings(&settings)?.history(history).build()?;
    info!(
        languages = bench.registry().list().len(),
        remote = bench.has_remote(),
        max_concurrency = settings.max_concurrency,
        "Engine ready"
    );

    let state = Arc::new(AppState {
        bench: Arc::new(bench),
        redis: redis_conn,
        limiter: Arc::new(Semaphore::new(settings.max_concurrency)),
        started_at: Utc::now(),
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&settings.api_addr).await?;
    info!("HTTP server listening on {}", settings.api_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => {
                    warn!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    info!("API shutdown complete");
    Ok(())
}
