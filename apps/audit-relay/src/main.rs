//! Shopkeep audit relay.
//!
//! Reads newline-delimited JSON audit events from stdin and relays them to
//! storage through the batching audit queue.

#![forbid(unsafe_code)]

mod relay_config;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use shopkeep_application::{AuditQueue, AuditSink, LifecycleSignal, LifecycleSignals};
use shopkeep_core::{AppError, AppResult, NonEmptyString};
use shopkeep_domain::AuditEntryInput;
use shopkeep_infrastructure::{
    ConsoleAuditSink, HttpAuditSink, PostgresAuditSink, run_migrations,
    spawn_process_signal_forwarder,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::relay_config::{AuditSinkConfig, RelayConfig, init_tracing};

#[derive(Debug, Deserialize)]
struct RelayEvent {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(flatten)]
    entry: AuditEntryInput,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RelayConfig::load()?;

    if config.migrate_only {
        let AuditSinkConfig::Postgres { database_url } = &config.sink else {
            return Err(AppError::Validation(
                "migrate requires AUDIT_SINK=postgres".to_owned(),
            ));
        };
        let pool = connect_pool(database_url.as_str()).await?;
        run_migrations(&pool).await?;
        info!("audit migrations applied");
        return Ok(());
    }

    let sink = build_sink(&config).await?;
    let queue = AuditQueue::create(sink, config.queue_options()?)?;
    let signals = LifecycleSignals::default();
    queue.attach_lifecycle(signals.subscribe());
    let mut shutdown = signals.subscribe();
    let forwarder = spawn_process_signal_forwarder(signals.clone())?;

    info!(
        sink = config.sink_label(),
        collection = %config.collection,
        batch_size = config.batch_size,
        flush_interval_ms = config.flush_interval_ms,
        "shopkeep-audit-relay started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => relay_line(&queue, line.as_str()),
                Ok(None) => {
                    info!("audit event input closed");
                    break;
                }
                Err(error) => {
                    warn!(error = %error, "failed to read audit event input");
                    break;
                }
            },
            signal = shutdown.recv() => match signal {
                Ok(LifecycleSignal::Unloading) | Err(RecvError::Closed) => {
                    info!("audit relay unloading");
                    break;
                }
                Ok(LifecycleSignal::Hidden) | Err(RecvError::Lagged(_)) => {}
            },
        }
    }

    let outcome = queue.dispose().await;
    forwarder.abort();

    let stats = queue.stats();
    info!(
        final_batch_rows = outcome.rows(),
        final_batch_dropped = outcome.is_dropped(),
        enqueued = stats.enqueued,
        dispatched_batches = stats.dispatched_batches,
        written_rows = stats.written_rows,
        dropped_rows = stats.dropped_rows,
        "shopkeep-audit-relay stopped"
    );

    Ok(())
}

async fn build_sink(config: &RelayConfig) -> AppResult<Arc<dyn AuditSink>> {
    match &config.sink {
        AuditSinkConfig::Console => Ok(Arc::new(ConsoleAuditSink::new())),
        AuditSinkConfig::Postgres { database_url } => {
            let pool = connect_pool(database_url.as_str()).await?;
            Ok(Arc::new(PostgresAuditSink::new(pool)))
        }
        AuditSinkConfig::Http { base_url, api_key } => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            Ok(Arc::new(HttpAuditSink::new(
                http_client,
                base_url.clone(),
                api_key.as_str(),
            )))
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn relay_line(queue: &AuditQueue, line: &str) {
    match parse_relay_event(line) {
        Ok(Some(event)) => queue.enqueue(event.user_id.as_deref(), event.entry),
        Ok(None) => {}
        Err(error) => warn!(error = %error, "skipping malformed audit event"),
    }
}

fn parse_relay_event(line: &str) -> AppResult<Option<RelayEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let event = serde_json::from_str::<RelayEvent>(line)
        .map_err(|error| AppError::Validation(format!("invalid audit event JSON: {error}")))?;
    NonEmptyString::new(event.entry.action.as_str())?;

    Ok(Some(event))
}
