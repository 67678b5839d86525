//! Clinora webhook delivery dispatcher runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use clinora_application::{Delivery, DeliveryDispatcher, DeliveryStatus};
use clinora_core::{AppError, AppResult};
use clinora_infrastructure::{
    AesSecretEncryptor, HttpDeliveryTransport, PostgresDeliveryStore,
    PostgresSubscriptionRegistry,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct DispatcherConfig {
    database_url: String,
    encryption_key_hex: String,
    batch_size: usize,
    poll_interval_ms: u64,
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DispatcherConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str()).await?;
    let dispatcher = build_dispatcher(pool, &config)?;

    info!(
        batch_size = config.batch_size,
        poll_interval_ms = config.poll_interval_ms,
        request_timeout_secs = config.request_timeout_secs,
        "clinora-dispatcher started"
    );

    let mut cycle = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => info!("shutdown signal received, stopping dispatcher"),
                    Err(error) => warn!(error = %error, "failed to listen for shutdown signal"),
                }
                break;
            }
            _ = cycle.tick() => {
                run_cycle(&dispatcher, config.batch_size).await;
            }
        }
    }

    Ok(())
}

/// Runs one dispatch cycle: selects due deliveries and attempts each one
/// concurrently. A failing row never aborts the rest of the batch.
async fn run_cycle(dispatcher: &DeliveryDispatcher, batch_size: usize) {
    let due = match dispatcher.select_due(batch_size).await {
        Ok(due) => due,
        Err(error) => {
            warn!(error = %error, "failed to select due deliveries");
            return;
        }
    };

    if due.is_empty() {
        return;
    }

    info!(due_count = due.len(), "dispatching due deliveries");

    let mut attempts = JoinSet::new();
    for delivery in due {
        let dispatcher = dispatcher.clone();
        attempts.spawn(async move {
            let delivery_id = delivery.id;
            (delivery_id, dispatcher.process_delivery(delivery).await)
        });
    }

    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok((_, Ok(delivery))) => log_outcome(&delivery),
            Ok((delivery_id, Err(error))) => {
                warn!(delivery_id = %delivery_id, error = %error, "delivery attempt errored");
            }
            Err(error) => {
                warn!(error = %error, "delivery attempt task panicked");
            }
        }
    }
}

fn log_outcome(delivery: &Delivery) {
    match delivery.status {
        DeliveryStatus::Delivered => info!(
            delivery_id = %delivery.id,
            subscription_id = %delivery.subscription_id,
            event_type = %delivery.event_type,
            attempt_count = delivery.attempt_count,
            "delivery confirmed"
        ),
        DeliveryStatus::Retrying => info!(
            delivery_id = %delivery.id,
            subscription_id = %delivery.subscription_id,
            event_type = %delivery.event_type,
            attempt_count = delivery.attempt_count,
            next_retry_at = ?delivery.next_retry_at,
            "delivery attempt failed, retry scheduled"
        ),
        DeliveryStatus::Failed => warn!(
            delivery_id = %delivery.id,
            subscription_id = %delivery.subscription_id,
            event_type = %delivery.event_type,
            attempt_count = delivery.attempt_count,
            error = delivery.error_message.as_deref().unwrap_or("unknown"),
            "delivery failed terminally"
        ),
        DeliveryStatus::Pending => warn!(
            delivery_id = %delivery.id,
            "delivery still pending after attempt"
        ),
    }
}

fn build_dispatcher(pool: PgPool, config: &DispatcherConfig) -> AppResult<DeliveryDispatcher> {
    let registry = Arc::new(PostgresSubscriptionRegistry::new(pool.clone()));
    let store = Arc::new(PostgresDeliveryStore::new(pool));
    let transport = Arc::new(HttpDeliveryTransport::new(Duration::from_secs(
        config.request_timeout_secs,
    ))?);
    let secret_encryptor = Arc::new(AesSecretEncryptor::from_hex(
        config.encryption_key_hex.as_str(),
    )?);

    Ok(DeliveryDispatcher::new(
        registry,
        store,
        transport,
        secret_encryptor,
    ))
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

impl DispatcherConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let encryption_key_hex = required_env("WEBHOOK_ENCRYPTION_KEY")?;
        let batch_size = parse_env_usize("DISPATCHER_BATCH_SIZE", 50)?;
        let poll_interval_ms = parse_env_u64("DISPATCHER_POLL_INTERVAL_MS", 1000)?;
        let request_timeout_secs = parse_env_u64("WEBHOOK_REQUEST_TIMEOUT_SECS", 30)?;

        if batch_size == 0 {
            return Err(AppError::Validation(
                "DISPATCHER_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "DISPATCHER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if request_timeout_secs == 0 {
            return Err(AppError::Validation(
                "WEBHOOK_REQUEST_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            encryption_key_hex,
            batch_size,
            poll_interval_ms,
            request_timeout_secs,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
