use clinora_application::{Subscription, SubscriptionRegistry, SubscriptionStats};
use clinora_core::{AppError, AppResult, SubscriptionId, TenantId};
use clinora_domain::{
    EncryptedSecret, EventType, RetryPolicy, SubscriptionDefinition, SubscriptionDefinitionInput,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresSubscriptionRegistry;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for subscription registry tests: {error}");
    }

    Some(pool)
}

fn sample_subscription(tenant_id: TenantId, event_types: Vec<&str>) -> AppResult<Subscription> {
    let event_types = event_types
        .into_iter()
        .map(EventType::new)
        .collect::<AppResult<Vec<_>>>()?;

    let definition = SubscriptionDefinition::new(SubscriptionDefinitionInput {
        name: "Intake sync".to_owned(),
        description: Some("Forwards intake events".to_owned()),
        target_url: "https://hooks.example.org/intake".to_owned(),
        event_types,
        retry_policy: RetryPolicy::new(5, 30)?,
        is_active: true,
    })?;

    let now = chrono::Utc::now();
    Ok(Subscription {
        id: SubscriptionId::new(),
        tenant_id,
        definition,
        secret: EncryptedSecret::new(vec![1, 2, 3, 4]),
        secret_version: 1,
        stats: SubscriptionStats::default(),
        created_at: now,
        updated_at: now,
    })
}

async fn require_found(
    registry: &PostgresSubscriptionRegistry,
    tenant_id: TenantId,
    subscription_id: SubscriptionId,
) -> AppResult<Subscription> {
    registry
        .find(tenant_id, subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound("subscription row missing in test".to_owned()))
}

#[tokio::test]
async fn insert_find_update_delete_roundtrip() -> AppResult<()> {
    let Some(pool) = test_pool().await else {
        return Ok(());
    };

    let registry = PostgresSubscriptionRegistry::new(pool);
    let tenant_id = TenantId::new();
    let subscription = sample_subscription(tenant_id, vec!["appointment.created"])?;

    registry.insert(subscription.clone()).await?;

    let found = require_found(&registry, tenant_id, subscription.id).await?;
    assert_eq!(found.definition, subscription.definition);
    assert_eq!(found.secret, subscription.secret);
    assert_eq!(found.secret_version, 1);

    let paused = found.definition.clone().with_active(false)?;
    registry
        .update_definition(tenant_id, subscription.id, paused)
        .await?;

    let found = require_found(&registry, tenant_id, subscription.id).await?;
    assert!(!found.definition.is_active());

    registry
        .update_secret(
            tenant_id,
            subscription.id,
            EncryptedSecret::new(vec![9, 9, 9]),
            2,
        )
        .await?;

    let found = require_found(&registry, tenant_id, subscription.id).await?;
    assert_eq!(found.secret_version, 2);
    assert_eq!(found.secret.as_bytes(), &[9, 9, 9]);

    registry.delete(tenant_id, subscription.id).await?;
    assert!(registry.find(tenant_id, subscription.id).await?.is_none());
    assert!(registry.delete(tenant_id, subscription.id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn active_event_lookup_filters_by_event_and_flag() -> AppResult<()> {
    let Some(pool) = test_pool().await else {
        return Ok(());
    };

    let registry = PostgresSubscriptionRegistry::new(pool);
    let tenant_id = TenantId::new();
    let event_type = EventType::new("appointment.created")?;

    let matching = sample_subscription(tenant_id, vec!["appointment.created"])?;
    let other_event = sample_subscription(tenant_id, vec!["patient.updated"])?;
    let mut paused = sample_subscription(tenant_id, vec!["appointment.created"])?;
    paused.definition = paused.definition.with_active(false)?;

    for subscription in [matching.clone(), other_event, paused] {
        registry.insert(subscription).await?;
    }

    let active = registry.list_active_for_event(tenant_id, &event_type).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, matching.id);

    // Other tenants never see these rows.
    let foreign = registry
        .list_active_for_event(TenantId::new(), &event_type)
        .await?;
    assert!(foreign.is_empty());
    Ok(())
}

#[tokio::test]
async fn record_outcome_increments_rolling_counters() -> AppResult<()> {
    let Some(pool) = test_pool().await else {
        return Ok(());
    };

    let registry = PostgresSubscriptionRegistry::new(pool);
    let tenant_id = TenantId::new();
    let subscription = sample_subscription(tenant_id, vec!["appointment.created"])?;
    registry.insert(subscription.clone()).await?;

    registry
        .record_outcome(tenant_id, subscription.id, true)
        .await?;
    registry
        .record_outcome(tenant_id, subscription.id, false)
        .await?;

    let found = require_found(&registry, tenant_id, subscription.id).await?;
    assert_eq!(found.stats.total_deliveries, 2);
    assert_eq!(found.stats.successful_deliveries, 1);
    assert_eq!(found.stats.failed_deliveries, 1);
    assert!(found.stats.last_delivery_at.is_some());
    assert!(found.stats.last_success_at.is_some());
    assert!(found.stats.last_failure_at.is_some());
    Ok(())
}
