use async_trait::async_trait;
use clinora_application::{Subscription, SubscriptionRegistry, SubscriptionStats};
use clinora_core::{AppError, AppResult, SubscriptionId, TenantId};
use clinora_domain::{
    EncryptedSecret, EventType, RetryPolicy, SubscriptionDefinition, SubscriptionDefinitionInput,
};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed subscription registry.
#[derive(Clone)]
pub struct PostgresSubscriptionRegistry {
    pool: PgPool,
}

impl PostgresSubscriptionRegistry {
    /// Creates a subscription registry with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    name: String,
    description: Option<String>,
    target_url: String,
    event_types: Vec<String>,
    max_attempts: i16,
    base_delay_seconds: i32,
    is_active: bool,
    secret: Vec<u8>,
    secret_version: i32,
    total_deliveries: i64,
    successful_deliveries: i64,
    failed_deliveries: i64,
    last_delivery_at: Option<chrono::DateTime<chrono::Utc>>,
    last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

const SUBSCRIPTION_COLUMNS: &str = r#"
    id,
    tenant_id,
    name,
    description,
    target_url,
    event_types,
    max_attempts,
    base_delay_seconds,
    is_active,
    secret,
    secret_version,
    total_deliveries,
    successful_deliveries,
    failed_deliveries,
    last_delivery_at,
    last_success_at,
    last_failure_at,
    created_at,
    updated_at
"#;

#[async_trait]
impl SubscriptionRegistry for PostgresSubscriptionRegistry {
    async fn insert(&self, subscription: Subscription) -> AppResult<()> {
        let definition = &subscription.definition;
        let policy = definition.retry_policy();

        sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions (
                id,
                tenant_id,
                name,
                description,
                target_url,
                event_types,
                max_attempts,
                base_delay_seconds,
                is_active,
                secret,
                secret_version,
                total_deliveries,
                successful_deliveries,
                failed_deliveries,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, 0, 0, $12, $13)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.tenant_id.as_uuid())
        .bind(definition.name().as_str())
        .bind(definition.description())
        .bind(definition.target_url())
        .bind(event_type_values(definition))
        .bind(i16::try_from(policy.max_attempts()).map_err(|error| {
            AppError::Validation(format!("invalid max_attempts value: {error}"))
        })?)
        .bind(i32::try_from(policy.base_delay_seconds()).map_err(|error| {
            AppError::Validation(format!("invalid base_delay_seconds value: {error}"))
        })?)
        .bind(definition.is_active())
        .bind(subscription.secret.as_bytes())
        .bind(subscription.secret_version)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to insert subscription '{}' for tenant '{}': {error}",
                subscription.id, subscription.tenant_id
            ))
        })?;

        Ok(())
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM webhook_subscriptions
            WHERE tenant_id = $1 AND id = $2
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find subscription '{subscription_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(subscription_from_row).transpose()
    }

    async fn list(&self, tenant_id: TenantId) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM webhook_subscriptions
            WHERE tenant_id = $1
            ORDER BY created_at
            "#
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list subscriptions for tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(subscription_from_row).collect()
    }

    async fn update_definition(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        definition: SubscriptionDefinition,
    ) -> AppResult<()> {
        let policy = definition.retry_policy();

        let result = sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET
                name = $3,
                description = $4,
                target_url = $5,
                event_types = $6,
                max_attempts = $7,
                base_delay_seconds = $8,
                is_active = $9,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(definition.name().as_str())
        .bind(definition.description())
        .bind(definition.target_url())
        .bind(event_type_values(&definition))
        .bind(i16::try_from(policy.max_attempts()).map_err(|error| {
            AppError::Validation(format!("invalid max_attempts value: {error}"))
        })?)
        .bind(i32::try_from(policy.base_delay_seconds()).map_err(|error| {
            AppError::Validation(format!("invalid base_delay_seconds value: {error}"))
        })?)
        .bind(definition.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update subscription '{subscription_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    async fn update_secret(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        secret: EncryptedSecret,
        secret_version: i32,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET secret = $3, secret_version = $4, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(secret.as_bytes())
        .bind(secret_version)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update secret for subscription '{subscription_id}' tenant '{tenant_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    async fn delete(&self, tenant_id: TenantId, subscription_id: SubscriptionId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_subscriptions
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete subscription '{subscription_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    async fn list_active_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &EventType,
    ) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM webhook_subscriptions
            WHERE tenant_id = $1
              AND is_active = true
              AND $2 = ANY(event_types)
            ORDER BY created_at
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(event_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list active subscriptions for event '{}' tenant '{tenant_id}': {error}",
                event_type.as_str()
            ))
        })?;

        rows.into_iter().map(subscription_from_row).collect()
    }

    async fn record_outcome(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        success: bool,
    ) -> AppResult<()> {
        // Single-statement increments; outcomes for one subscription can land
        // concurrently within a dispatcher cycle.
        sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET
                total_deliveries = total_deliveries + 1,
                successful_deliveries
                    = successful_deliveries + CASE WHEN $3 THEN 1 ELSE 0 END,
                failed_deliveries
                    = failed_deliveries + CASE WHEN $3 THEN 0 ELSE 1 END,
                last_delivery_at = now(),
                last_success_at = CASE WHEN $3 THEN now() ELSE last_success_at END,
                last_failure_at = CASE WHEN $3 THEN last_failure_at ELSE now() END
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(success)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record delivery outcome for subscription '{subscription_id}' tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(())
    }
}

fn event_type_values(definition: &SubscriptionDefinition) -> Vec<String> {
    definition
        .event_types()
        .iter()
        .map(|event_type| event_type.as_str().to_owned())
        .collect()
}

#[cfg(test)]
mod tests;

fn subscription_from_row(row: SubscriptionRow) -> AppResult<Subscription> {
    let event_types = row
        .event_types
        .into_iter()
        .map(EventType::new)
        .collect::<AppResult<Vec<_>>>()?;

    let definition = SubscriptionDefinition::new(SubscriptionDefinitionInput {
        name: row.name,
        description: row.description,
        target_url: row.target_url,
        event_types,
        retry_policy: RetryPolicy::new(
            u16::try_from(row.max_attempts).map_err(|error| {
                AppError::Validation(format!("invalid stored max_attempts value: {error}"))
            })?,
            u32::try_from(row.base_delay_seconds).map_err(|error| {
                AppError::Validation(format!("invalid stored base_delay_seconds value: {error}"))
            })?,
        )?,
        is_active: row.is_active,
    })?;

    Ok(Subscription {
        id: SubscriptionId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        definition,
        secret: EncryptedSecret::new(row.secret),
        secret_version: row.secret_version,
        stats: SubscriptionStats {
            total_deliveries: row.total_deliveries,
            successful_deliveries: row.successful_deliveries,
            failed_deliveries: row.failed_deliveries,
            last_delivery_at: row.last_delivery_at,
            last_success_at: row.last_success_at,
            last_failure_at: row.last_failure_at,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
