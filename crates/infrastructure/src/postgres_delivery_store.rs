use async_trait::async_trait;
use clinora_application::{Delivery, DeliveryQueueStats, DeliveryStatus, DeliveryStore};
use clinora_core::{AppError, AppResult, DeliveryId, SubscriptionId, TenantId};
use clinora_domain::EventType;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed delivery store.
#[derive(Clone)]
pub struct PostgresDeliveryStore {
    pool: PgPool,
}

impl PostgresDeliveryStore {
    /// Creates a delivery store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    subscription_id: uuid::Uuid,
    event_type: String,
    payload: String,
    target_url: String,
    status: String,
    attempt_count: i32,
    next_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    response_status: Option<i16>,
    response_body: Option<String>,
    error_message: Option<String>,
    delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    failed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, FromRow)]
struct QueueStatsRow {
    pending: i64,
    retrying: i64,
    delivered: i64,
    failed: i64,
}

const DELIVERY_COLUMNS: &str = r#"
    id,
    tenant_id,
    subscription_id,
    event_type,
    payload,
    target_url,
    status,
    attempt_count,
    next_retry_at,
    response_status,
    response_body,
    error_message,
    delivered_at,
    failed_at,
    created_at
"#;

#[async_trait]
impl DeliveryStore for PostgresDeliveryStore {
    async fn enqueue(&self, deliveries: Vec<Delivery>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start delivery enqueue transaction: {error}"
            ))
        })?;

        for delivery in &deliveries {
            sqlx::query(
                r#"
                INSERT INTO webhook_deliveries (
                    id,
                    tenant_id,
                    subscription_id,
                    event_type,
                    payload,
                    target_url,
                    status,
                    attempt_count,
                    next_retry_at,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(delivery.id.as_uuid())
            .bind(delivery.tenant_id.as_uuid())
            .bind(delivery.subscription_id.as_uuid())
            .bind(delivery.event_type.as_str())
            .bind(delivery.payload.as_str())
            .bind(delivery.target_url.as_str())
            .bind(delivery.status.as_str())
            .bind(delivery.attempt_count)
            .bind(delivery.next_retry_at)
            .bind(delivery.created_at)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to enqueue delivery '{}' for tenant '{}': {error}",
                    delivery.id, delivery.tenant_id
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit delivery enqueue transaction: {error}"
            ))
        })?;

        Ok(())
    }

    async fn select_due(&self, limit: usize) -> AppResult<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM webhook_deliveries
            WHERE status IN ('pending', 'retrying')
              AND (next_retry_at IS NULL OR next_retry_at <= now())
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid delivery batch limit: {error}"))
        })?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to select due deliveries: {error}"))
        })?;

        rows.into_iter().map(delivery_from_row).collect()
    }

    async fn save(&self, delivery: &Delivery) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET
                status = $3,
                attempt_count = $4,
                next_retry_at = $5,
                response_status = $6,
                response_body = $7,
                error_message = $8,
                delivered_at = $9,
                failed_at = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(delivery.tenant_id.as_uuid())
        .bind(delivery.id.as_uuid())
        .bind(delivery.status.as_str())
        .bind(delivery.attempt_count)
        .bind(delivery.next_retry_at)
        .bind(delivery.response_status)
        .bind(delivery.response_body.as_deref())
        .bind(delivery.error_message.as_deref())
        .bind(delivery.delivered_at)
        .bind(delivery.failed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save delivery '{}' for tenant '{}': {error}",
                delivery.id, delivery.tenant_id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "delivery '{}' does not exist for tenant '{}'",
                delivery.id, delivery.tenant_id
            )));
        }

        Ok(())
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> AppResult<Option<Delivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM webhook_deliveries
            WHERE tenant_id = $1 AND id = $2
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(delivery_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find delivery '{delivery_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(delivery_from_row).transpose()
    }

    async fn list_by_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        limit: usize,
    ) -> AppResult<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM webhook_deliveries
            WHERE tenant_id = $1 AND subscription_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid delivery list limit: {error}"))
        })?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list deliveries for subscription '{subscription_id}' tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(delivery_from_row).collect()
    }

    async fn queue_stats(&self) -> AppResult<DeliveryQueueStats> {
        let row = sqlx::query_as::<_, QueueStatsRow>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN status = 'retrying' THEN 1 ELSE 0 END), 0) AS retrying,
                COALESCE(SUM(CASE WHEN status = 'delivered' THEN 1 ELSE 0 END), 0) AS delivered,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed
            FROM webhook_deliveries
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load delivery queue stats: {error}"))
        })?;

        Ok(DeliveryQueueStats {
            pending: row.pending,
            retrying: row.retrying,
            delivered: row.delivered,
            failed: row.failed,
        })
    }
}


fn delivery_from_row(row: DeliveryRow) -> AppResult<Delivery> {
    Ok(Delivery {
        id: DeliveryId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        subscription_id: SubscriptionId::from_uuid(row.subscription_id),
        event_type: EventType::new(row.event_type)?,
        payload: row.payload,
        target_url: row.target_url,
        status: DeliveryStatus::parse(row.status.as_str())?,
        attempt_count: row.attempt_count,
        next_retry_at: row.next_retry_at,
        response_status: row.response_status,
        response_body: row.response_body,
        error_message: row.error_message,
        delivered_at: row.delivered_at,
        failed_at: row.failed_at,
        created_at: row.created_at,
    })
}
