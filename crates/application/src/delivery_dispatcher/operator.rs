use clinora_core::SubscriptionId;

use super::*;

impl DeliveryDispatcher {
    /// Returns up to `limit` deliveries due for an attempt, oldest first.
    pub async fn select_due(&self, limit: usize) -> AppResult<Vec<Delivery>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "batch limit must be greater than zero".to_owned(),
            ));
        }

        self.store.select_due(limit).await
    }

    /// Re-enqueues one terminally failed delivery for an immediate attempt.
    ///
    /// Only `Failed` rows qualify; the attempt count is preserved so the
    /// retry budget check applies to the extra attempt too.
    pub async fn retry_failed(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> AppResult<Delivery> {
        let mut delivery = self.require_delivery(tenant_id, delivery_id).await?;

        match delivery.status {
            DeliveryStatus::Failed => {}
            DeliveryStatus::Delivered => {
                return Err(AppError::Conflict(format!(
                    "delivery '{delivery_id}' already succeeded and cannot be retried"
                )));
            }
            DeliveryStatus::Pending | DeliveryStatus::Retrying => {
                return Err(AppError::Conflict(format!(
                    "delivery '{delivery_id}' is still in flight"
                )));
            }
        }

        delivery.status = DeliveryStatus::Retrying;
        delivery.next_retry_at = Some(Utc::now());
        delivery.failed_at = None;

        self.store.save(&delivery).await?;

        Ok(delivery)
    }

    /// Returns one delivery by id.
    pub async fn get_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> AppResult<Delivery> {
        self.require_delivery(tenant_id, delivery_id).await
    }

    /// Lists recent deliveries for one subscription, newest first.
    pub async fn list_deliveries(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        limit: usize,
    ) -> AppResult<Vec<Delivery>> {
        self.store
            .list_by_subscription(tenant_id, subscription_id, limit)
            .await
    }

    /// Returns per-status row counts across the delivery store.
    pub async fn queue_stats(&self) -> AppResult<DeliveryQueueStats> {
        self.store.queue_stats().await
    }

    async fn require_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> AppResult<Delivery> {
        self.store
            .find(tenant_id, delivery_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "delivery '{delivery_id}' does not exist for tenant '{tenant_id}'"
                ))
            })
    }
}
