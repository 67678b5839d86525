use std::sync::Arc;

use chrono::{DateTime, Utc};
use clinora_core::{AppError, AppResult, DeliveryId, TenantId};
use clinora_domain::EventType;
use serde::Serialize;
use serde_json::Value;

use crate::webhook_ports::{Delivery, DeliveryStatus, DeliveryStore, SubscriptionRegistry};

/// Fixed JSON wrapper around every delivered event payload.
///
/// Serialized once at publish time into the delivery's immutable payload;
/// receivers deduplicate on `id` because retries resend identical bytes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope<'a> {
    /// Delivery identifier.
    pub id: DeliveryId,
    /// Event type name.
    pub event: &'a str,
    /// Publish timestamp, shared by the whole fan-out of one event.
    pub timestamp: DateTime<Utc>,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Caller-supplied event payload.
    pub data: &'a Value,
}

/// Fans one domain event out into pending deliveries.
#[derive(Clone)]
pub struct EventPublisher {
    registry: Arc<dyn SubscriptionRegistry>,
    delivery_store: Arc<dyn DeliveryStore>,
}

impl EventPublisher {
    /// Creates an event publisher.
    #[must_use]
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        delivery_store: Arc<dyn DeliveryStore>,
    ) -> Self {
        Self {
            registry,
            delivery_store,
        }
    }

    /// Publishes one domain event to every matching active subscription.
    ///
    /// Creates exactly one pending delivery per match in a single atomic
    /// batch; zero matches is normal and produces no side effects. Never
    /// performs network I/O; the dispatcher picks the rows up on its own
    /// schedule.
    pub async fn publish(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        payload: Value,
    ) -> AppResult<Vec<DeliveryId>> {
        let event_type = EventType::new(event_type)?;

        let subscriptions = self
            .registry
            .list_active_for_event(tenant_id, &event_type)
            .await?;

        if subscriptions.is_empty() {
            return Ok(Vec::new());
        }

        let published_at = Utc::now();
        let mut deliveries = Vec::with_capacity(subscriptions.len());

        for subscription in &subscriptions {
            let delivery_id = DeliveryId::new();
            let envelope = WebhookEnvelope {
                id: delivery_id,
                event: event_type.as_str(),
                timestamp: published_at,
                tenant_id,
                data: &payload,
            };

            let body = serde_json::to_string(&envelope).map_err(|error| {
                AppError::Internal(format!(
                    "failed to serialize webhook envelope for delivery '{delivery_id}': {error}"
                ))
            })?;

            deliveries.push(Delivery {
                id: delivery_id,
                tenant_id,
                subscription_id: subscription.id,
                event_type: event_type.clone(),
                payload: body,
                target_url: subscription.definition.target_url().to_owned(),
                status: DeliveryStatus::Pending,
                attempt_count: 0,
                next_retry_at: None,
                response_status: None,
                response_body: None,
                error_message: None,
                delivered_at: None,
                failed_at: None,
                created_at: published_at,
            });
        }

        let delivery_ids = deliveries.iter().map(|delivery| delivery.id).collect();
        self.delivery_store.enqueue(deliveries).await?;

        Ok(delivery_ids)
    }
}

#[cfg(test)]
mod tests;
