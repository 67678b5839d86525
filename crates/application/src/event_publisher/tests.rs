use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clinora_core::{AppError, AppResult, DeliveryId, SubscriptionId, TenantId};
use clinora_domain::{
    EncryptedSecret, EventType, RetryPolicy, SubscriptionDefinition, SubscriptionDefinitionInput,
};
use serde_json::json;
use tokio::sync::Mutex;

use super::EventPublisher;
use crate::webhook_ports::{
    Delivery, DeliveryQueueStats, DeliveryStatus, DeliveryStore, Subscription,
    SubscriptionRegistry, SubscriptionStats,
};

#[derive(Default)]
struct FakeRegistry {
    subscriptions: Mutex<Vec<Subscription>>,
}

#[async_trait]
impl SubscriptionRegistry for FakeRegistry {
    async fn insert(&self, subscription: Subscription) -> AppResult<()> {
        self.subscriptions.lock().await.push(subscription);
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .iter()
            .find(|record| record.tenant_id == tenant_id && record.id == subscription_id)
            .cloned())
    }

    async fn list(&self, tenant_id: TenantId) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|record| record.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn update_definition(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
        _definition: SubscriptionDefinition,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn update_secret(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
        _secret: EncryptedSecret,
        _secret_version: i32,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn delete(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn list_active_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &EventType,
    ) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|record| {
                record.tenant_id == tenant_id && record.definition.accepts_event(event_type)
            })
            .cloned()
            .collect())
    }

    async fn record_outcome(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
        _success: bool,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Records each enqueue call as one batch to observe atomicity.
#[derive(Default)]
struct BatchRecordingStore {
    batches: Mutex<Vec<Vec<Delivery>>>,
}

#[async_trait]
impl DeliveryStore for BatchRecordingStore {
    async fn enqueue(&self, deliveries: Vec<Delivery>) -> AppResult<()> {
        self.batches.lock().await.push(deliveries);
        Ok(())
    }

    async fn select_due(&self, _limit: usize) -> AppResult<Vec<Delivery>> {
        Ok(Vec::new())
    }

    async fn save(&self, _delivery: &Delivery) -> AppResult<()> {
        Ok(())
    }

    async fn find(
        &self,
        _tenant_id: TenantId,
        _delivery_id: DeliveryId,
    ) -> AppResult<Option<Delivery>> {
        Ok(None)
    }

    async fn list_by_subscription(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
        _limit: usize,
    ) -> AppResult<Vec<Delivery>> {
        Ok(Vec::new())
    }

    async fn queue_stats(&self) -> AppResult<DeliveryQueueStats> {
        Ok(DeliveryQueueStats::default())
    }
}

fn publisher() -> (Arc<FakeRegistry>, Arc<BatchRecordingStore>, EventPublisher) {
    let registry = Arc::new(FakeRegistry::default());
    let store = Arc::new(BatchRecordingStore::default());
    let publisher = EventPublisher::new(registry.clone(), store.clone());
    (registry, store, publisher)
}

fn subscription(
    tenant_id: TenantId,
    target_url: &str,
    event_types: Vec<&str>,
    is_active: bool,
) -> AppResult<Subscription> {
    let event_types = event_types
        .into_iter()
        .map(EventType::new)
        .collect::<AppResult<Vec<_>>>()?;

    let definition = SubscriptionDefinition::new(SubscriptionDefinitionInput {
        name: "Intake sync".to_owned(),
        description: None,
        target_url: target_url.to_owned(),
        event_types,
        retry_policy: RetryPolicy::default(),
        is_active,
    })?;

    let now = Utc::now();
    Ok(Subscription {
        id: SubscriptionId::new(),
        tenant_id,
        definition,
        secret: EncryptedSecret::new(b"whsec_test".to_vec()),
        secret_version: 1,
        stats: SubscriptionStats::default(),
        created_at: now,
        updated_at: now,
    })
}

#[tokio::test]
async fn publish_fans_out_to_every_matching_subscription() -> AppResult<()> {
    let (registry, store, publisher) = publisher();
    let tenant_id = TenantId::new();

    let first = subscription(
        tenant_id,
        "https://hooks.example.org/a",
        vec!["appointment.created"],
        true,
    )?;
    let second = subscription(
        tenant_id,
        "https://hooks.example.org/b",
        vec!["appointment.created", "appointment.cancelled"],
        true,
    )?;
    let unrelated = subscription(
        tenant_id,
        "https://hooks.example.org/c",
        vec!["patient.updated"],
        true,
    )?;
    let paused = subscription(
        tenant_id,
        "https://hooks.example.org/d",
        vec!["appointment.created"],
        false,
    )?;

    for record in [first.clone(), second.clone(), unrelated, paused] {
        registry.insert(record).await?;
    }

    let ids = publisher
        .publish(tenant_id, "appointment.created", json!({"appointmentId": 7}))
        .await?;

    assert_eq!(ids.len(), 2);

    let batches = store.batches.lock().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);

    let targets: Vec<&str> = batches[0]
        .iter()
        .map(|delivery| delivery.target_url.as_str())
        .collect();
    assert!(targets.contains(&first.definition.target_url()));
    assert!(targets.contains(&second.definition.target_url()));

    for delivery in &batches[0] {
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.attempt_count, 0);
        assert!(delivery.next_retry_at.is_none());
        assert!(ids.contains(&delivery.id));
    }
    Ok(())
}

#[tokio::test]
async fn publish_without_matches_is_a_no_op() -> AppResult<()> {
    let (_registry, store, publisher) = publisher();

    let ids = publisher
        .publish(TenantId::new(), "appointment.created", json!({}))
        .await?;

    assert!(ids.is_empty());
    assert!(store.batches.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn publish_rejects_malformed_event_types() {
    let (_registry, _store, publisher) = publisher();

    let result = publisher
        .publish(TenantId::new(), "Appointment Created!", json!({}))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn publish_is_tenant_scoped() -> AppResult<()> {
    let (registry, store, publisher) = publisher();
    let tenant_id = TenantId::new();

    registry
        .insert(subscription(
            tenant_id,
            "https://hooks.example.org/a",
            vec!["appointment.created"],
            true,
        )?)
        .await?;

    let ids = publisher
        .publish(TenantId::new(), "appointment.created", json!({}))
        .await?;

    assert!(ids.is_empty());
    assert!(store.batches.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn envelope_carries_identity_event_and_payload() -> AppResult<()> {
    let (registry, store, publisher) = publisher();
    let tenant_id = TenantId::new();

    registry
        .insert(subscription(
            tenant_id,
            "https://hooks.example.org/a",
            vec!["appointment.created"],
            true,
        )?)
        .await?;

    let ids = publisher
        .publish(
            tenant_id,
            "appointment.created",
            json!({"appointmentId": 7, "clinicId": "north"}),
        )
        .await?;

    let batches = store.batches.lock().await;
    let delivery = &batches[0][0];

    let envelope: serde_json::Value = serde_json::from_str(delivery.payload.as_str())
        .map_err(|error| AppError::Internal(error.to_string()))?;

    assert_eq!(envelope["id"], json!(ids[0].to_string()));
    assert_eq!(envelope["event"], json!("appointment.created"));
    assert_eq!(envelope["tenantId"], json!(tenant_id.to_string()));
    assert_eq!(envelope["data"], json!({"appointmentId": 7, "clinicId": "north"}));
    assert!(envelope["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn fan_out_shares_one_timestamp_but_unique_delivery_ids() -> AppResult<()> {
    let (registry, store, publisher) = publisher();
    let tenant_id = TenantId::new();

    for target in ["https://hooks.example.org/a", "https://hooks.example.org/b"] {
        registry
            .insert(subscription(
                tenant_id,
                target,
                vec!["appointment.created"],
                true,
            )?)
            .await?;
    }

    let ids = publisher
        .publish(tenant_id, "appointment.created", json!({}))
        .await?;
    assert_ne!(ids[0], ids[1]);

    let batches = store.batches.lock().await;
    let parse = |delivery: &Delivery| -> AppResult<serde_json::Value> {
        serde_json::from_str(delivery.payload.as_str())
            .map_err(|error| AppError::Internal(error.to_string()))
    };

    let first = parse(&batches[0][0])?;
    let second = parse(&batches[0][1])?;
    assert_eq!(first["timestamp"], second["timestamp"]);
    assert_ne!(first["id"], second["id"]);
    Ok(())
}
