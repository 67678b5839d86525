use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinora_core::{AppError, AppResult, DeliveryId, SubscriptionId, TenantId};
use clinora_domain::EventType;

/// Lifecycle state of one delivery record.
///
/// Transitions are monotonic: `Pending` and `Retrying` lead to `Delivered`
/// or `Failed`, and the terminal states never transition automatically.
/// An operator can move `Failed` back to `Retrying` exactly one attempt's
/// worth via manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Created by the publisher, not yet attempted.
    Pending,
    /// Attempted at least once, waiting for its next retry slot.
    Retrying,
    /// Confirmed by the endpoint with a 2xx response. Terminal.
    Delivered,
    /// Attempt budget exhausted or subscription gone. Terminal.
    Failed,
}

impl DeliveryStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "retrying" => Ok(Self::Retrying),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown delivery status '{value}'"
            ))),
        }
    }

    /// Returns whether the status permits no further automatic transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// Persisted delivery record: one event payload bound for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Delivery identifier, also sent to the receiver for deduplication.
    pub id: DeliveryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Subscription this delivery belongs to.
    pub subscription_id: SubscriptionId,
    /// Event type carried by the payload.
    pub event_type: EventType,
    /// Serialized envelope, immutable after creation. Every attempt resends
    /// these exact bytes.
    pub payload: String,
    /// Endpoint URL captured at enqueue time.
    pub target_url: String,
    /// Current lifecycle state.
    pub status: DeliveryStatus,
    /// Number of attempts made so far. Only ever increases.
    pub attempt_count: i32,
    /// Earliest time of the next attempt; `None` means due immediately.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// HTTP status of the last attempt, when a response was received.
    pub response_status: Option<i16>,
    /// Truncated response body of the last attempt.
    pub response_body: Option<String>,
    /// Failure description of the last attempt.
    pub error_message: Option<String>,
    /// Timestamp of the successful attempt.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Timestamp of terminal failure.
    pub failed_at: Option<DateTime<Utc>>,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
}

/// Per-status row counts for operator observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryQueueStats {
    /// Deliveries not yet attempted.
    pub pending: i64,
    /// Deliveries waiting for a retry slot.
    pub retrying: i64,
    /// Deliveries confirmed by endpoints.
    pub delivered: i64,
    /// Deliveries in terminal failure.
    pub failed: i64,
}

/// Durable store port for delivery records.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Persists a batch of new deliveries atomically: either every row is
    /// written or none is.
    async fn enqueue(&self, deliveries: Vec<Delivery>) -> AppResult<()>;

    /// Returns up to `limit` deliveries that are due for an attempt,
    /// oldest first.
    async fn select_due(&self, limit: usize) -> AppResult<Vec<Delivery>>;

    /// Updates one delivery row in place.
    async fn save(&self, delivery: &Delivery) -> AppResult<()>;

    /// Returns one delivery by id.
    async fn find(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> AppResult<Option<Delivery>>;

    /// Lists deliveries for one subscription, newest first.
    async fn list_by_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        limit: usize,
    ) -> AppResult<Vec<Delivery>>;

    /// Returns per-status row counts across the store.
    async fn queue_stats(&self) -> AppResult<DeliveryQueueStats>;
}
