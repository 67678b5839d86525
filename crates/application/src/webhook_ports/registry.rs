use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinora_core::{AppResult, SubscriptionId, TenantId};
use clinora_domain::{EncryptedSecret, EventType, SubscriptionDefinition};

/// Rolling delivery counters kept on every subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Deliveries that reached a terminal state.
    pub total_deliveries: i64,
    /// Deliveries confirmed by the endpoint.
    pub successful_deliveries: i64,
    /// Deliveries that exhausted their attempt budget.
    pub failed_deliveries: i64,
    /// Timestamp of the most recent terminal delivery.
    pub last_delivery_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent successful delivery.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent failed delivery.
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Persisted webhook subscription record.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Tenant-configured definition.
    pub definition: SubscriptionDefinition,
    /// Signing secret, encrypted at rest.
    pub secret: EncryptedSecret,
    /// Current signing key version, bumped on every rotation.
    pub secret_version: i32,
    /// Rolling delivery counters.
    pub stats: SubscriptionStats,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a subscription definition.
///
/// `None` fields keep their current value. The active flag is changed via
/// the dedicated activate/deactivate operations, never through a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPatch {
    /// New subscription name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New delivery endpoint URL. Must not be empty when provided.
    pub target_url: Option<String>,
    /// Replacement event type set.
    pub event_types: Option<Vec<String>>,
    /// New maximum attempt count.
    pub max_attempts: Option<u16>,
    /// New base retry delay in seconds.
    pub base_delay_seconds: Option<u32>,
}

/// Repository port for webhook subscriptions.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Persists one new subscription record.
    async fn insert(&self, subscription: Subscription) -> AppResult<()>;

    /// Returns one subscription by id.
    async fn find(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<Subscription>>;

    /// Lists all subscriptions for a tenant.
    async fn list(&self, tenant_id: TenantId) -> AppResult<Vec<Subscription>>;

    /// Replaces the tenant-configured definition of one subscription.
    async fn update_definition(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        definition: SubscriptionDefinition,
    ) -> AppResult<()>;

    /// Replaces the encrypted secret and key version of one subscription.
    async fn update_secret(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        secret: EncryptedSecret,
        secret_version: i32,
    ) -> AppResult<()>;

    /// Permanently removes one subscription.
    async fn delete(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<()>;

    /// Lists active subscriptions subscribed to one event type.
    ///
    /// This is the hot path of every publish; implementations must index
    /// by (tenant, active, event type) rather than scan.
    async fn list_active_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &EventType,
    ) -> AppResult<Vec<Subscription>>;

    /// Records one terminal delivery outcome on the rolling counters.
    ///
    /// Implementations must apply this as an atomic increment: outcomes for
    /// the same subscription can land concurrently within one dispatcher
    /// cycle.
    async fn record_outcome(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        success: bool,
    ) -> AppResult<()>;
}
