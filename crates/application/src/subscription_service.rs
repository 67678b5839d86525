use std::sync::Arc;

use chrono::Utc;
use clinora_core::{AppError, AppResult, SubscriptionId, TenantId};
use clinora_domain::{
    EventType, RetryPolicy, SigningSecret, SubscriptionDefinition, SubscriptionDefinitionInput,
};

use crate::webhook_ports::{
    SecretEncryptor, Subscription, SubscriptionPatch, SubscriptionRegistry, SubscriptionStats,
};

/// Input payload for creating one webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionInput {
    /// User-facing subscription name.
    pub name: String,
    /// Optional subscription description.
    pub description: Option<String>,
    /// Endpoint URL deliveries are posted to.
    pub target_url: String,
    /// Event types this subscription wants delivered.
    pub event_types: Vec<String>,
    /// Maximum delivery attempts per event.
    pub max_attempts: u16,
    /// Base retry delay in seconds.
    pub base_delay_seconds: u32,
}

/// Tenant-facing subscription management service.
#[derive(Clone)]
pub struct SubscriptionService {
    registry: Arc<dyn SubscriptionRegistry>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
}

impl SubscriptionService {
    /// Creates a subscription service.
    #[must_use]
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        Self {
            registry,
            secret_encryptor,
        }
    }

    /// Creates one active subscription and returns it together with the
    /// plaintext signing secret.
    ///
    /// The plaintext secret is revealed exactly here; the registry only
    /// ever sees the encrypted form.
    pub async fn create_subscription(
        &self,
        tenant_id: TenantId,
        input: CreateSubscriptionInput,
    ) -> AppResult<(Subscription, SigningSecret)> {
        let definition = SubscriptionDefinition::new(SubscriptionDefinitionInput {
            name: input.name,
            description: input.description,
            target_url: input.target_url,
            event_types: parse_event_types(input.event_types)?,
            retry_policy: RetryPolicy::new(input.max_attempts, input.base_delay_seconds)?,
            is_active: true,
        })?;

        let secret = generate_signing_secret()?;
        let encrypted = self.secret_encryptor.encrypt(&secret)?;
        let now = Utc::now();

        let subscription = Subscription {
            id: SubscriptionId::new(),
            tenant_id,
            definition,
            secret: encrypted,
            secret_version: 1,
            stats: SubscriptionStats::default(),
            created_at: now,
            updated_at: now,
        };

        self.registry.insert(subscription.clone()).await?;

        Ok((subscription, secret))
    }

    /// Applies a partial update to one subscription's definition.
    pub async fn update_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> AppResult<Subscription> {
        if patch
            .target_url
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(AppError::Validation(
                "target_url must not be empty".to_owned(),
            ));
        }

        let mut subscription = self.require_subscription(tenant_id, subscription_id).await?;
        let current = &subscription.definition;
        let current_policy = current.retry_policy();

        let event_types = match patch.event_types {
            Some(values) => parse_event_types(values)?,
            None => current.event_types().to_vec(),
        };

        let definition = SubscriptionDefinition::new(SubscriptionDefinitionInput {
            name: patch
                .name
                .unwrap_or_else(|| current.name().as_str().to_owned()),
            description: match patch.description {
                Some(value) => value,
                None => current.description().map(str::to_owned),
            },
            target_url: patch
                .target_url
                .unwrap_or_else(|| current.target_url().to_owned()),
            event_types,
            retry_policy: RetryPolicy::new(
                patch.max_attempts.unwrap_or(current_policy.max_attempts()),
                patch
                    .base_delay_seconds
                    .unwrap_or(current_policy.base_delay_seconds()),
            )?,
            is_active: current.is_active(),
        })?;

        self.registry
            .update_definition(tenant_id, subscription_id, definition.clone())
            .await?;

        subscription.definition = definition;
        subscription.updated_at = Utc::now();
        Ok(subscription)
    }

    /// Resumes deliveries for one subscription.
    pub async fn activate_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Subscription> {
        self.set_active(tenant_id, subscription_id, true).await
    }

    /// Pauses deliveries for one subscription.
    ///
    /// Already-enqueued deliveries are not cancelled; the dispatcher
    /// finalizes them against the inactive subscription.
    pub async fn deactivate_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Subscription> {
        self.set_active(tenant_id, subscription_id, false).await
    }

    /// Replaces the signing secret and bumps the key version.
    ///
    /// Signatures computed with the old secret stay valid for deliveries
    /// already confirmed; every attempt from now on signs with the new one.
    pub async fn regenerate_secret(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<SigningSecret> {
        let subscription = self.require_subscription(tenant_id, subscription_id).await?;

        let secret = generate_signing_secret()?;
        let encrypted = self.secret_encryptor.encrypt(&secret)?;

        self.registry
            .update_secret(
                tenant_id,
                subscription_id,
                encrypted,
                subscription.secret_version + 1,
            )
            .await?;

        Ok(secret)
    }

    /// Permanently removes one subscription.
    pub async fn delete_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<()> {
        self.require_subscription(tenant_id, subscription_id).await?;
        self.registry.delete(tenant_id, subscription_id).await
    }

    /// Returns one subscription by id.
    pub async fn get_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Subscription> {
        self.require_subscription(tenant_id, subscription_id).await
    }

    /// Lists all subscriptions for a tenant.
    pub async fn list_subscriptions(&self, tenant_id: TenantId) -> AppResult<Vec<Subscription>> {
        self.registry.list(tenant_id).await
    }

    async fn set_active(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        is_active: bool,
    ) -> AppResult<Subscription> {
        let mut subscription = self.require_subscription(tenant_id, subscription_id).await?;
        let definition = subscription.definition.clone().with_active(is_active)?;

        self.registry
            .update_definition(tenant_id, subscription_id, definition.clone())
            .await?;

        subscription.definition = definition;
        subscription.updated_at = Utc::now();
        Ok(subscription)
    }

    async fn require_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Subscription> {
        self.registry
            .find(tenant_id, subscription_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
                ))
            })
    }
}

fn parse_event_types(values: Vec<String>) -> AppResult<Vec<EventType>> {
    values.into_iter().map(EventType::new).collect()
}

/// Generates a cryptographically random signing secret.
///
/// 32 random bytes, hex-encoded with a `whsec_` prefix so the credential is
/// recognizable in tenant configuration.
fn generate_signing_secret() -> AppResult<SigningSecret> {
    use std::fmt::Write;

    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|error| {
        AppError::Internal(format!("failed to generate signing secret: {error}"))
    })?;

    let encoded = bytes
        .iter()
        .fold(String::with_capacity(70), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        });

    SigningSecret::new(format!("whsec_{encoded}"))
}
