use clinora_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::event::EventType;
use crate::retry::RetryPolicy;

/// Tenant-configured webhook subscription definition.
///
/// Covers everything a tenant controls: where deliveries go, which events
/// are wanted, and how persistently the dispatcher retries. Identity,
/// credentials, and rolling counters live on the persisted subscription
/// record, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDefinition {
    name: NonEmptyString,
    description: Option<String>,
    target_url: String,
    event_types: Vec<EventType>,
    retry_policy: RetryPolicy,
    is_active: bool,
}

/// Input payload used to construct a validated subscription definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDefinitionInput {
    /// User-facing subscription name.
    pub name: String,
    /// Optional subscription description.
    pub description: Option<String>,
    /// Endpoint URL deliveries are posted to.
    pub target_url: String,
    /// Event types this subscription wants delivered.
    pub event_types: Vec<EventType>,
    /// Retry budget and backoff configuration.
    pub retry_policy: RetryPolicy,
    /// Whether the subscription currently receives deliveries.
    pub is_active: bool,
}

impl SubscriptionDefinition {
    /// Creates a validated subscription definition.
    pub fn new(input: SubscriptionDefinitionInput) -> AppResult<Self> {
        let SubscriptionDefinitionInput {
            name,
            description,
            target_url,
            event_types,
            retry_policy,
            is_active,
        } = input;

        let target_url = validate_target_url(target_url.as_str())?;
        let event_types = dedupe_event_types(event_types);

        if is_active && event_types.is_empty() {
            return Err(AppError::Validation(
                "an active subscription requires at least one event type".to_owned(),
            ));
        }

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            name: NonEmptyString::new(name)?,
            description,
            target_url,
            event_types,
            retry_policy,
            is_active,
        })
    }

    /// Returns the subscription name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the delivery endpoint URL.
    #[must_use]
    pub fn target_url(&self) -> &str {
        self.target_url.as_str()
    }

    /// Returns the subscribed event types.
    #[must_use]
    pub fn event_types(&self) -> &[EventType] {
        self.event_types.as_slice()
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Returns whether the subscription currently receives deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether an event of the given type should be delivered.
    #[must_use]
    pub fn accepts_event(&self, event_type: &EventType) -> bool {
        self.is_active && self.event_types.contains(event_type)
    }

    /// Returns the definition with the active flag changed, re-validating
    /// the activation invariant.
    pub fn with_active(self, is_active: bool) -> AppResult<Self> {
        if is_active && self.event_types.is_empty() {
            return Err(AppError::Validation(
                "an active subscription requires at least one event type".to_owned(),
            ));
        }

        Ok(Self { is_active, ..self })
    }
}

fn validate_target_url(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "target_url must not be empty".to_owned(),
        ));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|error| AppError::Validation(format!("invalid target_url '{trimmed}': {error}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "target_url scheme must be http or https, got '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(AppError::Validation(
            "target_url must include a host".to_owned(),
        ));
    }

    Ok(trimmed.to_owned())
}

fn dedupe_event_types(event_types: Vec<EventType>) -> Vec<EventType> {
    let mut deduped: Vec<EventType> = Vec::with_capacity(event_types.len());
    for event_type in event_types {
        if !deduped.contains(&event_type) {
            deduped.push(event_type);
        }
    }

    deduped
}
