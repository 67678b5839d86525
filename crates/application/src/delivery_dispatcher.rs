use std::sync::Arc;

use chrono::Utc;
use clinora_core::{AppError, AppResult, DeliveryId, TenantId};
use clinora_domain::RetryPolicy;

use crate::signer;
use crate::webhook_ports::{
    Delivery, DeliveryQueueStats, DeliveryRequest, DeliveryStatus, DeliveryStore,
    DeliveryTransport, SecretEncryptor, Subscription, SubscriptionRegistry, TransportOutcome,
};

mod attempt;
mod operator;

/// Scheduler for due webhook deliveries.
///
/// Runs from an independent periodic task: selects due rows, signs and
/// sends each one through the transport, and interprets the outcome into
/// the delivery state machine. Publishing never touches this service.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    registry: Arc<dyn SubscriptionRegistry>,
    store: Arc<dyn DeliveryStore>,
    transport: Arc<dyn DeliveryTransport>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
}

impl DeliveryDispatcher {
    /// Creates a delivery dispatcher.
    #[must_use]
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        Self {
            registry,
            store,
            transport,
            secret_encryptor,
        }
    }
}
