//! Application services and ports for the webhook delivery engine.

#![forbid(unsafe_code)]

mod delivery_dispatcher;
mod event_publisher;
pub mod signer;
mod subscription_service;
mod webhook_ports;

pub use delivery_dispatcher::DeliveryDispatcher;
pub use event_publisher::{EventPublisher, WebhookEnvelope};
pub use subscription_service::{CreateSubscriptionInput, SubscriptionService};
pub use webhook_ports::{
    Delivery, DeliveryQueueStats, DeliveryRequest, DeliveryStatus, DeliveryStore,
    DeliveryTransport, SecretEncryptor, Subscription, SubscriptionPatch, SubscriptionRegistry,
    SubscriptionStats, TransportOutcome,
};
