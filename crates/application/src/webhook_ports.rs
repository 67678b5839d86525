//! Ports between webhook application services and their adapters.

mod delivery;
mod registry;
mod secrets;
mod transport;

pub use delivery::{
    Delivery, DeliveryQueueStats, DeliveryStatus, DeliveryStore,
};
pub use registry::{
    Subscription, SubscriptionPatch, SubscriptionRegistry, SubscriptionStats,
};
pub use secrets::SecretEncryptor;
pub use transport::{DeliveryRequest, DeliveryTransport, TransportOutcome};
