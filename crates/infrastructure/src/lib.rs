//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod http_delivery_transport;
mod postgres_delivery_store;
mod postgres_subscription_registry;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use http_delivery_transport::HttpDeliveryTransport;
pub use postgres_delivery_store::PostgresDeliveryStore;
pub use postgres_subscription_registry::PostgresSubscriptionRegistry;
