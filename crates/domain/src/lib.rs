//! Domain entities and invariants for the webhook delivery engine.

#![forbid(unsafe_code)]

mod event;
mod retry;
mod secret;
mod subscription;

pub use event::EventType;
pub use retry::{MAX_BACKOFF_SECONDS, RetryPolicy};
pub use secret::{EncryptedSecret, SigningSecret};
pub use subscription::{SubscriptionDefinition, SubscriptionDefinitionInput};
