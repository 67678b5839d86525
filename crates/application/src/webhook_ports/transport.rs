use async_trait::async_trait;
use clinora_core::DeliveryId;

/// Outbound webhook request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Endpoint the request is posted to.
    pub target_url: String,
    /// Raw request body bytes; already signed, must be sent unmodified.
    pub payload: Vec<u8>,
    /// Signature header value computed over the body.
    pub signature: String,
    /// Event type header value.
    pub event_type: String,
    /// Delivery id header value for receiver-side deduplication.
    pub delivery_id: DeliveryId,
}

/// Result of one transport attempt.
///
/// The transport reports what happened without judging it; classification
/// into success/retry/failure is the dispatcher's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The endpoint answered with some HTTP status.
    Response {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated by the transport.
        body: String,
    },
    /// No HTTP response: timeout, connection failure, or request error.
    TransportError {
        /// Failure description.
        message: String,
    },
}

/// Transport port used by the dispatcher to attempt deliveries.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Sends one delivery attempt and reports its outcome.
    async fn send(&self, request: DeliveryRequest) -> TransportOutcome;
}
