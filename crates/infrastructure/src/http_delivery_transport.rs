use std::time::Duration;

use async_trait::async_trait;
use clinora_application::{DeliveryRequest, DeliveryTransport, TransportOutcome};
use clinora_core::{AppError, AppResult};

/// Upper bound on stored response bodies; endpoints can return anything.
const MAX_RESPONSE_BODY_CHARS: usize = 4096;

/// HTTP transport for outbound webhook deliveries.
///
/// Sends one POST per attempt and never follows redirects: a redirect would
/// resend the signed body to an address the tenant never configured.
pub struct HttpDeliveryTransport {
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpDeliveryTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("clinora-webhooks/1.0")
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build webhook HTTP client: {error}"))
            })?;

        Ok(Self {
            http_client,
            request_timeout,
        })
    }
}

#[async_trait]
impl DeliveryTransport for HttpDeliveryTransport {
    async fn send(&self, request: DeliveryRequest) -> TransportOutcome {
        let response = self
            .http_client
            .post(request.target_url.as_str())
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", request.signature.as_str())
            .header("X-Webhook-Event", request.event_type.as_str())
            .header("X-Webhook-Delivery-Id", request.delivery_id.to_string())
            .body(request.payload)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response body unavailable>".to_owned());

                TransportOutcome::Response {
                    status,
                    body: truncate_body(body),
                }
            }
            Err(error) => TransportOutcome::TransportError {
                message: classify_error(&error, self.request_timeout),
            },
        }
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_RESPONSE_BODY_CHARS {
        return body;
    }

    body.chars().take(MAX_RESPONSE_BODY_CHARS).collect()
}

fn classify_error(error: &reqwest::Error, request_timeout: Duration) -> String {
    if error.is_timeout() {
        format!(
            "request timed out after {} seconds",
            request_timeout.as_secs()
        )
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("request failed: {error}")
    }
}
