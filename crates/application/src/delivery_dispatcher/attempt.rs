use super::*;

impl DeliveryDispatcher {
    /// Runs one delivery attempt end to end and returns the updated row.
    ///
    /// Terminal rows are rejected: a `Delivered` delivery can never be
    /// retried, and a `Failed` one only re-enters through the explicit
    /// operator retry.
    pub async fn process_delivery(&self, delivery: Delivery) -> AppResult<Delivery> {
        if delivery.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "delivery '{}' is already {} and cannot be attempted",
                delivery.id,
                delivery.status.as_str()
            )));
        }

        let subscription = self
            .registry
            .find(delivery.tenant_id, delivery.subscription_id)
            .await?;

        let Some(subscription) =
            subscription.filter(|subscription| subscription.definition.is_active())
        else {
            return self.finalize_orphaned(delivery).await;
        };

        let policy = subscription.definition.retry_policy();
        let outcome = match self.sign_and_send(&delivery, &subscription).await {
            Ok(outcome) => outcome,
            // Signing or secret decryption problems consume an attempt like
            // any other failure so a broken subscription cannot keep a row
            // due forever.
            Err(error) => TransportOutcome::TransportError {
                message: error.to_string(),
            },
        };

        match outcome {
            TransportOutcome::Response { status, body } if (200..300).contains(&status) => {
                self.finalize_delivered(delivery, status, body).await
            }
            TransportOutcome::Response { status, body } => {
                self.record_failed_attempt(
                    delivery,
                    policy,
                    Some(to_status_code(status)),
                    Some(body),
                    format!("endpoint returned HTTP {status}"),
                )
                .await
            }
            TransportOutcome::TransportError { message } => {
                self.record_failed_attempt(delivery, policy, None, None, message)
                    .await
            }
        }
    }

    async fn sign_and_send(
        &self,
        delivery: &Delivery,
        subscription: &Subscription,
    ) -> AppResult<TransportOutcome> {
        let secret = self.secret_encryptor.decrypt(&subscription.secret)?;
        let signature = signer::sign_payload(delivery.payload.as_bytes(), &secret)?;

        Ok(self
            .transport
            .send(DeliveryRequest {
                target_url: delivery.target_url.clone(),
                payload: delivery.payload.clone().into_bytes(),
                signature,
                event_type: delivery.event_type.as_str().to_owned(),
                delivery_id: delivery.id,
            })
            .await)
    }

    async fn finalize_delivered(
        &self,
        mut delivery: Delivery,
        status: u16,
        body: String,
    ) -> AppResult<Delivery> {
        delivery.status = DeliveryStatus::Delivered;
        delivery.attempt_count += 1;
        delivery.next_retry_at = None;
        delivery.response_status = Some(to_status_code(status));
        delivery.response_body = Some(body);
        delivery.error_message = None;
        delivery.delivered_at = Some(Utc::now());

        self.store.save(&delivery).await?;
        self.registry
            .record_outcome(delivery.tenant_id, delivery.subscription_id, true)
            .await?;

        Ok(delivery)
    }

    async fn record_failed_attempt(
        &self,
        mut delivery: Delivery,
        policy: RetryPolicy,
        response_status: Option<i16>,
        response_body: Option<String>,
        error_message: String,
    ) -> AppResult<Delivery> {
        delivery.attempt_count += 1;
        delivery.response_status = response_status;
        delivery.response_body = response_body;
        delivery.error_message = Some(error_message);

        if policy.is_exhausted(delivery.attempt_count) {
            delivery.status = DeliveryStatus::Failed;
            delivery.next_retry_at = None;
            delivery.failed_at = Some(Utc::now());

            self.store.save(&delivery).await?;
            self.registry
                .record_outcome(delivery.tenant_id, delivery.subscription_id, false)
                .await?;
        } else {
            delivery.status = DeliveryStatus::Retrying;
            delivery.next_retry_at = Some(Utc::now() + policy.backoff_delay(delivery.attempt_count));

            self.store.save(&delivery).await?;
        }

        Ok(delivery)
    }

    /// Finalizes a delivery whose subscription was deleted or deactivated.
    ///
    /// No attempt is made and no counter updated; the subscription either
    /// no longer exists or explicitly paused deliveries.
    async fn finalize_orphaned(&self, mut delivery: Delivery) -> AppResult<Delivery> {
        delivery.status = DeliveryStatus::Failed;
        delivery.next_retry_at = None;
        delivery.error_message = Some("subscription inactive".to_owned());
        delivery.failed_at = Some(Utc::now());

        self.store.save(&delivery).await?;

        Ok(delivery)
    }
}

fn to_status_code(status: u16) -> i16 {
    i16::try_from(status).unwrap_or(i16::MAX)
}
