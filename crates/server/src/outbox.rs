//! Outbox drain worker.
//!
//! Polls the durable email outbox, claims due entries, and pushes each one
//! through the dispatch gateway. Delivery failures are classified: transport
//! and provider errors retry with exponential backoff, while render and
//! template errors park the entry terminally since redelivery cannot fix a
//! payload that never renders. Delivery is at-least-once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use scholar_core::config::OutboxConfig;
use scholar_core::domain::notification::NotificationPayload;
use scholar_core::domain::outbox::{OutboxEmail, OutboxState};
use scholar_db::repositories::OutboxRepository;
use scholar_mail::gateway::{DispatchError, DispatchGateway};

pub struct OutboxWorker {
    outbox: Arc<dyn OutboxRepository>,
    gateway: Arc<DispatchGateway>,
    config: OutboxConfig,
    worker_id: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub sent: usize,
    pub retried: usize,
    pub failed_terminal: usize,
}

impl OutboxWorker {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        gateway: Arc<DispatchGateway>,
        config: OutboxConfig,
    ) -> Self {
        let worker_id = format!("outbox-{}", Uuid::new_v4());
        Self { outbox, gateway, config, worker_id }
    }

    /// Run the drain loop until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                event_name = "outbox.worker.started",
                worker_id = %self.worker_id,
                poll_interval_secs = self.config.poll_interval_secs,
                batch_size = self.config.batch_size,
                "outbox drain worker started"
            );

            let mut ticker =
                tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
            loop {
                ticker.tick().await;
                if let Err(err) = self.drain_once().await {
                    error!(
                        event_name = "outbox.worker.drain_failed",
                        worker_id = %self.worker_id,
                        error = %err,
                        "outbox drain pass failed"
                    );
                }
            }
        })
    }

    /// One drain pass: claim due entries and attempt delivery for each.
    pub async fn drain_once(&self) -> Result<DrainSummary, scholar_db::repositories::RepositoryError> {
        let now = Utc::now();
        let claimed = self
            .outbox
            .claim_due(now, self.config.claim_lease_secs, self.config.batch_size, &self.worker_id)
            .await?;

        let mut summary = DrainSummary::default();
        for entry in claimed {
            let outcome = self.deliver(entry).await?;
            match outcome {
                OutboxState::Sent => summary.sent += 1,
                OutboxState::RetryableFailed => summary.retried += 1,
                _ => summary.failed_terminal += 1,
            }
        }
        Ok(summary)
    }

    async fn deliver(
        &self,
        mut entry: OutboxEmail,
    ) -> Result<OutboxState, scholar_db::repositories::RepositoryError> {
        let now = Utc::now();

        let payload: NotificationPayload = match serde_json::from_str(&entry.payload_json) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    event_name = "outbox.entry.payload_invalid",
                    outbox_id = %entry.id.0,
                    request_id = %entry.service_request_id.0,
                    error = %err,
                    "stored payload does not decode; parking entry"
                );
                entry.record_terminal_failure(format!("payload decode failed: {err}"), now);
                let state = entry.state;
                self.outbox.save(entry).await?;
                return Ok(state);
            }
        };

        let recipients = vec![entry.recipient.clone()];
        match self.gateway.send(entry.template, &recipients, &payload).await {
            Ok(receipt) => {
                info!(
                    event_name = "outbox.entry.sent",
                    outbox_id = %entry.id.0,
                    request_id = %entry.service_request_id.0,
                    template = entry.template.as_str(),
                    provider_message_id = receipt.provider_message_id.as_deref().unwrap_or(""),
                    "outbox entry delivered"
                );
                entry.record_success(now);
            }
            Err(err @ (DispatchError::InvalidTemplate(_) | DispatchError::Render(_))) => {
                warn!(
                    event_name = "outbox.entry.failed_terminal",
                    outbox_id = %entry.id.0,
                    request_id = %entry.service_request_id.0,
                    class = err.class(),
                    error = %err,
                    "outbox entry cannot render; parking entry"
                );
                entry.record_terminal_failure(err.to_string(), now);
            }
            Err(err) => {
                entry.record_failure(err.to_string(), self.config.retry_base_secs, now);
                warn!(
                    event_name = "outbox.entry.delivery_failed",
                    outbox_id = %entry.id.0,
                    request_id = %entry.service_request_id.0,
                    class = err.class(),
                    retry_count = entry.retry_count,
                    state = entry.state.as_str(),
                    error = %err,
                    "outbox entry delivery failed"
                );
            }
        }

        let state = entry.state;
        self.outbox.save(entry).await?;
        Ok(state)
    }
}
