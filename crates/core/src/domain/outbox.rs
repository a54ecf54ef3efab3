use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::notification::EmailTemplate;
use crate::domain::request::RequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboxEmailId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxState {
    Queued,
    Sending,
    RetryableFailed,
    FailedTerminal,
    Sent,
}

impl OutboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::RetryableFailed => "retryable_failed",
            Self::FailedTerminal => "failed_terminal",
            Self::Sent => "sent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "sending" => Some(Self::Sending),
            "retryable_failed" => Some(Self::RetryableFailed),
            "failed_terminal" => Some(Self::FailedTerminal),
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }
}

/// Durable record of a pending email side effect.
///
/// A row is written in the same transaction as the state transition that
/// triggered it, so a crash between the store write and dispatch loses
/// nothing: the drain worker picks the row up on its next pass
/// (at-least-once delivery).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEmail {
    pub id: OutboxEmailId,
    pub service_request_id: RequestId,
    pub template: EmailTemplate,
    pub recipient: String,
    pub payload_json: String,
    pub state: OutboxState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub available_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxEmail {
    pub fn queued(
        id: OutboxEmailId,
        service_request_id: RequestId,
        template: EmailTemplate,
        recipient: String,
        payload_json: String,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            service_request_id,
            template,
            recipient,
            payload_json,
            state: OutboxState::Queued,
            retry_count: 0,
            max_retries,
            available_at: now,
            claimed_by: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a dispatch failure: schedule a retry with exponential backoff,
    /// or park the entry terminally once retries are exhausted.
    pub fn record_failure(&mut self, error: String, retry_base_secs: u64, now: DateTime<Utc>) {
        self.last_error = Some(error);
        self.claimed_by = None;
        self.updated_at = now;

        if self.retry_count >= self.max_retries {
            self.state = OutboxState::FailedTerminal;
            return;
        }

        let backoff_secs = retry_base_secs.saturating_mul(1u64 << self.retry_count.min(16));
        self.retry_count += 1;
        self.state = OutboxState::RetryableFailed;
        self.available_at = now + Duration::seconds(backoff_secs as i64);
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.state = OutboxState::Sent;
        self.claimed_by = None;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Park the entry without retrying: the stored payload or template can
    /// never render, so redelivery is pointless.
    pub fn record_terminal_failure(&mut self, error: String, now: DateTime<Utc>) {
        self.state = OutboxState::FailedTerminal;
        self.claimed_by = None;
        self.last_error = Some(error);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::notification::EmailTemplate;
    use crate::domain::request::RequestId;

    use super::{OutboxEmail, OutboxEmailId, OutboxState};

    fn entry(max_retries: u32) -> OutboxEmail {
        OutboxEmail::queued(
            OutboxEmailId("out-1".to_string()),
            RequestId("req-1".to_string()),
            EmailTemplate::RequestConfirmation,
            "client@example.com".to_string(),
            "{}".to_string(),
            max_retries,
            Utc::now(),
        )
    }

    #[test]
    fn state_round_trips_from_storage_encoding() {
        let cases = [
            OutboxState::Queued,
            OutboxState::Sending,
            OutboxState::RetryableFailed,
            OutboxState::FailedTerminal,
            OutboxState::Sent,
        ];

        for state in cases {
            assert_eq!(OutboxState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn failures_back_off_exponentially_until_retries_are_exhausted() {
        let mut entry = entry(2);
        let now = Utc::now();

        entry.record_failure("provider down".to_string(), 30, now);
        assert_eq!(entry.state, OutboxState::RetryableFailed);
        assert_eq!(entry.retry_count, 1);
        assert_eq!((entry.available_at - now).num_seconds(), 30);

        entry.record_failure("provider down".to_string(), 30, now);
        assert_eq!(entry.retry_count, 2);
        assert_eq!((entry.available_at - now).num_seconds(), 60);

        entry.record_failure("provider down".to_string(), 30, now);
        assert_eq!(entry.state, OutboxState::FailedTerminal);
        assert_eq!(entry.retry_count, 2, "terminal failure must not bump the retry count");
    }

    #[test]
    fn success_clears_claim_and_error() {
        let mut entry = entry(3);
        entry.claimed_by = Some("worker-1".to_string());
        entry.last_error = Some("transient".to_string());

        entry.record_success(Utc::now());
        assert_eq!(entry.state, OutboxState::Sent);
        assert_eq!(entry.claimed_by, None);
        assert_eq!(entry.last_error, None);
    }

    #[test]
    fn malformed_payload_parks_terminally_without_retry() {
        let mut entry = entry(5);
        entry.record_terminal_failure("payload decode failed".to_string(), Utc::now());
        assert_eq!(entry.state, OutboxState::FailedTerminal);
        assert_eq!(entry.retry_count, 0);
    }
}
