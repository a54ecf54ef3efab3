//! Mail transports.
//!
//! `MailTransport` abstracts the outbound provider. Three runtime
//! implementations are selected by `mail.backend`: the HTTP provider API
//! (production), async SMTP (local Mailpit or a relay), and a noop that logs
//! through tracing (dev). `CaptureTransport` collects messages in memory for
//! tests and can be programmed to fail.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::gateway::DispatchError;

/// A rendered message ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

/// Provider acknowledgement, echoed back to the `/api/send-email` caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub provider_message_id: Option<String>,
    pub provider_response: Value,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<DispatchReceipt, DispatchError>;
}

/// HTTP provider transport (Resend-style JSON API).
pub struct HttpProviderTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Serialize)]
struct ProviderSendBody<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

impl HttpProviderTransport {
    pub fn new(base_url: String, api_key: SecretString, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key }
    }
}

#[async_trait]
impl MailTransport for HttpProviderTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<DispatchReceipt, DispatchError> {
        let body = ProviderSendBody {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: message.text.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| DispatchError::Transport(error.to_string()))?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let detail = payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("provider returned status {status}"));
            return Err(DispatchError::Provider(detail));
        }

        let provider_message_id =
            payload.get("id").and_then(Value::as_str).map(str::to_owned);
        Ok(DispatchReceipt { provider_message_id, provider_response: payload })
    }
}

/// Async SMTP transport. Plain connection by default (Mailpit and other
/// local relays), STARTTLS when configured.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(host: &str, port: u16, starttls: bool) -> Result<Self, DispatchError> {
        let transport = if starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|error| DispatchError::Transport(error.to_string()))?
                .port(port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port).build()
        };

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<DispatchReceipt, DispatchError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|error| DispatchError::Provider(format!("invalid from address: {error}")))?;

        let mut builder = Message::builder().from(from).subject(&message.subject);
        for recipient in &message.to {
            let to: Mailbox = recipient.parse().map_err(|error| {
                DispatchError::Provider(format!("invalid recipient `{recipient}`: {error}"))
            })?;
            builder = builder.to(to);
        }

        let email = match &message.text {
            Some(text) => builder.multipart(MultiPart::alternative().singlepart(
                SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text.clone()),
            ).singlepart(
                SinglePart::builder().header(ContentType::TEXT_HTML).body(message.html.clone()),
            )),
            None => builder.singlepart(
                SinglePart::builder().header(ContentType::TEXT_HTML).body(message.html.clone()),
            ),
        }
        .map_err(|error| DispatchError::Provider(error.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|error| DispatchError::Transport(error.to_string()))?;

        Ok(DispatchReceipt {
            provider_message_id: None,
            provider_response: json!({
                "backend": "smtp",
                "code": response.code().to_string(),
            }),
        })
    }
}

/// Logs the would-be delivery and succeeds. Default backend for local
/// development so the lifecycle can run without provider credentials.
pub struct NoopTransport;

#[async_trait]
impl MailTransport for NoopTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<DispatchReceipt, DispatchError> {
        info!(
            event_name = "mail.transport.noop_delivery",
            to = %message.to.join(", "),
            subject = %message.subject,
            "noop transport dropped outbound email"
        );

        Ok(DispatchReceipt {
            provider_message_id: None,
            provider_response: json!({ "backend": "noop" }),
        })
    }
}

/// Test transport: collects delivered messages and can be programmed to fail
/// with a provider or transport error.
#[derive(Default)]
pub struct CaptureTransport {
    sent: Mutex<Vec<MailMessage>>,
    fail_with: Mutex<Option<CaptureFailure>>,
}

#[derive(Clone, Copy, Debug)]
pub enum CaptureFailure {
    Provider,
    Transport,
}

impl CaptureTransport {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("capture transport lock").clone()
    }

    pub fn fail_with(&self, failure: CaptureFailure) {
        *self.fail_with.lock().expect("capture transport lock") = Some(failure);
    }

    pub fn succeed(&self) {
        *self.fail_with.lock().expect("capture transport lock") = None;
    }
}

#[async_trait]
impl MailTransport for CaptureTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<DispatchReceipt, DispatchError> {
        let failure = *self.fail_with.lock().expect("capture transport lock");
        match failure {
            Some(CaptureFailure::Provider) => {
                Err(DispatchError::Provider("simulated provider rejection".to_string()))
            }
            Some(CaptureFailure::Transport) => {
                Err(DispatchError::Transport("simulated connection failure".to_string()))
            }
            None => {
                self.sent.lock().expect("capture transport lock").push(message.clone());
                Ok(DispatchReceipt {
                    provider_message_id: Some(format!("capture-{}", self.sent().len())),
                    provider_response: json!({ "backend": "capture" }),
                })
            }
        }
    }
}
