//! Email Dispatch Gateway.
//!
//! The boundary between lifecycle code and the outside world: resolves a
//! template into subject/bodies, builds the provider message (the gateway
//! owns the fixed `from` address), and hands it to the configured transport.
//! Callers treat dispatch as best-effort; a [`DispatchError`] is logged and
//! never rolls back the state transition that triggered it.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

use scholar_core::config::{MailBackend, MailConfig};
use scholar_core::domain::notification::{EmailTemplate, NotificationPayload};

use crate::templates::{RenderError, TemplateRenderer};
use crate::transport::{
    DispatchReceipt, HttpProviderTransport, MailMessage, MailTransport, NoopTransport,
    SmtpTransport,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown email template: {0}")]
    InvalidTemplate(String),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("provider rejected the message: {0}")]
    Provider(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidTemplate(_) => "invalid_template",
            Self::Render(_) => "render",
            Self::Provider(_) => "provider",
            Self::Transport(_) => "transport",
        }
    }
}

pub struct DispatchGateway {
    renderer: TemplateRenderer,
    transport: Arc<dyn MailTransport>,
    from_address: String,
}

impl DispatchGateway {
    pub fn new(transport: Arc<dyn MailTransport>, from_address: String) -> Result<Self, RenderError> {
        Ok(Self { renderer: TemplateRenderer::new()?, transport, from_address })
    }

    /// Build a gateway with the transport selected by `mail.backend`.
    pub fn from_config(config: &MailConfig) -> Result<Self, DispatchError> {
        let transport: Arc<dyn MailTransport> = match config.backend {
            MailBackend::Provider => {
                let api_key = config
                    .api_key
                    .clone()
                    .unwrap_or_else(|| SecretString::from(String::new()));
                Arc::new(HttpProviderTransport::new(config.api_base_url.clone(), api_key, 30))
            }
            MailBackend::Smtp => {
                Arc::new(SmtpTransport::new(&config.smtp_host, config.smtp_port, config.smtp_starttls)?)
            }
            MailBackend::Noop => Arc::new(NoopTransport),
        };

        Ok(Self::new(transport, config.from_address.clone())?)
    }

    /// Render and deliver one message to one or more recipients.
    pub async fn send(
        &self,
        template: EmailTemplate,
        recipients: &[String],
        payload: &NotificationPayload,
    ) -> Result<DispatchReceipt, DispatchError> {
        if recipients.is_empty() || recipients.iter().any(|to| !to.contains('@')) {
            return Err(DispatchError::Provider(format!(
                "invalid recipient list: {recipients:?}"
            )));
        }

        let rendered = self.renderer.render(template, payload)?;
        let message = MailMessage {
            from: self.from_address.clone(),
            to: recipients.to_vec(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };

        let receipt = self.transport.deliver(&message).await?;
        debug!(
            event_name = "mail.gateway.dispatched",
            template = template.as_str(),
            request_id = %payload.request_id,
            to = %message.to.join(", "),
            "dispatched transactional email"
        );
        Ok(receipt)
    }

    /// Like [`send`](Self::send) but keyed on the wire-format template name,
    /// for callers that receive the name as an untyped string.
    pub async fn send_named(
        &self,
        template_name: &str,
        recipients: &[String],
        payload: &NotificationPayload,
    ) -> Result<DispatchReceipt, DispatchError> {
        let template = EmailTemplate::parse(template_name)
            .ok_or_else(|| DispatchError::InvalidTemplate(template_name.to_string()))?;
        self.send(template, recipients, payload).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scholar_core::domain::notification::{EmailTemplate, NotificationPayload};

    use crate::transport::{CaptureFailure, CaptureTransport};

    use super::{DispatchError, DispatchGateway};

    fn payload() -> NotificationPayload {
        NotificationPayload {
            client_name: "Emma Wilson".to_string(),
            request_title: "Thesis Review".to_string(),
            request_id: "req-42".to_string(),
            ..NotificationPayload::default()
        }
    }

    fn gateway(transport: Arc<CaptureTransport>) -> DispatchGateway {
        DispatchGateway::new(transport, "Scholar <no-reply@scholar.example>".to_string())
            .expect("gateway")
    }

    #[tokio::test]
    async fn send_renders_and_delivers_with_the_fixed_from_address() {
        let transport = Arc::new(CaptureTransport::default());
        let gateway = gateway(transport.clone());

        let receipt = gateway
            .send(
                EmailTemplate::RequestConfirmation,
                &["emma@example.com".to_string()],
                &payload(),
            )
            .await
            .expect("send");
        assert!(receipt.provider_message_id.is_some());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "Scholar <no-reply@scholar.example>");
        assert_eq!(sent[0].to, vec!["emma@example.com".to_string()]);
        assert!(sent[0].subject.contains("Thesis Review"));
        assert!(sent[0].html.contains("Emma Wilson"));
        assert!(sent[0].text.as_deref().expect("text body").contains("req-42"));
    }

    #[tokio::test]
    async fn unknown_template_name_fails_without_touching_the_transport() {
        let transport = Arc::new(CaptureTransport::default());
        let gateway = gateway(transport.clone());

        let error = gateway
            .send_named("requestRejected", &["emma@example.com".to_string()], &payload())
            .await
            .expect_err("unknown template must fail");

        assert!(matches!(error, DispatchError::InvalidTemplate(_)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn provider_failures_surface_as_provider_errors() {
        let transport = Arc::new(CaptureTransport::default());
        transport.fail_with(CaptureFailure::Provider);
        let gateway = gateway(transport);

        let error = gateway
            .send(
                EmailTemplate::RequestApproved,
                &["emma@example.com".to_string()],
                &payload(),
            )
            .await
            .expect_err("should fail");
        assert!(matches!(error, DispatchError::Provider(_)));
        assert_eq!(error.class(), "provider");
    }

    #[tokio::test]
    async fn empty_or_malformed_recipients_are_rejected() {
        let transport = Arc::new(CaptureTransport::default());
        let gateway = gateway(transport.clone());

        let error = gateway
            .send(EmailTemplate::RequestConfirmation, &[], &payload())
            .await
            .expect_err("empty recipient list must fail");
        assert!(matches!(error, DispatchError::Provider(_)));

        let error = gateway
            .send(
                EmailTemplate::RequestConfirmation,
                &["not-an-address".to_string()],
                &payload(),
            )
            .await
            .expect_err("malformed recipient must fail");
        assert!(matches!(error, DispatchError::Provider(_)));
        assert!(transport.sent().is_empty());
    }
}
