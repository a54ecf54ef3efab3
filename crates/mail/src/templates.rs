//! Email template rendering.
//!
//! Pure string construction: a template identifier plus a
//! [`NotificationPayload`] produce a subject, an HTML body, and (for the
//! client-facing templates) a plain-text body. The only time-dependent input
//! is the current year used in the copyright footer, so output is
//! byte-identical for the same payload within a calendar year.

use chrono::{Datelike, Utc};
use tera::{Context, Tera};
use thiserror::Error;

use scholar_core::domain::notification::{EmailTemplate, NotificationPayload};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown email template: {0}")]
    UnknownTemplate(String),
    #[error("template `{template}` failed to render: {detail}")]
    Render { template: &'static str, detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

pub struct TemplateRenderer {
    tera: Tera,
}

const TEMPLATE_SOURCES: &[(&str, &str)] = &[
    (
        "request_confirmation.html",
        include_str!("../../../templates/email/request_confirmation.html"),
    ),
    ("request_confirmation.txt", include_str!("../../../templates/email/request_confirmation.txt")),
    ("admin_notification.html", include_str!("../../../templates/email/admin_notification.html")),
    ("request_approved.html", include_str!("../../../templates/email/request_approved.html")),
    ("request_approved.txt", include_str!("../../../templates/email/request_approved.txt")),
];

impl TemplateRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        for &(name, source) in TEMPLATE_SOURCES {
            tera.add_raw_template(name, source).map_err(|error| RenderError::Render {
                template: name,
                detail: error.to_string(),
            })?;
        }

        Ok(Self { tera })
    }

    pub fn render(
        &self,
        template: EmailTemplate,
        payload: &NotificationPayload,
    ) -> Result<RenderedEmail, RenderError> {
        let context = build_context(payload);
        let base = template_base_name(template);

        let html = self.render_one(&format!("{base}.html"), &context)?;
        let text = if template.has_text_body() {
            Some(self.render_one(&format!("{base}.txt"), &context)?)
        } else {
            None
        };

        Ok(RenderedEmail { subject: subject_for(template, payload), html, text })
    }

    fn render_one(&self, name: &str, context: &Context) -> Result<String, RenderError> {
        self.tera.render(name, context).map_err(|error| RenderError::Render {
            template: template_static_name(name),
            detail: flatten_tera_error(&error),
        })
    }
}

pub fn subject_for(template: EmailTemplate, payload: &NotificationPayload) -> String {
    match template {
        EmailTemplate::RequestConfirmation => {
            format!("We received your request: {}", payload.request_title)
        }
        EmailTemplate::AdminNotification => {
            format!("New service request: {}", payload.request_title)
        }
        EmailTemplate::RequestApproved => {
            format!("Your request has been approved: {}", payload.request_title)
        }
    }
}

fn template_base_name(template: EmailTemplate) -> &'static str {
    match template {
        EmailTemplate::RequestConfirmation => "request_confirmation",
        EmailTemplate::AdminNotification => "admin_notification",
        EmailTemplate::RequestApproved => "request_approved",
    }
}

fn template_static_name(name: &str) -> &'static str {
    TEMPLATE_SOURCES
        .iter()
        .map(|(known, _)| *known)
        .find(|known| *known == name)
        .unwrap_or("unknown")
}

/// Optional payload fields are only inserted when present, so a template
/// referencing a missing required field fails to render instead of leaking
/// a literal placeholder into the message.
fn build_context(payload: &NotificationPayload) -> Context {
    let mut context = Context::new();
    context.insert("client_name", &payload.client_name);
    context.insert("request_title", &payload.request_title);
    context.insert("request_id", &payload.request_id);
    if let Some(academic_level) = &payload.academic_level {
        context.insert("academic_level", academic_level);
    }
    if let Some(deadline) = &payload.deadline {
        context.insert("deadline", deadline);
    }
    if let Some(url) = &payload.client_dashboard_url {
        context.insert("client_dashboard_url", url);
    }
    if let Some(url) = &payload.admin_dashboard_url {
        context.insert("admin_dashboard_url", url);
    }
    context.insert("year", &Utc::now().year());
    context
}

fn flatten_tera_error(error: &tera::Error) -> String {
    let mut detail = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
