use serde::{Deserialize, Serialize};

/// Transactional email templates, identified on the wire by their camelCase
/// names (`emailType` in the HTTP contract, `template` in the outbox).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailTemplate {
    #[serde(rename = "requestConfirmation")]
    RequestConfirmation,
    #[serde(rename = "adminNotification")]
    AdminNotification,
    #[serde(rename = "requestApproved")]
    RequestApproved,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestConfirmation => "requestConfirmation",
            Self::AdminNotification => "adminNotification",
            Self::RequestApproved => "requestApproved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "requestConfirmation" => Some(Self::RequestConfirmation),
            "adminNotification" => Some(Self::AdminNotification),
            "requestApproved" => Some(Self::RequestApproved),
            _ => None,
        }
    }

    /// Client-facing templates carry a plain-text alternative alongside the
    /// HTML body; the admin notification is HTML-only.
    pub fn has_text_body(&self) -> bool {
        matches!(self, Self::RequestConfirmation | Self::RequestApproved)
    }
}

/// Data payload interpolated into a template. Field names match the
/// `POST /api/send-email` body; optional fields are omitted from rendering
/// contexts rather than serialized as null.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub client_name: String,
    pub request_title: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_dashboard_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_dashboard_url: Option<String>,
}
