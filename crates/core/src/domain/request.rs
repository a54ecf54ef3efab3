use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::assignment::AssignmentId;
use crate::domain::catalog::ServiceId;
use crate::domain::profile::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Canonical request status vocabulary.
///
/// This is the single closed enumeration for `service_requests.status`;
/// every write boundary validates against it and every read decodes through
/// [`RequestStatus::parse`]. Legacy free-form strings in existing data are a
/// normalization concern, never a supported value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    PendingPayment,
    InProgress,
    Approved,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::PendingPayment => "pending_payment",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "pending_payment" => Some(Self::PendingPayment),
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Statuses from which `approve_request` may run. Deliberately narrower
    /// than the full transition table: an in-progress request is approved
    /// through the generic admin status update, not the approval operation.
    pub fn is_pre_approval(&self) -> bool {
        matches!(self, Self::Submitted | Self::PendingPayment)
    }
}

/// A client's submitted academic-assistance task.
///
/// Requests are never deleted; terminal statuses retain the record for
/// audit/history. `expert_id` and `service_assignment_id` are always set
/// together or not at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub client_id: UserId,
    pub service_id: ServiceId,
    pub title: String,
    pub description: String,
    pub status: RequestStatus,
    pub academic_level: String,
    pub deadline: DateTime<Utc>,
    pub budget: Decimal,
    pub expert_id: Option<UserId>,
    pub service_assignment_id: Option<AssignmentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self.status, next),
            (Submitted, PendingPayment)
                | (Submitted, InProgress)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (PendingPayment, InProgress)
                | (PendingPayment, Approved)
                | (PendingPayment, Rejected)
                | (InProgress, Approved)
                | (Approved, Completed)
        )
    }

    pub fn transition_to(&mut self, next: RequestStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }

    pub fn has_assignment(&self) -> bool {
        self.expert_id.is_some() || self.service_assignment_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::catalog::ServiceId;
    use crate::domain::profile::UserId;

    use super::{RequestId, RequestStatus, ServiceRequest};

    fn request(status: RequestStatus) -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: RequestId("req-1".to_string()),
            client_id: UserId("client-1".to_string()),
            service_id: ServiceId("svc-essay".to_string()),
            title: "Essay Help".to_string(),
            description: "Five pages on the Meiji restoration".to_string(),
            status,
            academic_level: "Undergraduate".to_string(),
            deadline: now + chrono::Duration::days(7),
            budget: Decimal::new(12_000, 2),
            expert_id: None,
            service_assignment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn allows_the_full_happy_path() {
        let mut req = request(RequestStatus::Submitted);
        req.transition_to(RequestStatus::PendingPayment).expect("submitted -> pending_payment");
        req.transition_to(RequestStatus::InProgress).expect("pending_payment -> in_progress");
        req.transition_to(RequestStatus::Approved).expect("in_progress -> approved");
        req.transition_to(RequestStatus::Completed).expect("approved -> completed");
        assert_eq!(req.status, RequestStatus::Completed);
    }

    #[test]
    fn allows_direct_approval_before_payment() {
        let mut req = request(RequestStatus::Submitted);
        req.transition_to(RequestStatus::Approved).expect("submitted -> approved");
        assert_eq!(req.status, RequestStatus::Approved);
    }

    #[test]
    fn rejection_is_reachable_only_before_work_starts() {
        let mut req = request(RequestStatus::PendingPayment);
        req.transition_to(RequestStatus::Rejected).expect("pending_payment -> rejected");

        let mut started = request(RequestStatus::InProgress);
        let error = started
            .transition_to(RequestStatus::Rejected)
            .expect_err("in_progress -> rejected should fail");
        assert!(matches!(error, crate::errors::DomainError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        for terminal in [RequestStatus::Completed, RequestStatus::Rejected] {
            let mut req = request(terminal);
            for next in [
                RequestStatus::Submitted,
                RequestStatus::PendingPayment,
                RequestStatus::InProgress,
                RequestStatus::Approved,
                RequestStatus::Completed,
                RequestStatus::Rejected,
            ] {
                assert!(!req.can_transition_to(next), "{terminal:?} -> {next:?} must be blocked");
            }
            assert!(req.transition_to(RequestStatus::Approved).is_err());
        }
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        let cases = [
            RequestStatus::Submitted,
            RequestStatus::PendingPayment,
            RequestStatus::InProgress,
            RequestStatus::Approved,
            RequestStatus::Completed,
            RequestStatus::Rejected,
        ];

        for status in cases {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("pending"), None);
        assert_eq!(RequestStatus::parse("Submitted "), Some(RequestStatus::Submitted));
    }
}
