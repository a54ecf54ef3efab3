use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::profile::UserId;
use crate::domain::request::RequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Link between a request and the expert fulfilling it.
///
/// Created exactly once per accepted assignment; the request/expert pair is
/// immutable after creation. `due_date` is a copy of the request deadline at
/// assignment time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceAssignment {
    pub id: AssignmentId,
    pub service_request_id: RequestId,
    pub expert_id: UserId,
    pub status: AssignmentStatus,
    pub payment_status: PaymentStatus,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{AssignmentStatus, PaymentStatus};

    #[test]
    fn assignment_status_round_trips_from_storage_encoding() {
        for status in
            [AssignmentStatus::Active, AssignmentStatus::Completed, AssignmentStatus::Cancelled]
        {
            assert_eq!(AssignmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssignmentStatus::parse("open"), None);
    }

    #[test]
    fn payment_status_round_trips_from_storage_encoding() {
        for status in [PaymentStatus::Pending, PaymentStatus::Paid] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("unpaid"), None);
    }
}
