use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use scholar_core::domain::assignment::{AssignmentId, ServiceAssignment};
use scholar_core::domain::catalog::{Service, ServiceId};
use scholar_core::domain::outbox::{OutboxEmail, OutboxEmailId};
use scholar_core::domain::profile::{ClientProfile, ExpertProfile, UserId};
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};

pub mod assignment;
pub mod catalog;
pub mod memory;
pub mod outbox;
pub mod profile;
pub mod request;

pub use assignment::SqlAssignmentRepository;
pub use catalog::SqlServiceRepository;
pub use memory::{
    InMemoryAssignmentRepository, InMemoryOutboxRepository, InMemoryProfileRepository,
    InMemoryRequestRepository, InMemoryServiceRepository,
};
pub use outbox::SqlOutboxRepository;
pub use profile::SqlProfileRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Timestamps are stored as RFC 3339 text. A value that does not parse is
/// corrupt data and surfaces as a decode error, never as a substituted time.
pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(|error| {
        RepositoryError::Decode(format!("invalid `{column}` timestamp `{value}`: {error}"))
    })
}

/// Store access for service requests. The two write paths that change
/// lifecycle state also persist their notification outbox rows in the same
/// transaction, so a notification can never reference a state that was not
/// durably stored.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError>;

    async fn list_by_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, RepositoryError>;

    /// Upsert without outbox side effects (seeding and tests).
    async fn save(&self, request: ServiceRequest) -> Result<(), RepositoryError>;

    async fn create_with_outbox(
        &self,
        request: ServiceRequest,
        outbox: Vec<OutboxEmail>,
    ) -> Result<(), RepositoryError>;

    /// Conditional status write keyed on the observed status. Returns
    /// `false` (and persists nothing) when the row no longer carries
    /// `observed`, which signals a concurrent transition to the caller.
    async fn update_status_with_outbox(
        &self,
        id: &RequestId,
        observed: RequestStatus,
        next: RequestStatus,
        outbox: Vec<OutboxEmail>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<ServiceAssignment>, RepositoryError>;

    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ServiceAssignment>, RepositoryError>;

    /// Insert the assignment and set the parent request's
    /// `expert_id`/`service_assignment_id` pair in one transaction, keyed on
    /// the pair still being unset. Returns `false` (and persists nothing)
    /// when the request already carries an assignment.
    async fn create_for_request(
        &self,
        assignment: ServiceAssignment,
    ) -> Result<bool, RepositoryError>;

    /// Upsert for assignment status/payment updates.
    async fn save(&self, assignment: ServiceAssignment) -> Result<(), RepositoryError>;
}

/// Profile reads. Profiles are read-only from the lifecycle's perspective;
/// writes happen through account management and seed fixtures.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_client(&self, id: &UserId) -> Result<Option<ClientProfile>, RepositoryError>;
    async fn find_expert(&self, id: &UserId) -> Result<Option<ExpertProfile>, RepositoryError>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Service>, RepositoryError>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn find_by_id(&self, id: &OutboxEmailId) -> Result<Option<OutboxEmail>, RepositoryError>;

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<OutboxEmail>, RepositoryError>;

    /// Claim due entries for delivery: queued or retryable rows whose
    /// `available_at` has passed move to `sending` under `claimed_by`.
    /// Entries already claimed by another worker are skipped, unless the
    /// claim is stale (`sending` with an `updated_at` older than
    /// `lease_secs`), in which case the row is reclaimed so a crashed
    /// worker cannot strand it.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_secs: u64,
        limit: u32,
        claimed_by: &str,
    ) -> Result<Vec<OutboxEmail>, RepositoryError>;

    async fn save(&self, entry: OutboxEmail) -> Result<(), RepositoryError>;
}
