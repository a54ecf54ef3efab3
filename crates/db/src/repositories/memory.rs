//! In-memory repository doubles for tests and the lifecycle's unit seams.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use scholar_core::domain::assignment::{AssignmentId, ServiceAssignment};
use scholar_core::domain::catalog::{Service, ServiceId};
use scholar_core::domain::outbox::{OutboxEmail, OutboxEmailId, OutboxState};
use scholar_core::domain::profile::{ClientProfile, ExpertProfile, UserId};
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};

use super::{
    AssignmentRepository, OutboxRepository, ProfileRepository, RepositoryError, RequestRepository,
    ServiceRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryRequestRepository {
    requests: Arc<RwLock<HashMap<String, ServiceRequest>>>,
    outbox: Arc<RwLock<HashMap<String, OutboxEmail>>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the outbox map with an [`InMemoryOutboxRepository`] so
    /// transactional writes are visible to both.
    pub fn with_shared_outbox(outbox: &InMemoryOutboxRepository) -> Self {
        Self { requests: Arc::default(), outbox: outbox.entries.clone() }
    }
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        Ok(self.requests.read().await.get(&id.0).cloned())
    }

    async fn list_by_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let mut matching: Vec<ServiceRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| &r.client_id == client_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn save(&self, request: ServiceRequest) -> Result<(), RepositoryError> {
        self.requests.write().await.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn create_with_outbox(
        &self,
        request: ServiceRequest,
        outbox: Vec<OutboxEmail>,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        let mut entries = self.outbox.write().await;
        requests.insert(request.id.0.clone(), request);
        for entry in outbox {
            entries.insert(entry.id.0.clone(), entry);
        }
        Ok(())
    }

    async fn update_status_with_outbox(
        &self,
        id: &RequestId,
        observed: RequestStatus,
        next: RequestStatus,
        outbox: Vec<OutboxEmail>,
    ) -> Result<bool, RepositoryError> {
        let mut requests = self.requests.write().await;
        let Some(request) = requests.get_mut(&id.0) else {
            return Ok(false);
        };
        if request.status != observed {
            return Ok(false);
        }

        request.status = next;
        request.updated_at = Utc::now();

        let mut entries = self.outbox.write().await;
        for entry in outbox {
            entries.insert(entry.id.0.clone(), entry);
        }
        Ok(true)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAssignmentRepository {
    assignments: Arc<RwLock<HashMap<String, ServiceAssignment>>>,
    requests: Arc<RwLock<HashMap<String, ServiceRequest>>>,
}

impl InMemoryAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the request map with an [`InMemoryRequestRepository`] so the
    /// attach write is visible to both.
    pub fn with_shared_requests(requests: &InMemoryRequestRepository) -> Self {
        Self { assignments: Arc::default(), requests: requests.requests.clone() }
    }
}

#[async_trait::async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
    async fn find_by_id(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<ServiceAssignment>, RepositoryError> {
        Ok(self.assignments.read().await.get(&id.0).cloned())
    }

    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ServiceAssignment>, RepositoryError> {
        let mut matching: Vec<ServiceAssignment> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| &a.service_request_id == request_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn create_for_request(
        &self,
        assignment: ServiceAssignment,
    ) -> Result<bool, RepositoryError> {
        let mut requests = self.requests.write().await;
        let Some(request) = requests.get_mut(&assignment.service_request_id.0) else {
            return Ok(false);
        };
        if request.has_assignment() {
            return Ok(false);
        }

        request.expert_id = Some(assignment.expert_id.clone());
        request.service_assignment_id = Some(assignment.id.clone());
        request.updated_at = Utc::now();

        self.assignments.write().await.insert(assignment.id.0.clone(), assignment);
        Ok(true)
    }

    async fn save(&self, assignment: ServiceAssignment) -> Result<(), RepositoryError> {
        self.assignments.write().await.insert(assignment.id.0.clone(), assignment);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProfileRepository {
    clients: Arc<RwLock<HashMap<String, ClientProfile>>>,
    experts: Arc<RwLock<HashMap<String, ExpertProfile>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_client(&self, profile: ClientProfile) {
        self.clients.write().await.insert(profile.user_id.0.clone(), profile);
    }

    pub async fn insert_expert(&self, profile: ExpertProfile) {
        self.experts.write().await.insert(profile.user_id.0.clone(), profile);
    }
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_client(&self, id: &UserId) -> Result<Option<ClientProfile>, RepositoryError> {
        Ok(self.clients.read().await.get(&id.0).cloned())
    }

    async fn find_expert(&self, id: &UserId) -> Result<Option<ExpertProfile>, RepositoryError> {
        Ok(self.experts.read().await.get(&id.0).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryServiceRepository {
    services: Arc<RwLock<HashMap<String, Service>>>,
}

impl InMemoryServiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, service: Service) {
        self.services.write().await.insert(service.id.0.clone(), service);
    }
}

#[async_trait::async_trait]
impl ServiceRepository for InMemoryServiceRepository {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError> {
        Ok(self.services.read().await.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<Service>, RepositoryError> {
        let mut services: Vec<Service> = self.services.read().await.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOutboxRepository {
    entries: Arc<RwLock<HashMap<String, OutboxEmail>>>,
}

impl InMemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<OutboxEmail> {
        let mut entries: Vec<OutboxEmail> =
            self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        entries
    }
}

#[async_trait::async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn find_by_id(
        &self,
        id: &OutboxEmailId,
    ) -> Result<Option<OutboxEmail>, RepositoryError> {
        Ok(self.entries.read().await.get(&id.0).cloned())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<OutboxEmail>, RepositoryError> {
        let mut matching: Vec<OutboxEmail> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| &e.service_request_id == request_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(matching)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_secs: u64,
        limit: u32,
        claimed_by: &str,
    ) -> Result<Vec<OutboxEmail>, RepositoryError> {
        let lease = chrono::Duration::seconds(i64::try_from(lease_secs).unwrap_or(i64::MAX));
        let stale_before = now - lease;

        let mut entries = self.entries.write().await;
        let mut due_ids: Vec<(DateTime<Utc>, String)> = entries
            .values()
            .filter(|e| {
                let due = matches!(e.state, OutboxState::Queued | OutboxState::RetryableFailed)
                    && e.available_at <= now;
                let stale = e.state == OutboxState::Sending && e.updated_at <= stale_before;
                due || stale
            })
            .map(|e| (e.available_at, e.id.0.clone()))
            .collect();
        due_ids.sort();
        due_ids.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(due_ids.len());
        for (_, id) in due_ids {
            if let Some(entry) = entries.get_mut(&id) {
                entry.state = OutboxState::Sending;
                entry.claimed_by = Some(claimed_by.to_string());
                entry.updated_at = now;
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn save(&self, entry: OutboxEmail) -> Result<(), RepositoryError> {
        self.entries.write().await.insert(entry.id.0.clone(), entry);
        Ok(())
    }
}
