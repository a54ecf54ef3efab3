//! Request lifecycle orchestration: submission, approval, expert assignment,
//! and the generic admin status update. Every state change is persisted in
//! the same transaction as the outbox rows for the emails it triggers;
//! delivery itself is the drain worker's job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use scholar_core::config::{MailConfig, OutboxConfig};
use scholar_core::domain::assignment::{
    AssignmentId, AssignmentStatus, PaymentStatus, ServiceAssignment,
};
use scholar_core::domain::catalog::ServiceId;
use scholar_core::domain::notification::{EmailTemplate, NotificationPayload};
use scholar_core::domain::outbox::{OutboxEmail, OutboxEmailId};
use scholar_core::domain::profile::{ClientProfile, UserId};
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};
use scholar_core::errors::{ApplicationError, DomainError};
use scholar_db::repositories::{
    AssignmentRepository, OutboxRepository, ProfileRepository, RepositoryError, RequestRepository,
    ServiceRepository,
};

#[derive(Clone, Debug)]
pub struct NewRequest {
    pub client_id: UserId,
    pub service_id: ServiceId,
    pub title: String,
    pub description: String,
    pub academic_level: String,
    pub deadline: DateTime<Utc>,
    pub budget: Decimal,
}

pub struct LifecycleController {
    requests: Arc<dyn RequestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    services: Arc<dyn ServiceRepository>,
    outbox: Arc<dyn OutboxRepository>,
    mail: MailConfig,
    max_retries: u32,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        profiles: Arc<dyn ProfileRepository>,
        services: Arc<dyn ServiceRepository>,
        outbox: Arc<dyn OutboxRepository>,
        mail: MailConfig,
        outbox_config: &OutboxConfig,
    ) -> Self {
        Self {
            requests,
            assignments,
            profiles,
            services,
            outbox,
            mail,
            max_retries: outbox_config.max_retries,
        }
    }

    pub async fn get_request(&self, id: &RequestId) -> Result<ServiceRequest, ApplicationError> {
        self.requests
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "service request",
                id: id.0.clone(),
            })
    }

    pub async fn list_client_requests(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ApplicationError> {
        self.requests.list_by_client(client_id).await.map_err(persistence)
    }

    pub async fn list_request_outbox(
        &self,
        id: &RequestId,
    ) -> Result<Vec<OutboxEmail>, ApplicationError> {
        self.outbox.list_for_request(id).await.map_err(persistence)
    }

    /// Accept a client submission. The request row and both notification
    /// outbox rows (client confirmation, admin alert) land in one
    /// transaction, so the submission is durable before any email moves.
    pub async fn submit_request(
        &self,
        input: NewRequest,
    ) -> Result<ServiceRequest, ApplicationError> {
        validate_submission(&input)?;

        let client = self
            .profiles
            .find_client(&input.client_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "client",
                id: input.client_id.0.clone(),
            })?;

        let service = self
            .services
            .find_by_id(&input.service_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "service",
                id: input.service_id.0.clone(),
            })?;

        let now = Utc::now();
        let request = ServiceRequest {
            id: RequestId(Uuid::new_v4().to_string()),
            client_id: client.user_id.clone(),
            service_id: service.id.clone(),
            title: input.title,
            description: input.description,
            status: RequestStatus::Submitted,
            academic_level: input.academic_level,
            deadline: input.deadline,
            budget: input.budget,
            expert_id: None,
            service_assignment_id: None,
            created_at: now,
            updated_at: now,
        };

        let payload = self.notification_payload(&client, &request);
        let outbox = vec![
            self.outbox_row(
                &request.id,
                EmailTemplate::RequestConfirmation,
                client.email.clone(),
                &payload,
                now,
            )?,
            self.outbox_row(
                &request.id,
                EmailTemplate::AdminNotification,
                self.mail.admin_address.clone(),
                &payload,
                now,
            )?,
        ];

        self.requests.create_with_outbox(request.clone(), outbox).await.map_err(persistence)?;

        info!(
            event_name = "lifecycle.request.submitted",
            request_id = %request.id.0,
            client_id = %request.client_id.0,
            service_id = %request.service_id.0,
            "service request submitted"
        );
        Ok(request)
    }

    /// Approve a reviewed request. Only pre-approval statuses qualify; an
    /// in-progress request is approved through [`update_status`]
    /// (Self::update_status) instead. The write is conditional on the status
    /// the admin observed, so two concurrent approvals cannot both win.
    pub async fn approve_request(
        &self,
        id: &RequestId,
    ) -> Result<ServiceRequest, ApplicationError> {
        let mut request = self.get_request(id).await?;

        if !request.status.is_pre_approval() {
            return Err(DomainError::InvalidStatusTransition {
                from: request.status,
                to: RequestStatus::Approved,
            }
            .into());
        }

        let client = self.client_for(&request).await?;
        let payload = self.notification_payload(&client, &request);
        let now = Utc::now();
        let outbox = vec![self.outbox_row(
            &request.id,
            EmailTemplate::RequestApproved,
            client.email.clone(),
            &payload,
            now,
        )?];

        let observed = request.status;
        let updated = self
            .requests
            .update_status_with_outbox(id, observed, RequestStatus::Approved, outbox)
            .await
            .map_err(persistence)?;
        if !updated {
            return Err(ApplicationError::Conflict(format!(
                "request `{}` changed status during approval",
                id.0
            )));
        }

        request.status = RequestStatus::Approved;
        request.updated_at = now;
        info!(
            event_name = "lifecycle.request.approved",
            request_id = %request.id.0,
            previous_status = observed.as_str(),
            "service request approved"
        );
        Ok(request)
    }

    /// Attach an expert to a request. The assignment row and the request's
    /// `expert_id`/`service_assignment_id` pair are written atomically; the
    /// losing side of a concurrent assignment gets a conflict, never a
    /// half-linked record. A specialization mismatch is advisory only.
    pub async fn assign_expert(
        &self,
        id: &RequestId,
        expert_id: &UserId,
    ) -> Result<ServiceAssignment, ApplicationError> {
        let request = self.get_request(id).await?;

        if request.status.is_terminal() {
            return Err(ApplicationError::Conflict(format!(
                "request `{}` is {} and cannot be assigned",
                id.0,
                request.status.as_str()
            )));
        }
        if request.has_assignment() {
            return Err(ApplicationError::Conflict(format!(
                "request `{}` already has an assigned expert",
                id.0
            )));
        }

        let expert = self
            .profiles
            .find_expert(expert_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "expert",
                id: expert_id.0.clone(),
            })?;

        if let Some(service) =
            self.services.find_by_id(&request.service_id).await.map_err(persistence)?
        {
            if !expert.covers_category(&service.category) {
                warn!(
                    event_name = "lifecycle.assignment.specialization_mismatch",
                    request_id = %id.0,
                    expert_id = %expert_id.0,
                    category = %service.category,
                    "expert specializations do not cover the service category"
                );
            }
        }

        let now = Utc::now();
        let assignment = ServiceAssignment {
            id: AssignmentId(Uuid::new_v4().to_string()),
            service_request_id: request.id.clone(),
            expert_id: expert.user_id.clone(),
            status: AssignmentStatus::Active,
            payment_status: PaymentStatus::Pending,
            due_date: request.deadline,
            created_at: now,
            updated_at: now,
        };

        let created =
            self.assignments.create_for_request(assignment.clone()).await.map_err(persistence)?;
        if !created {
            return Err(ApplicationError::Conflict(format!(
                "request `{}` was assigned concurrently",
                id.0
            )));
        }

        info!(
            event_name = "lifecycle.assignment.created",
            request_id = %id.0,
            expert_id = %expert_id.0,
            assignment_id = %assignment.id.0,
            "expert assigned to request"
        );
        Ok(assignment)
    }

    /// Generic admin status update, validated against the transition table.
    /// A transition into `approved` enqueues the approval email exactly as
    /// [`approve_request`](Self::approve_request) does.
    pub async fn update_status(
        &self,
        id: &RequestId,
        next: RequestStatus,
    ) -> Result<ServiceRequest, ApplicationError> {
        let mut request = self.get_request(id).await?;

        if !request.can_transition_to(next) {
            return Err(
                DomainError::InvalidStatusTransition { from: request.status, to: next }.into()
            );
        }

        let now = Utc::now();
        let outbox = if next == RequestStatus::Approved {
            let client = self.client_for(&request).await?;
            let payload = self.notification_payload(&client, &request);
            vec![self.outbox_row(
                &request.id,
                EmailTemplate::RequestApproved,
                client.email.clone(),
                &payload,
                now,
            )?]
        } else {
            Vec::new()
        };

        let observed = request.status;
        let updated = self
            .requests
            .update_status_with_outbox(id, observed, next, outbox)
            .await
            .map_err(persistence)?;
        if !updated {
            return Err(ApplicationError::Conflict(format!(
                "request `{}` changed status during update",
                id.0
            )));
        }

        request.status = next;
        request.updated_at = now;
        info!(
            event_name = "lifecycle.request.status_updated",
            request_id = %request.id.0,
            from = observed.as_str(),
            to = next.as_str(),
            "service request status updated"
        );
        Ok(request)
    }

    async fn client_for(
        &self,
        request: &ServiceRequest,
    ) -> Result<ClientProfile, ApplicationError> {
        self.profiles
            .find_client(&request.client_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound {
                entity: "client",
                id: request.client_id.0.clone(),
            })
    }

    fn notification_payload(
        &self,
        client: &ClientProfile,
        request: &ServiceRequest,
    ) -> NotificationPayload {
        NotificationPayload {
            client_name: client.display_name.clone(),
            request_title: request.title.clone(),
            request_id: request.id.0.clone(),
            academic_level: Some(request.academic_level.clone()),
            deadline: Some(request.deadline.format("%B %-d, %Y").to_string()),
            client_dashboard_url: self.mail.client_dashboard_url.clone(),
            admin_dashboard_url: self.mail.admin_dashboard_url.clone(),
        }
    }

    fn outbox_row(
        &self,
        request_id: &RequestId,
        template: EmailTemplate,
        recipient: String,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> Result<OutboxEmail, ApplicationError> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;
        Ok(OutboxEmail::queued(
            OutboxEmailId(Uuid::new_v4().to_string()),
            request_id.clone(),
            template,
            recipient,
            payload_json,
            self.max_retries,
            now,
        ))
    }
}

fn validate_submission(input: &NewRequest) -> Result<(), ApplicationError> {
    if input.title.trim().is_empty() {
        return Err(ApplicationError::Validation("title must not be empty".to_string()));
    }
    if input.description.trim().is_empty() {
        return Err(ApplicationError::Validation("description must not be empty".to_string()));
    }
    if input.academic_level.trim().is_empty() {
        return Err(ApplicationError::Validation("academic_level must not be empty".to_string()));
    }
    if input.budget <= Decimal::ZERO {
        return Err(ApplicationError::Validation("budget must be positive".to_string()));
    }
    if input.deadline <= Utc::now() {
        return Err(ApplicationError::Validation("deadline must be in the future".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use scholar_core::config::{AppConfig, MailConfig};
    use scholar_core::domain::catalog::{Service, ServiceId};
    use scholar_core::domain::notification::EmailTemplate;
    use scholar_core::domain::profile::{ClientProfile, ExpertProfile, UserId};
    use scholar_core::domain::request::{RequestId, RequestStatus};
    use scholar_core::errors::ApplicationError;
    use scholar_db::repositories::{
        InMemoryAssignmentRepository, InMemoryOutboxRepository, InMemoryProfileRepository,
        InMemoryRequestRepository, InMemoryServiceRepository, RequestRepository,
    };

    use super::{LifecycleController, NewRequest};

    struct Harness {
        controller: LifecycleController,
        requests: InMemoryRequestRepository,
        outbox: InMemoryOutboxRepository,
    }

    async fn harness() -> Harness {
        harness_with_mail(AppConfig::default().mail).await
    }

    async fn harness_with_mail(mail: MailConfig) -> Harness {
        let outbox = InMemoryOutboxRepository::new();
        let requests = InMemoryRequestRepository::with_shared_outbox(&outbox);
        let assignments = InMemoryAssignmentRepository::with_shared_requests(&requests);
        let profiles = InMemoryProfileRepository::new();
        let services = InMemoryServiceRepository::new();

        profiles
            .insert_client(ClientProfile {
                user_id: UserId("client-emma".to_string()),
                email: "emma@example.com".to_string(),
                display_name: "Emma Wilson".to_string(),
                institution: Some("Riverside University".to_string()),
                academic_level: Some("Undergraduate".to_string()),
            })
            .await;
        profiles
            .insert_expert(ExpertProfile {
                user_id: UserId("expert-chen".to_string()),
                email: "chen@scholar.example".to_string(),
                display_name: "Dr. Chen".to_string(),
                specializations: vec!["Essay Writing".to_string()],
                hourly_rate: None,
            })
            .await;
        profiles
            .insert_expert(ExpertProfile {
                user_id: UserId("expert-okafor".to_string()),
                email: "okafor@scholar.example".to_string(),
                display_name: "Ada Okafor".to_string(),
                specializations: vec!["Research".to_string()],
                hourly_rate: None,
            })
            .await;
        services
            .insert(Service {
                id: ServiceId("svc-essay".to_string()),
                name: "Essay Writing Support".to_string(),
                category: "Essay Writing".to_string(),
                description: None,
                created_at: Utc::now(),
            })
            .await;

        let config = AppConfig::default();
        let controller = LifecycleController::new(
            Arc::new(requests.clone()),
            Arc::new(assignments),
            Arc::new(profiles),
            Arc::new(services),
            Arc::new(outbox.clone()),
            mail,
            &config.outbox,
        );

        Harness { controller, requests, outbox }
    }

    fn submission() -> NewRequest {
        NewRequest {
            client_id: UserId("client-emma".to_string()),
            service_id: ServiceId("svc-essay".to_string()),
            title: "Essay Help".to_string(),
            description: "Five pages on the industrial revolution".to_string(),
            academic_level: "Undergraduate".to_string(),
            deadline: Utc::now() + Duration::days(7),
            budget: Decimal::new(12_000, 2),
        }
    }

    #[tokio::test]
    async fn submission_stores_the_request_and_queues_both_notifications() {
        let h = harness().await;

        let request = h.controller.submit_request(submission()).await.expect("submit");
        assert_eq!(request.status, RequestStatus::Submitted);

        let stored = h
            .requests
            .find_by_id(&request.id)
            .await
            .expect("find")
            .expect("request should be stored");
        assert_eq!(stored.title, "Essay Help");

        let queued = h.outbox.all().await;
        assert_eq!(queued.len(), 2);
        let templates: Vec<EmailTemplate> = queued.iter().map(|e| e.template).collect();
        assert!(templates.contains(&EmailTemplate::RequestConfirmation));
        assert!(templates.contains(&EmailTemplate::AdminNotification));

        let confirmation = queued
            .iter()
            .find(|e| e.template == EmailTemplate::RequestConfirmation)
            .expect("confirmation row");
        assert_eq!(confirmation.recipient, "emma@example.com");
        assert!(confirmation.payload_json.contains("Emma Wilson"));

        let admin_alert = queued
            .iter()
            .find(|e| e.template == EmailTemplate::AdminNotification)
            .expect("admin row");
        assert_eq!(admin_alert.recipient, "admin@scholar.example");
    }

    #[tokio::test]
    async fn submission_rejects_missing_fields_and_unknown_references() {
        let h = harness().await;

        let blank_title = NewRequest { title: "  ".to_string(), ..submission() };
        assert!(matches!(
            h.controller.submit_request(blank_title).await,
            Err(ApplicationError::Validation(_))
        ));

        let past_deadline =
            NewRequest { deadline: Utc::now() - Duration::days(1), ..submission() };
        assert!(matches!(
            h.controller.submit_request(past_deadline).await,
            Err(ApplicationError::Validation(_))
        ));

        let unknown_client =
            NewRequest { client_id: UserId("client-ghost".to_string()), ..submission() };
        assert!(matches!(
            h.controller.submit_request(unknown_client).await,
            Err(ApplicationError::NotFound { entity: "client", .. })
        ));

        let unknown_service =
            NewRequest { service_id: ServiceId("svc-ghost".to_string()), ..submission() };
        assert!(matches!(
            h.controller.submit_request(unknown_service).await,
            Err(ApplicationError::NotFound { entity: "service", .. })
        ));

        assert!(h.outbox.all().await.is_empty(), "rejected submissions must not queue email");
    }

    #[tokio::test]
    async fn approval_moves_the_request_and_queues_the_approval_email() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");

        let approved = h.controller.approve_request(&request.id).await.expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);

        let queued = h.outbox.all().await;
        assert_eq!(queued.len(), 3, "submission rows plus one approval row");
        let approval = queued
            .iter()
            .find(|e| e.template == EmailTemplate::RequestApproved)
            .expect("approval row");
        assert_eq!(approval.recipient, "emma@example.com");
    }

    #[tokio::test]
    async fn approval_from_pending_payment_queues_exactly_one_email() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");
        h.controller
            .update_status(&request.id, RequestStatus::PendingPayment)
            .await
            .expect("move to pending_payment");

        let approved = h.controller.approve_request(&request.id).await.expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);

        let approvals = h
            .outbox
            .all()
            .await
            .into_iter()
            .filter(|e| e.template == EmailTemplate::RequestApproved)
            .count();
        assert_eq!(approvals, 1);
    }

    #[tokio::test]
    async fn approval_is_rejected_once_work_has_started() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");
        h.controller
            .update_status(&request.id, RequestStatus::InProgress)
            .await
            .expect("move to in_progress");

        let error = h
            .controller
            .approve_request(&request.id)
            .await
            .expect_err("approve must be rejected");
        assert!(matches!(error, ApplicationError::Domain(_)));

        // in_progress -> approved stays reachable through the generic update.
        let updated = h
            .controller
            .update_status(&request.id, RequestStatus::Approved)
            .await
            .expect("generic approval");
        assert_eq!(updated.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn double_approval_conflicts_and_queues_one_email() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");

        h.controller.approve_request(&request.id).await.expect("first approval");
        let error = h
            .controller
            .approve_request(&request.id)
            .await
            .expect_err("second approval must fail");
        assert!(matches!(error, ApplicationError::Domain(_) | ApplicationError::Conflict(_)));

        let approvals = h
            .outbox
            .all()
            .await
            .into_iter()
            .filter(|e| e.template == EmailTemplate::RequestApproved)
            .count();
        assert_eq!(approvals, 1);
    }

    #[tokio::test]
    async fn assignment_links_expert_and_request_atomically() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");

        let assignment = h
            .controller
            .assign_expert(&request.id, &UserId("expert-chen".to_string()))
            .await
            .expect("assign");
        assert_eq!(assignment.service_request_id, request.id);

        let stored = h
            .requests
            .find_by_id(&request.id)
            .await
            .expect("find")
            .expect("request should exist");
        assert_eq!(stored.expert_id, Some(UserId("expert-chen".to_string())));
        assert_eq!(stored.service_assignment_id, Some(assignment.id));
    }

    #[tokio::test]
    async fn second_assignment_attempt_conflicts() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");

        h.controller
            .assign_expert(&request.id, &UserId("expert-chen".to_string()))
            .await
            .expect("first assignment");
        let error = h
            .controller
            .assign_expert(&request.id, &UserId("expert-okafor".to_string()))
            .await
            .expect_err("second assignment must fail");
        assert!(matches!(error, ApplicationError::Conflict(_)));
    }

    #[tokio::test]
    async fn terminal_requests_cannot_be_assigned() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");
        h.controller
            .update_status(&request.id, RequestStatus::Rejected)
            .await
            .expect("reject");

        let error = h
            .controller
            .assign_expert(&request.id, &UserId("expert-chen".to_string()))
            .await
            .expect_err("terminal request must not be assignable");
        assert!(matches!(error, ApplicationError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected_without_queueing_email() {
        let h = harness().await;
        let request = h.controller.submit_request(submission()).await.expect("submit");
        let before = h.outbox.all().await.len();

        let error = h
            .controller
            .update_status(&request.id, RequestStatus::Completed)
            .await
            .expect_err("submitted -> completed must fail");
        assert!(matches!(error, ApplicationError::Domain(_)));
        assert_eq!(h.outbox.all().await.len(), before);
    }

    #[tokio::test]
    async fn unknown_request_reads_as_not_found() {
        let h = harness().await;
        let error = h
            .controller
            .get_request(&RequestId("req-ghost".to_string()))
            .await
            .expect_err("missing request");
        assert!(matches!(error, ApplicationError::NotFound { entity: "service request", .. }));
    }

    #[tokio::test]
    async fn payload_carries_dashboard_urls_when_configured() {
        let mut mail = scholar_core::config::AppConfig::default().mail;
        mail.client_dashboard_url = Some("https://app.scholar.example/dashboard".to_string());
        let h = harness_with_mail(mail).await;

        h.controller.submit_request(submission()).await.expect("submit");
        let queued = h.outbox.all().await;
        assert!(queued
            .iter()
            .all(|e| e.payload_json.contains("https://app.scholar.example/dashboard")));
    }
}
