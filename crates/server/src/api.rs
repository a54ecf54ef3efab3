//! JSON API routes.
//!
//! Endpoints:
//! - `POST /api/requests`                    — submit a service request
//! - `GET  /api/requests/{id}`               — fetch one request
//! - `GET  /api/requests/{id}/emails`        — list the request's email outbox
//! - `GET  /api/clients/{client_id}/requests`— list a client's requests
//! - `POST /api/requests/{id}/approve`       — approve a reviewed request
//! - `POST /api/requests/{id}/assign`        — assign an expert
//! - `POST /api/requests/{id}/status`        — generic status update
//! - `POST /api/send-email`                  — direct transactional email dispatch

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use scholar_core::domain::assignment::ServiceAssignment;
use scholar_core::domain::catalog::ServiceId;
use scholar_core::domain::notification::NotificationPayload;
use scholar_core::domain::outbox::OutboxEmail;
use scholar_core::domain::profile::UserId;
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};
use scholar_core::errors::{ApplicationError, InterfaceError};
use scholar_mail::gateway::{DispatchError, DispatchGateway};

use crate::lifecycle::{LifecycleController, NewRequest};

#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: Arc<LifecycleController>,
    pub gateway: Arc<DispatchGateway>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/requests", post(submit_request))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/requests/{id}/emails", get(list_request_emails))
        .route("/api/clients/{client_id}/requests", get(list_client_requests))
        .route("/api/requests/{id}/approve", post(approve_request))
        .route("/api/requests/{id}/assign", post(assign_expert))
        .route("/api/requests/{id}/status", post(update_status))
        .route("/api/send-email", post(send_email).layer(cors))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestBody {
    pub client_id: String,
    pub service_id: String,
    pub title: String,
    pub description: String,
    pub academic_level: String,
    pub deadline: String,
    pub budget: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignExpertBody {
    pub expert_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailBody {
    pub email_type: String,
    pub to: String,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub id: String,
    pub client_id: String,
    pub service_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub academic_level: String,
    pub deadline: String,
    pub budget: String,
    pub expert_id: Option<String>,
    pub service_assignment_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ServiceRequest> for RequestBody {
    fn from(request: ServiceRequest) -> Self {
        Self {
            id: request.id.0,
            client_id: request.client_id.0,
            service_id: request.service_id.0,
            title: request.title,
            description: request.description,
            status: request.status.as_str().to_string(),
            academic_level: request.academic_level,
            deadline: request.deadline.to_rfc3339(),
            budget: request.budget.to_string(),
            expert_id: request.expert_id.map(|id| id.0),
            service_assignment_id: request.service_assignment_id.map(|id| id.0),
            created_at: request.created_at.to_rfc3339(),
            updated_at: request.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBody {
    pub id: String,
    pub service_request_id: String,
    pub expert_id: String,
    pub status: String,
    pub payment_status: String,
    pub due_date: String,
}

impl From<ServiceAssignment> for AssignmentBody {
    fn from(assignment: ServiceAssignment) -> Self {
        Self {
            id: assignment.id.0,
            service_request_id: assignment.service_request_id.0,
            expert_id: assignment.expert_id.0,
            status: assignment.status.as_str().to_string(),
            payment_status: assignment.payment_status.as_str().to_string(),
            due_date: assignment.due_date.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntryBody {
    pub id: String,
    pub template: String,
    pub recipient: String,
    pub state: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl From<OutboxEmail> for OutboxEntryBody {
    fn from(entry: OutboxEmail) -> Self {
        Self {
            id: entry.id.0,
            template: entry.template.as_str().to_string(),
            recipient: entry.recipient,
            state: entry.state.as_str().to_string(),
            retry_count: entry.retry_count,
            last_error: entry.last_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

struct ApiError(InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(event_name = "api.request.failed", error = %self.0, "api request failed");
        } else {
            warn!(event_name = "api.request.rejected", error = %self.0, "api request rejected");
        }

        (status, Json(json!({ "error": self.0.user_message() }))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() }))).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit_request(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let body: SubmitRequestBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(err) => return Ok(bad_request(format!("invalid request body: {err}"))),
    };
    let deadline = match DateTime::parse_from_rfc3339(&body.deadline) {
        Ok(deadline) => deadline.with_timezone(&Utc),
        Err(_) => return Ok(bad_request("deadline must be an RFC 3339 timestamp")),
    };
    let budget = match Decimal::from_str(&body.budget) {
        Ok(budget) => budget,
        Err(_) => return Ok(bad_request("budget must be a decimal amount")),
    };

    let request = state
        .lifecycle
        .submit_request(NewRequest {
            client_id: UserId(body.client_id),
            service_id: ServiceId(body.service_id),
            title: body.title,
            description: body.description,
            academic_level: body.academic_level,
            deadline,
            budget,
        })
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;

    info!(
        event_name = "api.request.submitted",
        correlation_id = %correlation_id,
        request_id = %request.id.0,
        "service request accepted"
    );
    Ok((StatusCode::CREATED, Json(RequestBody::from(request))).into_response())
}

async fn get_request(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<RequestBody>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = state
        .lifecycle
        .get_request(&RequestId(id))
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok(Json(RequestBody::from(request)))
}

async fn list_request_emails(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OutboxEntryBody>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let id = RequestId(id);

    // 404 for unknown requests rather than an empty list.
    state
        .lifecycle
        .get_request(&id)
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    let entries = state
        .lifecycle
        .list_request_outbox(&id)
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok(Json(entries.into_iter().map(OutboxEntryBody::from).collect()))
}

async fn list_client_requests(
    State(state): State<ApiState>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<RequestBody>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let requests = state
        .lifecycle
        .list_client_requests(&UserId(client_id))
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok(Json(requests.into_iter().map(RequestBody::from).collect()))
}

async fn approve_request(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<RequestBody>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = state
        .lifecycle
        .approve_request(&RequestId(id))
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok(Json(RequestBody::from(request)))
}

async fn assign_expert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let body: AssignExpertBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(err) => return Ok(bad_request(format!("invalid request body: {err}"))),
    };

    let assignment = state
        .lifecycle
        .assign_expert(&RequestId(id), &UserId(body.expert_id))
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(AssignmentBody::from(assignment))).into_response())
}

async fn update_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let body: UpdateStatusBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(err) => return Ok(bad_request(format!("invalid request body: {err}"))),
    };
    let Some(next) = RequestStatus::parse(&body.status) else {
        return Ok(bad_request(format!("unknown status `{}`", body.status)));
    };

    let request = state
        .lifecycle
        .update_status(&RequestId(id), next)
        .await
        .map_err(|err| ApiError::from_application(err, &correlation_id))?;
    Ok(Json(RequestBody::from(request)).into_response())
}

/// Direct dispatch endpoint: renders and sends immediately, bypassing the
/// outbox. Unknown template names and provider rejections are client errors;
/// only transport-level failures surface as 500.
async fn send_email(State(state): State<ApiState>, Json(body): Json<Value>) -> Response {
    let body: SendEmailBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(err) => return bad_request(format!("invalid request body: {err}")),
    };

    match state.gateway.send_named(&body.email_type, &[body.to.clone()], &body.payload).await {
        Ok(receipt) => {
            info!(
                event_name = "api.send_email.dispatched",
                email_type = %body.email_type,
                request_id = %body.payload.request_id,
                "transactional email dispatched"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Email sent successfully",
                    "data": receipt.provider_response,
                })),
            )
                .into_response()
        }
        Err(err @ (DispatchError::InvalidTemplate(_)
        | DispatchError::Render(_)
        | DispatchError::Provider(_))) => {
            warn!(
                event_name = "api.send_email.rejected",
                email_type = %body.email_type,
                class = err.class(),
                error = %err,
                "transactional email rejected"
            );
            bad_request(err.to_string())
        }
        Err(err) => {
            error!(
                event_name = "api.send_email.failed",
                email_type = %body.email_type,
                class = err.class(),
                error = %err,
                "transactional email dispatch failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to send email",
                    "details": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use scholar_core::config::AppConfig;
    use scholar_core::domain::catalog::{Service, ServiceId};
    use scholar_core::domain::profile::{ClientProfile, ExpertProfile, UserId};
    use scholar_db::repositories::{
        InMemoryAssignmentRepository, InMemoryOutboxRepository, InMemoryProfileRepository,
        InMemoryRequestRepository, InMemoryServiceRepository,
    };
    use scholar_mail::gateway::DispatchGateway;
    use scholar_mail::transport::{CaptureFailure, CaptureTransport};

    use crate::lifecycle::LifecycleController;

    use super::{router, ApiState};

    struct Harness {
        state: ApiState,
        transport: Arc<CaptureTransport>,
    }

    async fn harness() -> Harness {
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
                institution: None,
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
        let lifecycle = LifecycleController::new(
            Arc::new(requests),
            Arc::new(assignments),
            Arc::new(profiles),
            Arc::new(services),
            Arc::new(outbox),
            config.mail.clone(),
            &config.outbox,
        );

        let transport = Arc::new(CaptureTransport::default());
        let gateway = DispatchGateway::new(
            transport.clone(),
            "Scholar <no-reply@scholar.example>".to_string(),
        )
        .expect("gateway");

        Harness {
            state: ApiState { lifecycle: Arc::new(lifecycle), gateway: Arc::new(gateway) },
            transport,
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn submission_body() -> Value {
        json!({
            "clientId": "client-emma",
            "serviceId": "svc-essay",
            "title": "Essay Help",
            "description": "Five pages on the industrial revolution",
            "academicLevel": "Undergraduate",
            "deadline": (Utc::now() + Duration::days(7)).to_rfc3339(),
            "budget": "120.00",
        })
    }

    #[tokio::test]
    async fn submit_then_fetch_round_trips_through_the_api() {
        let h = harness().await;
        let app = router(h.state.clone());

        let response = app
            .clone()
            .oneshot(post_json("/api/requests", submission_body()))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = response_json(response).await;
        assert_eq!(created["status"], "submitted");
        let id = created["id"].as_str().expect("id").to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/requests/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("fetch");
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = response_json(response).await;
        assert_eq!(fetched["title"], "Essay Help");
        assert_eq!(fetched["budget"], "120.00");
    }

    #[tokio::test]
    async fn malformed_submission_is_a_bad_request() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .clone()
            .oneshot(post_json("/api/requests", json!({ "title": "Essay Help" })))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response_json(response).await.get("error").is_some());

        let mut body = submission_body();
        body["deadline"] = json!("tomorrow");
        let response =
            app.oneshot(post_json("/api/requests", body)).await.expect("submit");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_request_id_is_not_found() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/requests/req-ghost")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("fetch");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approve_assign_and_double_approve_map_to_expected_statuses() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .clone()
            .oneshot(post_json("/api/requests", submission_body()))
            .await
            .expect("submit");
        let id = response_json(response).await["id"].as_str().expect("id").to_string();

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/requests/{id}/assign"), json!({
                "expertId": "expert-chen",
            })))
            .await
            .expect("assign");
        assert_eq!(response.status(), StatusCode::CREATED);
        let assignment = response_json(response).await;
        assert_eq!(assignment["serviceRequestId"], id.as_str());
        assert_eq!(assignment["paymentStatus"], "pending");

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/requests/{id}/approve"), json!({})))
            .await
            .expect("approve");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "approved");

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/requests/{id}/approve"), json!({})))
            .await
            .expect("second approve");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/requests/{id}/emails"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("list emails");
        assert_eq!(response.status(), StatusCode::OK);
        let emails = response_json(response).await;
        assert_eq!(emails.as_array().expect("array").len(), 3);
    }

    #[tokio::test]
    async fn status_endpoint_validates_the_vocabulary() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .clone()
            .oneshot(post_json("/api/requests", submission_body()))
            .await
            .expect("submit");
        let id = response_json(response).await["id"].as_str().expect("id").to_string();

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/requests/{id}/status"), json!({
                "status": "Pending",
            })))
            .await
            .expect("update");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(&format!("/api/requests/{id}/status"), json!({
                "status": "pending_payment",
            })))
            .await
            .expect("update");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "pending_payment");
    }

    #[tokio::test]
    async fn send_email_returns_the_provider_response_on_success() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .oneshot(post_json("/api/send-email", json!({
                "emailType": "requestConfirmation",
                "to": "emma@example.com",
                "clientName": "Jane",
                "requestTitle": "Essay Help",
                "requestId": "abc123",
            })))
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["message"], "Email sent successfully");
        assert!(body.get("data").is_some());

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["emma@example.com".to_string()]);
        assert!(sent[0].html.contains("Jane"));
        assert!(sent[0].html.contains("Pending Review"));
    }

    #[tokio::test]
    async fn send_email_rejects_unknown_template_and_missing_fields() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .clone()
            .oneshot(post_json("/api/send-email", json!({
                "emailType": "requestRejected",
                "to": "emma@example.com",
                "clientName": "Jane",
                "requestTitle": "Essay Help",
                "requestId": "abc123",
            })))
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response_json(response).await.get("error").is_some());

        // clientName is required by every template.
        let response = app
            .oneshot(post_json("/api/send-email", json!({
                "emailType": "requestConfirmation",
                "to": "emma@example.com",
                "requestTitle": "Essay Help",
                "requestId": "abc123",
            })))
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn send_email_maps_provider_rejection_to_400_and_transport_to_500() {
        let h = harness().await;
        let app = router(h.state.clone());

        h.transport.fail_with(CaptureFailure::Provider);
        let body = json!({
            "emailType": "requestConfirmation",
            "to": "emma@example.com",
            "clientName": "Jane",
            "requestTitle": "Essay Help",
            "requestId": "abc123",
        });
        let response = app
            .clone()
            .oneshot(post_json("/api/send-email", body.clone()))
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        h.transport.fail_with(CaptureFailure::Transport);
        let response =
            app.oneshot(post_json("/api/send-email", body)).await.expect("send");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload = response_json(response).await;
        assert!(payload.get("error").is_some());
        assert!(payload.get("details").is_some());
    }

    #[tokio::test]
    async fn send_email_rejects_non_post_methods() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/send-email")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn send_email_preflight_allows_any_origin() {
        let h = harness().await;
        let app = router(h.state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/send-email")
                    .header(header::ORIGIN, "https://app.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("preflight");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
