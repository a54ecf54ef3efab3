use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, Transaction};

use scholar_core::domain::assignment::AssignmentId;
use scholar_core::domain::catalog::ServiceId;
use scholar_core::domain::outbox::OutboxEmail;
use scholar_core::domain::profile::UserId;
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};

use super::{parse_timestamp, RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, client_id, service_id, title, description, status,
        academic_level, deadline, budget, expert_id, service_assignment_id,
        created_at, updated_at";

pub(crate) fn row_to_request(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ServiceRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let client_id: String =
        row.try_get("client_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_id: String =
        row.try_get("service_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let academic_level: String =
        row.try_get("academic_level").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deadline_str: String =
        row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let budget_str: String =
        row.try_get("budget").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expert_id: Option<String> =
        row.try_get("expert_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_assignment_id: Option<String> = row
        .try_get("service_assignment_id")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    // Unknown status strings are normalization bugs, not supported values.
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{status_str}`")))?;
    let budget = Decimal::from_str(&budget_str)
        .map_err(|e| RepositoryError::Decode(format!("invalid budget `{budget_str}`: {e}")))?;

    Ok(ServiceRequest {
        id: RequestId(id),
        client_id: UserId(client_id),
        service_id: ServiceId(service_id),
        title,
        description,
        status,
        academic_level,
        deadline: parse_timestamp("deadline", &deadline_str)?,
        budget,
        expert_id: expert_id.map(UserId),
        service_assignment_id: service_assignment_id.map(AssignmentId),
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
    })
}

async fn insert_request(
    tx: &mut Transaction<'_, Sqlite>,
    request: &ServiceRequest,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO service_requests (id, client_id, service_id, title, description, status,
                                       academic_level, deadline, budget, expert_id,
                                       service_assignment_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request.id.0)
    .bind(&request.client_id.0)
    .bind(&request.service_id.0)
    .bind(&request.title)
    .bind(&request.description)
    .bind(request.status.as_str())
    .bind(&request.academic_level)
    .bind(request.deadline.to_rfc3339())
    .bind(request.budget.to_string())
    .bind(request.expert_id.as_ref().map(|id| id.0.clone()))
    .bind(request.service_assignment_id.as_ref().map(|id| id.0.clone()))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn insert_outbox_rows(
    tx: &mut Transaction<'_, Sqlite>,
    rows: &[OutboxEmail],
) -> Result<(), RepositoryError> {
    for entry in rows {
        sqlx::query(
            "INSERT INTO email_outbox (id, service_request_id, template, recipient, payload_json,
                                       state, retry_count, max_retries, available_at, claimed_by,
                                       last_error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.service_request_id.0)
        .bind(entry.template.as_str())
        .bind(&entry.recipient)
        .bind(&entry.payload_json)
        .bind(entry.state.as_str())
        .bind(entry.retry_count)
        .bind(entry.max_retries)
        .bind(entry.available_at.to_rfc3339())
        .bind(entry.claimed_by.as_deref())
        .bind(entry.last_error.as_deref())
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM service_requests WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM service_requests
             WHERE client_id = ? ORDER BY created_at DESC"
        ))
        .bind(&client_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, request: ServiceRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service_requests (id, client_id, service_id, title, description, status,
                                           academic_level, deadline, budget, expert_id,
                                           service_assignment_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 status = excluded.status,
                 academic_level = excluded.academic_level,
                 deadline = excluded.deadline,
                 budget = excluded.budget,
                 expert_id = excluded.expert_id,
                 service_assignment_id = excluded.service_assignment_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.client_id.0)
        .bind(&request.service_id.0)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status.as_str())
        .bind(&request.academic_level)
        .bind(request.deadline.to_rfc3339())
        .bind(request.budget.to_string())
        .bind(request.expert_id.as_ref().map(|id| id.0.clone()))
        .bind(request.service_assignment_id.as_ref().map(|id| id.0.clone()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_with_outbox(
        &self,
        request: ServiceRequest,
        outbox: Vec<OutboxEmail>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_request(&mut tx, &request).await?;
        insert_outbox_rows(&mut tx, &outbox).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_status_with_outbox(
        &self,
        id: &RequestId,
        observed: RequestStatus,
        next: RequestStatus,
        outbox: Vec<OutboxEmail>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE service_requests SET status = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .bind(observed.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_outbox_rows(&mut tx, &outbox).await?;
        tx.commit().await?;
        Ok(true)
    }
}
