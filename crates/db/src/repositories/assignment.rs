use chrono::Utc;
use sqlx::Row;

use scholar_core::domain::assignment::{
    AssignmentId, AssignmentStatus, PaymentStatus, ServiceAssignment,
};
use scholar_core::domain::profile::UserId;
use scholar_core::domain::request::RequestId;

use super::{parse_timestamp, AssignmentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAssignmentRepository {
    pool: DbPool,
}

impl SqlAssignmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, service_request_id, expert_id, status, payment_status,
        due_date, created_at, updated_at";

fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceAssignment, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_request_id: String =
        row.try_get("service_request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expert_id: String =
        row.try_get("expert_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let payment_str: String =
        row.try_get("payment_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let due_date: String =
        row.try_get("due_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = AssignmentStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown assignment status `{status_str}`"))
    })?;
    let payment_status = PaymentStatus::parse(&payment_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment status `{payment_str}`"))
    })?;

    Ok(ServiceAssignment {
        id: AssignmentId(id),
        service_request_id: RequestId(service_request_id),
        expert_id: UserId(expert_id),
        status,
        payment_status,
        due_date: parse_timestamp("due_date", &due_date)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl AssignmentRepository for SqlAssignmentRepository {
    async fn find_by_id(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<ServiceAssignment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM service_assignments WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_assignment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ServiceAssignment>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM service_assignments
             WHERE service_request_id = ? ORDER BY created_at ASC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_assignment).collect::<Result<Vec<_>, _>>()
    }

    async fn create_for_request(
        &self,
        assignment: ServiceAssignment,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Attach to the parent first, keyed on the pair being unset. Two
        // admins assigning concurrently race here; only one write matches.
        let result = sqlx::query(
            "UPDATE service_requests SET expert_id = ?, service_assignment_id = ?, updated_at = ?
             WHERE id = ? AND expert_id IS NULL AND service_assignment_id IS NULL",
        )
        .bind(&assignment.expert_id.0)
        .bind(&assignment.id.0)
        .bind(Utc::now().to_rfc3339())
        .bind(&assignment.service_request_id.0)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO service_assignments (id, service_request_id, expert_id, status,
                                              payment_status, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&assignment.id.0)
        .bind(&assignment.service_request_id.0)
        .bind(&assignment.expert_id.0)
        .bind(assignment.status.as_str())
        .bind(assignment.payment_status.as_str())
        .bind(assignment.due_date.to_rfc3339())
        .bind(assignment.created_at.to_rfc3339())
        .bind(assignment.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn save(&self, assignment: ServiceAssignment) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO service_assignments (id, service_request_id, expert_id, status,
                                              payment_status, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 payment_status = excluded.payment_status,
                 due_date = excluded.due_date,
                 updated_at = excluded.updated_at",
        )
        .bind(&assignment.id.0)
        .bind(&assignment.service_request_id.0)
        .bind(&assignment.expert_id.0)
        .bind(assignment.status.as_str())
        .bind(assignment.payment_status.as_str())
        .bind(assignment.due_date.to_rfc3339())
        .bind(assignment.created_at.to_rfc3339())
        .bind(assignment.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
