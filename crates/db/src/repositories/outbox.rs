use chrono::{DateTime, Utc};
use sqlx::Row;

use scholar_core::domain::notification::EmailTemplate;
use scholar_core::domain::outbox::{OutboxEmail, OutboxEmailId, OutboxState};
use scholar_core::domain::request::RequestId;

use super::{parse_timestamp, OutboxRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOutboxRepository {
    pool: DbPool,
}

impl SqlOutboxRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, service_request_id, template, recipient, payload_json, state,
        retry_count, max_retries, available_at, claimed_by, last_error, created_at, updated_at";

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<OutboxEmail, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_request_id: String =
        row.try_get("service_request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let template_str: String =
        row.try_get("template").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let recipient: String =
        row.try_get("recipient").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let payload_json: String =
        row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state_str: String =
        row.try_get("state").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let retry_count: i64 =
        row.try_get("retry_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let max_retries: i64 =
        row.try_get("max_retries").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available_at: String =
        row.try_get("available_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let claimed_by: Option<String> =
        row.try_get("claimed_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_error: Option<String> =
        row.try_get("last_error").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let template = EmailTemplate::parse(&template_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown email template `{template_str}`"))
    })?;
    let state = OutboxState::parse(&state_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown outbox state `{state_str}`")))?;

    Ok(OutboxEmail {
        id: OutboxEmailId(id),
        service_request_id: RequestId(service_request_id),
        template,
        recipient,
        payload_json,
        state,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        available_at: parse_timestamp("available_at", &available_at)?,
        claimed_by,
        last_error,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl OutboxRepository for SqlOutboxRepository {
    async fn find_by_id(
        &self,
        id: &OutboxEmailId,
    ) -> Result<Option<OutboxEmail>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM email_outbox WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<OutboxEmail>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM email_outbox
             WHERE service_request_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_secs: u64,
        limit: u32,
        claimed_by: &str,
    ) -> Result<Vec<OutboxEmail>, RepositoryError> {
        let lease = chrono::Duration::seconds(i64::try_from(lease_secs).unwrap_or(i64::MAX));
        let stale_before = (now - lease).to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let candidates: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM email_outbox
             WHERE (state IN ('queued', 'retryable_failed') AND available_at <= ?1)
                OR (state = 'sending' AND updated_at <= ?2)
             ORDER BY available_at ASC, created_at ASC
             LIMIT ?3"
        ))
        .bind(now.to_rfc3339())
        .bind(&stale_before)
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for row in &candidates {
            let mut entry = row_to_entry(row)?;

            // Conditional claim: another worker may have taken the row
            // between the select and this write. A `sending` row is only
            // claimable once its lease has lapsed.
            let result = sqlx::query(
                "UPDATE email_outbox SET state = 'sending', claimed_by = ?1, updated_at = ?2
                 WHERE id = ?3
                   AND (state IN ('queued', 'retryable_failed')
                        OR (state = 'sending' AND updated_at <= ?4))",
            )
            .bind(claimed_by)
            .bind(now.to_rfc3339())
            .bind(&entry.id.0)
            .bind(&stale_before)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                entry.state = OutboxState::Sending;
                entry.claimed_by = Some(claimed_by.to_string());
                entry.updated_at = now;
                claimed.push(entry);
            }
        }

        tx.commit().await?;
        Ok(claimed)
    }

    async fn save(&self, entry: OutboxEmail) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_outbox (id, service_request_id, template, recipient, payload_json,
                                       state, retry_count, max_retries, available_at, claimed_by,
                                       last_error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 state = excluded.state,
                 retry_count = excluded.retry_count,
                 available_at = excluded.available_at,
                 claimed_by = excluded.claimed_by,
                 last_error = excluded.last_error,
                 updated_at = excluded.updated_at",
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
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
