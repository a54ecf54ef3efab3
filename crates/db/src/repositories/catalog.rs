use sqlx::Row;

use scholar_core::domain::catalog::{Service, ServiceId};

use super::{parse_timestamp, RepositoryError, ServiceRepository};
use crate::DbPool;

pub struct SqlServiceRepository {
    pool: DbPool,
}

impl SqlServiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_service(row: &sqlx::sqlite::SqliteRow) -> Result<Service, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Service {
        id: ServiceId(id),
        name,
        category,
        description,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ServiceRepository for SqlServiceRepository {
    async fn find_by_id(&self, id: &ServiceId) -> Result<Option<Service>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, category, description, created_at FROM services WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_service(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Service>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, name, category, description, created_at FROM services ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_service).collect::<Result<Vec<_>, _>>()
    }
}
