use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use scholar_core::domain::profile::{ClientProfile, ExpertProfile, UserId};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn find_client(&self, id: &UserId) -> Result<Option<ClientProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.display_name, c.institution, c.academic_level
             FROM users u
             JOIN clients c ON c.user_id = u.id
             WHERE u.id = ? AND u.role = 'client'",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ClientProfile {
            user_id: UserId(
                row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            ),
            email: row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            display_name: row
                .try_get("display_name")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            institution: row
                .try_get("institution")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            academic_level: row
                .try_get("academic_level")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        }))
    }

    async fn find_expert(&self, id: &UserId) -> Result<Option<ExpertProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.display_name, e.specializations, e.hourly_rate
             FROM users u
             JOIN experts e ON e.user_id = u.id
             WHERE u.id = ? AND u.role = 'expert'",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let specializations_json: String = row
            .try_get("specializations")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let specializations: Vec<String> = serde_json::from_str(&specializations_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid specializations: {e}")))?;

        let hourly_rate_str: Option<String> =
            row.try_get("hourly_rate").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let hourly_rate = match hourly_rate_str {
            Some(raw) => Some(Decimal::from_str(&raw).map_err(|e| {
                RepositoryError::Decode(format!("invalid hourly rate `{raw}`: {e}"))
            })?),
            None => None,
        };

        Ok(Some(ExpertProfile {
            user_id: UserId(
                row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            ),
            email: row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?,
            display_name: row
                .try_get("display_name")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            specializations,
            hourly_rate,
        }))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use scholar_core::domain::profile::UserId;

    use super::SqlProfileRepository;
    use crate::repositories::ProfileRepository;
    use crate::testutil::{seed_directory, setup};

    #[tokio::test]
    async fn finds_the_seeded_client_with_profile_columns() {
        let pool = setup().await;
        seed_directory(&pool).await;

        let repo = SqlProfileRepository::new(pool);
        let client = repo
            .find_client(&UserId("client-emma".to_string()))
            .await
            .expect("query")
            .expect("should exist");

        assert_eq!(client.display_name, "Emma Wilson");
        assert_eq!(client.email, "emma@example.com");
        assert_eq!(client.institution.as_deref(), Some("Riverside University"));
    }

    #[tokio::test]
    async fn finds_the_seeded_expert_with_decoded_specializations() {
        let pool = setup().await;
        seed_directory(&pool).await;

        let repo = SqlProfileRepository::new(pool);
        let expert = repo
            .find_expert(&UserId("expert-chen".to_string()))
            .await
            .expect("query")
            .expect("should exist");

        assert!(expert.covers_category("Essay Writing"));
        assert_eq!(expert.hourly_rate, Some(Decimal::new(4_500, 2)));
    }

    #[tokio::test]
    async fn role_mismatch_reads_as_absent() {
        let pool = setup().await;
        seed_directory(&pool).await;

        let repo = SqlProfileRepository::new(pool);
        assert!(repo
            .find_client(&UserId("expert-chen".to_string()))
            .await
            .expect("query")
            .is_none());
        assert!(repo
            .find_expert(&UserId("client-emma".to_string()))
            .await
            .expect("query")
            .is_none());
    }
}
