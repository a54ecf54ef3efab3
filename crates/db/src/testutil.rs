//! Shared helpers for repository tests.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use scholar_core::config::DatabaseConfig;
use scholar_core::domain::catalog::ServiceId;
use scholar_core::domain::profile::UserId;
use scholar_core::domain::request::{RequestId, RequestStatus, ServiceRequest};

use crate::{connect, migrations, DbPool};

pub fn memory_config() -> DatabaseConfig {
    DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1, timeout_secs: 30 }
}

pub async fn setup() -> DbPool {
    let pool = connect(&memory_config()).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    pool
}

/// Minimal directory rows satisfying request foreign keys: one client, two
/// experts, two catalog services.
pub async fn seed_directory(pool: &DbPool) {
    sqlx::query(
        "INSERT INTO users (id, email, display_name, role, created_at) VALUES
             ('client-emma', 'emma@example.com', 'Emma Wilson', 'client', ?1),
             ('expert-chen', 'chen@scholar.example', 'Dr. Chen', 'expert', ?1),
             ('expert-okafor', 'okafor@scholar.example', 'Ada Okafor', 'expert', ?1)",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .expect("seed users");

    sqlx::query(
        "INSERT INTO clients (user_id, institution, academic_level)
         VALUES ('client-emma', 'Riverside University', 'Undergraduate')",
    )
    .execute(pool)
    .await
    .expect("seed client profile");

    sqlx::query(
        "INSERT INTO experts (user_id, specializations, hourly_rate) VALUES
             ('expert-chen', '[\"Essay Writing\",\"Statistics\"]', '45.00'),
             ('expert-okafor', '[\"Research\"]', NULL)",
    )
    .execute(pool)
    .await
    .expect("seed expert profiles");

    sqlx::query(
        "INSERT INTO services (id, name, category, description, created_at) VALUES
             ('svc-essay', 'Essay Writing Support', 'Essay Writing', NULL, ?1),
             ('svc-stats', 'Statistics Tutoring', 'Statistics', NULL, ?1)",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .expect("seed services");
}

pub fn sample_request(id: &str, status: RequestStatus) -> ServiceRequest {
    let now = Utc::now();
    ServiceRequest {
        id: RequestId(id.to_string()),
        client_id: UserId("client-emma".to_string()),
        service_id: ServiceId("svc-essay".to_string()),
        title: "Essay Help".to_string(),
        description: "Five pages on the industrial revolution".to_string(),
        status,
        academic_level: "Undergraduate".to_string(),
        deadline: now + Duration::days(7),
        budget: Decimal::new(12_000, 2),
        expert_id: None,
        service_assignment_id: None,
        created_at: now,
        updated_at: now,
    }
}
