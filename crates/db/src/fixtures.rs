use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo seeds: users in each role, the service catalog, and
/// requests parked at representative lifecycle stages.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        request_id: "req-demo-submitted",
        client_id: "client-emma",
        status: "submitted",
        assigned_expert: None,
        description: "Fresh submission awaiting admin review",
    },
    SeedRequestContract {
        request_id: "req-demo-payment",
        client_id: "client-luis",
        status: "pending_payment",
        assigned_expert: None,
        description: "Reviewed, waiting on payment",
    },
    SeedRequestContract {
        request_id: "req-demo-progress",
        client_id: "client-emma",
        status: "in_progress",
        assigned_expert: Some("expert-chen"),
        description: "Paid and assigned, work underway",
    },
];

const SEED_USER_IDS: &[&str] =
    &["admin-priya", "client-emma", "client-luis", "expert-chen", "expert-okafor"];

const SEED_SERVICE_IDS: &[&str] = &["svc-essay", "svc-stats", "svc-research"];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset in one transaction. Reloading is idempotent.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|contract| RequestSeedInfo {
                request_id: contract.request_id,
                status: contract.status,
                description: contract.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { requests_seeded })
    }

    /// Verify the seeded rows match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let quoted_users = sql_array_from_ids(SEED_USER_IDS);
        let user_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(1) FROM users WHERE id IN {quoted_users}"))
                .fetch_one(pool)
                .await?;
        checks.push(("seed-users", user_count == SEED_USER_IDS.len() as i64));

        let quoted_services = sql_array_from_ids(SEED_SERVICE_IDS);
        let service_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM services WHERE id IN {quoted_services}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("seed-services", service_count == SEED_SERVICE_IDS.len() as i64));

        for contract in SEED_REQUESTS {
            let matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM service_requests
                 WHERE id = ?1 AND client_id = ?2 AND status = ?3)",
            )
            .bind(contract.request_id)
            .bind(contract.client_id)
            .bind(contract.status)
            .fetch_one(pool)
            .await?;
            checks.push((contract.request_id, matches == 1));

            let expert: Option<String> =
                sqlx::query_scalar("SELECT expert_id FROM service_requests WHERE id = ?1")
                    .bind(contract.request_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((
                contract.assignment_label(),
                expert.as_deref() == contract.assigned_expert,
            ));
        }

        // The assigned request must carry a matching assignment row.
        let assignment_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM service_assignments
             WHERE id = 'asg-demo-progress'
               AND service_request_id = 'req-demo-progress'
               AND expert_id = 'expert-chen' AND status = 'active')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("seed-assignment", assignment_ok == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded fixtures from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_users = sql_array_from_ids(SEED_USER_IDS);
        let quoted_services = sql_array_from_ids(SEED_SERVICE_IDS);
        let quoted_requests = sql_array_from_ids(
            &SEED_REQUESTS.iter().map(|c| c.request_id).collect::<Vec<_>>(),
        );

        sqlx::query("DELETE FROM service_assignments WHERE id = 'asg-demo-progress'")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM email_outbox WHERE service_request_id IN {quoted_requests}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM service_requests WHERE id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM services WHERE id IN {quoted_services}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM clients WHERE user_id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM experts WHERE user_id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM users WHERE id IN {quoted_users}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    request_id: &'static str,
    client_id: &'static str,
    status: &'static str,
    assigned_expert: Option<&'static str>,
    description: &'static str,
}

impl SeedRequestContract {
    fn assignment_label(&self) -> &'static str {
        match self.status {
            "submitted" => "seed-submitted-unassigned",
            "pending_payment" => "seed-payment-unassigned",
            _ => "seed-progress-assigned",
        }
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests_seeded: Vec<RequestSeedInfo>,
}

#[derive(Debug)]
pub struct RequestSeedInfo {
    pub request_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
