use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use scholar_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

/// Readiness payload. `database` proves the pool can execute a query;
/// `outbox` summarizes the email backlog so an operator probing `/health`
/// sees stuck notifications without opening the database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub outbox: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let outbox = outbox_check(&state.db_pool).await;

    let degraded = database.status == "degraded" || outbox.status == "degraded";
    let status = if degraded {
        "degraded"
    } else if outbox.status == "attention" {
        "attention"
    } else {
        "ready"
    };

    let payload = HealthResponse {
        status,
        database,
        outbox,
        checked_at: Utc::now().to_rfc3339(),
    };

    // Dead-letter rows need an operator but the service still serves
    // traffic, so `attention` stays 200.
    let status_code = if degraded { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn outbox_check(pool: &DbPool) -> HealthCheck {
    let counts = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT COALESCE(SUM(state = 'queued'), 0),
                COALESCE(SUM(state = 'retryable_failed'), 0),
                COALESCE(SUM(state = 'failed_terminal'), 0)
         FROM email_outbox",
    )
    .fetch_one(pool)
    .await;

    match counts {
        Ok((queued, retryable, failed_terminal)) => {
            let detail =
                format!("queued={queued} retryable={retryable} failed_terminal={failed_terminal}");
            if failed_terminal > 0 {
                HealthCheck { status: "attention", detail }
            } else {
                HealthCheck { status: "ready", detail }
            }
        }
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("outbox query failed: {error}") }
        }
    }
}
