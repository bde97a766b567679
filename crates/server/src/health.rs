use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use corner_db::migrations::{self, MIGRATOR};
use corner_db::{DbPool, SharedPool};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db: Arc<SharedPool>,
    started_at: Instant,
}

impl HealthState {
    pub fn new(db: Arc<SharedPool>) -> Self {
        Self { db, started_at: Instant::now() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub uptime_secs: u64,
    pub checked_at: String,
}

pub fn router(db: Arc<SharedPool>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(db))
}

pub async fn spawn(bind_address: &str, port: u16, db: Arc<SharedPool>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db)).await {
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
    let (database, schema) = match state.db.get().await {
        Ok(pool) => {
            let database = database_check(pool).await;
            let schema = if database.is_ready() {
                schema_check(pool).await
            } else {
                HealthCheck::degraded("skipped: database unreachable")
            };
            (database, schema)
        }
        Err(error) => (
            HealthCheck::degraded(format!("database connection failed: {error}")),
            HealthCheck::degraded("skipped: database unreachable"),
        ),
    };
    let ready = database.is_ready() && schema.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck::ready("corner-server runtime initialized"),
        database,
        schema,
        uptime_secs: state.started_at.elapsed().as_secs(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::ready("database query succeeded"),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    }
}

/// Every embedded migration must be recorded as applied.
async fn schema_check(pool: &DbPool) -> HealthCheck {
    let expected = MIGRATOR.iter().count() as i64;
    let applied = migrations::applied_count(pool).await;

    match applied {
        Ok(applied) if applied >= expected => {
            HealthCheck::ready(format!("{applied} of {expected} migrations applied"))
        }
        Ok(applied) => HealthCheck::degraded(format!("{applied} of {expected} migrations applied")),
        Err(error) => HealthCheck::degraded(format!("migration state unavailable: {error}")),
    }
}
