use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of migrations recorded as successfully applied. Fails when the
/// bookkeeping table does not exist yet.
pub async fn applied_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{applied_count, run_pending};
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] =
        &["request", "idx_request_created_date", "idx_request_status"];

    #[tokio::test]
    async fn migrations_create_request_table_and_indexes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let names: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

        for object in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == object), "missing schema object {object}");
        }
    }

    #[tokio::test]
    async fn applied_count_fails_before_first_migration() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert!(applied_count(&pool).await.is_err());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        assert_eq!(applied_count(&pool).await.expect("count applied migrations"), 1);
    }

    #[tokio::test]
    async fn schema_rejects_out_of_range_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO request (id, requestor_name, item_requested, created_date, last_edited_date, status)
             VALUES ('r1', 'Al', 'Blankets', '2025-01-01T00:00:00.000000Z', NULL, 'pending')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "two character requestor name must violate the check");

        let result = sqlx::query(
            "INSERT INTO request (id, requestor_name, item_requested, created_date, last_edited_date, status)
             VALUES ('r2', 'Jane Doe', 'Blankets', '2025-01-01T00:00:00.000000Z', NULL, 'archived')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "unknown status must violate the check");
    }
}
