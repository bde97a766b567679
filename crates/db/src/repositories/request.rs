use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use corner_core::domain::request::{Request, RequestId, RequestStatus};

use super::{BatchWrite, RepositoryError, RequestRepository};
use crate::DbPool;

const REQUEST_COLUMNS: &str =
    "id, requestor_name, item_requested, created_date, last_edited_date, status";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width UTC encoding so that text ordering matches time ordering.
pub fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}`: {e}")))
}

fn row_to_request(row: &SqliteRow) -> Result<Request, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requestor_name: String =
        row.try_get("requestor_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let item_requested: String =
        row.try_get("item_requested").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_date: String =
        row.try_get("created_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_edited_date: Option<String> =
        row.try_get("last_edited_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Request {
        id: RequestId(id),
        requestor_name,
        item_requested,
        created_date: decode_timestamp("created_date", &created_date)?,
        last_edited_date: last_edited_date
            .as_deref()
            .map(|raw| decode_timestamp("last_edited_date", raw))
            .transpose()?,
        status: status.parse::<RequestStatus>().map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[RequestId]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.0.clone());
    }
    separated.push_unseparated(")");
}

fn sql_limit(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO request (id, requestor_name, item_requested, created_date,
                                  last_edited_date, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.requestor_name)
        .bind(&request.item_requested)
        .bind(encode_timestamp(request.created_date))
        .bind(request.last_edited_date.map(encode_timestamp))
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn find_many(&self, ids: &[RequestId]) -> Result<Vec<Request>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {REQUEST_COLUMNS} FROM request WHERE id IN "));
        push_id_list(&mut builder, ids);
        builder.push(" ORDER BY created_date DESC, rowid DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Request>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {REQUEST_COLUMNS} FROM request"));
        if let Some(status) = status {
            builder.push(" WHERE status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY created_date DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(sql_limit(offset));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn count(&self, status: Option<RequestStatus>) -> Result<u64, RepositoryError> {
        let total: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM request WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query_scalar("SELECT COUNT(*) FROM request").fetch_one(&self.pool).await?,
        };

        u64::try_from(total).map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE request
             SET status = ?, last_edited_date = MAX(?, created_date)
             WHERE id = ?
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(encode_timestamp(edited_at))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn update_status_many(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<BatchWrite, RepositoryError> {
        if ids.is_empty() {
            return Ok(BatchWrite::default());
        }

        let mut tx = self.pool.begin().await?;

        // First statement must write: a WAL read snapshot cannot upgrade to a writer.
        let mut changed = QueryBuilder::<Sqlite>::new("UPDATE request SET status = ");
        changed
            .push_bind(status.as_str())
            .push(", last_edited_date = MAX(")
            .push_bind(encode_timestamp(edited_at))
            .push(", created_date) WHERE status <> ")
            .push_bind(status.as_str())
            .push(" AND id IN ");
        push_id_list(&mut changed, ids);
        let modified = changed.build().execute(&mut *tx).await?.rows_affected();

        let mut touched = QueryBuilder::<Sqlite>::new("UPDATE request SET last_edited_date = MAX(");
        touched
            .push_bind(encode_timestamp(edited_at))
            .push(", created_date) WHERE id IN ");
        push_id_list(&mut touched, ids);
        let matched = touched.build().execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        Ok(BatchWrite { matched, modified })
    }

    async fn delete_many(&self, ids: &[RequestId]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut delete = QueryBuilder::<Sqlite>::new("DELETE FROM request WHERE id IN ");
        push_id_list(&mut delete, ids);
        let result = delete.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
