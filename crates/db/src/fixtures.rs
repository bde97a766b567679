use chrono::{DateTime, Duration, TimeZone, Utc};

use corner_core::domain::request::RequestStatus;

use crate::connection::DbPool;
use crate::repositories::request::encode_timestamp;
use crate::repositories::RepositoryError;

/// Demo requests spread over every status, enough to fill more than one page.
const SEED_REQUESTS: &[SeedRequest] = &[
    SeedRequest::new("demo-req-001", "Jane Doe", "Blankets", RequestStatus::Pending, 0, None),
    SeedRequest::new("demo-req-002", "Marcus Lee", "Canned soup", RequestStatus::Approved, 3, Some(5)),
    SeedRequest::new("demo-req-003", "Priya Natarajan", "Winter coat (size M)", RequestStatus::Completed, 7, Some(30)),
    SeedRequest::new("demo-req-004", "Tom Alvarez", "Diapers", RequestStatus::Rejected, 12, Some(14)),
    SeedRequest::new("demo-req-005", "Aiko Tanaka", "Bus pass", RequestStatus::Pending, 20, None),
    SeedRequest::new("demo-req-006", "Samuel Okafor", "Baby formula", RequestStatus::Approved, 26, Some(27)),
    SeedRequest::new("demo-req-007", "Elena Petrova", "Rice", RequestStatus::Pending, 31, None),
    SeedRequest::new("demo-req-008", "Noah Williams", "Sleeping bag", RequestStatus::Completed, 40, Some(52)),
    SeedRequest::new("demo-req-009", "Fatima Zahra", "Toothpaste", RequestStatus::Pending, 45, None),
    SeedRequest::new("demo-req-010", "Liam O'Brien", "Work boots", RequestStatus::Rejected, 49, Some(50)),
    SeedRequest::new("demo-req-011", "Grace Kim", "School supplies", RequestStatus::Approved, 55, Some(60)),
    SeedRequest::new("demo-req-012", "Diego Ramirez", "Space heater", RequestStatus::Pending, 61, None),
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Every id the dataset owns.
    pub fn ids() -> impl Iterator<Item = &'static str> {
        SEED_REQUESTS.iter().map(|seed| seed.id)
    }

    /// Insert the demo requests. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;

        for seed in SEED_REQUESTS {
            let created = seed.created_date();
            let result = sqlx::query(
                "INSERT OR IGNORE INTO request (id, requestor_name, item_requested, created_date,
                                                last_edited_date, status)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(seed.id)
            .bind(seed.requestor_name)
            .bind(seed.item_requested)
            .bind(encode_timestamp(created))
            .bind(encode_timestamp(seed.last_edited_date()))
            .bind(seed.status.as_str())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        Ok(SeedResult { inserted, total: SEED_REQUESTS.len() })
    }

    /// Verify that every demo request is present. Statuses may have moved on
    /// since seeding, so only presence is checked.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_REQUESTS.len());

        for seed in SEED_REQUESTS {
            let present: Option<i64> = sqlx::query_scalar("SELECT 1 FROM request WHERE id = ?")
                .bind(seed.id)
                .fetch_optional(pool)
                .await?;
            checks.push((seed.id, present.is_some()));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the demo requests.
    pub async fn clean(pool: &DbPool) -> Result<u64, RepositoryError> {
        let mut tx = pool.begin().await?;
        let mut removed = 0;
        for seed in SEED_REQUESTS {
            removed += sqlx::query("DELETE FROM request WHERE id = ?")
                .bind(seed.id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequest {
    id: &'static str,
    requestor_name: &'static str,
    item_requested: &'static str,
    status: RequestStatus,
    created_offset_hours: i64,
    edited_offset_hours: Option<i64>,
}

impl SeedRequest {
    const fn new(
        id: &'static str,
        requestor_name: &'static str,
        item_requested: &'static str,
        status: RequestStatus,
        created_offset_hours: i64,
        edited_offset_hours: Option<i64>,
    ) -> Self {
        Self { id, requestor_name, item_requested, status, created_offset_hours, edited_offset_hours }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).single().unwrap_or_default()
    }

    fn created_date(&self) -> DateTime<Utc> {
        Self::epoch() + Duration::hours(self.created_offset_hours)
    }

    fn last_edited_date(&self) -> DateTime<Utc> {
        Self::epoch() + Duration::hours(self.edited_offset_hours.unwrap_or(self.created_offset_hours))
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub inserted: u64,
    pub total: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
