//! Concurrent writers on a file-backed WAL database settle last-write-wins without errors.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tokio::task::JoinSet;

use corner_core::domain::request::{NewRequest, Request, RequestId, RequestStatus};
use corner_db::{connect_with_settings, migrations, RequestRepository, SqlRequestRepository};

const ROWS: usize = 20;

async fn file_store(dir: &tempfile::TempDir) -> Arc<SqlRequestRepository> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("corner.db").display());
    let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let store = SqlRequestRepository::new(pool);

    let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid date");
    for index in 0..ROWS {
        let mut request = Request::create(
            NewRequest {
                requestor_name: format!("Requestor {index}"),
                item_requested: "Blankets".to_string(),
            },
            base + Duration::minutes(index as i64),
        );
        request.id = RequestId(format!("row-{index:02}"));
        store.insert(&request).await.expect("insert");
    }
    Arc::new(store)
}

fn all_ids() -> Vec<RequestId> {
    (0..ROWS).map(|index| RequestId(format!("row-{index:02}"))).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batch_updates_all_succeed_and_leave_one_status() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = file_store(&dir).await;
    let ids = Arc::new(all_ids());

    let mut tasks = JoinSet::new();
    for round in 0..100 {
        let store = store.clone();
        let ids = ids.clone();
        let status =
            if round % 2 == 0 { RequestStatus::Approved } else { RequestStatus::Rejected };
        tasks.spawn(async move { store.update_status_many(&ids, status, Utc::now()).await });
    }

    while let Some(joined) = tasks.join_next().await {
        let write = joined.expect("task").expect("batch update should not fail under contention");
        assert_eq!(write.matched, ROWS as u64);
    }

    let rows = store.find_many(&ids).await.expect("read back");
    assert_eq!(rows.len(), ROWS);
    let winner = rows[0].status;
    assert!(matches!(winner, RequestStatus::Approved | RequestStatus::Rejected));
    assert!(rows.iter().all(|row| row.status == winner), "batches must not interleave");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_row_updates_all_succeed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = file_store(&dir).await;
    let target = RequestId("row-07".to_string());

    let mut tasks = JoinSet::new();
    for round in 0..100 {
        let store = store.clone();
        let target = target.clone();
        let status = RequestStatus::ALL[round % RequestStatus::ALL.len()];
        tasks.spawn(async move { store.update_status(&target, status, Utc::now()).await });
    }

    let mut confirmed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let updated = joined.expect("task").expect("row update should not fail under contention");
        confirmed.push(updated.expect("row exists").status);
    }
    assert_eq!(confirmed.len(), 100);

    let stored = store.find_by_id(&target).await.expect("read back").expect("row exists");
    assert!(stored.last_edited_date.is_some());
    assert!(stored.last_edited_date >= Some(stored.created_date));
}
