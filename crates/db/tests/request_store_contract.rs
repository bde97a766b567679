//! The SQL store and the in-memory fake must agree on ordering, counting and batch semantics.

use chrono::{Duration, TimeZone, Utc};

use corner_core::domain::request::{NewRequest, Request, RequestId, RequestStatus};
use corner_db::{
    connect_with_settings, migrations, BatchWrite, InMemoryRequestRepository, RequestRepository,
    SqlRequestRepository,
};

fn request(id: &str, name: &str, minutes: i64) -> Request {
    let created = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid date")
        + Duration::minutes(minutes);
    let mut request = Request::create(
        NewRequest { requestor_name: name.to_string(), item_requested: "Blankets".to_string() },
        created,
    );
    request.id = RequestId(id.to_string());
    request
}

fn ids(raw: &[&str]) -> Vec<RequestId> {
    raw.iter().map(|id| RequestId((*id).to_string())).collect()
}

async fn sql_store() -> SqlRequestRepository {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    SqlRequestRepository::new(pool)
}

async fn exercise(store: &dyn RequestRepository) {
    for (index, name) in ["Jane Doe", "John Roe", "Ada Byron", "Alan Turing"].iter().enumerate() {
        store.insert(&request(&format!("r{index}"), name, index as i64)).await.expect("insert");
    }
    store.insert(&request("r4", "Grace Hopper", 3)).await.expect("insert tie");

    let listed = store.list(None, 0, 10).await.expect("list");
    let order: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, ["r4", "r3", "r2", "r1", "r0"]);

    let page_two = store.list(None, 3, 3).await.expect("page two");
    assert_eq!(page_two.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r1", "r0"]);

    let edited_at = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).single().expect("valid date");
    let updated = store
        .update_status(&RequestId("r0".into()), RequestStatus::Approved, edited_at)
        .await
        .expect("update")
        .expect("r0 exists");
    assert_eq!(updated.status, RequestStatus::Approved);
    assert_eq!(updated.last_edited_date, Some(edited_at));

    let write = store
        .update_status_many(&ids(&["r0", "r1", "missing"]), RequestStatus::Approved, edited_at)
        .await
        .expect("batch update");
    assert_eq!(write, BatchWrite { matched: 2, modified: 1 });
    assert_eq!(store.count(Some(RequestStatus::Approved)).await.expect("count"), 2);
    assert_eq!(store.count(Some(RequestStatus::Pending)).await.expect("count"), 3);

    let found = store.find_many(&ids(&["r1", "r0", "missing"])).await.expect("find many");
    assert_eq!(found.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r1", "r0"]);

    let deleted = store.delete_many(&ids(&["r2", "r3", "missing"])).await.expect("delete");
    assert_eq!(deleted, 2);
    assert_eq!(store.count(None).await.expect("count"), 3);
    assert!(store.find_by_id(&RequestId("r2".into())).await.expect("find").is_none());
}

#[tokio::test]
async fn sql_store_honours_request_store_contract() {
    let store = sql_store().await;
    exercise(&store).await;
}

#[tokio::test]
async fn in_memory_store_honours_request_store_contract() {
    let store = InMemoryRequestRepository::default();
    exercise(&store).await;
}
