use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use corner_core::domain::request::{Request, RequestId, RequestStatus};

use super::{BatchWrite, RepositoryError, RequestRepository};

/// Request store kept in insertion order; used by service and handler tests.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<Vec<Request>>,
}

impl InMemoryRequestRepository {
    pub fn with_requests(requests: Vec<Request>) -> Self {
        Self { requests: RwLock::new(requests) }
    }
}

fn newest_first<'a>(requests: impl DoubleEndedIterator<Item = &'a Request>) -> Vec<Request> {
    let mut ordered: Vec<Request> = requests.rev().cloned().collect();
    ordered.sort_by(|a, b| b.created_date.cmp(&a.created_date));
    ordered
}

fn id_set(ids: &[RequestId]) -> HashSet<&str> {
    ids.iter().map(RequestId::as_str).collect()
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        if requests.iter().any(|existing| existing.id == request.id) {
            return Err(RepositoryError::Duplicate(request.id.to_string()));
        }
        requests.push(request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.iter().find(|request| &request.id == id).cloned())
    }

    async fn find_many(&self, ids: &[RequestId]) -> Result<Vec<Request>, RepositoryError> {
        let wanted = id_set(ids);
        let requests = self.requests.read().await;
        Ok(newest_first(requests.iter().filter(|request| wanted.contains(request.id.as_str()))))
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let ordered = newest_first(
            requests.iter().filter(|request| status.map_or(true, |status| request.status == status)),
        );
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(ordered.into_iter().skip(skip).take(limit as usize).collect())
    }

    async fn count(&self, status: Option<RequestStatus>) -> Result<u64, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests
            .iter()
            .filter(|request| status.map_or(true, |status| request.status == status))
            .count() as u64)
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<Request>, RepositoryError> {
        let mut requests = self.requests.write().await;
        Ok(requests.iter_mut().find(|request| &request.id == id).map(|request| {
            request.set_status(status, edited_at);
            request.clone()
        }))
    }

    async fn update_status_many(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<BatchWrite, RepositoryError> {
        let wanted = id_set(ids);
        let mut requests = self.requests.write().await;
        let mut write = BatchWrite::default();
        for request in requests.iter_mut().filter(|request| wanted.contains(request.id.as_str())) {
            write.matched += 1;
            if request.status != status {
                write.modified += 1;
            }
            request.set_status(status, edited_at);
        }
        Ok(write)
    }

    async fn delete_many(&self, ids: &[RequestId]) -> Result<u64, RepositoryError> {
        let wanted = id_set(ids);
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|request| !wanted.contains(request.id.as_str()));
        Ok((before - requests.len()) as u64)
    }
}
