use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use corner_core::domain::request::{Request, RequestId, RequestStatus};

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate request id: {0}")]
    Duplicate(String),
}

/// Counts reported by a batch status write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchWrite {
    /// Distinct ids that exist in the store.
    pub matched: u64,
    /// Matched records whose status actually changed.
    pub modified: u64,
}

/// Storage for request records.
///
/// Listing order is `created_date` descending, newest insert first on ties.
/// Batch writes are all-or-nothing.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;

    async fn find_many(&self, ids: &[RequestId]) -> Result<Vec<Request>, RepositoryError>;

    async fn list(
        &self,
        status: Option<RequestStatus>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Request>, RepositoryError>;

    async fn count(&self, status: Option<RequestStatus>) -> Result<u64, RepositoryError>;

    /// Sets the status of one record and returns it, or `None` when the id is unknown.
    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<Option<Request>, RepositoryError>;

    async fn update_status_many(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
        edited_at: DateTime<Utc>,
    ) -> Result<BatchWrite, RepositoryError>;

    /// Deletes every listed record that exists and returns how many were removed.
    async fn delete_many(&self, ids: &[RequestId]) -> Result<u64, RepositoryError>;
}
