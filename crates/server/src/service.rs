//! Request operations behind the HTTP API and the admin page.

use std::sync::Arc;

use tracing::{error, info};

use corner_core::domain::request::{
    timestamp_now, BatchDeleteBody, BatchDeleteOutcome, BatchUpdateBody, BatchUpdateOutcome,
    CreateRequestBody, ListQuery, Request, RequestPage, UpdateStatusBody,
};
use corner_core::errors::ApplicationError;
use corner_db::{RepositoryError, RequestRepository};

pub const NOT_FOUND_MESSAGE: &str = "Not found";
pub const NO_MATCHING_IDS_MESSAGE: &str = "No requests found with the provided IDs";

/// Stateless request operations over an injected store.
#[derive(Clone)]
pub struct RequestService {
    repository: Arc<dyn RequestRepository>,
}

impl RequestService {
    pub fn new(repository: Arc<dyn RequestRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(
        &self,
        query: &ListQuery,
        correlation_id: &str,
    ) -> Result<RequestPage, ApplicationError> {
        let page = query.validate()?;

        let total = self
            .repository
            .count(page.status)
            .await
            .map_err(|e| store_error("list", correlation_id, e))?;
        let data = self
            .repository
            .list(page.status, page.offset(), page.limit())
            .await
            .map_err(|e| store_error("list", correlation_id, e))?;

        Ok(RequestPage::new(data, page, total))
    }

    pub async fn create(
        &self,
        body: &CreateRequestBody,
        correlation_id: &str,
    ) -> Result<Request, ApplicationError> {
        let new_request = body.validate()?;
        let request = Request::create(new_request, timestamp_now());

        self.repository
            .insert(&request)
            .await
            .map_err(|e| store_error("create", correlation_id, e))?;

        info!(
            event_name = "request.created",
            correlation_id = %correlation_id,
            request_id = %request.id,
            "request created"
        );
        Ok(request)
    }

    pub async fn update_status(
        &self,
        body: &UpdateStatusBody,
        correlation_id: &str,
    ) -> Result<Request, ApplicationError> {
        let change = body.validate()?;

        let updated = self
            .repository
            .update_status(&change.id, change.status, timestamp_now())
            .await
            .map_err(|e| store_error("update_status", correlation_id, e))?
            .ok_or_else(|| ApplicationError::NotFound(NOT_FOUND_MESSAGE.to_string()))?;

        info!(
            event_name = "request.status_updated",
            correlation_id = %correlation_id,
            request_id = %updated.id,
            status = %updated.status,
            "request status updated"
        );
        Ok(updated)
    }

    pub async fn batch_update_status(
        &self,
        body: &BatchUpdateBody,
        correlation_id: &str,
    ) -> Result<BatchUpdateOutcome, ApplicationError> {
        let change = body.validate()?;

        let write = self
            .repository
            .update_status_many(&change.ids, change.status, timestamp_now())
            .await
            .map_err(|e| store_error("batch_update_status", correlation_id, e))?;
        if write.matched == 0 {
            return Err(ApplicationError::NotFound(NO_MATCHING_IDS_MESSAGE.to_string()));
        }

        let data = self
            .repository
            .find_many(&change.ids)
            .await
            .map_err(|e| store_error("batch_update_status", correlation_id, e))?;

        info!(
            event_name = "request.batch_updated",
            correlation_id = %correlation_id,
            requested = change.ids.len(),
            matched = write.matched,
            updated = write.modified,
            status = %change.status,
            "request statuses updated in batch"
        );
        Ok(BatchUpdateOutcome {
            message: format!("Successfully updated {} requests", write.modified),
            updated_count: write.modified,
            matched_count: write.matched,
            data,
        })
    }

    pub async fn batch_delete(
        &self,
        body: &BatchDeleteBody,
        correlation_id: &str,
    ) -> Result<BatchDeleteOutcome, ApplicationError> {
        let deletion = body.validate()?;

        let deleted = self
            .repository
            .delete_many(&deletion.ids)
            .await
            .map_err(|e| store_error("batch_delete", correlation_id, e))?;
        if deleted == 0 {
            return Err(ApplicationError::NotFound(NO_MATCHING_IDS_MESSAGE.to_string()));
        }

        info!(
            event_name = "request.batch_deleted",
            correlation_id = %correlation_id,
            requested = deletion.ids.len(),
            deleted,
            "requests deleted in batch"
        );
        Ok(BatchDeleteOutcome {
            message: format!("Successfully deleted {deleted} requests"),
            deleted_count: deleted,
        })
    }
}

fn store_error(
    operation: &'static str,
    correlation_id: &str,
    error: RepositoryError,
) -> ApplicationError {
    error!(
        event_name = "request.store_error",
        correlation_id = %correlation_id,
        operation,
        error = %error,
        "request store operation failed"
    );
    ApplicationError::Persistence(error.to_string())
}
