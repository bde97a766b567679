//! JSON endpoints.
//!
//! - `GET    /request?page=&status=` list one page
//! - `PUT    /request`               create
//! - `PATCH  /request`               update one status
//! - `PATCH  /request/batch`         update many statuses
//! - `DELETE /request/batch`         delete many

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use corner_core::domain::request::{
    BatchDeleteBody, BatchDeleteOutcome, BatchUpdateBody, BatchUpdateOutcome, CreateRequestBody,
    ListQuery, Request, RequestPage, UpdateStatusBody, ValidationReport,
};
use corner_core::errors::InterfaceError;

use crate::service::RequestService;

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RequestService>,
}

/// Body of every non-2xx JSON response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationReport>,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

pub fn status_code(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(&self.0);
        let error = self.0.user_message().to_string();
        let details = match self.0 {
            InterfaceError::BadRequest { report, .. } => Some(report),
            _ => None,
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Framework rejections (bad JSON, wrong content type) count as invalid input.
fn rejected_input(field: &str, reason: String, correlation_id: String) -> ApiError {
    warn!(
        event_name = "request.input_rejected",
        correlation_id = %correlation_id,
        field,
        reason = %reason,
        "request input could not be decoded"
    );
    ApiError(InterfaceError::BadRequest {
        report: ValidationReport::single(field, reason),
        correlation_id,
    })
}

fn json_body<T>(
    body: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| rejected_input("body", rejection.body_text(), correlation_id.to_string()))
}

pub fn router(service: Arc<RequestService>) -> Router {
    Router::new()
        .route("/request", get(list_requests).put(create_request).patch(update_status))
        .route("/request/batch", patch(batch_update_status).delete(batch_delete))
        .with_state(ApiState { service })
}

async fn list_requests(
    State(state): State<ApiState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<RequestPage>, ApiError> {
    let correlation_id = new_correlation_id();
    let Query(query) = query
        .map_err(|rejection| rejected_input("query", rejection.body_text(), correlation_id.clone()))?;

    state
        .service
        .list(&query, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| ApiError(e.into_interface(correlation_id)))
}

async fn create_request(
    State(state): State<ApiState>,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let correlation_id = new_correlation_id();
    let body = json_body(body, &correlation_id)?;

    state
        .service
        .create(&body, &correlation_id)
        .await
        .map(|created| (StatusCode::CREATED, Json(created)))
        .map_err(|e| ApiError(e.into_interface(correlation_id)))
}

async fn update_status(
    State(state): State<ApiState>,
    body: Result<Json<UpdateStatusBody>, JsonRejection>,
) -> Result<Json<Request>, ApiError> {
    let correlation_id = new_correlation_id();
    let body = json_body(body, &correlation_id)?;

    state
        .service
        .update_status(&body, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| ApiError(e.into_interface(correlation_id)))
}

async fn batch_update_status(
    State(state): State<ApiState>,
    body: Result<Json<BatchUpdateBody>, JsonRejection>,
) -> Result<Json<BatchUpdateOutcome>, ApiError> {
    let correlation_id = new_correlation_id();
    let body = json_body(body, &correlation_id)?;

    state
        .service
        .batch_update_status(&body, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| ApiError(e.into_interface(correlation_id)))
}

async fn batch_delete(
    State(state): State<ApiState>,
    body: Result<Json<BatchDeleteBody>, JsonRejection>,
) -> Result<Json<BatchDeleteOutcome>, ApiError> {
    let correlation_id = new_correlation_id();
    let body = json_body(body, &correlation_id)?;

    state
        .service
        .batch_delete(&body, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| ApiError(e.into_interface(correlation_id)))
}
