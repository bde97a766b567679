use std::time::Duration;

use async_trait::async_trait;
use corner_core::admin::{AdminView, ClientError, RequestsClient, StatusTab};
use corner_core::config::{AppConfig, LoadOptions};
use corner_core::domain::request::{
    BatchDeleteBody, BatchDeleteOutcome, BatchUpdateBody, BatchUpdateOutcome, CreateRequestBody,
    ListQuery, Request, RequestId, RequestPage, RequestStatus, UpdateStatusBody,
    ValidationReport,
};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::CommandResult;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Rows a batch command acts on: explicit ids, or every row when `ids` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub ids: Option<Vec<String>>,
    pub page: u32,
    pub tab: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminAction {
    List { page: u32, tab: String },
    Create { name: String, item: String },
    SetStatus { id: String, status: String },
    BatchStatus { status: String, selection: Selection },
    BatchDelete { selection: Selection, confirmed: bool },
}

#[derive(Debug)]
pub struct AdminReport {
    pub message: String,
    pub data: Value,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AdminFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl AdminFailure {
    fn invalid_input(message: impl Into<String>) -> Self {
        Self { error_class: "invalid_input", message: message.into(), exit_code: 2 }
    }
}

impl From<ClientError> for AdminFailure {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Transport(message) => {
                Self { error_class: "api_unreachable", message, exit_code: 4 }
            }
            ClientError::Rejected { status, message } => Self {
                error_class: "api_rejected",
                message: format!("{message} (HTTP {status})"),
                exit_code: 5,
            },
        }
    }
}

/// Error payload returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<ValidationReport>,
}

/// [`RequestsClient`] speaking JSON over HTTP to a running server.
#[derive(Clone, Debug)]
pub struct HttpRequestsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRequestsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ClientError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(error: reqwest::Error) -> ClientError {
    ClientError::Transport(error.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|error| ClientError::Transport(format!("unreadable response body: {error}")));
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error, details: Some(report) }) if !report.is_empty() => {
            format!("{error}: {report}")
        }
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => format!("request failed with status {}", status.as_u16()),
    };
    Err(ClientError::Rejected { status: status.as_u16(), message })
}

fn id_strings(ids: &[RequestId]) -> Vec<String> {
    ids.iter().map(|id| id.0.clone()).collect()
}

#[async_trait]
impl RequestsClient for HttpRequestsClient {
    async fn list(
        &self,
        page: u32,
        status: Option<RequestStatus>,
    ) -> Result<RequestPage, ClientError> {
        let query = ListQuery {
            page: Some(page.to_string()),
            status: status.map(|status| status.as_str().to_string()),
        };
        let response = self
            .client
            .get(format!("{}/request", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn create(&self, body: &CreateRequestBody) -> Result<Request, ClientError> {
        self.send(Method::PUT, "/request", Some(body)).await
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
    ) -> Result<Request, ClientError> {
        let body = UpdateStatusBody {
            id: Some(id.0.clone()),
            status: Some(status.as_str().to_string()),
        };
        self.send(Method::PATCH, "/request", Some(&body)).await
    }

    async fn batch_update_status(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
    ) -> Result<BatchUpdateOutcome, ClientError> {
        let body = BatchUpdateBody {
            ids: Some(id_strings(ids)),
            status: Some(status.as_str().to_string()),
        };
        self.send(Method::PATCH, "/request/batch", Some(&body)).await
    }

    async fn batch_delete(&self, ids: &[RequestId]) -> Result<BatchDeleteOutcome, ClientError> {
        let body = BatchDeleteBody { ids: Some(id_strings(ids)) };
        self.send(Method::DELETE, "/request/batch", Some(&body)).await
    }
}

/// Runs one admin action. The API base URL comes from `url` or, when absent,
/// from the loaded configuration.
pub fn run(url: Option<String>, action: AdminAction) -> CommandResult {
    let base_url = match url {
        Some(url) => url,
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.server.api_base_url(),
            Err(error) => {
                return CommandResult::failure(
                    "admin",
                    "config_validation",
                    format!("configuration issue: {error}"),
                    2,
                );
            }
        },
    };

    let client = match HttpRequestsClient::new(base_url) {
        Ok(client) => client,
        Err(error) => return report_failure(error.into()),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "admin",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(execute(client, action)) {
        Ok(report) => CommandResult::success_with_data("admin", report.message, report.data),
        Err(failure) => report_failure(failure),
    }
}

fn report_failure(failure: AdminFailure) -> CommandResult {
    CommandResult::failure("admin", failure.error_class, failure.message, failure.exit_code)
}

pub async fn execute<C: RequestsClient>(
    client: C,
    action: AdminAction,
) -> Result<AdminReport, AdminFailure> {
    match action {
        AdminAction::List { page, tab } => {
            let mut view = AdminView::new(client);
            view.open(page, parse_tab(&tab)?).await?;
            let pagination = view.pagination();
            let message = format!(
                "page {} of {} ({} {} requests)",
                pagination.page,
                pagination.total_pages,
                pagination.total,
                view.tab()
            );
            Ok(AdminReport { message, data: to_value(&view.snapshot())? })
        }
        AdminAction::Create { name, item } => {
            let body = CreateRequestBody { requestor_name: Some(name), item_requested: Some(item) };
            let created = client.create(&body).await?;
            Ok(AdminReport {
                message: format!("created request {}", created.id),
                data: to_value(&created)?,
            })
        }
        AdminAction::SetStatus { id, status } => {
            let status = parse_status(&status)?;
            let updated = client.update_status(&RequestId(id), status).await?;
            Ok(AdminReport {
                message: format!("request {} is now {}", updated.id, updated.status.as_str()),
                data: to_value(&updated)?,
            })
        }
        AdminAction::BatchStatus { status, selection } => {
            let status = parse_status(&status)?;
            let mut view = AdminView::new(client);
            select(&mut view, &selection).await?;
            let message = match view.batch_update_status(status).await? {
                Some(outcome) => outcome.message,
                None => "nothing selected".to_string(),
            };
            Ok(AdminReport { message, data: to_value(&view.snapshot())? })
        }
        AdminAction::BatchDelete { selection, confirmed } => {
            let mut view = AdminView::new(client);
            select(&mut view, &selection).await?;
            let mut declined = None;
            let outcome = view
                .batch_delete(|count| {
                    if !confirmed {
                        declined = Some(count);
                    }
                    confirmed
                })
                .await?;
            if let Some(count) = declined {
                return Err(AdminFailure {
                    error_class: "confirmation_required",
                    message: format!(
                        "Are you sure you want to delete {count} request(s)? Re-run with --yes"
                    ),
                    exit_code: 2,
                });
            }
            let message = match outcome {
                Some(outcome) => outcome.message,
                None => "nothing selected".to_string(),
            };
            Ok(AdminReport { message, data: to_value(&view.snapshot())? })
        }
    }
}

/// Loads the selection's page and marks its rows. Ids must be on that page.
async fn select<C: RequestsClient>(
    view: &mut AdminView<C>,
    selection: &Selection,
) -> Result<(), AdminFailure> {
    view.open(selection.page, parse_tab(&selection.tab)?).await?;

    let Some(ids) = &selection.ids else {
        view.toggle_select_all();
        return Ok(());
    };

    for id in ids {
        let id = RequestId(id.clone());
        if !view.requests().iter().any(|request| request.id == id) {
            return Err(AdminFailure::invalid_input(format!(
                "request {id} is not on page {} of the {} tab",
                view.page(),
                view.tab()
            )));
        }
        if !view.is_selected(&id) {
            view.toggle_selection(&id);
        }
    }
    Ok(())
}

fn parse_tab(value: &str) -> Result<StatusTab, AdminFailure> {
    value.parse::<StatusTab>().map_err(AdminFailure::invalid_input)
}

fn parse_status(value: &str) -> Result<RequestStatus, AdminFailure> {
    value.parse::<RequestStatus>().map_err(|error| AdminFailure::invalid_input(error.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, AdminFailure> {
    serde_json::to_value(value).map_err(|error| AdminFailure {
        error_class: "serialization",
        message: error.to_string(),
        exit_code: 1,
    })
}
