//! Server-rendered admin page.
//!
//! `GET /admin?page=&status=` loads an [`AdminView`] through the in-process
//! [`ServiceClient`] and renders it with Tera. The browser script in
//! `static/admin.js` performs the interactive transitions against the JSON API.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{error, warn};

use corner_core::admin::{AdminSnapshot, AdminView, ClientError, RequestsClient, StatusTab};
use corner_core::domain::request::{
    BatchDeleteBody, BatchDeleteOutcome, BatchUpdateBody, BatchUpdateOutcome, CreateRequestBody,
    ListQuery, Request, RequestId, RequestPage, RequestStatus, UpdateStatusBody,
};
use corner_core::errors::{ApplicationError, InterfaceError};

use crate::api::{new_correlation_id, status_code};
use crate::service::RequestService;

const INDEX_TEMPLATE: &str = "admin/index.html";

/// [`RequestsClient`] that calls the service directly, without HTTP.
#[derive(Clone)]
pub struct ServiceClient {
    service: Arc<RequestService>,
}

impl ServiceClient {
    pub fn new(service: Arc<RequestService>) -> Self {
        Self { service }
    }
}

fn client_error(error: ApplicationError, correlation_id: String) -> ClientError {
    let interface = error.into_interface(correlation_id);
    let message = match &interface {
        InterfaceError::BadRequest { report, .. } => {
            format!("{}: {report}", interface.user_message())
        }
        _ => interface.user_message().to_string(),
    };
    ClientError::Rejected { status: status_code(&interface).as_u16(), message }
}

fn id_strings(ids: &[RequestId]) -> Vec<String> {
    ids.iter().map(|id| id.0.clone()).collect()
}

#[async_trait]
impl RequestsClient for ServiceClient {
    async fn list(
        &self,
        page: u32,
        status: Option<RequestStatus>,
    ) -> Result<RequestPage, ClientError> {
        let correlation_id = new_correlation_id();
        let query = ListQuery {
            page: Some(page.to_string()),
            status: status.map(|status| status.as_str().to_string()),
        };
        self.service.list(&query, &correlation_id).await.map_err(|e| client_error(e, correlation_id))
    }

    async fn create(&self, body: &CreateRequestBody) -> Result<Request, ClientError> {
        let correlation_id = new_correlation_id();
        self.service.create(body, &correlation_id).await.map_err(|e| client_error(e, correlation_id))
    }

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
    ) -> Result<Request, ClientError> {
        let correlation_id = new_correlation_id();
        let body = UpdateStatusBody {
            id: Some(id.0.clone()),
            status: Some(status.as_str().to_string()),
        };
        self.service
            .update_status(&body, &correlation_id)
            .await
            .map_err(|e| client_error(e, correlation_id))
    }

    async fn batch_update_status(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
    ) -> Result<BatchUpdateOutcome, ClientError> {
        let correlation_id = new_correlation_id();
        let body = BatchUpdateBody {
            ids: Some(id_strings(ids)),
            status: Some(status.as_str().to_string()),
        };
        self.service
            .batch_update_status(&body, &correlation_id)
            .await
            .map_err(|e| client_error(e, correlation_id))
    }

    async fn batch_delete(&self, ids: &[RequestId]) -> Result<BatchDeleteOutcome, ClientError> {
        let correlation_id = new_correlation_id();
        let body = BatchDeleteBody { ids: Some(id_strings(ids)) };
        self.service
            .batch_delete(&body, &correlation_id)
            .await
            .map_err(|e| client_error(e, correlation_id))
    }
}

#[derive(Clone)]
pub struct AdminState {
    client: ServiceClient,
    templates: Arc<Tera>,
}

/// Initialize Tera with the admin templates, falling back to the embedded copy.
pub fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/**/*.html") {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "failed to load admin templates from filesystem, using embedded copy");
            Tera::default()
        }
    };

    if !tera.get_template_names().any(|name| name == INDEX_TEMPLATE) {
        tera.add_raw_template(INDEX_TEMPLATE, include_str!("../../../templates/admin/index.html"))
            .ok();
    }

    Arc::new(tera)
}

pub fn router(service: Arc<RequestService>) -> Router {
    router_with_templates(service, init_templates())
}

pub fn router_with_templates(service: Arc<RequestService>, templates: Arc<Tera>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/admin") }))
        .route("/admin", get(admin_page))
        .with_state(AdminState { client: ServiceClient::new(service), templates })
}

#[derive(Debug, Serialize)]
struct TabLink {
    value: &'static str,
    label: &'static str,
    active: bool,
}

#[derive(Debug, Serialize)]
struct StatusOption {
    value: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct RequestRow {
    id: String,
    requestor_name: String,
    item_requested: String,
    created: String,
    last_edited: String,
    status: &'static str,
    selected: bool,
}

fn display_date(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn page_context(snapshot: &AdminSnapshot) -> Context {
    let rows: Vec<RequestRow> = snapshot
        .requests
        .iter()
        .map(|request| RequestRow {
            id: request.id.0.clone(),
            requestor_name: request.requestor_name.clone(),
            item_requested: request.item_requested.clone(),
            created: display_date(request.created_date),
            last_edited: request.last_edited_date.map(display_date).unwrap_or_default(),
            status: request.status.as_str(),
            selected: snapshot.selected_ids.contains(&request.id),
        })
        .collect();
    let tabs: Vec<TabLink> = StatusTab::ALL
        .iter()
        .map(|tab| TabLink { value: tab.as_str(), label: tab.label(), active: *tab == snapshot.tab })
        .collect();
    let statuses: Vec<StatusOption> = RequestStatus::ALL
        .iter()
        .map(|status| StatusOption { value: status.as_str(), label: status.label() })
        .collect();

    let pagination = &snapshot.pagination;
    let mut context = Context::new();
    context.insert("rows", &rows);
    context.insert("tabs", &tabs);
    context.insert("statuses", &statuses);
    context.insert("tab", snapshot.tab.as_str());
    context.insert("page", &snapshot.page);
    context.insert("total", &pagination.total);
    context.insert("total_pages", &pagination.total_pages);
    context.insert("prev_page", &(snapshot.page > 1).then(|| snapshot.page - 1));
    context.insert(
        "next_page",
        &(snapshot.page < pagination.total_pages).then(|| snapshot.page + 1),
    );
    context.insert("error", &snapshot.error);
    context.insert("notice", &snapshot.notice);
    context
}

fn render(templates: &Tera, snapshot: &AdminSnapshot) -> Result<String, (StatusCode, Html<String>)> {
    templates.render(INDEX_TEMPLATE, &page_context(snapshot)).map_err(|e| {
        error!(event_name = "admin.render_error", error = ?e, "admin template failed to render");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
    })
}

/// Page and tab from the query string. `status` accepts `all` as well as the four statuses.
fn parse_location(query: &ListQuery) -> Result<(u32, StatusTab), String> {
    let page = ListQuery { page: query.page.clone(), status: None }
        .validate()
        .map_err(|e| e.to_string())?
        .page;
    let tab = query.status.as_deref().unwrap_or_default().parse::<StatusTab>()?;
    Ok((page, tab))
}

async fn admin_page(
    State(state): State<AdminState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<(StatusCode, Html<String>), (StatusCode, Html<String>)> {
    let mut view = AdminView::new(state.client.clone());

    let location = query
        .map_err(|rejection| rejection.body_text())
        .and_then(|Query(query)| parse_location(&query));
    let (page, tab) = match location {
        Ok(location) => location,
        Err(message) => {
            let mut snapshot = view.snapshot();
            snapshot.error = Some(format!("Invalid input: {message}"));
            let html = render(&state.templates, &snapshot)?;
            return Ok((StatusCode::BAD_REQUEST, Html(html)));
        }
    };

    // A failed load renders the error slot with the failure's status.
    let status = match view.open(page, tab).await {
        Ok(()) => StatusCode::OK,
        Err(error) => load_failure_status(&error),
    };

    let html = render(&state.templates, &view.snapshot())?;
    Ok((status, Html(html)))
}

fn load_failure_status(error: &ClientError) -> StatusCode {
    match error {
        ClientError::Rejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ClientError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request as HttpRequest, StatusCode},
        Router,
    };
    use chrono::{DateTime, Utc};
    use tera::Tera;
    use tower::ServiceExt;

    use corner_core::admin::{AdminView, ClientError, RequestsClient, StatusTab};
    use corner_core::domain::request::{CreateRequestBody, Request, RequestId, RequestStatus};
    use corner_db::{BatchWrite, InMemoryRequestRepository, RepositoryError, RequestRepository};

    use super::{init_templates, load_failure_status, router_with_templates, ServiceClient};
    use crate::service::RequestService;

    fn service() -> Arc<RequestService> {
        Arc::new(RequestService::new(Arc::new(InMemoryRequestRepository::default())))
    }

    fn body(name: &str, item: &str) -> CreateRequestBody {
        CreateRequestBody {
            requestor_name: Some(name.to_string()),
            item_requested: Some(item.to_string()),
        }
    }

    async fn get_page(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
    }

    #[test]
    fn embedded_template_is_always_registered() {
        let tera = init_templates();
        assert!(tera.get_template_names().any(|name| name == "admin/index.html"));
    }

    #[tokio::test]
    async fn root_redirects_to_admin() {
        let app = router_with_templates(service(), Arc::new(Tera::default()));

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).expect("location"), "/admin");
    }

    #[tokio::test]
    async fn admin_page_lists_requests_for_the_tab() {
        let service = service();
        let client = ServiceClient::new(service.clone());
        client.create(&body("Jane Doe", "Blankets")).await.expect("create");
        let other = client.create(&body("John Roe", "Canned soup")).await.expect("create");
        client.update_status(&other.id, RequestStatus::Approved).await.expect("approve");

        let (status, html) =
            get_page(router_with_templates(service.clone(), init_templates()), "/admin").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Jane Doe"));
        assert!(html.contains("John Roe"));

        let (status, html) =
            get_page(router_with_templates(service, init_templates()), "/admin?status=pending")
                .await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Jane Doe"));
        assert!(!html.contains("John Roe"));
    }

    #[tokio::test]
    async fn admin_page_escapes_record_text() {
        let service = service();
        ServiceClient::new(service.clone())
            .create(&body("<b>Mallory</b>", "Blankets"))
            .await
            .expect("create");

        let (_, html) = get_page(router_with_templates(service, init_templates()), "/admin").await;

        assert!(!html.contains("<b>Mallory</b>"));
        assert!(html.contains("&lt;b&gt;Mallory&lt;&#x2F;b&gt;"));
    }

    #[tokio::test]
    async fn admin_page_rejects_invalid_location() {
        let (status, html) =
            get_page(router_with_templates(service(), init_templates()), "/admin?page=zero").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(html.contains("Invalid input"));
    }

    struct UnreadableStore;

    #[async_trait]
    impl RequestRepository for UnreadableStore {
        async fn insert(&self, _request: &Request) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn find_by_id(&self, _id: &RequestId) -> Result<Option<Request>, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn find_many(&self, _ids: &[RequestId]) -> Result<Vec<Request>, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn list(
            &self,
            _status: Option<RequestStatus>,
            _offset: u64,
            _limit: u32,
        ) -> Result<Vec<Request>, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn count(&self, _status: Option<RequestStatus>) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn update_status(
            &self,
            _id: &RequestId,
            _status: RequestStatus,
            _edited_at: DateTime<Utc>,
        ) -> Result<Option<Request>, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn update_status_many(
            &self,
            _ids: &[RequestId],
            _status: RequestStatus,
            _edited_at: DateTime<Utc>,
        ) -> Result<BatchWrite, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }

        async fn delete_many(&self, _ids: &[RequestId]) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Decode("table missing".into()))
        }
    }

    #[tokio::test]
    async fn admin_page_reports_failed_load_with_error_status() {
        let service = Arc::new(RequestService::new(Arc::new(UnreadableStore)));

        let (status, html) = get_page(router_with_templates(service, init_templates()), "/admin").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(html.contains("An unknown error occurred"));
        assert!(!html.contains("table missing"));
    }

    #[test]
    fn load_failures_map_to_response_status() {
        let missing = ClientError::Rejected { status: 404, message: "Not found".to_string() };
        assert_eq!(load_failure_status(&missing), StatusCode::NOT_FOUND);

        let garbled = ClientError::Rejected { status: 42, message: "odd".to_string() };
        assert_eq!(load_failure_status(&garbled), StatusCode::INTERNAL_SERVER_ERROR);

        let refused = ClientError::Transport("connection refused".to_string());
        assert_eq!(load_failure_status(&refused), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn admin_view_over_service_walks_through_a_session() {
        let client = ServiceClient::new(service());
        for index in 0..3 {
            client.create(&body(&format!("Person {index}"), "Blankets")).await.expect("create");
        }
        let mut view = AdminView::new(client);

        view.select_tab(StatusTab::All).await.expect("load");
        assert_eq!(view.requests().len(), 3);

        let first = view.requests()[0].id.clone();
        view.change_status(&first, RequestStatus::Completed).await.expect("row status");
        assert_eq!(view.requests()[0].status, RequestStatus::Completed);

        view.toggle_select_all();
        let outcome = view
            .batch_update_status(RequestStatus::Approved)
            .await
            .expect("batch update")
            .expect("selection was not empty");
        assert_eq!(outcome.matched_count, 3);
        assert!(view.requests().iter().all(|r| r.status == RequestStatus::Approved));
        assert_eq!(view.notice(), Some("Successfully updated 3 requests"));

        view.toggle_selection(&first);
        let deleted = view.batch_delete(|count| count == 1).await.expect("delete").expect("confirmed");
        assert_eq!(deleted.deleted_count, 1);
        assert_eq!(view.requests().len(), 2);

        let missing = view.client().update_status(&first, RequestStatus::Pending).await;
        assert!(matches!(missing, Err(ClientError::Rejected { status: 404, .. })));
    }
}
