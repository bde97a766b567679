//! View state and controller behind the admin table.
//!
//! `AdminView` owns the transient copy of one page of requests plus the
//! selection, tab, and message slots the UI renders. Every transition talks to
//! the service through [`RequestsClient`] and only applies what the server
//! confirmed; a failed call leaves the previous state untouched and fills the
//! error slot.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{
    BatchDeleteOutcome, BatchUpdateOutcome, CreateRequestBody, Request, RequestId, RequestPage,
    RequestStatus, PAGE_SIZE,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTab {
    #[default]
    All,
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl StatusTab {
    pub const ALL: [StatusTab; 5] =
        [Self::All, Self::Pending, Self::Approved, Self::Completed, Self::Rejected];

    /// `All` lists without a status filter.
    pub fn filter(self) -> Option<RequestStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(RequestStatus::Pending),
            Self::Approved => Some(RequestStatus::Approved),
            Self::Completed => Some(RequestStatus::Completed),
            Self::Rejected => Some(RequestStatus::Rejected),
        }
    }

    pub fn as_str(self) -> &'static str {
        self.filter().map(|status| status.as_str()).unwrap_or("all")
    }

    pub fn label(self) -> &'static str {
        self.filter().map(|status| status.label()).unwrap_or("All")
    }
}

impl fmt::Display for StatusTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusTab {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" | "all" => Ok(Self::All),
            other => other
                .parse::<RequestStatus>()
                .map(|status| match status {
                    RequestStatus::Pending => Self::Pending,
                    RequestStatus::Approved => Self::Approved,
                    RequestStatus::Completed => Self::Completed,
                    RequestStatus::Rejected => Self::Rejected,
                })
                .map_err(|error| error.to_string()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The service answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Operations the admin view needs from the request service.
#[async_trait]
pub trait RequestsClient: Send + Sync {
    async fn list(
        &self,
        page: u32,
        status: Option<RequestStatus>,
    ) -> Result<RequestPage, ClientError>;

    async fn create(&self, body: &CreateRequestBody) -> Result<Request, ClientError>;

    async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
    ) -> Result<Request, ClientError>;

    async fn batch_update_status(
        &self,
        ids: &[RequestId],
        status: RequestStatus,
    ) -> Result<BatchUpdateOutcome, ClientError>;

    async fn batch_delete(&self, ids: &[RequestId]) -> Result<BatchDeleteOutcome, ClientError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: PAGE_SIZE, total: 0, total_pages: 1 }
    }
}

/// Serializable copy of the view, used for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSnapshot {
    pub page: u32,
    pub tab: StatusTab,
    pub requests: Vec<Request>,
    pub pagination: Pagination,
    pub selected_ids: Vec<RequestId>,
    pub all_selected: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

pub struct AdminView<C> {
    client: C,
    page: u32,
    tab: StatusTab,
    requests: Vec<Request>,
    pagination: Pagination,
    selected: BTreeSet<RequestId>,
    error: Option<String>,
    notice: Option<String>,
}

impl<C: RequestsClient> AdminView<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            page: 1,
            tab: StatusTab::All,
            requests: Vec::new(),
            pagination: Pagination::default(),
            selected: BTreeSet::new(),
            error: None,
            notice: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn tab(&self) -> StatusTab {
        self.tab
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn selected_ids(&self) -> Vec<RequestId> {
        self.selected.iter().cloned().collect()
    }

    pub fn is_selected(&self, id: &RequestId) -> bool {
        self.selected.contains(id)
    }

    pub fn all_selected(&self) -> bool {
        !self.requests.is_empty() && self.selected.len() == self.requests.len()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Re-issues List for the current page and tab.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.load(self.page, self.tab).await
    }

    /// Switches tab, which always starts over at page 1.
    pub async fn select_tab(&mut self, tab: StatusTab) -> Result<(), ClientError> {
        self.load(1, tab).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<(), ClientError> {
        self.load(page.max(1), self.tab).await
    }

    /// Jumps straight to `page` of `tab`, as a deep link does.
    pub async fn open(&mut self, page: u32, tab: StatusTab) -> Result<(), ClientError> {
        self.load(page.max(1), tab).await
    }

    /// Loads `page`/`tab` and commits them only when the fetch succeeds.
    async fn load(&mut self, page: u32, tab: StatusTab) -> Result<(), ClientError> {
        match self.client.list(page, tab.filter()).await {
            Ok(response) => {
                self.page = page;
                self.tab = tab;
                self.pagination = Pagination {
                    page: response.page,
                    limit: response.limit,
                    total: response.total,
                    total_pages: response.total_pages,
                };
                self.requests = response.data;
                self.selected.clear();
                self.error = None;
                self.notice = None;
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Ids that are not on the current page are ignored.
    pub fn toggle_selection(&mut self, id: &RequestId) {
        if self.selected.remove(id) {
            return;
        }
        if self.requests.iter().any(|request| &request.id == id) {
            self.selected.insert(id.clone());
        }
    }

    /// Toggles between nothing selected and every displayed row selected.
    pub fn toggle_select_all(&mut self) {
        if self.selected.len() == self.requests.len() {
            self.selected.clear();
        } else {
            self.selected = self.requests.iter().map(|request| request.id.clone()).collect();
        }
    }

    /// Per-row status edit. Replaces only the edited row with the server copy.
    pub async fn change_status(
        &mut self,
        id: &RequestId,
        status: RequestStatus,
    ) -> Result<(), ClientError> {
        match self.client.update_status(id, status).await {
            Ok(updated) => {
                self.replace_confirmed(std::slice::from_ref(&updated));
                self.error = None;
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Applies `status` to the selection. Returns `None` when nothing is selected.
    pub async fn batch_update_status(
        &mut self,
        status: RequestStatus,
    ) -> Result<Option<BatchUpdateOutcome>, ClientError> {
        if self.selected.is_empty() {
            return Ok(None);
        }

        let ids = self.selected_ids();
        match self.client.batch_update_status(&ids, status).await {
            Ok(outcome) => {
                self.replace_confirmed(&outcome.data);
                self.selected.clear();
                self.error = None;
                self.notice = Some(outcome.message.clone());
                Ok(Some(outcome))
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Deletes the selection once `confirm` (given the selection size) agrees.
    /// Returns `None` when nothing is selected or the confirmation is declined.
    pub async fn batch_delete<F>(
        &mut self,
        confirm: F,
    ) -> Result<Option<BatchDeleteOutcome>, ClientError>
    where
        F: FnOnce(usize) -> bool,
    {
        if self.selected.is_empty() || !confirm(self.selected.len()) {
            return Ok(None);
        }

        let ids = self.selected_ids();
        match self.client.batch_delete(&ids).await {
            Ok(outcome) => {
                let removed = std::mem::take(&mut self.selected);
                self.requests.retain(|request| !removed.contains(&request.id));
                self.error = None;
                self.notice = Some(outcome.message.clone());
                Ok(Some(outcome))
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    pub fn snapshot(&self) -> AdminSnapshot {
        AdminSnapshot {
            page: self.page,
            tab: self.tab,
            requests: self.requests.clone(),
            pagination: self.pagination.clone(),
            selected_ids: self.selected_ids(),
            all_selected: self.all_selected(),
            error: self.error.clone(),
            notice: self.notice.clone(),
        }
    }

    fn replace_confirmed(&mut self, confirmed: &[Request]) {
        for record in confirmed {
            if let Some(local) = self.requests.iter_mut().find(|local| local.id == record.id) {
                *local = record.clone();
            }
        }
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        self.error = Some(error.to_string());
        self.notice = None;
        error
    }
}
