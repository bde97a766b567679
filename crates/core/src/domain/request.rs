use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::DomainError;

/// Number of records returned by one List call.
pub const PAGE_SIZE: u32 = 10;

/// Current time at the microsecond precision the store keeps.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub const REQUESTOR_NAME_LEN: RangeInclusive<usize> = 3..=30;
pub const ITEM_REQUESTED_LEN: RangeInclusive<usize> = 2..=100;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] =
        [Self::Pending, Self::Approved, Self::Completed, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown request status `{0}` (expected pending|completed|approved|rejected)")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    pub requestor_name: String,
    pub item_requested: String,
    pub created_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_date: Option<DateTime<Utc>>,
    pub status: RequestStatus,
}

impl Request {
    /// Builds a freshly created record: pending, with both timestamps at `now`.
    pub fn create(new: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::generate(),
            requestor_name: new.requestor_name,
            item_requested: new.item_requested,
            created_date: now,
            last_edited_date: Some(now),
            status: RequestStatus::Pending,
        }
    }

    /// Moves the record to `status`. The edit time never precedes creation.
    pub fn set_status(&mut self, status: RequestStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_edited_date = Some(now.max(self.created_date));
    }
}

/// Field-level validation failures, keyed by wire field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.push(field, message);
        report
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, DomainError> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.field_errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire bodies. Every field is optional so missing input surfaces as a
// validation error instead of a deserialization failure.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requestor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_requested: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdateBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Validated commands
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub status: Option<RequestStatus>,
}

impl PageRequest {
    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(PAGE_SIZE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequest {
    pub requestor_name: String,
    pub item_requested: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub id: RequestId,
    pub status: RequestStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchStatusChange {
    pub ids: Vec<RequestId>,
    pub status: RequestStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchDeletion {
    pub ids: Vec<RequestId>,
}

impl ListQuery {
    pub fn validate(&self) -> Result<PageRequest, DomainError> {
        let mut report = ValidationReport::default();

        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    report.push("page", "page must be a positive integer");
                    1
                }
            },
        };

        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => parse_status_field(raw, &mut report),
        };

        report.finish(|| PageRequest { page, status })
    }
}

impl CreateRequestBody {
    pub fn validate(&self) -> Result<NewRequest, DomainError> {
        let mut report = ValidationReport::default();
        let requestor_name = bounded_text(
            self.requestor_name.as_deref(),
            "requestorName",
            REQUESTOR_NAME_LEN,
            &mut report,
        );
        let item_requested = bounded_text(
            self.item_requested.as_deref(),
            "itemRequested",
            ITEM_REQUESTED_LEN,
            &mut report,
        );

        report.finish(|| NewRequest { requestor_name, item_requested })
    }
}

impl UpdateStatusBody {
    pub fn validate(&self) -> Result<StatusChange, DomainError> {
        let mut report = ValidationReport::default();
        let id = match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => RequestId(id.to_string()),
            _ => {
                report.push("id", "id is required");
                RequestId(String::new())
            }
        };
        let status = required_status(self.status.as_deref(), &mut report);

        report.finish(|| StatusChange { id, status: status.unwrap_or(RequestStatus::Pending) })
    }
}

impl BatchUpdateBody {
    pub fn validate(&self) -> Result<BatchStatusChange, DomainError> {
        let mut report = ValidationReport::default();
        let ids = id_list(self.ids.as_deref(), &mut report);
        let status = required_status(self.status.as_deref(), &mut report);

        report.finish(|| BatchStatusChange { ids, status: status.unwrap_or(RequestStatus::Pending) })
    }
}

impl BatchDeleteBody {
    pub fn validate(&self) -> Result<BatchDeletion, DomainError> {
        let mut report = ValidationReport::default();
        let ids = id_list(self.ids.as_deref(), &mut report);

        report.finish(|| BatchDeletion { ids })
    }
}

fn bounded_text(
    raw: Option<&str>,
    field: &str,
    bounds: RangeInclusive<usize>,
    report: &mut ValidationReport,
) -> String {
    let Some(raw) = raw else {
        report.push(field, format!("{field} is required"));
        return String::new();
    };

    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    if length < *bounds.start() {
        report.push(field, format!("{field} must be at least {} characters", bounds.start()));
    } else if length > *bounds.end() {
        report.push(field, format!("{field} must be at most {} characters", bounds.end()));
    }

    trimmed.to_string()
}

fn parse_status_field(raw: &str, report: &mut ValidationReport) -> Option<RequestStatus> {
    match raw.parse::<RequestStatus>() {
        Ok(status) => Some(status),
        Err(error) => {
            report.push("status", error.to_string());
            None
        }
    }
}

fn required_status(raw: Option<&str>, report: &mut ValidationReport) -> Option<RequestStatus> {
    match raw {
        Some(raw) => parse_status_field(raw, report),
        None => {
            report.push("status", "status is required");
            None
        }
    }
}

/// Trims, drops duplicates and keeps first-seen order.
fn id_list(raw: Option<&[String]>, report: &mut ValidationReport) -> Vec<RequestId> {
    let Some(raw) = raw else {
        report.push("ids", "ids is required");
        return Vec::new();
    };
    if raw.is_empty() {
        report.push("ids", "at least one id is required");
        return Vec::new();
    }

    let mut seen = BTreeSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            report.push("ids", "ids must not contain empty values");
            continue;
        }
        if seen.insert(trimmed) {
            ids.push(RequestId(trimmed.to_string()));
        }
    }
    ids
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// `max(1, ceil(total / limit))`
pub fn total_pages(total: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    let pages = total.div_ceil(limit).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPage {
    pub data: Vec<Request>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl RequestPage {
    pub fn new(data: Vec<Request>, query: PageRequest, total: u64) -> Self {
        Self {
            data,
            page: query.page,
            limit: query.limit(),
            total,
            total_pages: total_pages(total, query.limit()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateOutcome {
    pub message: String,
    pub updated_count: u64,
    pub matched_count: u64,
    pub data: Vec<Request>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteOutcome {
    pub message: String,
    pub deleted_count: u64,
}
