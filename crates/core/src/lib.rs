pub mod admin;
pub mod config;
pub mod domain;
pub mod errors;

pub use admin::{AdminSnapshot, AdminView, ClientError, Pagination, RequestsClient, StatusTab};
pub use domain::request::{
    BatchDeleteOutcome, BatchUpdateOutcome, Request, RequestId, RequestPage, RequestStatus,
    ValidationReport, PAGE_SIZE,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
