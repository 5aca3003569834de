//! Application services and ports.

#![forbid(unsafe_code)]

mod category_service;
mod submission_ports;
mod submission_service;
mod submitted_data_service;

#[cfg(test)]
mod test_support;

pub use category_service::CategoryService;
pub use submission_ports::{
    AuditEvent, AuditRepository, CategoryRepository, CommitBatch, CommitSubmissionResult,
    DeleteSubmittedDataInput, EditSubmittedDataInput, ListSubmittedDataInput, NewCategory,
    NewSubmission, NewSubmittedData, RegisterDictionaryInput, RegisterDictionaryResult,
    RemoveStagedRecordsInput, RevalidationSummary, SchemaProvider, SchemaValidator, StagedAction,
    SubmissionRepository, SubmittedDataChange, SubmittedDataEdit, SubmittedDataListing,
    SubmittedDataPage, SubmittedDataQuery, SubmittedDataRepository, SubmittedDataView,
    SystemIdGenerator, UploadBatch, UploadSubmissionInput, ValidityChange,
};
pub use submission_service::SubmissionService;
pub use submitted_data_service::{MAX_PAGE_SIZE, SubmittedDataService};
