mod audit;
mod collaborators;
mod inputs;
mod repository;

pub use audit::{AuditEvent, AuditRepository};
pub use collaborators::{SchemaProvider, SchemaValidator, SystemIdGenerator};
pub use inputs::{
    CommitBatch, CommitSubmissionResult, DeleteSubmittedDataInput, EditSubmittedDataInput,
    ListSubmittedDataInput, NewCategory, NewSubmission, NewSubmittedData, RegisterDictionaryInput,
    RegisterDictionaryResult, RemoveStagedRecordsInput, RevalidationSummary, StagedAction,
    SubmittedDataChange, SubmittedDataEdit, SubmittedDataListing, SubmittedDataPage,
    SubmittedDataQuery, SubmittedDataView, UploadBatch, UploadSubmissionInput, ValidityChange,
};
pub use repository::{CategoryRepository, SubmissionRepository, SubmittedDataRepository};
