//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_schema_provider;
mod in_memory_submission_store;
mod postgres_audit_repository;
mod postgres_submission_store;
mod restriction_schema_validator;
mod system_id_generator;

pub use http_schema_provider::HttpSchemaProvider;
pub use in_memory_submission_store::InMemorySubmissionStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_submission_store::PostgresSubmissionStore;
pub use restriction_schema_validator::RestrictionSchemaValidator;
pub use system_id_generator::{DisabledSystemIdGenerator, UuidSystemIdGenerator};

/// Embedded migrations for the PostgreSQL store.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
