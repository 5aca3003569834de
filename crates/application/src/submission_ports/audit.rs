use async_trait::async_trait;
use dictum_core::{AppResult, CategoryId};
use dictum_domain::{AuditAction, DataRecord};

/// Immutable audit event emitted after a commit changes submitted data.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Category the record belongs to.
    pub category_id: CategoryId,
    /// Entity the record belongs to.
    pub entity_name: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Record values before the change.
    pub old_data: Option<DataRecord>,
    /// Record values after the change, absent for deletes.
    pub new_data: Option<DataRecord>,
    /// Owning organization.
    pub organization: String,
    /// Changed record.
    pub system_id: String,
    /// Subject that committed the change.
    pub subject: String,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
