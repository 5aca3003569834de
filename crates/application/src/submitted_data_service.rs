use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use dictum_core::{AppError, AppResult, CategoryId};
use dictum_domain::{
    CompoundRecord, EntityFilterOptions, SchemaRelationIndex, SubmittedData, ViewMode,
    build_compound_record, find_invalid_record_errors_by_entity, group_errors_by_index,
    has_error_at_index, normalize_view_mode, resolve_entity_scope,
};
use tracing::{info, warn};

use crate::CategoryService;
use crate::submission_ports::{
    ListSubmittedDataInput, RevalidationSummary, SchemaValidator, SubmittedDataListing,
    SubmittedDataQuery, SubmittedDataRepository, SubmittedDataView, ValidityChange,
};

mod listing;
mod revalidate;

/// Largest accepted listing page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Application service reading and revalidating committed submitted data.
#[derive(Clone)]
pub struct SubmittedDataService {
    category_service: CategoryService,
    repository: Arc<dyn SubmittedDataRepository>,
    schema_validator: Arc<dyn SchemaValidator>,
}

impl SubmittedDataService {
    /// Creates a submitted data service from its collaborators.
    #[must_use]
    pub fn new(
        category_service: CategoryService,
        repository: Arc<dyn SubmittedDataRepository>,
        schema_validator: Arc<dyn SchemaValidator>,
    ) -> Self {
        Self {
            category_service,
            repository,
            schema_validator,
        }
    }
}

fn group_by<K: Ord>(
    rows: Vec<SubmittedData>,
    key: impl Fn(&SubmittedData) -> K,
) -> BTreeMap<K, Vec<SubmittedData>> {
    let mut grouped: BTreeMap<K, Vec<SubmittedData>> = BTreeMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }

    grouped
}
