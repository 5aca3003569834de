use std::str::FromStr;

use dictum_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response shaping mode for submitted data listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// One row per record, no nesting.
    #[default]
    Flat,
    /// Records of the centric entity with their dependents nested.
    Compound,
}

impl ViewMode {
    /// Returns stable query value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Compound => "compound",
        }
    }
}

impl FromStr for ViewMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        normalize_view_mode(&Value::String(value.to_owned()))
            .ok_or_else(|| AppError::Validation(format!("unknown view mode '{value}'")))
    }
}

/// Recognizes a raw view parameter.
///
/// Strings are trimmed and lower-cased before matching. Anything else, and any
/// unmatched string, is unrecognized.
#[must_use]
pub fn normalize_view_mode(input: &Value) -> Option<ViewMode> {
    let Value::String(raw) = input else {
        return None;
    };

    match raw.trim().to_lowercase().as_str() {
        "flat" => Some(ViewMode::Flat),
        "compound" => Some(ViewMode::Compound),
        _ => None,
    }
}

/// Listing filter as requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFilterOptions {
    /// Selected view mode.
    pub view: ViewMode,
    /// Explicitly requested entity names.
    #[serde(default)]
    pub entity_names: Vec<String>,
}

/// Resolves which entities a listing covers.
///
/// Compound views are always centered on the category's designated entity.
/// Flat views use the requested names verbatim; an empty list means no entity
/// filter. A compound view without a designated entity resolves to no scope.
#[must_use]
pub fn resolve_entity_scope(
    options: &EntityFilterOptions,
    default_centric_entity: Option<&str>,
) -> Vec<String> {
    match options.view {
        ViewMode::Compound => default_centric_entity
            .map(|entity_name| vec![entity_name.to_owned()])
            .unwrap_or_default(),
        ViewMode::Flat => options.entity_names.clone(),
    }
}
