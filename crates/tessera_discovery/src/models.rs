//! Discovery response and filter types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDetails {
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub compiled_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<ModelCatalog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub columns: Vec<CatalogColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An upstream or downstream resource of a model.
///
/// Any resource type can appear (sources, seeds, macros, exposures, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Which applied models to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelFilter {
    #[default]
    All,
    /// Only the `marts` modeling layer
    Marts,
}

impl ModelFilter {
    pub fn to_variable(self) -> Value {
        match self {
            ModelFilter::All => json!({}),
            ModelFilter::Marts => json!({"modelingLayer": "marts"}),
        }
    }
}

/// How to pick a single model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    Name(String),
    UniqueId(String),
}

impl ModelSelector {
    /// Prefer the unique id when one is given.
    pub fn new(name: impl Into<String>, unique_id: Option<String>) -> Self {
        match unique_id.filter(|id| !id.is_empty()) {
            Some(id) => ModelSelector::UniqueId(id),
            None => ModelSelector::Name(name.into()),
        }
    }

    pub fn to_variable(&self) -> Value {
        match self {
            ModelSelector::Name(name) => json!({"identifier": name}),
            ModelSelector::UniqueId(id) => json!({"uniqueIds": [id]}),
        }
    }
}
