use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ProductId, ProductStatus, RefreshFrequency};

/// A managed data product record as the service returns it. `attributes` and
/// `design` are workflow outputs: absent until fetched, overwritten wholesale
/// on a successful fetch, never merged field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: ProductStatus,
    pub refresh_frequency: RefreshFrequency,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeSpec>>,
    #[serde(
        default,
        rename = "source_mappings",
        skip_serializing_if = "Option::is_none"
    )]
    pub design: Option<ProductDesign>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRelationship {
    pub from_entity: String,
    pub to_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDesign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    #[serde(default)]
    pub source_fields: Vec<SourceField>,
    #[serde(default)]
    pub relationships: Vec<DesignRelationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

/// Validation is recomputed on demand and never cached; the aliases accept
/// the older `is_valid`/`issues` field names still emitted by some service
/// deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(alias = "is_valid")]
    pub passed: bool,
    #[serde(default, alias = "issues")]
    pub details: Vec<ValidationCheck>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Create payload. The service assigns `id`, `status` (always `Draft`) and
/// `last_updated`; `use_case` feeds the attribute-recommendation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub refresh_frequency: RefreshFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, refresh_frequency: RefreshFrequency) -> Self {
        Self {
            name: name.into(),
            description: None,
            refresh_frequency,
            use_case: None,
        }
    }
}

/// Partial update payload for `PATCH /data-products/{id}`; absent fields are
/// left untouched by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_frequency: Option<RefreshFrequency>,
    #[serde(
        default,
        rename = "source_mappings",
        skip_serializing_if = "Option::is_none"
    )]
    pub design: Option<ProductDesign>,
}
