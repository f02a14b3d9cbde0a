//! Shared OpenAPI payload types

use serde::{Deserialize, Serialize};

/// Reference to another OpenAPI entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenApiReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl OpenApiReference {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            name: None,
            id: Some(id.into()),
        }
    }
}

/// Strip the URN prefix from an entity ID, leaving the bare UUID
pub fn extract_uuid(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}
