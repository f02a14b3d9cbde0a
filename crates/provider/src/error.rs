//! Provider errors and Terraform diagnostics

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::StateError;

/// Errors surfaced by resource operations.
///
/// Dispatcher variants carry the entity label and the phase that failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("error getting {label} type on {operation}: {source}")]
    GetType {
        label: String,
        operation: &'static str,
        source: anyhow::Error,
    },

    #[error("error executing {stage} {label} hooks: {source}")]
    Hook {
        label: String,
        stage: &'static str,
        source: anyhow::Error,
    },

    #[error("error creating {label}: {source}")]
    Create {
        label: String,
        source: vcd_sdk::Error,
    },

    #[error("empty id for updating {label}")]
    EmptyId { label: String },

    #[error("error getting {label}: {source}")]
    Read {
        label: String,
        source: vcd_sdk::Error,
    },

    #[error("error getting {label} for {operation}: {source}")]
    Fetch {
        label: String,
        operation: &'static str,
        source: vcd_sdk::Error,
    },

    #[error("error getting {label} by {field} '{value}': {source}")]
    Lookup {
        label: String,
        field: String,
        value: String,
        source: vcd_sdk::Error,
    },

    #[error("error updating {label} with ID '{id}': {source}")]
    Update {
        label: String,
        id: String,
        source: vcd_sdk::Error,
    },

    #[error("error deleting {label} with ID '{id}': {source}")]
    Delete {
        label: String,
        id: String,
        source: vcd_sdk::Error,
    },

    #[error("error storing {label} to state during {operation}: {source}")]
    StoreState {
        label: String,
        operation: &'static str,
        source: anyhow::Error,
    },

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("unknown data source type: {0}")]
    UnknownDataSource(String),

    #[error("provider is not configured")]
    NotConfigured,

    #[error("invalid provider configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sdk(#[from] vcd_sdk::Error),

    #[error(transparent)]
    State(#[from] StateError),
}

impl ProviderError {
    pub fn to_diagnostic(&self, summary: &str) -> Diagnostic {
        Diagnostic::error(summary, self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A message reported back to Terraform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Whether any diagnostic in the list is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
