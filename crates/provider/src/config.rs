//! Provider configuration
//!
//! Values are layered: TOML file defaults, then `VCD_*` environment
//! variables, then the attributes of the Terraform provider block.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::DynamicValue;

/// Org used for provider (system administrator) sessions
pub const SYSTEM_ORG: &str = "System";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// User name and password
    #[default]
    Integrated,
    /// Pre-issued API token
    Token,
}

impl std::str::FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integrated" => Ok(AuthType::Integrated),
            "token" => Ok(AuthType::Token),
            other => Err(ConfigError::InvalidValue {
                key: "auth_type",
                message: format!("expected 'integrated' or 'token', got '{}'", other),
            }),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the VCD endpoint, with or without `/api`
    pub url: String,

    pub org: String,

    pub user: Option<String>,

    pub password: Option<String>,

    pub token: Option<String>,

    pub auth_type: AuthType,

    /// Accept self-signed certificates on the VCD endpoint
    pub allow_unverified_ssl: bool,

    pub api_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            org: SYSTEM_ORG.to_string(),
            user: None,
            password: None,
            token: None,
            auth_type: AuthType::Integrated,
            allow_unverified_ssl: false,
            api_version: vcd_sdk::client::DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("token", &mask(&self.token))
            .field("auth_type", &self.auth_type)
            .field("allow_unverified_ssl", &self.allow_unverified_ssl)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl ProviderConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay settings from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay `VCD_*` settings found through `lookup`
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = var("VCD_URL") {
            self.url = url;
        }
        if let Some(org) = var("VCD_ORG") {
            self.org = org;
        }
        if let Some(user) = var("VCD_USER") {
            self.user = Some(user);
        }
        if let Some(password) = var("VCD_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(token) = var("VCD_TOKEN") {
            self.token = Some(token);
        }
        if let Some(auth_type) = var("VCD_AUTH_TYPE") {
            self.auth_type = auth_type.parse()?;
        }
        if let Some(flag) = var("VCD_ALLOW_UNVERIFIED_SSL") {
            self.allow_unverified_ssl = parse_bool("allow_unverified_ssl", &flag)?;
        }
        if let Some(version) = var("VCD_API_VERSION") {
            self.api_version = version;
        }
        Ok(self)
    }

    /// Overlay the attributes set in the Terraform provider block
    pub fn merge_block(&mut self, block: &DynamicValue) -> Result<(), ConfigError> {
        let string = |key: &str| {
            block
                .get(key)
                .and_then(|v| v.as_string())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(url) = string("url") {
            self.url = url;
        }
        if let Some(org) = string("org") {
            self.org = org;
        }
        if let Some(user) = string("user") {
            self.user = Some(user);
        }
        if let Some(password) = string("password") {
            self.password = Some(password);
        }
        if let Some(token) = string("token") {
            self.token = Some(token);
        }
        if let Some(auth_type) = string("auth_type") {
            self.auth_type = auth_type.parse()?;
        }
        if let Some(flag) = block.get("allow_unverified_ssl").and_then(|v| v.as_bool()) {
            self.allow_unverified_ssl = flag;
        }
        if let Some(version) = string("api_version") {
            self.api_version = version;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                key: "url",
                message: format!("'{}' is not an http(s) URL", self.url),
            });
        }
        if self.org.is_empty() {
            return Err(ConfigError::Missing("org"));
        }
        match self.auth_type {
            AuthType::Integrated => {
                if self.user.is_none() {
                    return Err(ConfigError::Missing("user"));
                }
                if self.password.is_none() {
                    return Err(ConfigError::Missing("password"));
                }
            }
            AuthType::Token => {
                if self.token.is_none() {
                    return Err(ConfigError::Missing("token"));
                }
            }
        }
        Ok(())
    }

    /// Build SDK client settings; call `validate` first
    pub fn client_config(&self) -> Result<vcd_sdk::ClientConfig, ConfigError> {
        let credentials = match self.auth_type {
            AuthType::Integrated => vcd_sdk::Credentials::Password {
                user: self.user.clone().ok_or(ConfigError::Missing("user"))?,
                password: self.password.clone().ok_or(ConfigError::Missing("password"))?,
            },
            AuthType::Token => {
                vcd_sdk::Credentials::Token(self.token.clone().ok_or(ConfigError::Missing("token"))?)
            }
        };

        let mut config = vcd_sdk::ClientConfig::new(&self.url, &self.org, credentials);
        config.insecure = self.allow_unverified_ssl;
        config.api_version = self.api_version.clone();
        Ok(config)
    }

    /// Attributes accepted in the provider block
    pub fn schema() -> Schema {
        Schema::new("VMware Cloud Director provider")
            .attribute(
                "url",
                Attribute::optional(AttributeType::String)
                    .describe("VCD endpoint, e.g. https://vcd.example.com/api"),
            )
            .attribute(
                "org",
                Attribute::optional(AttributeType::String)
                    .describe("Organization to log in to (System for providers)"),
            )
            .attribute("user", Attribute::optional(AttributeType::String))
            .attribute(
                "password",
                Attribute::optional(AttributeType::String).sensitive(),
            )
            .attribute("token", Attribute::optional(AttributeType::String).sensitive())
            .attribute(
                "auth_type",
                Attribute::optional(AttributeType::String).describe("integrated or token"),
            )
            .attribute(
                "allow_unverified_ssl",
                Attribute::optional(AttributeType::Bool),
            )
            .attribute("api_version", Attribute::optional(AttributeType::String))
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            message: format!("'{}' is not a boolean", value),
        }),
    }
}

/// `~/.config/terraform-provider-vcd/config.toml`
pub fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("terraform-provider-vcd")
        .join("config.toml")
}
