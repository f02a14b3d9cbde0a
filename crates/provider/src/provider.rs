//! VCD Terraform Provider Implementation
//!
//! Terraform-facing operations. Every call answers with diagnostics rather
//! than failing, so a bad resource never takes the provider down.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use vcd_sdk::VcdClient;

use crate::config::ProviderConfig;
use crate::error::{Diagnostic, ProviderError};
use crate::registry::Registry;
use crate::resources::ProviderContext;
use crate::schema::Schema;
use crate::state::{DynamicValue, ResourceData};

/// Full schema of the provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resource_schemas: BTreeMap<String, Schema>,
    pub data_source_schemas: BTreeMap<String, Schema>,
}

/// Outcome of an operation that produces state
#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

impl StateResponse {
    fn ok(new_state: DynamicValue) -> Self {
        Self {
            new_state,
            diagnostics: vec![],
        }
    }

    fn failed(new_state: DynamicValue, summary: &str, err: &ProviderError) -> Self {
        error!("{}: {}", summary, err);
        Self {
            new_state,
            diagnostics: vec![err.to_diagnostic(summary)],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// VMware Cloud Director Terraform Provider
pub struct VcdProvider {
    registry: Arc<Registry>,
    /// File and environment settings the provider block is layered on
    base_config: ProviderConfig,
    context: Arc<RwLock<Option<ProviderContext>>>,
}

impl VcdProvider {
    pub fn new(registry: Registry, base_config: ProviderConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            base_config,
            context: Arc::new(RwLock::new(None)),
        }
    }

    /// Provider that is already configured with `client`
    pub fn with_client(registry: Registry, client: VcdClient) -> Self {
        let registry = Arc::new(registry);
        let context = ProviderContext {
            client,
            registry: registry.clone(),
        };
        Self {
            registry,
            base_config: ProviderConfig::default(),
            context: Arc::new(RwLock::new(Some(context))),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn context(&self) -> Result<ProviderContext, ProviderError> {
        self.context
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }

    fn resource_schema(&self, type_name: &str) -> Result<Schema, ProviderError> {
        self.registry
            .resource(type_name)
            .map(|r| r.schema())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    pub fn get_provider_schema(&self) -> ProviderSchema {
        info!("GetProviderSchema called");

        ProviderSchema {
            provider: ProviderConfig::schema(),
            resource_schemas: self
                .registry
                .resources()
                .map(|r| (r.type_name().to_string(), r.schema()))
                .collect(),
            data_source_schemas: self
                .registry
                .data_sources()
                .map(|d| (d.type_name().to_string(), d.schema()))
                .collect(),
        }
    }

    pub fn validate_provider_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        debug!("ValidateProviderConfig called");
        ProviderConfig::schema().validate(config)
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &DynamicValue) -> Vec<Diagnostic> {
        debug!("ValidateResourceConfig called for {}", type_name);
        match self.resource_schema(type_name) {
            Ok(schema) => schema.validate(config),
            Err(e) => vec![e.to_diagnostic("Invalid resource type")],
        }
    }

    pub fn validate_data_resource_config(
        &self,
        type_name: &str,
        config: &DynamicValue,
    ) -> Vec<Diagnostic> {
        debug!("ValidateDataResourceConfig called for {}", type_name);
        match self.registry.data_source(type_name) {
            Some(data_source) => data_source.schema().validate(config),
            None => vec![ProviderError::UnknownDataSource(type_name.to_string())
                .to_diagnostic("Invalid data source type")],
        }
    }

    /// Layer the provider block over the base settings and log in
    pub async fn configure_provider(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        info!("ConfigureProvider called");

        match self.connect(config).await {
            Ok(context) => {
                info!("Connected to {} as org '{}'", context.client.base_url(), context.client.org());
                *self.context.write().await = Some(context);
                vec![]
            }
            Err(e) => {
                error!("Failed to configure provider: {}", e);
                vec![e.to_diagnostic("Failed to connect to VMware Cloud Director")]
            }
        }
    }

    async fn connect(&self, block: &DynamicValue) -> Result<ProviderContext, ProviderError> {
        let mut config = self.base_config.clone();
        config.merge_block(block)?;
        config.validate()?;
        debug!("Effective provider configuration: {:?}", config);

        let client = VcdClient::new(config.client_config()?)?;
        client.authenticate().await?;

        Ok(ProviderContext {
            client,
            registry: self.registry.clone(),
        })
    }

    /// Refresh state; a vanished entity yields a null state
    pub async fn read_resource(&self, type_name: &str, current_state: &DynamicValue) -> StateResponse {
        info!("ReadResource called for {}", type_name);

        let result = async {
            let ctx = self.context().await?;
            let resource = self
                .registry
                .resource(type_name)
                .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))?;
            let mut d = ResourceData::from_value(current_state).with_schema(&resource.schema());
            resource.read(&ctx, &mut d).await?;
            Ok::<_, ProviderError>(d)
        }
        .await;

        match result {
            Ok(d) => StateResponse::ok(d.to_value()),
            Err(e) => StateResponse::failed(current_state.clone(), "Failed to read resource", &e),
        }
    }

    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior_state: &DynamicValue,
        proposed_new_state: &DynamicValue,
    ) -> PlanResponse {
        debug!("PlanResourceChange called for {}", type_name);

        let schema = match self.resource_schema(type_name) {
            Ok(schema) => schema,
            Err(e) => {
                return PlanResponse {
                    planned_state: DynamicValue::Null,
                    requires_replace: vec![],
                    diagnostics: vec![e.to_diagnostic("Invalid resource type")],
                }
            }
        };

        let requires_replace = if prior_state.is_null() || proposed_new_state.is_null() {
            vec![]
        } else {
            schema.requires_replace(prior_state, proposed_new_state)
        };

        PlanResponse {
            planned_state: proposed_new_state.clone(),
            requires_replace,
            diagnostics: vec![],
        }
    }

    /// Create, update or delete depending on which of the states is null
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: &DynamicValue,
        planned_state: &DynamicValue,
    ) -> StateResponse {
        info!("ApplyResourceChange called for {}", type_name);

        let (ctx, resource) = match self.context().await.and_then(|ctx| {
            let resource = self
                .registry
                .resource(type_name)
                .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))?;
            Ok((ctx, resource))
        }) {
            Ok(found) => found,
            Err(e) => {
                return StateResponse::failed(prior_state.clone(), "Failed to apply resource change", &e)
            }
        };
        let schema = resource.schema();

        match (prior_state.is_null(), planned_state.is_null()) {
            (true, true) => StateResponse::ok(DynamicValue::Null),
            (true, false) => {
                let mut d = ResourceData::from_value(planned_state).with_schema(&schema);
                match resource.create(&ctx, &mut d).await {
                    Ok(()) => StateResponse::ok(d.to_value()),
                    // Keep whatever was stored so Terraform tracks a half-created entity
                    Err(e) => StateResponse::failed(d.to_value(), "Failed to create resource", &e),
                }
            }
            (false, true) => {
                let mut d = ResourceData::from_value(prior_state).with_schema(&schema);
                match resource.delete(&ctx, &mut d).await {
                    Ok(()) => StateResponse::ok(DynamicValue::Null),
                    Err(e) => StateResponse::failed(prior_state.clone(), "Failed to delete resource", &e),
                }
            }
            (false, false) => {
                let mut d = ResourceData::from_value(planned_state).with_schema(&schema);
                match resource.update(&ctx, &mut d).await {
                    Ok(()) => StateResponse::ok(d.to_value()),
                    Err(e) => StateResponse::failed(prior_state.clone(), "Failed to update resource", &e),
                }
            }
        }
    }

    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> StateResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);

        let result = async {
            let ctx = self.context().await?;
            let resource = self
                .registry
                .resource(type_name)
                .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))?;
            resource.import(&ctx, id).await
        }
        .await;

        match result {
            Ok(d) if d.id().is_empty() => StateResponse::failed(
                DynamicValue::Null,
                "Failed to import resource",
                &ProviderError::Sdk(vcd_sdk::Error::not_found(type_name, id)),
            ),
            Ok(d) => StateResponse::ok(d.to_value()),
            Err(e) => StateResponse::failed(DynamicValue::Null, "Failed to import resource", &e),
        }
    }

    pub async fn read_data_source(&self, type_name: &str, config: &DynamicValue) -> StateResponse {
        info!("ReadDataSource called for {}", type_name);

        let result = async {
            let ctx = self.context().await?;
            let data_source = self
                .registry
                .data_source(type_name)
                .ok_or_else(|| ProviderError::UnknownDataSource(type_name.to_string()))?;
            let mut d = ResourceData::from_value(config).with_schema(&data_source.schema());
            data_source.read(&ctx, &mut d).await?;
            Ok::<_, ProviderError>(d)
        }
        .await;

        match result {
            Ok(d) => StateResponse::ok(d.to_value()),
            Err(e) => StateResponse::failed(DynamicValue::Null, "Failed to read data source", &e),
        }
    }
}
