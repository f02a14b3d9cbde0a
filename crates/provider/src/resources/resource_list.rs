//! Lists of provider types or entity names (`vcd_resource_list`)

use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures::FutureExt;
use vcd_sdk::VcdClient;

use super::{library_certificate, tm_org, tm_vcenter, DataSource, ProviderContext};
use crate::crud::{self, get_entity_func, schema_hook, state_store_func, DsReadConfig};
use crate::error::ProviderError;
use crate::registry::Registry;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::ResourceData;

pub const TYPE_NAME: &str = "vcd_resource_list";

const LABEL: &str = "resource list";

/// Values accepted in `resource_type` besides entity type names
const RESOURCES: &str = "resources";
const DATASOURCES: &str = "datasources";

const LISTABLE: &[&str] = &[
    RESOURCES,
    DATASOURCES,
    library_certificate::TYPE_NAME,
    tm_org::TYPE_NAME,
    tm_vcenter::TYPE_NAME,
];

fn validate_resource_type(d: &ResourceData) -> anyhow::Result<()> {
    let resource_type = d.get_string("resource_type");
    if !LISTABLE.contains(&resource_type.as_str()) {
        anyhow::bail!(
            "unsupported resource_type '{}', expected one of: {}",
            resource_type,
            LISTABLE.join(", ")
        );
    }
    Ok(())
}

async fn list_names(
    client: VcdClient,
    registry: Arc<Registry>,
    resource_type: String,
) -> vcd_sdk::Result<Vec<String>> {
    let mut names = match resource_type.as_str() {
        RESOURCES => registry.resource_names(),
        DATASOURCES => registry.data_source_names(),
        library_certificate::TYPE_NAME => client
            .list_certificates_from_library(None)
            .await?
            .into_iter()
            .map(|c| c.item.alias)
            .collect(),
        tm_org::TYPE_NAME => client
            .list_tm_orgs(None)
            .await?
            .into_iter()
            .map(|o| o.org.name)
            .collect(),
        tm_vcenter::TYPE_NAME => client
            .list_vcenters(None)
            .await?
            .into_iter()
            .map(|v| v.vcenter.name)
            .collect(),
        other => {
            return Err(vcd_sdk::Error::InvalidConfig(format!(
                "cannot list '{}'",
                other
            )))
        }
    };
    names.sort();
    Ok(names)
}

fn store_list(d: &mut ResourceData, names: &Vec<String>) -> anyhow::Result<()> {
    let name = d.get_string("name");
    d.set_id(name);
    d.set("list", names.clone())?;
    Ok(())
}

pub struct ResourceListDataSource;

#[async_trait]
impl DataSource for ResourceListDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new("Names of provider types or of existing entities of one type")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute(
                "resource_type",
                Attribute::required(AttributeType::String)
                    .describe("'resources', 'datasources' or an entity type such as vcd_tm_org"),
            )
            .attribute("list", Attribute::computed(AttributeType::StringList))
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let client = ctx.client.clone();
        let registry = ctx.registry.clone();
        let c = DsReadConfig::new(
            LABEL,
            get_entity_func(move |resource_type: String| {
                list_names(client.clone(), registry.clone(), resource_type).boxed()
            }),
            state_store_func(store_list),
        )
        .name_field("resource_type")
        .pre_read_hook(schema_hook(|d| future::ready(validate_resource_type(d)).boxed()));

        crud::read_datasource(d, &c).await
    }
}
