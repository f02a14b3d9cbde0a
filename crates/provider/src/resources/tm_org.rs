//! Tenant Manager organizations (`vcd_tm_org`)

use async_trait::async_trait;
use futures::future;
use futures::FutureExt;
use tracing::debug;
use vcd_sdk::{TmOrg, TmOrgSpec, VcdClient};

use super::{DataSource, ProviderContext, Resource};
use crate::crud::{
    self, create_func, entity_hook, get_entity_func, state_store_func, sync_get_type_func,
    update_hook, CrudConfig, DsReadConfig, UpdateDeleter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::ResourceData;

pub const TYPE_NAME: &str = "vcd_tm_org";

const LABEL: &str = "TM Organization";

#[async_trait]
impl UpdateDeleter<TmOrgSpec> for TmOrg {
    async fn update(&self, inner: &TmOrgSpec) -> vcd_sdk::Result<Self> {
        TmOrg::update(self, inner).await
    }

    async fn delete(&self) -> vcd_sdk::Result<()> {
        TmOrg::delete(self).await
    }
}

fn org_from_state(d: &ResourceData) -> anyhow::Result<TmOrgSpec> {
    let name = d.get_string("name");
    if name.chars().any(char::is_whitespace) {
        anyhow::bail!("org name '{}' must not contain whitespace", name);
    }

    Ok(TmOrgSpec {
        name,
        display_name: d.get_string("display_name"),
        description: d.get_optional_string("description"),
        is_enabled: d.get_bool("is_enabled", true),
        can_manage_orgs: d.get_bool("is_subprovider", false),
        ..Default::default()
    })
}

fn store_org(d: &mut ResourceData, org: &TmOrgSpec) -> anyhow::Result<()> {
    d.set_id(org.id.clone().unwrap_or_default());
    d.set("name", org.name.clone())?;
    d.set("display_name", org.display_name.clone())?;
    d.set("description", org.description.clone().unwrap_or_default())?;
    d.set("is_enabled", org.is_enabled)?;
    d.set("is_subprovider", org.can_manage_orgs)?;

    let managed_by = org.managed_by.as_ref();
    d.set("managed_by_id", managed_by.and_then(|r| r.id.clone()))?;
    d.set("managed_by_name", managed_by.and_then(|r| r.name.clone()))?;

    d.set("vdc_count", org.org_vdc_count)?;
    d.set("catalog_count", org.catalog_count)?;
    d.set("user_count", org.user_count)?;
    Ok(())
}

/// `managed_by` is assigned by VCD and rejected if dropped on update
fn carry_forward(org: &TmOrg, inner: &mut TmOrgSpec) {
    inner.managed_by = org.org.managed_by.clone();
}

async fn disable_if_enabled(org: &TmOrg) -> anyhow::Result<()> {
    if org.org.is_enabled {
        debug!("Disabling org '{}' before removal", org.org.name);
        org.disable().await?;
    }
    Ok(())
}

fn crud_config(client: &VcdClient) -> CrudConfig<TmOrg, TmOrgSpec> {
    let create_client = client.clone();
    let fetch_client = client.clone();

    CrudConfig::new(
        LABEL,
        sync_get_type_func(org_from_state),
        state_store_func(|d: &mut ResourceData, org: &TmOrg| store_org(d, &org.org)),
        create_func(move |org: TmOrgSpec| {
            let client = create_client.clone();
            async move { client.create_tm_org(&org).await }.boxed()
        }),
        get_entity_func(move |id: String| {
            let client = fetch_client.clone();
            async move { client.get_tm_org_by_id(&id).await }.boxed()
        }),
    )
    .pre_update_hook(update_hook(
        |_d: &ResourceData, org: &TmOrg, inner: &mut TmOrgSpec| {
            carry_forward(org, inner);
            future::ready(Ok(())).boxed()
        },
    ))
    .pre_delete_hook(entity_hook(|org: &TmOrg| disable_if_enabled(org).boxed()))
}

fn computed_attributes(schema: Schema) -> Schema {
    schema
        .attribute("managed_by_id", Attribute::computed(AttributeType::String))
        .attribute("managed_by_name", Attribute::computed(AttributeType::String))
        .attribute("vdc_count", Attribute::computed(AttributeType::Number))
        .attribute("catalog_count", Attribute::computed(AttributeType::Number))
        .attribute("user_count", Attribute::computed(AttributeType::Number))
}

pub struct TmOrgResource;

#[async_trait]
impl Resource for TmOrgResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        computed_attributes(
            Schema::new("Organization managed through Tenant Manager")
                .attribute(
                    "name",
                    Attribute::required(AttributeType::String).describe("Name used in URLs"),
                )
                .attribute("display_name", Attribute::required(AttributeType::String))
                .attribute("description", Attribute::optional(AttributeType::String))
                .attribute("is_enabled", Attribute::optional_computed(AttributeType::Bool))
                .attribute(
                    "is_subprovider",
                    Attribute::optional(AttributeType::Bool)
                        .describe("Whether the org can manage other orgs"),
                ),
        )
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        crud::create_resource(ctx, d, &crud_config(&ctx.client), self).await
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        crud::read_resource(d, &crud_config(&ctx.client)).await
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        crud::update_resource(ctx, d, &crud_config(&ctx.client), self).await
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        crud::delete_resource(d, &crud_config(&ctx.client)).await
    }
}

pub struct TmOrgDataSource;

#[async_trait]
impl DataSource for TmOrgDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        computed_attributes(
            Schema::new("Look up a Tenant Manager organization by name")
                .attribute("name", Attribute::required(AttributeType::String))
                .attribute("display_name", Attribute::computed(AttributeType::String))
                .attribute("description", Attribute::computed(AttributeType::String))
                .attribute("is_enabled", Attribute::computed(AttributeType::Bool))
                .attribute("is_subprovider", Attribute::computed(AttributeType::Bool)),
        )
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let client = ctx.client.clone();
        let c = DsReadConfig::new(
            LABEL,
            get_entity_func(move |name: String| {
                let client = client.clone();
                async move { client.get_tm_org_by_name(&name).await }.boxed()
            }),
            state_store_func(|d: &mut ResourceData, org: &TmOrg| store_org(d, &org.org)),
        );

        crud::read_datasource(d, &c).await
    }
}
