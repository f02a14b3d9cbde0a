//! vCenter servers managed through Tenant Manager (`vcd_tm_vcenter`)
//!
//! A vCenter must be disabled before VCD lets it go, and its inventory can
//! be refreshed on every read when the user asks for it.

use async_trait::async_trait;
use futures::future;
use futures::FutureExt;
use tracing::{debug, info};
use vcd_sdk::{VSphereVirtualCenter, Vcenter, VcdClient};

use super::{DataSource, ProviderContext, Resource};
use crate::crud::{
    self, create_func, entity_hook, get_entity_func, schema_hook, state_store_func,
    sync_get_type_func, update_hook, CrudConfig, DsReadConfig, UpdateDeleter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::ResourceData;

pub const TYPE_NAME: &str = "vcd_tm_vcenter";

const LABEL: &str = "vCenter server";

#[async_trait]
impl UpdateDeleter<VSphereVirtualCenter> for Vcenter {
    async fn update(&self, inner: &VSphereVirtualCenter) -> vcd_sdk::Result<Self> {
        Vcenter::update(self, inner).await
    }

    async fn delete(&self) -> vcd_sdk::Result<()> {
        Vcenter::delete(self).await
    }
}

fn vcenter_from_state(d: &ResourceData) -> anyhow::Result<VSphereVirtualCenter> {
    Ok(VSphereVirtualCenter {
        name: d.get_string("name"),
        description: d.get_optional_string("description"),
        username: d.get_string("username"),
        password: d.get_optional_string("password"),
        url: d.get_string("url"),
        is_enabled: d.get_bool("is_enabled", true),
        ..Default::default()
    })
}

fn store_vcenter(d: &mut ResourceData, v: &VSphereVirtualCenter) -> anyhow::Result<()> {
    d.set_id(v.vc_id.clone().unwrap_or_default());
    d.set("name", v.name.clone())?;
    d.set("description", v.description.clone().unwrap_or_default())?;
    d.set("url", v.url.clone())?;
    d.set("username", v.username.clone())?;
    d.set("is_enabled", v.is_enabled)?;
    d.set("is_connected", v.is_connected)?;
    d.set("listener_state", v.listener_state.clone())?;
    d.set("cluster_health_status", v.cluster_health_status.clone())?;
    d.set("version", v.vc_version.clone())?;
    d.set("uuid", v.uuid.clone())?;
    d.set("mode", v.mode.clone())?;
    Ok(())
}

async fn auto_trust(client: VcdClient, d: &ResourceData) -> anyhow::Result<()> {
    if !d.get_bool("auto_trust_certificate", false) {
        return Ok(());
    }

    let url = d.get_string("url");
    if let Some(trusted) = client.auto_trust_certificate(&url).await? {
        info!("Trusted certificate of {} as '{}'", url, trusted.alias);
    }
    Ok(())
}

async fn refresh_inventory(v: &Vcenter) -> anyhow::Result<()> {
    debug!("Refreshing vCenter '{}'", v.vcenter.name);
    v.refresh().await?;
    Ok(())
}

async fn refresh_storage_policies(v: &Vcenter) -> anyhow::Result<()> {
    debug!("Refreshing storage policies of vCenter '{}'", v.vcenter.name);
    v.refresh_storage_profiles().await?;
    Ok(())
}

async fn disable_if_enabled(v: &Vcenter) -> anyhow::Result<()> {
    if v.vcenter.is_enabled {
        debug!("Disabling vCenter '{}' before removal", v.vcenter.name);
        v.disable().await?;
    }
    Ok(())
}

/// Server-owned identity fields are sent back unchanged
fn carry_forward(_d: &ResourceData, v: &Vcenter, inner: &mut VSphereVirtualCenter) {
    inner.vc_id = v.vcenter.vc_id.clone();
    inner.uuid = v.vcenter.uuid.clone();
}

fn crud_config(client: &VcdClient, d: &ResourceData) -> CrudConfig<Vcenter, VSphereVirtualCenter> {
    let create_client = client.clone();
    let fetch_client = client.clone();
    let trust_client = client.clone();

    let mut c = CrudConfig::new(
        LABEL,
        sync_get_type_func(vcenter_from_state),
        state_store_func(|d: &mut ResourceData, v: &Vcenter| store_vcenter(d, &v.vcenter)),
        create_func(move |v: VSphereVirtualCenter| {
            let client = create_client.clone();
            async move { client.create_vcenter(&v).await }.boxed()
        }),
        get_entity_func(move |id: String| {
            let client = fetch_client.clone();
            async move { client.get_vcenter_by_id(&id).await }.boxed()
        }),
    )
    .pre_create_hook(schema_hook(move |d| auto_trust(trust_client.clone(), d).boxed()))
    .pre_update_hook(update_hook(
        |d: &ResourceData, v: &Vcenter, inner: &mut VSphereVirtualCenter| {
            carry_forward(d, v, inner);
            future::ready(Ok(())).boxed()
        },
    ))
    .pre_delete_hook(entity_hook(|v: &Vcenter| disable_if_enabled(v).boxed()));

    if d.get_bool("refresh_vcenter_on_read", false) {
        c = c.read_hook(entity_hook(|v: &Vcenter| refresh_inventory(v).boxed()));
    }
    if d.get_bool("refresh_policies_on_read", false) {
        c = c.read_hook(entity_hook(|v: &Vcenter| refresh_storage_policies(v).boxed()));
    }
    c
}

pub struct VcenterResource;

#[async_trait]
impl Resource for VcenterResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new("vCenter server registered in Tenant Manager")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::optional(AttributeType::String))
            .attribute(
                "url",
                Attribute::required(AttributeType::String).describe("URL of the vCenter, including scheme"),
            )
            .attribute("username", Attribute::required(AttributeType::String))
            .attribute("password", Attribute::required(AttributeType::String).sensitive())
            .attribute(
                "is_enabled",
                Attribute::optional_computed(AttributeType::Bool),
            )
            .attribute(
                "auto_trust_certificate",
                Attribute::optional(AttributeType::Bool)
                    .describe("Trust the certificate presented by the vCenter on create")
                    .force_new(),
            )
            .attribute(
                "refresh_vcenter_on_read",
                Attribute::optional(AttributeType::Bool),
            )
            .attribute(
                "refresh_policies_on_read",
                Attribute::optional(AttributeType::Bool),
            )
            .attribute("is_connected", Attribute::computed(AttributeType::Bool))
            .attribute("listener_state", Attribute::computed(AttributeType::String))
            .attribute("cluster_health_status", Attribute::computed(AttributeType::String))
            .attribute("version", Attribute::computed(AttributeType::String))
            .attribute("uuid", Attribute::computed(AttributeType::String))
            .attribute("mode", Attribute::computed(AttributeType::String))
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let c = crud_config(&ctx.client, d);
        crud::create_resource(ctx, d, &c, self).await
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let c = crud_config(&ctx.client, d);
        crud::read_resource(d, &c).await
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let c = crud_config(&ctx.client, d);
        crud::update_resource(ctx, d, &c, self).await
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let c = crud_config(&ctx.client, d);
        crud::delete_resource(d, &c).await
    }
}

pub struct VcenterDataSource;

#[async_trait]
impl DataSource for VcenterDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new("Look up a vCenter server by name")
            .attribute("name", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::computed(AttributeType::String))
            .attribute("url", Attribute::computed(AttributeType::String))
            .attribute("username", Attribute::computed(AttributeType::String))
            .attribute("is_enabled", Attribute::computed(AttributeType::Bool))
            .attribute("is_connected", Attribute::computed(AttributeType::Bool))
            .attribute("listener_state", Attribute::computed(AttributeType::String))
            .attribute("cluster_health_status", Attribute::computed(AttributeType::String))
            .attribute("version", Attribute::computed(AttributeType::String))
            .attribute("uuid", Attribute::computed(AttributeType::String))
            .attribute("mode", Attribute::computed(AttributeType::String))
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let client = ctx.client.clone();
        let c = DsReadConfig::new(
            LABEL,
            get_entity_func(move |name: String| {
                let client = client.clone();
                async move { client.get_vcenter_by_name(&name).await }.boxed()
            }),
            state_store_func(|d: &mut ResourceData, v: &Vcenter| store_vcenter(d, &v.vcenter)),
        );

        crud::read_datasource(d, &c).await
    }
}
