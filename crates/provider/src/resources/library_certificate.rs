//! Certificate library entries (`vcd_library_certificate`)

use async_trait::async_trait;
use futures::FutureExt;
use vcd_sdk::{Certificate, CertificateLibraryItem, VcdClient};

use super::{DataSource, ProviderContext, Resource};
use crate::crud::{
    self, create_func, get_entity_func, state_store_func, sync_get_type_func, CrudConfig,
    DsReadConfig, UpdateDeleter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::ResourceData;

pub const TYPE_NAME: &str = "vcd_library_certificate";

const LABEL: &str = "certificate library item";

#[async_trait]
impl UpdateDeleter<CertificateLibraryItem> for Certificate {
    async fn update(&self, inner: &CertificateLibraryItem) -> vcd_sdk::Result<Self> {
        Certificate::update(self, inner).await
    }

    async fn delete(&self) -> vcd_sdk::Result<()> {
        Certificate::delete(self).await
    }
}

fn item_from_state(d: &ResourceData) -> anyhow::Result<CertificateLibraryItem> {
    let certificate = d.get_string("certificate");
    if !certificate.trim_start().starts_with("-----BEGIN") {
        anyhow::bail!("'certificate' must be PEM encoded");
    }

    Ok(CertificateLibraryItem {
        id: None,
        alias: d.get_string("alias"),
        description: d.get_optional_string("description"),
        certificate,
        private_key: d.get_optional_string("private_key"),
        private_key_passphrase: d.get_optional_string("private_key_passphrase"),
    })
}

/// Private key material is never returned by the API, so it is left as configured
fn store_item(d: &mut ResourceData, item: &CertificateLibraryItem) -> anyhow::Result<()> {
    d.set_id(item.id.clone().unwrap_or_default());
    d.set("alias", item.alias.clone())?;
    d.set("description", item.description.clone().unwrap_or_default())?;
    d.set("certificate", item.certificate.clone())?;
    Ok(())
}

fn fetch_by_id(client: VcdClient) -> crud::GetEntityFunc<Certificate> {
    get_entity_func(move |id: String| {
        let client = client.clone();
        async move { client.get_certificate_from_library_by_id(&id).await }.boxed()
    })
}

fn crud_config(client: &VcdClient) -> CrudConfig<Certificate, CertificateLibraryItem> {
    let create_client = client.clone();
    CrudConfig::new(
        LABEL,
        sync_get_type_func(item_from_state),
        state_store_func(|d: &mut ResourceData, c: &Certificate| store_item(d, &c.item)),
        create_func(move |item: CertificateLibraryItem| {
            let client = create_client.clone();
            async move { client.add_certificate_to_library(&item).await }.boxed()
        }),
        fetch_by_id(client.clone()),
    )
}

pub struct LibraryCertificateResource;

#[async_trait]
impl Resource for LibraryCertificateResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new("Certificate stored in the VCD certificate library")
            .attribute(
                "alias",
                Attribute::required(AttributeType::String).describe("Unique alias of the certificate"),
            )
            .attribute("description", Attribute::optional(AttributeType::String))
            .attribute(
                "certificate",
                Attribute::required(AttributeType::String).describe("PEM encoded certificate"),
            )
            .attribute(
                "private_key",
                Attribute::optional(AttributeType::String).sensitive().force_new(),
            )
            .attribute(
                "private_key_passphrase",
                Attribute::optional(AttributeType::String).sensitive().force_new(),
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

pub struct LibraryCertificateDataSource;

#[async_trait]
impl DataSource for LibraryCertificateDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new("Look up a certificate library item by alias")
            .attribute("alias", Attribute::required(AttributeType::String))
            .attribute("description", Attribute::computed(AttributeType::String))
            .attribute("certificate", Attribute::computed(AttributeType::String))
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
        let client = ctx.client.clone();
        let c = DsReadConfig::new(
            LABEL,
            get_entity_func(move |alias: String| {
                let client = client.clone();
                async move { client.get_certificate_from_library_by_alias(&alias).await }.boxed()
            }),
            state_store_func(|d: &mut ResourceData, c: &Certificate| store_item(d, &c.item)),
        )
        .name_field("alias");

        crud::read_datasource(d, &c).await
    }
}
