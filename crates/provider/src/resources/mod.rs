//! Resource Implementations
//!
//! Each module builds a dispatcher config for its entity and hands it to
//! [`crate::crud`].

pub mod library_certificate;
pub mod resource_list;
pub mod tm_org;
pub mod tm_vcenter;

use std::sync::Arc;

use async_trait::async_trait;
use vcd_sdk::VcdClient;

use crate::error::ProviderError;
use crate::registry::Registry;
use crate::schema::Schema;
use crate::state::ResourceData;

/// What a configured provider hands to every operation
#[derive(Clone)]
pub struct ProviderContext {
    pub client: VcdClient,
    pub registry: Arc<Registry>,
}

/// Trait for resource operations
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Create a new resource
    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError>;

    /// Read an existing resource; clears the id when it is gone
    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError>;

    /// Update an existing resource
    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError>;

    /// Delete a resource
    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError>;

    /// Adopt an existing entity by id
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<ResourceData, ProviderError> {
        let mut d = ResourceData::new().with_schema(&self.schema());
        d.set_id(id);
        self.read(ctx, &mut d).await?;
        Ok(d)
    }
}

/// Trait for data source operations
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError>;
}
