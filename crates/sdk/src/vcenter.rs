//! vCenter servers registered in Tenant Manager

use serde::{Deserialize, Serialize};

use crate::client::{eq_filter, single, VcdClient};
use crate::error::{Error, Result};
use crate::types::extract_uuid;

const VIRTUAL_CENTERS: &str = "1.0.0/virtualCenters";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereVirtualCenter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vc_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub username: String,
    /// Never returned by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub url: String,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_health_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vc_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// A registered vCenter
#[derive(Debug, Clone)]
pub struct Vcenter {
    pub vcenter: VSphereVirtualCenter,
    client: VcdClient,
}

impl Vcenter {
    pub fn id(&self) -> &str {
        self.vcenter.vc_id.as_deref().unwrap_or_default()
    }

    fn path(&self) -> Result<String> {
        if self.id().is_empty() {
            return Err(Error::InvalidConfig("vCenter has no ID".to_string()));
        }
        Ok(format!("{}/{}", VIRTUAL_CENTERS, self.id()))
    }

    /// Update the vCenter. VCD runs this as a task, after which the
    /// stored record is read back.
    pub async fn update(&self, vcenter: &VSphereVirtualCenter) -> Result<Vcenter> {
        let mut payload = vcenter.clone();
        payload.vc_id = Some(self.id().to_string());
        match self.client.openapi_put_or_task(&self.path()?, &payload).await? {
            Some(updated) => Ok(self.client.wrap_vcenter(updated)),
            None => self.client.get_vcenter_by_id(self.id()).await,
        }
    }

    pub async fn delete(&self) -> Result<()> {
        self.client.openapi_delete(&self.path()?).await
    }

    /// Disable the vCenter. Deletion is refused while it is enabled.
    pub async fn disable(&self) -> Result<Vcenter> {
        let mut payload = self.vcenter.clone();
        payload.is_enabled = false;
        self.update(&payload).await
    }

    /// Trigger an inventory refresh
    pub async fn refresh(&self) -> Result<()> {
        self.legacy_action("refresh").await
    }

    /// Trigger a storage policy refresh
    pub async fn refresh_storage_profiles(&self) -> Result<()> {
        self.legacy_action("refreshStorageProfiles").await
    }

    async fn legacy_action(&self, action: &str) -> Result<()> {
        if self.id().is_empty() {
            return Err(Error::InvalidConfig("vCenter has no ID".to_string()));
        }
        let url = self.client.api_url(&format!(
            "admin/extension/vimServer/{}/action/{}",
            extract_uuid(self.id()),
            action
        ));
        self.client.post_action(&url).await
    }
}

impl VcdClient {
    fn wrap_vcenter(&self, vcenter: VSphereVirtualCenter) -> Vcenter {
        Vcenter {
            vcenter,
            client: self.clone(),
        }
    }

    /// Register a vCenter. A task reply carries no entity, so the new
    /// record is looked up by name once the task is done.
    pub async fn create_vcenter(&self, vcenter: &VSphereVirtualCenter) -> Result<Vcenter> {
        match self.openapi_post_or_task(VIRTUAL_CENTERS, vcenter).await? {
            Some(created) => Ok(self.wrap_vcenter(created)),
            None => self.get_vcenter_by_name(&vcenter.name).await,
        }
    }

    pub async fn get_vcenter_by_id(&self, id: &str) -> Result<Vcenter> {
        if id.is_empty() {
            return Err(Error::not_found("vCenter", id));
        }
        let vcenter = self.openapi_get(&format!("{}/{}", VIRTUAL_CENTERS, id)).await?;
        Ok(self.wrap_vcenter(vcenter))
    }

    pub async fn get_vcenter_by_name(&self, name: &str) -> Result<Vcenter> {
        let filter = eq_filter("name", name);
        let vcenters = self.list_vcenters(Some(&filter)).await?;
        single(vcenters, "vCenter", "name", name)
    }

    pub async fn list_vcenters(&self, filter: Option<&str>) -> Result<Vec<Vcenter>> {
        let vcenters: Vec<VSphereVirtualCenter> =
            self.openapi_get_all(VIRTUAL_CENTERS, filter).await?;
        Ok(vcenters
            .into_iter()
            .map(|vcenter| self.wrap_vcenter(vcenter))
            .collect())
    }
}
