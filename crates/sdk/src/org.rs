//! Tenant Manager organizations

use serde::{Deserialize, Serialize};

use crate::client::{eq_filter, single, VcdClient};
use crate::error::{Error, Result};
use crate::types::OpenApiReference;

const ORGS: &str = "1.0.0/orgs";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmOrgSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub can_manage_orgs: bool,
    /// Assigned by the server; must be sent back unchanged on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<OpenApiReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_vdc_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
}

/// An organization
#[derive(Debug, Clone)]
pub struct TmOrg {
    pub org: TmOrgSpec,
    client: VcdClient,
}

impl TmOrg {
    pub fn id(&self) -> &str {
        self.org.id.as_deref().unwrap_or_default()
    }

    fn path(&self) -> Result<String> {
        if self.id().is_empty() {
            return Err(Error::InvalidConfig("Org has no ID".to_string()));
        }
        Ok(format!("{}/{}", ORGS, self.id()))
    }

    pub async fn update(&self, org: &TmOrgSpec) -> Result<TmOrg> {
        let mut payload = org.clone();
        payload.id = Some(self.id().to_string());
        let updated = self.client.openapi_put(&self.path()?, &payload).await?;
        Ok(self.client.wrap_tm_org(updated))
    }

    pub async fn delete(&self) -> Result<()> {
        self.client.openapi_delete(&self.path()?).await
    }

    /// Disable the org. VCD refuses to delete enabled orgs.
    pub async fn disable(&self) -> Result<TmOrg> {
        let mut payload = self.org.clone();
        payload.is_enabled = false;
        self.update(&payload).await
    }
}

impl VcdClient {
    fn wrap_tm_org(&self, org: TmOrgSpec) -> TmOrg {
        TmOrg {
            org,
            client: self.clone(),
        }
    }

    pub async fn create_tm_org(&self, org: &TmOrgSpec) -> Result<TmOrg> {
        let created = self.openapi_post(ORGS, org).await?;
        Ok(self.wrap_tm_org(created))
    }

    pub async fn get_tm_org_by_id(&self, id: &str) -> Result<TmOrg> {
        if id.is_empty() {
            return Err(Error::not_found("Org", id));
        }
        let org = self.openapi_get(&format!("{}/{}", ORGS, id)).await?;
        Ok(self.wrap_tm_org(org))
    }

    pub async fn get_tm_org_by_name(&self, name: &str) -> Result<TmOrg> {
        let filter = eq_filter("name", name);
        let orgs = self.list_tm_orgs(Some(&filter)).await?;
        single(orgs, "Org", "name", name)
    }

    pub async fn list_tm_orgs(&self, filter: Option<&str>) -> Result<Vec<TmOrg>> {
        let orgs: Vec<TmOrgSpec> = self.openapi_get_all(ORGS, filter).await?;
        Ok(orgs.into_iter().map(|org| self.wrap_tm_org(org)).collect())
    }
}
