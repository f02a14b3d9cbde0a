//! Certificate library

use serde::{Deserialize, Serialize};

use crate::client::{eq_filter, single, VcdClient};
use crate::error::{Error, Result};

const CERTIFICATE_LIBRARY: &str = "1.0.0/ssl/certificateLibrary";

/// Certificate library item as exchanged with the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateLibraryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
}

/// A certificate stored in the library
#[derive(Debug, Clone)]
pub struct Certificate {
    pub item: CertificateLibraryItem,
    client: VcdClient,
}

impl Certificate {
    pub fn id(&self) -> &str {
        self.item.id.as_deref().unwrap_or_default()
    }

    /// Replace the library item. The ID is taken from `self`.
    pub async fn update(&self, item: &CertificateLibraryItem) -> Result<Certificate> {
        if self.id().is_empty() {
            return Err(Error::InvalidConfig(
                "cannot update a certificate without ID".to_string(),
            ));
        }

        let mut payload = item.clone();
        payload.id = Some(self.id().to_string());

        let updated = self
            .client
            .openapi_put(&format!("{}/{}", CERTIFICATE_LIBRARY, self.id()), &payload)
            .await?;
        Ok(self.client.wrap_certificate(updated))
    }

    pub async fn delete(&self) -> Result<()> {
        if self.id().is_empty() {
            return Err(Error::InvalidConfig(
                "cannot delete a certificate without ID".to_string(),
            ));
        }
        self.client
            .openapi_delete(&format!("{}/{}", CERTIFICATE_LIBRARY, self.id()))
            .await
    }
}

impl VcdClient {
    fn wrap_certificate(&self, item: CertificateLibraryItem) -> Certificate {
        Certificate {
            item,
            client: self.clone(),
        }
    }

    pub async fn add_certificate_to_library(
        &self,
        item: &CertificateLibraryItem,
    ) -> Result<Certificate> {
        let created = self.openapi_post(CERTIFICATE_LIBRARY, item).await?;
        Ok(self.wrap_certificate(created))
    }

    pub async fn get_certificate_from_library_by_id(&self, id: &str) -> Result<Certificate> {
        if id.is_empty() {
            return Err(Error::not_found("certificate", id));
        }
        let item = self
            .openapi_get(&format!("{}/{}", CERTIFICATE_LIBRARY, id))
            .await?;
        Ok(self.wrap_certificate(item))
    }

    pub async fn get_certificate_from_library_by_alias(&self, alias: &str) -> Result<Certificate> {
        let filter = eq_filter("alias", alias);
        let items = self.list_certificates_from_library(Some(&filter)).await?;
        single(items, "certificate", "alias", alias)
    }

    pub async fn list_certificates_from_library(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Certificate>> {
        let items: Vec<CertificateLibraryItem> =
            self.openapi_get_all(CERTIFICATE_LIBRARY, filter).await?;
        Ok(items
            .into_iter()
            .map(|item| self.wrap_certificate(item))
            .collect())
    }
}
