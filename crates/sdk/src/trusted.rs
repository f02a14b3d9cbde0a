//! Trusted certificates and connection probing

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::VcdClient;
use crate::error::{Error, Result};

const TRUSTED_CERTIFICATES: &str = "1.0.0/ssl/trustedCertificates";
const TEST_CONNECTION: &str = "1.0.0/testConnection";

/// SSL probe outcome reported for a certificate nobody trusts yet
pub const UNTRUSTED_CERTIFICATE: &str = "ERROR_UNTRUSTED_CERTIFICATE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedCertificate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub alias: String,
    pub certificate: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub timeout: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub can_connect: bool,
    #[serde(default)]
    pub ssl_result: String,
    #[serde(default)]
    pub certificate_chain: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResult {
    #[serde(default)]
    pub target_probe: Option<ProbeResult>,
}

impl VcdClient {
    /// Ask VCD to open a connection to `host:port` and report the TLS outcome
    pub async fn test_connection(&self, request: &TestConnectionRequest) -> Result<TestConnectionResult> {
        self.openapi_post(TEST_CONNECTION, request).await
    }

    pub async fn add_trusted_certificate(&self, alias: &str, pem: &str) -> Result<TrustedCertificate> {
        let payload = TrustedCertificate {
            id: None,
            alias: alias.to_string(),
            certificate: pem.to_string(),
        };
        self.openapi_post(TRUSTED_CERTIFICATES, &payload).await
    }

    /// Trust the certificate presented by `endpoint` if VCD does not trust it yet.
    ///
    /// Returns the newly trusted certificate, or `None` when nothing had to change.
    pub async fn auto_trust_certificate(&self, endpoint: &str) -> Result<Option<TrustedCertificate>> {
        let parsed = url::Url::parse(endpoint)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidConfig(format!("no host in '{}'", endpoint)))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);

        let result = self
            .test_connection(&TestConnectionRequest {
                host: host.clone(),
                port,
                secure: true,
                timeout: 30,
            })
            .await?;

        let probe = result.target_probe.unwrap_or_default();
        debug!("Connection probe for {}:{} returned {}", host, port, probe.ssl_result);

        if probe.ssl_result != UNTRUSTED_CERTIFICATE {
            return Ok(None);
        }
        if probe.certificate_chain.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "{}:{} presented an untrusted certificate but no chain was returned",
                host, port
            )));
        }

        let alias = format!("{}_{}", host, chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S"));
        let trusted = self
            .add_trusted_certificate(&alias, &probe.certificate_chain)
            .await?;
        info!("Trusted certificate of {}:{} as '{}'", host, port, alias);
        Ok(Some(trusted))
    }
}
