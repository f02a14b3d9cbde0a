//! VMware Cloud Director SDK
//!
//! Minimal OpenAPI client used by the Terraform provider: sessions, JSON
//! transport and the handful of entities the provider manages.

pub mod certificate;
pub mod client;
pub mod error;
pub mod org;
pub mod trusted;
pub mod types;
pub mod vcenter;

pub use certificate::{Certificate, CertificateLibraryItem};
pub use client::{ClientConfig, Credentials, VcdClient};
pub use error::{Error, Result};
pub use org::{TmOrg, TmOrgSpec};
pub use trusted::TrustedCertificate;
pub use types::OpenApiReference;
pub use vcenter::{VSphereVirtualCenter, Vcenter};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
