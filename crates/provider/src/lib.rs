//! VMware Cloud Director Terraform Provider
//!
//! Resources are thin descriptions handed to the generic CRUD dispatcher in
//! [`crud`]; [`provider::VcdProvider`] routes Terraform operations to them.

pub mod config;
pub mod crud;
pub mod error;
pub mod provider;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod state;

pub use config::ProviderConfig;
pub use error::{Diagnostic, ProviderError};
pub use provider::VcdProvider;
pub use registry::Registry;
