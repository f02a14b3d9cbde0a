//! Resource and data source registry

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::resources::library_certificate::{LibraryCertificateDataSource, LibraryCertificateResource};
use crate::resources::resource_list::ResourceListDataSource;
use crate::resources::tm_org::{TmOrgDataSource, TmOrgResource};
use crate::resources::tm_vcenter::{VcenterDataSource, VcenterResource};
use crate::resources::{DataSource, Resource};

/// Type names mapped to their implementations, kept sorted
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every type this provider ships
    pub fn builtin() -> Self {
        Self::new()
            .with_resource(LibraryCertificateResource)
            .with_resource(TmOrgResource)
            .with_resource(VcenterResource)
            .with_data_source(LibraryCertificateDataSource)
            .with_data_source(TmOrgDataSource)
            .with_data_source(VcenterDataSource)
            .with_data_source(ResourceListDataSource)
    }

    pub fn with_resource(mut self, resource: impl Resource + 'static) -> Self {
        self.resources.insert(resource.type_name(), Arc::new(resource));
        self
    }

    pub fn with_data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.data_sources
            .insert(data_source.type_name(), Arc::new(data_source));
        self
    }

    pub fn resource(&self, type_name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.get(type_name).cloned()
    }

    pub fn data_source(&self, type_name: &str) -> Option<Arc<dyn DataSource>> {
        self.data_sources.get(type_name).cloned()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.resources.values()
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &Arc<dyn DataSource>> {
        self.data_sources.values()
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.resources.keys().map(|name| name.to_string()).collect()
    }

    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.keys().map(|name| name.to_string()).collect()
    }
}
