use std::time::Duration;

use graft_config::config::ResolverConfig;

use crate::{
    cancel::CancelToken,
    container::Resolution,
    errors::MetadataError,
    metadata::{
        DependencyInterfaceMetadata, InjectorMetadata, MetadataModel, SpecificationMetadata,
        TypeMetadata,
    },
    validator::Validator,
};

/// Assembles a [`MetadataModel`] step by step
///
/// The extraction front-end usually hands over a finished model, this is the
/// programmatic way to write one down.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    model: MetadataModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_injector(mut self, injector: InjectorMetadata) -> Self {
        self.model.injectors.push(injector);
        self
    }

    pub fn add_specification(mut self, specification: SpecificationMetadata) -> Self {
        self.model.specifications.push(specification);
        self
    }

    pub fn add_interface(mut self, interface: DependencyInterfaceMetadata) -> Self {
        self.model.interfaces.push(interface);
        self
    }

    pub fn add_type(mut self, ty: TypeMetadata) -> Self {
        self.model.types.push(ty);
        self
    }

    pub fn build(self) -> MetadataModel {
        self.model
    }

    /// Resolve the model with the default config
    pub fn resolve(self) -> Result<Resolution, MetadataError> {
        self.resolve_with(ResolverConfig::default(), &CancelToken::new())
    }

    pub fn resolve_timeout(self, timeout: Duration) -> Result<Resolution, MetadataError> {
        self.resolve_with(ResolverConfig::default(), &CancelToken::with_timeout(timeout))
    }

    pub fn resolve_with(
        self,
        config: ResolverConfig,
        cancel: &CancelToken,
    ) -> Result<Resolution, MetadataError> {
        Validator::new(config).resolve_all(&self.model, cancel)
    }
}
