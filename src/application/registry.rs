//! Service descriptor registry.

use std::collections::HashMap;

use tracing::debug;

use super::catalog;
use crate::domain::{DescriptorSpec, ServiceDescriptor};
use crate::error::{ConfigError, NotFound};

/// Read-only table of validated service descriptors.
///
/// Built once at startup; there are no mutation operations afterwards.
/// Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    descriptors: Vec<ServiceDescriptor>,
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    /// Build a registry from specs, validating each one.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or
    /// [`ConfigError::DuplicateService`] when a name appears twice.
    pub fn from_specs<I>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = DescriptorSpec>,
    {
        let mut registry = Self::default();
        for spec in specs {
            let descriptor = spec.validate()?;
            if registry.index.contains_key(descriptor.name()) {
                return Err(ConfigError::DuplicateService(descriptor.name().to_string()));
            }
            registry
                .index
                .insert(descriptor.name().to_string(), registry.descriptors.len());
            registry.descriptors.push(descriptor);
        }
        Ok(registry)
    }

    /// The built-in catalog.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in spec breaks an invariant.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_specs(catalog::builtin())
    }

    /// The built-in catalog with entries replaced or appended by `overrides`.
    ///
    /// An override replaces the built-in spec of the same name in place; a
    /// new name is appended. Overrides are whole descriptors, never merged
    /// field by field.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or [`ConfigError::DuplicateService`] when
    /// `overrides` names a service twice.
    pub fn with_overrides(overrides: Vec<DescriptorSpec>) -> Result<Self, ConfigError> {
        let mut specs = catalog::builtin();
        let mut seen = Vec::with_capacity(overrides.len());
        for spec in overrides {
            if seen.contains(&spec.name) {
                return Err(ConfigError::DuplicateService(spec.name));
            }
            seen.push(spec.name.clone());
            match specs.iter_mut().find(|s| s.name == spec.name) {
                Some(existing) => {
                    debug!(service = %spec.name, "Overriding built-in descriptor");
                    *existing = spec;
                }
                None => specs.push(spec),
            }
        }
        Self::from_specs(specs)
    }

    /// Look up a descriptor by name.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`] for an unregistered name.
    pub fn lookup(&self, name: &str) -> Result<&ServiceDescriptor, NotFound> {
        self.index
            .get(name)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| NotFound(name.to_string()))
    }

    /// All descriptors in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(ServiceDescriptor::name)
    }

    /// Descriptors that declare a local start command.
    pub fn local_services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter().filter(|d| d.local().is_some())
    }

    /// Descriptors that can be built and deployed.
    pub fn deployable(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter().filter(|d| d.source_dir().is_some())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
