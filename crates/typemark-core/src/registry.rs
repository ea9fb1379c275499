//! Registry of type descriptors.
//!
//! [`TypeRegistry`] is the standard [`TypeInfo`] implementation. It is filled
//! from derive registrations (see the `typemark` crate), from a
//! [`Manifest`](crate::Manifest), or by hand, and then shared read-only.
//!
//! # Thread Safety
//!
//! Building the registry requires `&mut self`. Once built it is immutable,
//! `Send + Sync`, and can be shared behind `&` or [`Arc`](std::sync::Arc)
//! with any number of resolvers.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::descriptor::{TypeDescriptor, TypeInfo};
use crate::manifest::Manifest;

/// Errors that can occur while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A type with the given name is already registered.
    #[error("duplicate type name: {0}")]
    DuplicateName(String),

    /// A descriptor points at a type that is not registered.
    #[error("type `{owner}` references unknown type `{reference}`")]
    UnknownReference { owner: String, reference: String },

    /// Following `extends` from the given type leads back to it.
    #[error("inheritance cycle through `{0}`")]
    Cycle(String),
}

/// Name-keyed store of [`TypeDescriptor`]s.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validated registry from a manifest.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the manifest declares a name twice,
    /// references an undeclared type, or contains an inheritance cycle.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.extend_from_manifest(manifest)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Adds a descriptor.
    ///
    /// References are not checked here so that types can be registered in
    /// any order; call [`validate`](Self::validate) once everything is in.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<(), RegistryError> {
        if self.types.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateName(descriptor.name().to_string()));
        }

        debug!(type_name = descriptor.name(), kind = %descriptor.kind(), "registered type");
        self.types.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    /// Registers every type a manifest declares, without validating.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] on the first clash.
    pub fn extend_from_manifest(&mut self, manifest: &Manifest) -> Result<(), RegistryError> {
        for descriptor in manifest.descriptors() {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Checks that every referenced type is registered and that no
    /// `extends` chain loops.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownReference`] or
    /// [`RegistryError::Cycle`] for the first problem found, visiting types
    /// in name order.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();

        for name in &names {
            let descriptor = &self.types[*name];
            if let Some(reference) = descriptor
                .references()
                .find(|reference| !self.types.contains_key(*reference))
            {
                return Err(RegistryError::UnknownReference {
                    owner: (*name).to_string(),
                    reference: reference.to_string(),
                });
            }
        }

        for name in names {
            let mut seen = HashSet::new();
            let mut current = Some(name);
            while let Some(type_name) = current {
                if !seen.insert(type_name) {
                    return Err(RegistryError::Cycle(name.to_string()));
                }
                current = self.types.get(type_name).and_then(TypeDescriptor::extends);
            }
        }

        Ok(())
    }

    /// Gets a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns all descriptors in unspecified order.
    #[must_use = "iterator should be consumed to access descriptors"]
    pub fn list(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeInfo for TypeRegistry {
    fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        self.get(name)
    }
}
