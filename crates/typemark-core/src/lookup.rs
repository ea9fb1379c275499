//! Single-marker lookups against one type or instance.
//!
//! These are the leaves the [`MetadataResolver`](crate::MetadataResolver)
//! delegates to. Used directly they are strict: a marker or type that does
//! not resolve is reported as [`LookupError::UnresolvableType`] instead of
//! being treated as "no match".
//!
//! Each lookup borrows a [`TypeInfo`] and never mutates it; results borrow
//! from the descriptor or instance that was inspected.

use tracing::trace;

use crate::descriptor::{Annotation, Instance, TypeDescriptor, TypeInfo, TypeKind};
use crate::marker::Marker;

/// Why a name could not be resolved to a usable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unresolvable {
    /// No type is registered under the name.
    #[error("no such type is registered")]
    Unknown,

    /// The type exists but is not a capability.
    #[error("type is not a capability")]
    NotACapability,
}

/// Errors reported by the leaf lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LookupError {
    /// A type or marker name does not correspond to a usable type.
    #[error("unresolvable type `{name}`: {reason}")]
    UnresolvableType { name: String, reason: Unresolvable },
}

impl LookupError {
    pub(crate) fn unresolvable(name: &str, reason: Unresolvable) -> Self {
        Self::UnresolvableType {
            name: name.to_string(),
            reason,
        }
    }

    /// The offending name.
    pub fn name(&self) -> &str {
        match self {
            Self::UnresolvableType { name, .. } => name,
        }
    }
}

/// Finds the first attached annotation assignable to a marker.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationLookup<'t, I: ?Sized> {
    types: &'t I,
}

impl<'t, I: TypeInfo + ?Sized> AnnotationLookup<'t, I> {
    pub fn new(types: &'t I) -> Self {
        Self { types }
    }

    /// Returns the first annotation on `descriptor`, in attachment order,
    /// whose type equals the marker or is assignable to it.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the marker is not a
    /// registered type.
    pub fn find<'d>(
        &self,
        descriptor: &'d TypeDescriptor,
        marker: &Marker,
    ) -> Result<Option<&'d Annotation>, LookupError> {
        self.types.resolve(marker.name())?;

        let found = descriptor
            .annotations()
            .iter()
            .find(|annotation| self.types.is_assignable(annotation.type_name(), marker.name()));

        trace!(
            type_name = descriptor.name(),
            marker = %marker,
            matched = found.is_some(),
            "annotation lookup"
        );
        Ok(found)
    }

    /// Same as [`find`](Self::find) for a type given by name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if either the type name or
    /// the marker is not registered.
    pub fn find_by_name(
        &self,
        type_name: &str,
        marker: &Marker,
    ) -> Result<Option<&'t Annotation>, LookupError> {
        let descriptor = self.types.resolve(type_name)?;
        self.find(descriptor, marker)
    }

    /// Same as [`find`](Self::find) for the runtime type of `instance`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the runtime type or the
    /// marker is not registered.
    pub fn find_for_instance(
        &self,
        instance: &dyn Instance,
        marker: &Marker,
    ) -> Result<Option<&'t Annotation>, LookupError> {
        self.find_by_name(instance.runtime_type(), marker)
    }
}

/// Checks whether a type implements a capability.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityLookup<'t, I: ?Sized> {
    types: &'t I,
}

impl<'t, I: TypeInfo + ?Sized> CapabilityLookup<'t, I> {
    pub fn new(types: &'t I) -> Self {
        Self { types }
    }

    /// Returns the descriptor's own name if it implements the capability,
    /// directly or through its parents and super-capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the marker is unknown or
    /// is not a capability type.
    pub fn find<'d>(
        &self,
        descriptor: &'d TypeDescriptor,
        marker: &Marker,
    ) -> Result<Option<&'d str>, LookupError> {
        ensure_capability(self.types, marker)?;

        let implements = self.types.is_assignable(descriptor.name(), marker.name());
        trace!(
            type_name = descriptor.name(),
            marker = %marker,
            matched = implements,
            "capability lookup"
        );
        Ok(implements.then(|| descriptor.name()))
    }

    /// Same as [`find`](Self::find) for a type given by name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the type name is unknown,
    /// or the marker is unknown or not a capability.
    pub fn find_by_name(
        &self,
        type_name: &str,
        marker: &Marker,
    ) -> Result<Option<&'t str>, LookupError> {
        let descriptor = self.types.resolve(type_name)?;
        self.find(descriptor, marker)
    }
}

/// Checks whether a live instance satisfies a capability or class marker.
#[derive(Debug, Clone, Copy)]
pub struct InstanceCapabilityLookup<'t, I: ?Sized> {
    types: &'t I,
}

impl<'t, I: TypeInfo + ?Sized> InstanceCapabilityLookup<'t, I> {
    pub fn new(types: &'t I) -> Self {
        Self { types }
    }

    /// Returns `instance` itself if its runtime type implements the
    /// capability.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the marker is unknown or
    /// not a capability, or if the instance's runtime type is not registered.
    pub fn find<'i>(
        &self,
        instance: &'i dyn Instance,
        marker: &Marker,
    ) -> Result<Option<&'i dyn Instance>, LookupError> {
        ensure_capability(self.types, marker)?;
        let runtime_type = self.types.resolve(instance.runtime_type())?;

        let implements = self.types.is_assignable(runtime_type.name(), marker.name());
        trace!(
            runtime_type = runtime_type.name(),
            marker = %marker,
            matched = implements,
            "instance capability lookup"
        );
        Ok(implements.then_some(instance))
    }

    /// Returns `instance` itself if its runtime type is the marker type or
    /// descends from it.
    ///
    /// Unlike [`find`](Self::find), the marker may be a class, so an instance
    /// of a subclass satisfies a marker naming its parent.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if the marker or the
    /// instance's runtime type is not registered.
    pub fn find_instance_of<'i>(
        &self,
        instance: &'i dyn Instance,
        marker: &Marker,
    ) -> Result<Option<&'i dyn Instance>, LookupError> {
        self.types.resolve(marker.name())?;
        let runtime_type = self.types.resolve(instance.runtime_type())?;

        let descends = self.types.is_assignable(runtime_type.name(), marker.name());
        trace!(
            runtime_type = runtime_type.name(),
            marker = %marker,
            matched = descends,
            "instance-of lookup"
        );
        Ok(descends.then_some(instance))
    }
}

fn ensure_capability<I: TypeInfo + ?Sized>(types: &I, marker: &Marker) -> Result<(), LookupError> {
    match types.classify(marker.name())? {
        TypeKind::Capability => Ok(()),
        TypeKind::Class | TypeKind::Annotation => Err(LookupError::unresolvable(
            marker.name(),
            Unresolvable::NotACapability,
        )),
    }
}
