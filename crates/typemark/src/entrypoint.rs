//! Type registration entries and discovery.
//!
//! `#[derive(Described)]` submits one [`TypeEntry`] per type to a global
//! [`inventory`] at compile time. This module turns those static entries into
//! [`TypeDescriptor`]s and merges them into a [`TypeRegistry`].
//!
//! # Sealed Pattern
//!
//! Entries carry a `__sealed: Sealed` field so they can only be built by the
//! generated code in the `typemark-macro` crate, which checks the attribute
//! syntax before emitting them.
//!
//! # Example
//!
//! ```ignore
//! use typemark::Described;
//!
//! #[derive(Described)]
//! #[typemark(annotation)]
//! struct Table;
//!
//! #[derive(Described)]
//! #[typemark(annotate(Table(name = "orders")))]
//! struct Order;
//! ```

use serde_json::Value as JsonValue;
use tracing::debug;
use typemark_core::{Annotation, RegistryError, TypeDescriptor, TypeKind, TypeRegistry};

/// Marker type to prevent direct construction of entry types.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub struct Sealed(pub(crate) ());

/// Literal value of an annotation argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgValue {
    Str(&'static str),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<ArgValue> for JsonValue {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Str(s) => Self::from(s),
            ArgValue::Int(i) => Self::from(i),
            // Non-finite floats become null.
            ArgValue::Float(f) => Self::from(f),
            ArgValue::Bool(b) => Self::from(b),
        }
    }
}

/// An annotation attached by `annotate(...)`.
#[derive(Debug)]
pub struct AnnotationEntry {
    /// Registered name of the annotation type
    pub type_name: &'static str,
    /// Named arguments in declaration order
    pub arguments: &'static [(&'static str, ArgValue)],
}

impl AnnotationEntry {
    fn to_annotation(&self) -> Annotation {
        self.arguments
            .iter()
            .fold(Annotation::new(self.type_name), |annotation, (name, value)| {
                annotation.with_argument(*name, *value)
            })
    }
}

/// Registration entry for a described type.
///
/// Entries are created by `#[derive(Described)]` and submitted to the global
/// inventory via `inventory::submit!`.
#[derive(Debug)]
pub struct TypeEntry {
    /// Registered type name (by default `module_path!()::Ident`)
    pub name: &'static str,
    pub kind: TypeKind,
    /// Registered name of the parent type, if any
    pub extends: Option<&'static str>,
    /// Registered names of implemented capabilities
    pub implements: &'static [&'static str],
    /// Attached annotations in declaration order
    pub annotations: &'static [AnnotationEntry],
    /// Sealed field to prevent manual construction
    #[doc(hidden)]
    pub __sealed: Sealed,
}

impl TypeEntry {
    /// Builds the owned descriptor the registry stores.
    pub fn to_descriptor(&self) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(self.name, self.kind);
        if let Some(parent) = self.extends {
            descriptor = descriptor.extending(parent);
        }
        for capability in self.implements {
            descriptor = descriptor.implementing(*capability);
        }
        for annotation in self.annotations {
            descriptor = descriptor.annotated(annotation.to_annotation());
        }
        descriptor
    }
}

inventory::collect!(TypeEntry);

/// Returns every submitted type entry, in unspecified order.
pub fn entries() -> impl Iterator<Item = &'static TypeEntry> {
    inventory::iter::<TypeEntry>()
}

/// Registers every derived type into `registry`.
///
/// The registry is not validated; a registry seeded from a
/// [`Manifest`](typemark_core::Manifest) may supply types the derived ones
/// reference. Call [`TypeRegistry::validate`] afterwards.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateName`] if a derived type's name is
/// already registered.
pub fn collect_into(registry: &mut TypeRegistry) -> Result<(), RegistryError> {
    let mut count = 0usize;
    for entry in entries() {
        registry.register(entry.to_descriptor())?;
        count += 1;
    }
    debug!(count, "collected derived types");
    Ok(())
}
