//! # Typemark
//!
//! Resolve annotation and capability metadata for Rust types.
//!
//! Types describe themselves with `#[derive(Described)]`: what kind of type
//! they are, what they extend and implement, and which annotations are
//! attached to them. A [`MetadataResolver`] then answers ordered questions
//! like "does `Order` carry a `Table` annotation, or failing that, implement
//! `JsonSchemaAware`?" and dispatches to the handler of the first marker that
//! matches.
//!
//! ## Describing Types
//!
//! ```ignore
//! use typemark::Described;
//!
//! #[derive(Described)]
//! #[typemark(capability)]
//! struct JsonSchemaAware;
//!
//! #[derive(Described)]
//! #[typemark(annotation)]
//! struct Table;
//!
//! #[derive(Described)]
//! #[typemark(implements(JsonSchemaAware), annotate(Table(name = "orders")))]
//! struct Order;
//! ```
//!
//! ## Resolving Metadata
//!
//! ```ignore
//! use typemark::{InstanceHandlers, Marker};
//!
//! let resolver = typemark::resolver()?;
//! let handlers = InstanceHandlers::new()
//!     .on(Marker::of::<Table>(), |m| {
//!         m.annotation().and_then(|a| a.str_argument("name")).map(str::to_owned)
//!     })
//!     .on(Marker::of::<JsonSchemaAware>(), |m| Some(m.instance().runtime_type().to_owned()));
//!
//! let name = resolver.require_resolve_instance(&Order, &handlers)?;
//! ```
//!
//! The first marker in insertion order that matches wins, and only its
//! handler runs. Annotations are checked before capabilities for the same
//! marker.
//!
//! ## Registries
//!
//! [`registry()`] builds the process-wide registry from every derived type
//! the first time it is called. Types declared in a TOML
//! [`Manifest`] can be combined with derived ones through
//! [`collect_into`].

// Allow proc-macro expansions within this crate to refer to it via `::typemark`.
extern crate self as typemark;

mod entrypoint;

use std::sync::OnceLock;

use tracing::info;
pub use entrypoint::{collect_into, entries};
pub use typemark_core::{
    Annotation, AnnotationLookup, CapabilityLookup, ConfigError, Described, Instance,
    InstanceCapabilityLookup, InstanceHandlers, InstanceMatch, LookupError, Manifest,
    ManifestError, Marker, MetadataResolver, RegistryError, Resolution, ResolveError,
    ResolverConfig, TypeConfig, TypeDescriptor, TypeHandlers, TypeInfo, TypeKind, TypeMatch,
    TypeRegistry, Unresolvable, UnresolvablePolicy, config,
};
pub use typemark_macro::Described;

pub mod __private {
    pub use inventory;

    pub use crate::entrypoint::{AnnotationEntry, ArgValue, Sealed, TypeEntry};

    #[inline]
    #[must_use]
    pub const fn sealed() -> Sealed {
        Sealed(())
    }
}

/// Builds an ordered array of [`Marker`]s from described types.
///
/// ```ignore
/// let markers = typemark::markers![Table, JsonSchemaAware];
/// ```
#[macro_export]
macro_rules! markers {
    ($($ty:ty),* $(,)?) => {
        [$($crate::Marker::of::<$ty>()),*]
    };
}

static REGISTRY: OnceLock<Result<TypeRegistry, RegistryError>> = OnceLock::new();

/// Builds a validated registry holding every derived type.
///
/// # Errors
///
/// Returns a [`RegistryError`] if two derived types share a name or a type
/// references something that is not described.
pub fn collect_registry() -> Result<TypeRegistry, RegistryError> {
    let mut registry = TypeRegistry::new();
    collect_into(&mut registry)?;
    registry.validate()?;
    info!(types = registry.len(), "type registry ready");
    Ok(registry)
}

/// Returns the process-wide registry of derived types.
///
/// Built on first use; later calls return the same registry (or the same
/// error).
///
/// # Errors
///
/// See [`collect_registry`].
pub fn registry() -> Result<&'static TypeRegistry, &'static RegistryError> {
    REGISTRY.get_or_init(collect_registry).as_ref()
}

/// Errors returned when setting up the process-wide resolver.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Returns a resolver over [`registry()`] configured from the discovered
/// `typemark.toml`, or with defaults if there is none.
///
/// See [`config`] for the discovery order.
///
/// # Errors
///
/// Returns [`Error::Registry`] if the registry could not be built, or
/// [`Error::Config`] if a discovered config file is invalid.
pub fn resolver() -> Result<MetadataResolver<&'static TypeRegistry>, Error> {
    let registry = registry().map_err(Clone::clone)?;
    let config = ResolverConfig::discover()?;
    Ok(MetadataResolver::with_config(registry, config))
}

/// Returns a resolver over [`registry()`] with an explicit configuration.
///
/// # Errors
///
/// See [`collect_registry`].
pub fn resolver_with_config(
    config: ResolverConfig,
) -> Result<MetadataResolver<&'static TypeRegistry>, &'static RegistryError> {
    registry().map(|registry| MetadataResolver::with_config(registry, config))
}
