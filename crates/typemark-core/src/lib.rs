//! Core types and functionality for typemark metadata resolution.
//!
//! This crate answers one question: given a type (or a live instance of one)
//! and an ordered list of markers, which marker does it satisfy first? A
//! marker names either an annotation type, matched against the annotations
//! attached to the type, or a capability type, matched against what the type
//! implements.
//!
//! # Key Components
//!
//! - **Type information**: [`TypeDescriptor`] and the [`TypeInfo`] trait the
//!   engine queries, implemented by [`TypeRegistry`]
//! - **Lookups**: [`AnnotationLookup`], [`CapabilityLookup`] and
//!   [`InstanceCapabilityLookup`] answer single-marker questions
//! - **Resolution**: [`MetadataResolver`] runs the ordered-fallback search and
//!   dispatches to [`TypeHandlers`] / [`InstanceHandlers`]
//! - **Manifests**: TOML catalogs of types plus [`ResolverConfig`]
//!
//! # Example
//!
//! ```
//! use typemark_core::{
//!     Annotation, Marker, MetadataResolver, TypeDescriptor, TypeMatch, TypeRegistry,
//! };
//!
//! let mut registry = TypeRegistry::new();
//! registry.register(TypeDescriptor::annotation("shop::Table"))?;
//! registry.register(TypeDescriptor::capability("shop::Entity"))?;
//! registry.register(
//!     TypeDescriptor::class("shop::Order")
//!         .implementing("shop::Entity")
//!         .annotated(Annotation::new("shop::Table").with_argument("name", "orders")),
//! )?;
//! registry.validate()?;
//!
//! let resolver = MetadataResolver::new(&registry);
//! let order = resolver.descriptor("shop::Order")?;
//! let markers = [Marker::named("shop::Entity"), Marker::named("shop::Table")];
//!
//! assert_eq!(
//!     resolver.find_type(order, &markers),
//!     Some(TypeMatch::Capability("shop::Order"))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Thread Safety
//!
//! Registries are built with `&mut self` and are read-only afterwards. A
//! built [`TypeRegistry`] is `Send + Sync`; resolvers borrow it (or hold an
//! `Arc`) and never mutate anything.

mod descriptor;
mod lookup;
mod manifest;
mod marker;
mod registry;
mod resolver;

/// Resolver configuration and `typemark.toml` discovery.
pub mod config;

/// Type descriptions and the type-information seam.
pub use descriptor::{Annotation, Described, Instance, TypeDescriptor, TypeInfo, TypeKind};

/// Single-marker lookups.
pub use lookup::{
    AnnotationLookup, CapabilityLookup, InstanceCapabilityLookup, LookupError, Unresolvable,
};

/// Manifest parsing.
pub use manifest::{Manifest, ManifestError, TypeConfig};

pub use marker::{InstanceHandlers, Marker, TypeHandlers};

/// Type registry.
pub use registry::{RegistryError, TypeRegistry};

/// Ordered-fallback resolution.
pub use resolver::{InstanceMatch, MetadataResolver, Resolution, ResolveError, TypeMatch};

/// Configuration types re-exported for convenience.
pub use config::{ConfigError, ResolverConfig, UnresolvablePolicy};
