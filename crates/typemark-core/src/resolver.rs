//! Ordered-fallback marker resolution.
//!
//! [`MetadataResolver`] answers one question for a type or a live instance:
//! which of an ordered list of markers does it satisfy first? Each marker slot
//! is checked as an annotation first and, for capability markers, as an
//! implemented capability second. The first slot that matches ends the
//! search. Instance searches also accept a class marker when the instance's
//! runtime type is that class or one of its subclasses.
//!
//! # Operations
//!
//! | Operation | Type-level | Instance-level | No match |
//! |---|---|---|---|
//! | has | [`has_type`] | [`has_instance`] | `false` |
//! | find | [`find_type`] | [`find_instance`] | `None` |
//! | require | [`require_type`] | [`require_instance`] | [`ResolveError::NoMetadata`] |
//! | resolve | [`resolve_type`] | [`resolve_instance`] | [`Resolution::NotFound`] |
//! | require resolve | [`require_resolve_type`] | [`require_resolve_instance`] | [`ResolveError::NoMetadata`] |
//!
//! # Unresolvable markers
//!
//! A marker that does not name a registered type never aborts a search. It
//! disqualifies its own slot and is logged according to
//! [`ResolverConfig::unresolvable`].
//!
//! [`has_type`]: MetadataResolver::has_type
//! [`has_instance`]: MetadataResolver::has_instance
//! [`find_type`]: MetadataResolver::find_type
//! [`find_instance`]: MetadataResolver::find_instance
//! [`require_type`]: MetadataResolver::require_type
//! [`require_instance`]: MetadataResolver::require_instance
//! [`resolve_type`]: MetadataResolver::resolve_type
//! [`resolve_instance`]: MetadataResolver::resolve_instance
//! [`require_resolve_type`]: MetadataResolver::require_resolve_type
//! [`require_resolve_instance`]: MetadataResolver::require_resolve_instance

use tracing::{debug, instrument, warn};

use crate::{
    config::{ResolverConfig, UnresolvablePolicy},
    descriptor::{Annotation, Instance, TypeDescriptor, TypeInfo, TypeKind},
    lookup::{AnnotationLookup, CapabilityLookup, InstanceCapabilityLookup, LookupError},
    marker::{InstanceHandlers, Marker, TypeHandlers, describe_markers},
};

/// Errors returned by the strict resolver operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// Every marker was tried and none matched.
    #[error("no metadata found for `{target}` (markers: [{markers}])")]
    NoMetadata { target: String, markers: String },
}

/// What a type-level search matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeMatch<'a> {
    /// An attached annotation assignable to the marker.
    Annotation(&'a Annotation),
    /// The name of the inspected type, which implements the marker.
    Capability(&'a str),
}

impl<'a> TypeMatch<'a> {
    pub fn annotation(self) -> Option<&'a Annotation> {
        match self {
            Self::Annotation(annotation) => Some(annotation),
            Self::Capability(_) => None,
        }
    }

    pub fn type_name(self) -> Option<&'a str> {
        match self {
            Self::Capability(name) => Some(name),
            Self::Annotation(_) => None,
        }
    }
}

/// What an instance-level search matched.
///
/// Both variants carry the inspected instance so handlers can combine
/// annotation data with the value itself.
#[derive(Debug, Clone, Copy)]
pub enum InstanceMatch<'a> {
    /// An annotation on the instance's runtime type.
    Annotation {
        annotation: &'a Annotation,
        instance: &'a dyn Instance,
    },
    /// The instance itself, whose runtime type implements the marker or, for a
    /// class marker, descends from it.
    Capability(&'a dyn Instance),
}

impl<'a> InstanceMatch<'a> {
    pub fn annotation(self) -> Option<&'a Annotation> {
        match self {
            Self::Annotation { annotation, .. } => Some(annotation),
            Self::Capability(_) => None,
        }
    }

    /// The inspected instance.
    pub fn instance(self) -> &'a dyn Instance {
        match self {
            Self::Annotation { instance, .. } | Self::Capability(instance) => instance,
        }
    }
}

/// Outcome of a handler-based resolution.
///
/// `NotFound` means no marker matched. It is distinct from any value a
/// handler may produce, including `None` or `()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Resolution<T> {
    Found(T),
    NotFound,
}

impl<T> Resolution<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Converts into an `Option`, mapping `NotFound` to `None`.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Found(value) => Resolution::Found(f(value)),
            Self::NotFound => Resolution::NotFound,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.found().unwrap_or(default)
    }

    pub fn unwrap_or_else(self, default: impl FnOnce() -> T) -> T {
        self.found().unwrap_or_else(default)
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// Resolves ordered markers against types and instances.
///
/// The resolver holds no state beyond its [`TypeInfo`] and configuration;
/// every call walks the marker list afresh. Wrap a registry in `&` or `Arc`
/// to share it between resolvers.
///
/// # Example
///
/// ```ignore
/// let resolver = MetadataResolver::new(&registry);
/// let order = registry.resolve("shop::Order")?;
///
/// match resolver.find_type(order, &[Marker::from("shop::Table"), Marker::from("shop::Record")]) {
///     Some(TypeMatch::Annotation(table)) => println!("table {:?}", table.argument("name")),
///     Some(TypeMatch::Capability(name)) => println!("{name} is a record"),
///     None => println!("no metadata"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MetadataResolver<I> {
    types: I,
    config: ResolverConfig,
}

impl<I: TypeInfo> MetadataResolver<I> {
    /// Creates a resolver with default configuration.
    pub fn new(types: I) -> Self {
        Self::with_config(types, ResolverConfig::default())
    }

    pub fn with_config(types: I, config: ResolverConfig) -> Self {
        Self { types, config }
    }

    pub fn types(&self) -> &I {
        &self.types
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Looks up a type descriptor by name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if `name` is not registered.
    pub fn descriptor(&self, name: &str) -> Result<&TypeDescriptor, LookupError> {
        self.types.resolve(name)
    }

    // ===== Type-level queries =====

    /// Returns `true` if any marker matches `descriptor`.
    pub fn has_type(&self, descriptor: &TypeDescriptor, markers: &[Marker]) -> bool {
        self.find_type(descriptor, markers).is_some()
    }

    /// Returns the match for the first marker `descriptor` satisfies.
    #[instrument(level = "debug", skip_all, fields(type_name = descriptor.name()))]
    pub fn find_type<'a>(
        &self,
        descriptor: &'a TypeDescriptor,
        markers: &[Marker],
    ) -> Option<TypeMatch<'a>> {
        markers
            .iter()
            .find_map(|marker| self.match_type(descriptor, marker))
    }

    /// Like [`find_type`](Self::find_type), but no match is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMetadata`] if no marker matches.
    pub fn require_type<'a>(
        &self,
        descriptor: &'a TypeDescriptor,
        markers: &[Marker],
    ) -> Result<TypeMatch<'a>, ResolveError> {
        self.find_type(descriptor, markers)
            .ok_or_else(|| no_metadata(descriptor.name(), markers))
    }

    /// Invokes the handler bound to the first marker `descriptor` satisfies.
    ///
    /// Only that handler runs, exactly once.
    #[instrument(level = "debug", skip_all, fields(type_name = descriptor.name()))]
    pub fn resolve_type<T>(
        &self,
        descriptor: &TypeDescriptor,
        handlers: &TypeHandlers<'_, T>,
    ) -> Resolution<T> {
        for (marker, handler) in handlers.entries() {
            if let Some(matched) = self.match_type(descriptor, marker) {
                return Resolution::Found(handler(matched));
            }
        }
        Resolution::NotFound
    }

    /// Like [`resolve_type`](Self::resolve_type), but no match is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMetadata`] if no marker matches.
    pub fn require_resolve_type<T>(
        &self,
        descriptor: &TypeDescriptor,
        handlers: &TypeHandlers<'_, T>,
    ) -> Result<T, ResolveError> {
        self.resolve_type(descriptor, handlers)
            .found()
            .ok_or_else(|| no_metadata(descriptor.name(), handlers.markers()))
    }

    // ===== Instance-level queries =====

    /// Returns `true` if any marker matches `instance`.
    pub fn has_instance(&self, instance: &dyn Instance, markers: &[Marker]) -> bool {
        self.find_instance(instance, markers).is_some()
    }

    /// Returns the match for the first marker `instance` satisfies.
    ///
    /// Annotations are read from the instance's runtime type. Unlike
    /// [`find_type`](Self::find_type), a class marker matches an instance
    /// whose runtime type is that class or extends it.
    #[instrument(level = "debug", skip_all, fields(runtime_type = instance.runtime_type()))]
    pub fn find_instance<'a>(
        &'a self,
        instance: &'a dyn Instance,
        markers: &[Marker],
    ) -> Option<InstanceMatch<'a>> {
        markers
            .iter()
            .find_map(|marker| self.match_instance(instance, marker))
    }

    /// Like [`find_instance`](Self::find_instance), but no match is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMetadata`] if no marker matches.
    pub fn require_instance<'a>(
        &'a self,
        instance: &'a dyn Instance,
        markers: &[Marker],
    ) -> Result<InstanceMatch<'a>, ResolveError> {
        self.find_instance(instance, markers)
            .ok_or_else(|| no_metadata(instance.runtime_type(), markers))
    }

    /// Invokes the handler bound to the first marker `instance` satisfies.
    #[instrument(level = "debug", skip_all, fields(runtime_type = instance.runtime_type()))]
    pub fn resolve_instance<T>(
        &self,
        instance: &dyn Instance,
        handlers: &InstanceHandlers<'_, T>,
    ) -> Resolution<T> {
        for (marker, handler) in handlers.entries() {
            if let Some(matched) = self.match_instance(instance, marker) {
                return Resolution::Found(handler(matched));
            }
        }
        Resolution::NotFound
    }

    /// Like [`resolve_instance`](Self::resolve_instance), but no match is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMetadata`] if no marker matches.
    pub fn require_resolve_instance<T>(
        &self,
        instance: &dyn Instance,
        handlers: &InstanceHandlers<'_, T>,
    ) -> Result<T, ResolveError> {
        self.resolve_instance(instance, handlers)
            .found()
            .ok_or_else(|| no_metadata(instance.runtime_type(), handlers.markers()))
    }

    // ===== Per-slot matching =====

    fn match_type<'a>(
        &self,
        descriptor: &'a TypeDescriptor,
        marker: &Marker,
    ) -> Option<TypeMatch<'a>> {
        let kind = self.classify(marker)?;

        let annotation = AnnotationLookup::new(&self.types).find(descriptor, marker);
        if let Some(annotation) = self.recover(marker, annotation)? {
            debug!(marker = %marker, "matched annotation");
            return Some(TypeMatch::Annotation(annotation));
        }

        if kind != TypeKind::Capability {
            return None;
        }
        let capability = CapabilityLookup::new(&self.types).find(descriptor, marker);
        let name = self.recover(marker, capability)??;
        debug!(marker = %marker, "matched capability");
        Some(TypeMatch::Capability(name))
    }

    fn match_instance<'a>(
        &'a self,
        instance: &'a dyn Instance,
        marker: &Marker,
    ) -> Option<InstanceMatch<'a>> {
        let kind = self.classify(marker)?;

        let annotation = AnnotationLookup::new(&self.types).find_for_instance(instance, marker);
        if let Some(annotation) = self.recover(marker, annotation)? {
            debug!(marker = %marker, "matched annotation");
            return Some(InstanceMatch::Annotation {
                annotation,
                instance,
            });
        }

        let lookup = InstanceCapabilityLookup::new(&self.types);
        let found = match kind {
            TypeKind::Capability => lookup.find(instance, marker),
            TypeKind::Class => lookup.find_instance_of(instance, marker),
            TypeKind::Annotation => return None,
        };
        let instance = self.recover(marker, found)??;
        debug!(marker = %marker, ?kind, "matched instance");
        Some(InstanceMatch::Capability(instance))
    }

    fn classify(&self, marker: &Marker) -> Option<TypeKind> {
        let kind = self.types.classify(marker.name());
        self.recover(marker, kind)
    }

    /// Turns a lookup error into "this slot did not match".
    fn recover<T>(&self, marker: &Marker, result: Result<T, LookupError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                let name = err.name();
                match self.config.unresolvable {
                    UnresolvablePolicy::Skip => {
                        debug!(marker = %marker, name, error = %err, "marker slot skipped");
                    }
                    UnresolvablePolicy::Warn => {
                        warn!(marker = %marker, name, error = %err, "marker slot skipped");
                    }
                }
                None
            }
        }
    }
}

fn no_metadata<'m>(target: &str, markers: impl IntoIterator<Item = &'m Marker>) -> ResolveError {
    ResolveError::NoMetadata {
        target: target.to_string(),
        markers: describe_markers(markers),
    }
}
