//! Type descriptors and the introspection seam the resolver is built on.
//!
//! A [`TypeDescriptor`] is the static metadata of one type: its name, its
//! [`TypeKind`], an optional parent, the capabilities it implements, and the
//! annotations attached to it. Descriptors are owned by a [`TypeInfo`]
//! implementation (normally [`TypeRegistry`](crate::TypeRegistry)) and are
//! only ever borrowed by lookups.
//!
//! # Assignability
//!
//! A type `A` is assignable to `B` when `A == B`, or when `B` is reachable from
//! `A` by following `extends` and `implements` edges. This single relation
//! drives both annotation matching (an attached `SubFoo` annotation satisfies
//! a `Foo` marker) and capability checks (a class whose parent implements
//! `Bar` implements `Bar` too).

use std::{
    any::Any,
    collections::{BTreeMap, HashSet},
    fmt,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::lookup::{LookupError, Unresolvable};

/// What role a described type plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// A concrete type that may carry annotations and implement capabilities.
    #[default]
    Class,
    /// A type usable as a declarative tag on other types.
    Annotation,
    /// An interface-like contract other types implement.
    Capability,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => f.write_str("class"),
            Self::Annotation => f.write_str("annotation"),
            Self::Capability => f.write_str("capability"),
        }
    }
}

/// An annotation attached to a type, with its named arguments.
///
/// Arguments are keyed by name; iteration is in name order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    arguments: BTreeMap<String, JsonValue>,
}

impl Annotation {
    /// Creates an annotation of the given type with no arguments.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            arguments: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a named argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Name of the annotation's type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a single argument by name.
    pub fn argument(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.get(name)
    }

    /// Returns a string argument by name.
    pub fn str_argument(&self, name: &str) -> Option<&str> {
        self.argument(name).and_then(JsonValue::as_str)
    }

    pub fn arguments(&self) -> &BTreeMap<String, JsonValue> {
        &self.arguments
    }
}

/// Static metadata describing one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    name: String,
    #[serde(default)]
    kind: TypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    implements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    annotations: Vec<Annotation>,
}

impl TypeDescriptor {
    /// Creates a descriptor with no parent, capabilities, or annotations.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            extends: None,
            implements: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn annotation(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Annotation)
    }

    pub fn capability(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Capability)
    }

    /// Sets the parent type.
    #[must_use]
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Appends an implemented capability (a super-capability for
    /// capability types).
    #[must_use]
    pub fn implementing(mut self, capability: impl Into<String>) -> Self {
        self.implements.push(capability.into());
        self
    }

    /// Attaches an annotation after any already attached.
    #[must_use]
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn extends(&self) -> Option<&str> {
        self.extends.as_deref()
    }

    pub fn implements(&self) -> &[String] {
        &self.implements
    }

    /// Attached annotations, in attachment order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Names of every type this descriptor points at directly.
    pub(crate) fn references(&self) -> impl Iterator<Item = &str> {
        self.extends
            .as_deref()
            .into_iter()
            .chain(self.implements.iter().map(String::as_str))
            .chain(self.annotations.iter().map(Annotation::type_name))
    }
}

/// A type with a stable, compile-time name.
///
/// Implemented by `#[derive(Described)]`; powers
/// [`Marker::of`](crate::Marker::of).
pub trait Described {
    const TYPE_NAME: &'static str;
}

/// A live value whose runtime type can be introspected.
///
/// `runtime_type` is resolved through dynamic dispatch, so a `&dyn Instance`
/// reports the concrete type behind it rather than any static view of it.
pub trait Instance: Any {
    /// Name of the concrete type of this value.
    fn runtime_type(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Instance {
    /// Downcasts to a concrete type.
    pub fn downcast_ref<T: Instance>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the concrete type is `T`.
    pub fn is<T: Instance>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl fmt::Debug for dyn Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("runtime_type", &self.runtime_type())
            .finish_non_exhaustive()
    }
}

/// Read access to type metadata.
///
/// Only [`descriptor`](TypeInfo::descriptor) is required; the provided methods
/// derive name resolution, marker classification and assignability from it.
/// Implementations must be immutable for the duration of a lookup.
pub trait TypeInfo {
    /// Returns the descriptor registered under `name`, if any.
    fn descriptor(&self, name: &str) -> Option<&TypeDescriptor>;

    /// Like [`descriptor`](TypeInfo::descriptor), but unknown names are an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if `name` is not registered.
    fn resolve(&self, name: &str) -> Result<&TypeDescriptor, LookupError> {
        self.descriptor(name)
            .ok_or_else(|| LookupError::unresolvable(name, Unresolvable::Unknown))
    }

    /// Classifies a marker name by the kind of type it resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnresolvableType`] if `name` is not registered.
    fn classify(&self, name: &str) -> Result<TypeKind, LookupError> {
        self.resolve(name).map(TypeDescriptor::kind)
    }

    /// Returns `true` if `from` equals `to` or reaches it through `extends`
    /// and `implements` edges.
    ///
    /// Unknown names along the way end that branch of the walk; cycles are
    /// tolerated.
    fn is_assignable(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = vec![from];

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(descriptor) = self.descriptor(current) else {
                continue;
            };
            for next in descriptor
                .extends()
                .into_iter()
                .chain(descriptor.implements().iter().map(String::as_str))
            {
                if next == to {
                    return true;
                }
                pending.push(next);
            }
        }

        false
    }
}

impl<T: TypeInfo + ?Sized> TypeInfo for &T {
    fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        (**self).descriptor(name)
    }
}

impl<T: TypeInfo + ?Sized> TypeInfo for Arc<T> {
    fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        (**self).descriptor(name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FakeTypes(HashMap<String, TypeDescriptor>);

    impl FakeTypes {
        fn new(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
            Self(
                descriptors
                    .into_iter()
                    .map(|d| (d.name().to_string(), d))
                    .collect(),
            )
        }
    }

    impl TypeInfo for FakeTypes {
        fn descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
            self.0.get(name)
        }
    }

    #[test]
    fn test_is_assignable_follows_parent_and_capability_edges() {
        // Arrange
        let types = FakeTypes::new([
            TypeDescriptor::capability("Record"),
            TypeDescriptor::capability("Aware").implementing("Record"),
            TypeDescriptor::class("Base").implementing("Aware"),
            TypeDescriptor::class("Child").extending("Base"),
        ]);

        // Act & Assert
        assert!(types.is_assignable("Child", "Child"));
        assert!(types.is_assignable("Child", "Base"));
        assert!(types.is_assignable("Child", "Aware"));
        assert!(types.is_assignable("Child", "Record"));
        assert!(!types.is_assignable("Base", "Child"));
        assert!(!types.is_assignable("Record", "Aware"));
    }

    #[test]
    fn test_is_assignable_terminates_on_cycles() {
        // Arrange
        let types = FakeTypes::new([
            TypeDescriptor::class("A").extending("B"),
            TypeDescriptor::class("B").extending("A"),
        ]);

        // Act & Assert
        assert!(types.is_assignable("A", "B"));
        assert!(!types.is_assignable("A", "C"));
    }

    #[test]
    fn test_is_assignable_with_unknown_names_only_matches_equality() {
        let types = FakeTypes::new([]);

        assert!(types.is_assignable("Ghost", "Ghost"));
        assert!(!types.is_assignable("Ghost", "Other"));
    }

    #[test]
    fn test_resolve_unknown_name_is_unresolvable() {
        // Arrange
        let types = FakeTypes::new([TypeDescriptor::annotation("Foo")]);

        // Act
        let err = types.resolve("Missing").unwrap_err();

        // Assert
        assert!(matches!(
            err,
            LookupError::UnresolvableType {
                reason: Unresolvable::Unknown,
                ..
            }
        ));
        assert_eq!(types.classify("Foo").unwrap(), TypeKind::Annotation);
    }

    #[test]
    fn test_annotation_arguments_are_accessible() {
        let annotation = Annotation::new("Table")
            .with_argument("name", "orders")
            .with_argument("version", 2);

        assert_eq!(annotation.type_name(), "Table");
        assert_eq!(annotation.str_argument("name"), Some("orders"));
        assert_eq!(annotation.argument("version"), Some(&JsonValue::from(2)));
        assert_eq!(annotation.str_argument("version"), None);
        assert_eq!(annotation.arguments().len(), 2);
    }

    #[test]
    fn test_descriptor_references_cover_all_edges() {
        let descriptor = TypeDescriptor::class("Order")
            .extending("Entity")
            .implementing("Aware")
            .annotated(Annotation::new("Table"));

        let refs: Vec<_> = descriptor.references().collect();

        assert_eq!(refs, vec!["Entity", "Aware", "Table"]);
    }

    #[test]
    fn test_type_kind_display_matches_serde_names() {
        assert_eq!(TypeKind::Capability.to_string(), "capability");
        let kind: TypeKind = serde_json::from_str("\"annotation\"").unwrap();
        assert_eq!(kind, TypeKind::Annotation);
    }
}
