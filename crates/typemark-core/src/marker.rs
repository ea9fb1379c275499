//! Markers and ordered marker-to-handler maps.

use std::{borrow::Cow, fmt};

use crate::{
    descriptor::Described,
    resolver::{InstanceMatch, TypeMatch},
};

/// Names an annotation or capability type to search for.
///
/// A marker is only a name; what it means is decided when it is classified
/// against a [`TypeInfo`](crate::TypeInfo) during a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marker(Cow<'static, str>);

impl Marker {
    /// Marker for a described Rust type.
    pub const fn of<T: Described>() -> Self {
        Self(Cow::Borrowed(T::TYPE_NAME))
    }

    /// Marker for a type known only by name (for example one declared in a
    /// manifest).
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Marker {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Marker {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Joins marker names for error messages and log fields.
pub(crate) fn describe_markers<'m>(markers: impl IntoIterator<Item = &'m Marker>) -> String {
    markers
        .into_iter()
        .map(Marker::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insertion-ordered map with replace-in-place semantics.
struct OrderedHandlers<H> {
    entries: Vec<(Marker, H)>,
}

impl<H> OrderedHandlers<H> {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, marker: Marker, handler: H) {
        match self.entries.iter_mut().find(|(m, _)| *m == marker) {
            Some(slot) => slot.1 = handler,
            None => self.entries.push((marker, handler)),
        }
    }

    fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.entries.iter().map(|(marker, _)| marker)
    }
}

type TypeHandlerFn<'h, T> = Box<dyn for<'a> Fn(TypeMatch<'a>) -> T + 'h>;
type InstanceHandlerFn<'h, T> = Box<dyn for<'a> Fn(InstanceMatch<'a>) -> T + 'h>;

/// Ordered marker-to-handler map for type-level resolution.
///
/// Markers are searched in first-insertion order. Binding a marker that is
/// already present replaces its handler without moving it.
///
/// ```ignore
/// let handlers = TypeHandlers::new()
///     .on(Marker::of::<Table>(), |m| m.annotation().and_then(|a| a.str_argument("name")).map(str::to_owned))
///     .on(Marker::of::<Entity>(), |_| None);
/// ```
pub struct TypeHandlers<'h, T> {
    inner: OrderedHandlers<TypeHandlerFn<'h, T>>,
}

impl<'h, T> TypeHandlers<'h, T> {
    pub const fn new() -> Self {
        Self {
            inner: OrderedHandlers::new(),
        }
    }

    /// Binds `handler` to `marker`.
    #[must_use]
    pub fn on(
        mut self,
        marker: impl Into<Marker>,
        handler: impl for<'a> Fn(TypeMatch<'a>) -> T + 'h,
    ) -> Self {
        self.insert(marker, handler);
        self
    }

    /// Binds `handler` to `marker` in place.
    pub fn insert(
        &mut self,
        marker: impl Into<Marker>,
        handler: impl for<'a> Fn(TypeMatch<'a>) -> T + 'h,
    ) {
        self.inner.insert(marker.into(), Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Markers in search order.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.inner.markers()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Marker, &TypeHandlerFn<'h, T>)> {
        self.inner.entries.iter().map(|(m, h)| (m, h))
    }
}

impl<T> Default for TypeHandlers<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypeHandlers<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.markers()).finish()
    }
}

/// Ordered marker-to-handler map for instance-level resolution.
///
/// Same ordering rules as [`TypeHandlers`]. Handlers receive an
/// [`InstanceMatch`], which always carries the inspected instance.
pub struct InstanceHandlers<'h, T> {
    inner: OrderedHandlers<InstanceHandlerFn<'h, T>>,
}

impl<'h, T> InstanceHandlers<'h, T> {
    pub const fn new() -> Self {
        Self {
            inner: OrderedHandlers::new(),
        }
    }

    /// Binds `handler` to `marker`.
    #[must_use]
    pub fn on(
        mut self,
        marker: impl Into<Marker>,
        handler: impl for<'a> Fn(InstanceMatch<'a>) -> T + 'h,
    ) -> Self {
        self.insert(marker, handler);
        self
    }

    /// Binds `handler` to `marker` in place.
    pub fn insert(
        &mut self,
        marker: impl Into<Marker>,
        handler: impl for<'a> Fn(InstanceMatch<'a>) -> T + 'h,
    ) {
        self.inner.insert(marker.into(), Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Markers in search order.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.inner.markers()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Marker, &InstanceHandlerFn<'h, T>)> {
        self.inner.entries.iter().map(|(m, h)| (m, h))
    }
}

impl<T> Default for InstanceHandlers<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for InstanceHandlers<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.markers()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Table;

    impl Described for Table {
        const TYPE_NAME: &'static str = "shop::Table";
    }

    #[test]
    fn test_marker_of_uses_described_name() {
        let marker = Marker::of::<Table>();

        assert_eq!(marker.name(), "shop::Table");
        assert_eq!(marker, Marker::named("shop::Table"));
        assert_eq!(marker.to_string(), "shop::Table");
    }

    #[test]
    fn test_handlers_keep_first_insertion_order_and_last_definition() {
        // Arrange
        let calls = Cell::new(0);
        let handlers = TypeHandlers::new()
            .on("A", |_| 1)
            .on("B", |_| 2)
            .on("A", |_| {
                calls.set(calls.get() + 1);
                3
            });

        // Act
        let order: Vec<_> = handlers.markers().map(Marker::name).collect();
        let (first_marker, first_handler) = handlers.entries().next().unwrap();
        let value = first_handler(TypeMatch::Capability("T"));

        // Assert
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(handlers.len(), 2);
        assert_eq!(first_marker.name(), "A");
        assert_eq!(value, 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_describe_markers_joins_names() {
        let markers = [Marker::from("A"), Marker::from(String::from("B"))];

        assert_eq!(describe_markers(&markers), "A, B");
        assert_eq!(describe_markers(std::iter::empty()), "");
    }

    #[test]
    fn test_empty_handlers_debug_output() {
        let handlers: InstanceHandlers<'_, ()> = InstanceHandlers::default();

        assert!(handlers.is_empty());
        assert_eq!(format!("{handlers:?}"), "[]");
    }
}
