//! # Typemark Procedural Macros
//!
//! This crate provides `#[derive(Described)]`, which registers a Rust type
//! with the typemark type registry so it can be inspected and used as a
//! marker.
//!
//! ## Type Kinds
//!
//! A described type is a plain class by default. Annotation types (things
//! that get attached to other types) and capability types (things other
//! types implement) say so explicitly:
//!
//! ```ignore
//! #[derive(Described)]
//! #[typemark(annotation)]
//! struct Table;
//!
//! #[derive(Described)]
//! #[typemark(capability, implements(Record))]
//! struct JsonSchemaAware;
//! ```
//!
//! ## Relationships and Annotations
//!
//! ```ignore
//! #[derive(Described)]
//! #[typemark(
//!     extends(Entity),
//!     implements(JsonSchemaAware),
//!     annotate(Table(name = "orders", version = 2)),
//!     annotate(Audited),
//! )]
//! struct Order {
//!     id: u64,
//! }
//! ```
//!
//! Every referenced type must itself derive `Described`. Annotations keep
//! the order in which they are written.
//!
//! The macro generates:
//! - An implementation of `Described` carrying the registered type name
//! - An implementation of `Instance` so values can be inspected at runtime
//! - A type entry submitted to the global inventory

use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    DeriveInput, Error, Expr, ExprLit, ExprUnary, Ident, Lit, LitStr, Path, Result, UnOp,
    meta::ParseNestedMeta, parse_macro_input, spanned::Spanned,
};

/// Derives `Described` and `Instance` and registers the type.
///
/// Recognized `#[typemark(...)]` options (repeatable across attributes):
/// - `class` / `annotation` / `capability` - the type kind (default `class`)
/// - `name = "..."` - overrides the registered name, which otherwise is
///   `module_path!()::TypeName`
/// - `extends(Parent)` - parent type (not allowed on capabilities)
/// - `implements(CapA, CapB)` - implemented capabilities
/// - `annotate(Foo)` / `annotate(Foo(key = literal, ...))` - attached
///   annotations with string, integer, float or bool arguments
///
/// # Errors
///
/// Returns a compile error if:
/// - The type has generic or lifetime parameters
/// - An option is unknown, repeated where it must be unique, or malformed
/// - A capability declares `extends`
#[proc_macro_derive(Described, attributes(typemark))]
pub fn derive_described(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_described(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Type kind as written in the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Class,
    Annotation,
    Capability,
}

impl Kind {
    fn from_ident(ident: &Ident) -> Option<Self> {
        match ident.to_string().as_str() {
            "class" => Some(Self::Class),
            "annotation" => Some(Self::Annotation),
            "capability" => Some(Self::Capability),
            _ => None,
        }
    }
}

impl ToTokens for Kind {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let variant = match self {
            Self::Class => quote! { Class },
            Self::Annotation => quote! { Annotation },
            Self::Capability => quote! { Capability },
        };
        tokens.extend(quote! { ::typemark::TypeKind::#variant });
    }
}

/// A literal annotation argument, already range-checked.
#[derive(Debug, Clone, PartialEq)]
enum ArgLiteral {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ToTokens for ArgLiteral {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        tokens.extend(match self {
            Self::Str(value) => quote! { ::typemark::__private::ArgValue::Str(#value) },
            Self::Int(value) => quote! { ::typemark::__private::ArgValue::Int(#value) },
            Self::Float(value) => quote! { ::typemark::__private::ArgValue::Float(#value) },
            Self::Bool(value) => quote! { ::typemark::__private::ArgValue::Bool(#value) },
        });
    }
}

/// One `annotate(...)` entry.
struct AnnotationSpec {
    ty: Path,
    arguments: Vec<(String, ArgLiteral)>,
}

/// Everything collected from the `#[typemark(...)]` attributes.
#[derive(Default)]
struct TypeOptions {
    kind: Option<Kind>,
    name: Option<LitStr>,
    extends: Option<Path>,
    implements: Vec<Path>,
    annotations: Vec<AnnotationSpec>,
}

impl TypeOptions {
    fn kind(&self) -> Kind {
        self.kind.unwrap_or(Kind::Class)
    }

    fn from_attrs(attrs: &[syn::Attribute]) -> Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("typemark")) {
            attr.parse_nested_meta(|meta| options.parse_option(&meta))?;
        }
        Ok(options)
    }

    fn parse_option(&mut self, meta: &ParseNestedMeta<'_>) -> Result<()> {
        let Some(ident) = meta.path.get_ident() else {
            return Err(meta.error("expected a typemark option"));
        };

        if let Some(kind) = Kind::from_ident(ident) {
            if self.kind.is_some_and(|previous| previous != kind) {
                return Err(meta.error("type kind is already set"));
            }
            self.kind = Some(kind);
            return Ok(());
        }

        match ident.to_string().as_str() {
            "name" => {
                if self.name.is_some() {
                    return Err(meta.error("duplicate `name` option"));
                }
                let name: LitStr = meta.value()?.parse()?;
                if name.value().trim().is_empty() {
                    return Err(Error::new(name.span(), "type name must not be empty"));
                }
                self.name = Some(name);
            }
            "extends" => {
                if self.extends.is_some() {
                    return Err(meta.error("a type can extend only one parent"));
                }
                let mut parents = Vec::new();
                meta.parse_nested_meta(|inner| {
                    parents.push(inner.path.clone());
                    Ok(())
                })?;
                if parents.len() != 1 {
                    return Err(meta.error("`extends` takes exactly one type"));
                }
                self.extends = parents.pop();
            }
            "implements" => {
                meta.parse_nested_meta(|inner| {
                    self.implements.push(inner.path.clone());
                    Ok(())
                })?;
            }
            "annotate" => {
                meta.parse_nested_meta(|inner| {
                    let spec = parse_annotation(&inner)?;
                    self.annotations.push(spec);
                    Ok(())
                })?;
            }
            _ => {
                return Err(meta.error(
                    "unknown typemark option; expected one of: class, annotation, capability, \
                     name, extends, implements, annotate",
                ));
            }
        }
        Ok(())
    }
}

/// Parses `Foo` or `Foo(key = literal, ...)` inside `annotate(...)`.
fn parse_annotation(meta: &ParseNestedMeta<'_>) -> Result<AnnotationSpec> {
    let mut spec = AnnotationSpec {
        ty: meta.path.clone(),
        arguments: Vec::new(),
    };

    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|arg| {
            let key = arg
                .path
                .get_ident()
                .ok_or_else(|| arg.error("annotation argument names must be identifiers"))?
                .to_string();
            if spec.arguments.iter().any(|(existing, _)| *existing == key) {
                return Err(arg.error(format!("duplicate annotation argument `{key}`")));
            }
            let value: Expr = arg.value()?.parse()?;
            spec.arguments.push((key, parse_literal(&value)?));
            Ok(())
        })?;
    }

    Ok(spec)
}

/// Converts an argument expression into a literal value.
///
/// Accepts string, integer, float and bool literals, plus negated numbers.
fn parse_literal(expr: &Expr) -> Result<ArgLiteral> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => match lit {
            Lit::Str(s) => Ok(ArgLiteral::Str(s.value())),
            Lit::Int(i) => Ok(ArgLiteral::Int(i.base10_parse()?)),
            Lit::Float(f) => {
                let value: f64 = f.base10_parse()?;
                if !value.is_finite() {
                    return Err(Error::new(f.span(), "float literal out of range"));
                }
                Ok(ArgLiteral::Float(value))
            }
            Lit::Bool(b) => Ok(ArgLiteral::Bool(b.value)),
            _ => Err(Error::new(
                lit.span(),
                "unsupported literal; expected a string, integer, float or bool",
            )),
        },
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr: inner,
            ..
        }) => match parse_literal(inner)? {
            ArgLiteral::Int(value) => value
                .checked_neg()
                .map(ArgLiteral::Int)
                .ok_or_else(|| Error::new(expr.span(), "integer literal out of range")),
            ArgLiteral::Float(value) => Ok(ArgLiteral::Float(-value)),
            _ => Err(Error::new(expr.span(), "only numbers can be negated")),
        },
        _ => Err(Error::new(
            expr.span(),
            "annotation arguments must be literals",
        )),
    }
}

/// Generates the `Described`/`Instance` impls and the inventory entry.
///
/// # Errors
///
/// Returns an error if the type is generic or the options are invalid.
fn expand_described(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Described cannot be derived for generic types",
        ));
    }

    let options = TypeOptions::from_attrs(&input.attrs)?;
    let kind = options.kind();

    if kind == Kind::Capability
        && let Some(parent) = &options.extends
    {
        return Err(Error::new(
            parent.span(),
            "capabilities cannot use `extends`; list super-capabilities in `implements`",
        ));
    }

    let type_name = match &options.name {
        Some(name) => quote! { #name },
        None => quote! { ::std::concat!(::std::module_path!(), "::", ::std::stringify!(#ident)) },
    };

    let extends = match &options.extends {
        Some(parent) => quote! {
            ::std::option::Option::Some(<#parent as ::typemark::Described>::TYPE_NAME)
        },
        None => quote! { ::std::option::Option::None },
    };

    let implements = options
        .implements
        .iter()
        .map(|capability| quote! { <#capability as ::typemark::Described>::TYPE_NAME });

    let annotations = options.annotations.iter().map(|spec| {
        let ty = &spec.ty;
        let arguments = spec
            .arguments
            .iter()
            .map(|(key, value)| quote! { (#key, #value) });
        quote! {
            ::typemark::__private::AnnotationEntry {
                type_name: <#ty as ::typemark::Described>::TYPE_NAME,
                arguments: &[#(#arguments),*],
            }
        }
    });

    let expanded = quote! {
        impl ::typemark::Described for #ident {
            const TYPE_NAME: &'static str = #type_name;
        }

        impl ::typemark::Instance for #ident {
            fn runtime_type(&self) -> &str {
                <Self as ::typemark::Described>::TYPE_NAME
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        // Sealed token prevents external construction of TypeEntry
        ::typemark::__private::inventory::submit! {
            ::typemark::__private::TypeEntry {
                name: <#ident as ::typemark::Described>::TYPE_NAME,
                kind: #kind,
                extends: #extends,
                implements: &[#(#implements),*],
                annotations: &[#(#annotations),*],
                __sealed: ::typemark::__private::sealed(),
            }
        }
    };

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    /// Removes all whitespace for easier content comparison in tests.
    fn strip_whitespace(input: &str) -> String {
        input.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Helper to parse a derive input from tokens for testing.
    fn parse_derive_input(tokens: proc_macro2::TokenStream) -> DeriveInput {
        syn::parse2(tokens).expect("failed to parse DeriveInput")
    }

    fn expand(tokens: proc_macro2::TokenStream) -> Result<String> {
        expand_described(&parse_derive_input(tokens)).map(|ts| strip_whitespace(&ts.to_string()))
    }

    fn expand_err(tokens: proc_macro2::TokenStream) -> String {
        match expand_described(&parse_derive_input(tokens)) {
            Ok(_) => panic!("expected expansion to fail"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_expand_plain_struct_defaults_to_class_with_module_path_name() {
        // Arrange
        let input = quote! {
            struct Order {
                id: u64,
            }
        };

        // Act
        let output = expand(input).unwrap();

        // Assert
        assert!(output.contains("impl::typemark::DescribedforOrder"));
        assert!(output.contains("::std::concat!(::std::module_path!(),\"::\",::std::stringify!(Order))"));
        assert!(output.contains("impl::typemark::InstanceforOrder"));
        assert!(output.contains("kind:::typemark::TypeKind::Class"));
        assert!(output.contains("extends:::std::option::Option::None"));
        assert!(output.contains("implements:&[]"));
        assert!(output.contains("annotations:&[]"));
        assert!(output.contains("__sealed:::typemark::__private::sealed()"));
    }

    #[test]
    fn test_expand_name_override_and_kind() {
        let input = quote! {
            #[typemark(annotation, name = "shop::Table")]
            struct Table;
        };

        let output = expand(input).unwrap();

        assert!(output.contains("constTYPE_NAME:&'staticstr=\"shop::Table\";"));
        assert!(output.contains("kind:::typemark::TypeKind::Annotation"));
    }

    #[test]
    fn test_expand_relationships_reference_described_names() {
        let input = quote! {
            #[typemark(extends(Entity), implements(JsonSchemaAware, crate::Printable))]
            struct Order;
        };

        let output = expand(input).unwrap();

        assert!(output.contains(
            "extends:::std::option::Option::Some(<Entityas::typemark::Described>::TYPE_NAME)"
        ));
        assert!(output.contains(
            "implements:&[<JsonSchemaAwareas::typemark::Described>::TYPE_NAME,<crate::Printableas::typemark::Described>::TYPE_NAME]"
        ));
    }

    #[test]
    fn test_expand_annotations_keep_order_and_arguments() {
        // Arrange
        let input = quote! {
            #[typemark(annotate(View(name = "order_view", version = 2, ratio = -0.5, live = true)))]
            #[typemark(annotate(Table))]
            struct Order;
        };

        // Act
        let output = expand(input).unwrap();

        // Assert
        let view = output.find("<Viewas::typemark::Described>").unwrap();
        let table = output.find("<Tableas::typemark::Described>").unwrap();
        assert!(view < table, "annotations must keep declaration order");
        assert!(output.contains("(\"name\",::typemark::__private::ArgValue::Str(\"order_view\"))"));
        assert!(output.contains("(\"version\",::typemark::__private::ArgValue::Int(2i64))"));
        assert!(output.contains("(\"ratio\",::typemark::__private::ArgValue::Float(-0.5f64))"));
        assert!(output.contains("(\"live\",::typemark::__private::ArgValue::Bool(true))"));
        assert!(output.contains("type_name:<Tableas::typemark::Described>::TYPE_NAME,arguments:&[]"));
    }

    #[test]
    fn test_expand_rejects_generic_types() {
        let err = expand_err(quote! {
            struct Wrapper<T>(T);
        });

        assert!(err.contains("generic types"));
    }

    #[test]
    fn test_expand_rejects_lifetime_parameters() {
        let err = expand_err(quote! {
            struct Borrowed<'a>(&'a str);
        });

        assert!(err.contains("generic types"));
    }

    #[test]
    fn test_expand_rejects_capability_with_extends() {
        let err = expand_err(quote! {
            #[typemark(capability, extends(Base))]
            struct Aware;
        });

        assert!(err.contains("capabilities cannot use `extends`"));
    }

    #[test]
    fn test_expand_rejects_conflicting_kinds() {
        let err = expand_err(quote! {
            #[typemark(annotation, capability)]
            struct Confused;
        });

        assert!(err.contains("type kind is already set"));
    }

    #[test]
    fn test_expand_accepts_repeated_identical_kind() {
        let output = expand(quote! {
            #[typemark(capability)]
            #[typemark(capability, implements(Record))]
            struct Aware;
        })
        .unwrap();

        assert!(output.contains("kind:::typemark::TypeKind::Capability"));
    }

    #[test]
    fn test_expand_rejects_unknown_option() {
        let err = expand_err(quote! {
            #[typemark(implement(Record))]
            struct Typo;
        });

        assert!(err.contains("unknown typemark option"));
    }

    #[test]
    fn test_expand_rejects_multiple_parents() {
        let err = expand_err(quote! {
            #[typemark(extends(A, B))]
            struct Child;
        });

        assert!(err.contains("exactly one type"));
    }

    #[test]
    fn test_expand_rejects_duplicate_annotation_argument() {
        let err = expand_err(quote! {
            #[typemark(annotate(Table(name = "a", name = "b")))]
            struct Order;
        });

        assert!(err.contains("duplicate annotation argument `name`"));
    }

    #[test]
    fn test_expand_rejects_non_literal_argument() {
        let err = expand_err(quote! {
            #[typemark(annotate(Table(name = some_const)))]
            struct Order;
        });

        assert!(err.contains("must be literals"));
    }

    #[test]
    fn test_expand_rejects_empty_name() {
        let err = expand_err(quote! {
            #[typemark(name = "  ")]
            struct Order;
        });

        assert!(err.contains("must not be empty"));
    }

    #[test]
    fn test_expand_rejects_float_argument_out_of_range() {
        let err = expand_err(quote! {
            #[typemark(annotate(Table(x = 1e400)))]
            struct Order;
        });

        assert!(err.contains("float literal out of range"));
    }

    #[test]
    fn test_parse_literal_rejects_negated_float_out_of_range() {
        let expr: Expr = syn::parse2(quote! { -1e400 }).unwrap();

        let err = parse_literal(&expr).unwrap_err();

        assert!(err.to_string().contains("float literal out of range"));
    }

    #[test]
    fn test_parse_literal_negative_integer() {
        let expr: Expr = syn::parse2(quote! { -42 }).unwrap();

        assert_eq!(parse_literal(&expr).unwrap(), ArgLiteral::Int(-42));
    }

    #[test]
    fn test_parse_literal_rejects_negated_string() {
        let expr: Expr = syn::parse2(quote! { -"x" }).unwrap();

        assert!(parse_literal(&expr).is_err());
    }
}
