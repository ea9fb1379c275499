//! Manifest parsing for declaratively described types.

use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::descriptor::{Annotation, TypeDescriptor, TypeKind};
use crate::registry::{RegistryError, TypeRegistry};

/// Errors that can occur when parsing a manifest.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// Failed to read the manifest file.
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the manifest.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// A type entry is malformed.
    #[error("invalid type definition: {0}")]
    Type(String),
}

/// Type catalog and resolver settings, usually `typemark.toml`.
///
/// The manifest is a TOML file describing types the program cannot derive,
/// for example types owned by another system.
///
/// # Example
///
/// ```toml
/// [resolver]
/// unresolvable = "warn"
///
/// [[types]]
/// name = "shop::Table"
/// kind = "annotation"
///
/// [[types]]
/// name = "shop::Order"
/// implements = ["shop::JsonSchemaAware"]
///
/// [[types.annotations]]
/// type = "shop::Table"
/// arguments = { name = "orders" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

impl Manifest {
    /// Loads a manifest from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a type
    /// entry is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(&path)?;
        content.parse()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Converts every type entry into a descriptor, in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = TypeDescriptor> + '_ {
        self.types.iter().map(TypeConfig::to_descriptor)
    }

    /// Builds a validated registry from the declared types.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::from_manifest`].
    pub fn into_registry(self) -> Result<TypeRegistry, RegistryError> {
        TypeRegistry::from_manifest(&self)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        for config in &self.types {
            if config.name.trim().is_empty() {
                return Err(ManifestError::Type(
                    "type entries must have a non-empty `name`".to_string(),
                ));
            }
            if config.kind == TypeKind::Capability && config.extends.is_some() {
                return Err(ManifestError::Type(format!(
                    "capability `{}` cannot use `extends`; list super-capabilities in `implements`",
                    config.name
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

/// A single `[[types]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    /// Fully qualified type name.
    pub name: String,

    /// Defaults to `class` if not specified in the manifest.
    #[serde(default)]
    pub kind: TypeKind,

    /// Parent type (classes and annotations only).
    pub extends: Option<String>,

    #[serde(default)]
    pub implements: Vec<String>,

    /// Attached annotations, in attachment order.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl TypeConfig {
    fn to_descriptor(&self) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::new(self.name.clone(), self.kind);
        if let Some(parent) = &self.extends {
            descriptor = descriptor.extending(parent.clone());
        }
        for capability in &self.implements {
            descriptor = descriptor.implementing(capability.clone());
        }
        for annotation in &self.annotations {
            descriptor = descriptor.annotated(annotation.clone());
        }
        descriptor
    }
}
