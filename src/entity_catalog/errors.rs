//! # Entity Catalog Error Types
//!
//! Errors raised while building the entity model from its configuration or
//! while looking up entity types that the model does not know about.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: Missing entity types or properties
//! - **Model Errors**: Inheritance, key and foreign-key defects found at build time
//! - **Configuration Errors**: File I/O and YAML parsing issues during model loading

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No entity type named `{entity_type}` in the model")]
    EntityType { entity_type: String },
    #[error("Entity type `{entity_type}` is declared more than once")]
    DuplicateEntityType { entity_type: String },
    #[error("Entity type `{entity_type}` has no property `{property}`")]
    Property {
        entity_type: String,
        property: String,
    },
    #[error("Member `{member}` is declared more than once in the hierarchy of `{entity_type}`")]
    DuplicateMember { entity_type: String, member: String },
    #[error("Inheritance cycle detected at `{entity_type}`")]
    InheritanceCycle { entity_type: String },
    #[error("Key on `{entity_type}` must name at least one property")]
    EmptyKey { entity_type: String },
    #[error("Key on `{entity_type}` repeats property `{property}`")]
    DuplicateKeyProperty {
        entity_type: String,
        property: String,
    },
    #[error(
        "Relationship `{relationship}` names no principal key and `{entity_type}` has no primary key"
    )]
    MissingPrincipalKey {
        relationship: String,
        entity_type: String,
    },
    #[error(
        "Foreign key `{relationship}` has {dependent} properties but its principal key has {principal}"
    )]
    ForeignKeyArity {
        relationship: String,
        dependent: usize,
        principal: usize,
    },
    #[error(
        "Foreign key `{relationship}`: `{dependent_property}` ({dependent_type}) is incompatible with principal key property `{principal_property}` ({principal_type})"
    )]
    ForeignKeyType {
        relationship: String,
        dependent_property: String,
        dependent_type: String,
        principal_property: String,
        principal_type: String,
    },
    #[error("Failed to read model file: {error}")]
    ReadError { error: String },
    #[error("Failed to parse model: {error}")]
    ParseError { error: String },
}

impl CatalogError {
    /// Create a read error that names the file being loaded
    ///
    /// # Example
    /// ```ignore
    /// CatalogError::read_error_with_path("model.yaml", err)
    /// ```
    pub fn read_error_with_path(path: impl AsRef<std::path::Path>, error: impl ToString) -> Self {
        CatalogError::ReadError {
            error: format!("{}: {}", path.as_ref().display(), error.to_string()),
        }
    }
}
