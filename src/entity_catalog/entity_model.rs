//! Read-only description of mapped entity types.
//!
//! The model is built once (see [`super::config::EntityModelConfig`]) and only
//! read afterwards. Lookups walk the inheritance chain, so a property or
//! navigation declared on a base type is visible through every subtype, and
//! the returned item always names the type that actually declares it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use crate::utils::serde_shared::{arc, arc_vec};

/// Scalar value kinds a mapped property can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Float64,
    Decimal,
    String,
    Guid,
    DateTime,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Float64 => "float64",
            ScalarKind::Decimal => "decimal",
            ScalarKind::String => "string",
            ScalarKind::Guid => "guid",
            ScalarKind::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub declaring_entity_type: String,
    pub value_type: ScalarKind,
    pub nullable: bool,
}

impl Property {
    pub fn new(
        declaring_entity_type: impl Into<String>,
        name: impl Into<String>,
        value_type: ScalarKind,
        nullable: bool,
    ) -> Self {
        Property {
            name: name.into(),
            declaring_entity_type: declaring_entity_type.into(),
            value_type,
            nullable,
        }
    }
}

/// Ordered, non-empty property sequence identifying an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub properties: Vec<Property>,
}

impl Key {
    pub fn new(entity_type: &str, properties: Vec<Property>) -> Result<Self, CatalogError> {
        if properties.is_empty() {
            return Err(CatalogError::EmptyKey {
                entity_type: entity_type.to_string(),
            });
        }
        let mut seen = HashSet::new();
        for property in &properties {
            if !seen.insert(property.name.as_str()) {
                return Err(CatalogError::DuplicateKeyProperty {
                    entity_type: entity_type.to_string(),
                    property: property.name.clone(),
                });
            }
        }
        Ok(Key { properties })
    }

    pub fn is_composite(&self) -> bool {
        self.properties.len() > 1
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Links the dependent type's `properties` to the principal's `principal_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    /// The dependent entity type, i.e. the one holding the foreign-key properties.
    pub declaring_entity_type: String,
    pub properties: Vec<Property>,
    pub principal_entity_type: String,
    pub principal_key: Key,
}

/// A relationship-valued member exposed on one side of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub name: String,
    pub declaring_entity_type: String,
    pub target_entity_type: String,
    pub is_collection: bool,
    #[serde(with = "arc")]
    pub foreign_key: Arc<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub base_type: Option<String>,
    /// Properties declared on this type only; inherited ones live on the base.
    pub properties: Vec<Property>,
    pub primary_key: Option<Key>,
    #[serde(with = "arc_vec")]
    pub navigations: Vec<Arc<Navigation>>,
}

impl EntityType {
    pub fn declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn declared_navigation(&self, name: &str) -> Option<&Arc<Navigation>> {
        self.navigations.iter().find(|n| n.name == name)
    }
}

/// Immutable entity metadata shared by every compilation that reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    entity_types: HashMap<String, EntityType>,
}

impl EntityModel {
    pub(crate) fn from_entity_types(entity_types: HashMap<String, EntityType>) -> Self {
        EntityModel { entity_types }
    }

    pub fn entity_type(&self, name: &str) -> Result<&EntityType, CatalogError> {
        self.entity_types
            .get(name)
            .ok_or_else(|| CatalogError::EntityType {
                entity_type: name.to_string(),
            })
    }

    pub fn find_entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    /// The type itself followed by its ancestors, nearest first.
    ///
    /// Stops early on an unknown base name; cycles are rejected at build time.
    pub fn hierarchy<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a EntityType> + 'a {
        let mut next = self.entity_types.get(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .base_type
                .as_deref()
                .and_then(|base| self.entity_types.get(base));
            Some(current)
        })
    }

    pub fn find_property(&self, entity_type: &str, property: &str) -> Option<&Property> {
        self.hierarchy(entity_type)
            .find_map(|ty| ty.declared_property(property))
    }

    pub fn find_navigation(&self, entity_type: &str, navigation: &str) -> Option<&Arc<Navigation>> {
        self.hierarchy(entity_type)
            .find_map(|ty| ty.declared_navigation(navigation))
    }

    /// Primary key of the hierarchy root that `entity_type` belongs to.
    pub fn primary_key(&self, entity_type: &str) -> Option<&Key> {
        self.hierarchy(entity_type)
            .find_map(|ty| ty.primary_key.as_ref())
    }

    /// True when `candidate` is `ancestor` or derives from it.
    pub fn is_assignable_to(&self, candidate: &str, ancestor: &str) -> bool {
        self.hierarchy(candidate).any(|ty| ty.name == ancestor)
    }

    /// True when `candidate` derives from `ancestor` and is not `ancestor` itself.
    pub fn is_strict_subtype(&self, candidate: &str, ancestor: &str) -> bool {
        candidate != ancestor && self.is_assignable_to(candidate, ancestor)
    }
}
