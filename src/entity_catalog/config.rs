use super::entity_model::{EntityModel, EntityType, ForeignKey, Key, Navigation, Property, ScalarKind};
use super::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Property list supporting both single and composite forms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PropertyList {
    /// Single property name
    Single(String),
    /// Composite property list, in declared order
    Composite(Vec<String>),
}

impl PropertyList {
    pub fn names(&self) -> Vec<&str> {
        match self {
            PropertyList::Single(name) => vec![name.as_str()],
            PropertyList::Composite(names) => names.iter().map(|s| s.as_str()).collect(),
        }
    }
}

impl From<&str> for PropertyList {
    fn from(s: &str) -> Self {
        PropertyList::Single(s.to_string())
    }
}

impl From<Vec<&str>> for PropertyList {
    fn from(v: Vec<&str>) -> Self {
        PropertyList::Composite(v.into_iter().map(str::to_string).collect())
    }
}

/// Entity models are defined in YAML with the following structure:
///
/// ```yaml
/// name: commerce              # Optional model name
/// entities:
///   - name: Customer
///     key: Id                 # Single or composite ([TenantId, Id])
///     properties:
///       - { name: Id, type: int32 }
///       - { name: Name, type: string, nullable: true }
///   - name: Order
///     key: Id
///     properties:
///       - { name: Id, type: int32 }
///       - { name: CustomerId, type: int32 }
///   - name: PriorityOrder
///     base: Order             # Inherits Order's members and key
///     properties:
///       - { name: Rush, type: bool }
/// relationships:
///   - name: FK_Order_Customer
///     principal: Customer
///     dependent: Order
///     foreign_key: CustomerId
///     principal_navigation: Orders   # collection unless `unique: true`
///     dependent_navigation: Customer
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityModelConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    /// Only meaningful on hierarchy roots; subtypes inherit the root's key.
    #[serde(default)]
    pub key: Option<PropertyList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ScalarKind,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: String,
    pub principal: String,
    pub dependent: String,
    /// Foreign-key properties on the dependent, positionally matching the principal key
    pub foreign_key: PropertyList,
    /// Defaults to the principal's primary key
    #[serde(default)]
    pub principal_key: Option<PropertyList>,
    /// Navigation exposed on the principal
    #[serde(default)]
    pub principal_navigation: Option<String>,
    /// Reference navigation exposed on the dependent
    #[serde(default)]
    pub dependent_navigation: Option<String>,
    /// One-to-one: the principal navigation is a reference, not a collection
    #[serde(default)]
    pub unique: bool,
}

impl EntityModelConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::ParseError {
            error: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::read_error_with_path(path.as_ref(), e))?;
        Self::from_yaml_str(&content)
    }

    /// Validate the definitions and build the immutable model.
    pub fn build(&self) -> Result<EntityModel, CatalogError> {
        let mut entity_types: HashMap<String, EntityType> = HashMap::new();

        for def in &self.entities {
            if entity_types.contains_key(&def.name) {
                return Err(CatalogError::DuplicateEntityType {
                    entity_type: def.name.clone(),
                });
            }
            let properties = def
                .properties
                .iter()
                .map(|p| Property::new(&def.name, &p.name, p.value_type, p.nullable))
                .collect();
            entity_types.insert(
                def.name.clone(),
                EntityType {
                    name: def.name.clone(),
                    base_type: def.base.clone(),
                    properties,
                    primary_key: None,
                    navigations: Vec::new(),
                },
            );
        }

        check_hierarchies(&entity_types)?;

        // Keys resolve against the full hierarchy, so they are attached once every type is known
        let unkeyed = EntityModel::from_entity_types(entity_types.clone());
        for def in &self.entities {
            if let Some(names) = &def.key {
                let key = resolve_key(&unkeyed, &def.name, names)?;
                if let Some(ty) = entity_types.get_mut(&def.name) {
                    ty.primary_key = Some(key);
                }
            }
        }

        let keyed = EntityModel::from_entity_types(entity_types.clone());
        for rel in &self.relationships {
            for navigation in resolve_relationship(&keyed, rel)? {
                if let Some(ty) = entity_types.get_mut(&navigation.declaring_entity_type) {
                    ty.navigations.push(Arc::new(navigation));
                }
            }
        }
        let model = EntityModel::from_entity_types(entity_types);

        check_member_names(&model)?;

        log::debug!(
            "Built entity model {:?}: {} entity types, {} relationships",
            self.name,
            self.entities.len(),
            self.relationships.len()
        );
        Ok(model)
    }
}

impl EntityModel {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        EntityModelConfig::from_yaml_str(yaml)?.build()
    }

    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CatalogError> {
        EntityModelConfig::from_yaml_file(path)?.build()
    }
}

fn check_hierarchies(entity_types: &HashMap<String, EntityType>) -> Result<(), CatalogError> {
    for ty in entity_types.values() {
        let mut visited = HashSet::from([ty.name.as_str()]);
        let mut current = ty;
        while let Some(base) = current.base_type.as_deref() {
            let Some(base_type) = entity_types.get(base) else {
                return Err(CatalogError::EntityType {
                    entity_type: base.to_string(),
                });
            };
            if !visited.insert(base) {
                return Err(CatalogError::InheritanceCycle {
                    entity_type: ty.name.clone(),
                });
            }
            current = base_type;
        }
    }
    Ok(())
}

fn check_member_names(model: &EntityModel) -> Result<(), CatalogError> {
    for ty in model.entity_types() {
        let mut seen = HashSet::new();
        for ancestor in model.hierarchy(&ty.name) {
            let members = ancestor
                .properties
                .iter()
                .map(|p| p.name.as_str())
                .chain(ancestor.navigations.iter().map(|n| n.name.as_str()));
            for member in members {
                if !seen.insert(member) {
                    return Err(CatalogError::DuplicateMember {
                        entity_type: ty.name.clone(),
                        member: member.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn resolve_properties(
    model: &EntityModel,
    entity_type: &str,
    names: &PropertyList,
) -> Result<Vec<Property>, CatalogError> {
    names
        .names()
        .into_iter()
        .map(|name| {
            model
                .find_property(entity_type, name)
                .cloned()
                .ok_or_else(|| CatalogError::Property {
                    entity_type: entity_type.to_string(),
                    property: name.to_string(),
                })
        })
        .collect()
}

fn resolve_key(
    model: &EntityModel,
    entity_type: &str,
    names: &PropertyList,
) -> Result<Key, CatalogError> {
    Key::new(entity_type, resolve_properties(model, entity_type, names)?)
}

fn resolve_relationship(
    model: &EntityModel,
    rel: &RelationshipDefinition,
) -> Result<Vec<Navigation>, CatalogError> {
    model.entity_type(&rel.principal)?;
    model.entity_type(&rel.dependent)?;

    let principal_key = match &rel.principal_key {
        Some(names) => resolve_key(model, &rel.principal, names)?,
        None => model
            .primary_key(&rel.principal)
            .cloned()
            .ok_or_else(|| CatalogError::MissingPrincipalKey {
                relationship: rel.name.clone(),
                entity_type: rel.principal.clone(),
            })?,
    };
    let properties = resolve_properties(model, &rel.dependent, &rel.foreign_key)?;

    if properties.len() != principal_key.properties.len() {
        return Err(CatalogError::ForeignKeyArity {
            relationship: rel.name.clone(),
            dependent: properties.len(),
            principal: principal_key.properties.len(),
        });
    }
    for (dependent, principal) in properties.iter().zip(&principal_key.properties) {
        if dependent.value_type != principal.value_type {
            return Err(CatalogError::ForeignKeyType {
                relationship: rel.name.clone(),
                dependent_property: dependent.name.clone(),
                dependent_type: dependent.value_type.to_string(),
                principal_property: principal.name.clone(),
                principal_type: principal.value_type.to_string(),
            });
        }
    }

    let foreign_key = Arc::new(ForeignKey {
        name: rel.name.clone(),
        declaring_entity_type: rel.dependent.clone(),
        properties,
        principal_entity_type: rel.principal.clone(),
        principal_key,
    });

    let mut navigations = Vec::new();
    if let Some(name) = &rel.principal_navigation {
        navigations.push(Navigation {
            name: name.clone(),
            declaring_entity_type: rel.principal.clone(),
            target_entity_type: rel.dependent.clone(),
            is_collection: !rel.unique,
            foreign_key: foreign_key.clone(),
        });
    }
    if let Some(name) = &rel.dependent_navigation {
        navigations.push(Navigation {
            name: name.clone(),
            declaring_entity_type: rel.dependent.clone(),
            target_entity_type: rel.principal.clone(),
            is_collection: false,
            foreign_key,
        });
    }
    Ok(navigations)
}
