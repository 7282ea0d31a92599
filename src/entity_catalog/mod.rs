pub mod config;
pub mod entity_model;
pub mod errors;


pub use config::{EntityModelConfig, PropertyList};
pub use entity_model::{EntityModel, EntityType, ForeignKey, Key, Navigation, Property, ScalarKind};
pub use errors::CatalogError;
