//! Navrewrite - collection-navigation rewriting for query expression trees
//!
//! This crate turns relationship-valued member accesses in a query tree into
//! explicit correlated sub-queries:
//! - Entity model definitions loaded from YAML
//! - Immutable, shared expression trees with identity-preserving rewrites
//! - The collection-navigation rewrite pass
//! - A reference evaluator for checking rewritten trees

pub mod utils;

pub mod config;
pub mod entity_catalog;
pub mod query_planner;
