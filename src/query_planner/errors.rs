use thiserror::Error;

use crate::{
    entity_catalog::CatalogError,
    query_planner::logical_expr::{ExprType, QueryOperator},
};

/// Contract failures raised while rewriting a tree.
///
/// Every variant points at a defect in the entity model or in an earlier
/// compiler stage; none is recoverable by the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RewriteError {
    #[error("Key types differ beyond nullability: outer `{outer}`, inner `{inner}`")]
    KeyTypeMismatch { outer: ExprType, inner: ExprType },

    #[error("Key read on `{target}` names no properties")]
    EmptyKey { target: ExprType },

    /// Reported by binders that resolve chains from something other than the
    /// entity model; the model binder only binds navigations reachable from
    /// the owner's own hierarchy.
    #[error(
        "Navigation `{navigation}` is declared on `{declaring_entity_type}` but was reached from `{owner}`"
    )]
    NavigationChain {
        navigation: String,
        declaring_entity_type: String,
        owner: ExprType,
    },

    #[error("Member access `{member}` is typed `{declared}` but its navigation yields `{resolved}`")]
    NavigationType {
        member: String,
        declared: ExprType,
        resolved: ExprType,
    },

    #[error("Hierarchy-guarded read of `{property}` needs an entity-typed target, found `{found}`")]
    NonEntityTarget { property: String, found: ExprType },

    #[error("`{operator}` called with {arity} arguments")]
    MalformedOperatorCall {
        operator: QueryOperator,
        arity: usize,
    },

    #[error("Entity model: {0}")]
    Catalog(#[from] CatalogError),
}

pub type RewriteResult<T> = Result<T, RewriteError>;
