use std::fmt::Display;

use crate::{
    entity_catalog::EntityModel,
    query_planner::{errors::RewriteResult, logical_expr::ExprRef, transformed::Transformed},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    CollectionNavigationRewriting,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::CollectionNavigationRewriting => write!(f, "CollectionNavigationRewriting"),
        }
    }
}

pub trait RewritePass {
    fn pass(&self) -> Pass;

    fn rewrite(&self, tree: ExprRef, model: &EntityModel)
        -> RewriteResult<Transformed<ExprRef>>;
}
