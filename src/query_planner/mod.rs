use crate::entity_catalog::EntityModel;

use errors::RewriteResult;
use logical_expr::ExprRef;
use navigation::CollectionNavigationRewriting;
use rewrite_pass::RewritePass;

pub mod errors;
pub mod evaluator;
pub mod logical_expr;
pub mod navigation;
pub mod rewrite_pass;
pub mod transformed;

pub use errors::RewriteError;
pub use navigation::{count_collection_navigation_accesses, rewrite_collection_navigations};

/// Run every tree rewrite, in order, over a query tree.
pub fn rewrite_query(tree: ExprRef, model: &EntityModel) -> RewriteResult<ExprRef> {
    let passes: [&dyn RewritePass; 1] = [&CollectionNavigationRewriting];

    let mut tree = tree;
    for pass in passes {
        log::debug!("Running {}", pass.pass());
        tree = pass.rewrite(tree, model)?.into_inner();
    }
    Ok(tree)
}
