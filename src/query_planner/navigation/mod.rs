//! Collection-navigation rewriting.
//!
//! Turns `owner.Collection` member accesses into explicit correlated
//! sub-queries over the related entity set, so later stages only ever see a
//! filtered entity set instead of relationship-valued members.
//!
//! ```text
//! c.Orders  =>  filter(entity_set<Order>, o => ((c != null) && (c.Id == o.CustomerId)))
//! ```
//!
//! # Components
//!
//! - [`binder`]: resolves a member-access chain to the navigations it walks
//! - [`key_expression`]: builds single or composite key reads, optionally
//!   hierarchy- and null-guarded
//! - [`correlation`]: reconciles key types and builds the guarded equality
//! - [`rewriter`]: the traversal, with its pass-through rules

pub mod binder;
pub mod correlation;
pub mod key_expression;
pub mod rewriter;

pub use binder::{ModelNavigationBinder, NavigationBinder, NavigationBinding};
pub use key_expression::{KeyExpressionBuilder, KeyReadMode, KeyReadOptions};
pub use rewriter::CollectionNavigationRewriter;

use crate::{
    entity_catalog::EntityModel,
    query_planner::{
        errors::RewriteResult,
        logical_expr::{Expr, ExprRef, MemberAccess, QueryOperator},
        rewrite_pass::{Pass, RewritePass},
        transformed::Transformed,
    },
};

/// Rewrite every collection-navigation access in `tree`.
///
/// Sub-trees without such accesses come back as the very same `Arc`s.
pub fn rewrite_collection_navigations(
    tree: &ExprRef,
    model: &EntityModel,
) -> RewriteResult<ExprRef> {
    CollectionNavigationRewriting
        .rewrite(tree.clone(), model)
        .map(Transformed::into_inner)
}

/// The collection-navigation rewrite as a pipeline pass.
pub struct CollectionNavigationRewriting;

impl RewritePass for CollectionNavigationRewriting {
    fn pass(&self) -> Pass {
        Pass::CollectionNavigationRewriting
    }

    fn rewrite(
        &self,
        tree: ExprRef,
        model: &EntityModel,
    ) -> RewriteResult<Transformed<ExprRef>> {
        let mut rewriter = CollectionNavigationRewriter::new(model);
        let transformed = rewriter.rewrite(&tree)?;
        log::info!(
            "{}: {} navigation access(es) rewritten",
            self.pass(),
            rewriter.rewrites()
        );
        Ok(transformed)
    }
}

fn is_collection_navigation(member: &MemberAccess, model: &EntityModel) -> bool {
    member
        .target
        .ty()
        .entity_name()
        .and_then(|owner| model.find_navigation(owner, &member.member))
        .is_some_and(|navigation| navigation.is_collection)
}

/// Number of collection-navigation accesses the rewrite would still replace.
///
/// Follows the rewriter's dispatch: eager-load calls and two-argument
/// `flatten` are not descended into, and of a three-argument `flatten` only
/// the result selector is counted.
pub fn count_collection_navigation_accesses(tree: &Expr, model: &EntityModel) -> usize {
    match tree {
        Expr::OperatorCall(call) if call.operator.is_eager_load() => 0,
        Expr::OperatorCall(call) if call.operator == QueryOperator::Flatten => {
            match call.args.as_slice() {
                [_, _, result_selector] => {
                    count_collection_navigation_accesses(result_selector, model)
                }
                _ => 0,
            }
        }
        Expr::MemberAccess(member) if is_collection_navigation(member, model) => {
            1 + count_collection_navigation_accesses(&member.target, model)
        }
        _ => tree
            .children()
            .into_iter()
            .map(|child| count_collection_navigation_accesses(child, model))
            .sum(),
    }
}
