use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    entity_catalog::{EntityModel, Navigation},
    query_planner::{
        errors::{RewriteError, RewriteResult},
        logical_expr::{
            map_children,
            visitors::{walk_expression, ParameterNameCollector},
            Expr, ExprRef, ExprType, MemberAccess, OperatorCall, Parameter, QueryOperator,
        },
        transformed::Transformed,
    },
};

use super::{
    binder::{ModelNavigationBinder, NavigationBinder},
    correlation::build_correlation_predicate,
    key_expression::{KeyExpressionBuilder, KeyReadOptions},
};

/// Lambda parameter names that cannot capture anything already in the tree.
#[derive(Debug, Default)]
struct FreshParameterNames {
    taken: HashSet<String>,
}

impl FreshParameterNames {
    fn reserve_all_in(&mut self, expr: &Expr) {
        let mut collector = ParameterNameCollector::default();
        walk_expression(expr, &mut collector);
        self.taken.extend(collector.names);
    }

    /// `o`, `o1`, `o2`, ... from the entity type's lowercase initial.
    fn fresh_for(&mut self, entity_type: &str) -> String {
        let stem = entity_type
            .chars()
            .next()
            .map(|c| c.to_lowercase().to_string())
            .unwrap_or_else(|| "x".to_string());

        let mut name = stem.clone();
        let mut suffix = 1;
        while self.taken.contains(&name) {
            name = format!("{}{}", stem, suffix);
            suffix += 1;
        }
        self.taken.insert(name.clone());
        name
    }
}

/// Replaces collection-navigation member accesses with correlated
/// `filter(entity_set<T>, p => guard(owner != null, owner_key == p_key))`
/// sub-queries.
///
/// Dispatch, in precedence order:
/// 1. eager-load directives (`include`, `then_include`) are left alone;
/// 2. three-argument `flatten` only has its result selector visited, since its
///    source and collection selector already express the correlation;
/// 3. two-argument `flatten` is left alone;
/// 4. member accesses bound to a collection navigation are rewritten;
/// 5. everything else is visited structurally.
pub struct CollectionNavigationRewriter<'m, B = ModelNavigationBinder> {
    model: &'m EntityModel,
    binder: B,
    parameter_names: FreshParameterNames,
    rewrites: usize,
}

impl<'m> CollectionNavigationRewriter<'m, ModelNavigationBinder> {
    pub fn new(model: &'m EntityModel) -> Self {
        Self::with_binder(model, ModelNavigationBinder)
    }
}

impl<'m, B: NavigationBinder> CollectionNavigationRewriter<'m, B> {
    pub fn with_binder(model: &'m EntityModel, binder: B) -> Self {
        CollectionNavigationRewriter {
            model,
            binder,
            parameter_names: FreshParameterNames::default(),
            rewrites: 0,
        }
    }

    /// Number of navigation accesses replaced so far.
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    pub fn rewrite(&mut self, expr: &ExprRef) -> RewriteResult<Transformed<ExprRef>> {
        self.parameter_names.reserve_all_in(expr);
        self.visit(expr)
    }

    fn visit(&mut self, expr: &ExprRef) -> RewriteResult<Transformed<ExprRef>> {
        match expr.as_ref() {
            Expr::OperatorCall(call) if call.operator.is_eager_load() => {
                log::trace!("Leaving eager-load directive `{}` untouched", call.operator);
                Ok(Transformed::No(expr.clone()))
            }
            Expr::OperatorCall(call) if call.operator == QueryOperator::Flatten => {
                self.visit_flatten(expr, call)
            }
            Expr::MemberAccess(member) => self.visit_member_access(expr, member),
            _ => map_children(expr, |child| self.visit(child)),
        }
    }

    fn visit_flatten(
        &mut self,
        expr: &ExprRef,
        call: &OperatorCall,
    ) -> RewriteResult<Transformed<ExprRef>> {
        match call.args.as_slice() {
            [source, collection_selector, result_selector] => {
                match self.visit(result_selector)? {
                    Transformed::Yes(result_selector) => {
                        Ok(Transformed::Yes(Arc::new(Expr::OperatorCall(OperatorCall {
                            operator: call.operator,
                            args: vec![
                                source.clone(),
                                collection_selector.clone(),
                                result_selector,
                            ],
                            ty: call.ty.clone(),
                        }))))
                    }
                    Transformed::No(_) => Ok(Transformed::No(expr.clone())),
                }
            }
            [_, _] => {
                log::trace!("Leaving two-argument flatten untouched");
                Ok(Transformed::No(expr.clone()))
            }
            args => Err(RewriteError::MalformedOperatorCall {
                operator: call.operator,
                arity: args.len(),
            }),
        }
    }

    fn visit_member_access(
        &mut self,
        expr: &ExprRef,
        member: &MemberAccess,
    ) -> RewriteResult<Transformed<ExprRef>> {
        let binding = self.binder.bind(member, self.model)?;
        match binding.terminal_collection() {
            Some(navigation) => {
                let navigation = navigation.clone();
                self.rewrite_collection_navigation(member, &navigation)
                    .map(Transformed::Yes)
            }
            None => map_children(expr, |child| self.visit(child)),
        }
    }

    /// Only the terminal hop becomes a sub-query; leading scalar hops stay in
    /// the owner expression, which is visited first. The sub-query built here
    /// is not visited again.
    fn rewrite_collection_navigation(
        &mut self,
        member: &MemberAccess,
        navigation: &Navigation,
    ) -> RewriteResult<ExprRef> {
        let owner = self.visit(&member.target)?.into_inner();
        let foreign_key = &navigation.foreign_key;
        let element_type = &foreign_key.declaring_entity_type;
        let keys = KeyExpressionBuilder::new(self.model);

        let entity_set = Expr::entity_set(element_type);
        let outer_key = keys.build(
            &owner,
            &foreign_key.principal_key.properties,
            KeyReadOptions::default(),
        )?;

        let parameter = Parameter::new(
            self.parameter_names.fresh_for(element_type),
            ExprType::entity(element_type),
        );
        let inner_key = keys.build(
            &Expr::parameter(&parameter),
            &foreign_key.properties,
            KeyReadOptions::default(),
        )?;

        let predicate = build_correlation_predicate(&owner, outer_key, inner_key)?;
        let rewritten = Expr::filter(entity_set, Expr::lambda(vec![parameter], predicate));

        self.rewrites += 1;
        log::debug!(
            "Rewrote navigation {}.{} via {}: {}",
            navigation.declaring_entity_type,
            navigation.name,
            foreign_key.name,
            rewritten
        );
        Ok(rewritten)
    }
}
