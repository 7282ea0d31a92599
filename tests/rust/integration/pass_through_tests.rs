//! Sub-trees the rewrite must hand back untouched, by identity.

use std::sync::Arc;

use navrewrite::{
    entity_catalog::ScalarKind,
    query_planner::{
        count_collection_navigation_accesses,
        logical_expr::{Expr, ExprRef, ExprType, Literal, QueryOperator},
        rewrite_collection_navigations, rewrite_query,
    },
};

use super::common::{collection, commerce_model, count, param};

fn include_orders(operator: QueryOperator) -> ExprRef {
    let (customer, c) = param("c", "Customer");
    Expr::call(
        operator,
        vec![
            Expr::entity_set("Customer"),
            Expr::lambda(vec![customer], collection(c, "Orders", "Order")),
        ],
        ExprType::sequence(ExprType::entity("Customer")),
    )
}

/// `flatten(entity_set<Customer>, c => c.Orders[, result_selector])`
fn flatten_orders(result_selector: Option<ExprRef>) -> ExprRef {
    let (customer, c) = param("c", "Customer");
    let mut args = vec![
        Expr::entity_set("Customer"),
        Expr::lambda(vec![customer], collection(c, "Orders", "Order")),
    ];
    let ty = match &result_selector {
        Some(selector) => match selector.as_ref() {
            Expr::Lambda(lambda) => ExprType::sequence(lambda.body.ty()),
            _ => ExprType::Object,
        },
        None => ExprType::sequence(ExprType::entity("Order")),
    };
    args.extend(result_selector);
    Expr::call(QueryOperator::Flatten, args, ty)
}

#[test]
fn test_eager_load_directives_are_untouched() {
    let model = commerce_model();
    for operator in [QueryOperator::Include, QueryOperator::ThenInclude] {
        let query = include_orders(operator);
        let rewritten = rewrite_collection_navigations(&query, &model).unwrap();
        assert!(Arc::ptr_eq(&query, &rewritten), "{} was rewritten", operator);
    }
}

#[test]
fn test_two_argument_flatten_is_untouched() {
    let model = commerce_model();
    let query = flatten_orders(None);

    let rewritten = rewrite_collection_navigations(&query, &model).unwrap();
    assert!(Arc::ptr_eq(&query, &rewritten));
}

#[test]
fn test_three_argument_flatten_with_plain_result_selector_is_untouched() {
    let model = commerce_model();
    let (customer, _) = param("c", "Customer");
    let (order, o) = param("o", "Order");
    let query = flatten_orders(Some(Expr::lambda(vec![customer, order], o)));

    let rewritten = rewrite_collection_navigations(&query, &model).unwrap();
    assert!(Arc::ptr_eq(&query, &rewritten));
}

#[test]
fn test_three_argument_flatten_rewrites_only_result_selector() {
    let model = commerce_model();
    let (customer, c) = param("c", "Customer");
    let (order, _) = param("o", "Order");
    let query = flatten_orders(Some(Expr::lambda(
        vec![customer, order],
        count(collection(c, "Orders", "Order")),
    )));

    let rewritten = rewrite_collection_navigations(&query, &model).unwrap();

    let (Expr::OperatorCall(before), Expr::OperatorCall(after)) = (query.as_ref(), rewritten.as_ref())
    else {
        panic!("flatten stays an operator call");
    };
    assert_eq!(after.operator, QueryOperator::Flatten);
    assert!(Arc::ptr_eq(&before.args[0], &after.args[0]));
    assert!(Arc::ptr_eq(&before.args[1], &after.args[1]));
    assert_eq!(
        after.args[2].to_string(),
        "(c, o) => count(filter(entity_set<Order>, o1 => ((c != null) && (c.Id == o1.CustomerId))))"
    );
}

#[test]
fn test_untouched_shapes_count_no_remaining_navigations() {
    let model = commerce_model();
    for query in [
        include_orders(QueryOperator::Include),
        include_orders(QueryOperator::ThenInclude),
        flatten_orders(None),
    ] {
        let rewritten = rewrite_query(query.clone(), &model).unwrap();
        let again = rewrite_collection_navigations(&rewritten, &model).unwrap();

        assert!(Arc::ptr_eq(&again, &rewritten));
        assert_eq!(count_collection_navigation_accesses(&rewritten, &model), 0, "{}", query);
    }
}

#[test]
fn test_count_covers_only_the_flatten_result_selector() {
    let model = commerce_model();
    let (customer, c) = param("c", "Customer");
    let (order, _) = param("o", "Order");
    let query = flatten_orders(Some(Expr::lambda(
        vec![customer, order],
        count(collection(c, "Orders", "Order")),
    )));
    assert_eq!(count_collection_navigation_accesses(&query, &model), 1);

    let rewritten = rewrite_query(query, &model).unwrap();
    assert_eq!(count_collection_navigation_accesses(&rewritten, &model), 0);
}

#[test]
fn test_tree_without_navigations_keeps_identity() {
    let model = commerce_model();
    let (order, o) = param("o", "Order");
    let int32 = ExprType::scalar(ScalarKind::Int32, false);
    let query = Expr::filter(
        Expr::entity_set("Order"),
        Expr::lambda(
            vec![order],
            Expr::equal(
                Expr::member(o, "CustomerId", int32.clone()),
                Expr::constant(Literal::Integer(1), int32),
            ),
        ),
    );

    let rewritten = rewrite_query(query.clone(), &model).unwrap();
    assert!(Arc::ptr_eq(&query, &rewritten));
}

#[test]
fn test_unchanged_siblings_are_shared_with_the_input() {
    let model = commerce_model();
    let (customer, c) = param("c", "Customer");
    let name = Expr::member(c.clone(), "Name", ExprType::scalar(ScalarKind::String, true));
    let orders = count(collection(c, "Orders", "Order"));
    let body = Expr::tuple(vec![name.clone(), orders]);
    let query = Expr::lambda(vec![customer], body);

    let rewritten = rewrite_collection_navigations(&query, &model).unwrap();

    let Expr::Lambda(lambda) = rewritten.as_ref() else {
        panic!("still a lambda");
    };
    let Expr::Tuple(tuple) = lambda.body.as_ref() else {
        panic!("still a tuple");
    };
    assert!(Arc::ptr_eq(&tuple.elements[0], &name));
    assert!(!Arc::ptr_eq(&query, &rewritten));
}
