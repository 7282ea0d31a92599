use std::sync::Arc;

use navrewrite::{
    entity_catalog::ScalarKind,
    query_planner::{
        count_collection_navigation_accesses,
        logical_expr::{Expr, ExprType, Literal, QueryOperator},
        navigation::{correlation::build_correlation_predicate, CollectionNavigationRewriting},
        rewrite_collection_navigations, rewrite_query,
        rewrite_pass::{Pass, RewritePass},
        RewriteError,
    },
};

use super::common::{collection, commerce_model, count, param, project_over, reference};

#[test]
fn test_single_key_navigation_becomes_correlated_filter() {
    let model = commerce_model();
    let (_, c) = param("c", "Customer");

    let rewritten = rewrite_collection_navigations(&collection(c, "Orders", "Order"), &model).unwrap();

    assert_eq!(
        rewritten.to_string(),
        "filter(entity_set<Order>, o => ((c != null) && (c.Id == o.CustomerId)))"
    );
    assert_eq!(rewritten.ty(), ExprType::sequence(ExprType::entity("Order")));
}

#[test]
fn test_composite_key_compares_tuples_in_declared_order() {
    let model = commerce_model();
    let (_, a) = param("a", "Account");

    let rewritten =
        rewrite_collection_navigations(&collection(a, "Invoices", "Invoice"), &model).unwrap();

    assert_eq!(
        rewritten.to_string(),
        "filter(entity_set<Invoice>, i => ((a != null) && \
         (tuple(((object) a.TenantId), ((object) a.Id)) == \
         tuple(((object) i.TenantId), ((object) i.AccountId)))))"
    );
}

#[test]
fn test_chain_correlates_against_preceding_reference_navigation() {
    let model = commerce_model();
    let (line, l) = param("l", "OrderLine");
    let order = reference(l, "Order", "Order");
    let body = count(collection(order, "Shipments", "Shipment"));
    let query = project_over("OrderLine", line, body);

    let rewritten = rewrite_query(query, &model).unwrap();

    // Shipment.OrderId is nullable, so the owner's key is widened to match
    assert_eq!(
        rewritten.to_string(),
        "project(entity_set<OrderLine>, l => count(filter(entity_set<Shipment>, \
         s => ((l.Order != null) && (((int32?) l.Order.Id) == s.OrderId)))))"
    );
    assert_eq!(count_collection_navigation_accesses(&rewritten, &model), 0);
}

#[test]
fn test_navigation_declared_on_subtype() {
    let model = commerce_model();
    let (_, p) = param("p", "PriorityOrder");

    let rewritten =
        rewrite_collection_navigations(&collection(p, "Escalations", "Escalation"), &model)
            .unwrap();

    assert_eq!(
        rewritten.to_string(),
        "filter(entity_set<Escalation>, e => ((p != null) && (p.Id == e.PriorityOrderId)))"
    );
}

#[test]
fn test_nested_navigations_get_distinct_parameters() {
    let model = commerce_model();
    let (customer, c) = param("c", "Customer");
    let (order, o) = param("o", "Order");

    // c => count(filter(c.Orders, o => count(o.Lines) != 0))
    let has_lines = Expr::not_equal(
        count(collection(o, "Lines", "OrderLine")),
        Expr::constant(Literal::Integer(0), ExprType::scalar(ScalarKind::Int32, false)),
    );
    let orders_with_lines = Expr::filter(
        collection(c, "Orders", "Order"),
        Expr::lambda(vec![order], has_lines),
    );
    let query = project_over("Customer", customer, count(orders_with_lines));

    let rewritten = rewrite_query(query, &model).unwrap();

    assert_eq!(
        rewritten.to_string(),
        "project(entity_set<Customer>, c => count(filter(\
         filter(entity_set<Order>, o1 => ((c != null) && (c.Id == o1.CustomerId))), \
         o => (count(filter(entity_set<OrderLine>, o2 => ((o != null) && (o.Id == o2.OrderId)))) != 0))))"
    );
}

#[test]
fn test_rewrite_is_idempotent() {
    let model = commerce_model();
    let (customer, c) = param("c", "Customer");
    let query = project_over("Customer", customer, count(collection(c, "Orders", "Order")));
    assert_eq!(count_collection_navigation_accesses(&query, &model), 1);

    let once = rewrite_query(query, &model).unwrap();
    let twice = rewrite_collection_navigations(&once, &model).unwrap();

    assert!(Arc::ptr_eq(&once, &twice));
    assert_eq!(count_collection_navigation_accesses(&once, &model), 0);
}

#[test]
fn test_pass_reports_whether_anything_changed() {
    let model = commerce_model();
    let (_, c) = param("c", "Customer");
    let pass = CollectionNavigationRewriting;
    assert_eq!(pass.pass(), Pass::CollectionNavigationRewriting);

    let plain = Expr::member(c.clone(), "Name", ExprType::scalar(ScalarKind::String, true));
    assert!(!pass.rewrite(plain, &model).unwrap().is_yes());

    let navigation = collection(c, "Orders", "Order");
    assert!(pass.rewrite(navigation, &model).unwrap().is_yes());
}

#[test]
fn test_mistyped_navigation_access_is_an_error() {
    let model = commerce_model();
    let (_, c) = param("c", "Customer");
    // Orders typed as a single reference instead of a sequence
    let wrong = reference(c, "Orders", "Order");

    let result = rewrite_collection_navigations(&wrong, &model);
    assert!(matches!(result, Err(RewriteError::NavigationType { .. })));
}

#[test]
fn test_key_types_differing_beyond_nullability_are_rejected() {
    let (_, a) = param("a", "Account");
    let (_, i) = param("i", "Invoice");
    let outer = Expr::member(a.clone(), "Id", ExprType::scalar(ScalarKind::Int32, false));
    let inner = Expr::member(i, "Id", ExprType::scalar(ScalarKind::Int64, false));

    let result = build_correlation_predicate(&a, outer, inner);
    assert_eq!(
        result,
        Err(RewriteError::KeyTypeMismatch {
            outer: ExprType::scalar(ScalarKind::Int32, false),
            inner: ExprType::scalar(ScalarKind::Int64, false),
        })
    );
}

#[test]
fn test_malformed_flatten_fails_without_partial_output() {
    let model = commerce_model();
    let flatten = Expr::call(
        QueryOperator::Flatten,
        vec![Expr::entity_set("Customer")],
        ExprType::sequence(ExprType::entity("Customer")),
    );

    assert_eq!(
        rewrite_query(flatten, &model),
        Err(RewriteError::MalformedOperatorCall {
            operator: QueryOperator::Flatten,
            arity: 1,
        })
    );
}

#[test]
fn test_query_loaded_from_json() {
    let model = commerce_model();
    let json = std::fs::read_to_string(super::common::fixture_path("customer_order_counts.json"))
        .unwrap();
    let query: Expr = serde_json::from_str(&json).unwrap();

    let rewritten = rewrite_query(Arc::new(query), &model).unwrap();
    assert_eq!(
        rewritten.to_string(),
        "project(entity_set<Customer>, c => count(filter(entity_set<Order>, \
         o => ((c != null) && (c.Id == o.CustomerId)))))"
    );

    let round_tripped: Expr = serde_json::from_str(&serde_json::to_string(rewritten.as_ref()).unwrap()).unwrap();
    assert_eq!(&round_tripped, rewritten.as_ref());
}
