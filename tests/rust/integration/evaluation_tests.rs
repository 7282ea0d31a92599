//! Rewritten trees evaluated against the same in-memory data as the
//! original trees must yield the same results.

use navrewrite::{
    entity_catalog::{EntityModel, ScalarKind},
    query_planner::{
        evaluator::{EntityInstance, Environment, Evaluator, InMemoryStore, Value},
        logical_expr::{Expr, ExprRef, ExprType, QueryOperator},
        navigation::{KeyExpressionBuilder, KeyReadOptions},
        rewrite_query,
    },
};

use super::common::{collection, commerce_model, count, param, project_over, reference};

fn evaluate(model: &EntityModel, store: &InMemoryStore, expr: &ExprRef) -> Value {
    Evaluator::new(model, store)
        .evaluate(expr, &Environment::new())
        .unwrap()
}

fn int(i: i64) -> Value {
    Value::Integer(i)
}

fn ints(values: &[i64]) -> Value {
    Value::Sequence(values.iter().copied().map(Value::Integer).collect())
}

/// Three customers: two plain orders, one priority order, none.
fn customers_and_orders() -> InMemoryStore {
    let mut store = InMemoryStore::default();
    let o1 = store.insert(EntityInstance::new("Order").with("Id", int(1)).with("CustomerId", int(1)));
    let o2 = store.insert(EntityInstance::new("Order").with("Id", int(2)).with("CustomerId", int(1)));
    let o3 = store.insert(
        EntityInstance::new("PriorityOrder")
            .with("Id", int(3))
            .with("CustomerId", int(2))
            .with("Rush", Value::Bool(true)),
    );
    store.insert(
        EntityInstance::new("Customer")
            .with("Id", int(1))
            .with("Orders", Value::Sequence(vec![o1, o2])),
    );
    store.insert(
        EntityInstance::new("Customer")
            .with("Id", int(2))
            .with("Orders", Value::Sequence(vec![o3])),
    );
    store.insert(
        EntityInstance::new("Customer")
            .with("Id", int(3))
            .with("Orders", Value::Sequence(vec![])),
    );
    store
}

#[test]
fn test_rewritten_count_matches_navigation_count() {
    let model = commerce_model();
    let store = customers_and_orders();
    let (customer, c) = param("c", "Customer");
    let query = project_over("Customer", customer, count(collection(c, "Orders", "Order")));

    let rewritten = rewrite_query(query.clone(), &model).unwrap();

    assert_eq!(evaluate(&model, &store, &query), ints(&[2, 1, 0]));
    assert_eq!(evaluate(&model, &store, &rewritten), ints(&[2, 1, 0]));
}

#[test]
fn test_three_argument_flatten_result_selector_evaluates_the_same() {
    let model = commerce_model();
    let store = customers_and_orders();
    let (selector_customer, c) = param("c", "Customer");
    let (result_customer, rc) = param("c", "Customer");
    let (result_order, _) = param("o", "Order");
    let int32 = ExprType::scalar(ScalarKind::Int32, false);

    let query = Expr::call(
        QueryOperator::Flatten,
        vec![
            Expr::entity_set("Customer"),
            Expr::lambda(vec![selector_customer], collection(c, "Orders", "Order")),
            Expr::lambda(
                vec![result_customer, result_order],
                count(collection(rc, "Orders", "Order")),
            ),
        ],
        ExprType::sequence(int32),
    );

    let rewritten = rewrite_query(query.clone(), &model).unwrap();

    assert_eq!(evaluate(&model, &store, &query), ints(&[2, 2, 1]));
    assert_eq!(evaluate(&model, &store, &rewritten), ints(&[2, 2, 1]));
}

#[test]
fn test_null_owner_never_matches_null_foreign_key() {
    let model = commerce_model();
    let mut store = InMemoryStore::default();
    // An unassigned shipment and one shipped with order 1
    store.insert(EntityInstance::new("Shipment").with("Id", int(1)).with("OrderId", Value::Null));
    let shipped = store.insert(EntityInstance::new("Shipment").with("Id", int(2)).with("OrderId", int(1)));
    let order = store.insert(
        EntityInstance::new("Order")
            .with("Id", int(1))
            .with("CustomerId", int(1))
            .with("Shipments", Value::Sequence(vec![shipped])),
    );
    // A line whose order is not loaded, and one whose order is
    store.insert(
        EntityInstance::new("OrderLine")
            .with("OrderId", int(9))
            .with("LineNo", int(1))
            .with("Order", Value::Null),
    );
    store.insert(
        EntityInstance::new("OrderLine")
            .with("OrderId", int(1))
            .with("LineNo", int(1))
            .with("Order", order),
    );

    let (line, l) = param("l", "OrderLine");
    let query = project_over(
        "OrderLine",
        line,
        count(collection(reference(l.clone(), "Order", "Order"), "Shipments", "Shipment")),
    );
    let rewritten = rewrite_query(query.clone(), &model).unwrap();

    assert_eq!(evaluate(&model, &store, &query), ints(&[0, 1]));
    assert_eq!(evaluate(&model, &store, &rewritten), ints(&[0, 1]));

    // The same correlation without the owner check pairs the null owner with the unassigned shipment
    let (shipment, s) = param("s", "Shipment");
    let owner_key = Expr::widen_to_nullable(Expr::property_read(
        reference(l, "Order", "Order"),
        model.find_property("Order", "Id").unwrap(),
    ));
    let shipment_key = Expr::property_read(s, model.find_property("Shipment", "OrderId").unwrap());
    let (line, _) = param("l", "OrderLine");
    let unguarded = project_over(
        "OrderLine",
        line,
        count(Expr::filter(
            Expr::entity_set("Shipment"),
            Expr::lambda(vec![shipment], Expr::equal(owner_key, shipment_key)),
        )),
    );
    assert_eq!(evaluate(&model, &store, &unguarded), ints(&[1, 1]));
}

#[test]
fn test_composite_keys_match_position_by_position() {
    let model = commerce_model();
    let mut store = InMemoryStore::default();
    let invoice = |tenant: i64, account: i64| {
        EntityInstance::new("Invoice")
            .with("TenantId", int(tenant))
            .with("AccountId", int(account))
    };
    let i1 = store.insert(invoice(1, 1));
    let i2 = store.insert(invoice(2, 1));
    let i3 = store.insert(invoice(2, 1));
    // Belongs to neither account; would match account (2, 1) if key order were swapped
    store.insert(invoice(1, 2));
    store.insert(
        EntityInstance::new("Account")
            .with("TenantId", int(1))
            .with("Id", int(1))
            .with("Invoices", Value::Sequence(vec![i1])),
    );
    store.insert(
        EntityInstance::new("Account")
            .with("TenantId", int(2))
            .with("Id", int(1))
            .with("Invoices", Value::Sequence(vec![i2, i3])),
    );

    let (account, a) = param("a", "Account");
    let query = project_over("Account", account, count(collection(a, "Invoices", "Invoice")));
    let rewritten = rewrite_query(query.clone(), &model).unwrap();

    assert_eq!(evaluate(&model, &store, &query), ints(&[1, 2]));
    assert_eq!(evaluate(&model, &store, &rewritten), ints(&[1, 2]));
}

#[test]
fn test_hierarchy_guarded_key_read_over_mixed_entity_set() {
    let model = commerce_model();
    let store = customers_and_orders();
    let (order, o) = param("o", "Order");
    let rush = model.find_property("PriorityOrder", "Rush").unwrap().clone();

    let read = KeyExpressionBuilder::new(&model)
        .build(&o, &[rush], KeyReadOptions::hierarchy_guarded())
        .unwrap();
    let query = project_over("Order", order, read);

    assert_eq!(
        evaluate(&model, &store, &query),
        Value::Sequence(vec![Value::Null, Value::Null, Value::Bool(true)])
    );
}
