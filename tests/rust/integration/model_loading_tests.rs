use std::io::Write;

use navrewrite::entity_catalog::{CatalogError, EntityModel, ScalarKind};
use tempfile::NamedTempFile;

use super::common::commerce_model;

#[test]
fn test_fixture_navigations_resolve_both_ways() {
    let model = commerce_model();

    let orders = model.find_navigation("Customer", "Orders").unwrap();
    assert!(orders.is_collection);
    assert_eq!(orders.target_entity_type, "Order");
    assert_eq!(orders.foreign_key.name, "FK_Order_Customer");
    assert_eq!(orders.foreign_key.declaring_entity_type, "Order");

    let customer = model.find_navigation("Order", "Customer").unwrap();
    assert!(!customer.is_collection);
    assert_eq!(customer.foreign_key, orders.foreign_key);
}

#[test]
fn test_subtype_inherits_key_and_navigations() {
    let model = commerce_model();

    assert_eq!(
        model.primary_key("PriorityOrder").unwrap().property_names(),
        vec!["Id"]
    );
    assert!(model.find_navigation("PriorityOrder", "Shipments").is_some());
    assert!(model.find_navigation("Order", "Escalations").is_none());
    assert!(model.is_strict_subtype("PriorityOrder", "Order"));
}

#[test]
fn test_composite_foreign_key_pairs_with_principal_key() {
    let model = commerce_model();
    let invoices = model.find_navigation("Account", "Invoices").unwrap();
    let fk = &invoices.foreign_key;

    let dependent: Vec<&str> = fk.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(dependent, vec!["TenantId", "AccountId"]);
    assert_eq!(fk.principal_key.property_names(), vec!["TenantId", "Id"]);

    let nullable_order_id = model.find_property("Shipment", "OrderId").unwrap();
    assert_eq!(nullable_order_id.value_type, ScalarKind::Int32);
    assert!(nullable_order_id.nullable);
}

#[test]
fn test_model_file_with_mismatched_foreign_key_is_rejected() {
    let yaml = r#"
name: broken
entities:
  - name: Customer
    key: Id
    properties:
      - { name: Id, type: int32 }
  - name: Order
    key: Id
    properties:
      - { name: Id, type: int32 }
      - { name: CustomerId, type: string }
relationships:
  - name: FK_Order_Customer
    principal: Customer
    dependent: Order
    foreign_key: CustomerId
    principal_navigation: Orders
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let result = EntityModel::from_yaml_file(file.path());
    assert!(matches!(result, Err(CatalogError::ForeignKeyType { .. })));
}

#[test]
fn test_missing_model_file() {
    let result = EntityModel::from_yaml_file("/nonexistent/model.yaml");
    assert!(matches!(result, Err(CatalogError::ReadError { .. })));
}
