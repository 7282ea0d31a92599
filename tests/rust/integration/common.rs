use std::path::{Path, PathBuf};

use navrewrite::{
    entity_catalog::{EntityModel, ScalarKind},
    query_planner::logical_expr::{Expr, ExprRef, ExprType, Parameter, QueryOperator},
};

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn commerce_model() -> EntityModel {
    EntityModel::from_yaml_file(fixture_path("commerce_model.yaml"))
        .expect("commerce fixture should load")
}

pub fn param(name: &str, entity: &str) -> (Parameter, ExprRef) {
    let parameter = Parameter::new(name, ExprType::entity(entity));
    let reference = Expr::parameter(&parameter);
    (parameter, reference)
}

/// `owner.member` typed as a sequence of `element`.
pub fn collection(owner: ExprRef, member: &str, element: &str) -> ExprRef {
    Expr::member(owner, member, ExprType::sequence(ExprType::entity(element)))
}

pub fn reference(owner: ExprRef, member: &str, target: &str) -> ExprRef {
    Expr::member(owner, member, ExprType::entity(target))
}

pub fn count(source: ExprRef) -> ExprRef {
    Expr::call(
        QueryOperator::Count,
        vec![source],
        ExprType::scalar(ScalarKind::Int32, false),
    )
}

/// `project(entity_set<entity>, x => body)`
pub fn project_over(entity: &str, parameter: Parameter, body: ExprRef) -> ExprRef {
    let ty = ExprType::sequence(body.ty());
    Expr::call(
        QueryOperator::Project,
        vec![Expr::entity_set(entity), Expr::lambda(vec![parameter], body)],
        ty,
    )
}
