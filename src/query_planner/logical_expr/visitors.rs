//! Expression Visitor Pattern
//!
//! Read-only traversal of [`Expr`] trees. Implementors override the `visit_*`
//! hooks they care about; [`walk_expression`] handles the descent, so passes
//! that only need to *inspect* a tree don't each re-implement the recursion.
//!
//! # Example
//!
//! ```ignore
//! use crate::query_planner::logical_expr::visitors::{ExpressionVisitor, walk_expression};
//!
//! struct MemberCollector {
//!     members: Vec<String>,
//! }
//!
//! impl ExpressionVisitor for MemberCollector {
//!     fn visit_member_access(&mut self, member: &MemberAccess) {
//!         self.members.push(member.member.clone());
//!     }
//! }
//!
//! let mut collector = MemberCollector { members: vec![] };
//! walk_expression(&expr, &mut collector);
//! ```

use super::{Expr, Lambda, MemberAccess, OperatorCall, Parameter};

/// Trait for visiting Expr nodes.
///
/// Hooks are called before the node's children are walked. The default
/// implementations do nothing.
pub trait ExpressionVisitor {
    /// Called for each member access (e.g. `c.Orders`)
    fn visit_member_access(&mut self, _member: &MemberAccess) {}

    /// Called for each query operator application
    fn visit_operator_call(&mut self, _call: &OperatorCall) {}

    /// Called for each lambda, before its body
    fn visit_lambda(&mut self, _lambda: &Lambda) {}

    /// Called for each parameter reference
    fn visit_parameter(&mut self, _parameter: &Parameter) {}
}

/// Walk an expression tree depth-first, calling visitor hooks for each node.
pub fn walk_expression<V: ExpressionVisitor>(expr: &Expr, visitor: &mut V) {
    match expr {
        Expr::MemberAccess(member) => visitor.visit_member_access(member),
        Expr::OperatorCall(call) => visitor.visit_operator_call(call),
        Expr::Lambda(lambda) => visitor.visit_lambda(lambda),
        Expr::Parameter(parameter) => visitor.visit_parameter(parameter),
        _ => {}
    }
    for child in expr.children() {
        walk_expression(child, visitor);
    }
}

/// Every parameter name declared by a lambda or referenced anywhere in a tree.
#[derive(Debug, Default)]
pub struct ParameterNameCollector {
    pub names: std::collections::HashSet<String>,
}

impl ExpressionVisitor for ParameterNameCollector {
    fn visit_lambda(&mut self, lambda: &Lambda) {
        self.names
            .extend(lambda.params.iter().map(|p| p.name.clone()));
    }

    fn visit_parameter(&mut self, parameter: &Parameter) {
        self.names.insert(parameter.name.clone());
    }
}
