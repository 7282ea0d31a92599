//! Null-safe correlation predicate between an owner's key and a related row's key.

use crate::query_planner::{
    errors::{RewriteError, RewriteResult},
    logical_expr::{Expr, ExprRef},
};

/// Bring both key expressions to one comparable type.
///
/// Foreign-key metadata guarantees the two sides differ at most in
/// nullability; the non-nullable side is widened. Any other mismatch is a
/// model defect and is reported, never cast away.
pub fn reconcile_key_types(outer: ExprRef, inner: ExprRef) -> RewriteResult<(ExprRef, ExprRef)> {
    let outer_type = outer.ty();
    let inner_type = inner.ty();
    if outer_type == inner_type {
        return Ok((outer, inner));
    }
    if !outer_type.differs_only_in_nullability(&inner_type) {
        return Err(RewriteError::KeyTypeMismatch {
            outer: outer_type,
            inner: inner_type,
        });
    }

    if outer_type.is_nullable() {
        Ok((outer, Expr::convert(inner, outer_type)))
    } else {
        Ok((Expr::convert(outer, inner_type), inner))
    }
}

/// `guard(owner != null, outer_key == inner_key)`
///
/// The equality only counts when the owner is present: a null owner yields
/// `false`, so it can never match a row whose foreign key is itself null.
pub fn build_correlation_predicate(
    owner: &ExprRef,
    outer_key: ExprRef,
    inner_key: ExprRef,
) -> RewriteResult<ExprRef> {
    let (outer_key, inner_key) = reconcile_key_types(outer_key, inner_key)?;
    Ok(Expr::guard(
        Expr::is_not_null(owner.clone()),
        Expr::equal(outer_key, inner_key),
    ))
}
