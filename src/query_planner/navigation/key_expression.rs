//! Key-read expressions over a target entity expression.
//!
//! A single-property key reads the property directly. A composite key becomes
//! a tuple of boxed property reads in declared key order; comparing two such
//! tuples element-wise is left to the predicate that consumes them.

use crate::{
    entity_catalog::{EntityModel, Property},
    query_planner::{
        errors::{RewriteError, RewriteResult},
        logical_expr::{Expr, ExprRef, ExprType},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyReadMode {
    /// Read every property directly off the target.
    #[default]
    Unconditional,
    /// Guard reads of properties declared on a strict subtype of the target's
    /// static type with a runtime type test.
    HierarchyGuarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyReadOptions {
    pub mode: KeyReadMode,
    /// Short-circuit to null when the target itself is null.
    pub null_guard: bool,
}

impl KeyReadOptions {
    pub fn hierarchy_guarded() -> Self {
        KeyReadOptions {
            mode: KeyReadMode::HierarchyGuarded,
            ..Default::default()
        }
    }

    pub fn with_null_guard(mut self) -> Self {
        self.null_guard = true;
        self
    }
}

pub struct KeyExpressionBuilder<'m> {
    model: &'m EntityModel,
}

impl<'m> KeyExpressionBuilder<'m> {
    pub fn new(model: &'m EntityModel) -> Self {
        KeyExpressionBuilder { model }
    }

    pub fn build(
        &self,
        target: &ExprRef,
        properties: &[Property],
        options: KeyReadOptions,
    ) -> RewriteResult<ExprRef> {
        let read = match properties {
            [] => {
                return Err(RewriteError::EmptyKey {
                    target: target.ty(),
                })
            }
            [property] => self.property_read(target, property, options.mode)?,
            composite => {
                let elements = composite
                    .iter()
                    .map(|property| {
                        let read = self.property_read(target, property, options.mode)?;
                        Ok(Expr::convert(read, ExprType::Object))
                    })
                    .collect::<RewriteResult<Vec<_>>>()?;
                Expr::tuple(elements)
            }
        };

        if options.null_guard {
            Ok(Expr::guard(Expr::is_not_null(target.clone()), read))
        } else {
            Ok(read)
        }
    }

    /// Read one property off `target`.
    ///
    /// In hierarchy-guarded mode a property declared on a strict subtype of
    /// the target's static type becomes
    /// `target is Subtype ? (T?) target.Property : null`.
    pub fn property_read(
        &self,
        target: &ExprRef,
        property: &Property,
        mode: KeyReadMode,
    ) -> RewriteResult<ExprRef> {
        let read = Expr::property_read(target.clone(), property);
        if mode == KeyReadMode::Unconditional {
            return Ok(read);
        }

        let target_type = target.ty();
        let Some(static_type) = target_type.entity_name() else {
            return Err(RewriteError::NonEntityTarget {
                property: property.name.clone(),
                found: target_type,
            });
        };
        if !self
            .model
            .is_strict_subtype(&property.declaring_entity_type, static_type)
        {
            return Ok(read);
        }

        log::trace!(
            "Guarding read of {}.{} through {}-typed target",
            property.declaring_entity_type,
            property.name,
            static_type
        );
        let widened = Expr::widen_to_nullable(read);
        let null = Expr::typed_null(widened.ty());
        Ok(Expr::conditional(
            Expr::type_test(target.clone(), &property.declaring_entity_type),
            widened,
            null,
        ))
    }
}
