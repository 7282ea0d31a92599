//! Static types carried by expression nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity_catalog::{Property, ScalarKind};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprType {
    /// A scalar value; `nullable` is the nullable wrapper of the same kind.
    Scalar { scalar: ScalarKind, nullable: bool },

    /// A reference to an instance of a mapped entity type (or one of its subtypes).
    Entity { name: String },

    /// A queryable sequence, e.g. a collection navigation or an entity set.
    Sequence { element: Box<ExprType> },

    /// An ordered tuple of boxed values, used for composite keys.
    Tuple { arity: usize },

    /// A boxed value of any type.
    Object,

    Function {
        params: Vec<ExprType>,
        result: Box<ExprType>,
    },
}

impl ExprType {
    pub fn scalar(scalar: ScalarKind, nullable: bool) -> Self {
        ExprType::Scalar { scalar, nullable }
    }

    pub fn boolean() -> Self {
        ExprType::scalar(ScalarKind::Bool, false)
    }

    pub fn entity(name: impl Into<String>) -> Self {
        ExprType::Entity { name: name.into() }
    }

    pub fn sequence(element: ExprType) -> Self {
        ExprType::Sequence {
            element: Box::new(element),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            ExprType::Scalar {
                scalar: ScalarKind::Bool,
                nullable: false
            }
        )
    }

    /// Reference-like types (entities, sequences, tuples, boxes) can always hold null.
    pub fn is_nullable(&self) -> bool {
        match self {
            ExprType::Scalar { nullable, .. } => *nullable,
            ExprType::Entity { .. }
            | ExprType::Sequence { .. }
            | ExprType::Tuple { .. }
            | ExprType::Object => true,
            ExprType::Function { .. } => false,
        }
    }

    /// The nullable counterpart; identity for types that already admit null.
    pub fn to_nullable(&self) -> ExprType {
        match self {
            ExprType::Scalar { scalar, .. } => ExprType::scalar(*scalar, true),
            other => other.clone(),
        }
    }

    /// True when both are the same scalar kind and only the nullable wrapper differs.
    pub fn differs_only_in_nullability(&self, other: &ExprType) -> bool {
        match (self, other) {
            (
                ExprType::Scalar {
                    scalar: left,
                    nullable: left_nullable,
                },
                ExprType::Scalar {
                    scalar: right,
                    nullable: right_nullable,
                },
            ) => left == right && left_nullable != right_nullable,
            _ => false,
        }
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            ExprType::Entity { name } => Some(name),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&ExprType> {
        match self {
            ExprType::Sequence { element } => Some(element),
            _ => None,
        }
    }
}

impl From<&Property> for ExprType {
    fn from(property: &Property) -> Self {
        ExprType::scalar(property.value_type, property.nullable)
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Scalar { scalar, nullable } => {
                write!(f, "{}", scalar)?;
                if *nullable {
                    f.write_str("?")?;
                }
                Ok(())
            }
            ExprType::Entity { name } => f.write_str(name),
            ExprType::Sequence { element } => write!(f, "seq<{}>", element),
            ExprType::Tuple { arity } => write!(f, "tuple/{}", arity),
            ExprType::Object => f.write_str("object"),
            ExprType::Function { params, result } => {
                f.write_str("fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", result)
            }
        }
    }
}
