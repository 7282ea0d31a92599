//! Query expression tree consumed and produced by the rewrite passes.
//!
//! Nodes are immutable and shared through [`ExprRef`] (`Arc<Expr>`). A pass
//! that leaves a sub-tree alone hands back the same `Arc`, so "did anything
//! change" is a pointer comparison (`Arc::ptr_eq`) all the way down.

use crate::entity_catalog::Property;
use crate::query_planner::transformed::Transformed;
use crate::utils::serde_shared::{arc, arc_vec};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

pub mod expr_type;
pub mod visitors;

pub use expr_type::ExprType;

pub type ExprRef = Arc<Expr>;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    /// A literal value; a typed null is a `Null` literal with a nullable type.
    Constant(Constant),

    /// A lambda parameter reference (e.g. `o` in `o => o.Total`).
    Parameter(Parameter),

    /// Member access as written in the query (e.g. `c.Orders`, `o.Customer`).
    /// May name a navigation, a mapped property or an unrelated member.
    MemberAccess(MemberAccess),

    /// Typed read of a mapped property, produced by key construction.
    PropertyRead(PropertyRead),

    /// Query operator application (e.g. `filter(source, predicate)`).
    OperatorCall(OperatorCall),

    Lambda(Lambda),

    /// `test ? if_true : if_false`
    Conditional(Conditional),

    /// Evaluates `condition` first and `payload` only when it holds;
    /// otherwise `false` for a boolean payload and `null` for any other.
    Guard(Guard),

    /// Runtime check that `target` is an instance of `entity_type` (or a subtype).
    TypeTest(TypeTest),

    /// Boxing or nullable widening.
    Convert(Convert),

    /// Fixed-arity ordered tuple of boxed values.
    Tuple(TupleExpr),

    Binary(BinaryExpr),

    /// Unfiltered scan over every instance of an entity type.
    EntitySet(EntitySet),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub value: Literal,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: ExprType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: ExprType) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MemberAccess {
    #[serde(with = "arc")]
    pub target: ExprRef,
    pub member: String,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PropertyRead {
    #[serde(with = "arc")]
    pub target: ExprRef,
    pub property: String,
    pub declaring_entity_type: String,
    pub ty: ExprType,
}

/// Closed set of query operators the passes recognise by tag.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperator {
    /// `filter(source, predicate)`
    Filter,
    /// `project(source, selector)`
    Project,
    /// `flatten(source, collection_selector)` or
    /// `flatten(source, collection_selector, result_selector)`
    Flatten,
    /// `any(source)` or `any(source, predicate)`
    Any,
    /// `count(source)` or `count(source, predicate)`
    Count,
    /// Eager-load directive, `include(source, navigation_path)`
    Include,
    /// Eager-load directive, `then_include(source, navigation_path)`
    ThenInclude,
}

impl QueryOperator {
    pub fn is_eager_load(self) -> bool {
        matches!(self, QueryOperator::Include | QueryOperator::ThenInclude)
    }

    pub fn name(self) -> &'static str {
        match self {
            QueryOperator::Filter => "filter",
            QueryOperator::Project => "project",
            QueryOperator::Flatten => "flatten",
            QueryOperator::Any => "any",
            QueryOperator::Count => "count",
            QueryOperator::Include => "include",
            QueryOperator::ThenInclude => "then_include",
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OperatorCall {
    pub operator: QueryOperator,
    #[serde(with = "arc_vec")]
    pub args: Vec<ExprRef>,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    #[serde(with = "arc")]
    pub body: ExprRef,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Conditional {
    #[serde(with = "arc")]
    pub test: ExprRef,
    #[serde(with = "arc")]
    pub if_true: ExprRef,
    #[serde(with = "arc")]
    pub if_false: ExprRef,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Guard {
    #[serde(with = "arc")]
    pub condition: ExprRef,
    #[serde(with = "arc")]
    pub payload: ExprRef,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TypeTest {
    #[serde(with = "arc")]
    pub target: ExprRef,
    pub entity_type: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Convert {
    #[serde(with = "arc")]
    pub operand: ExprRef,
    pub ty: ExprType,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TupleExpr {
    #[serde(with = "arc_vec")]
    pub elements: Vec<ExprRef>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    AndAlso,
    OrElse,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::AndAlso => "&&",
            BinaryOperator::OrElse => "||",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub operator: BinaryOperator,
    #[serde(with = "arc")]
    pub left: ExprRef,
    #[serde(with = "arc")]
    pub right: ExprRef,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    pub entity_type: String,
}

impl Expr {
    pub fn ty(&self) -> ExprType {
        match self {
            Expr::Constant(c) => c.ty.clone(),
            Expr::Parameter(p) => p.ty.clone(),
            Expr::MemberAccess(m) => m.ty.clone(),
            Expr::PropertyRead(p) => p.ty.clone(),
            Expr::OperatorCall(c) => c.ty.clone(),
            Expr::Lambda(l) => ExprType::Function {
                params: l.params.iter().map(|p| p.ty.clone()).collect(),
                result: Box::new(l.body.ty()),
            },
            Expr::Conditional(c) => c.ty.clone(),
            Expr::Guard(g) => g.ty.clone(),
            Expr::TypeTest(_) | Expr::Binary(_) => ExprType::boolean(),
            Expr::Convert(c) => c.ty.clone(),
            Expr::Tuple(t) => ExprType::Tuple {
                arity: t.elements.len(),
            },
            Expr::EntitySet(s) => ExprType::sequence(ExprType::entity(&s.entity_type)),
        }
    }

    /// Direct sub-expressions, in evaluation order.
    pub fn children(&self) -> Vec<&ExprRef> {
        match self {
            Expr::Constant(_) | Expr::Parameter(_) | Expr::EntitySet(_) => vec![],
            Expr::MemberAccess(m) => vec![&m.target],
            Expr::PropertyRead(p) => vec![&p.target],
            Expr::OperatorCall(c) => c.args.iter().collect(),
            Expr::Lambda(l) => vec![&l.body],
            Expr::Conditional(c) => vec![&c.test, &c.if_true, &c.if_false],
            Expr::Guard(g) => vec![&g.condition, &g.payload],
            Expr::TypeTest(t) => vec![&t.target],
            Expr::Convert(c) => vec![&c.operand],
            Expr::Tuple(t) => t.elements.iter().collect(),
            Expr::Binary(b) => vec![&b.left, &b.right],
        }
    }

    /// Longest root-to-leaf path, counting nodes.
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn constant(value: Literal, ty: ExprType) -> ExprRef {
        Arc::new(Expr::Constant(Constant { value, ty }))
    }

    pub fn typed_null(ty: ExprType) -> ExprRef {
        Expr::constant(Literal::Null, ty.to_nullable())
    }

    pub fn parameter(parameter: &Parameter) -> ExprRef {
        Arc::new(Expr::Parameter(parameter.clone()))
    }

    pub fn member(target: ExprRef, member: impl Into<String>, ty: ExprType) -> ExprRef {
        Arc::new(Expr::MemberAccess(MemberAccess {
            target,
            member: member.into(),
            ty,
        }))
    }

    pub fn property_read(target: ExprRef, property: &Property) -> ExprRef {
        Arc::new(Expr::PropertyRead(PropertyRead {
            target,
            property: property.name.clone(),
            declaring_entity_type: property.declaring_entity_type.clone(),
            ty: ExprType::from(property),
        }))
    }

    pub fn call(operator: QueryOperator, args: Vec<ExprRef>, ty: ExprType) -> ExprRef {
        Arc::new(Expr::OperatorCall(OperatorCall { operator, args, ty }))
    }

    /// `filter(source, predicate)`, typed like its source.
    pub fn filter(source: ExprRef, predicate: ExprRef) -> ExprRef {
        let ty = source.ty();
        Expr::call(QueryOperator::Filter, vec![source, predicate], ty)
    }

    pub fn lambda(params: Vec<Parameter>, body: ExprRef) -> ExprRef {
        Arc::new(Expr::Lambda(Lambda { params, body }))
    }

    pub fn conditional(test: ExprRef, if_true: ExprRef, if_false: ExprRef) -> ExprRef {
        let ty = if_true.ty();
        Arc::new(Expr::Conditional(Conditional {
            test,
            if_true,
            if_false,
            ty,
        }))
    }

    /// Non-boolean payloads are widened to nullable so the "condition failed"
    /// outcome (null) is representable.
    pub fn guard(condition: ExprRef, payload: ExprRef) -> ExprRef {
        let payload = if payload.ty().is_boolean() {
            payload
        } else {
            Expr::widen_to_nullable(payload)
        };
        let ty = payload.ty();
        Arc::new(Expr::Guard(Guard {
            condition,
            payload,
            ty,
        }))
    }

    pub fn type_test(target: ExprRef, entity_type: impl Into<String>) -> ExprRef {
        Arc::new(Expr::TypeTest(TypeTest {
            target,
            entity_type: entity_type.into(),
        }))
    }

    pub fn convert(operand: ExprRef, ty: ExprType) -> ExprRef {
        Arc::new(Expr::Convert(Convert { operand, ty }))
    }

    /// Returns `operand` itself when its type already admits null.
    pub fn widen_to_nullable(operand: ExprRef) -> ExprRef {
        let ty = operand.ty();
        if ty.is_nullable() {
            operand
        } else {
            Expr::convert(operand, ty.to_nullable())
        }
    }

    pub fn tuple(elements: Vec<ExprRef>) -> ExprRef {
        Arc::new(Expr::Tuple(TupleExpr { elements }))
    }

    pub fn binary(operator: BinaryOperator, left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expr::Binary(BinaryExpr {
            operator,
            left,
            right,
        }))
    }

    pub fn equal(left: ExprRef, right: ExprRef) -> ExprRef {
        Expr::binary(BinaryOperator::Equal, left, right)
    }

    pub fn not_equal(left: ExprRef, right: ExprRef) -> ExprRef {
        Expr::binary(BinaryOperator::NotEqual, left, right)
    }

    pub fn and_also(left: ExprRef, right: ExprRef) -> ExprRef {
        Expr::binary(BinaryOperator::AndAlso, left, right)
    }

    /// `target != null`, with the null typed like the target.
    pub fn is_not_null(target: ExprRef) -> ExprRef {
        let null = Expr::typed_null(target.ty());
        Expr::not_equal(target, null)
    }

    pub fn entity_set(entity_type: impl Into<String>) -> ExprRef {
        Arc::new(Expr::EntitySet(EntitySet {
            entity_type: entity_type.into(),
        }))
    }
}

fn apply_to_child<E, F>(child: &ExprRef, f: &mut F, changed: &mut bool) -> Result<ExprRef, E>
where
    F: FnMut(&ExprRef) -> Result<Transformed<ExprRef>, E>,
{
    let transformed = f(child)?;
    *changed |= transformed.is_yes();
    Ok(transformed.into_inner())
}

/// Apply `f` to every direct child of `node`.
///
/// The node is rebuilt only if `f` reported at least one child as
/// transformed; otherwise the original `Arc` is returned.
pub fn map_children<E, F>(node: &ExprRef, mut f: F) -> Result<Transformed<ExprRef>, E>
where
    F: FnMut(&ExprRef) -> Result<Transformed<ExprRef>, E>,
{
    let mut changed = false;
    let rebuilt = match node.as_ref() {
        Expr::Constant(_) | Expr::Parameter(_) | Expr::EntitySet(_) => {
            return Ok(Transformed::No(node.clone()));
        }
        Expr::MemberAccess(m) => Expr::MemberAccess(MemberAccess {
            target: apply_to_child(&m.target, &mut f, &mut changed)?,
            ..m.clone()
        }),
        Expr::PropertyRead(p) => Expr::PropertyRead(PropertyRead {
            target: apply_to_child(&p.target, &mut f, &mut changed)?,
            ..p.clone()
        }),
        Expr::OperatorCall(c) => Expr::OperatorCall(OperatorCall {
            operator: c.operator,
            args: c
                .args
                .iter()
                .map(|arg| apply_to_child(arg, &mut f, &mut changed))
                .collect::<Result<Vec<_>, E>>()?,
            ty: c.ty.clone(),
        }),
        Expr::Lambda(l) => Expr::Lambda(Lambda {
            params: l.params.clone(),
            body: apply_to_child(&l.body, &mut f, &mut changed)?,
        }),
        Expr::Conditional(c) => Expr::Conditional(Conditional {
            test: apply_to_child(&c.test, &mut f, &mut changed)?,
            if_true: apply_to_child(&c.if_true, &mut f, &mut changed)?,
            if_false: apply_to_child(&c.if_false, &mut f, &mut changed)?,
            ty: c.ty.clone(),
        }),
        Expr::Guard(g) => Expr::Guard(Guard {
            condition: apply_to_child(&g.condition, &mut f, &mut changed)?,
            payload: apply_to_child(&g.payload, &mut f, &mut changed)?,
            ty: g.ty.clone(),
        }),
        Expr::TypeTest(t) => Expr::TypeTest(TypeTest {
            target: apply_to_child(&t.target, &mut f, &mut changed)?,
            entity_type: t.entity_type.clone(),
        }),
        Expr::Convert(c) => Expr::Convert(Convert {
            operand: apply_to_child(&c.operand, &mut f, &mut changed)?,
            ty: c.ty.clone(),
        }),
        Expr::Tuple(t) => Expr::Tuple(TupleExpr {
            elements: t
                .elements
                .iter()
                .map(|element| apply_to_child(element, &mut f, &mut changed))
                .collect::<Result<Vec<_>, E>>()?,
        }),
        Expr::Binary(b) => Expr::Binary(BinaryExpr {
            operator: b.operator,
            left: apply_to_child(&b.left, &mut f, &mut changed)?,
            right: apply_to_child(&b.right, &mut f, &mut changed)?,
        }),
    };

    if changed {
        Ok(Transformed::Yes(Arc::new(rebuilt)))
    } else {
        Ok(Transformed::No(node.clone()))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[ExprRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{}", c.value),
            Expr::Parameter(p) => f.write_str(&p.name),
            Expr::MemberAccess(m) => write!(f, "{}.{}", m.target, m.member),
            Expr::PropertyRead(p) => write!(f, "{}.{}", p.target, p.property),
            Expr::OperatorCall(c) => {
                write!(f, "{}(", c.operator)?;
                write_list(f, &c.args)?;
                f.write_str(")")
            }
            Expr::Lambda(l) => {
                if let [param] = l.params.as_slice() {
                    write!(f, "{} => {}", param.name, l.body)
                } else {
                    let names: Vec<&str> = l.params.iter().map(|p| p.name.as_str()).collect();
                    write!(f, "({}) => {}", names.join(", "), l.body)
                }
            }
            Expr::Conditional(c) => write!(f, "({} ? {} : {})", c.test, c.if_true, c.if_false),
            Expr::Guard(g) if g.ty.is_boolean() => write!(f, "({} && {})", g.condition, g.payload),
            Expr::Guard(g) => write!(f, "({} ? {} : null)", g.condition, g.payload),
            Expr::TypeTest(t) => write!(f, "({} is {})", t.target, t.entity_type),
            Expr::Convert(c) => write!(f, "(({}) {})", c.ty, c.operand),
            Expr::Tuple(t) => {
                f.write_str("tuple(")?;
                write_list(f, &t.elements)?;
                f.write_str(")")
            }
            Expr::Binary(b) => write!(f, "({} {} {})", b.left, b.operator.symbol(), b.right),
            Expr::EntitySet(s) => write!(f, "entity_set<{}>", s.entity_type),
        }
    }
}
