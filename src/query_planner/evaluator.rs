//! Reference evaluation of expression trees over in-memory entity sets.
//!
//! This is not a storage backend: it exists so the observable behaviour of a
//! tree (before and after rewriting) can be checked directly. Semantics:
//!
//! - member and property reads on `null` yield `null`;
//! - `null == null` is `true`, so an unguarded key comparison would match
//!   a null owner against rows whose foreign key is null;
//! - tuples compare element-wise, entities by identity;
//! - a predicate keeps a row only when it evaluates to `true`.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::{
    entity_catalog::EntityModel,
    query_planner::logical_expr::{BinaryOperator, Expr, ExprRef, Literal, OperatorCall, QueryOperator},
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("Unbound parameter `{0}`")]
    UnboundParameter(String),
    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("`{operator}` cannot be evaluated with {arity} arguments")]
    OperatorArity {
        operator: QueryOperator,
        arity: usize,
    },
    #[error("Lambda takes {expected} arguments, got {found}")]
    LambdaArity { expected: usize, found: usize },
    #[error("A lambda can only be evaluated as an operator argument")]
    BareLambda,
}

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Entity(Arc<EntityInstance>),
    Tuple(Vec<Value>),
    Sequence(Vec<Value>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Entity(_) => "entity",
            Value::Tuple(_) => "tuple",
            Value::Sequence(_) => "sequence",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => Arc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) | (Value::Sequence(a), Value::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(x) => Value::Float(*x),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

/// One entity row: property values and, optionally, loaded navigation values.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    pub entity_type: String,
    pub values: HashMap<String, Value>,
}

impl EntityInstance {
    pub fn new(entity_type: impl Into<String>) -> Self {
        EntityInstance {
            entity_type: entity_type.into(),
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, member: impl Into<String>, value: Value) -> Self {
        self.values.insert(member.into(), value);
        self
    }

    pub fn get(&self, member: &str) -> Value {
        self.values.get(member).cloned().unwrap_or(Value::Null)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    instances: Vec<Arc<EntityInstance>>,
}

impl InMemoryStore {
    pub fn insert(&mut self, instance: EntityInstance) -> Value {
        let instance = Arc::new(instance);
        self.instances.push(instance.clone());
        Value::Entity(instance)
    }

    /// Every stored instance of `entity_type` or one of its subtypes, in insertion order.
    pub fn entity_set(&self, entity_type: &str, model: &EntityModel) -> Vec<Value> {
        self.instances
            .iter()
            .filter(|instance| model.is_assignable_to(&instance.entity_type, entity_type))
            .map(|instance| Value::Entity(instance.clone()))
            .collect()
    }
}

pub type Environment = HashMap<String, Value>;

pub struct Evaluator<'a> {
    model: &'a EntityModel,
    store: &'a InMemoryStore,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a EntityModel, store: &'a InMemoryStore) -> Self {
        Evaluator { model, store }
    }

    pub fn evaluate(&self, expr: &Expr, env: &Environment) -> EvalResult<Value> {
        match expr {
            Expr::Constant(c) => Ok(Value::from(&c.value)),
            Expr::Parameter(p) => env
                .get(&p.name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundParameter(p.name.clone())),
            Expr::MemberAccess(m) => Ok(read_member(&self.evaluate(&m.target, env)?, &m.member)),
            Expr::PropertyRead(p) => Ok(read_member(&self.evaluate(&p.target, env)?, &p.property)),
            Expr::OperatorCall(call) => self.apply_operator(call, env),
            Expr::Lambda(_) => Err(EvalError::BareLambda),
            Expr::Conditional(c) => {
                if self.evaluate_bool(&c.test, env)? {
                    self.evaluate(&c.if_true, env)
                } else {
                    self.evaluate(&c.if_false, env)
                }
            }
            Expr::Guard(g) => {
                if self.evaluate_bool(&g.condition, env)? {
                    self.evaluate(&g.payload, env)
                } else if g.ty.is_boolean() {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::TypeTest(t) => match self.evaluate(&t.target, env)? {
                Value::Entity(instance) => Ok(Value::Bool(
                    self.model
                        .is_assignable_to(&instance.entity_type, &t.entity_type),
                )),
                _ => Ok(Value::Bool(false)),
            },
            Expr::Convert(c) => self.evaluate(&c.operand, env),
            Expr::Tuple(t) => t
                .elements
                .iter()
                .map(|element| self.evaluate(element, env))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Tuple),
            Expr::Binary(b) => match b.operator {
                BinaryOperator::Equal => Ok(Value::Bool(
                    self.evaluate(&b.left, env)? == self.evaluate(&b.right, env)?,
                )),
                BinaryOperator::NotEqual => Ok(Value::Bool(
                    self.evaluate(&b.left, env)? != self.evaluate(&b.right, env)?,
                )),
                BinaryOperator::AndAlso => Ok(Value::Bool(
                    self.evaluate_bool(&b.left, env)? && self.evaluate_bool(&b.right, env)?,
                )),
                BinaryOperator::OrElse => Ok(Value::Bool(
                    self.evaluate_bool(&b.left, env)? || self.evaluate_bool(&b.right, env)?,
                )),
            },
            Expr::EntitySet(s) => Ok(Value::Sequence(
                self.store.entity_set(&s.entity_type, self.model),
            )),
        }
    }

    /// `null` counts as not-true.
    fn evaluate_bool(&self, expr: &Expr, env: &Environment) -> EvalResult<bool> {
        match self.evaluate(expr, env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::TypeMismatch {
                expected: "bool",
                found: other.kind().to_string(),
            }),
        }
    }

    fn evaluate_sequence(&self, expr: &Expr, env: &Environment) -> EvalResult<Vec<Value>> {
        into_sequence(self.evaluate(expr, env)?)
    }

    fn apply_lambda(&self, lambda: &ExprRef, args: Vec<Value>, env: &Environment) -> EvalResult<Value> {
        let Expr::Lambda(lambda) = lambda.as_ref() else {
            return Err(EvalError::TypeMismatch {
                expected: "lambda",
                found: lambda.to_string(),
            });
        };
        if lambda.params.len() != args.len() {
            return Err(EvalError::LambdaArity {
                expected: lambda.params.len(),
                found: args.len(),
            });
        }
        let mut scope = env.clone();
        for (param, arg) in lambda.params.iter().zip(args) {
            scope.insert(param.name.clone(), arg);
        }
        self.evaluate(&lambda.body, &scope)
    }

    fn matches(&self, predicate: &ExprRef, item: &Value, env: &Environment) -> EvalResult<bool> {
        Ok(matches!(
            self.apply_lambda(predicate, vec![item.clone()], env)?,
            Value::Bool(true)
        ))
    }

    fn apply_operator(&self, call: &OperatorCall, env: &Environment) -> EvalResult<Value> {
        match (call.operator, call.args.as_slice()) {
            (QueryOperator::Filter, [source, predicate]) => {
                let mut kept = Vec::new();
                for item in self.evaluate_sequence(source, env)? {
                    if self.matches(predicate, &item, env)? {
                        kept.push(item);
                    }
                }
                Ok(Value::Sequence(kept))
            }
            (QueryOperator::Project, [source, selector]) => self
                .evaluate_sequence(source, env)?
                .into_iter()
                .map(|item| self.apply_lambda(selector, vec![item], env))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Sequence),
            (QueryOperator::Flatten, [source, collection_selector]) => {
                let mut flattened = Vec::new();
                for item in self.evaluate_sequence(source, env)? {
                    let inner = self.apply_lambda(collection_selector, vec![item], env)?;
                    flattened.extend(into_sequence(inner)?);
                }
                Ok(Value::Sequence(flattened))
            }
            (QueryOperator::Flatten, [source, collection_selector, result_selector]) => {
                let mut flattened = Vec::new();
                for outer in self.evaluate_sequence(source, env)? {
                    let inner = self.apply_lambda(collection_selector, vec![outer.clone()], env)?;
                    for inner in into_sequence(inner)? {
                        flattened.push(self.apply_lambda(
                            result_selector,
                            vec![outer.clone(), inner],
                            env,
                        )?);
                    }
                }
                Ok(Value::Sequence(flattened))
            }
            (QueryOperator::Any, [source]) => {
                Ok(Value::Bool(!self.evaluate_sequence(source, env)?.is_empty()))
            }
            (QueryOperator::Any, [source, predicate]) => {
                for item in self.evaluate_sequence(source, env)? {
                    if self.matches(predicate, &item, env)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            (QueryOperator::Count, [source]) => {
                Ok(Value::Integer(self.evaluate_sequence(source, env)?.len() as i64))
            }
            (QueryOperator::Count, [source, predicate]) => {
                let mut count = 0;
                for item in self.evaluate_sequence(source, env)? {
                    if self.matches(predicate, &item, env)? {
                        count += 1;
                    }
                }
                Ok(Value::Integer(count))
            }
            // Loading directives do not change which rows a query yields
            (QueryOperator::Include | QueryOperator::ThenInclude, [source, ..]) => {
                self.evaluate(source, env)
            }
            (operator, args) => Err(EvalError::OperatorArity {
                operator,
                arity: args.len(),
            }),
        }
    }
}

fn read_member(target: &Value, member: &str) -> Value {
    match target {
        Value::Entity(instance) => instance.get(member),
        _ => Value::Null,
    }
}

/// A missing collection reads as empty.
fn into_sequence(value: Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Sequence(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(EvalError::TypeMismatch {
            expected: "sequence",
            found: other.kind().to_string(),
        }),
    }
}
