// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compiled scalar expressions.

use std::cell::{RefCell, RefMut};
use std::fmt;

use pql_expr::func;
use pql_expr::{
    BinaryFunc, Coercion, ColumnRef, EvalError, UnaryFunc, UnmaterializableFunc, VariadicFunc,
};
use pql_ore::cast::TryCastFrom;
use pql_repr::{Datum, Struct};
use tracing::trace;

use crate::context::ExecContext;
use crate::env::Env;
use crate::error::{CardinalityError, Error};
use crate::relation::Relation;

/// A scalar expression ready for evaluation: every reference is resolved
/// to a slot and every subquery is an instantiated relation.
#[derive(Debug)]
pub(crate) enum Expr {
    Column(ColumnRef),
    Literal(Datum),
    /// The data of the session table at this position in the catalog.
    Table(usize),
    /// A `WITH` binding, by distance from the innermost binding.
    Local(usize),
    Path {
        expr: Box<Expr>,
        steps: Vec<Step>,
    },
    Unmaterializable(UnmaterializableFunc),
    Unary {
        func: UnaryFunc,
        expr: Box<Expr>,
    },
    /// `expr2` is not evaluated when `expr1` alone decides the result.
    Binary {
        func: BinaryFunc,
        expr1: Box<Expr>,
        expr2: Box<Expr>,
    },
    Variadic {
        func: VariadicFunc,
        exprs: Vec<Expr>,
    },
    /// Evaluates its arguments only up to the first present value.
    Coalesce(Vec<Expr>),
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    Struct(Vec<(Expr, Expr)>),
    Array(Vec<Expr>),
    Bag(Vec<Expr>),
    TupleUnion(Vec<Expr>),
    Select {
        input: RefCell<Relation>,
        constructor: Box<Expr>,
        ordered: bool,
    },
    Pivot {
        input: RefCell<Relation>,
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Subquery {
        expr: Box<Expr>,
        coercion: Coercion,
    },
    With {
        bindings: Vec<Expr>,
        body: Box<Expr>,
    },
    /// Evaluates to `MISSING` where `expr` raises a data exception that none
    /// of its own subexpressions absorbed.
    Permissive(Box<Expr>),
}

/// A compiled path step.
#[derive(Debug)]
pub(crate) enum Step {
    Field { name: String, case_sensitive: bool },
    Index(Expr),
    Wildcard,
    FieldWildcard,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Field { name, .. } => write!(f, ".{}", name),
            Step::Index(_) => f.write_str("[...]"),
            Step::Wildcard => f.write_str("[*]"),
            Step::FieldWildcard => f.write_str(".*"),
        }
    }
}

fn path_type_mismatch(step: &Step, found: &Datum) -> Error {
    EvalError::PathTypeMismatch {
        step: step.to_string(),
        found: found.type_name().to_owned(),
    }
    .into()
}

impl Step {
    /// Applies a step that does not fan out to `value`. `key` is the value of
    /// an index step's expression.
    fn navigate(&self, value: Datum, key: Option<&Datum>) -> Result<Datum, Error> {
        if value.is_absent() {
            return Ok(value);
        }
        match (self, &value, key) {
            (Step::Field { name, case_sensitive }, Datum::Struct(s), _) => {
                let field = match *case_sensitive {
                    true => s.get(name),
                    false => s.get_case_insensitive(name),
                };
                Ok(field.cloned().unwrap_or(Datum::Missing))
            }
            (Step::Index(_), _, Some(key)) if key.is_absent() => Ok(Datum::Missing),
            (Step::Index(_), Datum::Array(elements), Some(key)) if key.as_i64().is_some() => {
                let element = key
                    .as_i64()
                    .and_then(usize::try_cast_from)
                    .and_then(|i| elements.get(i));
                Ok(element.cloned().unwrap_or(Datum::Missing))
            }
            (Step::Index(_), Datum::Struct(s), Some(key)) if key.is_text() => {
                let field = key.as_str().and_then(|name| s.get(name));
                Ok(field.cloned().unwrap_or(Datum::Missing))
            }
            _ => Err(path_type_mismatch(self, &value)),
        }
    }
}

fn eval_all(exprs: &[Expr], ctx: &ExecContext, env: &Env) -> Result<Vec<Datum>, Error> {
    exprs.iter().map(|e| e.eval(ctx, env)).collect()
}

/// Navigates `value` along `steps`.
///
/// Without wildcards this yields a single value. Each wildcard step fans
/// out over the elements or field values it reaches; the result is then a
/// bag of the values reached, leaving out `MISSING`.
fn navigate(ctx: &ExecContext, env: &Env, value: Datum, steps: &[Step]) -> Result<Datum, Error> {
    let mut values = vec![value];
    let mut fanned_out = false;
    for step in steps {
        let key = match step {
            Step::Index(expr) => Some(expr.eval(ctx, env)?),
            _ => None,
        };
        let mut next = Vec::with_capacity(values.len());
        for value in values {
            match (step, value) {
                (Step::Wildcard, Datum::Array(elements) | Datum::Bag(elements)) => {
                    next.extend(elements)
                }
                (Step::FieldWildcard, Datum::Struct(s)) => {
                    next.extend(s.into_fields().into_iter().map(|(_, v)| v))
                }
                (Step::Wildcard | Step::FieldWildcard, Datum::Missing) => {}
                (Step::Wildcard | Step::FieldWildcard, other) => next.push(other),
                (_, value) => next.push(step.navigate(value, key.as_ref())?),
            }
        }
        fanned_out |= matches!(step, Step::Wildcard | Step::FieldWildcard);
        if fanned_out {
            next.retain(|v| !v.is_missing());
        }
        values = next;
    }
    match fanned_out {
        true => Ok(Datum::Bag(values)),
        false => Ok(values.into_iter().next().unwrap_or(Datum::Missing)),
    }
}

/// Shapes the result of a subquery used as a scalar: no rows is `NULL`, and
/// a single row is its value, unwrapped from a single-field struct.
fn coerce_scalar(value: Datum) -> Result<Datum, Error> {
    let rows = match value {
        Datum::Array(rows) | Datum::Bag(rows) => rows,
        value => return Ok(value),
    };
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), count) {
        (None, _) => Ok(Datum::Null),
        (Some(Datum::Struct(s)), 1) => {
            let width = s.len();
            match s.into_fields().pop() {
                Some((_, value)) if width == 1 => Ok(value),
                _ => Err(CardinalityError::WrongColumnCount(width).into()),
            }
        }
        (Some(value), 1) => Ok(value),
        (Some(_), count) => Err(CardinalityError::TooManyRows(count).into()),
    }
}

impl Expr {
    pub(crate) fn eval(&self, ctx: &ExecContext, env: &Env) -> Result<Datum, Error> {
        match self {
            Expr::Column(column) => env.column(*column).cloned(),
            Expr::Literal(datum) => Ok(datum.clone()),
            Expr::Table(index) => ctx
                .session()
                .table(*index)
                .map(|table| table.data.clone())
                .ok_or_else(|| Error::Internal(format!("no table at position {}", index))),
            Expr::Local(depth) => env.local(*depth).cloned(),
            Expr::Path { expr, steps } => {
                let value = expr.eval(ctx, env)?;
                navigate(ctx, env, value, steps)
            }
            Expr::Unmaterializable(func) => Ok(ctx.session().eval_unmaterializable(func)?),
            Expr::Unary { func, expr } => Ok(func.eval(&expr.eval(ctx, env)?)?),
            Expr::Binary { func, expr1, expr2 } => {
                let a = expr1.eval(ctx, env)?;
                if let Some(result) = func.short_circuit(&a) {
                    return Ok(result);
                }
                let b = expr2.eval(ctx, env)?;
                Ok(func.eval(&a, &b)?)
            }
            Expr::Variadic { func, exprs } => Ok(func.eval(&eval_all(exprs, ctx, env)?)?),
            Expr::Coalesce(exprs) => {
                for expr in exprs {
                    let datum = expr.eval(ctx, env)?;
                    if !datum.is_absent() {
                        return Ok(datum);
                    }
                }
                Ok(Datum::Null)
            }
            Expr::Case {
                operand,
                branches,
                default,
            } => {
                let operand = operand.as_ref().map(|e| e.eval(ctx, env)).transpose()?;
                for (when, then) in branches {
                    let cond = when.eval(ctx, env)?;
                    let matched = match &operand {
                        Some(operand) => {
                            !operand.is_absent() && !cond.is_absent() && func::eq(operand, &cond)
                        }
                        None => cond == Datum::Bool(true),
                    };
                    if matched {
                        return then.eval(ctx, env);
                    }
                }
                match default {
                    Some(default) => default.eval(ctx, env),
                    None => Ok(Datum::Null),
                }
            }
            Expr::Struct(fields) => {
                let mut result = Struct::new(Vec::<(String, Datum)>::new());
                for (key, value) in fields {
                    let key = key.eval(ctx, env)?;
                    let value = value.eval(ctx, env)?;
                    match key.as_str() {
                        Some(name) if !value.is_missing() => result.push(name, value),
                        Some(_) => {}
                        None if key.is_absent() => {}
                        None => {
                            return Err(EvalError::type_mismatch("STRUCT field name", &key).into())
                        }
                    }
                }
                Ok(Datum::Struct(result))
            }
            Expr::Array(exprs) => Ok(Datum::Array(eval_all(exprs, ctx, env)?)),
            Expr::Bag(exprs) => Ok(Datum::Bag(eval_all(exprs, ctx, env)?)),
            Expr::TupleUnion(exprs) => Ok(func::tuple_union(&eval_all(exprs, ctx, env)?)),
            Expr::Select {
                input,
                constructor,
                ordered,
            } => {
                let mut input = borrow(input)?;
                let mut values = vec![];
                input.consume(ctx, env, |row| {
                    values.push(constructor.eval(ctx, &env.push(row))?);
                    Ok(())
                })?;
                Ok(match ordered {
                    true => Datum::Array(values),
                    false => Datum::Bag(values),
                })
            }
            Expr::Pivot { input, key, value } => {
                let mut input = borrow(input)?;
                let mut result = Struct::unordered(Vec::<(String, Datum)>::new());
                input.consume(ctx, env, |row| {
                    let scope = env.push(row);
                    let key = key.eval(ctx, &scope)?;
                    let value = value.eval(ctx, &scope)?;
                    if let (Some(name), false) = (key.as_str(), value.is_missing()) {
                        result.set(name, value);
                    }
                    Ok(())
                })?;
                Ok(Datum::Struct(result))
            }
            Expr::Subquery { expr, coercion } => {
                let value = expr.eval(ctx, env)?;
                match coercion {
                    Coercion::Scalar => coerce_scalar(value),
                    Coercion::Collection => Ok(value),
                }
            }
            Expr::With { bindings, body } => {
                let mut scope = env.clone();
                for binding in bindings {
                    let value = binding.eval(ctx, &scope)?;
                    scope = scope.bind(value);
                }
                body.eval(ctx, &scope)
            }
            Expr::Permissive(expr) => match expr.eval(ctx, env) {
                Err(Error::Eval(e)) => {
                    trace!(error = %e, "data exception evaluates to MISSING");
                    Ok(Datum::Missing)
                }
                result => result,
            },
        }
    }
}

fn borrow(input: &RefCell<Relation>) -> Result<RefMut<'_, Relation>, Error> {
    input
        .try_borrow_mut()
        .map_err(|_| Error::Internal("relation re-entered during its own evaluation".into()))
}

#[cfg(test)]
mod tests {
    use crate::session::Session;

    use super::*;

    fn lit(d: impl Into<Datum>) -> Box<Expr> {
        Box::new(Expr::Literal(d.into()))
    }

    fn eval(expr: &Expr) -> Result<Datum, Error> {
        let session = Session::default();
        let ctx = ExecContext::new(&session);
        expr.eval(&ctx, &Env::default())
    }

    fn s(fields: Vec<(&str, Datum)>) -> Datum {
        Datum::Struct(Struct::new(fields))
    }

    fn field(name: &str) -> Step {
        Step::Field {
            name: name.into(),
            case_sensitive: false,
        }
    }

    #[pql_ore::test]
    fn test_paths() {
        let value = s(vec![
            ("a", Datum::Array(vec![s(vec![("b", Datum::from(1))]), s(vec![])])),
            ("C", Datum::from(2)),
        ]);
        let path = |steps| Expr::Path {
            expr: lit(value.clone()),
            steps,
        };
        assert_eq!(eval(&path(vec![field("c")])), Ok(Datum::from(2)));
        assert_eq!(
            eval(&path(vec![Step::Field {
                name: "c".into(),
                case_sensitive: true
            }])),
            Ok(Datum::Missing)
        );
        assert_eq!(
            eval(&path(vec![
                field("a"),
                Step::Index(Expr::Literal(Datum::from(0))),
                field("b")
            ])),
            Ok(Datum::from(1))
        );
        assert_eq!(
            eval(&path(vec![field("a"), Step::Index(Expr::Literal(Datum::from(7)))])),
            Ok(Datum::Missing)
        );
        assert_eq!(
            eval(&path(vec![field("a"), Step::Wildcard, field("b")])),
            Ok(Datum::Bag(vec![Datum::from(1)]))
        );
        assert_eq!(
            eval(&path(vec![Step::FieldWildcard])).map(|d| d.as_elements().map(|e| e.len())),
            Ok(Some(2))
        );
        assert_eq!(
            eval(&path(vec![field("nope"), field("deeper")])),
            Ok(Datum::Missing)
        );
        assert!(matches!(
            eval(&path(vec![field("c"), field("d")])),
            Err(Error::Eval(EvalError::PathTypeMismatch { .. }))
        ));
    }

    #[pql_ore::test]
    fn test_permissive_boundary() {
        let overflow = Expr::Binary {
            func: BinaryFunc::Add,
            expr1: lit(Datum::Int8(127)),
            expr2: lit(Datum::Int8(1)),
        };
        assert!(matches!(
            eval(&overflow),
            Err(Error::Eval(EvalError::IntegerOutOfRange(_)))
        ));
        let coalesced = Expr::Coalesce(vec![
            Expr::Permissive(Box::new(overflow)),
            Expr::Literal(Datum::from("fallback")),
        ]);
        assert_eq!(eval(&coalesced), Ok(Datum::from("fallback")));
    }

    #[pql_ore::test]
    fn test_short_circuit() {
        // The right operand would fail if it were evaluated.
        let failing = Box::new(Expr::Column(ColumnRef { scope: 3, index: 0 }));
        let and = Expr::Binary {
            func: BinaryFunc::And,
            expr1: lit(false),
            expr2: failing,
        };
        assert_eq!(eval(&and), Ok(Datum::Bool(false)));
    }

    #[pql_ore::test]
    fn test_case() {
        let case = |operand: Option<Box<Expr>>| Expr::Case {
            operand,
            branches: vec![
                (Expr::Literal(Datum::Null), Expr::Literal(Datum::from("null"))),
                (Expr::Literal(Datum::from(1)), Expr::Literal(Datum::from("one"))),
                (Expr::Literal(Datum::Bool(true)), Expr::Literal(Datum::from("true"))),
            ],
            default: None,
        };
        assert_eq!(eval(&case(Some(lit(1)))), Ok(Datum::from("one")));
        assert_eq!(eval(&case(Some(lit(Datum::Null)))), Ok(Datum::Null));
        assert_eq!(eval(&case(None)), Ok(Datum::from("true")));
    }

    #[pql_ore::test]
    fn test_struct_constructor() {
        let ctor = Expr::Struct(vec![
            (Expr::Literal(Datum::from("a")), Expr::Literal(Datum::from(1))),
            (Expr::Literal(Datum::from("b")), Expr::Literal(Datum::Missing)),
            (Expr::Literal(Datum::Null), Expr::Literal(Datum::from(2))),
            (Expr::Literal(Datum::from("c")), Expr::Literal(Datum::Null)),
        ]);
        assert_eq!(
            eval(&ctor),
            Ok(s(vec![("a", Datum::from(1)), ("c", Datum::Null)]))
        );
        let bad = Expr::Struct(vec![(Expr::Literal(Datum::from(1)), Expr::Literal(Datum::from(1)))]);
        assert!(matches!(
            eval(&bad),
            Err(Error::Eval(EvalError::TypeMismatch { .. }))
        ));
    }

    #[pql_ore::test]
    fn test_scalar_coercion() {
        let one_row = Datum::Bag(vec![s(vec![("x", Datum::from(1))])]);
        assert_eq!(coerce_scalar(one_row), Ok(Datum::from(1)));
        assert_eq!(coerce_scalar(Datum::Bag(vec![])), Ok(Datum::Null));
        assert_eq!(
            coerce_scalar(Datum::Bag(vec![Datum::from(1), Datum::from(2)])),
            Err(Error::Cardinality(CardinalityError::TooManyRows(2)))
        );
        assert_eq!(
            coerce_scalar(Datum::Array(vec![s(vec![
                ("x", Datum::from(1)),
                ("y", Datum::from(2))
            ])])),
            Err(Error::Cardinality(CardinalityError::WrongColumnCount(2)))
        );
    }

    #[pql_ore::test]
    fn test_with_bindings() {
        let with = Expr::With {
            bindings: vec![
                Expr::Literal(Datum::from(1)),
                Expr::Binary {
                    func: BinaryFunc::Add,
                    expr1: Box::new(Expr::Local(0)),
                    expr2: lit(10),
                },
            ],
            body: Box::new(Expr::Array(vec![Expr::Local(0), Expr::Local(1)])),
        };
        assert_eq!(
            eval(&with),
            Ok(Datum::Array(vec![Datum::from(11), Datum::from(1)]))
        );
    }
}
