// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use pql_repr::strconv::ParseError;
use pql_repr::{Datum, PType, ValueError};
use serde::{Deserialize, Serialize};

use crate::id::{Id, LocalId};
use crate::relation::RelationExpr;
use crate::scalar::func::{BinaryFunc, UnaryFunc, UnmaterializableFunc, VariadicFunc};

pub mod func;
pub mod like_pattern;

/// A reference to a column of a row bound in an enclosing scope.
///
/// Scope `0` is the innermost row in scope: the current input row of the
/// operator evaluating the expression. Each enclosing operator adds one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub scope: usize,
    pub index: usize,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.scope {
            0 => write!(f, "#{}", self.index),
            _ => write!(f, "#{}^{}", self.index, self.scope),
        }
    }
}

/// One navigation step of a path expression.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathStep {
    /// `.name` or `['name']`.
    Field { name: String, case_sensitive: bool },
    /// `[expr]`: an element of an array when the key is an integer, or a
    /// field when the key is a string.
    Index(Box<ScalarExpr>),
    /// `[*]`: every element of a collection.
    Wildcard,
    /// `.*`: every field value of a struct.
    FieldWildcard,
}

/// How the result of a subquery is shaped for its consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Coercion {
    /// The subquery must produce at most one row of one column.
    Scalar,
    /// The subquery result is used as a collection.
    Collection,
}

/// A scalar expression of the logical plan.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalarExpr {
    /// A column of an enclosing row.
    Column(ColumnRef),
    /// A constant value.
    Literal(Datum),
    /// A named binding: a `WITH` item or a catalog table.
    Get(Id),
    /// Navigation into the value of `expr`.
    Path {
        expr: Box<ScalarExpr>,
        steps: Vec<PathStep>,
    },
    /// A function call whose result depends on the session, not its inputs.
    CallUnmaterializable(UnmaterializableFunc),
    CallUnary {
        func: UnaryFunc,
        expr: Box<ScalarExpr>,
    },
    CallBinary {
        func: BinaryFunc,
        expr1: Box<ScalarExpr>,
        expr2: Box<ScalarExpr>,
    },
    CallVariadic {
        func: VariadicFunc,
        exprs: Vec<ScalarExpr>,
    },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`.
    ///
    /// Without an operand each branch condition must evaluate to `TRUE` to
    /// match. With an operand each branch value is compared with `=`.
    Case {
        operand: Option<Box<ScalarExpr>>,
        branches: Vec<(ScalarExpr, ScalarExpr)>,
        default: Option<Box<ScalarExpr>>,
    },
    /// `{k1: v1, ...}`. Fields whose value is `MISSING` are omitted.
    Struct(Vec<(ScalarExpr, ScalarExpr)>),
    /// `[e1, ...]`.
    Array(Vec<ScalarExpr>),
    /// `<<e1, ...>>`.
    Bag(Vec<ScalarExpr>),
    /// Merges the fields of several structs into one, as `SELECT *` does.
    TupleUnion(Vec<ScalarExpr>),
    /// `SELECT <constructor> FROM ...`: evaluates `constructor` for every row
    /// of `input`, collecting the results into an array when the input is
    /// ordered and into a bag otherwise.
    Select {
        input: Box<RelationExpr>,
        constructor: Box<ScalarExpr>,
    },
    /// `PIVOT value AT key FROM ...`.
    Pivot {
        input: Box<RelationExpr>,
        key: Box<ScalarExpr>,
        value: Box<ScalarExpr>,
    },
    /// A subquery used as a value.
    Subquery {
        expr: Box<ScalarExpr>,
        coercion: Coercion,
    },
    /// `WITH l1 AS (..), l2 AS (..) body`.
    ///
    /// Each binding is evaluated once, in order, and is visible to the
    /// bindings after it and to `body`.
    With {
        bindings: Vec<(LocalId, ScalarExpr)>,
        body: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    pub fn column(index: usize) -> Self {
        ScalarExpr::Column(ColumnRef { scope: 0, index })
    }

    pub fn outer_column(scope: usize, index: usize) -> Self {
        ScalarExpr::Column(ColumnRef { scope, index })
    }

    pub fn literal(datum: impl Into<Datum>) -> Self {
        ScalarExpr::Literal(datum.into())
    }

    pub fn literal_null() -> Self {
        ScalarExpr::Literal(Datum::Null)
    }

    pub fn literal_missing() -> Self {
        ScalarExpr::Literal(Datum::Missing)
    }

    pub fn call_unary(self, func: UnaryFunc) -> Self {
        ScalarExpr::CallUnary {
            func,
            expr: Box::new(self),
        }
    }

    pub fn call_binary(self, other: Self, func: BinaryFunc) -> Self {
        ScalarExpr::CallBinary {
            func,
            expr1: Box::new(self),
            expr2: Box::new(other),
        }
    }

    pub fn call_variadic(func: VariadicFunc, exprs: Vec<ScalarExpr>) -> Self {
        ScalarExpr::CallVariadic { func, exprs }
    }

    pub fn cast(self, to: PType) -> Self {
        self.call_unary(UnaryFunc::Cast(to))
    }

    /// Navigates to the field `name` of this expression's value.
    pub fn field(self, name: &str) -> Self {
        self.step(PathStep::Field {
            name: name.to_owned(),
            case_sensitive: false,
        })
    }

    /// Appends a navigation step, extending an existing path if there is one.
    pub fn step(self, step: PathStep) -> Self {
        match self {
            ScalarExpr::Path { expr, mut steps } => {
                steps.push(step);
                ScalarExpr::Path { expr, steps }
            }
            expr => ScalarExpr::Path {
                expr: Box::new(expr),
                steps: vec![step],
            },
        }
    }

    pub fn and(self, other: Self) -> Self {
        self.call_binary(other, BinaryFunc::And)
    }

    pub fn or(self, other: Self) -> Self {
        self.call_binary(other, BinaryFunc::Or)
    }

    pub fn not(self) -> Self {
        self.call_unary(UnaryFunc::Not)
    }

    /// `SELECT VALUE constructor FROM input`.
    pub fn select(input: RelationExpr, constructor: ScalarExpr) -> Self {
        ScalarExpr::Select {
            input: Box::new(input),
            constructor: Box::new(constructor),
        }
    }

    /// Wraps this expression as a subquery coerced to a scalar.
    pub fn scalar_subquery(self) -> Self {
        ScalarExpr::Subquery {
            expr: Box::new(self),
            coercion: Coercion::Scalar,
        }
    }

    pub fn as_literal(&self) -> Option<&Datum> {
        match self {
            ScalarExpr::Literal(datum) => Some(datum),
            _ => None,
        }
    }

    pub fn as_literal_str(&self) -> Option<&str> {
        self.as_literal().and_then(|d| d.as_str())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ScalarExpr::Literal(_))
    }

    pub fn is_literal_null(&self) -> bool {
        matches!(self, ScalarExpr::Literal(Datum::Null))
    }

    /// Applies `f` to each direct scalar child of this expression, not
    /// descending into nested relations.
    pub fn visit1<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Self),
    {
        match self {
            ScalarExpr::Column(_)
            | ScalarExpr::Literal(_)
            | ScalarExpr::Get(_)
            | ScalarExpr::CallUnmaterializable(_) => (),
            ScalarExpr::Path { expr, steps } => {
                f(expr);
                for step in steps {
                    if let PathStep::Index(index) = step {
                        f(index);
                    }
                }
            }
            ScalarExpr::CallUnary { expr, .. } => f(expr),
            ScalarExpr::CallBinary { expr1, expr2, .. } => {
                f(expr1);
                f(expr2);
            }
            ScalarExpr::CallVariadic { exprs, .. }
            | ScalarExpr::Array(exprs)
            | ScalarExpr::Bag(exprs)
            | ScalarExpr::TupleUnion(exprs) => {
                for expr in exprs {
                    f(expr);
                }
            }
            ScalarExpr::Case {
                operand,
                branches,
                default,
            } => {
                if let Some(operand) = operand {
                    f(operand);
                }
                for (when, then) in branches {
                    f(when);
                    f(then);
                }
                if let Some(default) = default {
                    f(default);
                }
            }
            ScalarExpr::Struct(fields) => {
                for (key, value) in fields {
                    f(key);
                    f(value);
                }
            }
            ScalarExpr::Select { constructor, .. } => f(constructor),
            ScalarExpr::Pivot { key, value, .. } => {
                f(key);
                f(value);
            }
            ScalarExpr::Subquery { expr, .. } => f(expr),
            ScalarExpr::With { bindings, body } => {
                for (_, binding) in bindings {
                    f(binding);
                }
                f(body);
            }
        }
    }

    /// Applies `f` to every scalar expression in this tree, children first.
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Self),
    {
        self.visit1(|e| e.visit(f));
        f(self);
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use pql_ore::str::separated;
        match self {
            ScalarExpr::Column(col) => col.fmt(f),
            ScalarExpr::Literal(datum) => datum.fmt(f),
            ScalarExpr::Get(id) => id.fmt(f),
            ScalarExpr::Path { expr, steps } => {
                write!(f, "{}", expr)?;
                for step in steps {
                    match step {
                        PathStep::Field {
                            name,
                            case_sensitive: true,
                        } => write!(f, ".\"{}\"", name)?,
                        PathStep::Field { name, .. } => write!(f, ".{}", name)?,
                        PathStep::Index(index) => write!(f, "[{}]", index)?,
                        PathStep::Wildcard => f.write_str("[*]")?,
                        PathStep::FieldWildcard => f.write_str(".*")?,
                    }
                }
                Ok(())
            }
            ScalarExpr::CallUnmaterializable(func) => write!(f, "{}()", func),
            ScalarExpr::CallUnary { func, expr } => write!(f, "{}({})", func, expr),
            ScalarExpr::CallBinary { func, expr1, expr2 } => {
                if func.is_infix_op() {
                    write!(f, "({} {} {})", expr1, func, expr2)
                } else {
                    write!(f, "{}({}, {})", func, expr1, expr2)
                }
            }
            ScalarExpr::CallVariadic { func, exprs } => {
                write!(f, "{}({})", func, separated(", ", exprs.iter()))
            }
            ScalarExpr::Case {
                operand,
                branches,
                default,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(default) = default {
                    write!(f, " ELSE {}", default)?;
                }
                f.write_str(" END")
            }
            ScalarExpr::Struct(fields) => write!(
                f,
                "{{{}}}",
                separated(", ", fields.iter().map(|(k, v)| format!("{}: {}", k, v)))
            ),
            ScalarExpr::Array(exprs) => write!(f, "[{}]", separated(", ", exprs.iter())),
            ScalarExpr::Bag(exprs) => write!(f, "<<{}>>", separated(", ", exprs.iter())),
            ScalarExpr::TupleUnion(exprs) => {
                write!(f, "tupleunion({})", separated(", ", exprs.iter()))
            }
            ScalarExpr::Select { constructor, .. } => write!(f, "select({})", constructor),
            ScalarExpr::Pivot { key, value, .. } => write!(f, "pivot({} at {})", value, key),
            ScalarExpr::Subquery { expr, coercion } => match coercion {
                Coercion::Scalar => write!(f, "scalar({})", expr),
                Coercion::Collection => write!(f, "({})", expr),
            },
            ScalarExpr::With { bindings, body } => write!(
                f,
                "with({}) {}",
                separated(", ", bindings.iter().map(|(id, _)| id.to_string())),
                body
            ),
        }
    }
}

/// A data exception raised while evaluating an expression.
///
/// Under the strict mode these abort the statement. Under the permissive
/// mode the innermost expression raising one evaluates to `MISSING`
/// instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} out of range")]
    IntegerOutOfRange(&'static str),
    #[error("numeric field overflow")]
    NumericFieldOverflow,
    #[error("value {value} does not fit in DECIMAL({precision},{scale})")]
    DecimalOutOfRange {
        value: String,
        precision: u8,
        scale: u8,
    },
    #[error("floating point value out of range")]
    FloatOutOfRange,
    #[error("interval field value out of range for leading field precision {0}")]
    IntervalOutOfRange(u8),
    #[error("interval fields must share one sign")]
    IntervalMixedSign,
    #[error("cannot combine a YEAR-MONTH interval with a DAY-SECOND interval")]
    IntervalFamilyMismatch,
    #[error("date/time value out of range")]
    DateTimeOutOfRange,
    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },
    #[error("value too long for type {0}")]
    StringTruncation(String),
    #[error("invalid parameter for type: {0}")]
    InvalidTypeParameter(String),
    #[error("invalid LIKE pattern {pattern:?}: {detail}")]
    InvalidLikePattern { pattern: String, detail: String },
    #[error("invalid escape string {0:?}: must be exactly one character")]
    InvalidLikeEscape(String),
    #[error("LIKE pattern exceeds maximum length")]
    LikePatternTooLong,
    #[error("{func} does not accept arguments of type {found}")]
    TypeMismatch { func: String, found: String },
    #[error("cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },
    #[error("cannot navigate into {found} with {step}")]
    PathTypeMismatch { step: String, found: String },
    #[error("negative substring length not allowed")]
    NegativeSubstringLength,
    #[error("{0} is not supported")]
    Unsupported(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    /// Constructs a [`EvalError::TypeMismatch`] for a function applied to a
    /// value of an unsupported type.
    pub fn type_mismatch(func: impl fmt::Display, found: &Datum) -> EvalError {
        EvalError::TypeMismatch {
            func: func.to_string(),
            found: found.type_name().to_owned(),
        }
    }
}

impl From<ValueError> for EvalError {
    fn from(e: ValueError) -> EvalError {
        match e {
            ValueError::IntegerOutOfRange { typ } => EvalError::IntegerOutOfRange(typ),
            ValueError::DecimalOutOfRange {
                value,
                precision,
                scale,
            } => EvalError::DecimalOutOfRange {
                value,
                precision,
                scale,
            },
            ValueError::InvalidDecimalPrecision { precision, scale } => {
                EvalError::InvalidTypeParameter(format!("DECIMAL({},{})", precision, scale))
            }
            ValueError::NumericOverflow => EvalError::NumericFieldOverflow,
            ValueError::DivisionByZero => EvalError::DivisionByZero,
            ValueError::InvalidIntervalPrecision(p) => {
                EvalError::InvalidTypeParameter(format!("interval precision {}", p))
            }
            ValueError::InvalidFractionalPrecision(p) => {
                EvalError::InvalidTypeParameter(format!("interval fractional precision {}", p))
            }
            ValueError::IntervalFieldOverflow { precision } => {
                EvalError::IntervalOutOfRange(precision)
            }
            ValueError::IntervalMixedSign => EvalError::IntervalMixedSign,
            ValueError::IntervalFamilyMismatch => EvalError::IntervalFamilyMismatch,
            ValueError::DateTimeOutOfRange => EvalError::DateTimeOutOfRange,
            ValueError::InvalidLength(n) => {
                EvalError::InvalidTypeParameter(format!("character length {}", n))
            }
        }
    }
}
