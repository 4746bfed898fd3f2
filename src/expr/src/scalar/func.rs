// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The built-in functions.
//!
//! Unless noted otherwise a function applied to an absent value returns an
//! absent value without being evaluated: `MISSING` if any argument is
//! `MISSING`, else `NULL`.

use std::fmt;

use pql_repr::{Datum, PType};
use serde::{Deserialize, Serialize};

use crate::scalar::like_pattern;
use crate::scalar::EvalError;

pub(crate) mod impls;

pub use impls::*;

/// The absent value that a call with arguments `datums` returns, if any.
pub fn propagate_absence<'a, I>(datums: I) -> Option<Datum>
where
    I: IntoIterator<Item = &'a Datum>,
{
    let mut result = None;
    for d in datums {
        match d {
            Datum::Missing => return Some(Datum::Missing),
            Datum::Null => result = Some(Datum::Null),
            _ => {}
        }
    }
    result
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryFunc {
    Not,
    IsNull,
    IsMissing,
    IsTrue,
    IsFalse,
    /// `x IS <type>`.
    IsType(PType),
    Neg,
    Abs,
    Cast(PType),
    Upper,
    Lower,
    CharLength,
    OctetLength,
    BitLength,
    /// `TRIM(side FROM x)`, removing spaces.
    Trim(TrimSpec),
    Cardinality,
    Exists,
    Distinct,
    Extract(DateTimeField),
    /// `x LIKE <pattern>` with a pattern compiled ahead of time.
    IsLikeMatch(like_pattern::Matcher),
}

impl UnaryFunc {
    pub fn eval(&self, a: &Datum) -> Result<Datum, EvalError> {
        if self.propagates_nulls() {
            if let Some(absent) = propagate_absence([a]) {
                return Ok(absent);
            }
        }
        match self {
            UnaryFunc::Not => impls::not(a),
            UnaryFunc::IsNull => Ok(Datum::Bool(a.is_null())),
            UnaryFunc::IsMissing => Ok(Datum::Bool(a.is_missing())),
            UnaryFunc::IsTrue => Ok(Datum::Bool(matches!(a, Datum::Bool(true)))),
            UnaryFunc::IsFalse => Ok(Datum::Bool(matches!(a, Datum::Bool(false)))),
            UnaryFunc::IsType(typ) => Ok(Datum::Bool(typ.admits(a))),
            UnaryFunc::Neg => match a {
                Datum::Interval(iv) => Ok(Datum::Interval(iv.checked_neg()?)),
                _ => impls::neg(a).unwrap_or_else(|| Err(EvalError::type_mismatch(self, a))),
            },
            UnaryFunc::Abs => match a {
                Datum::Interval(iv) if iv.is_negative() => Ok(Datum::Interval(iv.checked_neg()?)),
                Datum::Interval(iv) => Ok(Datum::Interval(*iv)),
                _ => impls::abs(a).unwrap_or_else(|| Err(EvalError::type_mismatch(self, a))),
            },
            UnaryFunc::Cast(to) => impls::cast(a, to),
            UnaryFunc::Upper => impls::upper(a),
            UnaryFunc::Lower => impls::lower(a),
            UnaryFunc::CharLength => impls::char_length(a),
            UnaryFunc::OctetLength => impls::octet_length(a),
            UnaryFunc::BitLength => impls::bit_length(a),
            UnaryFunc::Trim(side) => impls::trim(*side, a, None),
            UnaryFunc::Cardinality => impls::cardinality(a),
            UnaryFunc::Exists => impls::exists(a),
            UnaryFunc::Distinct => impls::distinct(a),
            UnaryFunc::Extract(field) => impls::extract(*field, a),
            UnaryFunc::IsLikeMatch(matcher) => impls::is_like_match(a, matcher),
        }
    }

    /// Whether the function returns an absent argument as is. `NOT` does,
    /// by the rules of three-valued logic.
    pub fn propagates_nulls(&self) -> bool {
        !matches!(
            self,
            UnaryFunc::IsNull
                | UnaryFunc::IsMissing
                | UnaryFunc::IsTrue
                | UnaryFunc::IsFalse
                | UnaryFunc::IsType(_)
        )
    }
}

impl fmt::Display for UnaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryFunc::Not => f.write_str("NOT"),
            UnaryFunc::IsNull => f.write_str("IS NULL"),
            UnaryFunc::IsMissing => f.write_str("IS MISSING"),
            UnaryFunc::IsTrue => f.write_str("IS TRUE"),
            UnaryFunc::IsFalse => f.write_str("IS FALSE"),
            UnaryFunc::IsType(typ) => write!(f, "IS {}", typ),
            UnaryFunc::Neg => f.write_str("-"),
            UnaryFunc::Abs => f.write_str("ABS"),
            UnaryFunc::Cast(to) => write!(f, "CAST AS {}", to),
            UnaryFunc::Upper => f.write_str("UPPER"),
            UnaryFunc::Lower => f.write_str("LOWER"),
            UnaryFunc::CharLength => f.write_str("CHAR_LENGTH"),
            UnaryFunc::OctetLength => f.write_str("OCTET_LENGTH"),
            UnaryFunc::BitLength => f.write_str("BIT_LENGTH"),
            UnaryFunc::Trim(TrimSpec::Both) => f.write_str("TRIM"),
            UnaryFunc::Trim(TrimSpec::Leading) => f.write_str("LTRIM"),
            UnaryFunc::Trim(TrimSpec::Trailing) => f.write_str("RTRIM"),
            UnaryFunc::Cardinality => f.write_str("CARDINALITY"),
            UnaryFunc::Exists => f.write_str("EXISTS"),
            UnaryFunc::Distinct => f.write_str("DISTINCT"),
            UnaryFunc::Extract(field) => write!(f, "EXTRACT {}", field),
            UnaryFunc::IsLikeMatch(matcher) => write!(f, "LIKE[{:?}]", matcher.pattern),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BinaryFunc {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Concat,
    /// `POSITION(expr1 IN expr2)`.
    Position,
    /// `TRIM(side expr2 FROM expr1)`.
    TrimChars(TrimSpec),
    /// `expr1 IN expr2`, where `expr2` is a collection.
    In,
    NullIf,
}

impl BinaryFunc {
    pub fn eval(&self, a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
        if self.propagates_nulls() {
            if let Some(absent) = propagate_absence([a, b]) {
                return Ok(absent);
            }
        }
        let arith = |op| {
            impls::arith(op, a, b)
                .or_else(|| impls::interval_arith(op, a, b))
                .unwrap_or_else(|| {
                    Err(EvalError::TypeMismatch {
                        func: self.to_string(),
                        found: format!("{} and {}", a.type_name(), b.type_name()),
                    })
                })
        };
        let ordering = || impls::compare(a, b);
        match self {
            BinaryFunc::Add => arith(ArithOp::Add),
            BinaryFunc::Sub => arith(ArithOp::Sub),
            BinaryFunc::Mul => arith(ArithOp::Mul),
            BinaryFunc::Div => arith(ArithOp::Div),
            BinaryFunc::Mod => arith(ArithOp::Mod),
            BinaryFunc::Eq => Ok(Datum::Bool(impls::eq(a, b))),
            BinaryFunc::NotEq => Ok(Datum::Bool(!impls::eq(a, b))),
            BinaryFunc::Lt => Ok(Datum::Bool(ordering()?.is_lt())),
            BinaryFunc::Lte => Ok(Datum::Bool(ordering()?.is_le())),
            BinaryFunc::Gt => Ok(Datum::Bool(ordering()?.is_gt())),
            BinaryFunc::Gte => Ok(Datum::Bool(ordering()?.is_ge())),
            BinaryFunc::And => impls::and(a, b),
            BinaryFunc::Or => impls::or(a, b),
            BinaryFunc::Concat => impls::concat(a, b),
            BinaryFunc::Position => impls::position(a, b),
            BinaryFunc::TrimChars(side) => impls::trim(*side, a, Some(b)),
            BinaryFunc::In => impls::is_in(a, b),
            BinaryFunc::NullIf => match a.is_absent() || b.is_absent() || !impls::eq(a, b) {
                true => Ok(a.clone()),
                false => Ok(Datum::Null),
            },
        }
    }

    /// The result of the function if it is determined by its first argument
    /// alone, in which case the second argument need not be evaluated.
    pub fn short_circuit(&self, a: &Datum) -> Option<Datum> {
        match (self, a) {
            (BinaryFunc::And, Datum::Bool(false)) => Some(Datum::Bool(false)),
            (BinaryFunc::Or, Datum::Bool(true)) => Some(Datum::Bool(true)),
            _ => None,
        }
    }

    pub fn propagates_nulls(&self) -> bool {
        // NOTE: The following is a list of the binary functions
        // that **DO NOT** propagate nulls.
        !matches!(self, BinaryFunc::And | BinaryFunc::Or | BinaryFunc::NullIf)
    }

    pub fn is_infix_op(&self) -> bool {
        matches!(
            self,
            BinaryFunc::Add
                | BinaryFunc::Sub
                | BinaryFunc::Mul
                | BinaryFunc::Div
                | BinaryFunc::Mod
                | BinaryFunc::Eq
                | BinaryFunc::NotEq
                | BinaryFunc::Lt
                | BinaryFunc::Lte
                | BinaryFunc::Gt
                | BinaryFunc::Gte
                | BinaryFunc::And
                | BinaryFunc::Or
                | BinaryFunc::Concat
                | BinaryFunc::In
        )
    }
}

impl fmt::Display for BinaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryFunc::Add => f.write_str("+"),
            BinaryFunc::Sub => f.write_str("-"),
            BinaryFunc::Mul => f.write_str("*"),
            BinaryFunc::Div => f.write_str("/"),
            BinaryFunc::Mod => f.write_str("%"),
            BinaryFunc::Eq => f.write_str("="),
            BinaryFunc::NotEq => f.write_str("<>"),
            BinaryFunc::Lt => f.write_str("<"),
            BinaryFunc::Lte => f.write_str("<="),
            BinaryFunc::Gt => f.write_str(">"),
            BinaryFunc::Gte => f.write_str(">="),
            BinaryFunc::And => f.write_str("AND"),
            BinaryFunc::Or => f.write_str("OR"),
            BinaryFunc::Concat => f.write_str("||"),
            BinaryFunc::Position => f.write_str("POSITION"),
            BinaryFunc::TrimChars(TrimSpec::Both) => f.write_str("TRIM"),
            BinaryFunc::TrimChars(TrimSpec::Leading) => f.write_str("LTRIM"),
            BinaryFunc::TrimChars(TrimSpec::Trailing) => f.write_str("RTRIM"),
            BinaryFunc::In => f.write_str("IN"),
            BinaryFunc::NullIf => f.write_str("NULLIF"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariadicFunc {
    /// The first argument that is neither `NULL` nor `MISSING`. Arguments
    /// after it are not evaluated.
    Coalesce,
    /// `value LIKE pattern [ESCAPE escape]`.
    Like,
    /// `SUBSTRING(s FROM start [FOR length])`.
    Substring,
    /// `value BETWEEN low AND high`.
    Between,
}

impl VariadicFunc {
    pub fn eval(&self, datums: &[Datum]) -> Result<Datum, EvalError> {
        if !self.accepts_arity(datums.len()) {
            return Err(EvalError::Internal(format!(
                "{} called with {} arguments",
                self,
                datums.len()
            )));
        }
        if self.propagates_nulls() {
            if let Some(absent) = propagate_absence(datums) {
                return Ok(absent);
            }
        }
        match self {
            VariadicFunc::Coalesce => Ok(datums
                .iter()
                .find(|d| !d.is_absent())
                .cloned()
                .unwrap_or(Datum::Null)),
            VariadicFunc::Like => impls::like(&datums[0], &datums[1], datums.get(2)),
            VariadicFunc::Substring => impls::substring(&datums[0], &datums[1], datums.get(2)),
            VariadicFunc::Between => impls::between(&datums[0], &datums[1], &datums[2]),
        }
    }

    /// Whether the function can be called with `n` arguments.
    pub fn accepts_arity(&self, n: usize) -> bool {
        match self {
            VariadicFunc::Coalesce => n >= 1,
            VariadicFunc::Like | VariadicFunc::Substring => n == 2 || n == 3,
            VariadicFunc::Between => n == 3,
        }
    }

    pub fn propagates_nulls(&self) -> bool {
        !matches!(self, VariadicFunc::Coalesce)
    }
}

impl fmt::Display for VariadicFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VariadicFunc::Coalesce => f.write_str("COALESCE"),
            VariadicFunc::Like => f.write_str("LIKE"),
            VariadicFunc::Substring => f.write_str("SUBSTRING"),
            VariadicFunc::Between => f.write_str("BETWEEN"),
        }
    }
}

/// A function whose result depends on the session in which it is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnmaterializableFunc {
    CurrentUser,
    CurrentDate,
    CurrentTimestamp,
}

impl fmt::Display for UnmaterializableFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnmaterializableFunc::CurrentUser => f.write_str("CURRENT_USER"),
            UnmaterializableFunc::CurrentDate => f.write_str("CURRENT_DATE"),
            UnmaterializableFunc::CurrentTimestamp => f.write_str("CURRENT_TIMESTAMP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[pql_ore::test]
    fn test_absence_propagation() {
        let m = Datum::Missing;
        let n = Datum::Null;
        let one = Datum::Int32(1);
        assert_eq!(BinaryFunc::Add.eval(&n, &m), Ok(Datum::Missing));
        assert_eq!(BinaryFunc::Add.eval(&one, &n), Ok(Datum::Null));
        assert_eq!(BinaryFunc::Eq.eval(&m, &m), Ok(Datum::Missing));
        assert_eq!(UnaryFunc::Upper.eval(&m), Ok(Datum::Missing));
        assert_eq!(
            VariadicFunc::Like.eval(&[Datum::from("a"), n.clone()]),
            Ok(Datum::Null)
        );
    }

    #[pql_ore::test]
    fn test_is_predicates_are_exclusive() {
        for d in [Datum::Null, Datum::Missing] {
            let is_null = UnaryFunc::IsNull.eval(&d).unwrap();
            let is_missing = UnaryFunc::IsMissing.eval(&d).unwrap();
            assert_ne!(is_null, is_missing, "{}", d);
        }
        assert_eq!(
            UnaryFunc::IsType(PType::Int).eval(&Datum::Int32(1)),
            Ok(Datum::Bool(true))
        );
        assert_eq!(UnaryFunc::IsTrue.eval(&Datum::Null), Ok(Datum::Bool(false)));
    }

    #[pql_ore::test]
    fn test_short_circuit() {
        assert_eq!(
            BinaryFunc::And.short_circuit(&Datum::Bool(false)),
            Some(Datum::Bool(false))
        );
        assert_eq!(BinaryFunc::And.short_circuit(&Datum::Bool(true)), None);
        assert_eq!(BinaryFunc::Or.short_circuit(&Datum::Missing), None);
    }

    #[pql_ore::test]
    fn test_comparison_errors() {
        let one = Datum::Int32(1);
        let a = Datum::from("a");
        assert_eq!(BinaryFunc::Eq.eval(&one, &a), Ok(Datum::Bool(false)));
        assert!(matches!(
            BinaryFunc::Lt.eval(&one, &a),
            Err(EvalError::Incomparable { .. })
        ));
        assert!(matches!(
            BinaryFunc::Add.eval(&one, &a),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert_eq!(BinaryFunc::NullIf.eval(&one, &one), Ok(Datum::Null));
        assert_eq!(
            VariadicFunc::Coalesce.eval(&[Datum::Missing, Datum::Null, one.clone()]),
            Ok(one)
        );
    }
}
