// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Character string functions.

use pql_repr::Datum;
use serde::{Deserialize, Serialize};

use crate::scalar::like_pattern;
use crate::scalar::EvalError;

/// Which ends of a string `TRIM` removes characters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrimSpec {
    Both,
    Leading,
    Trailing,
}

fn text<'a>(func: &str, d: &'a Datum) -> Result<&'a str, EvalError> {
    match d {
        Datum::Char(s) | Datum::String(s) | Datum::Clob(s) => Ok(s),
        _ => Err(EvalError::type_mismatch(func, d)),
    }
}

/// Rebuilds a string of the same kind as `like`.
fn same_kind(like: &Datum, s: String) -> Datum {
    match like {
        Datum::Char(_) => Datum::Char(s),
        Datum::Clob(_) => Datum::Clob(s),
        _ => Datum::String(s),
    }
}

/// `a || b`.
pub fn concat(a: &Datum, b: &Datum) -> Result<Datum, EvalError> {
    let mut s = text("||", a)?.to_owned();
    s.push_str(text("||", b)?);
    Ok(match (a, b) {
        (Datum::Clob(_), _) | (_, Datum::Clob(_)) => Datum::Clob(s),
        _ => Datum::String(s),
    })
}

pub fn upper(a: &Datum) -> Result<Datum, EvalError> {
    Ok(same_kind(a, text("UPPER", a)?.to_uppercase()))
}

pub fn lower(a: &Datum) -> Result<Datum, EvalError> {
    Ok(same_kind(a, text("LOWER", a)?.to_lowercase()))
}

fn length_datum(n: usize) -> Result<Datum, EvalError> {
    i32::try_from(n)
        .map(Datum::Int32)
        .map_err(|_| EvalError::IntegerOutOfRange("INT"))
}

/// `CHAR_LENGTH`, in characters.
pub fn char_length(a: &Datum) -> Result<Datum, EvalError> {
    length_datum(text("CHAR_LENGTH", a)?.chars().count())
}

/// `OCTET_LENGTH`, in bytes.
pub fn octet_length(a: &Datum) -> Result<Datum, EvalError> {
    match a {
        Datum::Blob(b) => length_datum(b.len()),
        _ => length_datum(text("OCTET_LENGTH", a)?.len()),
    }
}

/// `BIT_LENGTH`.
pub fn bit_length(a: &Datum) -> Result<Datum, EvalError> {
    let bytes = match a {
        Datum::Blob(b) => b.len(),
        _ => text("BIT_LENGTH", a)?.len(),
    };
    let bits = bytes
        .checked_mul(8)
        .ok_or(EvalError::IntegerOutOfRange("INT"))?;
    length_datum(bits)
}

/// `TRIM([side] [chars FROM] s)`. Without `chars`, removes spaces.
pub fn trim(side: TrimSpec, s: &Datum, chars: Option<&Datum>) -> Result<Datum, EvalError> {
    let string = text("TRIM", s)?;
    let chars: Vec<char> = match chars {
        Some(chars) => text("TRIM", chars)?.chars().collect(),
        None => vec![' '],
    };
    let trimmed = match side {
        TrimSpec::Both => string.trim_matches(chars.as_slice()),
        TrimSpec::Leading => string.trim_start_matches(chars.as_slice()),
        TrimSpec::Trailing => string.trim_end_matches(chars.as_slice()),
    };
    Ok(Datum::String(trimmed.to_owned()))
}

/// `SUBSTRING(s FROM start [FOR length])`, with a 1-based `start`.
///
/// Positions before the first character count toward `length` without
/// producing characters.
pub fn substring(s: &Datum, start: &Datum, length: Option<&Datum>) -> Result<Datum, EvalError> {
    let string = text("SUBSTRING", s)?;
    let start = start
        .as_i64()
        .ok_or_else(|| EvalError::type_mismatch("SUBSTRING", start))?;
    let end = match length {
        Some(length) => {
            let length = length
                .as_i64()
                .ok_or_else(|| EvalError::type_mismatch("SUBSTRING", length))?;
            if length < 0 {
                return Err(EvalError::NegativeSubstringLength);
            }
            Some(start.saturating_add(length))
        }
        None => None,
    };
    let result: String = string
        .chars()
        .zip(1i64..)
        .filter(|(_, pos)| *pos >= start && end.map_or(true, |end| *pos < end))
        .map(|(c, _)| c)
        .collect();
    Ok(Datum::String(result))
}

/// `POSITION(needle IN haystack)`: the 1-based character position of the
/// first occurrence, or 0.
pub fn position(needle: &Datum, haystack: &Datum) -> Result<Datum, EvalError> {
    let needle = text("POSITION", needle)?;
    let haystack = text("POSITION", haystack)?;
    match haystack.find(needle) {
        Some(byte_offset) => length_datum(haystack[..byte_offset].chars().count() + 1),
        None => Ok(Datum::Int32(0)),
    }
}

/// `value LIKE pattern [ESCAPE escape]`.
pub fn like(value: &Datum, pattern: &Datum, escape: Option<&Datum>) -> Result<Datum, EvalError> {
    let value = text("LIKE", value)?;
    let pattern = text("LIKE", pattern)?;
    let escape = match escape {
        Some(escape) => Some(like_pattern::escape_char(text("LIKE", escape)?)?),
        None => None,
    };
    let matcher = like_pattern::compile(pattern, escape)?;
    Ok(Datum::Bool(matcher.is_match(value)))
}

/// Matches `value` against an already compiled pattern.
pub fn is_like_match(value: &Datum, matcher: &like_pattern::Matcher) -> Result<Datum, EvalError> {
    Ok(Datum::Bool(matcher.is_match(text("LIKE", value)?)))
}
