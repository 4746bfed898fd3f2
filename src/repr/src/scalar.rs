// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use dec::OrderedDecimal;
use enum_kinds::EnumKind;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use pql_ore::cast::CastLossy;
use pql_ore::str::{separated, StrExt};
use serde::{Deserialize, Serialize};

use crate::adt::datetime::TimeTz;
use crate::adt::interval::{
    Interval, IntervalFamily, DEFAULT_FRACTIONAL_PRECISION, DEFAULT_LEADING_PRECISION,
};
use crate::adt::numeric::{Decimal, Numeric};
use crate::error::ValueError;

/// A single value.
///
/// Note that `Datum` must always derive [`EnumKind`] so that [`DatumKind`]
/// stays in sync with the variants.
///
/// # Ordering
///
/// `Datum`s are totally ordered, which is what ORDER BY, DISTINCT, GROUP BY
/// and the set operators rely on. Values of different kinds are ordered by
/// kind:
///
/// `MISSING < NULL < BOOL < numbers < DATE < TIME < TIME WITH TIME ZONE <
/// TIMESTAMP < TIMESTAMP WITH TIME ZONE < intervals < strings < CLOB < BLOB <
/// ARRAY < STRUCT < BAG`
///
/// All numeric kinds compare with each other by value, so `1`, `1.0` and
/// `1.00` are equal. Year-month intervals sort before day-second intervals.
/// Arrays compare element-wise; bags and structs compare their elements or
/// fields in sorted order, so that neither element order nor field order
/// matters.
#[derive(Debug, Clone, EnumKind)]
#[enum_kind(DatumKind, derive(Hash, PartialOrd, Ord, Serialize, Deserialize))]
pub enum Datum {
    /// An undefined value, e.g. the result of navigating to a field that
    /// does not exist.
    Missing,
    /// A known-absent value.
    Null,
    Bool(bool),
    /// A `TINYINT`.
    Int8(i8),
    /// A `SMALLINT`.
    Int16(i16),
    /// An `INT`.
    Int32(i32),
    /// A `BIGINT`.
    Int64(i64),
    Decimal(Decimal),
    /// A `REAL`.
    Float32(OrderedFloat<f32>),
    /// A `DOUBLE PRECISION`.
    Float64(OrderedFloat<f64>),
    /// A fixed-length, blank-padded character string.
    Char(String),
    /// A variable-length character string.
    String(String),
    Clob(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(TimeTz),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Interval(Interval),
    /// An ordered sequence.
    Array(Vec<Datum>),
    /// An unordered multiset.
    Bag(Vec<Datum>),
    Struct(Struct),
}

impl Datum {
    /// Reports whether this datum is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Reports whether this datum is `MISSING`.
    pub fn is_missing(&self) -> bool {
        matches!(self, Datum::Missing)
    }

    /// Reports whether this datum is `NULL` or `MISSING`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Datum::Null | Datum::Missing)
    }

    pub fn kind(&self) -> DatumKind {
        DatumKind::from(self)
    }

    pub fn is_integer(&self) -> bool {
        IntWidth::of(self).is_some()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Datum::Int8(_)
                | Datum::Int16(_)
                | Datum::Int32(_)
                | Datum::Int64(_)
                | Datum::Decimal(_)
                | Datum::Float32(_)
                | Datum::Float64(_)
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Datum::Char(_) | Datum::String(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Datum::Array(_) | Datum::Bag(_))
    }

    /// Returns the value of any integer kind, widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int8(i) => Some(i64::from(*i)),
            Datum::Int16(i) => Some(i64::from(*i)),
            Datum::Int32(i) => Some(i64::from(*i)),
            Datum::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the contents of a `CHAR`, `STRING` or `CLOB`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Char(s) | Datum::String(s) | Datum::Clob(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the exact decimal value of an integer or decimal datum.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Datum::Decimal(d) => Some(*d),
            _ => {
                let width = IntWidth::of(self)?;
                Some(Decimal::from_integer(self.as_i64()?, width.bytes()))
            }
        }
    }

    /// Returns the value of any numeric datum as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Float32(f) => Some(f64::from(f.0)),
            Datum::Float64(f) => Some(f.0),
            Datum::Decimal(d) => Some(d.to_f64()),
            _ => self.as_i64().map(f64::cast_lossy),
        }
    }

    /// Returns the elements of an array or bag.
    pub fn as_elements(&self) -> Option<&[Datum]> {
        match self {
            Datum::Array(elems) | Datum::Bag(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Datum::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Unwraps the boolean value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::Bool`].
    #[track_caller]
    pub fn unwrap_bool(&self) -> bool {
        match self {
            Datum::Bool(b) => *b,
            _ => panic!("Datum::unwrap_bool called on {:?}", self),
        }
    }

    /// Unwraps the string value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not a string kind.
    #[track_caller]
    pub fn unwrap_str(&self) -> &str {
        match self.as_str() {
            Some(s) => s,
            None => panic!("Datum::unwrap_str called on {:?}", self),
        }
    }

    /// Unwraps the 64-bit integer value within this datum.
    ///
    /// # Panics
    ///
    /// Panics if the datum is not [`Datum::Int64`].
    #[track_caller]
    pub fn unwrap_int64(&self) -> i64 {
        match self {
            Datum::Int64(i) => *i,
            _ => panic!("Datum::unwrap_int64 called on {:?}", self),
        }
    }

    /// Constructs a string datum.
    pub fn string(s: impl Into<String>) -> Datum {
        Datum::String(s.into())
    }

    /// Constructs an ordered struct datum.
    pub fn struct_<I, S>(fields: I) -> Datum
    where
        I: IntoIterator<Item = (S, Datum)>,
        S: Into<String>,
    {
        Datum::Struct(Struct::new(fields))
    }

    /// The dynamic type of this datum.
    pub fn typ(&self) -> PType {
        match self {
            Datum::Missing => PType::Missing,
            Datum::Null => PType::Null,
            Datum::Bool(_) => PType::Bool,
            Datum::Int8(_) => PType::TinyInt,
            Datum::Int16(_) => PType::SmallInt,
            Datum::Int32(_) => PType::Int,
            Datum::Int64(_) => PType::BigInt,
            Datum::Decimal(d) => PType::Decimal {
                precision: d.precision(),
                scale: d.scale(),
            },
            Datum::Float32(_) => PType::Real,
            Datum::Float64(_) => PType::Double,
            Datum::Char(s) => PType::Char {
                length: u32::try_from(s.chars().count()).unwrap_or(u32::MAX),
            },
            Datum::String(_) => PType::String { length: None },
            Datum::Clob(_) => PType::Clob,
            Datum::Blob(_) => PType::Blob,
            Datum::Date(_) => PType::Date,
            Datum::Time(_) => PType::Time,
            Datum::TimeTz(_) => PType::TimeTz,
            Datum::Timestamp(_) => PType::Timestamp,
            Datum::TimestampTz(_) => PType::TimestampTz,
            Datum::Interval(iv) => match iv {
                Interval::YearMonth { precision, .. } => PType::IntervalYearMonth {
                    precision: *precision,
                },
                Interval::DaySecond {
                    precision,
                    fractional_precision,
                    ..
                } => PType::IntervalDaySecond {
                    precision: *precision,
                    fractional_precision: *fractional_precision,
                },
            },
            Datum::Array(_) => PType::Array {
                element: Box::new(PType::Dynamic),
            },
            Datum::Bag(_) => PType::Bag {
                element: Box::new(PType::Dynamic),
            },
            Datum::Struct(s) => PType::Struct {
                fields: Some(
                    s.iter()
                        .map(|(name, value)| (name.to_owned(), value.typ()))
                        .collect(),
                ),
            },
        }
    }

    /// The SQL name of this datum's kind, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Missing => "MISSING",
            Datum::Null => "NULL",
            Datum::Bool(_) => "BOOL",
            Datum::Int8(_) => "TINYINT",
            Datum::Int16(_) => "SMALLINT",
            Datum::Int32(_) => "INT",
            Datum::Int64(_) => "BIGINT",
            Datum::Decimal(_) => "DECIMAL",
            Datum::Float32(_) => "REAL",
            Datum::Float64(_) => "DOUBLE PRECISION",
            Datum::Char(_) => "CHAR",
            Datum::String(_) => "STRING",
            Datum::Clob(_) => "CLOB",
            Datum::Blob(_) => "BLOB",
            Datum::Date(_) => "DATE",
            Datum::Time(_) => "TIME",
            Datum::TimeTz(_) => "TIME WITH TIME ZONE",
            Datum::Timestamp(_) => "TIMESTAMP",
            Datum::TimestampTz(_) => "TIMESTAMP WITH TIME ZONE",
            Datum::Interval(iv) => match iv.family() {
                IntervalFamily::YearMonth => "INTERVAL YEAR TO MONTH",
                IntervalFamily::DaySecond => "INTERVAL DAY TO SECOND",
            },
            Datum::Array(_) => "ARRAY",
            Datum::Bag(_) => "BAG",
            Datum::Struct(_) => "STRUCT",
        }
    }

    /// The rank of this datum's kind in the total order.
    fn rank(&self) -> u8 {
        match self {
            Datum::Missing => 0,
            Datum::Null => 1,
            Datum::Bool(_) => 2,
            Datum::Int8(_)
            | Datum::Int16(_)
            | Datum::Int32(_)
            | Datum::Int64(_)
            | Datum::Decimal(_)
            | Datum::Float32(_)
            | Datum::Float64(_) => 3,
            Datum::Date(_) => 4,
            Datum::Time(_) => 5,
            Datum::TimeTz(_) => 6,
            Datum::Timestamp(_) => 7,
            Datum::TimestampTz(_) => 8,
            Datum::Interval(_) => 9,
            Datum::Char(_) | Datum::String(_) => 10,
            Datum::Clob(_) => 11,
            Datum::Blob(_) => 12,
            Datum::Array(_) => 13,
            Datum::Struct(_) => 14,
            Datum::Bag(_) => 15,
        }
    }

    /// Reports whether `self` and `other` can be compared with `<`, i.e.
    /// whether they belong to the same comparable class of kinds.
    pub fn is_comparable_with(&self, other: &Datum) -> bool {
        match (self, other) {
            (Datum::Interval(a), Datum::Interval(b)) => a.family() == b.family(),
            _ => self.rank() == other.rank(),
        }
    }
}

/// A numeric datum's exact position on the number line. NaN sorts above
/// every other number.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum NumericKey {
    NegInfinity,
    Finite(OrderedDecimal<Numeric>),
    Infinity,
    NaN,
}

impl NumericKey {
    fn of(d: &Datum) -> Option<NumericKey> {
        let f = match d {
            Datum::Float32(f) => f64::from(f.0),
            Datum::Float64(f) => f.0,
            Datum::Decimal(d) => return Some(NumericKey::Finite(OrderedDecimal(d.numeric()))),
            _ => return d.as_i64().map(|i| NumericKey::Finite(OrderedDecimal(Numeric::from(i)))),
        };
        Some(if f.is_nan() {
            NumericKey::NaN
        } else if f == f64::INFINITY {
            NumericKey::Infinity
        } else if f == f64::NEG_INFINITY {
            NumericKey::NegInfinity
        } else {
            NumericKey::Finite(OrderedDecimal(Numeric::from(f)))
        })
    }
}

fn cmp_numeric(a: &Datum, b: &Datum) -> Ordering {
    match (a, b) {
        (Datum::Float32(x), Datum::Float32(y)) => x.cmp(y),
        (Datum::Float64(x), Datum::Float64(y)) => x.cmp(y),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => NumericKey::of(a).cmp(&NumericKey::of(b)),
        },
    }
}

fn sorted(elems: &[Datum]) -> Vec<&Datum> {
    elems.iter().sorted().collect()
}

impl PartialEq for Datum {
    fn eq(&self, other: &Datum) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Datum) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Datum) -> Ordering {
        let (ra, rb) = (self.rank(), other.rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Date(a), Datum::Date(b)) => a.cmp(b),
            (Datum::Time(a), Datum::Time(b)) => a.cmp(b),
            (Datum::TimeTz(a), Datum::TimeTz(b)) => a.cmp(b),
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a.cmp(b),
            (Datum::TimestampTz(a), Datum::TimestampTz(b)) => a.cmp(b),
            (Datum::Interval(a), Datum::Interval(b)) => a.cmp(b),
            (Datum::Clob(a), Datum::Clob(b)) => a.cmp(b),
            (Datum::Blob(a), Datum::Blob(b)) => a.cmp(b),
            (Datum::Array(a), Datum::Array(b)) => a.cmp(b),
            (Datum::Bag(a), Datum::Bag(b)) => sorted(a).cmp(&sorted(b)),
            (Datum::Struct(a), Datum::Struct(b)) => a.cmp(b),
            _ if self.is_numeric() => cmp_numeric(self, other),
            _ if self.is_text() => self.as_str().cmp(&other.as_str()),
            // MISSING and NULL are each a single value.
            _ => Ordering::Equal,
        }
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Datum {
        Datum::Bool(b)
    }
}

impl From<i8> for Datum {
    fn from(i: i8) -> Datum {
        Datum::Int8(i)
    }
}

impl From<i16> for Datum {
    fn from(i: i16) -> Datum {
        Datum::Int16(i)
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Datum {
        Datum::Int32(i)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Datum {
        Datum::Int64(i)
    }
}

impl From<f32> for Datum {
    fn from(f: f32) -> Datum {
        Datum::Float32(OrderedFloat(f))
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Datum {
        Datum::Float64(OrderedFloat(f))
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Datum {
        Datum::String(s.to_owned())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Datum {
        Datum::String(s)
    }
}

impl From<Decimal> for Datum {
    fn from(d: Decimal) -> Datum {
        Datum::Decimal(d)
    }
}

impl From<NaiveDate> for Datum {
    fn from(d: NaiveDate) -> Datum {
        Datum::Date(d)
    }
}

impl From<NaiveTime> for Datum {
    fn from(t: NaiveTime) -> Datum {
        Datum::Time(t)
    }
}

impl From<NaiveDateTime> for Datum {
    fn from(ts: NaiveDateTime) -> Datum {
        Datum::Timestamp(ts)
    }
}

impl From<Interval> for Datum {
    fn from(iv: Interval) -> Datum {
        Datum::Interval(iv)
    }
}

impl From<Struct> for Datum {
    fn from(s: Struct) -> Datum {
        Datum::Struct(s)
    }
}

impl<T> From<Option<T>> for Datum
where
    Datum: From<T>,
{
    fn from(o: Option<T>) -> Datum {
        match o {
            Some(d) => d.into(),
            None => Datum::Null,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Missing => f.write_str("missing"),
            Datum::Null => f.write_str("null"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int8(i) => write!(f, "{}", i),
            Datum::Int16(i) => write!(f, "{}", i),
            Datum::Int32(i) => write!(f, "{}", i),
            Datum::Int64(i) => write!(f, "{}", i),
            Datum::Decimal(d) => write!(f, "{}", d),
            Datum::Float32(n) => write!(f, "{:?}", n.0),
            Datum::Float64(n) => write!(f, "{:?}", n.0),
            Datum::Char(s) | Datum::String(s) => write!(f, "{}", s.sql_quoted()),
            Datum::Clob(s) => write!(f, "CLOB {}", s.sql_quoted()),
            Datum::Blob(b) => {
                f.write_str("BLOB X'")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str("'")
            }
            Datum::Date(d) => write!(f, "DATE '{}'", d),
            Datum::Time(t) => write!(f, "TIME '{}'", t),
            Datum::TimeTz(t) => write!(f, "TIME WITH TIME ZONE '{}'", t),
            Datum::Timestamp(ts) => write!(f, "TIMESTAMP '{}'", ts),
            Datum::TimestampTz(ts) => write!(f, "TIMESTAMP WITH TIME ZONE '{}'", ts),
            Datum::Interval(iv) => write!(f, "{}", iv),
            Datum::Array(elems) => write!(f, "[{}]", separated(", ", elems)),
            Datum::Bag(elems) => write!(f, "<<{}>>", separated(", ", elems)),
            Datum::Struct(s) => write!(f, "{}", s),
        }
    }
}

/// A struct value: an ordered multimap from field names to values.
///
/// Field names need not be unique. Field order is preserved, and is
/// meaningful when [`Struct::is_ordered`] reports so.
#[derive(Debug, Clone, Default)]
pub struct Struct {
    fields: Vec<(String, Datum)>,
    ordered: bool,
}

impl Struct {
    /// Constructs a struct whose field order is known.
    pub fn new<I, S>(fields: I) -> Struct
    where
        I: IntoIterator<Item = (S, Datum)>,
        S: Into<String>,
    {
        Struct {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ordered: true,
        }
    }

    /// Constructs a struct whose field order is unspecified.
    pub fn unordered<I, S>(fields: I) -> Struct
    where
        I: IntoIterator<Item = (S, Datum)>,
        S: Into<String>,
    {
        Struct {
            ordered: false,
            ..Struct::new(fields)
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Returns the value of the first field whose name matches `name`
    /// case-insensitively.
    pub fn get_case_insensitive(&self, name: &str) -> Option<&Datum> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Datum> {
        self.fields.iter().map(|(_, v)| v)
    }

    /// Appends a field, keeping any existing field with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: Datum) {
        self.fields.push((name.into(), value));
    }

    /// Sets the field named `name`, replacing the value of every existing
    /// field with that name, or appending it if there is none.
    pub fn set(&mut self, name: &str, value: Datum) {
        let mut found = false;
        for (k, v) in self.fields.iter_mut() {
            if k == name {
                *v = value.clone();
                found = true;
            }
        }
        if !found {
            self.fields.push((name.to_owned(), value));
        }
    }

    /// Keeps only the fields for which `f` returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &Datum) -> bool,
    {
        self.fields.retain(|(k, v)| f(k, v));
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Datum)> {
        self.fields.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_fields(self) -> Vec<(String, Datum)> {
        self.fields
    }

    fn sorted_fields(&self) -> Vec<&(String, Datum)> {
        self.fields.iter().sorted().collect()
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Struct) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Struct {}

impl PartialOrd for Struct {
    fn partial_cmp(&self, other: &Struct) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Struct {
    fn cmp(&self, other: &Struct) -> Ordering {
        self.sorted_fields().cmp(&other.sorted_fields())
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", k.sql_quoted(), v)?;
        }
        f.write_str("}")
    }
}

/// The width of a fixed-width integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntWidth {
    Int8,
    Int16,
    Int32,
    Int64,
}

impl IntWidth {
    /// The width of an integer datum, or `None` if it is not an integer.
    pub fn of(datum: &Datum) -> Option<IntWidth> {
        match datum {
            Datum::Int8(_) => Some(IntWidth::Int8),
            Datum::Int16(_) => Some(IntWidth::Int16),
            Datum::Int32(_) => Some(IntWidth::Int32),
            Datum::Int64(_) => Some(IntWidth::Int64),
            _ => None,
        }
    }

    pub fn bytes(&self) -> u8 {
        match self {
            IntWidth::Int8 => 1,
            IntWidth::Int16 => 2,
            IntWidth::Int32 => 4,
            IntWidth::Int64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntWidth::Int8 => "TINYINT",
            IntWidth::Int16 => "SMALLINT",
            IntWidth::Int32 => "INT",
            IntWidth::Int64 => "BIGINT",
        }
    }

    pub fn min_value(&self) -> i64 {
        match self {
            IntWidth::Int8 => i64::from(i8::MIN),
            IntWidth::Int16 => i64::from(i16::MIN),
            IntWidth::Int32 => i64::from(i32::MIN),
            IntWidth::Int64 => i64::MIN,
        }
    }

    pub fn max_value(&self) -> i64 {
        match self {
            IntWidth::Int8 => i64::from(i8::MAX),
            IntWidth::Int16 => i64::from(i16::MAX),
            IntWidth::Int32 => i64::from(i32::MAX),
            IntWidth::Int64 => i64::MAX,
        }
    }

    /// Constructs an integer datum of this width, failing if `value` does not
    /// fit.
    pub fn datum(&self, value: i128) -> Result<Datum, ValueError> {
        let overflow = || ValueError::IntegerOutOfRange { typ: self.name() };
        Ok(match self {
            IntWidth::Int8 => Datum::Int8(i8::try_from(value).map_err(|_| overflow())?),
            IntWidth::Int16 => Datum::Int16(i16::try_from(value).map_err(|_| overflow())?),
            IntWidth::Int32 => Datum::Int32(i32::try_from(value).map_err(|_| overflow())?),
            IntWidth::Int64 => Datum::Int64(i64::try_from(value).map_err(|_| overflow())?),
        })
    }

    pub fn ptype(&self) -> PType {
        match self {
            IntWidth::Int8 => PType::TinyInt,
            IntWidth::Int16 => PType::SmallInt,
            IntWidth::Int32 => PType::Int,
            IntWidth::Int64 => PType::BigInt,
        }
    }
}

/// The declared type of a value: a kind plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumKind)]
#[enum_kind(PTypeKind, derive(Hash, PartialOrd, Ord, Serialize, Deserialize))]
pub enum PType {
    /// Any value; the type of columns and tables declared without a schema.
    Dynamic,
    Null,
    Missing,
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal {
        precision: u8,
        scale: u8,
    },
    Real,
    Double,
    Char {
        length: u32,
    },
    /// `VARCHAR(length)`, or `STRING` when the length is unbounded.
    String {
        length: Option<u32>,
    },
    Clob,
    Blob,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    IntervalYearMonth {
        precision: u8,
    },
    IntervalDaySecond {
        precision: u8,
        fractional_precision: u8,
    },
    Array {
        element: Box<PType>,
    },
    Bag {
        element: Box<PType>,
    },
    /// A struct whose fields are known, or unknown (`None`).
    Struct {
        fields: Option<Vec<(String, PType)>>,
    },
}

impl PType {
    /// Constructs `DECIMAL(precision, scale)`, validating the parameters.
    pub fn decimal(precision: u8, scale: u8) -> Result<PType, ValueError> {
        if precision == 0 || precision > crate::adt::numeric::DECIMAL_MAX_PRECISION || scale > precision {
            return Err(ValueError::InvalidDecimalPrecision {
                precision: u32::from(precision),
                scale: u32::from(scale),
            });
        }
        Ok(PType::Decimal { precision, scale })
    }

    /// Constructs `CHAR(length)`.
    pub fn character(length: u32) -> Result<PType, ValueError> {
        if length == 0 {
            return Err(ValueError::InvalidLength(length));
        }
        Ok(PType::Char { length })
    }

    /// Constructs `VARCHAR(length)`.
    pub fn varchar(length: u32) -> Result<PType, ValueError> {
        if length == 0 {
            return Err(ValueError::InvalidLength(length));
        }
        Ok(PType::String {
            length: Some(length),
        })
    }

    /// `INTERVAL YEAR TO MONTH` with the default leading precision.
    pub fn interval_year_month() -> PType {
        PType::IntervalYearMonth {
            precision: DEFAULT_LEADING_PRECISION,
        }
    }

    /// `INTERVAL DAY TO SECOND` with the default precisions.
    pub fn interval_day_second() -> PType {
        PType::IntervalDaySecond {
            precision: DEFAULT_LEADING_PRECISION,
            fractional_precision: DEFAULT_FRACTIONAL_PRECISION,
        }
    }

    /// A bag of values of any type.
    pub fn bag() -> PType {
        PType::Bag {
            element: Box::new(PType::Dynamic),
        }
    }

    /// A struct with the given field types.
    pub fn struct_<I, S>(fields: I) -> PType
    where
        I: IntoIterator<Item = (S, PType)>,
        S: Into<String>,
    {
        PType::Struct {
            fields: Some(fields.into_iter().map(|(k, t)| (k.into(), t)).collect()),
        }
    }

    pub fn kind(&self) -> PTypeKind {
        PTypeKind::from(self)
    }

    /// The integer width of an integer type.
    pub fn int_width(&self) -> Option<IntWidth> {
        match self {
            PType::TinyInt => Some(IntWidth::Int8),
            PType::SmallInt => Some(IntWidth::Int16),
            PType::Int => Some(IntWidth::Int32),
            PType::BigInt => Some(IntWidth::Int64),
            _ => None,
        }
    }

    pub fn interval_family(&self) -> Option<IntervalFamily> {
        match self {
            PType::IntervalYearMonth { .. } => Some(IntervalFamily::YearMonth),
            PType::IntervalDaySecond { .. } => Some(IntervalFamily::DaySecond),
            _ => None,
        }
    }

    /// Reports whether `datum` is a value of this type, ignoring
    /// parameters such as precision and length.
    pub fn admits(&self, datum: &Datum) -> bool {
        match (self, datum) {
            (PType::Dynamic, _) => true,
            (PType::Struct { fields: None }, Datum::Struct(_)) => true,
            (PType::Array { .. }, Datum::Array(_)) | (PType::Bag { .. }, Datum::Bag(_)) => true,
            (PType::IntervalYearMonth { .. } | PType::IntervalDaySecond { .. }, Datum::Interval(iv)) => {
                self.interval_family() == Some(iv.family())
            }
            _ => self.kind() == datum.typ().kind(),
        }
    }

    /// The names of the fields of a struct type with known fields.
    pub fn field_names(&self) -> Option<Vec<&str>> {
        match self {
            PType::Struct {
                fields: Some(fields),
            } => Some(fields.iter().map(|(k, _)| k.as_str()).collect()),
            _ => None,
        }
    }
}

impl fmt::Display for PType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PType::Dynamic => f.write_str("DYNAMIC"),
            PType::Null => f.write_str("NULL"),
            PType::Missing => f.write_str("MISSING"),
            PType::Bool => f.write_str("BOOL"),
            PType::TinyInt => f.write_str("TINYINT"),
            PType::SmallInt => f.write_str("SMALLINT"),
            PType::Int => f.write_str("INT"),
            PType::BigInt => f.write_str("BIGINT"),
            PType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            PType::Real => f.write_str("REAL"),
            PType::Double => f.write_str("DOUBLE PRECISION"),
            PType::Char { length } => write!(f, "CHAR({})", length),
            PType::String { length: Some(n) } => write!(f, "VARCHAR({})", n),
            PType::String { length: None } => f.write_str("STRING"),
            PType::Clob => f.write_str("CLOB"),
            PType::Blob => f.write_str("BLOB"),
            PType::Date => f.write_str("DATE"),
            PType::Time => f.write_str("TIME"),
            PType::TimeTz => f.write_str("TIME WITH TIME ZONE"),
            PType::Timestamp => f.write_str("TIMESTAMP"),
            PType::TimestampTz => f.write_str("TIMESTAMP WITH TIME ZONE"),
            PType::IntervalYearMonth { precision } => {
                write!(f, "INTERVAL YEAR({}) TO MONTH", precision)
            }
            PType::IntervalDaySecond {
                precision,
                fractional_precision,
            } => write!(
                f,
                "INTERVAL DAY({}) TO SECOND({})",
                precision, fractional_precision
            ),
            PType::Array { element } => write!(f, "ARRAY<{}>", element),
            PType::Bag { element } => write!(f, "BAG<{}>", element),
            PType::Struct { fields: None } => f.write_str("STRUCT"),
            PType::Struct {
                fields: Some(fields),
            } => write!(
                f,
                "STRUCT<{}>",
                separated(
                    ", ",
                    fields.iter().map(|(k, t)| format!("{}: {}", k, t))
                )
            ),
        }
    }
}

/// Constructs a `DECIMAL(precision, scale)` datum.
pub fn decimal_datum(value: Numeric, precision: u8, scale: u8) -> Result<Datum, ValueError> {
    Decimal::new(value, precision, scale).map(Datum::Decimal)
}
