// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Runs the function library against the files in `tests/testdata`.
//!
//! Each line of a test case's input is one call: a function name followed by
//! literal arguments. Literals are `null`, `missing`, `true`, `false`,
//! integers (`1` is an `INT`; `1i8`, `1i16` and `1i64` pick a width),
//! decimals (`1.50`), floats (`1.5f64`, `1.5f32`), strings (`'abc'`) and
//! typed strings (`date'2020-01-31'`, `time'10:00:00'`,
//! `timestamp'2020-01-31 10:00:00'`, `ym'1-2'`, `ds'1 02:03:04'`). The
//! `cast` directive's lines end in a type name instead of a second literal.

mod test {
    use std::str::FromStr;

    use anyhow::{anyhow, bail, Context};
    use pql_expr::like_pattern;
    use pql_expr::{BinaryFunc, DateTimeField, TrimSpec, UnaryFunc, VariadicFunc};
    use pql_repr::adt::numeric::Decimal;
    use pql_repr::strconv;
    use pql_repr::{Datum, PType};

    /// Splits a line into tokens at whitespace outside single quotes.
    fn tokenize(line: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut tokens = vec![];
        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    current.push(c);
                    loop {
                        match chars.next() {
                            Some('\'') if chars.peek() == Some(&'\'') => {
                                chars.next();
                                current.push_str("''");
                            }
                            Some('\'') => break,
                            Some(c) => current.push(c),
                            None => bail!("unterminated string in {:?}", line),
                        }
                    }
                    current.push('\'');
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        Ok(tokens)
    }

    fn parse_literal(token: &str) -> Result<Datum, anyhow::Error> {
        if let Some(quote) = token.find('\'') {
            let (prefix, quoted) = token.split_at(quote);
            let body = quoted
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .ok_or_else(|| anyhow!("malformed string literal {}", token))?
                .replace("''", "'");
            return Ok(match prefix {
                "" => Datum::String(body),
                "date" => Datum::Date(strconv::parse_date(&body)?),
                "time" => Datum::Time(strconv::parse_time(&body)?),
                "timestamp" => Datum::Timestamp(strconv::parse_timestamp(&body)?),
                "ym" => Datum::Interval(strconv::parse_interval_year_month(&body, 2)?),
                "ds" => Datum::Interval(strconv::parse_interval_day_second(&body, 2, 6)?),
                _ => bail!("unknown literal prefix {:?}", prefix),
            });
        }
        Ok(match token {
            "null" => Datum::Null,
            "missing" => Datum::Missing,
            "true" => Datum::Bool(true),
            "false" => Datum::Bool(false),
            _ => {
                if let Some(n) = token.strip_suffix("i8") {
                    Datum::Int8(n.parse()?)
                } else if let Some(n) = token.strip_suffix("i16") {
                    Datum::Int16(n.parse()?)
                } else if let Some(n) = token.strip_suffix("i64") {
                    Datum::Int64(n.parse()?)
                } else if let Some(n) = token.strip_suffix("f32") {
                    Datum::from(n.parse::<f32>()?)
                } else if let Some(n) = token.strip_suffix("f64") {
                    Datum::from(n.parse::<f64>()?)
                } else if token.contains('.') {
                    Datum::Decimal(
                        Decimal::from_str(token).map_err(|e| anyhow!("{}: {}", token, e))?,
                    )
                } else {
                    Datum::Int32(token.parse().with_context(|| format!("bad literal {}", token))?)
                }
            }
        })
    }

    /// Parses type names such as `tinyint`, `decimal(4,2)` or `varchar(3)`.
    fn parse_type(name: &str) -> Result<PType, anyhow::Error> {
        let (base, params) = match name.split_once('(') {
            Some((base, rest)) => {
                let params = rest
                    .strip_suffix(')')
                    .ok_or_else(|| anyhow!("malformed type {}", name))?
                    .split(',')
                    .map(|p| p.trim().parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()?;
                (base, params)
            }
            None => (name, vec![]),
        };
        Ok(match (base, params.as_slice()) {
            ("bool", []) => PType::Bool,
            ("tinyint", []) => PType::TinyInt,
            ("smallint", []) => PType::SmallInt,
            ("int", []) => PType::Int,
            ("bigint", []) => PType::BigInt,
            ("decimal", [p, s]) => PType::decimal(u8::try_from(*p)?, u8::try_from(*s)?)?,
            ("real", []) => PType::Real,
            ("double", []) => PType::Double,
            ("char", [n]) => PType::character(*n)?,
            ("varchar", [n]) => PType::varchar(*n)?,
            ("string", []) => PType::String { length: None },
            ("date", []) => PType::Date,
            ("time", []) => PType::Time,
            ("timestamp", []) => PType::Timestamp,
            _ => bail!("unknown type {}", name),
        })
    }

    fn eval(func: &str, args: &[Datum]) -> Result<Datum, anyhow::Error> {
        let binary = |f: BinaryFunc| -> Result<Datum, anyhow::Error> {
            match args {
                [a, b] => Ok(f.eval(a, b)?),
                _ => bail!("{} takes two arguments", func),
            }
        };
        let unary = |f: UnaryFunc| -> Result<Datum, anyhow::Error> {
            match args {
                [a] => Ok(f.eval(a)?),
                _ => bail!("{} takes one argument", func),
            }
        };
        match func {
            "add" => binary(BinaryFunc::Add),
            "sub" => binary(BinaryFunc::Sub),
            "mul" => binary(BinaryFunc::Mul),
            "div" => binary(BinaryFunc::Div),
            "mod" => binary(BinaryFunc::Mod),
            "eq" => binary(BinaryFunc::Eq),
            "lt" => binary(BinaryFunc::Lt),
            "and" => binary(BinaryFunc::And),
            "or" => binary(BinaryFunc::Or),
            "concat" => binary(BinaryFunc::Concat),
            "position" => binary(BinaryFunc::Position),
            "in" => binary(BinaryFunc::In),
            "nullif" => binary(BinaryFunc::NullIf),
            "not" => unary(UnaryFunc::Not),
            "neg" => unary(UnaryFunc::Neg),
            "abs" => unary(UnaryFunc::Abs),
            "upper" => unary(UnaryFunc::Upper),
            "lower" => unary(UnaryFunc::Lower),
            "char_length" => unary(UnaryFunc::CharLength),
            "trim" => unary(UnaryFunc::Trim(TrimSpec::Both)),
            "ltrim" => unary(UnaryFunc::Trim(TrimSpec::Leading)),
            "rtrim" => unary(UnaryFunc::Trim(TrimSpec::Trailing)),
            "is_null" => unary(UnaryFunc::IsNull),
            "is_missing" => unary(UnaryFunc::IsMissing),
            "extract_year" => unary(UnaryFunc::Extract(DateTimeField::Year)),
            "extract_month" => unary(UnaryFunc::Extract(DateTimeField::Month)),
            "extract_day" => unary(UnaryFunc::Extract(DateTimeField::Day)),
            "extract_hour" => unary(UnaryFunc::Extract(DateTimeField::Hour)),
            "like" => Ok(VariadicFunc::Like.eval(args)?),
            "substring" => Ok(VariadicFunc::Substring.eval(args)?),
            "coalesce" => Ok(VariadicFunc::Coalesce.eval(args)?),
            "between" => Ok(VariadicFunc::Between.eval(args)?),
            _ => bail!("unknown function {}", func),
        }
    }

    fn run_line(directive: &str, line: &str) -> Result<Datum, anyhow::Error> {
        let tokens = tokenize(line)?;
        match directive {
            "eval" => {
                let (func, args) = tokens
                    .split_first()
                    .ok_or_else(|| anyhow!("empty line"))?;
                let args = args
                    .iter()
                    .map(|t| parse_literal(t))
                    .collect::<Result<Vec<_>, _>>()?;
                eval(func, &args)
            }
            "cast" => match tokens.as_slice() {
                [value, typ] => Ok(UnaryFunc::Cast(parse_type(typ)?).eval(&parse_literal(value)?)?),
                _ => bail!("cast takes a literal and a type"),
            },
            "like_pattern" => match tokens.as_slice() {
                [pattern, rest @ ..] => {
                    let pattern = parse_literal(pattern)?;
                    let escape = match rest {
                        [] => None,
                        [escape] => Some(like_pattern::escape_char(
                            parse_literal(escape)?.unwrap_str(),
                        )?),
                        _ => bail!("like_pattern takes a pattern and an optional escape"),
                    };
                    like_pattern::compile(pattern.unwrap_str(), escape)?;
                    Ok(Datum::Bool(true))
                }
                _ => bail!("like_pattern takes a pattern"),
            },
            _ => panic!("unknown directive: {}", directive),
        }
    }

    #[pql_ore::test]
    fn run() {
        datadriven::walk("tests/testdata", |f| {
            f.run(move |s| -> String {
                let mut out = String::new();
                for line in s.input.lines().filter(|l| !l.trim().is_empty()) {
                    match run_line(&s.directive, line) {
                        Ok(datum) => out.push_str(&format!("{}\n", datum)),
                        Err(err) => out.push_str(&format!("error: {}\n", err)),
                    }
                }
                out
            })
        });
    }
}
