// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository, or online at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String utilities.

use std::fmt;

/// Extension methods for [`str`].
pub trait StrExt {
    /// Wraps the string slice in a type whose display implementation renders
    /// the string surrounded by double quotes with any inner double quote
    /// characters escaped.
    fn quoted(&self) -> QuotedStr<'_>;

    /// Wraps the string slice in a type whose display implementation renders
    /// the string as a PartiQL string literal, surrounded by single quotes
    /// with any inner single quotes doubled.
    fn sql_quoted(&self) -> SqlQuotedStr<'_>;
}

impl StrExt for str {
    fn quoted(&self) -> QuotedStr<'_> {
        QuotedStr(self)
    }

    fn sql_quoted(&self) -> SqlQuotedStr<'_> {
        SqlQuotedStr(self)
    }
}

/// Displays a string slice surrounded by double quotes.
///
/// Constructed by [`StrExt::quoted`].
#[derive(Debug)]
pub struct QuotedStr<'a>(&'a str);

impl<'a> fmt::Display for QuotedStr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                _ => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")
    }
}

/// Displays a string slice as a single-quoted literal.
///
/// Constructed by [`StrExt::sql_quoted`].
#[derive(Debug)]
pub struct SqlQuotedStr<'a>(&'a str);

impl<'a> fmt::Display for SqlQuotedStr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("'")?;
        for c in self.0.chars() {
            match c {
                '\'' => f.write_str("''")?,
                _ => write!(f, "{}", c)?,
            }
        }
        f.write_str("'")
    }
}

/// Creates a type whose [`fmt::Display`] implementation outputs each item in
/// `iter` separated by `separator`.
pub fn separated<'a, I>(separator: &'a str, iter: I) -> impl fmt::Display + 'a
where
    I: IntoIterator,
    I::IntoIter: Clone + 'a,
    I::Item: fmt::Display + 'a,
{
    struct Separated<'a, I> {
        sep: &'a str,
        iter: I,
    }

    impl<'a, I> fmt::Display for Separated<'a, I>
    where
        I: Iterator + Clone,
        I::Item: fmt::Display,
    {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            for (i, item) in self.iter.clone().enumerate() {
                if i != 0 {
                    write!(f, "{}", self.sep)?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }
    }

    Separated {
        sep: separator,
        iter: iter.into_iter(),
    }
}
