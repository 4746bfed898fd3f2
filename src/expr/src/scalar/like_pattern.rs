// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Matching of text against `LIKE` patterns.
//!
//! A pattern is translated into an anchored regular expression: `_` becomes
//! `.`, a run of `%` becomes a single `.*`, and all other characters, as well
//! as escaped wildcards, match literally.

use derivative::Derivative;
use regex::{Regex, RegexBuilder};

use crate::scalar::EvalError;

/// The longest pattern accepted, in bytes.
const MAX_PATTERN_LEN: usize = 8 << 10;

/// A compiled `LIKE` pattern.
#[derive(Debug, Clone, Derivative)]
#[derivative(Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Matcher {
    pub pattern: String,
    pub escape: Option<char>,
    #[derivative(
        PartialEq = "ignore",
        Hash = "ignore",
        Ord = "ignore",
        PartialOrd = "ignore"
    )]
    regex: Regex,
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Validates an `ESCAPE` operand, which must be exactly one character.
pub fn escape_char(escape: &str) -> Result<char, EvalError> {
    let mut chars = escape.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(EvalError::InvalidLikeEscape(escape.to_owned())),
    }
}

/// Compiles a `LIKE` pattern.
///
/// Within the pattern, `escape` may only precede `_`, `%` or itself; any
/// other use, including a trailing escape, is a malformed pattern.
pub fn compile(pattern: &str, escape: Option<char>) -> Result<Matcher, EvalError> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(EvalError::LikePatternTooLong);
    }
    let malformed = |detail: String| EvalError::InvalidLikePattern {
        pattern: pattern.to_owned(),
        detail,
    };

    let mut re = String::from("^");
    let mut literal = String::new();
    let mut after_any = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(next) if next == '_' || next == '%' || Some(next) == escape => {
                    literal.push(next);
                    after_any = false;
                }
                Some(next) => {
                    return Err(malformed(format!(
                        "escape character must precede '_', '%' or itself, found '{}'",
                        next
                    )))
                }
                None => return Err(malformed("pattern ends with the escape character".into())),
            }
            continue;
        }
        match c {
            '_' | '%' => {
                regex_syntax::escape_into(&literal, &mut re);
                literal.clear();
                if c == '_' {
                    re.push('.');
                    after_any = false;
                } else if !after_any {
                    re.push_str(".*");
                    after_any = true;
                }
            }
            c => {
                literal.push(c);
                after_any = false;
            }
        }
    }
    regex_syntax::escape_into(&literal, &mut re);
    re.push('$');

    let regex = RegexBuilder::new(&re)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| match e {
            regex::Error::CompiledTooBig(_) => EvalError::LikePatternTooLong,
            e => EvalError::Internal(format!("LIKE pattern produced invalid regex: {}", e)),
        })?;
    Ok(Matcher {
        pattern: pattern.to_owned(),
        escape,
        regex,
    })
}

#[cfg(test)]
mod tests {
    use pql_ore::str::StrExt;

    use super::*;

    #[pql_ore::test]
    fn test_escape_validation() {
        let cases = [
            ("100\\%", Some('\\'), true),
            ("a\\_b", Some('\\'), true),
            ("a\\\\b", Some('\\'), true),
            ("a\\b", Some('\\'), false),
            ("ab\\", Some('\\'), false),
            ("ab\\", None, true),
        ];
        for (pattern, escape, ok) in cases {
            assert_eq!(
                compile(pattern, escape).is_ok(),
                ok,
                "compile({}, {:?})",
                pattern.quoted(),
                escape
            );
        }
        assert!(escape_char("ab").is_err());
        assert!(escape_char("").is_err());
        assert_eq!(escape_char("!"), Ok('!'));
        assert_eq!(
            compile(&"a".repeat(MAX_PATTERN_LEN + 1), None).err(),
            Some(EvalError::LikePatternTooLong)
        );
    }

    #[pql_ore::test]
    fn test_like() {
        let cases: &[(&str, Option<char>, &[(&str, bool)])] = &[
            ("ban%na!", None, &[("banana!", true), ("bana!", false)]),
            ("b_n%", None, &[("banana", true), ("bn", false), ("bxn", true)]),
            ("100!%", Some('!'), &[("100%", true), ("1000", false)]),
            (
                "%a%b%c%d%e%f",
                None,
                &[("xaxbxcxdxexf", true), ("abcdef", true), ("abcdfe", false)],
            ),
            ("%ab", None, &[("abab", true), ("aba", false), ("ab", true)]),
            ("", None, &[("", true), ("a", false)]),
            ("a.c%", None, &[("a.cd", true), ("abcd", false)]),
            ("a_b", None, &[("a\nb", true), ("ab", false)]),
            ("%%_%%", None, &[("x", true), ("", false)]),
            ("x!!%", Some('!'), &[("x!yz", true), ("xyz", false)]),
        ];
        for (pattern, escape, inputs) in cases {
            let matcher = compile(pattern, *escape).unwrap();
            for (text, expected) in *inputs {
                assert_eq!(
                    matcher.is_match(text),
                    *expected,
                    "{} LIKE {}",
                    text.quoted(),
                    pattern.quoted()
                );
            }
        }
    }
}
