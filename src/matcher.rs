//! Label matchers: `name=value`, `name!=value`, `name=~regex`, `name!~regex`
//!
//! A bare first argument without an operator is shorthand for
//! `alertname=<value>`, so `amtool alert query HighLatency` works.

use crate::error::{AmtoolError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Matcher operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    Regex,
    NotRegex,
}

impl MatchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::Regex => "=~",
            MatchOp::NotRegex => "!~",
        }
    }

    pub fn is_regex(self) -> bool {
        matches!(self, MatchOp::Regex | MatchOp::NotRegex)
    }

    pub fn is_equal(self) -> bool {
        matches!(self, MatchOp::Equal | MatchOp::Regex)
    }
}

/// A single label matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

impl Matcher {
    pub fn new(name: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse one `name<op>value` expression
    pub fn parse(input: &str) -> Result<Self> {
        let (name, op, value) = split_matcher(input)
            .ok_or_else(|| AmtoolError::BadMatcher(input.to_string()))?;

        let name = name.trim();
        if !is_valid_label_name(name) {
            return Err(AmtoolError::BadMatcher(input.to_string()));
        }

        let value = unquote(value.trim());
        if op.is_regex() {
            // Alertmanager anchors regex matchers
            Regex::new(&format!("^(?:{})$", value)).map_err(|source| {
                AmtoolError::BadMatcherRegex {
                    matcher: input.to_string(),
                    source,
                }
            })?;
        }

        Ok(Self::new(name, op, value))
    }

    pub fn to_api(&self) -> ApiMatcher {
        ApiMatcher {
            name: self.name.clone(),
            value: self.value.clone(),
            is_regex: self.op.is_regex(),
            is_equal: self.op.is_equal(),
        }
    }

    pub fn from_api(api: &ApiMatcher) -> Self {
        let op = match (api.is_regex, api.is_equal) {
            (false, true) => MatchOp::Equal,
            (false, false) => MatchOp::NotEqual,
            (true, true) => MatchOp::Regex,
            (true, false) => MatchOp::NotRegex,
        };
        Self::new(api.name.clone(), op, api.value.clone())
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"", self.name, self.op.as_str())?;
        for c in self.value.chars() {
            if matches!(c, '"' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(c)?;
        }
        f.write_char('"')
    }
}

/// Matcher as it travels over the v2 API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatcher {
    pub name: String,
    pub value: String,
    pub is_regex: bool,
    #[serde(default = "default_is_equal")]
    pub is_equal: bool,
}

fn default_is_equal() -> bool {
    true
}

/// Parse a list of command-line matchers.
///
/// Only the first argument may omit the operator; it then becomes an
/// `alertname` equality matcher.
pub fn parse_matchers(args: &[String]) -> Result<Vec<Matcher>> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 && split_matcher(arg).is_none() && is_bare_value(arg) {
                Ok(Matcher::new("alertname", MatchOp::Equal, arg.as_str()))
            } else {
                Matcher::parse(arg)
            }
        })
        .collect()
}

/// Render matchers the way Alertmanager's filter query parameter expects
pub fn filter_params(matchers: &[Matcher]) -> Vec<(String, String)> {
    matchers
        .iter()
        .map(|m| ("filter".to_string(), m.to_string()))
        .collect()
}

fn split_matcher(input: &str) -> Option<(&str, MatchOp, &str)> {
    // Longest operators first so `!=` is not read as `=`
    let pos = input.find(['=', '!'])?;
    let rest = &input[pos..];
    let (op, len) = if rest.starts_with("=~") {
        (MatchOp::Regex, 2)
    } else if rest.starts_with("!~") {
        (MatchOp::NotRegex, 2)
    } else if rest.starts_with("!=") {
        (MatchOp::NotEqual, 2)
    } else if rest.starts_with('=') {
        (MatchOp::Equal, 1)
    } else {
        return None;
    };
    Some((&input[..pos], op, &input[pos + len..]))
}

/// Strip surrounding double quotes and undo the `\"` and `\\` escapes
/// inside them. Unquoted values are taken literally.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next_if(|&n| matches!(n, '"' | '\\')) {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn is_bare_value(arg: &str) -> bool {
    !arg.is_empty() && !arg.contains(['=', '!', '~'])
}

pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_all_operators() {
        assert_eq!(
            Matcher::parse("job=api").unwrap(),
            Matcher::new("job", MatchOp::Equal, "api")
        );
        assert_eq!(
            Matcher::parse("job!=api").unwrap(),
            Matcher::new("job", MatchOp::NotEqual, "api")
        );
        assert_eq!(
            Matcher::parse("job=~api.*").unwrap(),
            Matcher::new("job", MatchOp::Regex, "api.*")
        );
        assert_eq!(
            Matcher::parse("job!~api.*").unwrap(),
            Matcher::new("job", MatchOp::NotRegex, "api.*")
        );
    }

    #[test]
    fn test_parse_quoted_value() {
        let m = Matcher::parse("severity=\"page me\"").unwrap();
        assert_eq!(m.value, "page me");
    }

    #[test]
    fn test_parse_empty_value_allowed() {
        let m = Matcher::parse("instance=").unwrap();
        assert_eq!(m.value, "");
    }

    #[test]
    fn test_parse_rejects_missing_operator() {
        let err = Matcher::parse("foo").unwrap_err();
        assert_eq!(err.to_string(), "bad matcher format: foo");
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(matches!(
            Matcher::parse("=bar"),
            Err(AmtoolError::BadMatcher(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_regex() {
        assert!(matches!(
            Matcher::parse("job=~(unclosed"),
            Err(AmtoolError::BadMatcherRegex { .. })
        ));
    }

    #[test]
    fn test_first_bare_argument_is_alertname() {
        let matchers = parse_matchers(&args(&["HighLatency", "job=api"])).unwrap();
        assert_eq!(matchers[0], Matcher::new("alertname", MatchOp::Equal, "HighLatency"));
        assert_eq!(matchers[1], Matcher::new("job", MatchOp::Equal, "api"));
    }

    #[test]
    fn test_later_bare_argument_is_rejected() {
        let err = parse_matchers(&args(&["a=b", "foo"])).unwrap_err();
        assert_eq!(err.to_string(), "bad matcher format: foo");
    }

    #[test]
    fn test_api_conversion() {
        for op in [
            MatchOp::Equal,
            MatchOp::NotEqual,
            MatchOp::Regex,
            MatchOp::NotRegex,
        ] {
            let m = Matcher::new("job", op, "api");
            assert_eq!(Matcher::from_api(&m.to_api()), m);
        }
    }

    #[test]
    fn test_filter_params_quote_values() {
        let params = filter_params(&[Matcher::new("job", MatchOp::Regex, "a|b")]);
        assert_eq!(params, vec![("filter".to_string(), "job=~\"a|b\"".to_string())]);
    }

    #[test]
    fn test_parse_unescapes_quoted_value() {
        let m = Matcher::parse(r#"msg="say \"hi\"""#).unwrap();
        assert_eq!(m.value, r#"say "hi""#);

        let m = Matcher::parse(r#"path=~"a\\.b""#).unwrap();
        assert_eq!(m.value, r"a\.b");
    }

    #[test]
    fn test_unquoted_backslashes_are_literal() {
        let m = Matcher::parse(r"path=~a\.b").unwrap();
        assert_eq!(m.value, r"a\.b");
        assert_eq!(m.to_string(), r#"path=~"a\\.b""#);
    }

    #[test]
    fn test_lone_quote_is_literal() {
        let m = Matcher::parse(r#"msg=""#).unwrap();
        assert_eq!(m.value, "\"");
    }

    #[test]
    fn test_quotes_and_backslashes_survive_display() {
        let m = Matcher::new("msg", MatchOp::Equal, r#"say "hi" \o/"#);
        assert_eq!(m.to_string(), r#"msg="say \"hi\" \\o/""#);
        assert_eq!(Matcher::parse(&m.to_string()).unwrap(), m);

        let m = Matcher::parse(r#"path=~"a\\.b""#).unwrap();
        assert_eq!(Matcher::parse(&m.to_string()).unwrap(), m);
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(
            name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}",
            value in r#"[a-z0-9 "\\.|=!~]{0,12}"#,
            op_idx in 0usize..4,
        ) {
            let op = [
                MatchOp::Equal,
                MatchOp::NotEqual,
                MatchOp::Regex,
                MatchOp::NotRegex,
            ][op_idx];
            // Regex operators only accept valid patterns
            let value = if op.is_regex() { regex::escape(&value) } else { value };
            let m = Matcher::new(name, op, value);
            let parsed = Matcher::parse(&m.to_string()).unwrap();
            prop_assert_eq!(parsed, m);
        }
    }
}
