// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Rule condition expressions
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | primary
//! primary := "(" or ")" | ("1" | "all") "of" (name-pattern | "them") | name
//! ```
//!
//! Keywords are case-insensitive. Aggregations (`| count() > 5`) are not
//! supported and fail to parse.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"^\s*(?:(\()|(\))|(\|)|([A-Za-z0-9_*.\-]+))").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Pipe,
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    loop {
        if rest.trim_start().is_empty() {
            return Ok(tokens);
        }

        let caps = TOKEN
            .captures(rest)
            .ok_or_else(|| Error::condition(input, format!("unexpected input at '{}'", rest.trim())))?;

        let token = if caps.get(1).is_some() {
            Token::Open
        } else if caps.get(2).is_some() {
            Token::Close
        } else if caps.get(3).is_some() {
            Token::Pipe
        } else {
            Token::Word(caps[4].to_string())
        };
        tokens.push(token);

        rest = &rest[caps[0].len()..];
    }
}

/// Which searches a quantifier ranges over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every search not starting with `_`
    Them,
    /// Search names matching a `*` pattern
    Pattern(String),
}

impl Selector {
    fn select(&self, results: &BTreeMap<String, bool>) -> Vec<bool> {
        results
            .iter()
            .filter(|(name, _)| match self {
                Selector::Them => !name.starts_with('_'),
                Selector::Pattern(p) => wildcard_match(p, name),
            })
            .map(|(_, matched)| *matched)
            .collect()
    }
}

/// Parsed condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Search(String),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    OneOf(Selector),
    AllOf(Selector),
}

impl Condition {
    /// Parse a condition string
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.contains(&Token::Pipe) {
            return Err(Error::condition(input, "aggregation expressions are not supported"));
        }
        if tokens.is_empty() {
            return Err(Error::condition(input, "empty condition"));
        }

        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
        };
        let condition = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(Error::condition(input, format!("unexpected token {:?}", token)));
        }
        Ok(condition)
    }

    /// Search names referenced directly (quantifier patterns excluded)
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Search(name) => out.push(name),
            Condition::Not(inner) => inner.collect_identifiers(out),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
            Condition::OneOf(_) | Condition::AllOf(_) => {}
        }
    }

    /// Evaluate against per-search outcomes. Unknown names are false, and a
    /// quantifier over no searches is false.
    pub fn evaluate(&self, results: &BTreeMap<String, bool>) -> bool {
        match self {
            Condition::Search(name) => results.get(name).copied().unwrap_or(false),
            Condition::Not(inner) => !inner.evaluate(results),
            Condition::And(a, b) => a.evaluate(results) && b.evaluate(results),
            Condition::Or(a, b) => a.evaluate(results) || b.evaluate(results),
            Condition::OneOf(selector) => selector.select(results).into_iter().any(|m| m),
            Condition::AllOf(selector) => {
                let selected = selector.select(results);
                !selected.is_empty() && selected.into_iter().all(|m| m)
            }
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::condition(self.input, reason)
    }

    fn parse_or(&mut self) -> Result<Condition> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let mut left = self.parse_not()?;
        while self.peek_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition> {
        if self.peek_keyword("not") {
            self.advance();
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition> {
        match self.advance() {
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(Token::Word(word)) => {
                let lower = word.to_ascii_lowercase();
                if (lower == "1" || lower == "all") && self.peek_keyword("of") {
                    self.advance();
                    let selector = self.parse_selector()?;
                    return Ok(if lower == "1" {
                        Condition::OneOf(selector)
                    } else {
                        Condition::AllOf(selector)
                    });
                }
                if matches!(lower.as_str(), "and" | "or" | "not" | "of" | "them") {
                    return Err(self.error(format!("unexpected keyword '{}'", word)));
                }
                Ok(Condition::Search(word))
            }
            Some(token) => Err(self.error(format!("unexpected token {:?}", token))),
            None => Err(self.error("unexpected end of condition")),
        }
    }

    fn parse_selector(&mut self) -> Result<Selector> {
        match self.advance() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("them") => Ok(Selector::Them),
            Some(Token::Word(w)) => Ok(Selector::Pattern(w)),
            _ => Err(self.error("expected a search pattern or 'them' after 'of'")),
        }
    }
}

/// Match `name` against a pattern where `*` matches any run of characters
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !name.starts_with(first) || name.len() < first.len() + last.len() || !name.ends_with(last) {
        return false;
    }

    let mut rest = &name[first.len()..name.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(idx) => rest = &rest[idx + middle.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_single_identifier() {
        assert_eq!(Condition::parse("selection").unwrap(), Condition::Search("selection".into()));
    }

    #[test]
    fn test_precedence() {
        // a or b and not c  ==  a or (b and (not c))
        let cond = Condition::parse("a or b and not c").unwrap();
        assert_eq!(
            cond,
            Condition::Or(
                Box::new(Condition::Search("a".into())),
                Box::new(Condition::And(
                    Box::new(Condition::Search("b".into())),
                    Box::new(Condition::Not(Box::new(Condition::Search("c".into()))))
                ))
            )
        );

        let results = outcomes(&[("a", false), ("b", true), ("c", false)]);
        assert!(cond.evaluate(&results));
        let results = outcomes(&[("a", false), ("b", true), ("c", true)]);
        assert!(!cond.evaluate(&results));
    }

    #[test]
    fn test_parentheses() {
        let cond = Condition::parse("(a OR b) AND c").unwrap();
        assert!(!cond.evaluate(&outcomes(&[("a", true), ("b", false), ("c", false)])));
        assert!(cond.evaluate(&outcomes(&[("a", false), ("b", true), ("c", true)])));
    }

    #[test]
    fn test_quantifiers() {
        let results = outcomes(&[
            ("selection_title", true),
            ("selection_form", false),
            ("filter", false),
            ("_helper", true),
        ]);

        assert!(Condition::parse("1 of selection_*").unwrap().evaluate(&results));
        assert!(!Condition::parse("all of selection_*").unwrap().evaluate(&results));
        assert!(Condition::parse("1 of them").unwrap().evaluate(&results));
        assert!(!Condition::parse("all of them").unwrap().evaluate(&results));
        assert!(!Condition::parse("1 of nothing_*").unwrap().evaluate(&results));
        assert!(!Condition::parse("all of nothing_*").unwrap().evaluate(&results));

        let cond = Condition::parse("1 of selection_* and not filter").unwrap();
        assert!(cond.evaluate(&results));
    }

    #[test]
    fn test_them_skips_underscore() {
        let results = outcomes(&[("a", true), ("_b", false)]);
        assert!(Condition::parse("all of them").unwrap().evaluate(&results));
    }

    #[test]
    fn test_identifiers() {
        let cond = Condition::parse("a and (b or not c) and 1 of d*").unwrap();
        assert_eq!(cond.identifiers(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "a and",
            "(a or b",
            "a b",
            "selection | count() > 5",
            "not",
            "1 of",
            "a = b",
        ] {
            assert!(Condition::parse(bad).is_err(), "'{}' should not parse", bad);
        }
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("sel*", "selection"));
        assert!(wildcard_match("*tion", "selection"));
        assert!(wildcard_match("s*c*n", "selection"));
        assert!(wildcard_match("*", "anything"));
        assert!(!wildcard_match("sel*", "filter"));
        assert!(!wildcard_match("ab*ba", "aba"));
        assert!(wildcard_match("exact", "exact"));
    }
}
